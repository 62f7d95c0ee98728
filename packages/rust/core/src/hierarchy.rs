//! Class hierarchy index.
//!
//! Built from every class parsed in a run. Provides parent chains,
//! "inherited by" lists and the nested directory layout that mirrors the
//! inheritance tree.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, instrument};

use classref_markdown::LocalPages;
use classref_shared::{ClassDoc, Layout};

/// Parent/child relations between the classes of one run.
#[derive(Debug, Clone, Default)]
pub struct ClassHierarchy {
    parents: BTreeMap<String, Option<String>>,
    children: BTreeMap<String, Vec<String>>,
}

impl ClassHierarchy {
    /// Index the given classes.
    #[instrument(skip_all)]
    pub fn build<'a>(classes: impl IntoIterator<Item = &'a ClassDoc>) -> Self {
        let mut hierarchy = Self::default();

        for class in classes {
            hierarchy
                .parents
                .insert(class.name.clone(), class.inherits.clone());
            if let Some(parent) = &class.inherits {
                hierarchy
                    .children
                    .entry(parent.clone())
                    .or_default()
                    .push(class.name.clone());
            }
        }
        for list in hierarchy.children.values_mut() {
            list.sort();
            list.dedup();
        }

        debug!(
            classes = hierarchy.parents.len(),
            parents = hierarchy.children.len(),
            "class hierarchy built"
        );
        hierarchy
    }

    /// Whether `class` was parsed in this run.
    pub fn contains(&self, class: &str) -> bool {
        self.parents.contains_key(class)
    }

    /// Parent chain, nearest first.
    ///
    /// The chain is followed through indexed classes; the last entry may be a
    /// parent that was not part of the run. Cycles stop the walk.
    pub fn ancestors(&self, class: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut seen: HashSet<&str> = HashSet::from([class]);
        let mut current = self.parents.get(class).and_then(Option::as_deref);

        while let Some(parent) = current {
            if !seen.insert(parent) {
                break;
            }
            chain.push(parent.to_string());
            current = self.parents.get(parent).and_then(Option::as_deref);
        }
        chain
    }

    /// Direct subclasses among the indexed classes, sorted by name.
    pub fn inherited_by(&self, class: &str) -> Vec<String> {
        self.children.get(class).cloned().unwrap_or_default()
    }

    /// Output directories for `class` in the hierarchy layout: its indexed
    /// ancestors, root first.
    pub fn directories(&self, class: &str) -> Vec<String> {
        let mut dirs: Vec<String> = self
            .ancestors(class)
            .into_iter()
            .filter(|a| self.contains(a))
            .collect();
        dirs.reverse();
        dirs
    }

    /// Fill in `ancestors` and `inherited_by` on a parsed class.
    pub fn enrich(&self, class: &mut ClassDoc) {
        class.ancestors = self.ancestors(&class.name);
        class.inherited_by = self.inherited_by(&class.name);
    }

    /// Page locations for every indexed class under `layout`.
    pub fn local_pages(&self, layout: Layout) -> LocalPages {
        let mut pages = LocalPages::default();
        for class in self.parents.keys() {
            let dirs = match layout {
                Layout::Flat => Vec::new(),
                Layout::Hierarchy => self.directories(class),
            };
            pages.insert(class.clone(), dirs);
        }
        pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn class(name: &str, inherits: Option<&str>) -> ClassDoc {
        ClassDoc {
            name: name.into(),
            inherits: inherits.map(String::from),
            ..Default::default()
        }
    }

    fn sample() -> ClassHierarchy {
        let classes = [
            class("Object", None),
            class("Node", Some("Object")),
            class("Timer", Some("Node")),
            class("Viewport", Some("Node")),
            class("Sprite2D", Some("Node2D")),
        ];
        ClassHierarchy::build(&classes)
    }

    #[test]
    fn ancestors_follow_indexed_parents() {
        let h = sample();
        assert_eq!(h.ancestors("Timer"), vec!["Node", "Object"]);
        assert_eq!(h.ancestors("Object"), Vec::<String>::new());
        // Node2D was not parsed, so the chain stops there.
        assert_eq!(h.ancestors("Sprite2D"), vec!["Node2D"]);
    }

    #[test]
    fn inherited_by_is_sorted() {
        let h = sample();
        assert_eq!(h.inherited_by("Node"), vec!["Timer", "Viewport"]);
        assert!(h.inherited_by("Timer").is_empty());
    }

    #[test]
    fn directories_only_use_indexed_classes() {
        let h = sample();
        assert_eq!(h.directories("Timer"), vec!["Object", "Node"]);
        assert!(h.directories("Sprite2D").is_empty());
        assert!(h.directories("Object").is_empty());
    }

    #[test]
    fn cycles_terminate() {
        let classes = [class("A", Some("B")), class("B", Some("A"))];
        let h = ClassHierarchy::build(&classes);
        assert_eq!(h.ancestors("A"), vec!["B"]);
    }

    #[test]
    fn enrich_fills_chain_and_children() {
        let h = sample();
        let mut node = class("Node", Some("Object"));
        h.enrich(&mut node);
        assert_eq!(node.ancestors, vec!["Object"]);
        assert_eq!(node.inherited_by, vec!["Timer", "Viewport"]);
    }

    #[test]
    fn local_pages_by_layout() {
        let h = sample();
        let flat = h.local_pages(Layout::Flat);
        assert_eq!(flat.relative_path("Timer").unwrap(), PathBuf::from("Timer.md"));

        let nested = h.local_pages(Layout::Hierarchy);
        assert_eq!(
            nested.relative_path("Timer").unwrap(),
            PathBuf::from("Object/Node/Timer.md")
        );
        assert_eq!(nested.link("Timer", "Node").unwrap(), "../Node.md");
    }
}
