//! Fuzzy catalog resolution and the override → exact → fuzzy → pass-through
//! resolver chain.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::ops::AddAssign;

use tracing::{debug, warn};

use crate::catalog::{Translation, TranslationCatalog, truncate};
use crate::normalize::normalize_for_matching;
use crate::similarity::{quick_ratio, ratio, real_quick_ratio};

/// Find the catalog entry most similar to `text`.
///
/// Returns the highest-scoring entry if its score is at least `threshold`
/// and above zero. The first entry in load order wins ties. Candidates whose
/// cheap upper bounds cannot beat the current best (or the threshold) are
/// skipped without changing the result.
pub fn resolve<'c>(
    catalog: &'c TranslationCatalog,
    text: &str,
    threshold: f64,
) -> Option<Translation<'c>> {
    let normalized: Vec<char> = normalize_for_matching(text).chars().collect();

    let mut best: Option<(usize, f64)> = None;
    for (idx, (_, key)) in catalog.indexed().enumerate() {
        if key.chars.is_empty() {
            continue;
        }
        let floor = best.map_or(0.0, |(_, score)| score);

        // A candidate must strictly beat the current best and reach the threshold.
        let beatable = |bound: f64| bound > floor && bound >= threshold;
        if !beatable(real_quick_ratio(normalized.len(), key.chars.len())) {
            continue;
        }
        if !beatable(quick_ratio(&normalized, &key.counts, key.chars.len())) {
            continue;
        }
        let score = ratio(&normalized, &key.chars);
        if score > floor {
            best = Some((idx, score));
        }
    }

    let (idx, score) = best?;
    if score < threshold {
        return None;
    }
    let entry = &catalog.entries()[idx];
    Some(Translation {
        text: &entry.translation,
        is_fuzzy_entry: entry.is_fuzzy,
        score,
    })
}

// ---------------------------------------------------------------------------
// Resolver chain
// ---------------------------------------------------------------------------

/// Which tier of the chain produced a resolved string.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    /// Literal override table.
    Override,
    /// Exact catalog hit.
    Exact,
    /// Fuzzy catalog hit at or above threshold.
    Fuzzy { score: f64 },
    /// Nothing matched; the input is returned unchanged.
    PassThrough,
}

/// A resolved string and how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<'a> {
    pub text: Cow<'a, str>,
    pub outcome: Outcome,
}

/// Per-outcome lookup counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LookupStats {
    pub overrides: usize,
    pub exact: usize,
    pub fuzzy: usize,
    pub pass_through: usize,
}

impl LookupStats {
    /// Count one outcome.
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Override => self.overrides += 1,
            Outcome::Exact => self.exact += 1,
            Outcome::Fuzzy { .. } => self.fuzzy += 1,
            Outcome::PassThrough => self.pass_through += 1,
        }
    }

    /// Total strings looked up.
    pub fn total(&self) -> usize {
        self.overrides + self.exact + self.fuzzy + self.pass_through
    }
}

impl AddAssign for LookupStats {
    fn add_assign(&mut self, rhs: Self) {
        self.overrides += rhs.overrides;
        self.exact += rhs.exact;
        self.fuzzy += rhs.fuzzy;
        self.pass_through += rhs.pass_through;
    }
}

/// Override table plus optional catalog, shared read-only across files.
#[derive(Debug, Clone, Default)]
pub struct Localizer {
    overrides: BTreeMap<String, String>,
    catalog: Option<TranslationCatalog>,
}

impl Localizer {
    pub fn new(catalog: Option<TranslationCatalog>, overrides: BTreeMap<String, String>) -> Self {
        Self { overrides, catalog }
    }

    /// Localizer that only applies the override table.
    pub fn without_catalog(overrides: BTreeMap<String, String>) -> Self {
        Self::new(None, overrides)
    }

    /// Resolve `text` through the chain. Exactly one tier applies.
    pub fn resolve<'a>(&'a self, text: &'a str, threshold: f64) -> Resolved<'a> {
        if text.trim().is_empty() {
            return pass_through(text);
        }

        if let Some(hit) = self
            .overrides
            .get(text)
            .or_else(|| self.overrides.get(text.trim()))
        {
            return Resolved {
                text: Cow::Borrowed(hit.as_str()),
                outcome: Outcome::Override,
            };
        }

        let Some(catalog) = &self.catalog else {
            return pass_through(text);
        };

        if let Some(hit) = catalog.lookup(text) {
            return Resolved {
                text: Cow::Borrowed(hit.text),
                outcome: Outcome::Exact,
            };
        }

        if let Some(hit) = resolve(catalog, text, threshold) {
            warn!(
                score = %format!("{:.1}%", hit.score * 100.0),
                source = %truncate(text.trim()),
                matched = %truncate(hit.text),
                "using fuzzy catalog match"
            );
            return Resolved {
                text: Cow::Borrowed(hit.text),
                outcome: Outcome::Fuzzy { score: hit.score },
            };
        }

        debug!(source = %truncate(text.trim()), "no translation found");
        pass_through(text)
    }
}

fn pass_through(text: &str) -> Resolved<'_> {
    Resolved {
        text: Cow::Borrowed(text),
        outcome: Outcome::PassThrough,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogEntry;

    fn entry(source: &str, translation: &str) -> CatalogEntry {
        CatalogEntry {
            source: source.into(),
            translation: translation.into(),
            is_fuzzy: false,
        }
    }

    fn sample_catalog() -> TranslationCatalog {
        TranslationCatalog::from_entries([
            entry("Returns the number of child nodes.", "返回子节点的数量。"),
            entry("Emitted when the node enters the scene tree.", "当节点进入场景树时发出。"),
            entry("Emitted when the node exits the scene tree.", "当节点退出场景树时发出。"),
            entry("Description", "描述"),
        ])
    }

    #[test]
    fn fuzzy_resolve_picks_best_above_threshold() {
        let catalog = sample_catalog();
        let hit = resolve(&catalog, "Returns the number of child nodes!", 0.7).unwrap();
        assert_eq!(hit.text, "返回子节点的数量。");
        assert!(hit.score > 0.9 && hit.score < 1.0);
    }

    #[test]
    fn fuzzy_resolve_rejects_below_threshold() {
        let catalog = sample_catalog();
        assert!(resolve(&catalog, "Completely unrelated sentence about physics.", 0.7).is_none());
    }

    #[test]
    fn fuzzy_resolve_first_entry_wins_ties() {
        let catalog = TranslationCatalog::from_entries([
            entry("abcX", "first"),
            entry("abcY", "second"),
        ]);
        let hit = resolve(&catalog, "abcZ", 0.5).unwrap();
        assert_eq!(hit.text, "first");
        assert_eq!(hit.score, 0.75);
    }

    #[test]
    fn pruned_scan_matches_full_scan() {
        let catalog = sample_catalog();
        let queries = [
            "Emitted when the node enters the tree.",
            "Emitted when a node exits the scene tree",
            "Returns number of children.",
            "Descriptions",
        ];
        for query in queries {
            let normalized: Vec<char> = normalize_for_matching(query).chars().collect();
            let mut expected: Option<(usize, f64)> = None;
            for (idx, e) in catalog.entries().iter().enumerate() {
                let key: Vec<char> = normalize_for_matching(&e.source).chars().collect();
                let score = ratio(&normalized, &key);
                if score > expected.map_or(0.0, |(_, s)| s) {
                    expected = Some((idx, score));
                }
            }
            let (idx, score) = expected.unwrap();
            let hit = resolve(&catalog, query, 0.0).unwrap();
            assert_eq!(hit.text, catalog.entries()[idx].translation, "{query}");
            assert_eq!(hit.score, score, "{query}");
        }
    }

    #[test]
    fn chain_precedence_override_then_exact_then_fuzzy() {
        let mut overrides = BTreeMap::new();
        overrides.insert("Description".to_string(), "详细描述".to_string());
        let localizer = Localizer::new(Some(sample_catalog()), overrides);

        let r = localizer.resolve("Description", 0.7);
        assert_eq!(r.text, "详细描述");
        assert_eq!(r.outcome, Outcome::Override);

        let r = localizer.resolve("Returns the number of child nodes.", 0.7);
        assert_eq!(r.text, "返回子节点的数量。");
        assert_eq!(r.outcome, Outcome::Exact);

        let r = localizer.resolve("Returns the number of child nodes!", 0.7);
        assert!(matches!(r.outcome, Outcome::Fuzzy { .. }));

        let r = localizer.resolve("Something else entirely", 0.7);
        assert_eq!(r.text, "Something else entirely");
        assert_eq!(r.outcome, Outcome::PassThrough);
    }

    #[test]
    fn exact_hit_ignores_threshold() {
        let localizer = Localizer::new(Some(sample_catalog()), BTreeMap::new());
        for threshold in [0.0, 0.5, 1.0] {
            let r = localizer.resolve("Description", threshold);
            assert_eq!(r.text, "描述");
            assert_eq!(r.outcome, Outcome::Exact);
        }
    }

    #[test]
    fn inline_code_difference_is_not_an_exact_hit() {
        let catalog = TranslationCatalog::from_entries([entry(
            "Returns [code]true[/code] if visible.",
            "可见时返回 [code]true[/code]。",
        )]);
        let localizer = Localizer::new(Some(catalog), BTreeMap::new());

        let same = localizer.resolve("\n\t\tReturns [code]true[/code] if visible.\n\t", 1.0);
        assert_eq!(same.outcome, Outcome::Exact);

        let other = localizer.resolve("Returns [code]false[/code] if visible.", 1.0);
        assert_ne!(other.outcome, Outcome::Exact);
        assert!(matches!(other.outcome, Outcome::Fuzzy { .. }));
    }

    #[test]
    fn raising_threshold_never_adds_fuzzy_hits() {
        let localizer = Localizer::new(Some(sample_catalog()), BTreeMap::new());
        let inputs = [
            "Returns the number of child nodes!",
            "Emitted when the node enters the tree.",
            "Emitted when a node exits.",
            "Describe",
            "Totally different",
        ];
        let mut previous = usize::MAX;
        for step in 0..=10 {
            let threshold = step as f64 / 10.0;
            let mut stats = LookupStats::default();
            for input in inputs {
                stats.record(localizer.resolve(input, threshold).outcome);
            }
            assert!(stats.fuzzy <= previous, "threshold {threshold}");
            previous = stats.fuzzy;
        }
    }

    #[test]
    fn no_catalog_passes_through() {
        let localizer = Localizer::without_catalog(BTreeMap::new());
        let r = localizer.resolve("Methods", 0.7);
        assert_eq!(r.outcome, Outcome::PassThrough);
        assert_eq!(r.text, "Methods");
    }

    #[test]
    fn blank_text_passes_through() {
        let localizer = Localizer::new(Some(sample_catalog()), BTreeMap::new());
        assert_eq!(localizer.resolve("  \n", 0.0).outcome, Outcome::PassThrough);
    }

    #[test]
    fn stats_accumulate() {
        let mut a = LookupStats::default();
        a.record(Outcome::Exact);
        a.record(Outcome::Fuzzy { score: 0.8 });
        let mut b = LookupStats::default();
        b.record(Outcome::PassThrough);
        a += b;
        assert_eq!(a.total(), 3);
        assert_eq!(a.fuzzy, 1);
    }
}
