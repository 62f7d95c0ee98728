//! Class-reference XML loader.
//!
//! Parses one `<class>` document into a [`ClassDoc`]:
//! - `<brief_description>`, `<description>`, `<tutorials>`
//! - `<constructors>`, `<methods>`, `<operators>`, `<members>`,
//!   `<signals>`, `<constants>`, `<theme_items>`
//!
//! Members keep their document order. Description text is kept as raw
//! BBCode; conversion happens in the renderer.

use std::path::Path;

use roxmltree::{Document, Node};
use tracing::{debug, instrument};

use classref_shared::{
    ClassDoc, ClassrefError, DocMember, MemberDetail, MemberKind, Notice, Param, Result,
    SourceRef, Tutorial, TypeRef,
};

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse class-reference XML text.
///
/// Fails with [`ClassrefError::MalformedDoc`] on unparseable markup, a root
/// element other than `<class>`, or a missing/unsafe `name` attribute.
pub fn parse(xml: &str) -> Result<ClassDoc> {
    let doc = Document::parse(xml).map_err(|e| ClassrefError::malformed(e.to_string()))?;
    let root = doc.root_element();

    if root.tag_name().name() != "class" {
        return Err(ClassrefError::malformed(format!(
            "root element is <{}>, expected <class>",
            root.tag_name().name()
        )));
    }

    let name = root
        .attribute("name")
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ClassrefError::malformed("<class> has no name attribute"))?;
    if name.contains(['/', '\\']) || name.contains("..") {
        return Err(ClassrefError::malformed(format!(
            "class name '{name}' is not usable as a file name"
        )));
    }

    let inherits = root
        .attribute("inherits")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from);

    let mut class = ClassDoc {
        name: name.to_string(),
        inherits,
        version: root.attribute("version").map(String::from),
        notice: notice_of(root),
        ..Default::default()
    };

    let mut parser = MemberParser {
        doc: &doc,
        class_name: name,
        members: Vec::new(),
    };

    for section in root.children().filter(Node::is_element) {
        match section.tag_name().name() {
            "brief_description" => class.brief_description = text_of(section),
            "description" => class.description = text_of(section),
            "tutorials" => class.tutorials = tutorials_of(section),
            "members" => parser.section(section, "member", MemberParser::property),
            "methods" => parser.section(section, "method", |p, n| {
                p.callable(n, MemberKind::Method)
            }),
            "constructors" => parser.section(section, "constructor", |p, n| {
                p.callable(n, MemberKind::Constructor)
            }),
            "operators" => parser.section(section, "operator", |p, n| {
                p.callable(n, MemberKind::Operator)
            }),
            "signals" => parser.section(section, "signal", MemberParser::signal),
            "constants" => parser.section(section, "constant", MemberParser::constant),
            "theme_items" => parser.section(section, "theme_item", MemberParser::theme_item),
            other => debug!(class = name, section = other, "ignoring unknown section"),
        }
    }

    class.members = parser.members;
    Ok(class)
}

/// Read and parse one XML file; errors carry the file path.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_file(path: &Path) -> Result<ClassDoc> {
    let xml = std::fs::read_to_string(path).map_err(|e| ClassrefError::io(path, e))?;
    let class = parse(&xml).map_err(|e| e.with_path(path))?;
    debug!(class = %class.name, members = class.members.len(), "parsed class");
    Ok(class)
}

// ---------------------------------------------------------------------------
// Members
// ---------------------------------------------------------------------------

struct MemberParser<'d, 'input> {
    doc: &'d Document<'input>,
    class_name: &'d str,
    members: Vec<DocMember>,
}

impl<'d, 'input> MemberParser<'d, 'input> {
    /// Parse every `<tag>` child of a section element, in order.
    fn section(
        &mut self,
        section: Node<'_, '_>,
        tag: &str,
        parse_one: impl Fn(&Self, Node<'_, '_>) -> Option<DocMember>,
    ) {
        for node in section.children().filter(|n| n.has_tag_name(tag)) {
            match parse_one(self, node) {
                Some(member) => self.members.push(member),
                None => debug!(class = self.class_name, tag, "skipping unnamed member"),
            }
        }
    }

    fn base(&self, node: Node<'_, '_>, detail: MemberDetail, description: String) -> Option<DocMember> {
        let name = node.attribute("name").filter(|n| !n.is_empty())?;
        Some(DocMember {
            name: name.to_string(),
            detail,
            description,
            notice: notice_of(node),
            source: SourceRef {
                class_name: self.class_name.to_string(),
                line: self.doc.text_pos_at(node.range().start).row,
            },
        })
    }

    fn property(&self, node: Node<'_, '_>) -> Option<DocMember> {
        let detail = MemberDetail::Property {
            type_ref: type_ref_of(node, "type"),
            default: node.attribute("default").map(String::from),
            setter: attr_non_empty(node, "setter"),
            getter: attr_non_empty(node, "getter"),
        };
        self.base(node, detail, text_of(node))
    }

    fn callable(&self, node: Node<'_, '_>, kind: MemberKind) -> Option<DocMember> {
        let return_type = node
            .children()
            .find(|n| n.has_tag_name("return"))
            .map(|r| type_ref_of(r, "type"))
            .unwrap_or_default();
        let detail = MemberDetail::Callable {
            kind,
            return_type,
            params: params_of(node),
            qualifiers: attr_non_empty(node, "qualifiers"),
        };
        self.base(node, detail, child_text(node, "description"))
    }

    fn signal(&self, node: Node<'_, '_>) -> Option<DocMember> {
        let detail = MemberDetail::Signal {
            params: params_of(node),
        };
        self.base(node, detail, child_text(node, "description"))
    }

    fn constant(&self, node: Node<'_, '_>) -> Option<DocMember> {
        let detail = MemberDetail::Constant {
            value: node.attribute("value").unwrap_or_default().to_string(),
            enum_name: attr_non_empty(node, "enum"),
            is_bitfield: node.attribute("is_bitfield") == Some("true"),
        };
        self.base(node, detail, text_of(node))
    }

    fn theme_item(&self, node: Node<'_, '_>) -> Option<DocMember> {
        let detail = MemberDetail::ThemeItem {
            data_type: node.attribute("data_type").unwrap_or_default().to_string(),
            type_name: node.attribute("type").unwrap_or_default().to_string(),
            default: node.attribute("default").map(String::from),
        };
        self.base(node, detail, text_of(node))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Concatenated direct text content of an element (entities decoded).
fn text_of(node: Node<'_, '_>) -> String {
    node.children()
        .filter(Node::is_text)
        .filter_map(|n| n.text())
        .collect()
}

/// Text of the first `<tag>` child, or empty.
fn child_text(node: Node<'_, '_>, tag: &str) -> String {
    node.children()
        .find(|n| n.has_tag_name(tag))
        .map(text_of)
        .unwrap_or_default()
}

fn attr_non_empty(node: Node<'_, '_>, name: &str) -> Option<String> {
    node.attribute(name)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

fn type_ref_of(node: Node<'_, '_>, attr: &str) -> TypeRef {
    TypeRef {
        name: node.attribute(attr).unwrap_or_default().to_string(),
        enum_name: attr_non_empty(node, "enum"),
    }
}

/// `<param>` children (`<argument>` in older documents), sorted by index.
fn params_of(node: Node<'_, '_>) -> Vec<Param> {
    let mut params: Vec<Param> = node
        .children()
        .filter(|n| n.has_tag_name("param") || n.has_tag_name("argument"))
        .enumerate()
        .map(|(position, n)| Param {
            index: n
                .attribute("index")
                .and_then(|i| i.parse().ok())
                .unwrap_or(position),
            name: n.attribute("name").unwrap_or_default().to_string(),
            type_ref: type_ref_of(n, "type"),
            default: n.attribute("default").map(String::from),
        })
        .collect();
    params.sort_by_key(|p| p.index);
    params
}

fn tutorials_of(node: Node<'_, '_>) -> Vec<Tutorial> {
    node.children()
        .filter(|n| n.has_tag_name("link"))
        .map(|link| Tutorial {
            title: link.attribute("title").unwrap_or_default().trim().to_string(),
            url: text_of(link).trim().to_string(),
        })
        .filter(|t| !t.url.is_empty())
        .collect()
}

/// `deprecated="…"` / `experimental="…"` (or the older `is_deprecated="true"`).
fn notice_of(node: Node<'_, '_>) -> Option<Notice> {
    if let Some(text) = node.attribute("deprecated") {
        return Some(Notice::Deprecated(text.to_string()));
    }
    if let Some(text) = node.attribute("experimental") {
        return Some(Notice::Experimental(text.to_string()));
    }
    if node.attribute("is_deprecated") == Some("true") {
        return Some(Notice::Deprecated(String::new()));
    }
    if node.attribute("is_experimental") == Some("true") {
        return Some(Notice::Experimental(String::new()));
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
