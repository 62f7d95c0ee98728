//! Class-reference document model.
//!
//! A [`ClassDoc`] is built by the XML loader, enriched with hierarchy
//! information by the batch driver, and consumed by the Markdown renderer.

// ---------------------------------------------------------------------------
// ClassDoc
// ---------------------------------------------------------------------------

/// One class-reference entry (one XML file).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassDoc {
    /// Class name from the root `name` attribute.
    pub name: String,
    /// Direct parent class, if any.
    pub inherits: Option<String>,
    /// Full parent chain, nearest first. Filled in by the batch driver;
    /// defaults to just `inherits` when the class is rendered on its own.
    pub ancestors: Vec<String>,
    /// Classes that directly inherit from this one, sorted by name.
    pub inherited_by: Vec<String>,
    /// Engine version the document was generated for.
    pub version: Option<String>,
    /// Deprecated/experimental notice on the class itself.
    pub notice: Option<Notice>,
    /// Raw BBCode brief description.
    pub brief_description: String,
    /// Raw BBCode long description.
    pub description: String,
    /// Tutorial links.
    pub tutorials: Vec<Tutorial>,
    /// Members in document order.
    pub members: Vec<DocMember>,
}

impl ClassDoc {
    /// Parent chain for rendering: explicit ancestors, else the direct parent.
    pub fn parent_chain(&self) -> Vec<&str> {
        if self.ancestors.is_empty() {
            self.inherits.iter().map(String::as_str).collect()
        } else {
            self.ancestors.iter().map(String::as_str).collect()
        }
    }

    /// Members of one kind, in document order.
    pub fn members_of(&self, kind: MemberKind) -> impl Iterator<Item = &DocMember> {
        self.members.iter().filter(move |m| m.kind() == kind)
    }
}

/// A tutorial link from `<tutorials>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tutorial {
    /// Link title (may be empty).
    pub title: String,
    /// Target URL, possibly containing `$DOCS_URL`.
    pub url: String,
}

/// Deprecated / experimental marker with its explanation text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Deprecated(String),
    Experimental(String),
}

impl Notice {
    /// English label used as the lookup key for the notice heading.
    pub fn label(&self) -> &'static str {
        match self {
            Notice::Deprecated(_) => "Deprecated",
            Notice::Experimental(_) => "Experimental",
        }
    }

    /// Explanation text (raw BBCode).
    pub fn text(&self) -> &str {
        match self {
            Notice::Deprecated(t) | Notice::Experimental(t) => t,
        }
    }
}

// ---------------------------------------------------------------------------
// Members
// ---------------------------------------------------------------------------

/// Section a member belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Property,
    Method,
    Constructor,
    Operator,
    Signal,
    Constant,
    ThemeItem,
}

impl MemberKind {
    /// Anchor fragment used in documentation URLs (`class-node-method-...`).
    pub fn anchor_tag(self) -> &'static str {
        match self {
            MemberKind::Property => "property",
            MemberKind::Method => "method",
            MemberKind::Constructor => "constructor",
            MemberKind::Operator => "operator",
            MemberKind::Signal => "signal",
            MemberKind::Constant => "constant",
            MemberKind::ThemeItem => "theme-item",
        }
    }

    /// English section heading, localized by the renderer.
    pub fn section_title(self) -> &'static str {
        match self {
            MemberKind::Property => "Properties",
            MemberKind::Method => "Methods",
            MemberKind::Constructor => "Constructors",
            MemberKind::Operator => "Operators",
            MemberKind::Signal => "Signals",
            MemberKind::Constant => "Constants",
            MemberKind::ThemeItem => "Theme Properties",
        }
    }
}

/// Where a member was declared; used to build cross-reference anchors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    /// Owning class.
    pub class_name: String,
    /// 1-based line of the member element in the XML source.
    pub line: u32,
}

/// A type reference, optionally narrowed to an enum or bitfield.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeRef {
    pub name: String,
    pub enum_name: Option<String>,
}

impl TypeRef {
    /// Text shown in signatures: the enum when present, else the type.
    pub fn display(&self) -> &str {
        self.enum_name.as_deref().unwrap_or(&self.name)
    }
}

/// A method/signal parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub index: usize,
    pub name: String,
    pub type_ref: TypeRef,
    pub default: Option<String>,
}

/// Kind-specific member data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberDetail {
    Property {
        type_ref: TypeRef,
        default: Option<String>,
        setter: Option<String>,
        getter: Option<String>,
    },
    /// Methods, constructors and operators share one shape.
    Callable {
        kind: MemberKind,
        return_type: TypeRef,
        params: Vec<Param>,
        qualifiers: Option<String>,
    },
    Signal {
        params: Vec<Param>,
    },
    Constant {
        value: String,
        enum_name: Option<String>,
        is_bitfield: bool,
    },
    ThemeItem {
        data_type: String,
        type_name: String,
        default: Option<String>,
    },
}

/// One documented member of a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocMember {
    pub name: String,
    pub detail: MemberDetail,
    /// Raw BBCode description.
    pub description: String,
    pub notice: Option<Notice>,
    pub source: SourceRef,
}

impl DocMember {
    /// Section this member is rendered under.
    pub fn kind(&self) -> MemberKind {
        match &self.detail {
            MemberDetail::Property { .. } => MemberKind::Property,
            MemberDetail::Callable { kind, .. } => *kind,
            MemberDetail::Signal { .. } => MemberKind::Signal,
            MemberDetail::Constant { .. } => MemberKind::Constant,
            MemberDetail::ThemeItem { .. } => MemberKind::ThemeItem,
        }
    }

    /// GDScript-style declaration of this member.
    pub fn signature(&self) -> String {
        match &self.detail {
            MemberDetail::Property {
                type_ref, default, ..
            } => {
                let mut sig = format!("var {}: {}", self.name, type_ref.display());
                if let Some(d) = default {
                    sig.push_str(&format!(" = {d}"));
                }
                sig
            }
            MemberDetail::Callable {
                kind,
                return_type,
                params,
                qualifiers,
            } => {
                let params = format_params(params);
                let mut sig = match kind {
                    MemberKind::Constructor => format!("{}({params})", self.name),
                    MemberKind::Operator => format!("{}({params})", self.name),
                    _ => format!("func {}({params})", self.name),
                };
                if *kind != MemberKind::Constructor && !return_type.name.is_empty() {
                    sig.push_str(&format!(" -> {}", return_type.display()));
                }
                if let Some(q) = qualifiers.as_deref().filter(|q| !q.is_empty()) {
                    sig.push_str(&format!(" {q}"));
                }
                sig
            }
            MemberDetail::Signal { params } => {
                format!("signal {}({})", self.name, format_params(params))
            }
            MemberDetail::Constant { value, .. } => format!("const {} = {value}", self.name),
            MemberDetail::ThemeItem {
                data_type,
                type_name,
                default,
            } => {
                let mut sig = format!("theme_item {} {}: {type_name}", data_type, self.name);
                if let Some(d) = default {
                    sig.push_str(&format!(" = {d}"));
                }
                sig
            }
        }
    }
}

fn format_params(params: &[Param]) -> String {
    params
        .iter()
        .map(|p| match &p.default {
            Some(d) => format!("{}: {} = {d}", p.name, p.type_ref.display()),
            None => format!("{}: {}", p.name, p.type_ref.display()),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
