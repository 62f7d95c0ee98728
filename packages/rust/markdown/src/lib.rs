//! Class-reference → Markdown rendering.
//!
//! [`render`] walks a [`ClassDoc`], resolves every label and description
//! through the [`Localizer`] chain, converts BBCode to Markdown, links
//! cross-references against the documentation base URL, and finishes with a
//! series of cleanup passes.

pub mod bbcode;
mod cleanup;
pub mod links;
mod pages;

pub use pages::LocalPages;

use tracing::{debug, instrument, trace};
use url::Url;

use classref_l10n::{Localizer, LookupStats};
use classref_shared::{ClassDoc, DocMember, MemberDetail, MemberKind, Notice};

use crate::bbcode::LinkScope;

/// Indent for content nested under a list item.
const LIST_INDENT: &str = "  ";

// ---------------------------------------------------------------------------
// Render context
// ---------------------------------------------------------------------------

/// Per-file rendering state.
///
/// Built fresh for each class page; collects lookup statistics while the
/// page is rendered.
#[derive(Debug)]
pub struct RenderContext<'a> {
    lang: String,
    docs_url: Url,
    threshold: f64,
    frontmatter: bool,
    localizer: &'a Localizer,
    pages: Option<&'a LocalPages>,
    stats: LookupStats,
}

impl<'a> RenderContext<'a> {
    pub fn new(
        localizer: &'a Localizer,
        lang: impl Into<String>,
        docs_url: Url,
        threshold: f64,
    ) -> Self {
        Self {
            lang: lang.into(),
            docs_url,
            threshold,
            frontmatter: false,
            localizer,
            pages: None,
            stats: LookupStats::default(),
        }
    }

    /// Prepend YAML frontmatter to the page.
    pub fn with_frontmatter(mut self, enabled: bool) -> Self {
        self.frontmatter = enabled;
        self
    }

    /// Link inheritance lines to locally written pages instead of the
    /// online documentation.
    pub fn with_local_pages(mut self, pages: &'a LocalPages) -> Self {
        self.pages = Some(pages);
        self
    }

    /// Lookup statistics gathered so far.
    pub fn stats(&self) -> LookupStats {
        self.stats
    }

    /// Resolve one string through the localizer chain and count the outcome.
    fn localize(&mut self, text: &str) -> String {
        let localizer = self.localizer;
        let resolved = localizer.resolve(text, self.threshold);
        self.stats.record(resolved.outcome);
        resolved.text.into_owned()
    }

    /// Localize a short UI label.
    fn label(&mut self, text: &str) -> String {
        self.localize(text).trim().to_string()
    }

    /// Localize a BBCode description and convert it to Markdown. Code blocks
    /// always come from `raw`, whatever the translation carries.
    fn rich(&mut self, raw: &str, class_name: &str, indent: &str) -> String {
        let localized = bbcode::keep_source_code(raw, &self.localize(raw));
        let scope = LinkScope {
            base: &self.docs_url,
            class_name,
        };
        bbcode::to_markdown(&localized, &scope, indent)
    }

    /// Link to a class page: local when the page was written in this run
    /// and local links are enabled, else the online documentation.
    fn class_ref(&self, from: &str, to: &str) -> String {
        match self.pages.and_then(|p| p.link(from, to)) {
            Some(rel) => format!("[{to}]({rel})"),
            None => links::class_link(&self.docs_url, to),
        }
    }
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Render one class page.
///
/// Rendering the same class twice with equivalent contexts yields identical
/// text.
#[instrument(skip_all, fields(class = %class.name))]
pub fn render(class: &ClassDoc, ctx: &mut RenderContext<'_>) -> String {
    let mut out = String::new();
    let name = class.name.as_str();

    out.push_str(&format!("# {name}\n\n"));

    let chain = class.parent_chain();
    if !chain.is_empty() {
        let links: Vec<String> = chain.iter().map(|c| ctx.class_ref(name, c)).collect();
        let label = ctx.label("Inherits");
        out.push_str(&format!("**{label}:** {}\n\n", links.join(" < ")));
    }

    if !class.inherited_by.is_empty() {
        let links: Vec<String> = class
            .inherited_by
            .iter()
            .map(|c| ctx.class_ref(name, c))
            .collect();
        let label = ctx.label("Inherited By");
        out.push_str(&format!("**{label}:** {}\n\n", links.join(", ")));
    }

    if let Some(notice) = &class.notice {
        out.push_str(&notice_block(notice, name, "", ctx));
        out.push_str("\n\n");
    }

    if let Some(version) = &class.version {
        let label = ctx.label("Version");
        out.push_str(&format!("*{label}: {version}*\n\n"));
    }

    render_text_section(&mut out, "Brief Description", &class.brief_description, name, ctx);
    render_text_section(&mut out, "Description", &class.description, name, ctx);

    if !class.tutorials.is_empty() {
        let heading = ctx.label("Tutorials");
        out.push_str(&format!("## {heading}\n\n"));
        for tutorial in &class.tutorials {
            let url = bbcode::expand_docs_url(tutorial.url.trim(), &ctx.docs_url);
            let title = if tutorial.title.trim().is_empty() {
                url.clone()
            } else {
                ctx.label(&tutorial.title)
            };
            out.push_str(&format!("- [{title}]({url})\n"));
        }
        out.push('\n');
    }

    for run in class.members.chunk_by(|a, b| a.kind() == b.kind()) {
        render_section(&mut out, name, run, ctx);
    }

    let body = cleanup::run_pipeline(&out);
    debug!(
        lookups = ctx.stats.total(),
        fuzzy = ctx.stats.fuzzy,
        len = body.len(),
        "render complete"
    );

    if ctx.frontmatter {
        format!("{}\n{body}", build_frontmatter(class, &ctx.lang))
    } else {
        body
    }
}

fn render_text_section(
    out: &mut String,
    title: &str,
    raw: &str,
    class_name: &str,
    ctx: &mut RenderContext<'_>,
) {
    if raw.trim().is_empty() {
        return;
    }
    let heading = ctx.label(title);
    let text = ctx.rich(raw, class_name, "");
    out.push_str(&format!("## {heading}\n\n{text}\n\n"));
}

/// One heading for a run of same-kind members, then each member.
fn render_section(out: &mut String, class_name: &str, run: &[DocMember], ctx: &mut RenderContext<'_>) {
    let Some(first) = run.first() else {
        return;
    };
    let kind = first.kind();
    let heading = ctx.label(kind.section_title());
    out.push_str(&format!("## {heading}\n\n"));

    match kind {
        MemberKind::Property => {
            property_table(out, run, ctx);
            for member in run {
                detail_entry(out, class_name, member, ctx);
            }
        }
        MemberKind::Method | MemberKind::Constructor | MemberKind::Operator => {
            for member in run {
                detail_entry(out, class_name, member, ctx);
            }
        }
        MemberKind::Signal | MemberKind::Constant | MemberKind::ThemeItem => {
            for member in run {
                list_entry(out, class_name, member, ctx);
            }
        }
    }
}

fn property_table(out: &mut String, run: &[DocMember], ctx: &mut RenderContext<'_>) {
    let name = ctx.label("Name");
    let ty = ctx.label("Type");
    let default = ctx.label("Default");
    out.push_str(&format!("| {name} | {ty} | {default} |\n| --- | --- | --- |\n"));

    for member in run {
        let MemberDetail::Property {
            type_ref, default, ..
        } = &member.detail
        else {
            continue;
        };
        let type_cell = links::type_link(&ctx.docs_url, &type_ref.name, type_ref.enum_name.as_deref());
        let default_cell = default
            .as_deref()
            .map(|d| format!("`{}`", d.replace('|', "\\|")))
            .unwrap_or_default();
        out.push_str(&format!(
            "| `{}` | {type_cell} | {default_cell} |\n",
            member.name
        ));
    }
    out.push('\n');
}

/// Heading, signature block, notice and description.
fn detail_entry(out: &mut String, class_name: &str, member: &DocMember, ctx: &mut RenderContext<'_>) {
    let heading = match member.kind() {
        MemberKind::Method | MemberKind::Constructor => format!("{}()", member.name),
        _ => member.name.clone(),
    };
    out.push_str(&format!("### {heading}\n\n"));
    out.push_str(&bbcode::fence("gdscript", &member.signature(), ""));
    out.push_str("\n\n");

    let returned = match &member.detail {
        MemberDetail::Callable {
            kind, return_type, ..
        } if *kind != MemberKind::Constructor => Some(return_type),
        _ => None,
    };
    if let Some(ret) = returned.filter(|r| !r.name.is_empty() && r.name != "void") {
        let label = ctx.label("Returns");
        let link = links::type_link(&ctx.docs_url, &ret.name, ret.enum_name.as_deref());
        out.push_str(&format!("*{label}*: {link}\n\n"));
    }

    if let MemberDetail::Property { setter, getter, .. } = &member.detail {
        for (label, accessor) in [("Setter", setter), ("Getter", getter)] {
            let Some(accessor) = accessor.as_deref().filter(|a| !a.is_empty()) else {
                continue;
            };
            let label = ctx.label(label);
            let url = links::member_url(&ctx.docs_url, class_name, "method", accessor);
            out.push_str(&format!("*{label}*: [`{accessor}()`]({url})\n\n"));
        }
    }

    member_body(out, class_name, member, "", ctx);
}

/// Bulleted entry with nested signature, notice and description.
fn list_entry(out: &mut String, class_name: &str, member: &DocMember, ctx: &mut RenderContext<'_>) {
    let name = &member.name;
    let line = match &member.detail {
        MemberDetail::Constant {
            value,
            enum_name,
            is_bitfield,
        } => {
            let mut line = format!("- **`{name}`** = `{value}`");
            if let Some(e) = enum_name {
                let qualified = if e.contains('.') {
                    e.clone()
                } else {
                    format!("{class_name}.{e}")
                };
                let url = links::enum_url(&ctx.docs_url, &qualified);
                let flag = if *is_bitfield {
                    format!(", *{}*", ctx.label("Bitfield"))
                } else {
                    String::new()
                };
                line.push_str(&format!(" ([`{e}`]({url}){flag})"));
            }
            line
        }
        MemberDetail::ThemeItem {
            data_type,
            type_name,
            default,
        } => {
            let link = links::type_link(&ctx.docs_url, type_name, None);
            let mut line = format!("- **`{name}`** ({data_type}): {link}");
            if let Some(d) = default {
                line.push_str(&format!(" = `{d}`"));
            }
            line
        }
        _ => format!("- **`{name}`**"),
    };
    out.push_str(&line);
    out.push_str("\n\n");

    if matches!(member.detail, MemberDetail::Signal { .. }) {
        out.push_str(&bbcode::fence("gdscript", &member.signature(), LIST_INDENT));
        out.push_str("\n\n");
    }

    member_body(out, class_name, member, LIST_INDENT, ctx);
}

fn member_body(
    out: &mut String,
    class_name: &str,
    member: &DocMember,
    indent: &str,
    ctx: &mut RenderContext<'_>,
) {
    trace!(
        member = %member.name,
        source = %format!("{}:{}", member.source.class_name, member.source.line),
        "rendering member"
    );
    if let Some(notice) = &member.notice {
        out.push_str(&notice_block(notice, class_name, indent, ctx));
        out.push_str("\n\n");
    }
    if !member.description.trim().is_empty() {
        out.push_str(&ctx.rich(&member.description, class_name, indent));
        out.push_str("\n\n");
    }
}

/// Blockquote with the localized notice label and its explanation.
fn notice_block(notice: &Notice, class_name: &str, indent: &str, ctx: &mut RenderContext<'_>) -> String {
    let prefix = format!("{indent}> ");
    let label = ctx.label(notice.label());
    let mut block = format!("{prefix}**{label}**");
    if !notice.text().trim().is_empty() {
        let body = ctx.rich(notice.text(), class_name, &prefix);
        block.push_str(&format!("\n{}\n{body}", prefix.trim_end()));
    }
    block
}

// ---------------------------------------------------------------------------
// Frontmatter
// ---------------------------------------------------------------------------

/// Build a YAML frontmatter block.
fn build_frontmatter(class: &ClassDoc, lang: &str) -> String {
    let mut fm = String::from("---\n");
    fm.push_str(&format!("title: \"{}\"\n", escape_yaml_string(&class.name)));
    fm.push_str(&format!("lang: \"{}\"\n", escape_yaml_string(lang)));
    if let Some(parent) = &class.inherits {
        fm.push_str(&format!("inherits: \"{}\"\n", escape_yaml_string(parent)));
    }
    fm.push_str("---\n");
    fm
}

/// Escape special characters in a YAML string value.
fn escape_yaml_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
