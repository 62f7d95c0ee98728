//! Cross-reference link targets.
//!
//! Every target is a pure function of the documentation base URL and the
//! symbol name: class pages live at `classes/class_<slug>.html`, members are
//! fragments `#class-<class>-<kind>-<member>`, enums `#enum-<class>-<enum>`.

use url::Url;

/// Class that owns global enums and constants.
const GLOBAL_SCOPE: &str = "@GlobalScope";

/// Types that never get a link.
const UNLINKED_TYPES: &[&str] = &["void", ""];

/// File-name slug of a class page: lowercase, generic suffix dropped.
pub fn class_slug(class: &str) -> String {
    let base = class.split('[').next().unwrap_or(class);
    base.trim().to_lowercase()
}

/// Fragment-safe slug: lowercase ASCII alphanumerics separated by single dashes.
pub fn anchor_slug(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// URL of a class page.
pub fn class_url(base: &Url, class: &str) -> String {
    let path = format!("classes/class_{}.html", class_slug(class));
    base.join(&path)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| format!("{base}{path}"))
}

/// URL of a member anchor on a class page. `kind` is an anchor tag such as
/// `method` or `theme-item`.
pub fn member_url(base: &Url, class: &str, kind: &str, member: &str) -> String {
    let fragment = format!("class-{}-{kind}-{}", anchor_slug(class), anchor_slug(member));
    with_fragment(&class_url(base, class), &fragment)
}

/// URL of an enum anchor. `qualified` is `Class.Enum` or a bare global enum.
pub fn enum_url(base: &Url, qualified: &str) -> String {
    let (class, name) = qualified.split_once('.').unwrap_or((GLOBAL_SCOPE, qualified));
    let fragment = format!("enum-{}-{}", anchor_slug(class), anchor_slug(name));
    with_fragment(&class_url(base, class), &fragment)
}

fn with_fragment(url: &str, fragment: &str) -> String {
    match Url::parse(url) {
        Ok(mut u) => {
            u.set_fragment(Some(fragment));
            u.to_string()
        }
        Err(_) => format!("{url}#{fragment}"),
    }
}

/// Markdown link for a class name.
pub fn class_link(base: &Url, class: &str) -> String {
    format!("[{class}]({})", class_url(base, class))
}

/// Markdown for a type reference: enum link, class link, or plain code.
pub fn type_link(base: &Url, type_name: &str, enum_name: Option<&str>) -> String {
    if let Some(e) = enum_name {
        return format!("[`{e}`]({})", enum_url(base, e));
    }
    if UNLINKED_TYPES.contains(&type_name) {
        return format!("`{type_name}`");
    }
    format!("[`{type_name}`]({})", class_url(base, type_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://docs.godotengine.org/en/stable/").unwrap()
    }

    #[test]
    fn class_url_lowercases() {
        assert_eq!(
            class_url(&base(), "Node2D"),
            "https://docs.godotengine.org/en/stable/classes/class_node2d.html"
        );
        assert_eq!(
            class_url(&base(), "@GlobalScope"),
            "https://docs.godotengine.org/en/stable/classes/class_@globalscope.html"
        );
    }

    #[test]
    fn member_url_builds_anchor() {
        assert_eq!(
            member_url(&base(), "Node", "method", "add_child"),
            "https://docs.godotengine.org/en/stable/classes/class_node.html#class-node-method-add-child"
        );
        assert_eq!(
            member_url(&base(), "Control", "theme-item", "font_color"),
            "https://docs.godotengine.org/en/stable/classes/class_control.html#class-control-theme-item-font-color"
        );
    }

    #[test]
    fn enum_url_defaults_to_global_scope() {
        assert_eq!(
            enum_url(&base(), "Node.ProcessMode"),
            "https://docs.godotengine.org/en/stable/classes/class_node.html#enum-node-processmode"
        );
        assert!(enum_url(&base(), "Error").contains("class_@globalscope.html#enum-globalscope-error"));
    }

    #[test]
    fn typed_arrays_link_to_base_class() {
        assert!(type_link(&base(), "Array[Node]", None).ends_with("class_array.html)"));
        assert_eq!(type_link(&base(), "void", None), "`void`");
    }

    #[test]
    fn links_are_pure() {
        assert_eq!(class_link(&base(), "Timer"), class_link(&base(), "Timer"));
        assert_eq!(anchor_slug("operator =="), "operator");
        assert_eq!(anchor_slug("Vector2__x"), "vector2-x");
    }
}
