//! Text normalization shared by catalog indexing and lookups.

use std::sync::LazyLock;

use regex::Regex;

static CODEBLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[codeblock[^\]]*\].*?\[/codeblock\]").expect("valid regex"));

static CODEBLOCKS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[codeblocks\].*?\[/codeblocks\]").expect("valid regex"));

static INLINE_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[code\].*?\[/code\]").expect("valid regex"));

/// Bare formatting tags such as `[b]`, `[/i]`, `[br]`. Tags with arguments
/// (`[method foo]`) are kept.
static SIMPLE_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[/?[a-z]+\]").expect("valid regex"));

/// Reduce a BBCode string to the form used for similarity scoring: code
/// removed, simple tags stripped, whitespace collapsed to single spaces.
pub fn normalize_for_matching(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let text = strip_code_blocks(text);
    let text = INLINE_CODE_RE.replace_all(&text, "");
    let text = SIMPLE_TAG_RE.replace_all(&text, "");

    collapse_whitespace(&text)
}

/// Key for exact catalog lookups. Like [`normalize_for_matching`] but the
/// contents of `[code]` spans are kept, so strings that differ only in
/// inline code never share a key. Code blocks are still dropped; rendered
/// pages always take their code blocks from the source text.
pub fn normalize_for_lookup(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let text = strip_code_blocks(text);
    let text = SIMPLE_TAG_RE.replace_all(&text, "");

    collapse_whitespace(&text)
}

fn strip_code_blocks(text: &str) -> String {
    let text = CODEBLOCK_RE.replace_all(text, "");
    CODEBLOCKS_RE.replace_all(&text, "").into_owned()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_whitespace_and_indentation() {
        let xml_text = "\n\t\tAdds a child node.\n\t\tNodes can have any number.\n\t";
        assert_eq!(
            normalize_for_matching(xml_text),
            "Adds a child node. Nodes can have any number."
        );
    }

    #[test]
    fn strips_code_and_simple_tags() {
        let text = "Returns [b]true[/b] if [code]x[/code] is set.[codeblock]\nprint(x)\n[/codeblock]";
        assert_eq!(normalize_for_matching(text), "Returns true if is set.");
    }

    #[test]
    fn keeps_reference_tags() {
        let text = "See [method add_child] and [Node].";
        assert_eq!(normalize_for_matching(text), text);
    }

    #[test]
    fn removes_multi_language_blocks() {
        let text = "Example:\n[codeblocks]\n[gdscript]\nvar a = 1\n[/gdscript]\n[/codeblocks]\nDone.";
        assert_eq!(normalize_for_matching(text), "Example: Done.");
    }

    #[test]
    fn lookup_key_keeps_inline_code() {
        let text = "Returns [code]true[/code] if [b]visible[/b].\n[codeblock]\nprint(x)\n[/codeblock]";
        assert_eq!(normalize_for_lookup(text), "Returns true if visible.");
        assert_ne!(
            normalize_for_lookup("Returns [code]true[/code]."),
            normalize_for_lookup("Returns [code]false[/code].")
        );
    }
}
