//! BBCode description text → Markdown.
//!
//! Code blocks are lifted out first and emitted verbatim, only prefixed with
//! the nesting indent. Prose lines lose their XML indentation and become
//! paragraphs; inline tags and cross-references are rewritten per line.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use url::Url;

use crate::links;

const BLOCK_MARK: char = '\u{1}';
const SPAN_MARK: char = '\u{2}';
const LB_MARK: char = '\u{3}';
const RB_MARK: char = '\u{4}';

/// Language used when a code block does not name one.
const DEFAULT_CODE_LANG: &str = "gdscript";

/// Resolution scope for cross-references in one class page.
#[derive(Debug, Clone, Copy)]
pub struct LinkScope<'a> {
    pub base: &'a Url,
    pub class_name: &'a str,
}

#[derive(Debug)]
struct CodeBlock {
    lang: String,
    body: String,
}

/// Convert BBCode `text` to Markdown, prefixing every line with `indent`.
pub fn to_markdown(text: &str, scope: &LinkScope<'_>, indent: &str) -> String {
    let mut blocks = Vec::new();
    let text = extract_code_blocks(text, &mut blocks);
    let mut spans = Vec::new();
    let text = protect_inline_code(&text, &mut spans);

    let mut segments: Vec<String> = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(idx) = placeholder_index(line, BLOCK_MARK) {
            if let Some(block) = blocks.get(idx) {
                segments.push(fence(&block.lang, &block.body, indent));
            }
            continue;
        }
        let prose = restore_spans(&convert_inline(line, scope), &spans);
        segments.push(format!("{indent}{prose}"));
    }

    let separator = format!("\n{}\n", indent.trim_end());
    segments.join(&separator)
}

/// Fenced code block. Every body line gets `indent`, blank lines included.
/// The fence is longer than any backtick run in the body.
pub fn fence(lang: &str, body: &str, indent: &str) -> String {
    let ticks = "`".repeat(longest_backtick_run(body).max(2) + 1);
    let mut out = format!("{indent}{ticks}{lang}\n");
    for line in body.split('\n') {
        out.push_str(indent);
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(indent);
    out.push_str(&ticks);
    out
}

fn longest_backtick_run(text: &str) -> usize {
    text.split(|c| c != '`').map(str::len).max().unwrap_or(0)
}

/// Carry the code blocks of `source` over into its translation.
///
/// Blocks in `translated` are replaced, in order, by the source blocks;
/// surplus translated blocks are dropped and source blocks without a
/// counterpart are appended. Code therefore always comes from the source.
pub fn keep_source_code(source: &str, translated: &str) -> String {
    static ANY_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)\[codeblocks\].*?\[/codeblocks\]|\[codeblock(?:\s[^\]]*)?\].*?\[/codeblock\]")
            .expect("valid regex")
    });

    let source_blocks: Vec<&str> = ANY_BLOCK_RE.find_iter(source).map(|m| m.as_str()).collect();
    let mut next = 0;
    let mut out = ANY_BLOCK_RE
        .replace_all(translated, |_: &Captures| {
            let block = source_blocks.get(next).copied().unwrap_or_default();
            next += 1;
            block.to_string()
        })
        .into_owned();
    for block in source_blocks.iter().skip(next) {
        out.push('\n');
        out.push_str(block);
    }
    out
}

/// Expand `$DOCS_URL` to the base URL without its trailing slash.
pub fn expand_docs_url(text: &str, base: &Url) -> String {
    text.replace("$DOCS_URL", base.as_str().trim_end_matches('/'))
}

// ---------------------------------------------------------------------------
// Code blocks
// ---------------------------------------------------------------------------

fn extract_code_blocks(text: &str, blocks: &mut Vec<CodeBlock>) -> String {
    static MULTI_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)\[codeblocks\](.*?)\[/codeblocks\]").expect("valid regex")
    });
    static VARIANT_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)\[(gdscript|csharp)(?:\s[^\]]*)?\](.*?)\[/(?:gdscript|csharp)\]")
            .expect("valid regex")
    });
    static SINGLE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)\[codeblock(?:\s+([^\]]*))?\](.*?)\[/codeblock\]").expect("valid regex")
    });
    static LANG_ATTR_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"lang=(\w+)").expect("valid regex"));

    let text = MULTI_RE.replace_all(text, |caps: &Captures| {
        let mut marks = String::new();
        for variant in VARIANT_RE.captures_iter(&caps[1]) {
            marks.push_str(&push_block(blocks, &variant[1], &variant[2]));
        }
        marks
    });

    SINGLE_RE
        .replace_all(&text, |caps: &Captures| {
            let lang = caps
                .get(1)
                .and_then(|attrs| LANG_ATTR_RE.captures(attrs.as_str()))
                .map(|c| c[1].to_string())
                .unwrap_or_else(|| DEFAULT_CODE_LANG.to_string());
            push_block(blocks, &lang, &caps[2])
        })
        .into_owned()
}

/// Store a block and return its placeholder line.
fn push_block(blocks: &mut Vec<CodeBlock>, lang: &str, raw: &str) -> String {
    let idx = blocks.len();
    blocks.push(CodeBlock {
        lang: lang.to_string(),
        body: trim_block_body(raw),
    });
    format!("\n{BLOCK_MARK}{idx}{BLOCK_MARK}\n")
}

/// Drop the newline after the opening tag and a trailing whitespace-only
/// line before the closing tag. Everything else is kept byte for byte.
fn trim_block_body(raw: &str) -> String {
    let body = raw
        .strip_prefix("\r\n")
        .or_else(|| raw.strip_prefix('\n'))
        .unwrap_or(raw);
    match body.rfind('\n') {
        Some(pos) if body[pos + 1..].trim().is_empty() => {
            body[..pos].trim_end_matches('\r').to_string()
        }
        None if body.trim().is_empty() => String::new(),
        _ => body.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Inline code spans
// ---------------------------------------------------------------------------

fn protect_inline_code(text: &str, spans: &mut Vec<String>) -> String {
    static CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\[(code|kbd)\](.*?)\[/(?:code|kbd)\]").expect("valid regex")
    });

    CODE_RE
        .replace_all(text, |caps: &Captures| {
            let content = caps[2].replace("[lb]", "[").replace("[rb]", "]");
            let rendered = if &caps[1] == "kbd" {
                format!("<kbd>{content}</kbd>")
            } else {
                code_span(&content)
            };
            let idx = spans.len();
            spans.push(rendered);
            format!("{SPAN_MARK}{idx}{SPAN_MARK}")
        })
        .into_owned()
}

fn code_span(content: &str) -> String {
    if content.contains('`') {
        format!("`` {content} ``")
    } else {
        format!("`{content}`")
    }
}

fn restore_spans(line: &str, spans: &[String]) -> String {
    static SPAN_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new("\u{2}(\\d+)\u{2}").expect("valid regex"));

    SPAN_RE
        .replace_all(line, |caps: &Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|i| spans.get(i))
                .cloned()
                .unwrap_or_default()
        })
        .into_owned()
}

fn placeholder_index(line: &str, mark: char) -> Option<usize> {
    line.strip_prefix(mark)?.strip_suffix(mark)?.parse().ok()
}

// ---------------------------------------------------------------------------
// Inline tags
// ---------------------------------------------------------------------------

fn convert_inline(line: &str, scope: &LinkScope<'_>) -> String {
    static REF_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"\[(class|method|member|signal|constant|enum|constructor|operator|theme_item|annotation) ([^\]]+)\]",
        )
        .expect("valid regex")
    });
    static BARE_CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\[([A-Z@][A-Za-z0-9_]*|int|float|bool)\]").expect("valid regex")
    });
    static URL_NAMED_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\[url=([^\]]+)\](.*?)\[/url\]").expect("valid regex"));
    static URL_BARE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\[url\](.*?)\[/url\]").expect("valid regex"));
    static PARAM_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\[param ([^\]]+)\]").expect("valid regex"));
    static FORMAT_RES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
        [
            (r"\[b\](.*?)\[/b\]", "**${1}**"),
            (r"\[i\](.*?)\[/i\]", "*${1}*"),
            (r"\[u\](.*?)\[/u\]", "<u>${1}</u>"),
            (r"\[s\](.*?)\[/s\]", "~~${1}~~"),
            (r"\[center\](.*?)\[/center\]", "<center>${1}</center>"),
            (r"\[color=[^\]]*\](.*?)\[/color\]", "${1}"),
            (r"\[font=[^\]]*\](.*?)\[/font\]", "${1}"),
        ]
        .into_iter()
        .map(|(pattern, rep)| (Regex::new(pattern).expect("valid regex"), rep))
        .collect()
    });
    static LEFTOVER_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\[/?(?:b|i|u|s|center|color|font|url|code|kbd)(?:=[^\]]*)?\]")
            .expect("valid regex")
    });
    // `[b]Note:[/b]` renders as `**Note**:`.
    static COLON_EMPHASIS_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"([:：])\[/(b|i)\]").expect("valid regex"));

    let mut out = line.replace("[lb]", &LB_MARK.to_string()).replace("[rb]", &RB_MARK.to_string());
    out = expand_docs_url(&out, scope.base);

    out = BARE_CLASS_RE
        .replace_all(&out, |caps: &Captures| links::class_link(scope.base, &caps[1]))
        .into_owned();
    out = REF_RE
        .replace_all(&out, |caps: &Captures| reference_link(&caps[1], caps[2].trim(), scope))
        .into_owned();

    out = URL_NAMED_RE.replace_all(&out, "[${2}](${1})").into_owned();
    out = URL_BARE_RE.replace_all(&out, "<${1}>").into_owned();
    out = PARAM_RE.replace_all(&out, "`${1}`").into_owned();
    out = out.replace("[br]", "<br>");
    out = COLON_EMPHASIS_RE.replace_all(&out, "[/${2}]${1}").into_owned();
    for (re, rep) in FORMAT_RES.iter() {
        out = re.replace_all(&out, *rep).into_owned();
    }
    out = LEFTOVER_RE.replace_all(&out, "").into_owned();

    out.replace(LB_MARK, "\\[").replace(RB_MARK, "\\]")
}

/// Markdown link for `[kind target]`.
fn reference_link(kind: &str, target: &str, scope: &LinkScope<'_>) -> String {
    let base = scope.base;
    if kind == "class" {
        return links::class_link(base, target);
    }

    let (class, name) = target
        .split_once('.')
        .unwrap_or((scope.class_name, target));

    let url = match kind {
        "enum" => links::enum_url(base, &format!("{class}.{name}")),
        _ => links::member_url(base, class, anchor_tag(kind), name),
    };
    let display = match kind {
        "method" | "constructor" => format!("{target}()"),
        _ => target.to_string(),
    };
    format!("[`{display}`]({url})")
}

fn anchor_tag(kind: &str) -> &str {
    match kind {
        "member" => "property",
        "theme_item" => "theme-item",
        other => other,
    }
}
