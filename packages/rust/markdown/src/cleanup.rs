//! Post-render cleanup of a class page.
//!
//! The page is split into lines tagged as prose, fence markers or fenced
//! code. Passes edit prose only; fenced code comes out byte-for-byte.

use std::sync::LazyLock;

use regex::Regex;

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#\s+(.+)$").expect("valid regex"));

/// Clean a rendered page: one title, no trailing blanks on prose lines,
/// no blank-line runs, a single final newline.
pub(crate) fn run_pipeline(md: &str) -> String {
    let mut lines = classify(md);
    demote_extra_titles(&mut lines);
    trim_line_ends(&mut lines);
    collapse_blank_runs(&mut lines);
    join_page(&lines)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Prose,
    Fence,
    Code,
}

struct Line {
    text: String,
    kind: LineKind,
}

/// Backtick count of a fence marker line, allowing list and quote prefixes.
fn fence_len(line: &str) -> Option<usize> {
    let rest = line.trim_start_matches([' ', '\t', '>']);
    let ticks = rest.len() - rest.trim_start_matches('`').len();
    (ticks >= 3).then_some(ticks)
}

/// A fence closes only on a bare marker at least as long as its opener.
fn closes_fence(line: &str, open: usize) -> bool {
    fence_len(line).is_some_and(|ticks| {
        ticks >= open && line.trim_start_matches([' ', '\t', '>'])[ticks..].trim().is_empty()
    })
}

fn classify(md: &str) -> Vec<Line> {
    let mut open_fence: Option<usize> = None;
    md.lines()
        .map(|text| {
            let kind = match open_fence {
                Some(open) if closes_fence(text, open) => {
                    open_fence = None;
                    LineKind::Fence
                }
                Some(_) => LineKind::Code,
                None => match fence_len(text) {
                    Some(ticks) => {
                        open_fence = Some(ticks);
                        LineKind::Fence
                    }
                    None => LineKind::Prose,
                },
            };
            Line {
                text: text.to_string(),
                kind,
            }
        })
        .collect()
}

/// Keep the first `# ` heading; later ones become `## `.
fn demote_extra_titles(lines: &mut [Line]) {
    let mut seen_title = false;
    for line in lines.iter_mut().filter(|l| l.kind == LineKind::Prose) {
        let Some(caps) = TITLE_RE.captures(&line.text) else {
            continue;
        };
        if seen_title {
            line.text = format!("## {}", &caps[1]);
        }
        seen_title = true;
    }
}

fn trim_line_ends(lines: &mut [Line]) {
    for line in lines.iter_mut().filter(|l| l.kind != LineKind::Code) {
        let end = line.text.trim_end().len();
        line.text.truncate(end);
    }
}

/// Drop every blank prose line that follows another blank prose line.
fn collapse_blank_runs(lines: &mut Vec<Line>) {
    let mut previous_blank = false;
    lines.retain(|line| {
        if line.kind != LineKind::Prose {
            previous_blank = false;
            return true;
        }
        let blank = line.text.trim().is_empty();
        let keep = !(blank && previous_blank);
        previous_blank = blank;
        keep
    });
}

fn join_page(lines: &[Line]) -> String {
    let mut page = lines
        .iter()
        .map(|l| l.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let end = page.trim_end_matches('\n').len();
    page.truncate(end);
    page.push('\n');
    page
}
