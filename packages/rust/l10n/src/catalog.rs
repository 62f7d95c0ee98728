//! PO translation catalog with exact-match indexes and a pre-computed
//! fuzzy-match index.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info, instrument, warn};

use classref_shared::{ClassrefError, Result};

use crate::normalize::{normalize_for_lookup, normalize_for_matching};
use crate::similarity::{CharCounts, char_counts};

/// One translated catalog message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Source string (`msgid`).
    pub source: String,
    /// Translated string (`msgstr`).
    pub translation: String,
    /// Entry carried the `#, fuzzy` flag.
    pub is_fuzzy: bool,
}

/// A catalog hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Translation<'c> {
    /// Translated text as stored in the catalog.
    pub text: &'c str,
    /// The PO entry was flagged fuzzy.
    pub is_fuzzy_entry: bool,
    /// Similarity of the match; `1.0` for exact hits.
    pub score: f64,
}

/// Normalized form of a catalog source, prepared for similarity scans.
#[derive(Debug, Clone)]
pub(crate) struct FuzzyKey {
    pub(crate) chars: Vec<char>,
    pub(crate) counts: CharCounts,
}

/// Immutable source → translation mapping for one run.
#[derive(Debug, Clone, Default)]
pub struct TranslationCatalog {
    entries: Vec<CatalogEntry>,
    fuzzy_keys: Vec<FuzzyKey>,
    by_source: HashMap<String, usize>,
    by_normalized: HashMap<String, usize>,
}

impl TranslationCatalog {
    /// Load a PO file.
    ///
    /// The header, untranslated entries and plural entries are skipped.
    /// Entries flagged fuzzy are kept unless `use_fuzzy_entries` is false.
    /// Header fields are never read, so a minimal or missing header is fine.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path, use_fuzzy_entries: bool) -> Result<Self> {
        if !path.is_file() {
            return Err(ClassrefError::catalog(path, "file not found"));
        }
        let text =
            std::fs::read_to_string(path).map_err(|e| ClassrefError::catalog(path, e.to_string()))?;

        let catalog = parse_po(path, &with_standard_header(&text))?;

        let mut skipped = 0usize;
        let mut entries = Vec::new();
        for message in catalog.messages() {
            if message.is_plural() || message.msgid().is_empty() {
                skipped += 1;
                continue;
            }
            let Ok(msgstr) = message.msgstr() else {
                skipped += 1;
                continue;
            };
            if msgstr.is_empty() || (message.is_fuzzy() && !use_fuzzy_entries) {
                skipped += 1;
                continue;
            }
            entries.push(CatalogEntry {
                source: message.msgid().to_string(),
                translation: msgstr.to_string(),
                is_fuzzy: message.is_fuzzy(),
            });
        }

        let catalog = Self::from_entries(entries);
        info!(entries = catalog.len(), skipped, "catalog loaded");
        Ok(catalog)
    }

    /// Build a catalog from entries in load order.
    ///
    /// A repeated source keeps its first position and takes the later
    /// translation.
    pub fn from_entries(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        let mut catalog = Self::default();

        for entry in entries {
            if let Some(&idx) = catalog.by_source.get(&entry.source) {
                debug!(source = %truncate(&entry.source), "duplicate msgid, later translation wins");
                catalog.entries[idx] = entry;
                continue;
            }

            let idx = catalog.entries.len();
            let chars: Vec<char> = normalize_for_matching(&entry.source).chars().collect();
            let lookup_key = normalize_for_lookup(&entry.source);

            catalog.by_source.insert(entry.source.clone(), idx);
            catalog.by_source.insert(entry.source.trim().to_string(), idx);
            if !lookup_key.is_empty() {
                catalog.by_normalized.entry(lookup_key).or_insert(idx);
            }
            catalog.fuzzy_keys.push(FuzzyKey {
                counts: char_counts(&chars),
                chars,
            });
            catalog.entries.push(entry);
        }

        catalog
    }

    /// Exact lookup: raw text, then trimmed text, then normalized text.
    pub fn lookup(&self, text: &str) -> Option<Translation<'_>> {
        let idx = self
            .by_source
            .get(text)
            .or_else(|| self.by_source.get(text.trim()))
            .or_else(|| self.by_normalized.get(&normalize_for_lookup(text)))?;
        let entry = &self.entries[*idx];
        Some(Translation {
            text: &entry.translation,
            is_fuzzy_entry: entry.is_fuzzy,
            score: 1.0,
        })
    }

    /// Entries in load order.
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries paired with their fuzzy-match keys, in load order.
    pub(crate) fn indexed(&self) -> impl Iterator<Item = (&CatalogEntry, &FuzzyKey)> {
        self.entries.iter().zip(self.fuzzy_keys.iter())
    }
}

// ---------------------------------------------------------------------------
// PO parsing
// ---------------------------------------------------------------------------

/// Header handed to the PO parser in place of the file's own. The parser
/// requires all of these keys; none of them is used for lookups.
const STANDARD_HEADER: &str = r#"msgid ""
msgstr ""
"Project-Id-Version: classref\n"
"POT-Creation-Date: \n"
"PO-Revision-Date: \n"
"Last-Translator: \n"
"Language-Team: \n"
"MIME-Version: 1.0\n"
"Content-Type: text/plain; charset=UTF-8\n"
"Content-Transfer-Encoding: 8bit\n"
"Language: \n"
"Plural-Forms: nplurals=2; plural=(n != 1);\n"
"#;

/// Replace the header entry of `text` (if any) with [`STANDARD_HEADER`].
fn with_standard_header(text: &str) -> String {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let lines: Vec<&str> = text.lines().collect();

    let mut out = String::with_capacity(text.len() + STANDARD_HEADER.len() + 1);
    out.push_str(STANDARD_HEADER);
    out.push('\n');

    let mut header_seen = false;
    for block in lines.split(|l| l.trim().is_empty()) {
        if !header_seen && is_header_block(block) {
            header_seen = true;
            continue;
        }
        if block.is_empty() {
            continue;
        }
        if block.iter().any(|l| l.starts_with("msg")) {
            header_seen = true;
        }
        for line in block {
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

/// A header entry: `msgid ""` directly followed by `msgstr`.
fn is_header_block(block: &[&str]) -> bool {
    let mut body = block.iter().map(|l| l.trim()).filter(|l| !l.starts_with('#'));
    body.next() == Some(r#"msgid """#) && body.next().is_some_and(|l| l.starts_with("msgstr"))
}

/// Run the PO parser on `text` via a scratch file.
///
/// The parser panics on some malformed lines; a panic becomes a
/// `CatalogLoad` error for `path`.
fn parse_po(path: &Path, text: &str) -> Result<polib::catalog::Catalog> {
    let scratch =
        std::env::temp_dir().join(format!("classref-catalog-{}.po", uuid::Uuid::now_v7()));
    std::fs::write(&scratch, text).map_err(|e| ClassrefError::catalog(path, e.to_string()))?;

    let parsed = std::panic::catch_unwind(|| polib::po_file::parse(&scratch));
    let _ = std::fs::remove_file(&scratch);

    match parsed {
        Ok(Ok(catalog)) => Ok(catalog),
        Ok(Err(e)) => Err(ClassrefError::catalog(path, e.to_string())),
        Err(_) => {
            warn!(path = %path.display(), "PO parser rejected the file");
            Err(ClassrefError::catalog(path, "malformed PO entry"))
        }
    }
}

/// Shorten a string for log output.
pub(crate) fn truncate(text: &str) -> String {
    const MAX: usize = 100;
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(MAX).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
