//! Application configuration for classref.
//!
//! User config lives at `~/.classref/classref.toml` unless `--config` points
//! elsewhere. CLI flags override config file values, which override defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ClassrefError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "classref.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".classref";

/// Placeholder in `links.docs_url` replaced by the language slug.
const LANG_PLACEHOLDER: &str = "{lang}";

// ---------------------------------------------------------------------------
// Config structs (matching classref.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Catalog and fuzzy-matching settings.
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Cross-reference link settings.
    #[serde(default)]
    pub links: LinksConfig,

    /// Literal string overrides, checked before the catalog.
    #[serde(default)]
    pub strings: BTreeMap<String, String>,
}

/// Output file layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// Every `<ClassName>.md` directly in the output directory.
    #[default]
    Flat,
    /// Files nested in directories following the inheritance chain.
    Hierarchy,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Target language code (e.g. `zh_CN`).
    #[serde(default = "default_lang")]
    pub lang: String,

    /// Directory of class-reference XML files.
    #[serde(default = "default_input_dir")]
    pub input_dir: String,

    /// Directory receiving the Markdown files.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// File names (`Node.xml`) or class names (`Node`) to skip.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Output file layout.
    #[serde(default)]
    pub layout: Layout,

    /// Maximum files rendered at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Prepend YAML frontmatter to each file.
    #[serde(default)]
    pub frontmatter: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            lang: default_lang(),
            input_dir: default_input_dir(),
            output_dir: default_output_dir(),
            exclude: Vec::new(),
            layout: Layout::default(),
            concurrency: default_concurrency(),
            frontmatter: false,
        }
    }
}

fn default_lang() -> String {
    "en".into()
}
fn default_input_dir() -> String {
    "doc/classes".into()
}
fn default_output_dir() -> String {
    "translated_markdown".into()
}
fn default_concurrency() -> usize {
    4
}

/// `[translation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    /// PO catalog path. No catalog disables catalog lookups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,

    /// Minimum similarity score for a fuzzy catalog hit, in [0, 1].
    #[serde(default = "default_threshold")]
    pub similarity_threshold: f64,

    /// Keep entries flagged `#, fuzzy` in the catalog.
    #[serde(default = "default_true")]
    pub use_fuzzy_entries: bool,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            catalog: None,
            similarity_threshold: default_threshold(),
            use_fuzzy_entries: true,
        }
    }
}

fn default_threshold() -> f64 {
    0.7
}
fn default_true() -> bool {
    true
}

/// `[links]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinksConfig {
    /// Documentation base URL; `{lang}` expands to the language slug.
    #[serde(default = "default_docs_url")]
    pub docs_url: String,
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            docs_url: default_docs_url(),
        }
    }
}

fn default_docs_url() -> String {
    "https://docs.godotengine.org/{lang}/stable".into()
}

// ---------------------------------------------------------------------------
// Convert config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime conversion configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct ConvertConfig {
    /// Target language code.
    pub lang: String,
    /// Directory of class-reference XML files.
    pub input_dir: PathBuf,
    /// Directory receiving the Markdown files.
    pub output_dir: PathBuf,
    /// File or class names to skip.
    pub exclude: Vec<String>,
    /// Output file layout.
    pub layout: Layout,
    /// Maximum files rendered at once.
    pub concurrency: usize,
    /// Prepend YAML frontmatter.
    pub frontmatter: bool,
    /// PO catalog path, if any.
    pub catalog: Option<PathBuf>,
    /// Fuzzy match threshold.
    pub similarity_threshold: f64,
    /// Keep `#, fuzzy` catalog entries.
    pub use_fuzzy_entries: bool,
    /// Documentation base URL template.
    pub docs_url: String,
    /// Literal string overrides.
    pub strings: BTreeMap<String, String>,
}

impl From<&AppConfig> for ConvertConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            lang: config.defaults.lang.clone(),
            input_dir: PathBuf::from(&config.defaults.input_dir),
            output_dir: PathBuf::from(&config.defaults.output_dir),
            exclude: config.defaults.exclude.clone(),
            layout: config.defaults.layout,
            concurrency: config.defaults.concurrency,
            frontmatter: config.defaults.frontmatter,
            catalog: config.translation.catalog.as_ref().map(PathBuf::from),
            similarity_threshold: config.translation.similarity_threshold,
            use_fuzzy_entries: config.translation.use_fuzzy_entries,
            docs_url: config.links.docs_url.clone(),
            strings: config.strings.clone(),
        }
    }
}

impl ConvertConfig {
    /// Check value ranges and that the docs URL resolves.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(ClassrefError::validation(format!(
                "similarity_threshold must be within [0, 1], got {}",
                self.similarity_threshold
            )));
        }
        if self.concurrency == 0 {
            return Err(ClassrefError::validation("concurrency must be at least 1"));
        }
        if self.lang.trim().is_empty() {
            return Err(ClassrefError::validation("lang must not be empty"));
        }
        self.docs_base_url()?;
        Ok(())
    }

    /// Expand `{lang}` in the docs URL template and parse it.
    ///
    /// The returned URL always ends with `/` so relative joins append to it.
    pub fn docs_base_url(&self) -> Result<Url> {
        let expanded = self.docs_url.replace(LANG_PLACEHOLDER, &lang_slug(&self.lang));
        let with_slash = if expanded.ends_with('/') {
            expanded
        } else {
            format!("{expanded}/")
        };
        Url::parse(&with_slash).map_err(|e| {
            ClassrefError::validation(format!("invalid docs_url '{}': {e}", self.docs_url))
        })
    }

    /// Whether `file_name` (e.g. `Node.xml`) is on the exclude list,
    /// either by full file name or by stem.
    pub fn is_excluded(&self, file_name: &str) -> bool {
        let stem = file_name.strip_suffix(".xml").unwrap_or(file_name);
        self.exclude.iter().any(|e| e == file_name || e == stem)
    }
}

/// URL slug for a language code: `zh_CN` → `zh-cn`.
pub fn lang_slug(lang: &str) -> String {
    lang.trim().to_lowercase().replace('_', "-")
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.classref/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ClassrefError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.classref/classref.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ClassrefError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| ClassrefError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ClassrefError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ClassrefError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ClassrefError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("similarity_threshold"));
        assert!(toml_str.contains("docs.godotengine.org"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.concurrency, 4);
        assert_eq!(parsed.translation.similarity_threshold, 0.7);
        assert_eq!(parsed.defaults.layout, Layout::Flat);
    }

    #[test]
    fn config_with_strings_and_catalog() {
        let toml_str = r#"
[defaults]
lang = "zh_CN"
exclude = ["Node.xml", "Object"]
layout = "hierarchy"

[translation]
catalog = "godot.zh_Hans.po"
similarity_threshold = 0.85

[strings]
"Description" = "详细描述"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.layout, Layout::Hierarchy);
        assert_eq!(config.strings.get("Description").map(String::as_str), Some("详细描述"));
        assert_eq!(config.translation.catalog.as_deref(), Some("godot.zh_Hans.po"));

        let convert = ConvertConfig::from(&config);
        assert_eq!(convert.similarity_threshold, 0.85);
        assert!(convert.use_fuzzy_entries);
        assert!(convert.is_excluded("Node.xml"));
        assert!(convert.is_excluded("Object.xml"));
        assert!(!convert.is_excluded("Node2D.xml"));
    }

    #[test]
    fn docs_url_expands_lang() {
        let mut config = ConvertConfig::from(&AppConfig::default());
        config.lang = "zh_CN".into();
        let url = config.docs_base_url().unwrap();
        assert_eq!(url.as_str(), "https://docs.godotengine.org/zh-cn/stable/");
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = ConvertConfig::from(&AppConfig::default());
        assert!(config.validate().is_ok());

        config.similarity_threshold = 1.5;
        assert!(config.validate().is_err());

        config.similarity_threshold = 0.5;
        config.concurrency = 0;
        assert!(config.validate().is_err());

        config.concurrency = 1;
        config.docs_url = "not a url".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("invalid docs_url"));
    }

    #[test]
    fn lang_slug_lowercases() {
        assert_eq!(lang_slug("zh_CN"), "zh-cn");
        assert_eq!(lang_slug("en"), "en");
    }
}
