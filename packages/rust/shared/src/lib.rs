//! Shared types, error model, and configuration for classref.
//!
//! Every other classref crate depends on this one. It provides:
//! - [`ClassrefError`], the unified error type
//! - The class-reference document model ([`ClassDoc`], [`DocMember`], [`MemberKind`])
//! - Configuration ([`AppConfig`], [`ConvertConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ConvertConfig, DefaultsConfig, Layout, LinksConfig, TranslationConfig,
    config_dir, config_file_path, init_config, lang_slug, load_config, load_config_from,
};
pub use error::{ClassrefError, Result};
pub use types::{
    ClassDoc, DocMember, MemberDetail, MemberKind, Notice, Param, SourceRef, Tutorial, TypeRef,
};
