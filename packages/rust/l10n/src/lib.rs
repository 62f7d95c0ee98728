//! Localization for classref: PO catalog loading, fuzzy matching, and the
//! ordered resolver chain used by the renderer.
//!
//! Lookup precedence for every string is fixed:
//! override table → exact catalog hit → fuzzy catalog hit → pass-through.

pub mod catalog;
pub mod normalize;
pub mod resolver;
pub mod similarity;

pub use catalog::{CatalogEntry, Translation, TranslationCatalog};
pub use normalize::normalize_for_matching;
pub use resolver::{Localizer, LookupStats, Outcome, Resolved, resolve};
