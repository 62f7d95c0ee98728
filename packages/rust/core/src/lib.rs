//! Batch orchestration for classref.
//!
//! Ties together the XML loader, the localizer and the Markdown renderer
//! into the directory-to-directory conversion run.

pub mod batch;
pub mod hierarchy;

pub use batch::{BatchSummary, Converter, FileError, ProgressReporter, SilentProgress, run};
pub use hierarchy::ClassHierarchy;
