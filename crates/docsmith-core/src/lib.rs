//! Core types for the docsmith documentation pipeline.
//!
//! This crate holds everything the other crates agree on: the exclusion
//! filter applied to both ingestion and Merkle computation, the progress
//! event model carried over SSE, the documentation status model, the shared
//! repository/file/document records, the error taxonomy, and runtime
//! configuration.

pub mod config;
pub mod error;
pub mod events;
pub mod filter;
pub mod status;
pub mod types;

pub use config::Config;
pub use error::DocsmithError;
pub use events::{DocumentPayload, ProgressEvent, ProgressEventKind};
pub use filter::ExclusionFilter;
pub use status::{clamp_progress, DocStatus, StatusRecord};
pub use types::{
    doc_path_for_source, ChangeKind, ChangedFile, RepoDocument, RepoFileRecord, RepoRef,
    Repository, MAX_FILE_SIZE,
};
