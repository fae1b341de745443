//! Flat-file import pipeline
//!
//! An import opens every file named by the format's layout, creates one
//! table per file in a scratch store, streams the records in with batched
//! INSERTs and finally registers the store under a newly allocated key.
//! Failures before registration leave nothing behind.

pub mod dates;
pub mod flatfile;
mod importer;
mod source;
pub mod spec;

pub use importer::{ImportEvent, ImportOutcome, ImportRequest, Importer, TableSummary};
pub use source::ImportSource;
pub use spec::{format_spec, FieldNames, FieldSpec, FileSpec, FormatSpec};
