//! qdiag-store: simulation log access for qdiag
//!
//! Loads the JSON logs written by the controller simulation into a uniform
//! table of named numeric sequences.
//!
//! ## Layer 0 - Data
//!
//! Focus: tolerant reading. A missing file or a malformed document is an
//! error; a missing field is not.
//!
//! ## Key Components
//!
//! - `LogStore`: one document with lazy, cached field conversion
//! - `FieldSource`: the seam between the store and the parsed document
//! - `LogSet`: conventional before/training/after log locations
//! - `fields`: the field-name catalogue

mod error;
pub mod fakes;
pub mod fields;
mod log_set;
pub mod source;
mod store;

pub use error::StoreError;
pub use fields::FieldGroup;
pub use log_set::{LogKind, LogSet};
pub use source::{ContentDigest, FieldSource, JsonDocument};
pub use store::{LogStore, LogSummary, Series};

/// Result type for qdiag-store operations
pub type Result<T> = std::result::Result<T, StoreError>;
