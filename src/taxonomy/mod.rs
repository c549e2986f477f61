//! Failure taxonomy: categories, severities, kinds, codes and the metadata
//! registry that ties them together.
//!
//! ## Organization
//! - `category` - [`ErrorCategory`] and [`ErrorSeverity`]
//! - `kind` - [`FailureKind`] and its is-a hierarchy
//! - `codes` - well-known code constants
//! - `registry` - [`ErrorCodeRegistry`] and the built-in table
//! - `failure` - the [`Failure`] value and its builder
//! - `classify` - boundary classification of foreign errors

pub mod category;
pub mod classify;
pub mod codes;
pub mod failure;
pub mod kind;
pub mod registry;

pub use category::{ErrorCategory, ErrorSeverity};
pub use classify::{classify, classify_io, classify_message, is_transient_message};
pub use failure::{
    Cause, CauseRecord, ContextBag, Failure, FailureBuilder, FailureChain, FailureRecord,
    FailureResult, RootCause,
};
pub use kind::FailureKind;
pub use registry::{builtin_entries, ErrorCodeMetadata, ErrorCodeRegistry};
