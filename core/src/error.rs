//! Error types for models and collections.
//!
//! # Design
//! Entity-level and collection-level transport failures are separate enums so
//! callers can tell a failed `save` from a failed list fetch. Validation
//! problems are not errors in the `Result` sense: `Model::set` and
//! `Model::save` report them through their return value and
//! `Model::validation_error`.

use std::collections::BTreeMap;

/// The transport could not produce a response at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("transport error: {message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors returned by `Model::sync` and the operations built on it.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The server answered with a non-2xx status.
    #[error("Sync failed: {status_text}")]
    Status { status: u16, status_text: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The request body could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A success response carried a body that is not valid JSON.
    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

/// Errors returned by `Collection::fetch`.
#[derive(Debug, thiserror::Error)]
pub enum CollectionFetchError {
    /// The server answered with a non-2xx status.
    #[error("Collection fetch failed: {status_text}")]
    Status { status: u16, status_text: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The success body is not valid JSON.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The success body is JSON but not an array of objects.
    #[error("unexpected collection body: {0}")]
    UnexpectedBody(String),
}

/// A locally detected validation failure.
///
/// Carries a human-readable message plus optional per-field details.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
    pub details: BTreeMap<String, String>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: BTreeMap::new(),
        }
    }

    /// Attach a per-field detail.
    pub fn with_detail(mut self, field: impl Into<String>, detail: impl Into<String>) -> Self {
        self.details.insert(field.into(), detail.into());
        self
    }
}
