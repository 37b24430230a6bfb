//! Error types for the storage layer.
//!
//! All store operations return [`StoreError`]. The core coordinator maps
//! these into its own error taxonomy; this crate never decides what a
//! missing record *means* for the business.

/// Errors that can occur in the storage layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The requested record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind (`order`, `delivery`, `courier`).
        entity: &'static str,
        /// The missing identity.
        id: String,
    },

    /// A record with the same identity already exists.
    #[error("{entity} already exists: {id}")]
    AlreadyExists {
        /// Entity kind (`order`, `delivery`, `courier`).
        entity: &'static str,
        /// The duplicated identity.
        id: String,
    },

    /// A stored code has no business-layer equivalent.
    #[error("unknown {kind} code: {code:?}")]
    UnknownCode {
        /// Which translation table rejected the code.
        kind: &'static str,
        /// The offending stored value.
        code: String,
    },

    /// The backing store could not serve the request.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Shorthand for a [`StoreError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shorthand for a [`StoreError::AlreadyExists`].
    pub fn already_exists(entity: &'static str, id: impl ToString) -> Self {
        Self::AlreadyExists {
            entity,
            id: id.to_string(),
        }
    }
}
