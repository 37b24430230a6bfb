//! Error taxonomy of the dispatch core.
//!
//! Every operation the core exposes returns [`DispatchError`]. Errors
//! from collaborators (store, route service) and from the internal
//! building blocks (clock, status engine) are folded into the five
//! business kinds callers act on; store failures that carry no business
//! meaning are kept as [`DispatchError::Storage`].

use dispatch_db::StoreError;

use crate::clock::ClockError;
use crate::config::ConfigError;
use crate::geo::GeoError;
use crate::status::StatusError;

/// Errors surfaced to callers of the core.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// A referenced order, delivery or courier does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind.
        entity: &'static str,
        /// The missing identity.
        id: String,
    },

    /// A record with the same identity already exists.
    #[error("{entity} already exists: {id}")]
    AlreadyExists {
        /// Entity kind.
        entity: &'static str,
        /// The duplicated identity.
        id: String,
    },

    /// A precondition or value check failed.
    #[error("invalid value: {reason}")]
    InvalidValue {
        /// What was wrong.
        reason: String,
    },

    /// A delete was refused because other records still reference the entity.
    #[error("deletion blocked: {reason}")]
    DeletionBlocked {
        /// Why the delete was refused.
        reason: String,
    },

    /// The operation cannot run right now (simulator running, collaborator down).
    #[error("temporarily unavailable: {reason}")]
    TemporarilyUnavailable {
        /// Why the operation was refused.
        reason: String,
    },

    /// The store failed in a way that has no business meaning.
    #[error("storage error: {source}")]
    Storage {
        /// The underlying store error.
        source: StoreError,
    },
}

impl DispatchError {
    /// Shorthand for [`DispatchError::InvalidValue`].
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`DispatchError::DeletionBlocked`].
    pub fn blocked(reason: impl Into<String>) -> Self {
        Self::DeletionBlocked {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`DispatchError::TemporarilyUnavailable`].
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::TemporarilyUnavailable {
            reason: reason.into(),
        }
    }
}

impl From<StoreError> for DispatchError {
    fn from(source: StoreError) -> Self {
        match source {
            StoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            StoreError::AlreadyExists { entity, id } => Self::AlreadyExists { entity, id },
            StoreError::Unavailable(reason) => Self::TemporarilyUnavailable { reason },
            other @ StoreError::UnknownCode { .. } => Self::Storage { source: other },
        }
    }
}

impl From<ClockError> for DispatchError {
    fn from(source: ClockError) -> Self {
        Self::invalid(source.to_string())
    }
}

impl From<StatusError> for DispatchError {
    fn from(source: StatusError) -> Self {
        Self::invalid(source.to_string())
    }
}

impl From<ConfigError> for DispatchError {
    fn from(source: ConfigError) -> Self {
        Self::invalid(source.to_string())
    }
}

impl From<GeoError> for DispatchError {
    fn from(source: GeoError) -> Self {
        Self::unavailable(source.to_string())
    }
}
