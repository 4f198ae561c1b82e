use thiserror::Error;

use crate::references::ReferenceKind;
use crate::timestamps::InvalidTimestamp;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Given invalid {kind} id: {id}.")]
    InvalidIdentifier { kind: ReferenceKind, id: String },
    #[error("Given invalid timestamp: {value}, {reason}.")]
    InvalidTimestamp {
        value: String,
        reason: InvalidTimestamp,
    },
    #[error("Given {kind} id: {id}, does not exist.")]
    ReferenceNotFound { kind: ReferenceKind, id: String },
    #[error("{kind} lookup unavailable: {message}")]
    UpstreamUnavailable {
        kind: ReferenceKind,
        message: String,
    },
    #[error("storage failure: {0}")]
    Storage(String),
}
