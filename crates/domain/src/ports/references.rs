use thiserror::Error;

use super::BoxFuture;
use crate::references::ReferenceEntity;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

pub type LookupResult = Result<Option<ReferenceEntity>, UpstreamError>;

/// Resolves a witness by id. `Ok(None)` means the witness service has no such witness.
///
/// `correlation_id` identifies the inbound request so upstream logs can be
/// joined with ours.
pub trait WitnessLookup: Send + Sync {
    fn lookup_witness(&self, witness_id: &str, correlation_id: &str)
    -> BoxFuture<'_, LookupResult>;
}

/// Resolves an execution fact by id. `Ok(None)` means it does not exist.
pub trait ExecutionFactLookup: Send + Sync {
    fn lookup_execution_fact(
        &self,
        execution_fact_id: &str,
        correlation_id: &str,
    ) -> BoxFuture<'_, LookupResult>;
}
