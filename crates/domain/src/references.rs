use std::fmt;
use std::sync::Arc;

use futures_util::future::join;
use serde::{Deserialize, Serialize};

use crate::DomainResult;
use crate::error::DomainError;
use crate::ports::references::{ExecutionFactLookup, LookupResult, WitnessLookup};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReferenceKind {
    Witness,
    ExecutionFact,
}

impl ReferenceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ReferenceKind::Witness => "witness",
            ReferenceKind::ExecutionFact => "execution fact",
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The part of an upstream witness or execution fact this service cares about.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEntity {
    #[serde(default)]
    pub id: Option<String>,
}

impl ReferenceEntity {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
        }
    }

    /// Some upstreams answer with a placeholder object instead of a 404, so an
    /// entity without a usable id counts as absent.
    pub fn is_present(&self) -> bool {
        self.id.as_deref().is_some_and(|id| !id.trim().is_empty())
    }
}

#[derive(Clone)]
pub struct ReferenceVerifier {
    witnesses: Arc<dyn WitnessLookup>,
    execution_facts: Arc<dyn ExecutionFactLookup>,
}

impl ReferenceVerifier {
    pub fn new(
        witnesses: Arc<dyn WitnessLookup>,
        execution_facts: Arc<dyn ExecutionFactLookup>,
    ) -> Self {
        Self {
            witnesses,
            execution_facts,
        }
    }

    pub async fn verify_witness(&self, witness_id: &str, correlation_id: &str) -> DomainResult<()> {
        let result = self
            .witnesses
            .lookup_witness(witness_id, correlation_id)
            .await;
        interpret_lookup(ReferenceKind::Witness, witness_id, result)
    }

    pub async fn verify_execution_fact(
        &self,
        execution_fact_id: &str,
        correlation_id: &str,
    ) -> DomainResult<()> {
        let result = self
            .execution_facts
            .lookup_execution_fact(execution_fact_id, correlation_id)
            .await;
        interpret_lookup(ReferenceKind::ExecutionFact, execution_fact_id, result)
    }

    /// Issues both lookups at once. The witness outcome is inspected first, so
    /// a failing witness is reported even when the execution fact fails too.
    pub async fn verify_pair(
        &self,
        witness_id: &str,
        execution_fact_id: &str,
        correlation_id: &str,
    ) -> DomainResult<()> {
        let (witness, execution_fact) = join(
            self.verify_witness(witness_id, correlation_id),
            self.verify_execution_fact(execution_fact_id, correlation_id),
        )
        .await;
        witness?;
        execution_fact
    }
}

fn interpret_lookup(kind: ReferenceKind, id: &str, result: LookupResult) -> DomainResult<()> {
    match result {
        Ok(Some(entity)) if entity.is_present() => Ok(()),
        Ok(_) => Err(DomainError::ReferenceNotFound {
            kind,
            id: id.to_string(),
        }),
        Err(err) => Err(DomainError::UpstreamUnavailable {
            kind,
            message: err.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::references::UpstreamError;

    const ID: &str = "9fcb46b8-2d23-40d9-8b21-8678bacc563d";

    #[test]
    fn found_entity_passes() {
        let result = interpret_lookup(
            ReferenceKind::Witness,
            ID,
            Ok(Some(ReferenceEntity::with_id(ID))),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn absent_and_placeholder_entities_are_not_found() {
        for entity in [
            None,
            Some(ReferenceEntity::default()),
            Some(ReferenceEntity::with_id("")),
            Some(ReferenceEntity::with_id("   ")),
        ] {
            let err = interpret_lookup(ReferenceKind::ExecutionFact, ID, Ok(entity))
                .expect_err("not found");
            assert!(matches!(
                err,
                DomainError::ReferenceNotFound {
                    kind: ReferenceKind::ExecutionFact,
                    ref id,
                } if id == ID
            ));
            assert_eq!(
                err.to_string(),
                format!("Given execution fact id: {ID}, does not exist.")
            );
        }
    }

    #[test]
    fn upstream_failure_is_not_a_missing_reference() {
        let err = interpret_lookup(
            ReferenceKind::Witness,
            ID,
            Err(UpstreamError::Transport("connection refused".into())),
        )
        .expect_err("unavailable");
        assert!(matches!(
            err,
            DomainError::UpstreamUnavailable {
                kind: ReferenceKind::Witness,
                ..
            }
        ));
    }

    #[test]
    fn entity_decodes_without_id() {
        let entity: ReferenceEntity = serde_json::from_str(r#"{"name":"x"}"#).expect("decode");
        assert!(!entity.is_present());
        let entity: ReferenceEntity =
            serde_json::from_str(&format!(r#"{{"id":"{ID}","name":"x"}}"#)).expect("decode");
        assert!(entity.is_present());
    }
}
