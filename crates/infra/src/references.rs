use std::time::Duration;

use metrics::counter;
use reqwest::StatusCode;
use testimony_domain::ports::BoxFuture;
use testimony_domain::ports::references::{
    ExecutionFactLookup, LookupResult, UpstreamError, WitnessLookup,
};
use testimony_domain::references::{ReferenceEntity, ReferenceKind};

use crate::config::AppConfig;

const REFERENCE_LOOKUPS_TOTAL: &str = "testimonies_reference_lookups_total";
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Talks to the witness and execution fact services over HTTP.
///
/// Each lookup is a single `GET <base>/<id>` carrying the caller's
/// `x-correlation-id`; failures are returned to the caller without retrying.
#[derive(Debug, Clone)]
pub struct HttpReferenceClient {
    http: reqwest::Client,
    witness_base_url: String,
    execution_fact_base_url: String,
}

impl HttpReferenceClient {
    pub fn from_config(config: &AppConfig) -> Self {
        let timeout = Duration::from_millis(config.upstream_timeout_ms.max(1));
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self::new(
            http,
            &config.witness_service_url,
            &config.execution_fact_service_url,
        )
    }

    pub fn new(http: reqwest::Client, witness_base_url: &str, execution_fact_base_url: &str) -> Self {
        Self {
            http,
            witness_base_url: witness_base_url.trim_end_matches('/').to_string(),
            execution_fact_base_url: execution_fact_base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn fetch(
        &self,
        kind: ReferenceKind,
        base_url: &str,
        id: &str,
        correlation_id: &str,
    ) -> LookupResult {
        let url = endpoint_url(base_url, id);
        let result = self.fetch_from_origin(&url, correlation_id).await;
        let outcome = match &result {
            Ok(Some(_)) => "found",
            Ok(None) => "missing",
            Err(_) => "error",
        };
        counter!(
            REFERENCE_LOOKUPS_TOTAL,
            "kind" => kind.as_str(),
            "outcome" => outcome
        )
        .increment(1);
        if let Err(err) = &result {
            tracing::warn!(
                kind = %kind,
                id,
                correlation_id,
                error = %err,
                "reference lookup failed"
            );
        } else {
            tracing::debug!(
                kind = %kind,
                id,
                correlation_id,
                outcome,
                "reference lookup finished"
            );
        }
        result
    }

    async fn fetch_from_origin(&self, url: &str, correlation_id: &str) -> LookupResult {
        let response = self
            .http
            .get(url)
            .header("accept", "application/json")
            .header(CORRELATION_ID_HEADER, correlation_id)
            .send()
            .await
            .map_err(|err| UpstreamError::Transport(err.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| UpstreamError::Transport(err.to_string()))?;
        decode_entity(&body)
    }
}

/// An empty body or a JSON `null` is how some services say "nothing here".
fn decode_entity(body: &[u8]) -> LookupResult {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice::<Option<ReferenceEntity>>(body)
        .map_err(|err| UpstreamError::InvalidResponse(err.to_string()))
}

fn endpoint_url(base_url: &str, id: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), id.trim_start_matches('/'))
}

impl WitnessLookup for HttpReferenceClient {
    fn lookup_witness(
        &self,
        witness_id: &str,
        correlation_id: &str,
    ) -> BoxFuture<'_, LookupResult> {
        let witness_id = witness_id.to_string();
        let correlation_id = correlation_id.to_string();
        Box::pin(async move {
            self.fetch(
                ReferenceKind::Witness,
                &self.witness_base_url,
                &witness_id,
                &correlation_id,
            )
            .await
        })
    }
}

impl ExecutionFactLookup for HttpReferenceClient {
    fn lookup_execution_fact(
        &self,
        execution_fact_id: &str,
        correlation_id: &str,
    ) -> BoxFuture<'_, LookupResult> {
        let execution_fact_id = execution_fact_id.to_string();
        let correlation_id = correlation_id.to_string();
        Box::pin(async move {
            self.fetch(
                ReferenceKind::ExecutionFact,
                &self.execution_fact_base_url,
                &execution_fact_id,
                &correlation_id,
            )
            .await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        extract::Path,
        http::{HeaderMap, StatusCode as AxumStatus},
        routing::get,
    };
    use serde_json::{Value, json};
    use tokio::net::TcpListener;

    const WITNESS_ID: &str = "9fcb46b8-2d23-40d9-8b21-8678bacc563d";
    const EXECUTION_FACT_ID: &str = "e32db94c-f2ca-4804-a7d8-90d35f65b57b";
    const CORRELATION_ID: &str = "corr-7";

    async fn spawn_reference_stub() -> String {
        async fn witness(
            Path(id): Path<String>,
            headers: HeaderMap,
        ) -> Result<Json<Value>, AxumStatus> {
            let correlation_id = headers
                .get(CORRELATION_ID_HEADER)
                .and_then(|value| value.to_str().ok());
            match id.as_str() {
                "traced" if correlation_id == Some(CORRELATION_ID) => {
                    Ok(Json(json!({ "id": id })))
                }
                WITNESS_ID => Ok(Json(json!({ "id": id, "name": "sensor-7" }))),
                "placeholder" => Ok(Json(json!({ "id": "" }))),
                "broken" => Err(AxumStatus::INTERNAL_SERVER_ERROR),
                _ => Err(AxumStatus::NOT_FOUND),
            }
        }

        async fn execution_fact(Path(id): Path<String>) -> Result<String, AxumStatus> {
            match id.as_str() {
                EXECUTION_FACT_ID => Ok(json!({ "id": id }).to_string()),
                "garbled" => Ok("<html>".to_string()),
                "null" => Ok("null".to_string()),
                _ => Err(AxumStatus::NOT_FOUND),
            }
        }

        let app = Router::new()
            .route("/witnesses/:id", get(witness))
            .route("/execution-facts/:id", get(execution_fact));
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind reference stub");
        let addr = listener.local_addr().expect("reference stub addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve reference stub");
        });
        format!("http://{addr}")
    }

    async fn client() -> HttpReferenceClient {
        let base = spawn_reference_stub().await;
        HttpReferenceClient::new(
            reqwest::Client::new(),
            &format!("{base}/witnesses/"),
            &format!("{base}/execution-facts"),
        )
    }

    #[tokio::test]
    async fn resolves_existing_references() {
        let client = client().await;
        let witness = client
            .lookup_witness(WITNESS_ID, CORRELATION_ID)
            .await
            .expect("lookup");
        assert_eq!(witness, Some(ReferenceEntity::with_id(WITNESS_ID)));
        let fact = client
            .lookup_execution_fact(EXECUTION_FACT_ID, CORRELATION_ID)
            .await
            .expect("lookup");
        assert_eq!(fact, Some(ReferenceEntity::with_id(EXECUTION_FACT_ID)));
    }

    #[tokio::test]
    async fn correlation_id_is_forwarded_upstream() {
        let client = client().await;
        let traced = client
            .lookup_witness("traced", CORRELATION_ID)
            .await
            .expect("lookup");
        assert_eq!(traced, Some(ReferenceEntity::with_id("traced")));
        let untraced = client
            .lookup_witness("traced", "someone-else")
            .await
            .expect("lookup");
        assert_eq!(untraced, None);
    }

    #[tokio::test]
    async fn not_found_and_null_mean_absent() {
        let client = client().await;
        assert_eq!(
            client
                .lookup_witness("unknown", CORRELATION_ID)
                .await
                .expect("lookup"),
            None
        );
        assert_eq!(
            client
                .lookup_execution_fact("null", CORRELATION_ID)
                .await
                .expect("lookup"),
            None
        );
    }

    #[tokio::test]
    async fn placeholder_entity_is_passed_through() {
        let client = client().await;
        let entity = client
            .lookup_witness("placeholder", CORRELATION_ID)
            .await
            .expect("lookup")
            .expect("entity");
        assert!(!entity.is_present());
    }

    #[tokio::test]
    async fn server_errors_and_bad_bodies_are_upstream_errors() {
        let client = client().await;
        assert!(matches!(
            client.lookup_witness("broken", CORRELATION_ID).await,
            Err(UpstreamError::Status { status: 500, .. })
        ));
        assert!(matches!(
            client.lookup_execution_fact("garbled", CORRELATION_ID).await,
            Err(UpstreamError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_service_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);
        let client = HttpReferenceClient::new(
            reqwest::Client::new(),
            &format!("http://{addr}/witnesses"),
            &format!("http://{addr}/execution-facts"),
        );
        assert!(matches!(
            client.lookup_witness(WITNESS_ID, CORRELATION_ID).await,
            Err(UpstreamError::Transport(_))
        ));
    }
}
