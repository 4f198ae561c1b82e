use axum::{
    Extension, Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use testimony_domain::testimony::{
    PageRequest, Testimony, TestimonyCreate, TestimonyFilter, TestimonyQuery, TestimonySort,
};
use validator::Validate;

use crate::{
    error::ApiError, middleware::CorrelationId, observability, state::AppState, validation,
};

pub const TOTAL_COUNT_HEADER: &str = "x-total-count";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTestimonyRequest {
    witness_id: String,
    execution_fact_id: String,
    timestamp: String,
}

pub async fn create_testimony(
    State(state): State<AppState>,
    Extension(CorrelationId(correlation_id)): Extension<CorrelationId>,
    payload: Result<Json<CreateTestimonyRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Testimony>), ApiError> {
    let payload = validation::json_body(payload).inspect_err(reject)?;
    let testimony = state
        .testimonies
        .create(
            &correlation_id,
            TestimonyCreate {
                witness_id: payload.witness_id,
                execution_fact_id: payload.execution_fact_id,
                timestamp: payload.timestamp,
            },
        )
        .await
        .map_err(ApiError::from)
        .inspect_err(reject)?;

    observability::register_testimony_created();
    tracing::info!(
        testimony_id = %testimony.id,
        correlation_id = %correlation_id,
        witness_id = %testimony.witness_id,
        execution_fact_id = %testimony.execution_fact_id,
        "testimony recorded"
    );
    Ok((StatusCode::CREATED, Json(testimony)))
}

fn reject(err: &ApiError) {
    observability::register_testimony_rejected(err.error_code());
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ListTestimoniesQuery {
    witness_id: Option<String>,
    execution_fact_id: Option<String>,
    #[validate(range(min = 1, message = "must be at least 1"))]
    size: Option<usize>,
    from: Option<usize>,
    sort: Option<TestimonySort>,
}

/// Responds with the requested page and the unpaginated match count in
/// `x-total-count`.
pub async fn list_testimonies(
    State(state): State<AppState>,
    query: Result<Query<ListTestimoniesQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let query = validation::query_params(query)?;

    let filter = TestimonyFilter {
        witness_id: query.witness_id,
        execution_fact_id: query.execution_fact_id,
    };
    let total = state.testimonies.count(&filter).await?;
    let testimonies = state
        .testimonies
        .list(TestimonyQuery {
            filter,
            page: PageRequest {
                size: query.size,
                from: query.from,
            },
            sort: query.sort.unwrap_or_default(),
        })
        .await?;

    observability::register_list_page(testimonies.len());
    Ok(([(TOTAL_COUNT_HEADER, total.to_string())], Json(testimonies)).into_response())
}
