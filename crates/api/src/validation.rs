use axum::{
    Json,
    extract::{
        Query,
        rejection::{JsonRejection, QueryRejection},
    },
};
use validator::{Validate, ValidationErrors};

use crate::error::ApiError;

/// Unwraps a JSON body, reporting axum's rejection text as a validation error.
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    let Json(payload) = payload.map_err(|rejection| ApiError::Validation(rejection.body_text()))?;
    Ok(payload)
}

/// Unwraps query parameters and runs their field rules.
pub fn query_params<T: Validate>(query: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    let Query(query) = query.map_err(|rejection| ApiError::Validation(rejection.body_text()))?;
    query
        .validate()
        .map_err(|errors| ApiError::Validation(describe(&errors)))?;
    Ok(query)
}

/// `field: message` pairs, sorted so the text is stable across runs.
fn describe(errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, field_errors)| {
            field_errors.iter().map(move |error| match &error.message {
                Some(message) => format!("{field}: {message}"),
                None => format!("{field}: {}", error.code),
            })
        })
        .collect();
    messages.sort();
    messages.join(", ")
}
