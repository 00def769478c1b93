pub mod a001_objective;
pub mod a002_key_result;

use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::domain::error::DomainError;

/// Маппинг доменных ошибок в HTTP статусы с телом-сообщением
pub(crate) fn error_response(err: DomainError) -> (StatusCode, Json<Value>) {
    match err {
        DomainError::NotFound(message) => {
            (StatusCode::NOT_FOUND, Json(json!({ "error": message })))
        }
        DomainError::BadRequest(message) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
        }
        DomainError::Store(_) | DomainError::Serialization(_) => {
            tracing::error!("Domain operation failed: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error" })),
            )
        }
    }
}

/// 400 с сообщением для некорректного идентификатора в пути
pub(crate) fn invalid_id(entity: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": format!("Invalid {} id", entity) })),
    )
}
