use axum::{extract::Path, http::StatusCode, Json};
use contracts::domain::a001_objective::aggregate::ObjectiveId;
use contracts::domain::a002_key_result::aggregate::{KeyResultId, KeyResultWithProgress};
use contracts::domain::common::AggregateId;
use serde_json::Value;

use super::{error_response, invalid_id};
use crate::domain::a002_key_result::service::{
    self, BatchUpdateItemDto, BatchUpdateReport, CreateKeyResultDto, UpdateKeyResultDto,
};
use crate::system::auth::extractor::CurrentUser;

fn parse_ids(
    objective_id: &str,
    key_result_id: &str,
) -> Result<(ObjectiveId, KeyResultId), (StatusCode, Json<Value>)> {
    let objective_id =
        ObjectiveId::from_string(objective_id).map_err(|_| invalid_id("objective"))?;
    let key_result_id =
        KeyResultId::from_string(key_result_id).map_err(|_| invalid_id("key result"))?;
    Ok((objective_id, key_result_id))
}

/// POST /api/objectives/:id/key-results
pub async fn create(
    CurrentUser(claims): CurrentUser,
    Path(objective_id): Path<String>,
    Json(dto): Json<CreateKeyResultDto>,
) -> Result<Json<KeyResultWithProgress>, (StatusCode, Json<Value>)> {
    let objective_id =
        ObjectiveId::from_string(&objective_id).map_err(|_| invalid_id("objective"))?;
    service::create(&claims.sub, objective_id, dto)
        .await
        .map(Json)
        .map_err(error_response)
}

/// GET /api/objectives/:id/key-results
pub async fn list(
    CurrentUser(claims): CurrentUser,
    Path(objective_id): Path<String>,
) -> Result<Json<Vec<KeyResultWithProgress>>, (StatusCode, Json<Value>)> {
    let objective_id =
        ObjectiveId::from_string(&objective_id).map_err(|_| invalid_id("objective"))?;
    service::list(&claims.sub, objective_id)
        .await
        .map(Json)
        .map_err(error_response)
}

/// PUT /api/objectives/:id/key-results/:kr_id
pub async fn update(
    CurrentUser(claims): CurrentUser,
    Path((objective_id, key_result_id)): Path<(String, String)>,
    Json(dto): Json<UpdateKeyResultDto>,
) -> Result<Json<KeyResultWithProgress>, (StatusCode, Json<Value>)> {
    let (objective_id, key_result_id) = parse_ids(&objective_id, &key_result_id)?;
    service::update(&claims.sub, objective_id, key_result_id, dto)
        .await
        .map(Json)
        .map_err(error_response)
}

/// DELETE /api/objectives/:id/key-results/:kr_id
pub async fn delete(
    CurrentUser(claims): CurrentUser,
    Path((objective_id, key_result_id)): Path<(String, String)>,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
    let (objective_id, key_result_id) = parse_ids(&objective_id, &key_result_id)?;
    service::delete(&claims.sub, objective_id, key_result_id)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(error_response)
}

/// POST /api/objectives/:id/key-results/:kr_id/toggle-completion
pub async fn toggle_completion(
    CurrentUser(claims): CurrentUser,
    Path((objective_id, key_result_id)): Path<(String, String)>,
) -> Result<Json<KeyResultWithProgress>, (StatusCode, Json<Value>)> {
    let (objective_id, key_result_id) = parse_ids(&objective_id, &key_result_id)?;
    service::toggle_completion(&claims.sub, objective_id, key_result_id)
        .await
        .map(Json)
        .map_err(error_response)
}

/// PUT /api/objectives/:id/key-results/batch
pub async fn batch_update(
    CurrentUser(claims): CurrentUser,
    Path(objective_id): Path<String>,
    Json(items): Json<Vec<BatchUpdateItemDto>>,
) -> Result<Json<BatchUpdateReport>, (StatusCode, Json<Value>)> {
    let objective_id =
        ObjectiveId::from_string(&objective_id).map_err(|_| invalid_id("objective"))?;
    service::batch_update(&claims.sub, objective_id, items)
        .await
        .map(Json)
        .map_err(error_response)
}
