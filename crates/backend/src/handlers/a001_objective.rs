use axum::{
    extract::{Path, Query},
    http::StatusCode,
    Json,
};
use contracts::domain::a001_objective::aggregate::{
    Objective, ObjectiveId, ObjectiveWithKeyResults,
};
use contracts::domain::common::AggregateId;
use serde::Deserialize;
use serde_json::Value;

use super::{error_response, invalid_id};
use crate::domain::a001_objective::service::{self, CreateObjectiveDto, UpdateObjectiveDto};
use crate::system::auth::extractor::CurrentUser;

#[derive(Debug, Deserialize)]
pub struct ListObjectivesQuery {
    pub life_area_id: Option<String>,
}

fn parse_id(id: &str) -> Result<ObjectiveId, (StatusCode, Json<Value>)> {
    ObjectiveId::from_string(id).map_err(|_| invalid_id("objective"))
}

/// POST /api/objectives
pub async fn create(
    CurrentUser(claims): CurrentUser,
    Json(dto): Json<CreateObjectiveDto>,
) -> Result<Json<ObjectiveWithKeyResults>, (StatusCode, Json<Value>)> {
    service::create(&claims.sub, dto)
        .await
        .map(Json)
        .map_err(error_response)
}

/// GET /api/objectives
pub async fn list(
    CurrentUser(claims): CurrentUser,
    Query(params): Query<ListObjectivesQuery>,
) -> Result<Json<Vec<ObjectiveWithKeyResults>>, (StatusCode, Json<Value>)> {
    service::find_all(&claims.sub, params.life_area_id.as_deref())
        .await
        .map(Json)
        .map_err(error_response)
}

/// GET /api/objectives/:id
pub async fn get_by_id(
    CurrentUser(claims): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ObjectiveWithKeyResults>, (StatusCode, Json<Value>)> {
    let id = parse_id(&id)?;
    service::find_one(&claims.sub, id)
        .await
        .map(Json)
        .map_err(error_response)
}

/// PUT /api/objectives/:id
pub async fn update(
    CurrentUser(claims): CurrentUser,
    Path(id): Path<String>,
    Json(dto): Json<UpdateObjectiveDto>,
) -> Result<Json<Objective>, (StatusCode, Json<Value>)> {
    let id = parse_id(&id)?;
    service::update(&claims.sub, id, dto)
        .await
        .map(Json)
        .map_err(error_response)
}

/// DELETE /api/objectives/:id
pub async fn delete(
    CurrentUser(claims): CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
    let id = parse_id(&id)?;
    service::remove(&claims.sub, id)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(error_response)
}

/// POST /api/objectives/:id/archive
pub async fn archive(
    CurrentUser(claims): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Objective>, (StatusCode, Json<Value>)> {
    let id = parse_id(&id)?;
    service::archive(&claims.sub, id)
        .await
        .map(Json)
        .map_err(error_response)
}

/// POST /api/objectives/:id/toggle-completion
pub async fn toggle_completion(
    CurrentUser(claims): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Objective>, (StatusCode, Json<Value>)> {
    let id = parse_id(&id)?;
    service::toggle_completion(&claims.sub, id)
        .await
        .map(Json)
        .map_err(error_response)
}
