use chrono::Utc;
use contracts::domain::a001_objective::aggregate::{Objective, ObjectiveId};
use contracts::domain::common::AggregateId;
use serde_json::json;

use crate::domain::error::DomainResult;
use crate::shared::data::db::get_store;
use crate::shared::data::store::{Query, SortDirection};

pub async fn find_by_id(id: ObjectiveId) -> DomainResult<Option<Objective>> {
    let doc = get_store().get(Objective::COLLECTION, &id.as_string()).await?;
    match doc {
        Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
        None => Ok(None),
    }
}

/// Список целей пользователя; архивные не показываются
pub async fn list_for_user(
    user_id: &str,
    life_area_id: Option<&str>,
) -> DomainResult<Vec<Objective>> {
    let mut query = Query::new(Objective::COLLECTION)
        .where_eq("user_id", user_id)
        .where_eq("is_archived", false)
        .order_by("created_at", SortDirection::Asc);

    if let Some(life_area_id) = life_area_id {
        query = query.where_eq("life_area_id", life_area_id);
    }

    let docs = get_store().query(query).await?;
    let mut objectives = Vec::with_capacity(docs.len());
    for doc in docs {
        objectives.push(serde_json::from_value(doc)?);
    }
    Ok(objectives)
}

pub async fn insert(objective: &Objective) -> DomainResult<()> {
    get_store()
        .set(
            Objective::COLLECTION,
            &objective.to_string_id(),
            serde_json::to_value(objective)?,
        )
        .await?;
    Ok(())
}

/// Полная запись агрегата (после слияния полей в памяти)
pub async fn save(objective: &Objective) -> DomainResult<()> {
    get_store()
        .set(
            Objective::COLLECTION,
            &objective.to_string_id(),
            serde_json::to_value(objective)?,
        )
        .await?;
    Ok(())
}

/// Точечная запись производного прогресса
pub async fn update_progress(id: ObjectiveId, progress: i32) -> DomainResult<()> {
    get_store()
        .update(
            Objective::COLLECTION,
            &id.as_string(),
            json!({ "progress": progress, "updated_at": Utc::now() }),
        )
        .await?;
    Ok(())
}

pub async fn delete(id: ObjectiveId) -> DomainResult<()> {
    get_store()
        .delete(Objective::COLLECTION, &id.as_string())
        .await?;
    Ok(())
}
