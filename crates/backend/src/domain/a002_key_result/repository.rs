use contracts::domain::a001_objective::aggregate::ObjectiveId;
use contracts::domain::a002_key_result::aggregate::{KeyResult, KeyResultId};
use contracts::domain::common::AggregateId;
use serde_json::Value;

use crate::domain::error::DomainResult;
use crate::shared::data::db::get_store;
use crate::shared::data::store::{Query, SortDirection};

pub(crate) fn from_docs(docs: Vec<Value>) -> DomainResult<Vec<KeyResult>> {
    let mut key_results = Vec::with_capacity(docs.len());
    for doc in docs {
        key_results.push(serde_json::from_value(doc)?);
    }
    Ok(key_results)
}

pub async fn find_by_id(id: KeyResultId) -> DomainResult<Option<KeyResult>> {
    let doc = get_store().get(KeyResult::COLLECTION, &id.as_string()).await?;
    match doc {
        Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
        None => Ok(None),
    }
}

/// Ключевые результаты цели в рабочем порядке (order, затем created_at)
pub async fn list_for_objective(objective_id: ObjectiveId) -> DomainResult<Vec<KeyResult>> {
    let docs = get_store()
        .query(
            Query::new(KeyResult::COLLECTION)
                .where_eq("objective_id", objective_id.as_string())
                .order_by("order", SortDirection::Asc)
                .order_by("created_at", SortDirection::Asc),
        )
        .await?;
    from_docs(docs)
}

/// Ключевые результаты цели по времени создания
pub async fn list_for_objective_by_created(
    objective_id: ObjectiveId,
) -> DomainResult<Vec<KeyResult>> {
    let docs = get_store()
        .query(
            Query::new(KeyResult::COLLECTION)
                .where_eq("objective_id", objective_id.as_string())
                .order_by("created_at", SortDirection::Asc),
        )
        .await?;
    from_docs(docs)
}

/// Один запрос на весь набор целей (избегаем N+1 при списках)
pub async fn list_for_objectives(objective_ids: Vec<Value>) -> DomainResult<Vec<KeyResult>> {
    let docs = get_store()
        .query(
            Query::new(KeyResult::COLLECTION)
                .where_in("objective_id", objective_ids)
                .order_by("order", SortDirection::Asc)
                .order_by("created_at", SortDirection::Asc),
        )
        .await?;
    from_docs(docs)
}

pub async fn insert(key_result: &KeyResult) -> DomainResult<()> {
    get_store()
        .set(
            KeyResult::COLLECTION,
            &key_result.to_string_id(),
            serde_json::to_value(key_result)?,
        )
        .await?;
    Ok(())
}

pub async fn save(key_result: &KeyResult) -> DomainResult<()> {
    get_store()
        .set(
            KeyResult::COLLECTION,
            &key_result.to_string_id(),
            serde_json::to_value(key_result)?,
        )
        .await?;
    Ok(())
}
