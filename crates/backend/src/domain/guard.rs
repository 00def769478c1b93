//! Ownership Guard: единая проверка владения записями.
//!
//! Вызывается в начале каждой мутирующей операции. Отсутствующая и
//! чужая запись дают один и тот же `NotFound` — вызывающая сторона
//! не может отличить "нет" от "не ваше".

use contracts::domain::a001_objective::aggregate::{Objective, ObjectiveId};
use contracts::domain::a002_key_result::aggregate::{KeyResult, KeyResultId};
use contracts::domain::common::AggregateId;

use crate::domain::error::{DomainError, DomainResult};
use crate::shared::data::db::get_store;
use crate::shared::data::store::StoreTransaction;

/// Загрузить цель и проверить владение
pub async fn require_objective(user_id: &str, id: ObjectiveId) -> DomainResult<Objective> {
    let doc = get_store().get(Objective::COLLECTION, &id.as_string()).await?;
    objective_from_doc(user_id, doc)
}

/// То же, но чтение внутри транзакции
pub async fn require_objective_tx(
    tx: &mut dyn StoreTransaction,
    user_id: &str,
    id: ObjectiveId,
) -> DomainResult<Objective> {
    let doc = tx.get(Objective::COLLECTION, &id.as_string()).await?;
    objective_from_doc(user_id, doc)
}

/// Загрузить ключевой результат, сверив родителя и владельца
pub async fn require_key_result(
    user_id: &str,
    objective_id: ObjectiveId,
    id: KeyResultId,
) -> DomainResult<KeyResult> {
    let doc = get_store().get(KeyResult::COLLECTION, &id.as_string()).await?;
    key_result_from_doc(user_id, objective_id, doc)
}

/// То же, но чтение внутри транзакции
pub async fn require_key_result_tx(
    tx: &mut dyn StoreTransaction,
    user_id: &str,
    objective_id: ObjectiveId,
    id: KeyResultId,
) -> DomainResult<KeyResult> {
    let doc = tx.get(KeyResult::COLLECTION, &id.as_string()).await?;
    key_result_from_doc(user_id, objective_id, doc)
}

fn objective_from_doc(
    user_id: &str,
    doc: Option<serde_json::Value>,
) -> DomainResult<Objective> {
    let objective: Objective = match doc {
        Some(doc) => serde_json::from_value(doc)?,
        None => return Err(DomainError::not_found("Objective")),
    };
    if objective.user_id != user_id {
        return Err(DomainError::not_found("Objective"));
    }
    Ok(objective)
}

fn key_result_from_doc(
    user_id: &str,
    objective_id: ObjectiveId,
    doc: Option<serde_json::Value>,
) -> DomainResult<KeyResult> {
    let key_result: KeyResult = match doc {
        Some(doc) => serde_json::from_value(doc)?,
        None => return Err(DomainError::not_found("Key result")),
    };
    // Оба поля обязаны совпасть: родитель и денормализованный владелец
    if key_result.objective_id != objective_id || key_result.user_id != user_id {
        return Err(DomainError::not_found("Key result"));
    }
    Ok(key_result)
}
