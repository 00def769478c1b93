use chrono::Utc;
use contracts::domain::a001_objective::aggregate::{Objective, ObjectiveId};
use contracts::domain::a002_key_result::aggregate::{
    KeyResult, KeyResultId, KeyResultWithProgress,
};
use contracts::domain::common::AggregateId;
use contracts::domain::progress;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::repository;
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::guard;
use crate::shared::data::db::get_store;
use crate::shared::data::store::{Query, SortDirection, WriteBatch};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateKeyResultDto {
    pub title: String,
    pub description: Option<String>,
    pub target_value: f64,
    pub current_value: Option<f64>,
    pub unit: Option<String>,
    pub order: Option<i32>,
}

/// Разреженный патч: сериализуются только переданные поля
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateKeyResultDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_completed: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchUpdateItemDto {
    pub id: String,
    #[serde(flatten)]
    pub update: UpdateKeyResultDto,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItemResult {
    pub id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Итог пакетного обновления: частичное выполнение — нормальный исход
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchUpdateReport {
    pub success: usize,
    pub errors: usize,
    pub results: Vec<BatchItemResult>,
}

/// Создание ключевого результата
///
/// Автовыполнение (current >= target) применяется только здесь, в момент
/// создания; дальше флаг меняется только явным переключением.
pub async fn create(
    user_id: &str,
    objective_id: ObjectiveId,
    dto: CreateKeyResultDto,
) -> DomainResult<KeyResultWithProgress> {
    let _objective = guard::require_objective(user_id, objective_id).await?;

    // order по умолчанию — следующий за уже существующими
    let order = match dto.order {
        Some(order) => order,
        None => repository::list_for_objective(objective_id).await?.len() as i32,
    };

    let key_result = KeyResult::new_for_insert(
        objective_id,
        user_id.to_string(),
        dto.title,
        dto.description,
        dto.target_value,
        dto.current_value,
        dto.unit,
        order,
    );

    repository::insert(&key_result).await?;
    refresh_objective_progress(objective_id).await?;

    Ok(key_result.into())
}

/// Список ключевых результатов цели; процент считается на чтении
pub async fn list(
    user_id: &str,
    objective_id: ObjectiveId,
) -> DomainResult<Vec<KeyResultWithProgress>> {
    let _objective = guard::require_objective(user_id, objective_id).await?;

    let key_results = repository::list_for_objective(objective_id).await?;
    Ok(key_results.into_iter().map(Into::into).collect())
}

/// Транзакционное обновление ключевого результата.
///
/// Все чтения (цель, ключевой результат, весь набор соседей) выполняются
/// до первой записи — требование модели транзакций document store. Патч
/// полей и пересчитанный прогресс цели фиксируются одним коммитом.
pub async fn update(
    user_id: &str,
    objective_id: ObjectiveId,
    key_result_id: KeyResultId,
    dto: UpdateKeyResultDto,
) -> DomainResult<KeyResultWithProgress> {
    let mut tx = get_store().begin().await?;

    let _objective = guard::require_objective_tx(tx.as_mut(), user_id, objective_id).await?;
    let mut key_result =
        guard::require_key_result_tx(tx.as_mut(), user_id, objective_id, key_result_id).await?;
    let siblings = siblings_in_tx(tx.as_mut(), objective_id).await?;

    let patch = build_patch(&mut key_result, &dto)?;

    // Прогресс считаем по набору с подменённым обновляемым элементом
    let updated_set: Vec<KeyResult> = siblings
        .iter()
        .map(|s| {
            if s.id == key_result.id {
                key_result.clone()
            } else {
                s.clone()
            }
        })
        .collect();
    let objective_progress = progress::objective_progress(&updated_set);

    tx.update(KeyResult::COLLECTION, &key_result.to_string_id(), patch);
    tx.update(
        Objective::COLLECTION,
        &objective_id.as_string(),
        json!({ "progress": objective_progress, "updated_at": Utc::now() }),
    );
    tx.commit().await?;

    Ok(key_result.into())
}

/// Транзакционное удаление ключевого результата.
///
/// Тот же порядок чтение-потом-запись; прогресс цели пересчитывается по
/// оставшимся соседям в том же коммите.
pub async fn delete(
    user_id: &str,
    objective_id: ObjectiveId,
    key_result_id: KeyResultId,
) -> DomainResult<()> {
    let mut tx = get_store().begin().await?;

    let _objective = guard::require_objective_tx(tx.as_mut(), user_id, objective_id).await?;
    let key_result =
        guard::require_key_result_tx(tx.as_mut(), user_id, objective_id, key_result_id).await?;
    let siblings = siblings_in_tx(tx.as_mut(), objective_id).await?;

    if siblings.len() <= KeyResult::MIN_PER_OBJECTIVE {
        return Err(DomainError::BadRequest(format!(
            "An objective must keep at least {} key results",
            KeyResult::MIN_PER_OBJECTIVE
        )));
    }

    let remaining: Vec<KeyResult> = siblings
        .into_iter()
        .filter(|s| s.id != key_result.id)
        .collect();
    let objective_progress = progress::objective_progress(&remaining);

    tx.delete(KeyResult::COLLECTION, &key_result.to_string_id());
    tx.update(
        Objective::COLLECTION,
        &objective_id.as_string(),
        json!({ "progress": objective_progress, "updated_at": Utc::now() }),
    );
    tx.commit().await?;

    Ok(())
}

/// Переключение флага выполнения.
///
/// Не транзакционно: запись ключевого результата и запись прогресса цели
/// идут двумя отдельными операциями.
pub async fn toggle_completion(
    user_id: &str,
    objective_id: ObjectiveId,
    key_result_id: KeyResultId,
) -> DomainResult<KeyResultWithProgress> {
    let _objective = guard::require_objective(user_id, objective_id).await?;
    let mut key_result = guard::require_key_result(user_id, objective_id, key_result_id).await?;

    key_result.toggle_completion();
    repository::save(&key_result).await?;

    refresh_objective_progress(objective_id).await?;

    Ok(key_result.into())
}

/// Пакетное обновление best-effort.
///
/// Каждый элемент валидируется отдельно; ошибка элемента не валит пакет.
/// Все прошедшие валидацию патчи коммитятся одним батчем, ответ содержит
/// поэлементный отчёт.
pub async fn batch_update(
    user_id: &str,
    objective_id: ObjectiveId,
    items: Vec<BatchUpdateItemDto>,
) -> DomainResult<BatchUpdateReport> {
    let _objective = guard::require_objective(user_id, objective_id).await?;

    let mut batch = WriteBatch::new();
    let mut results = Vec::with_capacity(items.len());
    let mut success = 0usize;
    let mut errors = 0usize;

    for item in &items {
        match validate_batch_item(user_id, objective_id, item).await {
            Ok(patch) => {
                batch.update(KeyResult::COLLECTION, &item.id, patch);
                success += 1;
                results.push(BatchItemResult {
                    id: item.id.clone(),
                    success: true,
                    error: None,
                });
            }
            Err(e) => {
                errors += 1;
                results.push(BatchItemResult {
                    id: item.id.clone(),
                    success: false,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    if !batch.is_empty() {
        get_store().commit_batch(batch).await?;
    }

    // Пакет мог сменить флаги выполнения — прогресс обновляем один раз
    refresh_objective_progress(objective_id).await?;

    Ok(BatchUpdateReport {
        success,
        errors,
        results,
    })
}

async fn validate_batch_item(
    user_id: &str,
    objective_id: ObjectiveId,
    item: &BatchUpdateItemDto,
) -> DomainResult<Value> {
    let id = KeyResultId::from_string(&item.id).map_err(DomainError::BadRequest)?;
    let mut key_result = guard::require_key_result(user_id, objective_id, id).await?;
    build_patch(&mut key_result, &item.update)
}

/// Применить dto к агрегату и собрать разреженный патч для записи.
///
/// completed_at ставится/сбрасывается только при смене is_completed.
fn build_patch(key_result: &mut KeyResult, dto: &UpdateKeyResultDto) -> DomainResult<Value> {
    let was_completed = key_result.is_completed;

    if let Some(ref title) = dto.title {
        key_result.title = title.clone();
    }
    if let Some(ref description) = dto.description {
        key_result.description = Some(description.clone());
    }
    if let Some(target_value) = dto.target_value {
        key_result.target_value = target_value;
    }
    if let Some(current_value) = dto.current_value {
        key_result.current_value = current_value;
    }
    if let Some(ref unit) = dto.unit {
        key_result.unit = Some(unit.clone());
    }
    if let Some(order) = dto.order {
        key_result.order = order;
    }
    if let Some(is_completed) = dto.is_completed {
        key_result.is_completed = is_completed;
    }
    key_result.metadata.touch();

    let Value::Object(mut patch) = serde_json::to_value(dto)? else {
        return Err(DomainError::BadRequest("Malformed update patch".to_string()));
    };

    if key_result.is_completed != was_completed {
        key_result.completed_at = if key_result.is_completed {
            Some(Utc::now())
        } else {
            None
        };
        patch.insert(
            "completed_at".to_string(),
            serde_json::to_value(key_result.completed_at)?,
        );
    }
    patch.insert(
        "updated_at".to_string(),
        serde_json::to_value(key_result.metadata.updated_at)?,
    );

    Ok(Value::Object(patch))
}

async fn siblings_in_tx(
    tx: &mut dyn crate::shared::data::store::StoreTransaction,
    objective_id: ObjectiveId,
) -> DomainResult<Vec<KeyResult>> {
    let docs = tx
        .query(
            Query::new(KeyResult::COLLECTION)
                .where_eq("objective_id", objective_id.as_string())
                .order_by("order", SortDirection::Asc)
                .order_by("created_at", SortDirection::Asc),
        )
        .await?;
    repository::from_docs(docs)
}

/// Пересчитать и записать производный прогресс родительской цели
async fn refresh_objective_progress(objective_id: ObjectiveId) -> DomainResult<()> {
    let siblings = repository::list_for_objective(objective_id).await?;
    let objective_progress = progress::objective_progress(&siblings);
    crate::domain::a001_objective::repository::update_progress(objective_id, objective_progress)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::a001_objective::repository as objective_repository;
    use crate::domain::a001_objective::service::{self as objective_service, CreateObjectiveDto};

    fn test_user() -> String {
        format!("user-{}", uuid::Uuid::new_v4())
    }

    async fn new_objective(user: &str) -> ObjectiveId {
        let dto = CreateObjectiveDto {
            title: "Objective".to_string(),
            description: None,
            life_area_id: None,
            cycle_months: None,
            start_date: None,
            end_date: None,
            key_results: None,
        };
        objective_service::create(user, dto)
            .await
            .unwrap()
            .objective
            .id
    }

    fn kr_dto(title: &str, target: f64, current: f64) -> CreateKeyResultDto {
        CreateKeyResultDto {
            title: title.to_string(),
            description: None,
            target_value: target,
            current_value: Some(current),
            unit: None,
            order: None,
        }
    }

    async fn stored_progress(id: ObjectiveId) -> i32 {
        objective_repository::find_by_id(id)
            .await
            .unwrap()
            .unwrap()
            .progress
    }

    #[tokio::test]
    async fn auto_completion_applies_only_at_creation() {
        let user = test_user();
        let objective_id = new_objective(&user).await;
        assert_eq!(stored_progress(objective_id).await, 0);

        // target=10, current=0: не выполнен
        let kr = create(&user, objective_id, kr_dto("Read books", 10.0, 0.0))
            .await
            .unwrap();
        assert!(!kr.key_result.is_completed);
        assert_eq!(stored_progress(objective_id).await, 0);

        // Достижение target обновлением НЕ ставит флаг — только явный toggle
        let updated = update(
            &user,
            objective_id,
            kr.key_result.id,
            UpdateKeyResultDto {
                current_value: Some(10.0),
                ..UpdateKeyResultDto::default()
            },
        )
        .await
        .unwrap();
        assert!(!updated.key_result.is_completed);
        assert_eq!(updated.completion_percentage, 100);
        assert_eq!(stored_progress(objective_id).await, 0);

        let toggled = toggle_completion(&user, objective_id, kr.key_result.id)
            .await
            .unwrap();
        assert!(toggled.key_result.is_completed);
        assert!(toggled.key_result.completed_at.is_some());
        assert_eq!(stored_progress(objective_id).await, 100);
    }

    #[tokio::test]
    async fn transactional_delete_recomputes_progress() {
        let user = test_user();
        let objective_id = new_objective(&user).await;

        // 4 ключевых результата, 2 выполнены при создании
        let done_1 = create(&user, objective_id, kr_dto("a", 10.0, 10.0))
            .await
            .unwrap();
        let _done_2 = create(&user, objective_id, kr_dto("b", 10.0, 12.0))
            .await
            .unwrap();
        let _open_1 = create(&user, objective_id, kr_dto("c", 10.0, 0.0))
            .await
            .unwrap();
        let _open_2 = create(&user, objective_id, kr_dto("d", 10.0, 3.0))
            .await
            .unwrap();
        assert_eq!(stored_progress(objective_id).await, 50);

        delete(&user, objective_id, done_1.key_result.id)
            .await
            .unwrap();

        let remaining = repository::list_for_objective(objective_id).await.unwrap();
        assert_eq!(remaining.len(), 3);
        // 1 из 3 выполнен: round(100/3) = 33
        assert_eq!(stored_progress(objective_id).await, 33);
    }

    #[tokio::test]
    async fn delete_below_minimum_is_rejected() {
        let user = test_user();
        let objective_id = new_objective(&user).await;

        let kr = create(&user, objective_id, kr_dto("a", 10.0, 0.0))
            .await
            .unwrap();
        create(&user, objective_id, kr_dto("b", 10.0, 0.0))
            .await
            .unwrap();
        create(&user, objective_id, kr_dto("c", 10.0, 0.0))
            .await
            .unwrap();

        let err = delete(&user, objective_id, kr.key_result.id)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::BadRequest(_)));

        // Все три на месте
        let siblings = repository::list_for_objective(objective_id).await.unwrap();
        assert_eq!(siblings.len(), 3);
    }

    #[tokio::test]
    async fn toggle_twice_is_idempotent() {
        let user = test_user();
        let objective_id = new_objective(&user).await;
        let kr = create(&user, objective_id, kr_dto("a", 10.0, 0.0))
            .await
            .unwrap();

        let toggled = toggle_completion(&user, objective_id, kr.key_result.id)
            .await
            .unwrap();
        assert!(toggled.key_result.is_completed);
        assert!(toggled.key_result.completed_at.is_some());
        assert_eq!(stored_progress(objective_id).await, 100);

        let toggled = toggle_completion(&user, objective_id, kr.key_result.id)
            .await
            .unwrap();
        assert!(!toggled.key_result.is_completed);
        assert!(toggled.key_result.completed_at.is_none());
        assert_eq!(stored_progress(objective_id).await, 0);
    }

    #[tokio::test]
    async fn completed_at_follows_flag_transitions() {
        let user = test_user();
        let objective_id = new_objective(&user).await;
        let kr = create(&user, objective_id, kr_dto("a", 10.0, 0.0))
            .await
            .unwrap();
        let id = kr.key_result.id;

        let updated = update(
            &user,
            objective_id,
            id,
            UpdateKeyResultDto {
                is_completed: Some(true),
                ..UpdateKeyResultDto::default()
            },
        )
        .await
        .unwrap();
        assert!(updated.key_result.completed_at.is_some());
        let completed_at = updated.key_result.completed_at;

        // Обновление без смены флага не трогает completed_at
        let updated = update(
            &user,
            objective_id,
            id,
            UpdateKeyResultDto {
                title: Some("renamed".to_string()),
                ..UpdateKeyResultDto::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.key_result.completed_at, completed_at);

        let updated = update(
            &user,
            objective_id,
            id,
            UpdateKeyResultDto {
                is_completed: Some(false),
                ..UpdateKeyResultDto::default()
            },
        )
        .await
        .unwrap();
        assert!(updated.key_result.completed_at.is_none());
    }

    #[tokio::test]
    async fn order_is_assigned_by_counting() {
        let user = test_user();
        let objective_id = new_objective(&user).await;

        let first = create(&user, objective_id, kr_dto("a", 10.0, 0.0))
            .await
            .unwrap();
        let second = create(&user, objective_id, kr_dto("b", 10.0, 0.0))
            .await
            .unwrap();
        assert_eq!(first.key_result.order, 0);
        assert_eq!(second.key_result.order, 1);

        let explicit = create(
            &user,
            objective_id,
            CreateKeyResultDto {
                order: Some(42),
                ..kr_dto("c", 10.0, 0.0)
            },
        )
        .await
        .unwrap();
        assert_eq!(explicit.key_result.order, 42);
    }

    #[tokio::test]
    async fn stranger_gets_not_found_everywhere() {
        let owner = test_user();
        let stranger = test_user();
        let objective_id = new_objective(&owner).await;
        let kr = create(&owner, objective_id, kr_dto("a", 10.0, 0.0))
            .await
            .unwrap();
        let id = kr.key_result.id;

        let err = create(&stranger, objective_id, kr_dto("b", 10.0, 0.0))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));

        let err = list(&stranger, objective_id).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));

        let err = update(
            &stranger,
            objective_id,
            id,
            UpdateKeyResultDto::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));

        let err = delete(&stranger, objective_id, id).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));

        let err = toggle_completion(&stranger, objective_id, id)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));

        // Данные владельца не изменились
        let mine = list(&owner, objective_id).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].key_result.title, "a");
    }

    #[tokio::test]
    async fn batch_update_isolates_per_item_failures() {
        let owner = test_user();
        let stranger = test_user();

        let objective_id = new_objective(&owner).await;
        let kr_1 = create(&owner, objective_id, kr_dto("a", 10.0, 0.0))
            .await
            .unwrap();
        let kr_2 = create(&owner, objective_id, kr_dto("b", 10.0, 0.0))
            .await
            .unwrap();

        // Ключевой результат другого пользователя
        let foreign_objective = new_objective(&stranger).await;
        let foreign_kr = create(&stranger, foreign_objective, kr_dto("x", 10.0, 0.0))
            .await
            .unwrap();

        let report = batch_update(
            &owner,
            objective_id,
            vec![
                BatchUpdateItemDto {
                    id: kr_1.key_result.to_string_id(),
                    update: UpdateKeyResultDto {
                        current_value: Some(4.0),
                        ..UpdateKeyResultDto::default()
                    },
                },
                BatchUpdateItemDto {
                    id: foreign_kr.key_result.to_string_id(),
                    update: UpdateKeyResultDto {
                        current_value: Some(9.0),
                        ..UpdateKeyResultDto::default()
                    },
                },
                BatchUpdateItemDto {
                    id: kr_2.key_result.to_string_id(),
                    update: UpdateKeyResultDto {
                        current_value: Some(6.0),
                        ..UpdateKeyResultDto::default()
                    },
                },
            ],
        )
        .await
        .unwrap();

        assert_eq!(report.success, 2);
        assert_eq!(report.errors, 1);
        assert!(report.results[0].success);
        assert!(!report.results[1].success);
        assert!(report.results[2].success);

        // Валидные элементы применились, чужой — нет
        let mine = list(&owner, objective_id).await.unwrap();
        assert_eq!(mine[0].key_result.current_value, 4.0);
        assert_eq!(mine[1].key_result.current_value, 6.0);

        let untouched = repository::find_by_id(foreign_kr.key_result.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(untouched.current_value, 0.0);
    }
}
