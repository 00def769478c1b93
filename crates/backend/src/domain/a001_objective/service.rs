use std::collections::HashMap;

use chrono::{DateTime, Utc};
use contracts::domain::a001_objective::aggregate::{
    Objective, ObjectiveId, ObjectiveStatus, ObjectiveWithKeyResults,
};
use contracts::domain::a002_key_result::aggregate::KeyResult;
use contracts::domain::common::AggregateId;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::repository;
use crate::domain::a002_key_result::repository as key_result_repository;
use crate::domain::a002_key_result::service::{self as key_result_service, CreateKeyResultDto};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::guard;
use crate::shared::data::db::get_store;
use crate::shared::data::store::WriteBatch;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateObjectiveDto {
    pub title: String,
    pub description: Option<String>,
    pub life_area_id: Option<String>,
    pub cycle_months: Option<i32>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// Ключевые результаты, создаваемые вместе с целью
    pub key_results: Option<Vec<CreateKeyResultDto>>,
}

/// Разреженный патч: сериализуются только переданные поля
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateObjectiveDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub life_area_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ObjectiveStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle_months: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
}

/// Создание цели; вложенные ключевые результаты создаются фан-аутом
/// через сервис ключевых результатов и перечитываются для ответа
pub async fn create(user_id: &str, dto: CreateObjectiveDto) -> DomainResult<ObjectiveWithKeyResults> {
    let objective = Objective::new_for_insert(
        user_id.to_string(),
        dto.title,
        dto.description,
        dto.life_area_id,
        dto.cycle_months,
        dto.start_date,
        dto.end_date,
    );
    repository::insert(&objective).await?;

    let objective_id = objective.id;
    if let Some(key_results) = dto.key_results {
        if !key_results.is_empty() {
            try_join_all(
                key_results
                    .into_iter()
                    .map(|kr_dto| key_result_service::create(user_id, objective_id, kr_dto)),
            )
            .await?;
        }
    }

    // Перечитываем: дети обновили производный прогресс
    let objective = repository::find_by_id(objective_id)
        .await?
        .ok_or_else(|| DomainError::not_found("Objective"))?;
    let key_results = key_result_repository::list_for_objective(objective_id).await?;

    Ok(ObjectiveWithKeyResults {
        objective,
        key_results: key_results.into_iter().map(Into::into).collect(),
    })
}

/// Все цели пользователя с их ключевыми результатами.
///
/// Ключевые результаты забираются одним in-запросом по всему набору
/// целей и группируются в памяти — никаких N+1.
pub async fn find_all(
    user_id: &str,
    life_area_id: Option<&str>,
) -> DomainResult<Vec<ObjectiveWithKeyResults>> {
    let objectives = repository::list_for_user(user_id, life_area_id).await?;
    if objectives.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<Value> = objectives
        .iter()
        .map(|o| Value::String(o.to_string_id()))
        .collect();
    let key_results = key_result_repository::list_for_objectives(ids).await?;

    let mut grouped: HashMap<String, Vec<KeyResult>> = HashMap::new();
    for key_result in key_results {
        grouped
            .entry(key_result.objective_id.as_string())
            .or_default()
            .push(key_result);
    }

    Ok(objectives
        .into_iter()
        .map(|objective| {
            let key_results = grouped
                .remove(&objective.to_string_id())
                .unwrap_or_default();
            ObjectiveWithKeyResults {
                key_results: key_results.into_iter().map(Into::into).collect(),
                objective,
            }
        })
        .collect())
}

/// Одна цель с ключевыми результатами (по времени создания)
pub async fn find_one(user_id: &str, id: ObjectiveId) -> DomainResult<ObjectiveWithKeyResults> {
    let objective = guard::require_objective(user_id, id).await?;
    let key_results = key_result_repository::list_for_objective_by_created(id).await?;

    Ok(ObjectiveWithKeyResults {
        objective,
        key_results: key_results.into_iter().map(Into::into).collect(),
    })
}

/// Слияние переданных полей + bump updated_at
pub async fn update(
    user_id: &str,
    id: ObjectiveId,
    dto: UpdateObjectiveDto,
) -> DomainResult<Objective> {
    let mut objective = guard::require_objective(user_id, id).await?;

    if let Some(title) = dto.title {
        objective.title = title;
    }
    if let Some(description) = dto.description {
        objective.description = Some(description);
    }
    if let Some(life_area_id) = dto.life_area_id {
        objective.life_area_id = Some(life_area_id);
    }
    if let Some(status) = dto.status {
        objective.status = status;
    }
    if let Some(is_active) = dto.is_active {
        objective.is_active = is_active;
    }
    if let Some(cycle_months) = dto.cycle_months {
        objective.cycle_months = cycle_months;
    }
    if let Some(start_date) = dto.start_date {
        objective.start_date = start_date;
    }
    if let Some(end_date) = dto.end_date {
        objective.end_date = end_date;
    }
    objective.metadata.touch();

    repository::save(&objective).await?;
    Ok(objective)
}

/// Удаление цели: батч по детям, затем сама цель.
///
/// Две фазы, без атомарности между ними.
pub async fn remove(user_id: &str, id: ObjectiveId) -> DomainResult<()> {
    let _objective = guard::require_objective(user_id, id).await?;

    let key_results = key_result_repository::list_for_objective(id).await?;
    if !key_results.is_empty() {
        let mut batch = WriteBatch::new();
        for key_result in &key_results {
            batch.delete(KeyResult::COLLECTION, key_result.to_string_id());
        }
        get_store().commit_batch(batch).await?;
    }

    repository::delete(id).await?;
    Ok(())
}

/// Архивация цели с каскадом на ключевые результаты.
///
/// Батч по детям коммитится первым, запись самой цели идёт второй
/// фазой — между ними атомарности нет.
pub async fn archive(user_id: &str, id: ObjectiveId) -> DomainResult<Objective> {
    let mut objective = guard::require_objective(user_id, id).await?;

    let key_results = key_result_repository::list_for_objective(id).await?;
    if !key_results.is_empty() {
        let now = Utc::now();
        let mut batch = WriteBatch::new();
        for key_result in &key_results {
            batch.update(
                KeyResult::COLLECTION,
                key_result.to_string_id(),
                json!({ "is_archived": true, "updated_at": now }),
            );
        }
        get_store().commit_batch(batch).await?;
    }

    objective.metadata.is_archived = true;
    objective.metadata.touch();
    repository::save(&objective).await?;

    Ok(objective)
}

/// Переключение статуса цели (active <-> completed)
pub async fn toggle_completion(user_id: &str, id: ObjectiveId) -> DomainResult<Objective> {
    let mut objective = guard::require_objective(user_id, id).await?;

    objective.toggle_completion();
    repository::save(&objective).await?;

    Ok(objective)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Months;

    fn test_user() -> String {
        format!("user-{}", uuid::Uuid::new_v4())
    }

    fn objective_dto(title: &str) -> CreateObjectiveDto {
        CreateObjectiveDto {
            title: title.to_string(),
            description: None,
            life_area_id: None,
            cycle_months: None,
            start_date: None,
            end_date: None,
            key_results: None,
        }
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

    #[tokio::test]
    async fn create_defaults_cycle_window() {
        let user = test_user();

        let created = create(&user, objective_dto("Learn Rust")).await.unwrap();
        let objective = created.objective;

        assert_eq!(objective.status, ObjectiveStatus::Active);
        assert_eq!(objective.progress, 0);
        assert_eq!(objective.cycle_months, Objective::DEFAULT_CYCLE_MONTHS);
        assert_eq!(
            objective.end_date,
            objective
                .start_date
                .checked_add_months(Months::new(3))
                .unwrap()
        );
        assert!(created.key_results.is_empty());
    }

    #[tokio::test]
    async fn create_with_embedded_key_results() {
        let user = test_user();

        let dto = CreateObjectiveDto {
            key_results: Some(vec![
                kr_dto("kr-a", 10.0, 0.0),
                kr_dto("kr-b", 5.0, 0.0),
                kr_dto("kr-c", 1.0, 0.0),
            ]),
            ..objective_dto("With children")
        };
        let created = create(&user, dto).await.unwrap();

        assert_eq!(created.key_results.len(), 3);
        assert_eq!(created.objective.progress, 0);
        assert!(created
            .key_results
            .iter()
            .all(|kr| !kr.key_result.is_completed));
    }

    #[tokio::test]
    async fn find_all_groups_key_results_and_filters() {
        let user = test_user();

        let first = create(
            &user,
            CreateObjectiveDto {
                life_area_id: Some("health".to_string()),
                key_results: Some(vec![kr_dto("a", 10.0, 0.0), kr_dto("b", 10.0, 0.0)]),
                ..objective_dto("First")
            },
        )
        .await
        .unwrap();
        let second = create(&user, objective_dto("Second")).await.unwrap();
        let archived = create(&user, objective_dto("Archived")).await.unwrap();
        archive(&user, archived.objective.id).await.unwrap();

        let all = find_all(&user, None).await.unwrap();
        assert_eq!(all.len(), 2);

        let first_row = all
            .iter()
            .find(|o| o.objective.id == first.objective.id)
            .unwrap();
        let second_row = all
            .iter()
            .find(|o| o.objective.id == second.objective.id)
            .unwrap();
        assert_eq!(first_row.key_results.len(), 2);
        assert!(second_row.key_results.is_empty());

        let filtered = find_all(&user, Some("health")).await.unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].objective.id, first.objective.id);
    }

    #[tokio::test]
    async fn ownership_is_indistinguishable_from_absence() {
        let owner = test_user();
        let stranger = test_user();

        let created = create(&owner, objective_dto("Mine")).await.unwrap();
        let id = created.objective.id;

        let err = find_one(&stranger, id).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));

        let err = update(&stranger, id, UpdateObjectiveDto::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));

        let err = remove(&stranger, id).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));

        // Запись владельца не пострадала
        assert!(find_one(&owner, id).await.is_ok());
    }

    #[tokio::test]
    async fn update_merges_only_present_fields() {
        let user = test_user();

        let created = create(
            &user,
            CreateObjectiveDto {
                description: Some("keep me".to_string()),
                ..objective_dto("Before")
            },
        )
        .await
        .unwrap();

        let updated = update(
            &user,
            created.objective.id,
            UpdateObjectiveDto {
                title: Some("After".to_string()),
                ..UpdateObjectiveDto::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.title, "After");
        assert_eq!(updated.description.as_deref(), Some("keep me"));
        assert!(updated.metadata.updated_at >= created.objective.metadata.updated_at);
    }

    #[tokio::test]
    async fn toggle_completion_flips_status() {
        let user = test_user();
        let created = create(&user, objective_dto("Toggle me")).await.unwrap();

        let toggled = toggle_completion(&user, created.objective.id).await.unwrap();
        assert_eq!(toggled.status, ObjectiveStatus::Completed);

        let toggled = toggle_completion(&user, created.objective.id).await.unwrap();
        assert_eq!(toggled.status, ObjectiveStatus::Active);
    }

    #[tokio::test]
    async fn archive_cascades_to_key_results() {
        let user = test_user();
        let dto = CreateObjectiveDto {
            key_results: Some(vec![
                kr_dto("a", 10.0, 0.0),
                kr_dto("b", 10.0, 0.0),
                kr_dto("c", 10.0, 0.0),
            ]),
            ..objective_dto("To archive")
        };
        let created = create(&user, dto).await.unwrap();

        let archived = archive(&user, created.objective.id).await.unwrap();
        assert!(archived.metadata.is_archived);

        let children = key_result_repository::list_for_objective(created.objective.id)
            .await
            .unwrap();
        assert_eq!(children.len(), 3);
        assert!(children.iter().all(|kr| kr.metadata.is_archived));

        // Архивная цель пропадает из списков, но остаётся доступной точечно
        assert!(find_all(&user, None).await.unwrap().is_empty());
        assert!(find_one(&user, created.objective.id).await.is_ok());
    }

    #[tokio::test]
    async fn remove_cascades_to_key_results() {
        let user = test_user();
        let dto = CreateObjectiveDto {
            key_results: Some(vec![
                kr_dto("a", 10.0, 0.0),
                kr_dto("b", 10.0, 0.0),
                kr_dto("c", 10.0, 0.0),
            ]),
            ..objective_dto("To remove")
        };
        let created = create(&user, dto).await.unwrap();
        let id = created.objective.id;

        remove(&user, id).await.unwrap();

        assert!(repository::find_by_id(id).await.unwrap().is_none());
        assert!(key_result_repository::list_for_objective(id)
            .await
            .unwrap()
            .is_empty());
    }
}
