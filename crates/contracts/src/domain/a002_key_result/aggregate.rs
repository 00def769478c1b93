use crate::domain::a001_objective::aggregate::ObjectiveId;
use crate::domain::common::{AggregateId, EntityMetadata};
use crate::domain::progress;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// ID типа для агрегата Key Result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyResultId(pub Uuid);

impl KeyResultId {
    pub fn new(value: Uuid) -> Self {
        Self(value)
    }
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl AggregateId for KeyResultId {
    fn as_string(&self) -> String {
        self.0.to_string()
    }
    fn from_string(s: &str) -> Result<Self, String> {
        Uuid::parse_str(s)
            .map(KeyResultId::new)
            .map_err(|e| format!("Invalid UUID: {}", e))
    }
}

/// Агрегат Key Result (ключевой результат цели)
///
/// `user_id` денормализован с родительской цели: проверка владения
/// выполняется по обоим полям (`objective_id` + `user_id`) на каждом
/// обращении.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyResult {
    pub id: KeyResultId,

    /// Родительская цель (владеет жизненным циклом записи)
    pub objective_id: ObjectiveId,

    /// Владелец (денормализован для быстрой фильтрации)
    pub user_id: String,

    /// Название ключевого результата
    pub title: String,

    /// Описание
    pub description: Option<String>,

    /// Целевое значение
    pub target_value: f64,

    /// Текущее значение
    pub current_value: f64,

    /// Единица измерения
    pub unit: Option<String>,

    /// Порядок сортировки (стабильный ключ)
    pub order: i32,

    pub is_completed: bool,

    /// Момент выполнения; ставится/сбрасывается при смене is_completed
    pub completed_at: Option<DateTime<Utc>>,

    /// Метаданные жизненного цикла
    #[serde(flatten)]
    pub metadata: EntityMetadata,
}

impl KeyResult {
    /// Имя коллекции в document store
    pub const COLLECTION: &'static str = "a002_key_result";

    /// Минимум ключевых результатов у цели; удаление ниже порога запрещено
    pub const MIN_PER_OBJECTIVE: usize = 3;

    pub fn new_for_insert(
        objective_id: ObjectiveId,
        user_id: String,
        title: String,
        description: Option<String>,
        target_value: f64,
        current_value: Option<f64>,
        unit: Option<String>,
        order: i32,
    ) -> Self {
        let current_value = current_value.unwrap_or(0.0);
        // Автовыполнение только в момент создания
        let is_completed = current_value >= target_value;
        let completed_at = if is_completed { Some(Utc::now()) } else { None };

        Self {
            id: KeyResultId::new_v4(),
            objective_id,
            user_id,
            title,
            description,
            target_value,
            current_value,
            unit,
            order,
            is_completed,
            completed_at,
            metadata: EntityMetadata::new(),
        }
    }

    pub fn to_string_id(&self) -> String {
        self.id.as_string()
    }

    /// Производный процент выполнения (не хранится)
    pub fn completion_percentage(&self) -> i32 {
        progress::completion_percentage(self.current_value, self.target_value)
    }

    /// Переключить флаг выполнения, поддерживая completed_at
    pub fn toggle_completion(&mut self) {
        self.is_completed = !self.is_completed;
        self.completed_at = if self.is_completed { Some(Utc::now()) } else { None };
        self.metadata.touch();
    }
}

/// Ключевой результат с производным процентом (ответ API)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyResultWithProgress {
    #[serde(flatten)]
    pub key_result: KeyResult,
    pub completion_percentage: i32,
}

impl From<KeyResult> for KeyResultWithProgress {
    fn from(key_result: KeyResult) -> Self {
        let completion_percentage = key_result.completion_percentage();
        Self {
            key_result,
            completion_percentage,
        }
    }
}
