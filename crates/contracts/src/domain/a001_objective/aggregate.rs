use crate::domain::a002_key_result::aggregate::KeyResultWithProgress;
use crate::domain::common::{AggregateId, EntityMetadata};
use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// ID типа для агрегата Objective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectiveId(pub Uuid);

impl ObjectiveId {
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

impl AggregateId for ObjectiveId {
    fn as_string(&self) -> String {
        self.0.to_string()
    }
    fn from_string(s: &str) -> Result<Self, String> {
        Uuid::parse_str(s)
            .map(ObjectiveId::new)
            .map_err(|e| format!("Invalid UUID: {}", e))
    }
}

/// Статус цели
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ObjectiveStatus {
    Active,
    Completed,
    Cancelled,
}

impl ObjectiveStatus {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "active" => Ok(ObjectiveStatus::Active),
            "completed" => Ok(ObjectiveStatus::Completed),
            "cancelled" => Ok(ObjectiveStatus::Cancelled),
            _ => Err(format!("Unknown objective status: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectiveStatus::Active => "active",
            ObjectiveStatus::Completed => "completed",
            ObjectiveStatus::Cancelled => "cancelled",
        }
    }
}

/// Агрегат Objective (цель OKR)
///
/// Поле `progress` всегда производное: доля выполненных ключевых
/// результатов цели, см. `domain::progress`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Objective {
    pub id: ObjectiveId,

    /// Владелец записи (идентификатор пользователя)
    pub user_id: String,

    /// Ссылка на сферу жизни (внешний справочник, опционально)
    pub life_area_id: Option<String>,

    /// Название цели
    pub title: String,

    /// Описание
    pub description: Option<String>,

    pub status: ObjectiveStatus,

    /// Процент выполнения (0-100, производный)
    pub progress: i32,

    pub is_active: bool,

    /// Длительность цикла в месяцах
    pub cycle_months: i32,

    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,

    /// Метаданные жизненного цикла
    #[serde(flatten)]
    pub metadata: EntityMetadata,
}

impl Objective {
    /// Имя коллекции в document store
    pub const COLLECTION: &'static str = "a001_objective";

    /// Длительность цикла по умолчанию
    pub const DEFAULT_CYCLE_MONTHS: i32 = 3;

    pub fn new_for_insert(
        user_id: String,
        title: String,
        description: Option<String>,
        life_area_id: Option<String>,
        cycle_months: Option<i32>,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
    ) -> Self {
        let cycle_months = cycle_months.unwrap_or(Self::DEFAULT_CYCLE_MONTHS);
        let start_date = start_date.unwrap_or_else(Utc::now);
        // Окно цикла по умолчанию: start + cycle_months
        let end_date = end_date.unwrap_or_else(|| {
            start_date
                .checked_add_months(Months::new(cycle_months.max(0) as u32))
                .unwrap_or(start_date)
        });

        Self {
            id: ObjectiveId::new_v4(),
            user_id,
            life_area_id,
            title,
            description,
            status: ObjectiveStatus::Active,
            progress: 0,
            is_active: true,
            cycle_months,
            start_date,
            end_date,
            metadata: EntityMetadata::new(),
        }
    }

    pub fn to_string_id(&self) -> String {
        self.id.as_string()
    }

    /// Переключить статус выполнения (active <-> completed)
    pub fn toggle_completion(&mut self) {
        self.status = match self.status {
            ObjectiveStatus::Completed => ObjectiveStatus::Active,
            _ => ObjectiveStatus::Completed,
        };
        self.metadata.touch();
    }
}

/// Цель вместе с её ключевыми результатами (ответ API)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectiveWithKeyResults {
    #[serde(flatten)]
    pub objective: Objective,
    pub key_results: Vec<KeyResultWithProgress>,
}
