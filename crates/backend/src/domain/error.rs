use thiserror::Error;

use crate::shared::data::store::StoreError;

/// Ошибки доменных операций
#[derive(Debug, Error)]
pub enum DomainError {
    /// Запись отсутствует ЛИБО принадлежит другому пользователю.
    /// Случаи намеренно неразличимы: существование чужих записей
    /// не должно утекать наружу.
    #[error("{0}")]
    NotFound(String),

    /// Нарушение бизнес-правила или некорректный элемент запроса
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    pub fn not_found(entity: &str) -> Self {
        DomainError::NotFound(format!("{} not found", entity))
    }
}
