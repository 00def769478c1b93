use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Ошибки document store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("reads must precede writes inside a transaction")]
    ReadAfterWrite,

    #[error("document is not a JSON object: {collection}/{id}")]
    NotAnObject { collection: String, id: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("snapshot i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Оператор фильтрации запроса
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// Равенство поля значению
    Eq,
    /// Поле входит в список значений
    In,
}

#[derive(Debug, Clone)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

/// Запрос к коллекции: фильтры по равенству/вхождению, сортировка, лимит
#[derive(Debug, Clone)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order_by: Vec<(String, SortDirection)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            order_by: Vec::new(),
            limit: None,
        }
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            op: FilterOp::Eq,
            value: value.into(),
        });
        self
    }

    pub fn where_in(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            op: FilterOp::In,
            value: Value::Array(values),
        });
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.order_by.push((field.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Одна операция записи
#[derive(Debug, Clone)]
pub enum WriteOp {
    Set {
        collection: String,
        id: String,
        data: Value,
    },
    /// Слияние полей верхнего уровня; документ обязан существовать
    Update {
        collection: String,
        id: String,
        patch: Value,
    },
    Delete {
        collection: String,
        id: String,
    },
}

/// Пакет записей; применяется атомарно целиком
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    pub(crate) ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, collection: impl Into<String>, id: impl Into<String>, data: Value) {
        self.ops.push(WriteOp::Set {
            collection: collection.into(),
            id: id.into(),
            data,
        });
    }

    pub fn update(&mut self, collection: impl Into<String>, id: impl Into<String>, patch: Value) {
        self.ops.push(WriteOp::Update {
            collection: collection.into(),
            id: id.into(),
            patch,
        });
    }

    pub fn delete(&mut self, collection: impl Into<String>, id: impl Into<String>) {
        self.ops.push(WriteOp::Delete {
            collection: collection.into(),
            id: id.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Интерфейс document store (внешний коллаборатор хранения)
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>>;

    /// Записать документ целиком (создание или полная замена)
    async fn set(&self, collection: &str, id: &str, data: Value) -> StoreResult<()>;

    /// Слить поля patch в существующий документ
    async fn update(&self, collection: &str, id: &str, patch: Value) -> StoreResult<()>;

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()>;

    async fn query(&self, query: Query) -> StoreResult<Vec<Value>>;

    async fn commit_batch(&self, batch: WriteBatch) -> StoreResult<()>;

    /// Начать транзакцию чтение-потом-запись
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>>;
}

/// Транзакция: все чтения строго до первой записи.
///
/// Чтение после буферизованной записи — ошибка `ReadAfterWrite`
/// (ограничение модели транзакций документной БД, не стилистика).
/// Записи буферизуются и применяются атомарно в `commit`.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn get(&mut self, collection: &str, id: &str) -> StoreResult<Option<Value>>;

    async fn query(&mut self, query: Query) -> StoreResult<Vec<Value>>;

    fn set(&mut self, collection: &str, id: &str, data: Value);

    fn update(&mut self, collection: &str, id: &str, patch: Value);

    fn delete(&mut self, collection: &str, id: &str);

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}
