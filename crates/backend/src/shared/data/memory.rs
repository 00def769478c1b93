use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::store::{
    DocumentStore, Filter, FilterOp, Query, SortDirection, StoreError, StoreResult,
    StoreTransaction, WriteBatch, WriteOp,
};

/// Коллекции документов: collection -> id -> JSON документ
type Collections = HashMap<String, HashMap<String, Value>>;

/// In-memory document store с опциональным JSON-снапшотом на диске.
///
/// Транзакция удерживает mutex на всё время жизни, поэтому её чтения
/// видят согласованный снимок, а параллельные транзакции сериализуются.
pub struct MemoryStore {
    data: Arc<Mutex<Collections>>,
    persist_path: Option<PathBuf>,
}

impl MemoryStore {
    /// Эфемерное хранилище без персистентности
    pub fn new() -> Self {
        Self {
            data: Arc::new(Mutex::new(Collections::new())),
            persist_path: None,
        }
    }

    /// Открыть хранилище; существующий снапшот загружается целиком
    pub fn open(persist_path: Option<&Path>) -> StoreResult<Self> {
        let data = match persist_path {
            Some(path) if path.exists() => {
                let contents = std::fs::read_to_string(path)?;
                serde_json::from_str(&contents)?
            }
            _ => Collections::new(),
        };

        Ok(Self {
            data: Arc::new(Mutex::new(data)),
            persist_path: persist_path.map(Path::to_path_buf),
        })
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn matches(doc: &Value, filter: &Filter) -> bool {
    let field_value = doc.get(&filter.field).unwrap_or(&Value::Null);
    match filter.op {
        FilterOp::Eq => field_value == &filter.value,
        FilterOp::In => match &filter.value {
            Value::Array(values) => values.iter().any(|v| v == field_value),
            _ => false,
        },
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .unwrap_or(0.0)
            .partial_cmp(&y.as_f64().unwrap_or(0.0))
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

fn run_query(data: &Collections, query: &Query) -> Vec<Value> {
    let mut docs: Vec<Value> = data
        .get(&query.collection)
        .map(|collection| {
            collection
                .values()
                .filter(|doc| query.filters.iter().all(|f| matches(doc, f)))
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    if !query.order_by.is_empty() {
        docs.sort_by(|a, b| {
            for (field, direction) in &query.order_by {
                let av = a.get(field).unwrap_or(&Value::Null);
                let bv = b.get(field).unwrap_or(&Value::Null);
                let ord = match direction {
                    SortDirection::Asc => compare_values(av, bv),
                    SortDirection::Desc => compare_values(av, bv).reverse(),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
    }

    if let Some(limit) = query.limit {
        docs.truncate(limit);
    }

    docs
}

fn apply_op(data: &mut Collections, op: &WriteOp) -> StoreResult<()> {
    match op {
        WriteOp::Set {
            collection,
            id,
            data: doc,
        } => {
            data.entry(collection.clone())
                .or_default()
                .insert(id.clone(), doc.clone());
            Ok(())
        }
        WriteOp::Update {
            collection,
            id,
            patch,
        } => {
            let doc = data
                .get_mut(collection)
                .and_then(|c| c.get_mut(id))
                .ok_or_else(|| StoreError::NotFound {
                    collection: collection.clone(),
                    id: id.clone(),
                })?;

            let target = doc.as_object_mut().ok_or_else(|| StoreError::NotAnObject {
                collection: collection.clone(),
                id: id.clone(),
            })?;
            let patch = patch.as_object().ok_or_else(|| StoreError::NotAnObject {
                collection: collection.clone(),
                id: id.clone(),
            })?;

            // null в патче — явная запись null, а не удаление поля
            for (key, value) in patch {
                target.insert(key.clone(), value.clone());
            }
            Ok(())
        }
        WriteOp::Delete { collection, id } => {
            if let Some(c) = data.get_mut(collection) {
                c.remove(id);
            }
            Ok(())
        }
    }
}

/// Снапшот best-effort: ошибка пишется в лог и не поднимается наружу
fn flush(persist_path: &Option<PathBuf>, data: &Collections) {
    let Some(path) = persist_path else {
        return;
    };

    let result = (|| -> StoreResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(data)?;
        std::fs::write(path, contents)?;
        Ok(())
    })();

    if let Err(e) = result {
        tracing::warn!(
            "Failed to persist store snapshot to {}: {}",
            path.display(),
            e
        );
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>> {
        let data = self.data.lock().await;
        Ok(data.get(collection).and_then(|c| c.get(id)).cloned())
    }

    async fn set(&self, collection: &str, id: &str, doc: Value) -> StoreResult<()> {
        let mut data = self.data.lock().await;
        apply_op(
            &mut data,
            &WriteOp::Set {
                collection: collection.to_string(),
                id: id.to_string(),
                data: doc,
            },
        )?;
        flush(&self.persist_path, &data);
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> StoreResult<()> {
        let mut data = self.data.lock().await;
        apply_op(
            &mut data,
            &WriteOp::Update {
                collection: collection.to_string(),
                id: id.to_string(),
                patch,
            },
        )?;
        flush(&self.persist_path, &data);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        let mut data = self.data.lock().await;
        apply_op(
            &mut data,
            &WriteOp::Delete {
                collection: collection.to_string(),
                id: id.to_string(),
            },
        )?;
        flush(&self.persist_path, &data);
        Ok(())
    }

    async fn query(&self, query: Query) -> StoreResult<Vec<Value>> {
        let data = self.data.lock().await;
        Ok(run_query(&data, &query))
    }

    async fn commit_batch(&self, batch: WriteBatch) -> StoreResult<()> {
        let mut data = self.data.lock().await;

        // Применяем к копии: пакет либо проходит целиком, либо не меняет ничего
        let mut next = data.clone();
        for op in &batch.ops {
            apply_op(&mut next, op)?;
        }
        *data = next;
        flush(&self.persist_path, &data);
        Ok(())
    }

    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let guard = Arc::clone(&self.data).lock_owned().await;
        Ok(Box::new(MemoryTransaction {
            guard,
            writes: Vec::new(),
            persist_path: self.persist_path.clone(),
        }))
    }
}

struct MemoryTransaction {
    guard: OwnedMutexGuard<Collections>,
    writes: Vec<WriteOp>,
    persist_path: Option<PathBuf>,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn get(&mut self, collection: &str, id: &str) -> StoreResult<Option<Value>> {
        if !self.writes.is_empty() {
            return Err(StoreError::ReadAfterWrite);
        }
        Ok(self.guard.get(collection).and_then(|c| c.get(id)).cloned())
    }

    async fn query(&mut self, query: Query) -> StoreResult<Vec<Value>> {
        if !self.writes.is_empty() {
            return Err(StoreError::ReadAfterWrite);
        }
        Ok(run_query(&self.guard, &query))
    }

    fn set(&mut self, collection: &str, id: &str, data: Value) {
        self.writes.push(WriteOp::Set {
            collection: collection.to_string(),
            id: id.to_string(),
            data,
        });
    }

    fn update(&mut self, collection: &str, id: &str, patch: Value) {
        self.writes.push(WriteOp::Update {
            collection: collection.to_string(),
            id: id.to_string(),
            patch,
        });
    }

    fn delete(&mut self, collection: &str, id: &str) {
        self.writes.push(WriteOp::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        });
    }

    async fn commit(mut self: Box<Self>) -> StoreResult<()> {
        let mut next = (*self.guard).clone();
        for op in &self.writes {
            apply_op(&mut next, op)?;
        }
        *self.guard = next;
        flush(&self.persist_path, &self.guard);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn set_then_get_roundtrip() {
        let store = MemoryStore::new();
        store
            .set("items", "1", json!({"id": "1", "name": "first"}))
            .await
            .unwrap();

        let doc = store.get("items", "1").await.unwrap().unwrap();
        assert_eq!(doc["name"], "first");
        assert!(store.get("items", "2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_merges_top_level_fields() {
        let store = MemoryStore::new();
        store
            .set("items", "1", json!({"id": "1", "a": 1, "b": 2}))
            .await
            .unwrap();
        store
            .update("items", "1", json!({"b": 3, "c": null}))
            .await
            .unwrap();

        let doc = store.get("items", "1").await.unwrap().unwrap();
        assert_eq!(doc["a"], 1);
        assert_eq!(doc["b"], 3);
        assert!(doc["c"].is_null());
    }

    #[tokio::test]
    async fn update_missing_document_is_not_found() {
        let store = MemoryStore::new();
        let err = store.update("items", "nope", json!({"a": 1})).await;
        assert!(matches!(err, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn query_filters_sorts_and_limits() {
        let store = MemoryStore::new();
        store
            .set("items", "1", json!({"id": "1", "owner": "u1", "order": 2}))
            .await
            .unwrap();
        store
            .set("items", "2", json!({"id": "2", "owner": "u1", "order": 1}))
            .await
            .unwrap();
        store
            .set("items", "3", json!({"id": "3", "owner": "u2", "order": 0}))
            .await
            .unwrap();

        let docs = store
            .query(
                Query::new("items")
                    .where_eq("owner", "u1")
                    .order_by("order", SortDirection::Asc),
            )
            .await
            .unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0]["id"], "2");
        assert_eq!(docs[1]["id"], "1");

        let docs = store
            .query(
                Query::new("items")
                    .where_in("id", vec![json!("1"), json!("3")])
                    .order_by("order", SortDirection::Desc)
                    .limit(1),
            )
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["id"], "1");
    }

    #[tokio::test]
    async fn batch_is_all_or_nothing() {
        let store = MemoryStore::new();

        let mut batch = WriteBatch::new();
        batch.set("items", "1", json!({"id": "1"}));
        // Update несуществующего документа валит весь пакет
        batch.update("items", "missing", json!({"a": 1}));

        let err = store.commit_batch(batch).await;
        assert!(matches!(err, Err(StoreError::NotFound { .. })));
        assert!(store.get("items", "1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn transaction_rejects_read_after_write() {
        let store = MemoryStore::new();
        store.set("items", "1", json!({"id": "1"})).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(tx.get("items", "1").await.unwrap().is_some());

        tx.update("items", "1", json!({"a": 1}));
        let err = tx.get("items", "1").await;
        assert!(matches!(err, Err(StoreError::ReadAfterWrite)));

        tx.commit().await.unwrap();
        let doc = store.get("items", "1").await.unwrap().unwrap();
        assert_eq!(doc["a"], 1);
    }

    #[tokio::test]
    async fn transaction_commit_is_atomic() {
        let store = MemoryStore::new();
        store.set("items", "1", json!({"id": "1", "a": 0})).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let _ = tx.get("items", "1").await.unwrap();
        tx.update("items", "1", json!({"a": 1}));
        tx.update("items", "missing", json!({"a": 1}));

        let err = tx.commit().await;
        assert!(matches!(err, Err(StoreError::NotFound { .. })));

        // Первая операция не должна была примениться
        let doc = store.get("items", "1").await.unwrap().unwrap();
        assert_eq!(doc["a"], 0);
    }
}
