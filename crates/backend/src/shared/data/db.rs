use std::path::Path;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use super::memory::MemoryStore;
use super::store::DocumentStore;

static STORE: OnceCell<Arc<dyn DocumentStore>> = OnceCell::new();

/// Initialize the process-wide document store (loads snapshot from config path)
pub fn initialize_store(persist_path: Option<&Path>) -> anyhow::Result<()> {
    let store = MemoryStore::open(persist_path)?;
    STORE
        .set(Arc::new(store))
        .map_err(|_| anyhow::anyhow!("Failed to set STORE"))?;
    Ok(())
}

/// Get the process-wide document store.
///
/// Falls back to an ephemeral in-memory store when `initialize_store` was
/// never called (unit tests run without the boot wiring).
pub fn get_store() -> &'static Arc<dyn DocumentStore> {
    STORE.get_or_init(|| Arc::new(MemoryStore::new()))
}
