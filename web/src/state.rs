use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use proxy::SharedProxyRegistry;
use store::TaskStore;

/// Shared `actix-web` app data: one task store and one proxy registry per process,
/// constructed once in `main` and handed to every route (§6).
pub struct AppState {
    pub store: Arc<TaskStore>,
    pub registry: SharedProxyRegistry,
    next_task_id: AtomicI64,
}

impl AppState {
    pub fn new(store: Arc<TaskStore>, registry: SharedProxyRegistry) -> Self {
        Self { store, registry, next_task_id: AtomicI64::new(1) }
    }

    pub fn next_task_id(&self) -> i64 {
        self.next_task_id.fetch_add(1, Ordering::SeqCst)
    }
}
