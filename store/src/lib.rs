pub mod task_store;

pub use task_store::{TaskRecord, TaskStatus, TaskStore};
