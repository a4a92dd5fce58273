//! A kanban task board: a persistent task store plus a terminal board and
//! command line that drive it.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod notification;
pub mod storage;
pub mod task;
pub mod task_store;
pub mod ui;

pub use error::{Result, StorageError, TaskError};
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use task::{Priority, Stats, Status, Task, TaskFields};
pub use task_store::{Board, Recovery, TaskStore};
