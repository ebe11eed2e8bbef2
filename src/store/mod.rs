//! Persistence layer: users and the task queue behind async traits.

#[cfg(test)]
mod contract;
pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use memory::MemoryStore;
pub use traits::{Database, TaskStore, User, UserStore};
