//! Persistence: SQLite pool, migrations and the user store

pub mod db;
pub mod error;
pub mod migrations;
pub mod users;

// Re-exports for convenience
pub use db::{create_pool, get_connection, DbConnection, DbPool};
pub use error::{StoreError, StoreResult};
pub use users::{SqliteUserStore, User, UserStats, UserStore};
