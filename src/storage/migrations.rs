use rusqlite::Connection;
use std::sync::{Mutex, OnceLock};

use super::error::{StoreError, StoreResult};

mod embedded {
    use refinery::embed_migrations;

    embed_migrations!("./migrations");
}

static MIGRATION_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

/// Applies the embedded migrations. Refinery wraps each migration in its own
/// transaction; the process-wide lock keeps two pools opened concurrently from
/// racing on the schema history table.
pub fn run_migrations(conn: &mut Connection) -> StoreResult<()> {
    let mutex = MIGRATION_LOCK.get_or_init(|| Mutex::new(()));
    let _guard = match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("Migration lock was poisoned, recovering...");
            poisoned.into_inner()
        }
    };

    let report = embedded::migrations::runner()
        .run(conn)
        .map_err(|e| StoreError::Migration(e.to_string()))?;

    for migration in report.applied_migrations() {
        log::info!("Applied migration {}", migration);
    }
    Ok(())
}
