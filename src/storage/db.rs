use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;

use super::error::{StoreError, StoreResult};
use super::migrations::run_migrations;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// How long a connection waits on a locked database before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Create a new database connection pool
///
/// Initializes a connection pool with up to 10 connections and runs schema migrations.
/// Every connection enables foreign keys (referral rows cascade with their owner)
/// and WAL journaling so readers never block the single writer.
///
/// # Arguments
///
/// * `database_path` - Path to SQLite database file
///
/// # Example
///
/// ```no_run
/// use referearn::storage::create_pool;
///
/// let pool = create_pool("referearn.sqlite")?;
/// # Ok::<(), referearn::storage::StoreError>(())
/// ```
pub fn create_pool(database_path: &str) -> StoreResult<DbPool> {
    let manager = SqliteConnectionManager::file(database_path).with_init(|conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        // journal_mode answers with the resulting mode, hence the checked variant
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))
    });
    let pool = Pool::builder()
        .max_size(10) // Maximum 10 connections in the pool
        .build(manager)?;

    // Ensure schema is up to date on first connection
    let mut conn = pool.get()?;
    run_migrations(&mut conn)?;

    Ok(pool)
}

/// Get a connection from the pool
///
/// The connection is automatically returned to the pool when dropped.
pub fn get_connection(pool: &DbPool) -> StoreResult<DbConnection> {
    pool.get().map_err(StoreError::from)
}

/// Round trip to the database; used as the startup connectivity check.
pub fn ping(pool: &DbPool) -> StoreResult<()> {
    let conn = get_connection(pool)?;
    conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
    Ok(())
}
