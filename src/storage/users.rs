//! User records and the store interface behind them.
//!
//! `UserStore` is the only way the rest of the crate touches persisted users.
//! Field updates are single statements, never read-modify-write, so
//! concurrent updates to the same user never lose writes.

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Deserializer, Serialize};

use super::db::{get_connection, DbConnection, DbPool};
use super::error::{is_constraint_violation, StoreError, StoreResult};

/// A user of the bot.
///
/// Serializes to the persisted document shape
/// `{_id, referred_by, referred_to, acc_no, balance}` with zero/empty fields omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Telegram user id
    #[serde(rename = "_id")]
    pub id: i64,
    /// Who referred this user; set at most once
    #[serde(default, deserialize_with = "zero_as_none", skip_serializing_if = "Option::is_none")]
    pub referred_by: Option<i64>,
    /// Users this user referred, without duplicates
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub referred_to: Vec<i64>,
    /// Payout account number
    #[serde(
        rename = "acc_no",
        default,
        deserialize_with = "zero_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub account_number: Option<i64>,
    /// Reward balance, never negative
    #[serde(default, skip_serializing_if = "is_zero")]
    pub balance: f64,
}

impl User {
    /// A brand-new user without referrer and with a zero balance.
    pub fn new(id: i64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// A brand-new user referred by `referrer_id`.
    pub fn referred(id: i64, referrer_id: i64) -> Self {
        Self {
            id,
            referred_by: Some(referrer_id),
            ..Self::default()
        }
    }

    pub fn referral_count(&self) -> usize {
        self.referred_to.len()
    }
}

fn is_zero(value: &f64) -> bool {
    *value == 0.0
}

fn zero_as_none<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<i64>::deserialize(deserializer)?;
    Ok(value.filter(|v| *v != 0))
}

/// Aggregate numbers for the owner's /stats
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UserStats {
    pub total_users: u64,
    pub referred_users: u64,
    pub total_balance: f64,
}

/// Data access interface over user records.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a new user; `Duplicate` when the id is taken.
    async fn create(&self, user: &User) -> StoreResult<i64>;

    async fn get_by_id(&self, id: i64) -> StoreResult<User>;

    async fn exists(&self, id: i64) -> StoreResult<bool>;

    /// Overwrites the balance; negative or non-finite values are rejected.
    async fn update_balance(&self, id: i64, new_balance: f64) -> StoreResult<()>;

    /// Atomically applies `max(balance + delta, 0)` rounded to cents and
    /// returns the resulting balance.
    async fn adjust_balance(&self, id: i64, delta: f64) -> StoreResult<f64>;

    /// Adds `referred_id` to the referral set of `id`. Adding an id that is
    /// already present is a no-op.
    async fn add_referred_user(&self, id: i64, referred_id: i64) -> StoreResult<()>;

    async fn update_account_number(&self, id: i64, account_number: i64) -> StoreResult<()>;

    async fn delete_by_id(&self, id: i64) -> StoreResult<()>;

    /// Users with an id greater than `after`, ordered by id, at most `limit` of them.
    async fn list_page(&self, after: Option<i64>, limit: usize) -> StoreResult<Vec<User>>;

    /// Whether any user's referral set contains `id`.
    async fn is_referred_by_anyone(&self, id: i64) -> StoreResult<bool>;

    async fn stats(&self) -> StoreResult<UserStats>;

    async fn ping(&self) -> StoreResult<()>;

    /// Every user, fetched page by page. Prefer `list_page` for large stores.
    async fn list_all(&self) -> StoreResult<Vec<User>> {
        const PAGE: usize = 1000;
        let mut users = Vec::new();
        let mut after = None;
        loop {
            let page = self.list_page(after, PAGE).await?;
            let done = page.len() < PAGE;
            after = page.last().map(|u| u.id);
            users.extend(page);
            if done {
                return Ok(users);
            }
        }
    }
}

const SELECT_USER: &str = "SELECT u.id, u.referred_by, u.acc_no, u.balance,
        (SELECT group_concat(r.referred_id) FROM referred_users r WHERE r.user_id = u.id)
     FROM users u";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let referred_by: i64 = row.get(1)?;
    let account_number: i64 = row.get(2)?;
    let referred: Option<String> = row.get(4)?;
    Ok(User {
        id: row.get(0)?,
        referred_by: (referred_by != 0).then_some(referred_by),
        referred_to: referred
            .as_deref()
            .map(|list| list.split(',').filter_map(|id| id.parse().ok()).collect())
            .unwrap_or_default(),
        account_number: (account_number != 0).then_some(account_number),
        balance: row.get(3)?,
    })
}

/// `UserStore` backed by the SQLite pool.
#[derive(Clone)]
pub struct SqliteUserStore {
    pool: Arc<DbPool>,
}

impl SqliteUserStore {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    fn conn(&self) -> StoreResult<DbConnection> {
        get_connection(&self.pool)
    }
}

fn user_exists(conn: &DbConnection, id: i64) -> StoreResult<bool> {
    let exists = conn.query_row("SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)", [id], |row| {
        row.get::<_, bool>(0)
    })?;
    Ok(exists)
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn create(&self, user: &User) -> StoreResult<i64> {
        if !user.balance.is_finite() || user.balance < 0.0 {
            return Err(StoreError::InvalidValue(format!("balance {}", user.balance)));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let inserted = tx.execute(
            "INSERT INTO users (id, referred_by, acc_no, balance) VALUES (?1, ?2, ?3, ?4)",
            params![
                user.id,
                user.referred_by.unwrap_or(0),
                user.account_number.unwrap_or(0),
                user.balance
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_constraint_violation(&e) => return Err(StoreError::Duplicate(user.id)),
            Err(e) => return Err(e.into()),
        }
        for referred_id in &user.referred_to {
            tx.execute(
                "INSERT OR IGNORE INTO referred_users (user_id, referred_id) VALUES (?1, ?2)",
                params![user.id, referred_id],
            )?;
        }
        tx.commit()?;
        Ok(user.id)
    }

    async fn get_by_id(&self, id: i64) -> StoreResult<User> {
        let conn = self.conn()?;
        conn.query_row(&format!("{} WHERE u.id = ?1", SELECT_USER), [id], user_from_row)
            .optional()?
            .ok_or(StoreError::NotFound(id))
    }

    async fn exists(&self, id: i64) -> StoreResult<bool> {
        let conn = self.conn()?;
        user_exists(&conn, id)
    }

    async fn update_balance(&self, id: i64, new_balance: f64) -> StoreResult<()> {
        if !new_balance.is_finite() || new_balance < 0.0 {
            return Err(StoreError::InvalidValue(format!("balance {}", new_balance)));
        }
        let conn = self.conn()?;
        let changed = conn.execute("UPDATE users SET balance = ?2 WHERE id = ?1", params![id, new_balance])?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn adjust_balance(&self, id: i64, delta: f64) -> StoreResult<f64> {
        if !delta.is_finite() {
            return Err(StoreError::InvalidValue(format!("balance change {}", delta)));
        }
        let conn = self.conn()?;
        conn.query_row(
            "UPDATE users SET balance = ROUND(MAX(balance + ?2, 0.0), 2) WHERE id = ?1 RETURNING balance",
            params![id, delta],
            |row| row.get::<_, f64>(0),
        )
        .optional()?
        .ok_or(StoreError::NotFound(id))
    }

    async fn add_referred_user(&self, id: i64, referred_id: i64) -> StoreResult<()> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO referred_users (user_id, referred_id)
             SELECT ?1, ?2 WHERE EXISTS (SELECT 1 FROM users WHERE id = ?1)",
            params![id, referred_id],
        )?;
        // Nothing inserted: either already in the set or the owner is missing.
        if inserted == 0 && !user_exists(&conn, id)? {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn update_account_number(&self, id: i64, account_number: i64) -> StoreResult<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE users SET acc_no = ?2 WHERE id = ?1",
            params![id, account_number],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn delete_by_id(&self, id: i64) -> StoreResult<()> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
        if deleted == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn list_page(&self, after: Option<i64>, limit: usize) -> StoreResult<Vec<User>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(&format!("{} WHERE u.id > ?1 ORDER BY u.id LIMIT ?2", SELECT_USER))?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let users = stmt
            .query_map(params![after.unwrap_or(i64::MIN), limit], user_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    async fn is_referred_by_anyone(&self, id: i64) -> StoreResult<bool> {
        let conn = self.conn()?;
        let referred = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM referred_users WHERE referred_id = ?1)",
            [id],
            |row| row.get::<_, bool>(0),
        )?;
        Ok(referred)
    }

    async fn stats(&self) -> StoreResult<UserStats> {
        let conn = self.conn()?;
        let stats = conn.query_row(
            "SELECT COUNT(*), COUNT(CASE WHEN referred_by != 0 THEN 1 END), COALESCE(SUM(balance), 0.0) FROM users",
            [],
            |row| {
                Ok(UserStats {
                    total_users: row.get::<_, i64>(0)?.try_into().unwrap_or_default(),
                    referred_users: row.get::<_, i64>(1)?.try_into().unwrap_or_default(),
                    total_balance: row.get(2)?,
                })
            },
        )?;
        Ok(stats)
    }

    async fn ping(&self) -> StoreResult<()> {
        super::db::ping(&self.pool)
    }
}
