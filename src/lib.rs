//! Referearn - referral and reward Telegram bot
//!
//! Users join through referral links, referrers earn balance, and the owner
//! administers balances and broadcasts messages.
//!
//! # Module Structure
//!
//! - `core`: Configuration, errors and logging
//! - `storage`: SQLite pool, migrations and the user store
//! - `rewards`: Balance ledger and referral engine
//! - `telegram`: Command router, broadcast and the teloxide adapter
//! - `cli`: Command line interface and offline maintenance commands

pub mod cli;
pub mod core;
pub mod rewards;
pub mod storage;
pub mod telegram;

// Re-export commonly used types for convenience
pub use crate::core::{config, AppError, AppResult, Config};
pub use rewards::{BalanceLedger, ReferralEngine, ReferralOutcome};
pub use storage::{create_pool, SqliteUserStore, User, UserStore};
pub use telegram::{CommandRouter, RouterSettings};
