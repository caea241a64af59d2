use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::storage::{StoreError, UserStore};

#[derive(Parser)]
#[command(name = "referearn")]
#[command(author, version, about = "Referral and reward Telegram bot", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Run the bot (the default)
    Run {
        /// Use long polling even when WEBHOOK_URL and PORT are set
        #[arg(long)]
        polling: bool,
    },

    /// Print user totals
    Stats,

    /// Dump every user as one JSON document per line
    Export {
        /// Output file, overwritten if it exists
        path: PathBuf,
    },

    /// Delete a user record
    DeleteUser {
        /// Telegram user id
        id: i64,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Writes all users as JSON lines and returns how many were written.
pub async fn export_users(store: &dyn UserStore, out: &mut impl Write) -> anyhow::Result<usize> {
    let users = store.list_all().await?;
    for user in &users {
        serde_json::to_writer(&mut *out, user)?;
        writeln!(out)?;
    }
    out.flush()?;
    Ok(users.len())
}

pub async fn print_stats(store: &dyn UserStore, out: &mut impl Write) -> anyhow::Result<()> {
    let stats = store.stats().await?;
    writeln!(out, "Total users:         {}", stats.total_users)?;
    writeln!(out, "Referred users:      {}", stats.referred_users)?;
    writeln!(out, "Outstanding balance: {:.2}", stats.total_balance)?;
    Ok(())
}

/// Deletes a user; returns `false` when there was nothing to delete.
pub async fn delete_user(store: &dyn UserStore, id: i64) -> anyhow::Result<bool> {
    match store.delete_by_id(id).await {
        Ok(()) => {
            log::info!("Deleted user {}", id);
            Ok(true)
        }
        Err(StoreError::NotFound(_)) => Ok(false),
        Err(e) => Err(e.into()),
    }
}
