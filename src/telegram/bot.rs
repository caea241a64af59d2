//! Bot initialization
//!
//! This module contains:
//! - Command enum definition
//! - Bot instance creation
//! - Command menu registration

use reqwest::ClientBuilder;
use secrecy::ExposeSecret;
use teloxide::prelude::*;
use teloxide::types::BotCommand;
use teloxide::utils::command::BotCommands;

use crate::core::config::{self, Config};
use crate::telegram::router::CommandKind;

/// Bot commands enum with descriptions
///
/// Commands taking arguments keep the raw remainder of the message, split by
/// whitespace in `into_parts`.
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "start the bot")]
    Start(String),
    #[command(description = "show this help message")]
    Help,
    #[command(description = "show user info")]
    Info(String),
    #[command(description = "add balance (owner only)")]
    Add(String),
    #[command(description = "remove balance (owner only)")]
    Remove(String),
    #[command(description = "set or update account number")]
    Accno(String),
    #[command(description = "show bot statistics (owner only)")]
    Stats,
    #[command(description = "broadcast the replied message (owner only)")]
    Broadcast,
}

impl Command {
    pub fn into_parts(self) -> (CommandKind, Vec<String>) {
        let split = |raw: String| raw.split_whitespace().map(str::to_string).collect::<Vec<_>>();
        match self {
            Command::Start(args) => (CommandKind::Start, split(args)),
            Command::Help => (CommandKind::Help, Vec::new()),
            Command::Info(args) => (CommandKind::Info, split(args)),
            Command::Add(args) => (CommandKind::Add, split(args)),
            Command::Remove(args) => (CommandKind::Remove, split(args)),
            Command::Accno(args) => (CommandKind::Accno, split(args)),
            Command::Stats => (CommandKind::Stats, Vec::new()),
            Command::Broadcast => (CommandKind::Broadcast, Vec::new()),
        }
    }
}

/// Creates a Bot instance with a request timeout above the long polling timeout
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(anyhow::Error)` - Failed to build the HTTP client
pub fn create_bot(config: &Config) -> anyhow::Result<Bot> {
    let client = ClientBuilder::new().timeout(config::network::timeout()).build()?;
    Ok(Bot::with_client(config.bot_token.expose_secret(), client))
}

/// Sets up the command menu shown to users; owner commands stay unlisted.
///
/// # Arguments
/// * `bot` - Bot instance to configure
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    bot.set_my_commands(vec![
        BotCommand::new("start", "🚀 Start the bot"),
        BotCommand::new("help", "📖 Show the help message"),
        BotCommand::new("info", "ℹ️ Show your user info"),
        BotCommand::new("accno", "🆔 Set or update account number"),
    ])
    .await?;

    Ok(())
}
