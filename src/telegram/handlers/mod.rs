//! Telegram bot handler tree configuration
//!
//! This module provides the main dispatcher schema for the Telegram bot.
//! Updates are translated into router events here; all decisions are made
//! by `CommandRouter`.

mod commands;
mod schema;
mod types;

pub use commands::{command_event, send_reply};
pub use schema::schema;
pub use types::{caller_from, HandlerDeps, HandlerError};
