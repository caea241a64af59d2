//! Telegram bot integration: routing, fan-out and the teloxide adapter

pub mod bot;
pub mod broadcast;
pub mod callback;
pub mod handlers;
pub mod keyboards;
pub mod messenger;
pub mod notifications;
pub mod router;
pub mod texts;

// Re-exports for convenience
pub use bot::{create_bot, setup_bot_commands, Command};
pub use broadcast::{BroadcastReport, Broadcaster};
pub use handlers::{schema, HandlerDeps, HandlerError};
pub use messenger::{BroadcastSource, Messenger, TelegramMessenger};
pub use router::{CallbackEvent, CallbackReply, Caller, CommandEvent, CommandKind, CommandRouter, Reply, RouterSettings};
