//! Dispatcher schema and handler chain builders

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Message;

use super::commands::{handle_callback, handle_command};
use super::types::{HandlerDeps, HandlerError};
use crate::telegram::bot::Command;

/// Creates the main dispatcher schema for the Telegram bot.
///
/// Only commands and callback queries are handled; other messages fall through.
///
/// # Arguments
/// * `deps` - Handler dependencies (the command router)
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    dptree::entry()
        .branch(command_handler(deps.clone()))
        .branch(callback_handler(deps))
}

fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                log::info!("Received command {:?} in chat {}", cmd, msg.chat.id);
                if let Err(e) = handle_command(&bot, &msg, cmd, &deps).await {
                    log::error!("Failed to answer command in chat {}: {}", msg.chat.id, e);
                }
                Ok(())
            }
        },
    ))
}

fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let deps = deps.clone();
        async move {
            if let Err(e) = handle_callback(&bot, &q, &deps).await {
                log::error!("Failed to answer callback {:?} from {}: {}", q.data, q.from.id, e);
            }
            Ok(())
        }
    })
}
