//! Update to router translation and reply delivery

use teloxide::prelude::*;
use teloxide::types::{MaybeInaccessibleMessage, Message, ParseMode, ReplyParameters};

use super::types::{caller_from, HandlerDeps};
use crate::telegram::bot::Command;
use crate::telegram::messenger::{no_preview, BroadcastSource};
use crate::telegram::router::{CallbackEvent, CommandEvent, Reply};

/// Builds the router event for a parsed command; `None` for messages without a sender.
pub fn command_event(msg: &Message, cmd: Command) -> Option<CommandEvent> {
    let caller = caller_from(msg.from.as_ref()?)?;
    let (kind, args) = cmd.into_parts();
    let reply_to = msg.reply_to_message().map(|reply| BroadcastSource {
        chat_id: msg.chat.id.0,
        message_id: reply.id.0,
        keyboard: reply.reply_markup().cloned(),
    });

    Some(CommandEvent {
        kind,
        args,
        caller,
        chat_id: msg.chat.id.0,
        private: msg.chat.is_private(),
        reply_to,
    })
}

/// Sends `reply` as an HTML answer to `msg`.
pub async fn send_reply(bot: &Bot, msg: &Message, reply: Reply) -> ResponseResult<()> {
    let request = bot
        .send_message(msg.chat.id, reply.text)
        .parse_mode(ParseMode::Html)
        .link_preview_options(no_preview())
        .reply_parameters(ReplyParameters::new(msg.id).allow_sending_without_reply());
    match reply.keyboard {
        Some(keyboard) => request.reply_markup(keyboard).await?,
        None => request.await?,
    };
    Ok(())
}

pub(super) async fn handle_command(bot: &Bot, msg: &Message, cmd: Command, deps: &HandlerDeps) -> ResponseResult<()> {
    let Some(event) = command_event(msg, cmd) else {
        log::debug!("Ignoring command without sender in chat {}", msg.chat.id);
        return Ok(());
    };

    if let Some(reply) = deps.router.handle_command(event).await {
        send_reply(bot, msg, reply).await?;
    }
    Ok(())
}

pub(super) async fn handle_callback(bot: &Bot, q: &CallbackQuery, deps: &HandlerDeps) -> ResponseResult<()> {
    let Some(caller) = caller_from(&q.from) else {
        return Ok(());
    };
    let event = CallbackEvent {
        data: q.data.clone().unwrap_or_default(),
        caller,
    };
    let answer = deps.router.handle_callback(event).await;

    bot.answer_callback_query(q.id.clone())
        .text(answer.notice)
        .show_alert(answer.show_alert)
        .await?;

    if let (Some(edit), Some(message)) = (answer.edit, q.message.as_ref()) {
        edit_message(bot, message, edit).await?;
    }
    Ok(())
}

async fn edit_message(bot: &Bot, message: &MaybeInaccessibleMessage, edit: Reply) -> ResponseResult<()> {
    let request = bot
        .edit_message_text(message.chat().id, message.id(), edit.text)
        .parse_mode(ParseMode::Html)
        .link_preview_options(no_preview());
    match edit.keyboard {
        Some(keyboard) => request.reply_markup(keyboard).await?,
        None => request.await?,
    };
    Ok(())
}
