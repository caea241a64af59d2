//! Outbound message seam.
//!
//! Everything the router and the broadcaster send goes through `Messenger`,
//! so both can be exercised without a live Bot API.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, LinkPreviewOptions, MessageId, ParseMode};

use crate::core::error::AppResult;

/// A message to be copied to every user, with the inline keyboard it carried.
#[derive(Debug, Clone, PartialEq)]
pub struct BroadcastSource {
    pub chat_id: i64,
    pub message_id: i32,
    pub keyboard: Option<InlineKeyboardMarkup>,
}

#[async_trait]
pub trait Messenger: Send + Sync {
    /// Sends an HTML text message.
    async fn send_text(&self, chat_id: i64, text: &str) -> AppResult<()>;

    /// Copies `source` into `to_chat`, keeping its keyboard.
    async fn copy_message(&self, to_chat: i64, source: &BroadcastSource) -> AppResult<()>;
}

/// `Messenger` over the Bot API.
#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

pub(crate) fn no_preview() -> LinkPreviewOptions {
    LinkPreviewOptions {
        is_disabled: true,
        url: None,
        prefer_small_media: false,
        prefer_large_media: false,
        show_above_text: false,
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_text(&self, chat_id: i64, text: &str) -> AppResult<()> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::Html)
            .link_preview_options(no_preview())
            .await?;
        Ok(())
    }

    async fn copy_message(&self, to_chat: i64, source: &BroadcastSource) -> AppResult<()> {
        let request = self
            .bot
            .copy_message(ChatId(to_chat), ChatId(source.chat_id), MessageId(source.message_id));
        match &source.keyboard {
            Some(keyboard) => request.reply_markup(keyboard.clone()).await?,
            None => request.await?,
        };
        Ok(())
    }
}
