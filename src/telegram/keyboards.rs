//! Inline keyboards attached to bot replies

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use url::Url;

use crate::telegram::callback::{CallbackAction, CallbackData};

/// Deep link that starts the bot with `user_id` as referral code.
pub fn referral_link(bot_username: &str, user_id: i64) -> String {
    format!("https://t.me/{}?start={}", bot_username, user_id)
}

/// Buttons under the start reply: owner contact, share link, info and wallet.
pub fn start_keyboard(owner_id: i64, bot_username: &str, user_id: i64) -> InlineKeyboardMarkup {
    let mut links = Vec::new();
    if let Some(button) = url_button("👤 Owner", &format!("tg://user?id={}", owner_id)) {
        links.push(button);
    }
    let share = format!("https://t.me/share/url?url={}", referral_link(bot_username, user_id));
    if let Some(button) = url_button("🔗 Refer & Earn", &share) {
        links.push(button);
    }

    InlineKeyboardMarkup::new(vec![
        links,
        vec![
            InlineKeyboardButton::callback(
                "ℹ️ Info",
                CallbackData::new(CallbackAction::Info, user_id).to_string(),
            ),
            InlineKeyboardButton::callback(
                "💼 Wallet",
                CallbackData::new(CallbackAction::Wallet, user_id).to_string(),
            ),
        ],
    ])
}

pub fn wallet_keyboard(user_id: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "💸 Withdraw",
        CallbackData::new(CallbackAction::Withdraw, user_id).to_string(),
    )]])
}

fn url_button(text: &str, link: &str) -> Option<InlineKeyboardButton> {
    match Url::parse(link) {
        Ok(url) => Some(InlineKeyboardButton::url(text, url)),
        Err(e) => {
            log::warn!("Skipping button {:?}, bad link {}: {}", text, link, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::InlineKeyboardButtonKind;

    fn callbacks(markup: &InlineKeyboardMarkup) -> Vec<String> {
        markup
            .inline_keyboard
            .iter()
            .flatten()
            .filter_map(|b| match &b.kind {
                InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_start_keyboard_layout() {
        let markup = start_keyboard(1, "refer_bot", 42);

        assert_eq!(markup.inline_keyboard.len(), 2);
        assert_eq!(markup.inline_keyboard[0].len(), 2);
        assert_eq!(callbacks(&markup), vec!["info.42", "wallet.42"]);

        let share = markup.inline_keyboard[0]
            .iter()
            .find_map(|b| match &b.kind {
                InlineKeyboardButtonKind::Url(url) if url.host_str() == Some("t.me") => Some(url.to_string()),
                _ => None,
            })
            .unwrap();
        assert!(share.contains("refer_bot?start=42"));
    }

    #[test]
    fn test_wallet_keyboard_offers_withdraw() {
        assert_eq!(callbacks(&wallet_keyboard(5)), vec!["withdraw.5"]);
    }
}
