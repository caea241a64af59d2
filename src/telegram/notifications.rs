//! Best-effort notices to the logger chat.
//!
//! Failures are logged and never reach the user who triggered the notice.

use std::sync::Arc;

use crate::storage::User;
use crate::telegram::messenger::Messenger;
use crate::telegram::texts;

#[derive(Clone)]
pub struct Notifier {
    messenger: Arc<dyn Messenger>,
    logger_id: Option<i64>,
}

impl Notifier {
    /// `logger_id` of `None` turns every notice into a no-op.
    pub fn new(messenger: Arc<dyn Messenger>, logger_id: Option<i64>) -> Self {
        Self { messenger, logger_id }
    }

    pub async fn new_user(&self, name: &str, user_id: i64) {
        self.send(&texts::log_new_user(name, user_id)).await;
    }

    pub async fn new_referral(&self, name: &str, user_id: i64, referrer_id: i64) {
        self.send(&texts::log_referral(name, user_id, referrer_id)).await;
    }

    /// Withdrawal requests go to the logger chat, or to `fallback_chat` without one.
    pub async fn withdrawal(&self, user: &User, fallback_chat: i64) -> bool {
        let chat = self.logger_id.unwrap_or(fallback_chat);
        match self.messenger.send_text(chat, &texts::log_withdrawal(user)).await {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to forward withdrawal of user {} to {}: {}", user.id, chat, e);
                false
            }
        }
    }

    /// Tells a referrer about the reward they just earned.
    pub async fn referrer_rewarded(&self, referrer_id: i64, referee_name: &str, referee_id: i64) {
        let text = texts::referral_success(referee_name, referee_id);
        if let Err(e) = self.messenger.send_text(referrer_id, &text).await {
            log::warn!("Failed to notify referrer {}: {}", referrer_id, e);
        }
    }

    async fn send(&self, text: &str) {
        let Some(chat) = self.logger_id else {
            return;
        };
        if let Err(e) = self.messenger.send_text(chat, text).await {
            log::error!("Failed to send notification to logger chat {}: {}", chat, e);
        }
    }
}
