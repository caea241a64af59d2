//! Transport-independent command and callback routing.
//!
//! The Telegram handlers turn updates into `CommandEvent`/`CallbackEvent`
//! values and send back whatever the router answers. The router owns the
//! owner-only gate and never fails: every error becomes a reply text.

use std::sync::Arc;

use teloxide::types::InlineKeyboardMarkup;

use crate::core::error::{AppError, AppResult};
use crate::rewards::ledger::parse_amount;
use crate::rewards::{BalanceLedger, ReferralEngine};
use crate::storage::{StoreError, User, UserStore};
use crate::telegram::broadcast::Broadcaster;
use crate::telegram::callback::{CallbackAction, CallbackData};
use crate::telegram::keyboards::{start_keyboard, wallet_keyboard};
use crate::telegram::messenger::{BroadcastSource, Messenger};
use crate::telegram::notifications::Notifier;
use crate::telegram::texts;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Start,
    Help,
    Info,
    Add,
    Remove,
    Accno,
    Stats,
    Broadcast,
}

impl CommandKind {
    pub fn is_owner_only(self) -> bool {
        matches!(
            self,
            CommandKind::Add | CommandKind::Remove | CommandKind::Stats | CommandKind::Broadcast
        )
    }
}

/// Who sent the update
#[derive(Debug, Clone, PartialEq)]
pub struct Caller {
    pub id: i64,
    /// First name, used in greetings
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct CommandEvent {
    pub kind: CommandKind,
    pub args: Vec<String>,
    pub caller: Caller,
    pub chat_id: i64,
    pub private: bool,
    /// The message this command replied to, if any
    pub reply_to: Option<BroadcastSource>,
}

#[derive(Debug, Clone)]
pub struct CallbackEvent {
    pub data: String,
    pub caller: Caller,
}

/// An HTML text with an optional inline keyboard
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub keyboard: Option<InlineKeyboardMarkup>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(text: impl Into<String>, keyboard: InlineKeyboardMarkup) -> Self {
        Self {
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }
}

/// Answer to a button press: the callback notice and an optional edit of the message.
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackReply {
    pub notice: String,
    pub show_alert: bool,
    pub edit: Option<Reply>,
}

impl CallbackReply {
    fn alert(text: impl Into<String>) -> Self {
        Self {
            notice: text.into(),
            show_alert: true,
            edit: None,
        }
    }

    fn loaded(notice: &str, edit: Reply) -> Self {
        Self {
            notice: notice.to_string(),
            show_alert: false,
            edit: Some(edit),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouterSettings {
    pub owner_id: i64,
    pub logger_id: Option<i64>,
    /// Used to build referral links
    pub bot_username: String,
}

pub struct CommandRouter {
    store: Arc<dyn UserStore>,
    ledger: BalanceLedger,
    referrals: ReferralEngine,
    notifier: Notifier,
    broadcaster: Arc<Broadcaster>,
    settings: RouterSettings,
}

impl CommandRouter {
    pub fn new(
        store: Arc<dyn UserStore>,
        messenger: Arc<dyn Messenger>,
        broadcaster: Arc<Broadcaster>,
        settings: RouterSettings,
    ) -> Self {
        let ledger = BalanceLedger::new(Arc::clone(&store));
        let referrals = ReferralEngine::new(Arc::clone(&store), ledger.clone());
        let notifier = Notifier::new(messenger, settings.logger_id);
        Self {
            store,
            ledger,
            referrals,
            notifier,
            broadcaster,
            settings,
        }
    }

    /// Handles one command. `None` means the command is silently ignored.
    pub async fn handle_command(&self, event: CommandEvent) -> Option<Reply> {
        if event.kind == CommandKind::Broadcast && !event.private {
            return None;
        }
        if event.kind.is_owner_only() && event.caller.id != self.settings.owner_id {
            log::warn!("User {} tried owner-only command {:?}", event.caller.id, event.kind);
            return Some(Reply::text(texts::UNAUTHORIZED));
        }

        let result = match event.kind {
            CommandKind::Start => self.start(&event).await,
            CommandKind::Help => Ok(Reply::text(texts::HELP)),
            CommandKind::Info => self.info(&event).await,
            CommandKind::Add => self.change_balance(&event, true).await,
            CommandKind::Remove => self.change_balance(&event, false).await,
            CommandKind::Accno => self.set_account_number(&event).await,
            CommandKind::Stats => self.stats().await,
            CommandKind::Broadcast => self.broadcast(&event).await,
        };

        Some(result.unwrap_or_else(|e| {
            if e.is_retryable() {
                log::error!("{:?} from user {} failed: {}", event.kind, event.caller.id, e);
            } else {
                log::info!("{:?} from user {} rejected: {}", event.kind, event.caller.id, e);
            }
            Reply::text(texts::error_text(&e))
        }))
    }

    async fn start(&self, event: &CommandEvent) -> AppResult<Reply> {
        let caller = &event.caller;
        match self.store.get_by_id(caller.id).await {
            Ok(user) => return Ok(self.welcome(texts::welcome_back(&caller.name, &user), caller.id)),
            Err(StoreError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        let registered = match event.args.first() {
            None => self.referrals.register_user(caller.id).await.map(|user| (user, None)),
            Some(code) => {
                let Ok(referrer_id) = parse_user_id(code) else {
                    return Ok(Reply::text(texts::INVALID_REFERRAL_CODE));
                };
                self.referrals
                    .register_referral(referrer_id, caller.id)
                    .await
                    .map(|outcome| (outcome.referee, Some((referrer_id, outcome.credited))))
            }
        };

        let user = match registered {
            Ok((user, None)) => {
                self.notifier.new_user(&caller.name, caller.id).await;
                user
            }
            Ok((user, Some((referrer_id, credited)))) => {
                if credited {
                    self.notifier
                        .referrer_rewarded(referrer_id, &caller.name, caller.id)
                        .await;
                }
                self.notifier.new_referral(&caller.name, caller.id, referrer_id).await;
                user
            }
            // Lost a race against a concurrent start of the same user.
            Err(AppError::AlreadyRegistered(_)) => {
                let user = self.store.get_by_id(caller.id).await?;
                return Ok(self.welcome(texts::welcome_back(&caller.name, &user), caller.id));
            }
            Err(AppError::NotFound(_)) => return Ok(Reply::text(texts::UNKNOWN_REFERRAL_CODE)),
            Err(e) => return Err(e),
        };

        Ok(self.welcome(texts::welcome_new(&caller.name, &user), caller.id))
    }

    fn welcome(&self, text: String, user_id: i64) -> Reply {
        Reply::with_keyboard(
            text,
            start_keyboard(self.settings.owner_id, &self.settings.bot_username, user_id),
        )
    }

    async fn info(&self, event: &CommandEvent) -> AppResult<Reply> {
        let target = match event.args.first() {
            Some(raw) => parse_user_id(raw)?,
            None => event.caller.id,
        };
        let user = self.store.get_by_id(target).await?;
        Ok(Reply::text(texts::user_info(&user)))
    }

    async fn change_balance(&self, event: &CommandEvent, credit: bool) -> AppResult<Reply> {
        let command = if credit { "add" } else { "remove" };
        let [raw_id, raw_amount, ..] = event.args.as_slice() else {
            return Ok(Reply::text(texts::usage(command, "<user_id> <amount>")));
        };
        let user_id = parse_user_id(raw_id)?;
        let amount = parse_amount(raw_amount)?;

        let text = if credit {
            let balance = self.ledger.credit(user_id, amount).await?;
            texts::balance_added(user_id, amount, balance)
        } else {
            let balance = self.ledger.debit(user_id, amount).await?;
            texts::balance_removed(user_id, amount, balance)
        };
        log::info!("Owner ran /{} {} {:.2}", command, user_id, amount);
        Ok(Reply::text(text))
    }

    async fn set_account_number(&self, event: &CommandEvent) -> AppResult<Reply> {
        let Some(raw) = event.args.first() else {
            return Ok(Reply::text(texts::usage("accno", "<account_number>")));
        };
        let account_number = raw
            .trim()
            .parse::<i64>()
            .map_err(|_| AppError::InvalidInput(format!("not an account number: {}", raw)))?;
        self.ledger
            .set_account_number(event.caller.id, account_number)
            .await?;
        Ok(Reply::text(texts::account_updated(event.caller.id, account_number)))
    }

    async fn stats(&self) -> AppResult<Reply> {
        let stats = self.store.stats().await?;
        Ok(Reply::text(texts::stats(&stats)))
    }

    async fn broadcast(&self, event: &CommandEvent) -> AppResult<Reply> {
        let Some(source) = event.reply_to.clone() else {
            return Ok(Reply::text(texts::BROADCAST_NEEDS_REPLY));
        };
        self.broadcaster.start(source, event.chat_id).await?;
        Ok(Reply::text(texts::BROADCAST_STARTED))
    }

    /// Handles a button press; malformed payloads and unknown users become alerts.
    pub async fn handle_callback(&self, event: CallbackEvent) -> CallbackReply {
        let Some(data) = CallbackData::parse(&event.data) else {
            log::warn!("Invalid callback data {:?} from user {}", event.data, event.caller.id);
            return CallbackReply::alert(texts::INVALID_CALLBACK);
        };
        if data.action == CallbackAction::Withdraw && data.user_id != event.caller.id {
            return CallbackReply::alert(texts::WITHDRAW_NOT_OWN);
        }

        let user = match self.store.get_by_id(data.user_id).await {
            Ok(user) => user,
            Err(StoreError::NotFound(_)) => {
                return CallbackReply {
                    notice: texts::USER_NOT_FOUND_ALERT.to_string(),
                    show_alert: true,
                    edit: Some(Reply::text(texts::USER_NOT_FOUND_EDIT)),
                };
            }
            Err(e) => {
                log::error!("Callback {} failed: {}", data, e);
                return CallbackReply::alert(texts::error_text(&AppError::from(e)));
            }
        };

        match data.action {
            CallbackAction::Info => CallbackReply::loaded(texts::INFO_LOADED, Reply::text(texts::user_info(&user))),
            CallbackAction::Wallet => CallbackReply::loaded(
                texts::WALLET_LOADED,
                Reply::with_keyboard(texts::wallet_info(&user), wallet_keyboard(user.id)),
            ),
            CallbackAction::Withdraw => self.withdraw(&user).await,
        }
    }

    async fn withdraw(&self, user: &User) -> CallbackReply {
        if user.account_number.is_none() {
            return CallbackReply::alert(texts::WITHDRAW_NO_ACCOUNT);
        }
        if user.balance <= 0.0 {
            return CallbackReply::alert(texts::WITHDRAW_EMPTY);
        }
        if self.notifier.withdrawal(user, self.settings.owner_id).await {
            log::info!("User {} requested a withdrawal of {:.2}", user.id, user.balance);
            CallbackReply::alert(texts::withdraw_requested(user.balance))
        } else {
            CallbackReply::alert(texts::TRY_AGAIN)
        }
    }
}

/// Parses a positive user id.
pub fn parse_user_id(raw: &str) -> AppResult<i64> {
    match raw.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(AppError::InvalidInput(format!("invalid user id: {}", raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_only_commands() {
        let owner_only: Vec<_> = [
            CommandKind::Start,
            CommandKind::Help,
            CommandKind::Info,
            CommandKind::Add,
            CommandKind::Remove,
            CommandKind::Accno,
            CommandKind::Stats,
            CommandKind::Broadcast,
        ]
        .into_iter()
        .filter(|k| k.is_owner_only())
        .collect();

        assert_eq!(
            owner_only,
            vec![
                CommandKind::Add,
                CommandKind::Remove,
                CommandKind::Stats,
                CommandKind::Broadcast
            ]
        );
    }

    #[test]
    fn test_parse_user_id() {
        assert_eq!(parse_user_id(" 42 ").unwrap(), 42);
        for raw in ["0", "-1", "abc", ""] {
            assert!(matches!(parse_user_id(raw), Err(AppError::InvalidInput(_))));
        }
    }
}
