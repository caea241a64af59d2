//! Common test utilities
//!
//! This module is shared across all integration tests

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use referearn::storage::{create_pool, SqliteUserStore, UserStore};
use referearn::telegram::{
    BroadcastSource, Broadcaster, CallbackEvent, Caller, CommandEvent, CommandKind, CommandRouter, Messenger,
    RouterSettings,
};
use referearn::{AppError, AppResult};

pub const OWNER_ID: i64 = 1;
pub const LOGGER_ID: i64 = -100500;
pub const BOT_USERNAME: &str = "refer_test_bot";

/// One outbound call seen by the `RecordingMessenger`
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text { chat_id: i64, text: String },
    Copy { chat_id: i64, message_id: i32 },
}

/// Messenger that records every call and fails for selected chats.
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<Sent>>,
    failing: Mutex<HashSet<i64>>,
}

impl RecordingMessenger {
    pub fn fail_for(&self, chat_id: i64) {
        self.failing.lock().unwrap().insert(chat_id);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts_to(&self, chat_id: i64) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text { chat_id: id, text } if id == chat_id => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn copies(&self) -> Vec<i64> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Copy { chat_id, .. } => Some(chat_id),
                _ => None,
            })
            .collect()
    }

    fn check(&self, chat_id: i64) -> AppResult<()> {
        if self.failing.lock().unwrap().contains(&chat_id) {
            Err(AppError::Transport(format!("Forbidden: bot was blocked by user {}", chat_id)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(&self, chat_id: i64, text: &str) -> AppResult<()> {
        self.check(chat_id)?;
        self.sent.lock().unwrap().push(Sent::Text {
            chat_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn copy_message(&self, to_chat: i64, source: &BroadcastSource) -> AppResult<()> {
        self.check(to_chat)?;
        self.sent.lock().unwrap().push(Sent::Copy {
            chat_id: to_chat,
            message_id: source.message_id,
        });
        Ok(())
    }
}

/// Router wired to a temporary database and a recording messenger
pub struct TestApp {
    _dir: TempDir,
    pub store: Arc<dyn UserStore>,
    pub messenger: Arc<RecordingMessenger>,
    pub broadcaster: Arc<Broadcaster>,
    pub router: CommandRouter,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_logger(Some(LOGGER_ID))
    }

    pub fn with_logger(logger_id: Option<i64>) -> Self {
        Self::build(logger_id, Duration::from_millis(1))
    }

    /// Broadcasts pause `delay` between recipients, long enough to observe a running one.
    pub fn with_broadcast_delay(delay: Duration) -> Self {
        Self::build(Some(LOGGER_ID), delay)
    }

    fn build(logger_id: Option<i64>, delay: Duration) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.sqlite");
        let pool = create_pool(path.to_str().unwrap()).unwrap();
        let store: Arc<dyn UserStore> = Arc::new(SqliteUserStore::new(Arc::new(pool)));
        let messenger = Arc::new(RecordingMessenger::default());
        let broadcaster = Arc::new(Broadcaster::new(
            Arc::clone(&store),
            messenger.clone(),
            delay,
        ));
        let router = CommandRouter::new(
            Arc::clone(&store),
            messenger.clone(),
            Arc::clone(&broadcaster),
            RouterSettings {
                owner_id: OWNER_ID,
                logger_id,
                bot_username: BOT_USERNAME.to_string(),
            },
        );

        Self {
            _dir: dir,
            store,
            messenger,
            broadcaster,
            router,
        }
    }
}

pub fn caller(id: i64) -> Caller {
    Caller {
        id,
        name: format!("user{}", id),
    }
}

/// A command sent in the caller's private chat
pub fn command(kind: CommandKind, caller_id: i64, args: &[&str]) -> CommandEvent {
    CommandEvent {
        kind,
        args: args.iter().map(|a| a.to_string()).collect(),
        caller: caller(caller_id),
        chat_id: caller_id,
        private: true,
        reply_to: None,
    }
}

pub fn callback(caller_id: i64, data: &str) -> CallbackEvent {
    CallbackEvent {
        data: data.to_string(),
        caller: caller(caller_id),
    }
}
