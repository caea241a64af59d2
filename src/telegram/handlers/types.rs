//! Handler types and dependencies

use std::sync::Arc;

use teloxide::types::User;

use crate::telegram::router::{Caller, CommandRouter};

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub router: Arc<CommandRouter>,
}

impl HandlerDeps {
    pub fn new(router: Arc<CommandRouter>) -> Self {
        Self { router }
    }
}

/// Router caller for a Telegram user; `None` for ids outside the i64 range.
pub fn caller_from(user: &User) -> Option<Caller> {
    Some(Caller {
        id: i64::try_from(user.id.0).ok()?,
        name: user.first_name.clone(),
    })
}
