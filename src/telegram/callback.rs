//! Inline button payloads of the form `"<action>.<user_id>"`

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    Info,
    Wallet,
    Withdraw,
}

impl CallbackAction {
    fn as_str(self) -> &'static str {
        match self {
            CallbackAction::Info => "info",
            CallbackAction::Wallet => "wallet",
            CallbackAction::Withdraw => "withdraw",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackData {
    pub action: CallbackAction,
    pub user_id: i64,
}

impl CallbackData {
    pub fn new(action: CallbackAction, user_id: i64) -> Self {
        Self { action, user_id }
    }

    /// Parses a payload; `None` for unknown actions, a missing segment or a bad id.
    pub fn parse(data: &str) -> Option<Self> {
        let (action, user_id) = data.split_once('.')?;
        let action = match action {
            "info" => CallbackAction::Info,
            "wallet" => CallbackAction::Wallet,
            "withdraw" => CallbackAction::Withdraw,
            _ => return None,
        };
        let user_id = user_id.trim().parse::<i64>().ok().filter(|id| *id > 0)?;
        Some(Self { action, user_id })
    }
}

impl fmt::Display for CallbackData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.action.as_str(), self.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_actions() {
        assert_eq!(
            CallbackData::parse("info.42"),
            Some(CallbackData::new(CallbackAction::Info, 42))
        );
        assert_eq!(
            CallbackData::parse("wallet.7"),
            Some(CallbackData::new(CallbackAction::Wallet, 7))
        );
        assert_eq!(
            CallbackData::parse("withdraw.9"),
            Some(CallbackData::new(CallbackAction::Withdraw, 9))
        );
    }

    #[test]
    fn test_parse_rejects_malformed_payloads() {
        for data in ["info", "info.", "info.abc", "info.-5", "info.0", "refund.1", ""] {
            assert_eq!(CallbackData::parse(data), None, "payload {:?}", data);
        }
    }

    #[test]
    fn test_display_matches_parse() {
        let data = CallbackData::new(CallbackAction::Wallet, 123);
        assert_eq!(data.to_string(), "wallet.123");
        assert_eq!(CallbackData::parse(&data.to_string()), Some(data));
    }
}
