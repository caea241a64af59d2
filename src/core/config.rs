use std::env;
use std::time::Duration;

use secrecy::SecretString;

use crate::core::error::{AppError, AppResult};

/// Database file used when neither DATABASE_PATH nor STORE_URI is set
pub const DEFAULT_DATABASE_PATH: &str = "referearn.sqlite";

/// Log file used when LOG_FILE_PATH is not set
pub const DEFAULT_LOG_FILE_PATH: &str = "referearn.log";

/// Log file path
/// Read from LOG_FILE_PATH environment variable before anything else so the
/// logger is up when the rest of the configuration is validated.
pub fn log_file_path() -> String {
    env::var("LOG_FILE_PATH").unwrap_or_else(|_| DEFAULT_LOG_FILE_PATH.to_string())
}

/// Database path from DATABASE_PATH or STORE_URI, for commands that only need the store
pub fn database_path() -> String {
    ["DATABASE_PATH", "STORE_URI"]
        .iter()
        .filter_map(|key| env::var(key).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string())
}

/// Referral rewards
pub mod referral {
    /// Amount credited to the referrer for every new referee
    pub const REWARD: f64 = 10.0;
}

/// Broadcast fan-out configuration
pub mod broadcast {
    use super::Duration;

    /// Delay between two copies, keeps us under ~30 messages per second
    pub const DEFAULT_DELAY_MS: u64 = 33;

    /// Users fetched from the store per page while broadcasting
    pub const PAGE_SIZE: usize = 500;

    /// Default delay duration
    pub fn default_delay() -> Duration {
        Duration::from_millis(DEFAULT_DELAY_MS)
    }
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Request timeout for Bot API calls (in seconds)
    /// Must stay above the long polling timeout.
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;

    /// Request timeout duration
    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}

/// Long polling configuration
pub mod polling {
    use super::Duration;

    /// getUpdates long polling timeout (in seconds)
    pub const TIMEOUT_SECS: u64 = 9;

    pub fn timeout() -> Duration {
        Duration::from_secs(TIMEOUT_SECS)
    }
}

/// Webhook configuration
pub mod webhook {
    /// Maximum simultaneous HTTPS connections Telegram opens to the webhook
    pub const MAX_CONNECTIONS: u8 = 40;
}

/// Retry configuration
pub mod retry {
    use super::Duration;

    /// Maximum number of retries for dispatcher reconnection
    pub const MAX_DISPATCHER_RETRIES: u32 = 5;

    /// Delay between dispatcher retry attempts (in seconds)
    pub const DISPATCHER_RETRY_DELAY_SECS: u64 = 5;

    /// Dispatcher retry delay duration
    pub fn dispatcher_delay() -> Duration {
        Duration::from_secs(DISPATCHER_RETRY_DELAY_SECS)
    }
}

/// Webhook listener settings, present only when both WEBHOOK_URL and PORT are set
#[derive(Debug)]
pub struct WebhookConfig {
    /// Public base URL; the bot token is appended to form the webhook path
    pub url: String,
    /// Local port to listen on (all interfaces)
    pub port: u16,
    /// Shared secret checked on every webhook request
    pub secret_token: Option<SecretString>,
}

/// Runtime configuration, built once at startup.
#[derive(Debug)]
pub struct Config {
    pub bot_token: SecretString,
    pub owner_id: i64,
    pub logger_id: Option<i64>,
    pub database_path: String,
    pub webhook: Option<WebhookConfig>,
    pub broadcast_delay: Duration,
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    /// `AppError::Config` when the token or the owner id is missing or malformed.
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bot_token = get("TOKEN")
            .or_else(|| get("BOT_TOKEN"))
            .or_else(|| get("TELOXIDE_TOKEN"))
            .ok_or_else(|| AppError::Config("TOKEN is not set".to_string()))?;

        let owner_id = match get("OWNER_ID") {
            Some(raw) => parse_chat_id("OWNER_ID", &raw)?,
            None => return Err(AppError::Config("OWNER_ID is not set".to_string())),
        };

        let logger_id = match get("LOGGER_ID") {
            Some(raw) => Some(parse_chat_id("LOGGER_ID", &raw)?),
            None => None,
        };

        let database_path = get("DATABASE_PATH")
            .or_else(|| get("STORE_URI"))
            .unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string());

        let webhook = match (get("WEBHOOK_URL"), get("PORT")) {
            (Some(url), Some(port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| AppError::Config(format!("PORT is not a valid port: {}", port)))?;
                Some(WebhookConfig {
                    url,
                    port,
                    secret_token: get("SECRET_TOKEN").map(SecretString::from),
                })
            }
            _ => None,
        };

        let broadcast_delay = match get("BROADCAST_DELAY_MS") {
            Some(raw) => Duration::from_millis(
                raw.parse::<u64>()
                    .map_err(|_| AppError::Config(format!("BROADCAST_DELAY_MS is not a number: {}", raw)))?,
            ),
            None => broadcast::default_delay(),
        };

        Ok(Self {
            bot_token: SecretString::from(bot_token),
            owner_id,
            logger_id,
            database_path,
            webhook,
            broadcast_delay,
        })
    }
}

fn parse_chat_id(key: &str, raw: &str) -> AppResult<i64> {
    match raw.parse::<i64>() {
        Ok(id) if id != 0 => Ok(id),
        _ => Err(AppError::Config(format!("{} is not a valid id: {}", key, raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_minimal_config_uses_polling_and_defaults() {
        let config = Config::from_lookup(lookup(&[("TOKEN", "123:abc"), ("OWNER_ID", "42")])).unwrap();

        assert_eq!(config.bot_token.expose_secret(), "123:abc");
        assert_eq!(config.owner_id, 42);
        assert_eq!(config.logger_id, None);
        assert_eq!(config.database_path, DEFAULT_DATABASE_PATH);
        assert!(config.webhook.is_none());
        assert_eq!(config.broadcast_delay, Duration::from_millis(33));
    }

    #[test]
    fn test_missing_token_is_fatal() {
        let err = Config::from_lookup(lookup(&[("OWNER_ID", "42")])).unwrap_err();
        assert!(matches!(err, AppError::Config(msg) if msg.contains("TOKEN")));
    }

    #[test]
    fn test_missing_or_bad_owner_is_fatal() {
        assert!(Config::from_lookup(lookup(&[("TOKEN", "t")])).is_err());
        assert!(Config::from_lookup(lookup(&[("TOKEN", "t"), ("OWNER_ID", "owner")])).is_err());
        assert!(Config::from_lookup(lookup(&[("TOKEN", "t"), ("OWNER_ID", "0")])).is_err());
    }

    #[test]
    fn test_webhook_needs_url_and_port() {
        let only_url = Config::from_lookup(lookup(&[
            ("TOKEN", "t"),
            ("OWNER_ID", "1"),
            ("WEBHOOK_URL", "https://example.com/"),
        ]))
        .unwrap();
        assert!(only_url.webhook.is_none());

        let full = Config::from_lookup(lookup(&[
            ("TOKEN", "t"),
            ("OWNER_ID", "1"),
            ("WEBHOOK_URL", "https://example.com/"),
            ("PORT", "8443"),
            ("SECRET_TOKEN", "s3cret"),
            ("LOGGER_ID", "-100200"),
        ]))
        .unwrap();
        let webhook = full.webhook.unwrap();
        assert_eq!(webhook.port, 8443);
        assert_eq!(webhook.secret_token.unwrap().expose_secret(), "s3cret");
        assert_eq!(full.logger_id, Some(-100200));
    }

    #[test]
    fn test_token_fallbacks_and_store_uri() {
        let config = Config::from_lookup(lookup(&[
            ("TELOXIDE_TOKEN", "fallback"),
            ("OWNER_ID", "1"),
            ("STORE_URI", "/data/users.sqlite"),
        ]))
        .unwrap();
        assert_eq!(config.bot_token.expose_secret(), "fallback");
        assert_eq!(config.database_path, "/data/users.sqlite");
    }
}
