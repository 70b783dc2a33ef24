use std::env;
use std::path::PathBuf;

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

const DEFAULT_SUBSCRIPTIONS_FILE: &str = "bot_subscriptions.json";

lazy_static! {
    // public channel usernames as Telegram defines them
    static ref CHANNEL_USERNAME_REGEX: Regex = Regex::new("^[a-zA-Z0-9_]{5,32}$").unwrap();
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),
    #[error("invalid source channel username: {0:?}")]
    InvalidChannelUsername(String),
}

/// Everything the process needs from the environment, read once at startup.
/// Missing or malformed required values abort the process before any
/// handler is registered.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    /// Source channel username, stored without the leading `@`, lowercase.
    /// Feeds both the channel-post filter and the notification back-link.
    pub source_channel: String,
    pub subscriptions_file: PathBuf,
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingVar(name))
}

fn normalize_channel(raw: &str) -> Result<String, ConfigError> {
    let username = raw.trim().trim_start_matches('@');

    if !CHANNEL_USERNAME_REGEX.is_match(username) {
        return Err(ConfigError::InvalidChannelUsername(raw.to_string()));
    }

    Ok(username.to_lowercase())
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let bot_token = required("BOT_TOKEN")?;
        let source_channel = normalize_channel(&required("SOURCE_CHANNEL_USERNAME")?)?;

        let subscriptions_file = env::var("SUBSCRIPTIONS_FILE")
            .unwrap_or_else(|_| DEFAULT_SUBSCRIPTIONS_FILE.to_string())
            .into();

        Ok(Self {
            bot_token,
            source_channel,
            subscriptions_file,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_username_is_normalized() {
        assert_eq!(
            normalize_channel("@Vodokanal_News").unwrap(),
            "vodokanal_news"
        );
        assert_eq!(normalize_channel("vodokanal").unwrap(), "vodokanal");
    }

    #[test]
    fn bad_channel_usernames_are_rejected() {
        assert!(normalize_channel("").is_err());
        assert!(normalize_channel("@ab").is_err());
        assert!(normalize_channel("has spaces").is_err());
        assert!(normalize_channel("https://t.me/vodokanal").is_err());
    }
}
