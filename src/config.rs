use std::env;
use std::time::Duration;

/// Bundled defaults, applied only for keys missing from the environment.
const BUNDLED_CONFIG: &str = include_str!("../assets/config.env");

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_CHAT_LIMIT: usize = 20;
pub const DEFAULT_MESSAGE_LIMIT: usize = 50;
pub const DEFAULT_MENTION_LIMIT: usize = 8;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Backend `/api` root.
    pub api_url: String,
    /// Conversations fetched for the chat picker.
    pub chat_limit: usize,
    /// Messages fetched when a conversation is opened.
    pub message_limit: usize,
    /// Typeahead candidates per lookup.
    pub mention_limit: usize,
    /// Ask the backend for a streamed reply.
    pub stream: bool,
    pub connect_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            chat_limit: DEFAULT_CHAT_LIMIT,
            message_limit: DEFAULT_MESSAGE_LIMIT,
            mention_limit: DEFAULT_MENTION_LIMIT,
            stream: true,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl Config {
    /// Reads `VENDORCHAT_*` variables. Missing or unparseable values keep
    /// their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let number = |key: &str, default: usize| {
            lookup(key)
                .and_then(|raw| raw.trim().parse::<usize>().ok())
                .filter(|value| *value > 0)
                .unwrap_or(default)
        };
        Self {
            api_url: lookup("VENDORCHAT_API_URL")
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty())
                .unwrap_or(defaults.api_url),
            chat_limit: number("VENDORCHAT_CHAT_LIMIT", defaults.chat_limit),
            message_limit: number("VENDORCHAT_MESSAGE_LIMIT", defaults.message_limit),
            mention_limit: number("VENDORCHAT_MENTION_LIMIT", defaults.mention_limit),
            stream: lookup("VENDORCHAT_STREAM")
                .and_then(|raw| parse_flag(&raw))
                .unwrap_or(defaults.stream),
            connect_timeout: lookup("VENDORCHAT_CONNECT_TIMEOUT_SECS")
                .and_then(|raw| raw.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Loads `.env` when present, otherwise the bundled defaults.
pub fn load_dotenv() {
    // First try to load from .env file (local dev)
    if dotenvy::dotenv().is_ok() {
        return;
    }

    // Fall back to bundled config
    load_bundled_config();
}

fn load_bundled_config() {
    for (key, value) in parse_env_lines(BUNDLED_CONFIG) {
        // Only set if not already set (allow env override)
        if env::var(key).is_err() {
            // SAFETY: called from `main` before the runtime spawns any threads
            unsafe {
                env::set_var(key, value);
            }
        }
    }
}

/// Parses `KEY=VALUE` lines, skipping blanks and `#` comments.
fn parse_env_lines(source: &str) -> impl Iterator<Item = (&str, &str)> {
    source.lines().filter_map(|line| {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        let (key, value) = line.split_once('=')?;
        Some((key.trim(), value.trim()))
    })
}
