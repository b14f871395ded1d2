use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub server_host: String,
    pub server_port: u16,
    /// HS256 secret used to sign session tokens.
    pub jwt_secret: String,
    /// Session token lifetime in seconds.
    pub jwt_expire_secs: u64,
    pub assistant: AssistantConfig,
    /// Zone used when bucketing energy readings into local hours.
    pub display_tz: Tz,
}

/// Settings for the generative-language backend of the chat assistant.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// `None` disables outbound calls; every chat gets a canned reply.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_GEMINI_BASE_URL.to_owned(),
            model: DEFAULT_GEMINI_MODEL.to_owned(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            db_max_connections: optional("DB_MAX_CONNECTIONS", "10")
                .parse()
                .context("DB_MAX_CONNECTIONS must be a positive integer")?,
            server_host: optional("SERVER_HOST", "0.0.0.0"),
            server_port: optional("SERVER_PORT", "8080")
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            jwt_secret: required("JWT_SECRET")?,
            jwt_expire_secs: optional("JWT_EXPIRE_SECS", "86400")
                .parse()
                .context("JWT_EXPIRE_SECS must be a positive integer")?,
            assistant: AssistantConfig {
                api_key: non_empty("GEMINI_API_KEY"),
                base_url: optional("GEMINI_BASE_URL", DEFAULT_GEMINI_BASE_URL),
                model: optional("GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
            },
            display_tz: parse_time_zone(&optional("DISPLAY_TZ", "UTC"))?,
        })
    }
}

/// Parse an IANA zone name such as `"Europe/Warsaw"`.
fn parse_time_zone(raw: &str) -> Result<Tz> {
    raw.trim()
        .parse::<Tz>()
        .map_err(|e| anyhow!("DISPLAY_TZ must be an IANA time zone name, got: {raw:?} ({e})"))
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("missing required env var: {key}"))
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Like `optional` without a default: unset and blank both mean `None`.
fn non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}
