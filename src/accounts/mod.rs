pub mod password;
pub mod service;
pub mod token;

pub use service::AccountService;
pub use token::{Claims, TokenKeys};

use thiserror::Error;

pub const MIN_NAME_CHARS: usize = 2;
pub const MIN_PASSWORD_CHARS: usize = 6;
pub const DEFAULT_ROLE: &str = "user";

/// Failures surfaced by account operations. The `Display` text of the first
/// four variants is shown to users verbatim.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Invalid input data.")]
    InvalidInput,
    #[error("Email already in use.")]
    EmailInUse,
    #[error("Invalid credentials.")]
    InvalidCredentials,
    #[error("User not found.")]
    NotFound,
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Trimmed display name, if long enough.
pub fn normalize_name(raw: &str) -> Option<String> {
    let name = raw.trim();
    (name.chars().count() >= MIN_NAME_CHARS).then(|| name.to_owned())
}

/// Trimmed, lower-cased email, if it is syntactically plausible.
pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    is_valid_email(&email).then_some(email)
}

pub fn is_valid_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_CHARS
}

/// `local@domain.tld` with no whitespace and non-empty dot-separated labels.
fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|l| !l.is_empty())
}
