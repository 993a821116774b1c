use chrono::{DateTime, Days, Utc};
use serde::{Deserialize, Serialize};

/// Lifetime of an issued key, in calendar days.
pub const KEY_LIFETIME_DAYS: u64 = 30;

pub const TOKEN_PREFIX: &str = "mr_";

/// An issued API key as persisted by the key store.
///
/// Field names on disk match the `apiKeys.json` layout the service has
/// always written, so existing files load unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    #[serde(rename = "apiName")]
    pub name: String,
    #[serde(rename = "apiKey")]
    pub key: String,
    #[serde(rename = "expirationDate", with = "crate::timestamp")]
    pub expires_at: DateTime<Utc>,
    #[serde(
        rename = "issuedAt",
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::timestamp::option"
    )]
    pub issued_at: Option<DateTime<Utc>>,
}

impl ApiKeyRecord {
    /// Build a fresh record issued at `issued_at`, expiring
    /// [`KEY_LIFETIME_DAYS`] calendar days later.
    pub fn new(name: &str, key: String, issued_at: DateTime<Utc>) -> Self {
        Self {
            name: name.to_string(),
            key,
            expires_at: expiry_for(issued_at),
            issued_at: Some(issued_at),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Calendar-day expiry: `issued_at + 30 days`.
pub fn expiry_for(issued_at: DateTime<Utc>) -> DateTime<Utc> {
    issued_at
        .checked_add_days(Days::new(KEY_LIFETIME_DAYS))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Generate a new API key: `mr_` + 43 chars of base62-encoded random bytes.
pub fn generate_token() -> String {
    use rand::Rng;
    const BASE62: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    let random_part: String = (0..43)
        .map(|_| {
            let idx = rng.gen_range(0..BASE62.len());
            BASE62[idx] as char
        })
        .collect();
    format!("{TOKEN_PREFIX}{random_part}")
}

/// Mask a token for display: keeps the prefix and the last four characters.
pub fn mask_token(token: &str) -> String {
    let tail: String = token
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    if token.len() <= TOKEN_PREFIX.len() + 4 {
        return "****".into();
    }
    let head = if token.starts_with(TOKEN_PREFIX) { TOKEN_PREFIX } else { "" };
    format!("{head}****{tail}")
}
