use thiserror::Error;

/// Failures of key issuance and verification.
///
/// The three authentication cases (`Missing`, `Invalid`, `Expired`) are kept
/// apart so callers can tell "no credential" from "bad credential".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("Parameter \"apiName\" is required.")]
    MissingName,

    #[error("API key is required.")]
    Missing,

    #[error("Invalid API key.")]
    Invalid,

    #[error("API key has expired.")]
    Expired,

    #[error("key store error: {0}")]
    Storage(String),
}
