use thiserror::Error;

/// Fatal engine errors. Problems with individual documents are never
/// errors; they are reported as [`crate::evidence::Finding`]s.
#[derive(Debug, Error)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error (bad threshold, duplicate label, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),
    /// A configured pattern is not a valid regular expression.
    #[error("invalid pattern for '{name}': {message}")]
    InvalidPattern { name: String, message: String },
}
