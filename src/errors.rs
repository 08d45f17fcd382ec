use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The exchange answered with a 2xx status but flagged the request as failed.
    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("Unexpected data from exchange: {0}")]
    UnexpectedData(String),
}
