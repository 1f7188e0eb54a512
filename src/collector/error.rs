use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectorError {
    /// Connection, TLS or timeout failure.
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Collector answered with a non-2xx status.
    #[error("collector rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("failed to parse collector response: {0}")]
    JsonError(String),

    #[error("invalid collector URL {0}")]
    InvalidUrl(String),

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),
}

impl From<reqwest::Error> for CollectorError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            CollectorError::JsonError(e.to_string())
        } else {
            CollectorError::HttpError(e.to_string())
        }
    }
}
