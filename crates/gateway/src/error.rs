use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Normalized failure surfaced by the upstream gateway. Carries an
/// HTTP-like status so callers can tell throttling from a missing resource.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("upstream request failed with status {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("upstream rate limit hit: {0}")]
    RateLimited(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("network failure: {0}")]
    Network(String),

    #[error("{0}")]
    Other(String),
}

impl GatewayError {
    /// HTTP-like status associated with this failure.
    pub fn status(&self) -> u16 {
        match self {
            GatewayError::Upstream { status, .. } => *status,
            GatewayError::RateLimited(_) => 429,
            GatewayError::NotFound(_) => 404,
            GatewayError::InvalidParameter(_) => 400,
            GatewayError::Network(_) => 503,
            GatewayError::Other(_) => 500,
        }
    }
}
