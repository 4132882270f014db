use thiserror::Error;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("file not found on the hub for the requested revision")]
    NotFound,

    #[error("hub returned HTTP {status}")]
    Http { status: u16 },

    #[error("size mismatch: server advertised {expected} bytes, wrote {written}")]
    SizeMismatch { expected: u64, written: u64 },

    #[error("etag {0:?} is empty after normalization")]
    InvalidEtag(String),

    #[error("invalid repo id {0:?}: expected `namespace/name`")]
    InvalidRepoId(String),

    #[error("invalid glob pattern {0:?}")]
    InvalidGlob(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("operation cancelled")]
    Cancelled,
}

impl HubError {
    /// Whether the download engine may retry after this error.
    ///
    /// Authentication failures and missing files are terminal; so are
    /// cancellation, malformed etags, and size mismatches.
    pub fn is_retryable(&self) -> bool {
        match self {
            HubError::Http { status } => !matches!(status, 401 | 403 | 404),
            HubError::Request(_) | HubError::Io(_) => true,
            _ => false,
        }
    }
}

pub type HubResult<T> = Result<T, HubError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_retryable() {
        assert!(HubError::Http { status: 500 }.is_retryable());
        assert!(HubError::Http { status: 429 }.is_retryable());
    }

    #[test]
    fn auth_and_missing_are_terminal() {
        assert!(!HubError::Http { status: 401 }.is_retryable());
        assert!(!HubError::Http { status: 403 }.is_retryable());
        assert!(!HubError::Http { status: 404 }.is_retryable());
    }

    #[test]
    fn cancellation_is_never_retried() {
        assert!(!HubError::Cancelled.is_retryable());
    }

    #[test]
    fn size_mismatch_is_terminal() {
        assert!(!HubError::SizeMismatch { expected: 100, written: 90 }.is_retryable());
    }
}
