use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("request cannot carry payload: {0}")]
    MalformedRequest(String),

    #[error("blocked out-of-scope request: {0}")]
    OutOfScope(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid target: {0}")]
    InvalidTarget(String),
}

impl ScanError {
    /// Errors that only cost the current payload attempt.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ScanError::Transport(_)
                | ScanError::Timeout
                | ScanError::MalformedResponse(_)
                | ScanError::MalformedRequest(_)
        )
    }
}

impl From<reqwest::Error> for ScanError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ScanError::Timeout
        } else if err.is_decode() || err.is_body() {
            ScanError::MalformedResponse(err.to_string())
        } else {
            ScanError::Transport(err.to_string())
        }
    }
}

impl From<url::ParseError> for ScanError {
    fn from(err: url::ParseError) -> Self {
        ScanError::InvalidTarget(err.to_string())
    }
}

pub type ScanResult<T> = Result<T, ScanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_taxonomy() {
        assert!(ScanError::Transport("reset".into()).is_recoverable());
        assert!(ScanError::Timeout.is_recoverable());
        assert!(ScanError::MalformedResponse("bad".into()).is_recoverable());
        assert!(ScanError::MalformedRequest("nul".into()).is_recoverable());
        assert!(!ScanError::Config("blind".into()).is_recoverable());
        assert!(!ScanError::OutOfScope("http://evil".into()).is_recoverable());
    }

    #[test]
    fn test_url_error_is_invalid_target() {
        let err: ScanError = url::Url::parse("not a url").unwrap_err().into();
        assert!(matches!(err, ScanError::InvalidTarget(_)));
    }
}
