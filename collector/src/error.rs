use std::time::Duration;

/// Why a resource type produced no observations in a tick.
///
/// None of these end the collection loop. `Auth` is logged at error level
/// because it repeats every tick until the credentials are fixed.
#[derive(thiserror::Error, Debug)]
pub enum CollectError {
    #[error("transport error: {message}")]
    Transport { status: Option<u16>, message: String },
    #[error("authentication rejected with HTTP {status}: {body}")]
    Auth { status: u16, body: String },
    #[error("unexpected response shape: {0}")]
    Shape(String),
    #[error("no response within {0:?}")]
    Timeout(Duration),
}

impl CollectError {
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        if status == 401 || status == 403 {
            Self::Auth { status, body }
        } else {
            Self::Transport {
                status: Some(status),
                message: format!("HTTP {status}: {body}"),
            }
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, CollectError::Auth { .. })
    }
}

impl From<reqwest::Error> for CollectError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Transport {
                status: None,
                message: format!("request timed out: {err}"),
            };
        }
        Self::Transport {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_and_forbidden_are_auth_errors() {
        assert!(CollectError::status(401, "Unauthorized").is_auth());
        assert!(CollectError::status(403, "Forbidden").is_auth());
        let err = CollectError::status(503, "busy");
        assert!(!err.is_auth());
        assert!(matches!(err, CollectError::Transport { status: Some(503), .. }));
        assert_eq!(err.to_string(), "transport error: HTTP 503: busy");
    }
}
