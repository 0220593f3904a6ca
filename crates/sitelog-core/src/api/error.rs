use serde::Deserialize;
use thiserror::Error;

/// Errors returned by `ApiClient`.
///
/// Clone so that a single failed request can be reported to every caller
/// sharing it through the query cache.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// 401 from the backend. The stored session has already been cleared;
    /// callers should send the user to login instead of retrying.
    #[error("Session is no longer valid - please log in again")]
    SessionInvalid,

    #[error("Request failed ({status}): {message}")]
    Request { status: u16, message: String },

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Shown when the backend gives no usable message.
const GENERIC_SERVER_MESSAGE: &str = "The server returned an error";

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Human-readable message from an error body.
    ///
    /// The backend reports failures as `{"error": "..."}`; anything else is
    /// passed through truncated, and an empty body becomes a generic message.
    pub fn message_from_body(body: &str) -> String {
        if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
            return parsed.error;
        }
        let trimmed = body.trim();
        if trimmed.is_empty() || trimmed.starts_with('<') {
            GENERIC_SERVER_MESSAGE.to_string()
        } else {
            Self::truncate_body(trimmed)
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        match status.as_u16() {
            401 => ApiError::SessionInvalid,
            429 => ApiError::RateLimited,
            code => ApiError::Request {
                status: code,
                message: Self::message_from_body(body),
            },
        }
    }

    /// HTTP status, when the backend produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::SessionInvalid => Some(401),
            ApiError::RateLimited => Some(429),
            ApiError::Request { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_session_invalid(&self) -> bool {
        matches!(self, ApiError::SessionInvalid)
    }

    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Request { message, .. } => message.clone(),
            ApiError::Network(_) => {
                "Unable to connect to server. Check your internet connection.".to_string()
            }
            ApiError::Timeout => "Connection timed out. Please try again.".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout
        } else if e.is_decode() {
            ApiError::InvalidResponse(e.to_string())
        } else if let Some(status) = e.status() {
            ApiError::Request {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            ApiError::Network(e.to_string())
        }
    }
}
