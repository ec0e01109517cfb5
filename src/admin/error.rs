//! Admin API client error type definitions

use std::fmt;

use http::StatusCode;

use super::types::AdminErrorResponse;

/// Admin API call failure
#[derive(Debug, Clone, PartialEq)]
pub enum AdminClientError {
    /// Request never reached the server or was never answered
    Transport(String),

    /// API key rejected (401/403)
    Authentication(String),

    /// Server rejected the request
    Rejected {
        status: u16,
        error_type: String,
        message: String,
    },

    /// Response body did not match the expected shape
    Decode(String),
}

impl fmt::Display for AdminClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminClientError::Transport(msg) => write!(f, "Request failed: {}", msg),
            AdminClientError::Authentication(msg) => write!(f, "Authentication failed: {}", msg),
            AdminClientError::Rejected {
                status, message, ..
            } => write!(f, "Server rejected request ({}): {}", status, message),
            AdminClientError::Decode(msg) => write!(f, "Unexpected response: {}", msg),
        }
    }
}

impl std::error::Error for AdminClientError {}

impl From<reqwest::Error> for AdminClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            AdminClientError::Decode(e.to_string())
        } else {
            AdminClientError::Transport(e.to_string())
        }
    }
}

impl AdminClientError {
    /// Classify a non-success HTTP response
    ///
    /// `body` is the raw response text; the kiro.rs error envelope
    /// `{"error": {"type", "message"}}` is used when present.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let parsed = serde_json::from_str::<AdminErrorResponse>(body).ok();
        let message = match &parsed {
            Some(resp) => resp.error.message.clone(),
            None if body.trim().is_empty() => status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string(),
            None => body.trim().to_string(),
        };

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                AdminClientError::Authentication(message)
            }
            _ => AdminClientError::Rejected {
                status: status.as_u16(),
                error_type: parsed
                    .map(|resp| resp.error.error_type)
                    .unwrap_or_else(|| "unknown".to_string()),
                message,
            },
        }
    }

    /// Whether the API key was rejected
    pub fn is_authentication(&self) -> bool {
        matches!(self, AdminClientError::Authentication(_))
    }
}
