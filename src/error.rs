use thiserror::Error;

/// Errors surfaced by the chat client.
///
/// Security-filter outcomes are not errors; see [`crate::security::ValidationOutcome`].
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Request failed ({status}): {message}")]
    Transport { status: u16, message: String },

    #[error("Session is missing or expired")]
    Auth,

    #[error("Socket error: {0}")]
    Socket(String),

    #[error("Not allowed: {0}")]
    Forbidden(String),

    #[error("Malformed payload: {0}")]
    Protocol(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChatError {
    pub fn is_auth(&self) -> bool {
        matches!(self, ChatError::Auth)
    }

    /// Text shown to the user in a toast.
    pub fn user_message(&self) -> String {
        match self {
            ChatError::Validation(message) => message.clone(),
            ChatError::Forbidden(message) => format!("Not allowed: {message}"),
            ChatError::Auth => "Your session has expired. Please sign in again.".to_string(),
            _ => "Something went wrong. Please try again.".to_string(),
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ChatError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ChatError::Socket(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_show_generic_retry_text() {
        let err = ChatError::Transport {
            status: 500,
            message: "db down".to_string(),
        };
        assert_eq!(err.user_message(), "Something went wrong. Please try again.");
        assert!(!err.is_auth());
    }

    #[test]
    fn validation_errors_show_their_own_text() {
        let err = ChatError::Validation("Message is too short".to_string());
        assert_eq!(err.user_message(), "Message is too short");
    }
}
