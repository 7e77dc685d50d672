//! Crate-level error type.

use thiserror::Error;

/// Everything that can go wrong between the terminal and the chat backend.
///
/// Per-line parse and validation problems are *not* errors: the reconciler
/// skips those lines and logs them. Only whole-operation failures end up here.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The request never produced a response (connect failure, broken stream).
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The backend answered with a non-2xx status. Streaming is not attempted.
    #[error("unexpected response: {status} - {body}")]
    Status { status: u16, body: String },

    /// `DELETE /chat/` was refused; carries the response body verbatim.
    #[error("failed to clear chat history: {0}")]
    ClearFailed(String),

    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Config(String),

    #[error("could not store preferences: {0}")]
    Prefs(String),

    #[error("malformed JSON from backend: {0}")]
    Json(#[from] serde_json::Error),
}

impl ChatError {
    pub(crate) fn http(url: impl Into<String>, source: reqwest::Error) -> Self {
        ChatError::Http {
            url: url.into(),
            source,
        }
    }

    pub(crate) fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        ChatError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display_includes_code_and_body() {
        let err = ChatError::Status {
            status: 500,
            body: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "unexpected response: 500 - boom");
    }

    #[test]
    fn test_clear_failed_display() {
        let err = ChatError::ClearFailed("locked".to_string());
        assert_eq!(err.to_string(), "failed to clear chat history: locked");
    }

    #[test]
    fn test_json_error_converts() {
        let parse = serde_json::from_str::<Vec<String>>("nope").unwrap_err();
        let err: ChatError = parse.into();
        assert!(matches!(err, ChatError::Json(_)));
    }

    #[test]
    fn test_io_helper_keeps_path() {
        let err = ChatError::io(
            "prefs.toml",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().starts_with("could not read prefs.toml"));
    }
}
