use reqwest::StatusCode;

/// Failures talking to the reconciliation backend.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("{message}")]
    Status { status: StatusCode, message: String },

    #[error("invalid response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl ChatError {
    /// Builds the error for a non-2xx response from whatever body it carried.
    ///
    /// A JSON body contributes its `error` or `message` field, any other body
    /// its text, and an empty body falls back to the status code.
    pub fn from_response_body(status: StatusCode, is_json: bool, body: &str) -> Self {
        let from_json = || {
            let value: serde_json::Value = serde_json::from_str(body).ok()?;
            ["error", "message"]
                .into_iter()
                .find_map(|key| value.get(key)?.as_str().map(str::to_string))
        };
        let message = if is_json {
            from_json()
        } else {
            Some(body.trim().to_string()).filter(|text| !text.is_empty())
        };
        ChatError::Status {
            status,
            message: message
                .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16())),
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ChatError::Status { status, .. } => Some(*status),
            ChatError::Http(err) => err.status(),
            _ => None,
        }
    }
}

pub type ChatResult<T> = Result<T, ChatError>;
