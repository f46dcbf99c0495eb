use std::fmt;

use crate::editor::ValidationErrors;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Request to {endpoint} failed")]
    Transport {
        endpoint: String,
        details: String,
    },
    #[error("Request to {endpoint} timed out")]
    Timeout {
        endpoint: String,
        timeout_ms: u64,
    },
    #[error("Request to {endpoint} returned HTTP {status}")]
    HttpStatus {
        endpoint: String,
        status: u16,
        body: Option<String>,
    },
    #[error("Response from {endpoint} could not be decoded")]
    Decode {
        endpoint: String,
        details: String,
    },
    #[error("Not authorised for {endpoint}")]
    Unauthorized {
        endpoint: String,
    },
    #[error("Tier failed validation")]
    Validation(ValidationErrors),
    #[error("Invalid identity token")]
    InvalidToken {
        details: String,
    },
    #[error("Mock API has no scripted result for {operation}")]
    MockExhausted {
        operation: String,
    },
    #[error("RON {action} error")]
    Ron {
        action: StorageAction,
        path: Option<String>,
        #[source]
        source: ron::Error,
    },
    #[error("Storage {action} error")]
    StorageIo {
        action: StorageAction,
        path: Option<String>,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageAction {
    Load,
    Save,
}

impl fmt::Display for StorageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageAction::Load => f.write_str("load"),
            StorageAction::Save => f.write_str("save"),
        }
    }
}

impl Error {
    /// Server failures a user-initiated retry can clear. An unauthorized
    /// request needs a new session first.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Transport { .. }
                | Error::Timeout { .. }
                | Error::HttpStatus { .. }
                | Error::Decode { .. }
                | Error::MockExhausted { .. }
        )
    }

    pub fn user_summary(&self) -> String {
        match self {
            Error::Transport { .. } => "Could not reach the farm server.".to_string(),
            Error::Timeout { .. } => "The farm server took too long to respond.".to_string(),
            Error::HttpStatus { status, .. } => {
                format!("The farm server rejected the request (HTTP {status}).")
            }
            Error::Decode { .. } => "The farm server sent an unexpected response.".to_string(),
            Error::Unauthorized { .. } => {
                "Your session has expired or lacks access. Sign in again.".to_string()
            }
            Error::Validation(errors) => errors.to_string(),
            Error::InvalidToken { .. } => "Sign-in token could not be read.".to_string(),
            Error::MockExhausted { operation } => {
                format!("Offline data has no answer for {operation}.")
            }
            Error::Ron { action, .. } => format!("Failed to {action} configuration data."),
            Error::StorageIo { action, .. } => format!("Failed to {action} configuration file."),
        }
    }

    pub fn technical_detail(&self) -> String {
        match self {
            Error::Transport { endpoint, details } => {
                format!("Transport failure for {endpoint}: {details}")
            }
            Error::Timeout {
                endpoint,
                timeout_ms,
            } => format!("Timeout after {timeout_ms}ms for {endpoint}."),
            Error::HttpStatus {
                endpoint,
                status,
                body,
            } => {
                let body = body
                    .as_ref()
                    .filter(|text| !text.trim().is_empty())
                    .map(|text| format!(" body={text}"))
                    .unwrap_or_default();
                format!("HTTP {status} from {endpoint}.{body}")
            }
            Error::Decode { endpoint, details } => {
                format!("Decode failure for {endpoint}: {details}")
            }
            Error::Unauthorized { endpoint } => format!("Unauthorized for {endpoint}."),
            Error::Validation(errors) => format!("Validation failed: {errors}"),
            Error::InvalidToken { details } => format!("Invalid id token: {details}"),
            Error::MockExhausted { operation } => {
                format!("MockFarmApi has no scripted result for {operation}.")
            }
            Error::Ron {
                action,
                path,
                source,
            } => {
                let path = path
                    .as_ref()
                    .map(|value| format!(" path={value}."))
                    .unwrap_or_default();
                format!("RON {action} error.{path} {source}")
            }
            Error::StorageIo {
                action,
                path,
                source,
            } => {
                let path = path
                    .as_ref()
                    .map(|value| format!(" path={value}."))
                    .unwrap_or_default();
                format!("Storage {action} error.{path} {source}")
            }
        }
    }
}

impl From<ValidationErrors> for Error {
    fn from(value: ValidationErrors) -> Self {
        Error::Validation(value)
    }
}
