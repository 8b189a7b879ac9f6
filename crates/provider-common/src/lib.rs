use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod helpers;
pub mod host;

pub use host::{
    ExecutionMode, HttpMethod, HttpRequest, HttpResponse, NodeHost, NodeItem, OptionEntry,
};

/// Common error type the Solapi nodes use to surface failures to the host.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProviderError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("remote returned status {status}: {message}")]
    Remote { status: u16, message: String },
    #[error("missing secret: {name} (scope: {scope})")]
    MissingSecret {
        name: String,
        scope: String,
        remediation: String,
    },
    #[error("webhook activation failed: {0}")]
    Activation(String),
}

impl ProviderError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ProviderError::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        ProviderError::Config(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        ProviderError::Transport(msg.into())
    }

    pub fn remote(status: u16, msg: impl Into<String>) -> Self {
        ProviderError::Remote {
            status,
            message: msg.into(),
        }
    }

    pub fn activation(msg: impl Into<String>) -> Self {
        ProviderError::Activation(msg.into())
    }

    pub fn missing_secret(name: impl Into<String>) -> Self {
        let name = name.into();
        ProviderError::MissingSecret {
            name: name.clone(),
            scope: "node".into(),
            remediation: format!(
                "Attach a `{name}` credential to this node in the host credential store."
            ),
        }
    }

    /// True for failures caused by the node setup rather than the remote side.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ProviderError::Config(_)
                | ProviderError::Validation(_)
                | ProviderError::MissingSecret { .. }
        )
    }
}
