use thiserror::Error;

#[derive(Error, Debug)]
pub enum SwapError {
    #[error("{operation} rejected for {resource}: {message}")]
    RemoteRejection {
        operation: String,
        resource: String,
        message: String,
    },

    #[error("Timed out waiting for {resource} to become {target} after {attempts} attempts")]
    WaitTimeout {
        resource: String,
        target: String,
        attempts: u32,
    },

    /// The waiter observed a state from which `target` can no longer be reached.
    #[error("{resource} entered state {state} while waiting for {target}")]
    TerminalState {
        resource: String,
        target: String,
        state: String,
    },

    #[error("Unexpected error: {0}")]
    Unexpected(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, SwapError>;

impl SwapError {
    pub fn rejected(
        operation: impl Into<String>,
        resource: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        SwapError::RemoteRejection {
            operation: operation.into(),
            resource: resource.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            SwapError::RemoteRejection { .. } => FailureKind::RemoteRejection,
            SwapError::WaitTimeout { .. } | SwapError::TerminalState { .. } => {
                FailureKind::WaitTimeout
            }
            _ => FailureKind::Unexpected,
        }
    }
}

/// The three failure classes an operator needs to tell apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FailureKind {
    RemoteRejection,
    WaitTimeout,
    Unexpected,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::RemoteRejection => write!(f, "remote rejection"),
            FailureKind::WaitTimeout => write!(f, "wait timeout"),
            FailureKind::Unexpected => write!(f, "unexpected"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let rejection = SwapError::rejected("CreateSnapshot", "vol-1", "UnauthorizedOperation");
        assert_eq!(rejection.kind(), FailureKind::RemoteRejection);

        let timeout = SwapError::WaitTimeout {
            resource: "snap-1".to_string(),
            target: "completed".to_string(),
            attempts: 40,
        };
        assert_eq!(timeout.kind(), FailureKind::WaitTimeout);

        let terminal = SwapError::TerminalState {
            resource: "snap-1".to_string(),
            target: "completed".to_string(),
            state: "error".to_string(),
        };
        assert_eq!(terminal.kind(), FailureKind::WaitTimeout);

        assert_eq!(
            SwapError::Unexpected("missing volume id".to_string()).kind(),
            FailureKind::Unexpected
        );
        assert_eq!(
            SwapError::ConfigError("bad".to_string()).kind(),
            FailureKind::Unexpected
        );
    }

    #[test]
    fn test_rejection_message() {
        let err = SwapError::rejected("AttachVolume", "vol-2", "InvalidParameterValue");
        assert_eq!(
            err.to_string(),
            "AttachVolume rejected for vol-2: InvalidParameterValue"
        );
    }
}
