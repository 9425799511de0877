//! Error taxonomy for the fan control loop.
//!
//! Hardware-facing code returns [`FanControlError`] so the control loop can
//! tell a retryable sensor failure from a rejected fan command or a broken
//! configuration. Startup glue wraps these in `anyhow` for context.

/// Result type alias using [`FanControlError`].
pub type Result<T> = std::result::Result<T, FanControlError>;

/// Every failure the controller distinguishes.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FanControlError {
    /// Connectivity or session failure talking to the management controller.
    #[error("transport error: {0}")]
    Transport(String),

    /// The management controller rejected the credentials.
    #[error("authentication error: {0}")]
    Auth(String),

    /// The management controller refused a fan command.
    #[error("command rejected: {0}")]
    RejectedCommand(String),

    /// Malformed or internally inconsistent configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No sensor matched a watch pattern and the group treats that as an error.
    #[error("no sensor matches pattern '{pattern}'")]
    UnmatchedSensor { pattern: String },
}

impl FanControlError {
    /// Short error class name used in operator-facing messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "TransportError",
            Self::Auth(_) => "AuthError",
            Self::RejectedCommand(_) => "RejectedCommandError",
            Self::Configuration(_) => "ConfigurationError",
            Self::UnmatchedSensor { .. } => "UnmatchedSensorError",
        }
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn kind_names_error_class() {
        assert_eq!(FanControlError::Transport("x".into()).kind(), "TransportError");
        assert_eq!(FanControlError::Auth("x".into()).kind(), "AuthError");
        assert_eq!(
            FanControlError::RejectedCommand("x".into()).kind(),
            "RejectedCommandError"
        );
        assert_eq!(FanControlError::config("x").kind(), "ConfigurationError");
    }

    #[test]
    fn display_includes_detail() {
        let err = FanControlError::UnmatchedSensor {
            pattern: "CPU.*".into(),
        };
        assert_eq!(err.to_string(), "no sensor matches pattern 'CPU.*'");
    }
}
