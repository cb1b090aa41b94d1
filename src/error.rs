//! Errors reported to the host.

use crate::ScannerState;

#[derive(Debug, thiserror::Error)]
pub enum ScannerError {
    /// the command is not accepted in the current state (or is not known at all)
    #[error("Action '{action}' not supported (now) state = {state}")]
    InvalidCommandState {
        action: String,
        state: ScannerState,
    },

    /// the active read session was interrupted and has ended
    #[error("read session interrupted: {0}")]
    SuspendedOperation(String),

    /// a scan notification could not be decoded
    #[error("malformed scan notification: {0}")]
    MalformedEventPayload(#[source] serde_json::Error),

    /// a reply could not be encoded
    #[error("unable to encode reply: {0}")]
    Serialization(#[source] serde_json::Error),

    /// the event bus refused the listener subscription
    #[error("unable to register scan listener: {0}")]
    Registration(#[source] anyhow::Error),
}

impl ScannerError {
    pub(crate) fn invalid_state(action: impl Into<String>, state: ScannerState) -> Self {
        ScannerError::InvalidCommandState {
            action: action.into(),
            state,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScannerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_state_message() {
        let err = ScannerError::invalid_state("read", ScannerState::None);
        let message = err.to_string();
        assert!(message.contains("not supported"));
        assert!(message.contains("'read'"));
        assert!(message.ends_with("state = 0 (NONE)"));
    }
}
