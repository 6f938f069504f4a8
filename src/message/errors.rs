use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    /// Rejected synchronously; the message never enters the bus
    #[error("Invalid message: {0}")]
    InvalidMessage(String),
}

impl MessageError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        MessageError::InvalidMessage(reason.into())
    }
}
