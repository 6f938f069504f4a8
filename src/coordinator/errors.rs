use thiserror::Error;

use crate::claims::ClaimError;
use crate::message::MessageError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinationError {
    #[error(transparent)]
    Message(#[from] MessageError),

    #[error(transparent)]
    Claim(#[from] ClaimError),
}

impl CoordinationError {
    /// True for the expected "someone else already holds it" signal
    pub fn is_already_claimed(&self) -> bool {
        matches!(self, CoordinationError::Claim(ClaimError::AlreadyClaimed { .. }))
    }
}
