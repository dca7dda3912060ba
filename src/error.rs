//! Error taxonomy for the game core

use thiserror::Error;

use crate::sim::scene::{EntityId, Role};
use crate::sim::scheduler::CallbackFault;

/// Why a sign-up request was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AccountFieldError {
    #[error("Please enter a username and password")]
    MissingField,
    #[error("Username must be at least 3 characters.")]
    TooShort,
    #[error("Username may only contain letters")]
    NotAlphabetic,
    #[error("Username already exists, please choose another.")]
    AlreadyExists,
}

#[derive(Debug, Error)]
pub enum GameError {
    #[error("Invalid username or password, please try again.")]
    InvalidCredentials,
    #[error(transparent)]
    InvalidAccountFields(#[from] AccountFieldError),
    #[error("input received after the game ended")]
    StaleInputAfterGameEnd,
    #[error("scheduled callback failed: {0}")]
    SchedulerCallbackFault(String),
    #[error("{role:?} entity {entity:?} cannot be driven by this {kind} controller")]
    OwnershipViolation {
        entity: Option<EntityId>,
        role: Role,
        kind: &'static str,
    },
    #[error("entity {0:?} is not in the scene")]
    UnknownEntity(EntityId),
    #[error("cannot {event} while {phase}")]
    InvalidTransition {
        phase: &'static str,
        event: &'static str,
    },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<CallbackFault> for GameError {
    fn from(fault: CallbackFault) -> Self {
        GameError::SchedulerCallbackFault(fault.0)
    }
}
