pub mod association;
pub mod color;
pub mod event;
pub mod invitation;

pub use association::Association;
pub use color::{ColorPicker, ColorStrategy, DEFAULT_COLOR, EVENT_PALETTE};
pub use event::{Event, EventDraft, EventPatch};
pub use invitation::{Invitation, InvitationStatus, InviteTarget};

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlanningError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
}
