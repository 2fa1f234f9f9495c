//! Support tickets: numbering, lifecycle, permissions and auto-close.

pub mod flow;
pub mod ids;
pub mod lifecycle;
pub mod timers;

pub use ids::{MAX_ID_ATTEMPTS, format_ticket_id, insert_with_next_id};
pub use lifecycle::{Actor, Capability, TicketAction, apply, authorize};
pub use timers::{SweepDecision, TicketKey, TicketTimers, decide, ticket_key};

use thiserror::Error;

use crate::models::TicketStatus;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum TicketError {
    #[error("You can't {action} a ticket that is {from}.")]
    InvalidTransition {
        from: TicketStatus,
        action: &'static str,
    },
    #[error("You don't have permission to {0} tickets.")]
    MissingCapability(Capability),
    #[error("Couldn't allocate a ticket number after {0} attempts. Please try again.")]
    IdExhausted(usize),
    #[error(transparent)]
    Store(#[from] StoreError),
}
