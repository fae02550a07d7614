//! Worker primitives: classified task spawning, supervised actors fed by
//! bounded mailboxes, and the debounced scheduler that serializes
//! reconciliation passes.

mod class;
pub mod debounce;
pub mod mailbox;
mod spawn;
pub mod supervisor;
mod token;

pub use class::TaskClass;
pub use debounce::{Debouncer, Phase, Request, Ticket};
pub use spawn::spawn;

/// Receiver for events broadcast by a supervised actor.
pub type ActorEventReceiver<Evt> = tokio::sync::broadcast::Receiver<Evt>;
