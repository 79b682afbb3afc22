//! Command-based control for the orchestrator.

use crate::event::Event;

/// Actions accepted by [`Orchestrator::handle`](crate::Orchestrator::handle).
#[derive(Debug, Clone)]
pub enum RunCommand {
    /// Append an event to the pending queue.
    Enqueue(Event),
    /// Run one event immediately.
    Single(Event),
    /// Run two events together on the shared rail.
    Parallel(Event, Event),
    /// Run every queued event in order, one at a time.
    RunQueue,
    /// Stop the active run.
    Cancel,
}
