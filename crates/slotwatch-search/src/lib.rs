//! The search-and-book loop and the façade that drives it.
//!
//! [`SearchWorker`] owns at most one run at a time and polls a
//! [`slotwatch_core::RemoteBookingService`] until it books a slot, is stopped,
//! or loses the session. [`Orchestrator`] wires stored preferences and visit
//! preparation into the worker and reacts to session loss.

pub mod orchestrator;
pub mod worker;

#[cfg(test)]
pub(crate) mod fake;

pub use orchestrator::Orchestrator;
pub use worker::{
    AuthLossHandler, FailureReason, RunOutcome, SearchWorker, WorkerError, WorkerSettings,
    WorkerState,
};
