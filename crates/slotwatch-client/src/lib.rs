//! HTTP binding of the booking platform's central API.
//!
//! [`BookingClient`] implements both [`slotwatch_core::RemoteBookingService`]
//! and [`slotwatch_core::VisitPreparer`].

pub mod booking;
pub mod client;
pub mod error;
mod retry;
pub mod types;
pub mod visit;

pub use client::{BookingClient, ClientSettings};
pub use error::ClientError;
