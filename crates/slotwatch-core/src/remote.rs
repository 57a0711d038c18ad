//! Contracts for the remote booking platform.
//!
//! The search worker depends only on these traits. Session state (cookies,
//! API keys) belongs to the implementation and never crosses this boundary.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use thiserror::Error;

use crate::model::{
    Calendar, ClaimOutcome, ClaimParams, Identity, PreparedVisit, Service, UserMetadata,
};

/// Failure of a single remote call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The session is no longer valid (HTTP 401/403). Never retried.
    #[error("session expired or unauthorized")]
    AuthExpired,

    /// Network failure, server error, or an unreadable response.
    #[error("transient remote failure: {0}")]
    Transient(String),
}

/// Read and claim operations against the booking platform.
#[async_trait]
pub trait RemoteBookingService: Send + Sync {
    /// Services of the configured type offered at `location_id`.
    async fn list_services_at(&self, location_id: i64) -> Result<Vec<Service>, RemoteError>;

    /// Open calendar days for a service, earliest first as returned.
    async fn list_calendars(&self, service_id: i64) -> Result<Vec<Calendar>, RemoteError>;

    /// Open appointment instants on one calendar day.
    async fn list_open_slots(&self, calendar: &Calendar)
        -> Result<Vec<NaiveDateTime>, RemoteError>;

    /// Attempt to book one slot for the prepared visit.
    async fn claim_slot(
        &self,
        visit_token: &str,
        params: &ClaimParams,
    ) -> Result<ClaimOutcome, RemoteError>;

    /// The logged-in user, or `None` when the session is anonymous.
    async fn session_identity(&self) -> Result<Option<Identity>, RemoteError>;
}

/// Failure while preparing a visit.
#[derive(Debug, Error)]
pub enum PrepareError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("unexpected prerequisite question {question_id}")]
    UnexpectedQuestion { question_id: i64 },

    #[error("questionnaire did not finish after {max} questions")]
    TooManyQuestions { max: usize },

    #[error("visit preparation rejected: {0}")]
    Rejected(String),
}

/// Produces the visit token and answers used by every claim in a run.
#[async_trait]
pub trait VisitPreparer: Send + Sync {
    async fn prepare(&self, metadata: &UserMetadata) -> Result<PreparedVisit, PrepareError>;
}
