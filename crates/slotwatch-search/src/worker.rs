//! The search-and-book worker.
//!
//! ```text
//!            start                 slot in window
//!   Idle ───────────▶ Searching ──────────────────▶ Claiming
//!                      │     ▲                          │
//!                      │     └──── conflict / retry ────┤
//!                      ▼                                ▼
//!            Stopped / Failed(..)                Stopped (booked)
//! ```
//!
//! A run polls locations, services, calendars, and slots strictly in the order
//! they are supplied or returned, and claims the first slot that falls inside
//! the deadline window. Polls race the run's cancellation token; a claim, once
//! sent, is always allowed to finish.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime, TimeDelta};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use slotwatch_core::{
    AppConfig, Booking, ClaimOutcome, ClaimParams, RemoteBookingService, RemoteError,
    SearchConfig, Slot,
};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

tokio::task_local! {
    /// Set while a run's task is inside its auth-loss handler. Holds the
    /// worker's [`Shared::key`].
    static SETTLING: usize;
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("a search run is already in progress")]
    AlreadyRunning,

    #[error("search task ended abnormally: {0}")]
    TaskFailed(String),
}

/// Why a run ended in [`WorkerState::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    AuthExpired,
    VisitExpired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Searching,
    Claiming,
    Stopped,
    Failed(FailureReason),
}

impl WorkerState {
    /// `true` while a run is in progress.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Searching | Self::Claiming)
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Booked(Booking),
    Cancelled,
    /// The deadline had already passed when the run was started.
    NoValidWindow,
    /// The deadline passed while searching.
    DeadlineElapsed,
    AuthExpired,
    VisitExpired,
}

impl RunOutcome {
    fn terminal_state(&self) -> WorkerState {
        match self {
            Self::AuthExpired => WorkerState::Failed(FailureReason::AuthExpired),
            Self::VisitExpired => WorkerState::Failed(FailureReason::VisitExpired),
            Self::Booked(_) | Self::Cancelled | Self::NoValidWindow | Self::DeadlineElapsed => {
                WorkerState::Stopped
            }
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Booked(booking) => {
                write!(
                    f,
                    "booked {} at location {}",
                    booking.slot.starts_at.format("%Y-%m-%d %H:%M"),
                    booking.slot.location_id
                )?;
                if let Some(reference) = &booking.reference {
                    write!(f, " (reference {reference})")?;
                }
                Ok(())
            }
            Self::Cancelled => f.write_str("search cancelled"),
            Self::NoValidWindow => f.write_str("deadline already passed; nothing to search"),
            Self::DeadlineElapsed => f.write_str("deadline passed before a slot was found"),
            Self::AuthExpired => f.write_str("session expired; log in again"),
            Self::VisitExpired => f.write_str("prepared visit was rejected; start a new search"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Pause between full rounds over every location.
    pub poll_interval: Duration,
}

impl WorkerSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Notified when a run ends because the session expired.
///
/// Called at most once per run, from the run's own task, before the worker
/// publishes [`WorkerState::Failed`]. [`SearchWorker::wait`] does not resolve
/// until the handler returns. The handler may call [`SearchWorker::stop`].
#[async_trait]
pub trait AuthLossHandler: Send + Sync {
    async fn on_auth_lost(&self);
}

pub struct SearchWorker {
    shared: Arc<Shared>,
    run: Mutex<Option<ActiveRun>>,
}

struct ActiveRun {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct Shared {
    service: Arc<dyn RemoteBookingService>,
    settings: WorkerSettings,
    auth_handler: Option<Arc<dyn AuthLossHandler>>,
    state: watch::Sender<WorkerState>,
    outcome: Mutex<Option<RunOutcome>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    fn set_state(&self, state: WorkerState) {
        self.state.send_replace(state);
    }

    /// Identifies this worker to [`SETTLING`].
    fn key(&self) -> usize {
        std::ptr::from_ref(self) as usize
    }

    /// Stores the outcome and returns the state to publish for it.
    fn record(&self, outcome: RunOutcome) -> WorkerState {
        let state = outcome.terminal_state();
        *lock(&self.outcome) = Some(outcome);
        state
    }

    /// Records the outcome, then publishes the terminal state. The state is
    /// always the last thing a run writes.
    fn finish(&self, outcome: RunOutcome) {
        let state = self.record(outcome);
        self.set_state(state);
    }
}

impl SearchWorker {
    #[must_use]
    pub fn new(
        service: Arc<dyn RemoteBookingService>,
        settings: WorkerSettings,
        auth_handler: Option<Arc<dyn AuthLossHandler>>,
    ) -> Self {
        let (state, _) = watch::channel(WorkerState::Idle);
        Self {
            shared: Arc::new(Shared {
                service,
                settings,
                auth_handler,
                state,
                outcome: Mutex::new(None),
            }),
            run: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn state(&self) -> WorkerState {
        self.shared.state()
    }

    /// Outcome of the most recent finished run.
    #[must_use]
    pub fn last_outcome(&self) -> Option<RunOutcome> {
        lock(&self.shared.outcome).clone()
    }

    /// Starts a run in the background. Must be called within a Tokio runtime.
    ///
    /// A config whose deadline has already passed finishes immediately with
    /// [`RunOutcome::NoValidWindow`] without touching the network.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::AlreadyRunning`] if a run is searching or
    /// claiming. The existing run is left untouched.
    pub fn start(&self, config: SearchConfig) -> Result<(), WorkerError> {
        let mut run = lock(&self.run);
        if self.shared.state().is_active() {
            tracing::warn!("search start rejected: a run is already in progress");
            return Err(WorkerError::AlreadyRunning);
        }

        // Any previous run has already published its terminal state.
        *run = None;
        *lock(&self.shared.outcome) = None;

        if config.deadline_in_days < 0 {
            tracing::info!(
                deadline_in_days = config.deadline_in_days,
                "deadline already passed; not searching"
            );
            self.shared.finish(RunOutcome::NoValidWindow);
            return Ok(());
        }

        tracing::info!(
            locations = config.locations.len(),
            deadline_in_days = config.deadline_in_days,
            visit_id = config.prepared_visit.visit_id,
            "search run starting"
        );
        self.shared.set_state(WorkerState::Searching);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_search(
            Arc::clone(&self.shared),
            config,
            cancel.clone(),
        ));
        *run = Some(ActiveRun { cancel, handle });
        Ok(())
    }

    /// Cancels the active run, if any, and waits for it to settle.
    ///
    /// Idempotent. An in-flight poll is abandoned; an in-flight claim is
    /// allowed to complete.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::TaskFailed`] if the run's task panicked.
    pub async fn stop(&self) -> Result<(), WorkerError> {
        let Some(active) = lock(&self.run).take() else {
            return Ok(());
        };
        active.cancel.cancel();

        // Called from the run's auth-loss handler; the task is already ending.
        if SETTLING
            .try_with(|key| *key == self.shared.key())
            .unwrap_or(false)
        {
            return Ok(());
        }

        tracing::info!("stopping search run");
        active
            .handle
            .await
            .map_err(|e| WorkerError::TaskFailed(e.to_string()))
    }

    /// Resolves once the worker is not searching or claiming.
    pub async fn wait(&self) -> WorkerState {
        let mut rx = self.shared.state.subscribe();
        let settled = rx.wait_for(|state| !state.is_active()).await.map(|s| *s);
        settled.unwrap_or_else(|_| self.state())
    }
}

impl Drop for SearchWorker {
    fn drop(&mut self) {
        let run = self.run.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(active) = run.take() {
            active.cancel.cancel();
        }
    }
}

async fn run_search(shared: Arc<Shared>, config: SearchConfig, cancel: CancellationToken) {
    let started = Local::now().naive_local();
    let deadline = TimeDelta::try_days(config.deadline_in_days)
        .and_then(|span| started.checked_add_signed(span))
        .unwrap_or(NaiveDateTime::MAX);

    let mut run = Run {
        shared: &shared,
        config: &config,
        cancel: &cancel,
        deadline,
        conflicted: HashSet::new(),
    };
    let outcome = run.execute().await;

    match &outcome {
        RunOutcome::Booked(booking) => tracing::info!(
            location_id = booking.slot.location_id,
            starts_at = %booking.slot.starts_at,
            reference = booking.reference.as_deref().unwrap_or("-"),
            "appointment booked"
        ),
        RunOutcome::AuthExpired | RunOutcome::VisitExpired => {
            tracing::warn!(outcome = %outcome, "search run failed");
        }
        _ => tracing::info!(outcome = %outcome, "search run ended"),
    }

    let session_lost = outcome == RunOutcome::AuthExpired;
    let state = shared.record(outcome);

    if session_lost {
        if let Some(handler) = &shared.auth_handler {
            SETTLING.scope(shared.key(), handler.on_auth_lost()).await;
        }
    }
    shared.set_state(state);
}

/// Why a round stopped early.
enum Interrupt {
    Finished(RunOutcome),
    /// Transient failure: wait for the next round.
    Pause,
}

fn interrupt_for(error: RemoteError) -> Interrupt {
    match error {
        RemoteError::AuthExpired => Interrupt::Finished(RunOutcome::AuthExpired),
        RemoteError::Transient(reason) => {
            tracing::warn!(error = %reason, "remote call failed; retrying next round");
            Interrupt::Pause
        }
    }
}

struct Run<'a> {
    shared: &'a Shared,
    config: &'a SearchConfig,
    cancel: &'a CancellationToken,
    deadline: NaiveDateTime,
    /// Slots lost to another caller during this run.
    conflicted: HashSet<Slot>,
}

impl Run<'_> {
    async fn execute(&mut self) -> RunOutcome {
        let mut round: u64 = 0;
        loop {
            round += 1;
            tracing::debug!(round, "search round starting");

            match self.search_round().await {
                Ok(()) => tracing::debug!(round, "no qualifying slot this round"),
                Err(Interrupt::Finished(outcome)) => return outcome,
                Err(Interrupt::Pause) => {}
            }

            let now = Local::now().naive_local();
            if now >= self.deadline {
                return RunOutcome::DeadlineElapsed;
            }
            let remaining = (self.deadline - now).to_std().unwrap_or_default();
            let pause = self.shared.settings.poll_interval.min(remaining);

            tokio::select! {
                _ = self.cancel.cancelled() => return RunOutcome::Cancelled,
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }

    async fn search_round(&mut self) -> Result<(), Interrupt> {
        let config = self.config;
        let shared = self.shared;
        let service_api = &shared.service;

        'locations: for location in &config.locations {
            let services = self.poll(service_api.list_services_at(location.id)).await?;

            for service in services {
                let calendars = self.poll(service_api.list_calendars(service.id)).await?;

                for calendar in calendars {
                    if calendar.date > self.deadline.date() {
                        continue;
                    }
                    let times = self.poll(service_api.list_open_slots(&calendar)).await?;

                    let candidate = times
                        .into_iter()
                        .map(|starts_at| Slot {
                            location_id: location.id,
                            service_id: service.id,
                            calendar_id: calendar.id,
                            starts_at,
                        })
                        .find(|slot| {
                            slot.starts_at <= self.deadline && !self.conflicted.contains(slot)
                        });

                    if let Some(slot) = candidate {
                        self.claim(slot).await?;
                        // Lost the race for this slot; move on.
                        continue 'locations;
                    }
                }
            }
        }
        Ok(())
    }

    /// Runs one read call unless the run is cancelled first.
    async fn poll<T>(
        &self,
        call: impl Future<Output = Result<T, RemoteError>>,
    ) -> Result<T, Interrupt> {
        if self.cancel.is_cancelled() {
            return Err(Interrupt::Finished(RunOutcome::Cancelled));
        }
        let result = tokio::select! {
            _ = self.cancel.cancelled() => return Err(Interrupt::Finished(RunOutcome::Cancelled)),
            result = call => result,
        };
        result.map_err(interrupt_for)
    }

    /// Returns `Ok(())` only when the slot was lost to a conflict.
    async fn claim(&mut self, slot: Slot) -> Result<(), Interrupt> {
        if self.cancel.is_cancelled() {
            return Err(Interrupt::Finished(RunOutcome::Cancelled));
        }

        let config = self.config;
        let visit = &config.prepared_visit;
        let params = ClaimParams::for_slot(&slot, visit);
        tracing::info!(
            location_id = slot.location_id,
            service_id = slot.service_id,
            calendar_id = slot.calendar_id,
            starts_at = %slot.starts_at,
            "claiming slot"
        );

        self.shared.set_state(WorkerState::Claiming);
        let result = self
            .shared
            .service
            .claim_slot(&visit.visit_token, &params)
            .await;

        match result {
            Ok(ClaimOutcome::Confirmed { reference }) => {
                Err(Interrupt::Finished(RunOutcome::Booked(Booking { slot, reference })))
            }
            Ok(ClaimOutcome::Conflict) => {
                tracing::info!(starts_at = %slot.starts_at, "slot already taken");
                self.conflicted.insert(slot);
                self.shared.set_state(WorkerState::Searching);
                Ok(())
            }
            Ok(ClaimOutcome::VisitExpired) => Err(Interrupt::Finished(RunOutcome::VisitExpired)),
            Ok(ClaimOutcome::Rejected(reason)) => {
                tracing::warn!(reason = %reason, "claim rejected; retrying next round");
                self.shared.set_state(WorkerState::Searching);
                Err(Interrupt::Pause)
            }
            Err(RemoteError::AuthExpired) => Err(Interrupt::Finished(RunOutcome::AuthExpired)),
            Err(e @ RemoteError::Transient(_)) => {
                self.shared.set_state(WorkerState::Searching);
                Err(interrupt_for(e))
            }
        }
    }
}

#[cfg(test)]
#[path = "worker_test.rs"]
mod tests;
