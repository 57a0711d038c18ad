//! Façade over the search worker: login checks, starting and stopping runs,
//! and tearing the session down when the platform rejects it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use async_trait::async_trait;
use chrono::Local;

use slotwatch_core::{
    filter_by_cities, Location, PrepareError, PreferenceStore, RemoteBookingService, RemoteError,
    SearchConfig, VisitPreparer,
};

use crate::worker::{AuthLossHandler, RunOutcome, SearchWorker, WorkerSettings, WorkerState};

/// Stops the worker and clears the stored login flag, once per auth loss.
struct SessionTeardown {
    worker: OnceLock<Weak<SearchWorker>>,
    store: Arc<dyn PreferenceStore>,
    torn_down: AtomicBool,
}

impl SessionTeardown {
    /// Re-arms the teardown after the session is known to be valid again.
    fn rearm(&self) {
        self.torn_down.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl AuthLossHandler for SessionTeardown {
    async fn on_auth_lost(&self) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            tracing::debug!("session already torn down");
            return;
        }

        if let Some(worker) = self.worker.get().and_then(Weak::upgrade) {
            if let Err(e) = worker.stop().await {
                tracing::warn!(error = %e, "failed to stop search after session loss");
            }
        }
        if let Err(e) = self.store.set_logged_in(false).await {
            tracing::warn!(error = %e, "failed to clear stored login flag");
        }
        tracing::warn!("session expired: search stopped and login cleared");
    }
}

pub struct Orchestrator {
    service: Arc<dyn RemoteBookingService>,
    preparer: Arc<dyn VisitPreparer>,
    store: Arc<dyn PreferenceStore>,
    catalog: Vec<Location>,
    worker: Arc<SearchWorker>,
    teardown: Arc<SessionTeardown>,
    /// Held from the active-run check until the worker has started.
    starting: AtomicBool,
}

/// Clears [`Orchestrator::starting`] when a start attempt ends.
struct StartGuard<'a>(&'a AtomicBool);

impl Drop for StartGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        service: Arc<dyn RemoteBookingService>,
        preparer: Arc<dyn VisitPreparer>,
        store: Arc<dyn PreferenceStore>,
        catalog: Vec<Location>,
        settings: WorkerSettings,
    ) -> Self {
        let teardown = Arc::new(SessionTeardown {
            worker: OnceLock::new(),
            store: Arc::clone(&store),
            torn_down: AtomicBool::new(false),
        });
        let worker = Arc::new(SearchWorker::new(
            Arc::clone(&service),
            settings,
            Some(Arc::clone(&teardown) as Arc<dyn AuthLossHandler>),
        ));
        // Freshly created; nothing else can have set it.
        let _ = teardown.worker.set(Arc::downgrade(&worker));

        Self {
            service,
            preparer,
            store,
            catalog,
            worker,
            teardown,
            starting: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn worker(&self) -> &SearchWorker {
        &self.worker
    }

    /// Asks the platform who is logged in and records the answer.
    ///
    /// Returns `true` when the check completed, whether or not a user is
    /// logged in. Never fails; causes are logged.
    pub async fn check_login(&self) -> bool {
        let identity = match self.service.session_identity().await {
            Ok(identity) => identity,
            Err(RemoteError::AuthExpired) => {
                tracing::warn!("login check rejected: session expired");
                self.teardown.on_auth_lost().await;
                return false;
            }
            Err(e) => {
                tracing::warn!(error = %e, "login check failed");
                return false;
            }
        };

        let logged_in = identity.is_some();
        if let Err(e) = self.store.set_logged_in(logged_in).await {
            tracing::warn!(error = %e, "failed to record login state");
            return false;
        }
        if logged_in {
            self.teardown.rearm();
        }

        match identity.and_then(|i| i.display_name) {
            Some(name) => tracing::info!(user = %name, "logged in"),
            None if logged_in => tracing::info!("logged in"),
            None => tracing::info!("no user logged in"),
        }
        true
    }

    /// Prepares a visit from stored preferences and starts a run.
    ///
    /// Returns `false` without starting anything when preferences are
    /// missing, preparation fails, or a run is already in progress.
    pub async fn start_searching(&self) -> bool {
        let metadata = match self.store.user_metadata().await {
            Ok(Some(metadata)) => metadata,
            Ok(None) => {
                tracing::info!("search not configured yet");
                return false;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to read preferences");
                return false;
            }
        };

        if self.starting.swap(true, Ordering::SeqCst) {
            tracing::warn!("search start already in progress");
            return false;
        }
        let _starting = StartGuard(&self.starting);

        if self.worker.state().is_active() {
            tracing::warn!("search already running");
            return false;
        }

        let today = Local::now().date_naive();
        let deadline_in_days = (metadata.last_date - today).num_days();

        let prepared_visit = match self.preparer.prepare(&metadata).await {
            Ok(visit) => visit,
            Err(PrepareError::Remote(RemoteError::AuthExpired)) => {
                tracing::warn!("visit preparation rejected: session expired");
                self.teardown.on_auth_lost().await;
                return false;
            }
            Err(e) => {
                tracing::warn!(error = %e, "visit preparation failed");
                return false;
            }
        };

        let locations = filter_by_cities(&self.catalog, &metadata.cities);
        if locations.is_empty() {
            tracing::warn!(
                cities = ?metadata.cities,
                "no known location matches the configured cities"
            );
        }

        self.teardown.rearm();
        match self.worker.start(SearchConfig {
            locations,
            prepared_visit,
            deadline_in_days,
        }) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "search not started");
                false
            }
        }
    }

    /// Stops the active run, if any. Best effort.
    pub async fn stop_searching(&self) -> bool {
        match self.worker.stop().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "failed to stop search");
                false
            }
        }
    }

    /// Waits for the current run to settle and returns how it ended.
    pub async fn wait(&self) -> Option<RunOutcome> {
        match self.worker.wait().await {
            WorkerState::Idle => None,
            _ => self.worker.last_outcome(),
        }
    }
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;
