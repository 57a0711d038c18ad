//! Scripted collaborators for worker and orchestrator tests.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, NaiveDate, NaiveDateTime, TimeDelta, Timelike};

use slotwatch_core::{
    Calendar, ClaimOutcome, ClaimParams, Identity, Location, PrepareError, PreferenceStore,
    PreparedVisit, RemoteBookingService, RemoteError, SearchConfig, Service, StoreError,
    UserMetadata, VisitPreparer,
};

use crate::worker::AuthLossHandler;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Services(i64),
    Calendars(i64),
    Slots(i64),
    Claim(ClaimParams),
    Identity,
}

/// In-memory booking platform. Read calls answer from the configured
/// inventory; claims and failures are consumed from scripted queues.
#[derive(Default)]
pub(crate) struct FakeBookingService {
    services: HashMap<i64, Vec<Service>>,
    calendars: HashMap<i64, Vec<Calendar>>,
    slots: HashMap<i64, Vec<NaiveDateTime>>,
    claim_results: Mutex<VecDeque<Result<ClaimOutcome, RemoteError>>>,
    listing_errors: Mutex<VecDeque<RemoteError>>,
    identity: Option<Result<Option<Identity>, RemoteError>>,
    latency: Option<Duration>,
    calls: Mutex<Vec<Call>>,
}

impl FakeBookingService {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A location offering one service with no open calendars.
    pub(crate) fn with_service(mut self, location_id: i64, service_id: i64) -> Self {
        self.add_service(location_id, service_id);
        self
    }

    /// Adds one open slot, creating its service and calendar as needed.
    pub(crate) fn with_slot(
        self,
        location_id: i64,
        service_id: i64,
        calendar_id: i64,
        starts_at: NaiveDateTime,
    ) -> Self {
        self.with_slot_on(location_id, service_id, calendar_id, starts_at.date(), starts_at)
    }

    /// Like [`Self::with_slot`], but files the slot under a calendar dated
    /// `calendar_date` regardless of the slot's own date.
    pub(crate) fn with_slot_on(
        mut self,
        location_id: i64,
        service_id: i64,
        calendar_id: i64,
        calendar_date: NaiveDate,
        starts_at: NaiveDateTime,
    ) -> Self {
        self.add_service(location_id, service_id);
        let calendars = self.calendars.entry(service_id).or_default();
        if !calendars.iter().any(|c| c.id == calendar_id) {
            calendars.push(Calendar {
                id: calendar_id,
                service_id,
                date: calendar_date,
            });
        }
        self.slots.entry(calendar_id).or_default().push(starts_at);
        self
    }

    pub(crate) fn with_claim_results(
        self,
        results: Vec<Result<ClaimOutcome, RemoteError>>,
    ) -> Self {
        *self.claim_results.lock().unwrap() = results.into();
        self
    }

    /// Errors returned by the next `list_services_at` calls, one per call.
    pub(crate) fn with_listing_errors(self, errors: Vec<RemoteError>) -> Self {
        *self.listing_errors.lock().unwrap() = errors.into();
        self
    }

    pub(crate) fn with_identity(mut self, identity: Result<Option<Identity>, RemoteError>) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Delay applied to every read call.
    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn claims(&self) -> Vec<ClaimParams> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Claim(params) => Some(params),
                _ => None,
            })
            .collect()
    }

    fn add_service(&mut self, location_id: i64, service_id: i64) {
        let services = self.services.entry(location_id).or_default();
        if !services.iter().any(|s| s.id == service_id) {
            services.push(Service {
                id: service_id,
                location_id,
                type_id: 156,
                name: format!("service {service_id}"),
            });
        }
    }

    async fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl RemoteBookingService for FakeBookingService {
    async fn list_services_at(&self, location_id: i64) -> Result<Vec<Service>, RemoteError> {
        self.record(Call::Services(location_id)).await;
        if let Some(err) = self.listing_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(self.services.get(&location_id).cloned().unwrap_or_default())
    }

    async fn list_calendars(&self, service_id: i64) -> Result<Vec<Calendar>, RemoteError> {
        self.record(Call::Calendars(service_id)).await;
        Ok(self.calendars.get(&service_id).cloned().unwrap_or_default())
    }

    async fn list_open_slots(
        &self,
        calendar: &Calendar,
    ) -> Result<Vec<NaiveDateTime>, RemoteError> {
        self.record(Call::Slots(calendar.id)).await;
        Ok(self.slots.get(&calendar.id).cloned().unwrap_or_default())
    }

    async fn claim_slot(
        &self,
        _visit_token: &str,
        params: &ClaimParams,
    ) -> Result<ClaimOutcome, RemoteError> {
        self.calls.lock().unwrap().push(Call::Claim(params.clone()));
        self.claim_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(ClaimOutcome::Confirmed {
                reference: Some("REF-1".to_owned()),
            }))
    }

    async fn session_identity(&self) -> Result<Option<Identity>, RemoteError> {
        self.calls.lock().unwrap().push(Call::Identity);
        self.identity.clone().unwrap_or(Ok(None))
    }
}

/// Preference store held in memory, counting `set_logged_in` calls.
#[derive(Default)]
pub(crate) struct MemoryStore {
    metadata: Mutex<Option<UserMetadata>>,
    logged_in: Mutex<Option<bool>>,
    pub(crate) set_logged_in_calls: AtomicUsize,
}

impl MemoryStore {
    pub(crate) fn with_metadata(metadata: UserMetadata) -> Self {
        Self {
            metadata: Mutex::new(Some(metadata)),
            ..Self::default()
        }
    }

    /// Last value written by `set_logged_in`, if any.
    pub(crate) fn logged_in(&self) -> Option<bool> {
        *self.logged_in.lock().unwrap()
    }
}

#[async_trait]
impl PreferenceStore for MemoryStore {
    async fn user_metadata(&self) -> Result<Option<UserMetadata>, StoreError> {
        Ok(self.metadata.lock().unwrap().clone())
    }

    async fn save_user_metadata(&self, metadata: &UserMetadata) -> Result<(), StoreError> {
        *self.metadata.lock().unwrap() = Some(metadata.clone());
        Ok(())
    }

    async fn set_logged_in(&self, logged_in: bool) -> Result<(), StoreError> {
        self.set_logged_in_calls.fetch_add(1, Ordering::SeqCst);
        *self.logged_in.lock().unwrap() = Some(logged_in);
        Ok(())
    }

    async fn is_logged_in(&self) -> Result<bool, StoreError> {
        Ok(self.logged_in().unwrap_or(false))
    }
}

/// Visit preparer that returns a fixed result and counts calls.
pub(crate) struct FakePreparer {
    result: Result<PreparedVisit, RemoteError>,
    latency: Duration,
    pub(crate) calls: AtomicUsize,
}

impl FakePreparer {
    pub(crate) fn succeeding() -> Self {
        Self {
            result: Ok(visit()),
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub(crate) fn failing(error: RemoteError) -> Self {
        Self {
            result: Err(error),
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl VisitPreparer for FakePreparer {
    async fn prepare(&self, _metadata: &UserMetadata) -> Result<PreparedVisit, PrepareError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.result.clone().map_err(PrepareError::from)
    }
}

/// Counts auth-loss notifications.
#[derive(Default)]
pub(crate) struct CountingHandler {
    pub(crate) calls: AtomicUsize,
}

#[async_trait]
impl AuthLossHandler for CountingHandler {
    async fn on_auth_lost(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) fn visit() -> PreparedVisit {
    PreparedVisit {
        visit_id: 7001,
        visit_token: "visit-token".to_owned(),
        answers: vec![],
    }
}

pub(crate) fn location(id: i64, city: &str) -> Location {
    Location {
        id,
        city: city.to_owned(),
        display_name: format!("{city} office {id}"),
    }
}

pub(crate) fn config(locations: Vec<Location>, deadline_in_days: i64) -> SearchConfig {
    SearchConfig {
        locations,
        prepared_visit: visit(),
        deadline_in_days,
    }
}

/// Local time `days` from now, truncated to whole minutes.
pub(crate) fn days_from_now(days: i64) -> NaiveDateTime {
    let at = Local::now().naive_local() + TimeDelta::days(days);
    at.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap()
}

pub(crate) fn metadata(cities: &[&str], last_date: NaiveDate) -> UserMetadata {
    UserMetadata {
        cities: cities.iter().map(|c| (*c).to_owned()).collect::<BTreeSet<_>>(),
        last_date,
        id_number: "123456782".to_owned(),
        phone_number: "0501234567".to_owned(),
    }
}

/// Polls `condition` until it holds or two seconds pass.
pub(crate) async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
