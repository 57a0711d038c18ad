//! Search, claim, and session endpoints.

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime, TimeDelta};
use reqwest::StatusCode;

use slotwatch_core::{
    Calendar, ClaimOutcome, ClaimParams, Identity, RemoteBookingService, RemoteError, Service,
};

use crate::client::BookingClient;
use crate::error::ClientError;
use crate::types::{
    ApiEnvelope, AppointmentSetResults, AvailableDateItem, AvailableSlotItem, LocationServiceItem,
    UserInfo,
};

/// Upper bound on calendar days requested per service.
const MAX_CALENDAR_RESULTS: u32 = 100;

const PREPARED_VISIT_TOKEN_HEADER: &str = "PreparedVisitToken";

impl BookingClient {
    /// Lists services of the configured type at a location.
    ///
    /// # Errors
    ///
    /// - [`ClientError::AuthExpired`] on 401/403.
    /// - [`ClientError::Api`] if the envelope reports failure.
    /// - [`ClientError::Http`] / [`ClientError::UnexpectedStatus`] on transport failure.
    /// - [`ClientError::Deserialize`] if the response shape is unexpected.
    pub async fn location_services(&self, location_id: i64) -> Result<Vec<Service>, ClientError> {
        let query = [
            ("locationId", location_id.to_string()),
            ("serviceTypeId", self.service_type_id.to_string()),
        ];
        let envelope: ApiEnvelope<Vec<LocationServiceItem>> =
            self.get_json("LocationGetServices", &query).await?;
        let items = successful_results(envelope)?;

        Ok(items
            .into_iter()
            .map(|item| Service {
                id: item.service_id,
                location_id,
                type_id: item.service_type_id.unwrap_or(self.service_type_id),
                name: item.service_name.unwrap_or_default(),
            })
            .collect())
    }

    /// Lists open calendar days for a service, starting today.
    ///
    /// # Errors
    ///
    /// Same as [`BookingClient::location_services`].
    pub async fn available_dates(&self, service_id: i64) -> Result<Vec<Calendar>, ClientError> {
        let query = [
            ("maxResults", MAX_CALENDAR_RESULTS.to_string()),
            (
                "startDate",
                Local::now().date_naive().format("%Y-%m-%d").to_string(),
            ),
            ("serviceId", service_id.to_string()),
        ];
        let envelope: ApiEnvelope<Vec<AvailableDateItem>> =
            self.get_json("SearchAvailableDates", &query).await?;
        let items = successful_results(envelope)?;

        Ok(items
            .into_iter()
            .map(|item| Calendar {
                id: item.calendar_id,
                service_id,
                date: item.calendar_date.date(),
            })
            .collect())
    }

    /// Lists open appointment instants on one calendar day.
    ///
    /// # Errors
    ///
    /// Same as [`BookingClient::location_services`].
    pub async fn available_slots(
        &self,
        calendar: &Calendar,
    ) -> Result<Vec<NaiveDateTime>, ClientError> {
        let query = [
            ("CalendarId", calendar.id.to_string()),
            ("ServiceId", calendar.service_id.to_string()),
            ("dayPart", "0".to_owned()),
        ];
        let envelope: ApiEnvelope<Vec<AvailableSlotItem>> =
            self.get_json("SearchAvailableSlots", &query).await?;
        let items = successful_results(envelope)?;

        let midnight = calendar.date.and_time(chrono::NaiveTime::MIN);
        Ok(items
            .into_iter()
            .filter_map(|item| {
                let instant = TimeDelta::try_minutes(item.time).map(|offset| midnight + offset);
                if instant.is_none() {
                    tracing::warn!(
                        calendar_id = calendar.id,
                        time = item.time,
                        "skipping slot with unusable time"
                    );
                }
                instant
            })
            .collect())
    }

    /// Attempts to book one slot.
    ///
    /// Sent exactly once; claims bypass the retry layer.
    ///
    /// Status mapping: 409 is [`ClaimOutcome::Conflict`], 404/410 is
    /// [`ClaimOutcome::VisitExpired`], and an envelope with `"Success": false`
    /// is [`ClaimOutcome::Rejected`].
    ///
    /// # Errors
    ///
    /// - [`ClientError::AuthExpired`] on 401/403.
    /// - [`ClientError::Http`] / [`ClientError::UnexpectedStatus`] on transport failure.
    /// - [`ClientError::Deserialize`] if the response shape is unexpected.
    pub async fn set_appointment(
        &self,
        visit_token: &str,
        params: &ClaimParams,
    ) -> Result<ClaimOutcome, ClientError> {
        let url = self.endpoint_url("AppointmentSet")?;
        let query = [
            ("ServiceId", params.service_id.to_string()),
            ("CalendarId", params.calendar_id.to_string()),
            ("appointmentDate", params.date.format("%Y-%m-%d").to_string()),
            ("appointmentTime", params.minutes_after_midnight.to_string()),
            ("preparedVisitId", params.visit_id.to_string()),
        ];

        let response = self
            .client
            .get(url)
            .query(&query)
            .header(PREPARED_VISIT_TOKEN_HEADER, visit_token)
            .send()
            .await?;

        match response.status() {
            StatusCode::CONFLICT => return Ok(ClaimOutcome::Conflict),
            StatusCode::NOT_FOUND | StatusCode::GONE => return Ok(ClaimOutcome::VisitExpired),
            _ => {}
        }

        let response = Self::check_status(response)?;
        let envelope: ApiEnvelope<AppointmentSetResults> =
            Self::decode(response, "AppointmentSet").await?;

        if !envelope.succeeded() {
            return Ok(ClaimOutcome::Rejected(envelope.message_text()));
        }

        Ok(ClaimOutcome::Confirmed {
            reference: envelope.results.and_then(|r| r.reference_number),
        })
    }

    /// Fetches the logged-in user; `None` when the session is anonymous.
    ///
    /// # Errors
    ///
    /// Same as [`BookingClient::location_services`], except that a failed
    /// envelope reads as "no identity" rather than an error.
    pub async fn user_info(&self) -> Result<Option<Identity>, ClientError> {
        let envelope: ApiEnvelope<UserInfo> = self.get_json("UserGetInfo", &[]).await?;
        if !envelope.succeeded() {
            return Ok(None);
        }
        Ok(envelope.results.map(|info| Identity {
            user_id: info.user_id,
            display_name: info.display_name(),
        }))
    }
}

/// Unwraps `Results`, treating a missing list as empty.
fn successful_results<T>(envelope: ApiEnvelope<Vec<T>>) -> Result<Vec<T>, ClientError> {
    if !envelope.succeeded() {
        return Err(ClientError::Api(envelope.message_text()));
    }
    Ok(envelope.results.unwrap_or_default())
}

#[async_trait]
impl RemoteBookingService for BookingClient {
    async fn list_services_at(&self, location_id: i64) -> Result<Vec<Service>, RemoteError> {
        Ok(self.location_services(location_id).await?)
    }

    async fn list_calendars(&self, service_id: i64) -> Result<Vec<Calendar>, RemoteError> {
        Ok(self.available_dates(service_id).await?)
    }

    async fn list_open_slots(
        &self,
        calendar: &Calendar,
    ) -> Result<Vec<NaiveDateTime>, RemoteError> {
        Ok(self.available_slots(calendar).await?)
    }

    async fn claim_slot(
        &self,
        visit_token: &str,
        params: &ClaimParams,
    ) -> Result<ClaimOutcome, RemoteError> {
        Ok(self.set_appointment(visit_token, params).await?)
    }

    async fn session_identity(&self) -> Result<Option<Identity>, RemoteError> {
        Ok(self.user_info().await?)
    }
}
