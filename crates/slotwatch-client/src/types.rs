//! Booking API wire types.
//!
//! The central API wraps most responses in `{"Success": ..., "Results": ...}`;
//! visit preparation uses `"Data"` instead of `"Results"`. Field casing is
//! inconsistent across endpoints, so every field is renamed explicitly.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Envelope shared by the search, booking, and user endpoints.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiEnvelope<T> {
    #[serde(rename = "Success", default)]
    pub success: Option<bool>,
    #[serde(rename = "Results", default)]
    pub results: Option<T>,
    #[serde(rename = "ErrorMessageId", default)]
    pub error_message_id: Option<i64>,
    #[serde(rename = "Messages", default)]
    pub messages: Vec<serde_json::Value>,
}

impl<T> ApiEnvelope<T> {
    /// `true` unless the platform explicitly reported `"Success": false`.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.success != Some(false)
    }

    /// Human-readable summary of the `Messages` array.
    #[must_use]
    pub fn message_text(&self) -> String {
        join_messages(&self.messages).unwrap_or_else(|| match self.error_message_id {
            Some(id) => format!("error message id {id}"),
            None => "no details".to_owned(),
        })
    }
}

/// Joins a `Messages` array into one line; `None` when it is empty.
pub(crate) fn join_messages(messages: &[serde_json::Value]) -> Option<String> {
    let parts: Vec<String> = messages
        .iter()
        .map(|m| match m {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect();
    (!parts.is_empty()).then(|| parts.join("; "))
}

// ---------------------------------------------------------------------------
// LocationGetServices
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LocationServiceItem {
    #[serde(rename = "serviceId")]
    pub service_id: i64,
    #[serde(rename = "serviceName", default)]
    pub service_name: Option<String>,
    #[serde(rename = "ServiceTypeId", default)]
    pub service_type_id: Option<i64>,
}

// ---------------------------------------------------------------------------
// SearchAvailableDates / SearchAvailableSlots
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AvailableDateItem {
    #[serde(rename = "calendarId")]
    pub calendar_id: i64,
    /// Midnight of the open day, e.g. `"2026-11-03T00:00:00"`.
    #[serde(rename = "calendarDate")]
    pub calendar_date: NaiveDateTime,
}

#[derive(Debug, Deserialize)]
pub struct AvailableSlotItem {
    /// Minutes after midnight.
    #[serde(rename = "Time")]
    pub time: i64,
}

// ---------------------------------------------------------------------------
// AppointmentSet
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AppointmentSetResults {
    #[serde(rename = "ReferenceNumber", default)]
    pub reference_number: Option<String>,
}

// ---------------------------------------------------------------------------
// UserGetInfo
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct UserInfo {
    #[serde(rename = "UserId", default)]
    pub user_id: Option<i64>,
    #[serde(rename = "FirstName", default)]
    pub first_name: Option<String>,
    #[serde(rename = "LastName", default)]
    pub last_name: Option<String>,
}

impl UserInfo {
    #[must_use]
    pub fn display_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join(" "))
    }
}

// ---------------------------------------------------------------------------
// PrepareVisit / Answer
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct PrepareVisitEnvelope {
    #[serde(rename = "Success", default)]
    pub success: Option<bool>,
    #[serde(rename = "Data", default)]
    pub data: Option<PrepareVisitData>,
    #[serde(rename = "Messages", default)]
    pub messages: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct PrepareVisitData {
    #[serde(rename = "PreparedVisitId")]
    pub prepared_visit_id: i64,
    #[serde(rename = "PreparedVisitToken")]
    pub prepared_visit_token: String,
    /// The next question to answer; `null` once the questionnaire is done.
    #[serde(rename = "QuestionnaireItem", default)]
    pub questionnaire_item: Option<QuestionnaireItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuestionnaireItem {
    #[serde(rename = "QuestionnaireItemId")]
    pub questionnaire_item_id: i64,
    #[serde(rename = "QuestionId")]
    pub question_id: i64,
}

#[derive(Debug, Serialize)]
pub struct AnswerRequest<'a> {
    #[serde(rename = "PreparedVisitToken")]
    pub prepared_visit_token: &'a str,
    #[serde(rename = "QuestionnaireItemId")]
    pub questionnaire_item_id: i64,
    #[serde(rename = "QuestionId")]
    pub question_id: i64,
    #[serde(rename = "AnswerIds")]
    pub answer_ids: Option<Vec<i64>>,
    #[serde(rename = "AnswerText")]
    pub answer_text: &'a str,
}
