//! Domain types shared by the remote binding, the search worker, and the CLI.

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::locations::Location;

/// A bookable service offered at a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: i64,
    pub location_id: i64,
    pub type_id: i64,
    pub name: String,
}

/// One open calendar day for a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calendar {
    pub id: i64,
    pub service_id: i64,
    pub date: NaiveDate,
}

/// A single bookable appointment instant for a (calendar, service) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slot {
    pub location_id: i64,
    pub service_id: i64,
    pub calendar_id: i64,
    pub starts_at: NaiveDateTime,
}

impl Slot {
    /// Minutes after local midnight, the unit the booking endpoint expects.
    #[must_use]
    pub fn minutes_after_midnight(&self) -> u32 {
        self.starts_at.time().num_seconds_from_midnight() / 60
    }
}

/// A prerequisite question answered while preparing a visit.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub question_id: i64,
    pub text: String,
}

impl std::fmt::Debug for Answer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Answer")
            .field("question_id", &self.question_id)
            .field("text", &"[redacted]")
            .finish()
    }
}

/// Visit token plus answered questions, prepared once per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedVisit {
    pub visit_id: i64,
    pub visit_token: String,
    pub answers: Vec<Answer>,
}

/// Input to a single worker run.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Candidate locations, searched in this order.
    pub locations: Vec<Location>,
    pub prepared_visit: PreparedVisit,
    /// Whole days from now until the latest acceptable appointment. Negative
    /// when the user's last acceptable date has already passed.
    pub deadline_in_days: i64,
}

/// Parameters of a single claim attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimParams {
    pub service_id: i64,
    pub calendar_id: i64,
    pub date: NaiveDate,
    pub minutes_after_midnight: u32,
    pub visit_id: i64,
}

impl ClaimParams {
    #[must_use]
    pub fn for_slot(slot: &Slot, visit: &PreparedVisit) -> Self {
        Self {
            service_id: slot.service_id,
            calendar_id: slot.calendar_id,
            date: slot.starts_at.date(),
            minutes_after_midnight: slot.minutes_after_midnight(),
            visit_id: visit.visit_id,
        }
    }
}

/// Result of a claim attempt as reported by the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    Confirmed { reference: Option<String> },
    /// Someone else took the slot first.
    Conflict,
    /// The prepared visit is no longer accepted.
    VisitExpired,
    /// Any other refusal.
    Rejected(String),
}

/// A confirmed booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub slot: Slot,
    pub reference: Option<String>,
}

/// The authenticated user as reported by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: Option<i64>,
    pub display_name: Option<String>,
}

/// Stored search preferences for the logged-in user.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMetadata {
    pub cities: BTreeSet<String>,
    /// Latest acceptable appointment date.
    pub last_date: NaiveDate,
    pub id_number: String,
    pub phone_number: String,
}

impl std::fmt::Debug for UserMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserMetadata")
            .field("cities", &self.cities)
            .field("last_date", &self.last_date)
            .field("id_number", &"[redacted]")
            .field("phone_number", &"[redacted]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::*;

    fn slot_at(hour: u32, minute: u32) -> Slot {
        let date = NaiveDate::from_ymd_opt(2026, 11, 3).unwrap();
        Slot {
            location_id: 1,
            service_id: 10,
            calendar_id: 100,
            starts_at: date.and_time(NaiveTime::from_hms_opt(hour, minute, 0).unwrap()),
        }
    }

    #[test]
    fn minutes_after_midnight_counts_hours_and_minutes() {
        assert_eq!(slot_at(0, 0).minutes_after_midnight(), 0);
        assert_eq!(slot_at(8, 30).minutes_after_midnight(), 510);
        assert_eq!(slot_at(15, 45).minutes_after_midnight(), 945);
    }

    #[test]
    fn claim_params_take_slot_and_visit_fields() {
        let visit = PreparedVisit {
            visit_id: 77,
            visit_token: "tok".to_string(),
            answers: vec![],
        };
        let params = ClaimParams::for_slot(&slot_at(9, 15), &visit);
        assert_eq!(params.service_id, 10);
        assert_eq!(params.calendar_id, 100);
        assert_eq!(params.date, NaiveDate::from_ymd_opt(2026, 11, 3).unwrap());
        assert_eq!(params.minutes_after_midnight, 555);
        assert_eq!(params.visit_id, 77);
    }

    #[test]
    fn debug_output_hides_personal_answers() {
        let answer = Answer {
            question_id: 113,
            text: "123456782".to_string(),
        };
        assert!(!format!("{answer:?}").contains("123456782"));

        let metadata = UserMetadata {
            cities: BTreeSet::from(["Haifa".to_string()]),
            last_date: NaiveDate::from_ymd_opt(2026, 12, 1).unwrap(),
            id_number: "123456782".to_string(),
            phone_number: "0501234567".to_string(),
        };
        let rendered = format!("{metadata:?}");
        assert!(!rendered.contains("123456782"));
        assert!(!rendered.contains("0501234567"));
        assert!(rendered.contains("Haifa"));
    }
}
