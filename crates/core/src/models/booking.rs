use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::slot::{date_key, parse_date_key, parse_time_key, text_field, time_key, Slot, SlotKey};

/// Response body of `getBooking`. Every field is optional: an empty object
/// (or a partially filled one) means the address has no booking. Cells may
/// come back as numbers and are read as text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BookingRecord {
    #[serde(deserialize_with = "text_field")]
    pub visit1_date: Option<String>,
    #[serde(deserialize_with = "text_field")]
    pub visit1_time: Option<String>,
    #[serde(deserialize_with = "text_field")]
    pub visit2_date: Option<String>,
    #[serde(deserialize_with = "text_field")]
    pub visit2_time: Option<String>,
}

impl BookingRecord {
    pub fn is_empty(&self) -> bool {
        self.visit1_date.is_none()
            && self.visit1_time.is_none()
            && self.visit2_date.is_none()
            && self.visit2_time.is_none()
    }
}

/// A confirmed pair of visits held by one verified address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub visit1_date: String,
    pub visit1_time: String,
    pub visit2_date: String,
    pub visit2_time: String,
}

fn normalize_date(raw: &str) -> String {
    parse_date_key(raw)
        .map(date_key)
        .unwrap_or_else(|_| raw.trim().to_string())
}

fn normalize_time(raw: &str) -> String {
    parse_time_key(raw)
        .map(time_key)
        .unwrap_or_else(|_| raw.trim().to_string())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Booking {
    /// Builds a booking from a `getBooking` response.
    ///
    /// Returns `None` unless all four fields are present. Values that parse as
    /// date/time keys are normalized; anything else is kept as sent so it can
    /// still be shown to the user.
    pub fn from_record(record: BookingRecord) -> Option<Self> {
        let visit1_date = non_blank(record.visit1_date)?;
        let visit1_time = non_blank(record.visit1_time)?;
        let visit2_date = non_blank(record.visit2_date)?;
        let visit2_time = non_blank(record.visit2_time)?;

        Some(Self {
            visit1_date: normalize_date(&visit1_date),
            visit1_time: normalize_time(&visit1_time),
            visit2_date: normalize_date(&visit2_date),
            visit2_time: normalize_time(&visit2_time),
        })
    }

    pub fn from_slots(visit1: &Slot, visit2: &Slot) -> Self {
        Self {
            visit1_date: date_key(visit1.date),
            visit1_time: time_key(visit1.time),
            visit2_date: date_key(visit2.date),
            visit2_time: time_key(visit2.time),
        }
    }

    pub fn visit1_key(&self) -> Option<SlotKey> {
        format!("{}|{}", self.visit1_date, self.visit1_time).parse().ok()
    }

    pub fn visit2_key(&self) -> Option<SlotKey> {
        format!("{}|{}", self.visit2_date, self.visit2_time).parse().ok()
    }

    pub fn describe_visit1(&self) -> String {
        describe_visit(&self.visit1_date, &self.visit1_time)
    }

    pub fn describe_visit2(&self) -> String {
        describe_visit(&self.visit2_date, &self.visit2_time)
    }
}

impl From<Booking> for BookingRecord {
    fn from(booking: Booking) -> Self {
        Self {
            visit1_date: Some(booking.visit1_date),
            visit1_time: Some(booking.visit1_time),
            visit2_date: Some(booking.visit2_date),
            visit2_time: Some(booking.visit2_time),
        }
    }
}

/// Formats a booked visit as `Tuesday, July 22, 2025 at 09:00`, falling back
/// to the raw values when the date is not a calendar key.
pub fn describe_visit(date: &str, time: &str) -> String {
    match NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d") {
        Ok(day) => format!("{} at {}", day.format("%A, %B %-d, %Y"), time),
        Err(_) => format!("{} at {}", date, time),
    }
}

/// Parameters of `submitBooking`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRequest {
    pub address: String,
    pub name: String,
    pub visit1: SlotKey,
    pub visit2: SlotKey,
}

/// Response body of `submitBooking`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Response body of `cancelBooking`. `success == false` means the backend
/// found no booking for the address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOutcome {
    pub success: bool,
}
