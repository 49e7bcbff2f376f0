use std::{fmt, str::FromStr};

use chrono::{NaiveDate, NaiveTime};
use eyre::{eyre, Result, WrapErr};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::errors::BookingError;

pub const DATE_KEY_FORMAT: &str = "%Y-%m-%d";
pub const TIME_KEY_FORMAT: &str = "%H:%M";

/// Separator between the date key and time key of a transmitted slot id.
pub const SLOT_KEY_SEPARATOR: char = '|';

/// Parses a `YYYY-MM-DD` calendar key.
///
/// Backends built on spreadsheets tend to hand dates back as full
/// timestamps (`2025-07-22T04:00:00.000Z`). Only the literal calendar prefix
/// is kept; the value is never run through a time-zone conversion, which is
/// what used to shift slots by a day.
pub fn parse_date_key(raw: &str) -> Result<NaiveDate> {
    let trimmed = raw.trim();
    let calendar = trimmed
        .split(|c: char| c == 'T' || c == ' ')
        .next()
        .unwrap_or(trimmed);

    NaiveDate::parse_from_str(calendar, DATE_KEY_FORMAT)
        .wrap_err_with(|| format!("Invalid date key: {:?}", raw))
}

/// Parses an `HH:MM` (24-hour) time key, tolerating a missing leading zero
/// and a trailing seconds component.
pub fn parse_time_key(raw: &str) -> Result<NaiveTime> {
    let trimmed = raw.trim();
    NaiveTime::parse_from_str(trimmed, TIME_KEY_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .wrap_err_with(|| format!("Invalid time key: {:?}", raw))
}

pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_KEY_FORMAT).to_string()
}

pub fn time_key(time: NaiveTime) -> String {
    time.format(TIME_KEY_FORMAT).to_string()
}

/// Identity of a slot within its visit list: the (date, time) pair.
///
/// Rendered on the wire as `dateKey|timeKey`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotKey {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl SlotKey {
    pub fn new(date: NaiveDate, time: NaiveTime) -> Self {
        Self { date, time }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            date_key(self.date),
            SLOT_KEY_SEPARATOR,
            time_key(self.time)
        )
    }
}

impl FromStr for SlotKey {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (date, time) = s
            .split_once(SLOT_KEY_SEPARATOR)
            .ok_or_else(|| BookingError::validation(format!("Malformed slot id: {:?}", s)))?;

        let date = parse_date_key(date).map_err(|e| BookingError::validation(e.to_string()))?;
        let time = parse_time_key(time).map_err(|e| BookingError::validation(e.to_string()))?;

        Ok(Self { date, time })
    }
}

/// An offered date/time for one of the two visits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub id: String,
    pub date_label: String,
    pub time_label: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl Slot {
    pub fn key(&self) -> SlotKey {
        SlotKey::new(self.date, self.time)
    }

    /// Human-readable option label, e.g. `Tue Jul 22 – 9:00 AM`.
    pub fn label(&self) -> String {
        format!("{} – {}", self.date_label, self.time_label)
    }
}

/// A slot as sent by the backend named by field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SlotRecord {
    pub id: Value,
    pub date_label: Value,
    pub time_label: Value,
    pub date_key: Value,
    pub time_key: Value,
}

/// A slot as it arrives over the wire.
///
/// The spreadsheet backend sends positional rows
/// `[id, dateLabel, timeLabel, dateKey, timeKey]`; named records are also
/// accepted. Either way the value is turned into a [`Slot`] before the rest
/// of the client sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawSlot {
    Row(Vec<Value>),
    Record(SlotRecord),
}

const ROW_ID: usize = 0;
const ROW_DATE_LABEL: usize = 1;
const ROW_TIME_LABEL: usize = 2;
const ROW_DATE_KEY: usize = 3;
const ROW_TIME_KEY: usize = 4;

fn value_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Deserializes a string, number or boolean field as text. `null` and any
/// other shape become `None`.
pub(crate) fn text_field<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value_text(value.as_ref()))
}

impl TryFrom<RawSlot> for Slot {
    type Error = eyre::Report;

    fn try_from(raw: RawSlot) -> Result<Self> {
        let (id, date_label, time_label, date, time) = match &raw {
            RawSlot::Row(row) => (
                value_text(row.get(ROW_ID)),
                value_text(row.get(ROW_DATE_LABEL)),
                value_text(row.get(ROW_TIME_LABEL)),
                value_text(row.get(ROW_DATE_KEY)),
                value_text(row.get(ROW_TIME_KEY)),
            ),
            RawSlot::Record(record) => (
                value_text(Some(&record.id)),
                value_text(Some(&record.date_label)),
                value_text(Some(&record.time_label)),
                value_text(Some(&record.date_key)),
                value_text(Some(&record.time_key)),
            ),
        };

        let date = date.ok_or_else(|| eyre!("Slot is missing its date key"))?;
        let time = time.ok_or_else(|| eyre!("Slot is missing its time key"))?;
        let date = parse_date_key(&date)?;
        let time = parse_time_key(&time)?;

        Ok(Slot {
            id: id.unwrap_or_default(),
            date_label: date_label.unwrap_or_else(|| date_key(date)),
            time_label: time_label.unwrap_or_else(|| time_key(time)),
            date,
            time,
        })
    }
}

impl From<&Slot> for RawSlot {
    fn from(slot: &Slot) -> Self {
        RawSlot::Row(vec![
            Value::String(slot.id.clone()),
            Value::String(slot.date_label.clone()),
            Value::String(slot.time_label.clone()),
            Value::String(date_key(slot.date)),
            Value::String(time_key(slot.time)),
        ])
    }
}

/// Response body of `getSlots`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotsPayload {
    #[serde(default)]
    pub visit1: Vec<RawSlot>,
    #[serde(default)]
    pub visit2: Vec<RawSlot>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("2025-07-22")]
    #[case(" 2025-07-22 ")]
    #[case("2025-07-22T00:00:00.000Z")]
    #[case("2025-07-22T23:30:00.000Z")]
    #[case("2025-07-22 08:00:00")]
    fn date_keys_keep_their_calendar_day(#[case] raw: &str) {
        let date = parse_date_key(raw).unwrap();
        assert_eq!(date_key(date), "2025-07-22");
    }

    #[rstest]
    #[case("09:00", "09:00")]
    #[case("9:00", "09:00")]
    #[case("14:30:00", "14:30")]
    fn time_keys_are_zero_padded(#[case] raw: &str, #[case] expected: &str) {
        let time = parse_time_key(raw).unwrap();
        assert_eq!(time_key(time), expected);
    }

    #[test]
    fn garbage_keys_are_rejected() {
        assert!(parse_date_key("July 22").is_err());
        assert!(parse_time_key("noon").is_err());
    }

    #[test]
    fn positional_rows_become_named_slots() {
        let raw: RawSlot = serde_json::from_str(
            r#"[7, "Tue Jul 22", "9:00 AM", "2025-07-22T00:00:00.000Z", "09:00"]"#,
        )
        .unwrap();

        let slot = Slot::try_from(raw).unwrap();

        assert_eq!(slot.id, "7");
        assert_eq!(slot.label(), "Tue Jul 22 – 9:00 AM");
        assert_eq!(slot.key().to_string(), "2025-07-22|09:00");
    }

    #[test]
    fn named_records_are_accepted() {
        let raw: RawSlot = serde_json::from_str(
            r#"{"id": "a1", "dateLabel": "Wed", "timeLabel": "10am", "dateKey": "2025-07-23", "timeKey": "10:00"}"#,
        )
        .unwrap();

        let slot = Slot::try_from(raw).unwrap();
        assert_eq!(slot.key().to_string(), "2025-07-23|10:00");
        assert_eq!(slot.date_label, "Wed");
    }

    #[test]
    fn short_rows_are_rejected() {
        let raw = RawSlot::Row(vec![Value::String("1".into()), Value::String("Tue".into())]);
        assert!(Slot::try_from(raw).is_err());
    }

    #[test]
    fn slot_key_parses_its_own_display() {
        let key: SlotKey = "2025-07-22|09:00".parse().unwrap();
        assert_eq!(key.to_string(), "2025-07-22|09:00");
        assert!("2025-07-22".parse::<SlotKey>().is_err());
    }
}
