
use eyre::eyre;
use pretty_assertions::assert_eq;
use serde_json::json;
use test_utils::{key, payload, standard_payload};
use visitbook_backend::mock::MockBackend;
use visitbook_core::{errors::BookingError, models::slot::{RawSlot, SlotsPayload}};
use visitbook_session::SlotCatalog;

fn keys(slots: &[visitbook_core::models::slot::Slot]) -> Vec<String> {
    slots.iter().map(|s| s.key().to_string()).collect()
}

#[tokio::test]
async fn test_refresh_replaces_both_lists() {
    let mut backend = MockBackend::new();
    let mut seq = mockall::Sequence::new();
    backend
        .expect_get_slots()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(standard_payload()));
    backend
        .expect_get_slots()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(payload(&[("2025-07-25", "09:00")], &[])));

    let mut catalog = SlotCatalog::default();
    assert!(!catalog.is_loaded());

    catalog.refresh(&backend).await.unwrap();
    assert_eq!(catalog.visit1().len(), 3);
    assert_eq!(catalog.visit2().len(), 3);

    catalog.refresh(&backend).await.unwrap();
    assert_eq!(keys(catalog.visit1()), vec!["2025-07-25|09:00"]);
    assert!(catalog.visit2().is_empty());
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_snapshot() {
    let mut backend = MockBackend::new();
    let mut seq = mockall::Sequence::new();
    backend
        .expect_get_slots()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(standard_payload()));
    backend
        .expect_get_slots()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Err(eyre!("connection reset")));

    let mut catalog = SlotCatalog::default();
    catalog.refresh(&backend).await.unwrap();
    let refreshed_at = catalog.refreshed_at();

    let err = catalog.refresh(&backend).await.unwrap_err();

    assert_eq!(err, BookingError::Fetch("Failed to fetch slots".to_string()));
    assert_eq!(catalog.visit1().len(), 3);
    assert_eq!(catalog.refreshed_at(), refreshed_at);
}

#[test]
fn test_rows_are_normalized_and_malformed_rows_skipped() {
    let payload: SlotsPayload = serde_json::from_value(json!({
        "visit1": [
            [1, "Tue Jul 22", "9:00 AM", "2025-07-22T00:00:00.000Z", "9:00"],
            [2, "broken"],
            {"id": 3, "dateLabel": "Wed", "timeLabel": "1 PM", "dateKey": "2025-07-23", "timeKey": "13:00"}
        ],
        "visit2": [
            [4, "Wed Jul 23", "10:00 AM", "not a date", "10:00"]
        ]
    }))
    .unwrap();

    let mut catalog = SlotCatalog::default();
    catalog.replace(payload);

    assert_eq!(keys(catalog.visit1()), vec!["2025-07-22|09:00", "2025-07-23|13:00"]);
    assert!(catalog.visit2().is_empty());
    assert!(catalog.find_visit1(key("2025-07-23|13:00")).is_some());
    assert!(catalog.find_visit2(key("2025-07-23|10:00")).is_none());
}

#[test]
fn test_missing_lists_default_to_empty() {
    let payload: SlotsPayload = serde_json::from_str(r#"{"visit1": []}"#).unwrap();
    assert_eq!(payload.visit2, Vec::<RawSlot>::new());

    let mut catalog = SlotCatalog::default();
    catalog.replace(payload);
    assert!(catalog.is_loaded());
}
