use chrono::{Days, NaiveDate, NaiveTime};
use pretty_assertions::assert_eq;
use rstest::rstest;
use visitbook_core::{
    filter::{admissible_visit1, admissible_visit2, are_compatible, visit1_date_for, visit2_date_for},
    models::{selection::Selection, slot::Slot},
};

fn slot(date: &str, time: &str) -> Slot {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
    let time = NaiveTime::parse_from_str(time, "%H:%M").unwrap();
    Slot {
        id: format!("{}|{}", date, time.format("%H:%M")),
        date_label: date.format("%a %b %-d").to_string(),
        time_label: time.format("%-I:%M %p").to_string(),
        date,
        time,
    }
}

fn keys(slots: &[&Slot]) -> Vec<String> {
    slots.iter().map(|s| s.key().to_string()).collect()
}

fn visit2_catalog() -> Vec<Slot> {
    vec![
        slot("2025-07-23", "10:00"),
        slot("2025-07-21", "09:00"),
        slot("2025-07-23", "08:00"),
        slot("2025-07-24", "09:00"),
    ]
}

#[test]
fn test_admissible_visit2_restricts_to_next_day() {
    let catalog = visit2_catalog();
    let chosen = slot("2025-07-22", "09:00");

    let admissible = admissible_visit2(Some(&chosen), &catalog);

    // Catalog order is kept.
    assert_eq!(keys(&admissible), vec!["2025-07-23|10:00", "2025-07-23|08:00"]);
    for candidate in admissible {
        assert_eq!(Some(candidate.date), chosen.date.checked_add_days(Days::new(1)));
    }
}

#[test]
fn test_admissible_visit1_restricts_to_previous_day() {
    let catalog = vec![
        slot("2025-07-20", "09:00"),
        slot("2025-07-22", "09:00"),
        slot("2025-07-22", "13:00"),
    ];
    let chosen = slot("2025-07-23", "10:00");

    let admissible = admissible_visit1(Some(&chosen), &catalog);

    assert_eq!(keys(&admissible), vec!["2025-07-22|09:00", "2025-07-22|13:00"]);
}

#[test]
fn test_empty_choice_returns_full_catalog() {
    let catalog = visit2_catalog();

    let visit2 = admissible_visit2(None, &catalog);
    let visit1 = admissible_visit1(None, &catalog);

    let expected: Vec<&Slot> = catalog.iter().collect();
    assert_eq!(visit2, expected);
    assert_eq!(visit1, expected);
}

#[test]
fn test_no_next_day_slots_yields_empty_list() {
    // Visit 1 on the 20th wants Visit 2 on the 21st; only the 22nd and later exist.
    let catalog = vec![slot("2025-07-22", "09:00"), slot("2025-07-23", "09:00")];
    let chosen = slot("2025-07-20", "09:00");

    assert!(admissible_visit2(Some(&chosen), &catalog).is_empty());
}

#[rstest]
#[case("2025-07-31", "2025-08-01")]
#[case("2025-12-31", "2026-01-01")]
#[case("2024-02-28", "2024-02-29")]
#[case("2025-02-28", "2025-03-01")]
#[case("2025-03-29", "2025-03-30")] // daylight saving switch in Europe
#[case("2025-11-01", "2025-11-02")] // daylight saving switch in the US
fn test_day_offset_crosses_boundaries(#[case] visit1: &str, #[case] visit2: &str) {
    let visit1 = NaiveDate::parse_from_str(visit1, "%Y-%m-%d").unwrap();
    let visit2 = NaiveDate::parse_from_str(visit2, "%Y-%m-%d").unwrap();

    assert_eq!(visit2_date_for(visit1), Some(visit2));
    assert_eq!(visit1_date_for(visit2), Some(visit1));
}

#[rstest]
#[case("2025-07-22", "2025-07-23", true)]
#[case("2025-07-22", "2025-07-22", false)]
#[case("2025-07-22", "2025-07-24", false)]
#[case("2025-07-23", "2025-07-22", false)]
fn test_are_compatible(#[case] visit1: &str, #[case] visit2: &str, #[case] expected: bool) {
    assert_eq!(
        are_compatible(&slot(visit1, "09:00"), &slot(visit2, "10:00")),
        expected
    );
}

#[test]
fn test_selection_consistency() {
    let mut selection = Selection::default();
    assert!(selection.is_empty());
    assert!(selection.is_consistent());

    selection.visit1 = Some(slot("2025-07-22", "09:00"));
    assert!(!selection.is_complete());
    assert!(selection.is_consistent());

    selection.visit2 = Some(slot("2025-07-24", "09:00"));
    assert!(selection.is_complete());
    assert!(!selection.is_consistent());

    selection.visit2 = Some(slot("2025-07-23", "09:00"));
    assert!(selection.is_consistent());

    selection.clear();
    assert_eq!(selection, Selection::default());
}
