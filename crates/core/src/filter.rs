//! Which Visit 1 / Visit 2 slots can be chosen together.
//!
//! Both functions are pure: they are recomputed from the current catalog and
//! the current partial selection every time either changes, and they keep
//! the catalog's ordering.

use chrono::{Days, NaiveDate};

use crate::models::slot::Slot;

/// Calendar days between Visit 1 and Visit 2.
pub const VISIT_GAP_DAYS: u64 = 1;

/// The only day on which Visit 2 may fall for a Visit 1 on `visit1`.
///
/// Arithmetic runs on calendar dates, so the answer does not depend on the
/// local time zone.
pub fn visit2_date_for(visit1: NaiveDate) -> Option<NaiveDate> {
    visit1.checked_add_days(Days::new(VISIT_GAP_DAYS))
}

/// The only day on which Visit 1 may fall for a Visit 2 on `visit2`.
pub fn visit1_date_for(visit2: NaiveDate) -> Option<NaiveDate> {
    visit2.checked_sub_days(Days::new(VISIT_GAP_DAYS))
}

pub fn are_compatible(visit1: &Slot, visit2: &Slot) -> bool {
    visit2_date_for(visit1.date) == Some(visit2.date)
}

/// Visit 2 slots that may accompany `visit1`, or every Visit 2 slot when no
/// Visit 1 is chosen yet.
pub fn admissible_visit2<'a>(visit1: Option<&Slot>, visit2_slots: &'a [Slot]) -> Vec<&'a Slot> {
    match visit1 {
        None => visit2_slots.iter().collect(),
        Some(chosen) => {
            let wanted = visit2_date_for(chosen.date);
            visit2_slots
                .iter()
                .filter(|slot| Some(slot.date) == wanted)
                .collect()
        }
    }
}

/// Visit 1 slots that may accompany `visit2`, or every Visit 1 slot when no
/// Visit 2 is chosen yet.
pub fn admissible_visit1<'a>(visit2: Option<&Slot>, visit1_slots: &'a [Slot]) -> Vec<&'a Slot> {
    match visit2 {
        None => visit1_slots.iter().collect(),
        Some(chosen) => {
            let wanted = visit1_date_for(chosen.date);
            visit1_slots
                .iter()
                .filter(|slot| Some(slot.date) == wanted)
                .collect()
        }
    }
}
