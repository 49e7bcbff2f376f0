use serde::Serialize;

use super::slot::Slot;
use crate::filter;

/// The user's in-progress pick of one slot per visit.
///
/// Whenever both sides are set, Visit 2 falls one calendar day after
/// Visit 1. Callers keep that true by going through
/// [`filter::admissible_visit1`] / [`filter::admissible_visit2`] and clearing
/// the other side when it stops being admissible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub visit1: Option<Slot>,
    pub visit2: Option<Slot>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.visit1.is_none() && self.visit2.is_none()
    }

    pub fn is_complete(&self) -> bool {
        self.visit1.is_some() && self.visit2.is_some()
    }

    /// True unless both visits are chosen and sit on incompatible days.
    pub fn is_consistent(&self) -> bool {
        match (&self.visit1, &self.visit2) {
            (Some(visit1), Some(visit2)) => filter::are_compatible(visit1, visit2),
            _ => true,
        }
    }

    pub fn clear(&mut self) {
        self.visit1 = None;
        self.visit2 = None;
    }
}
