use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use visitbook_backend::BookingBackend;
use visitbook_core::{
    errors::{BookingError, BookingResult},
    models::slot::{RawSlot, Slot, SlotKey, SlotsPayload},
};

/// Latest snapshot of the slots on offer.
///
/// Both lists are replaced together on every successful fetch; nothing is
/// merged. A failed fetch leaves the previous snapshot in place.
#[derive(Debug, Clone, Default)]
pub struct SlotCatalog {
    visit1: Vec<Slot>,
    visit2: Vec<Slot>,
    refreshed_at: Option<DateTime<Utc>>,
}

fn normalize(rows: Vec<RawSlot>, visit: &str) -> Vec<Slot> {
    rows.into_iter()
        .filter_map(|row| match Slot::try_from(row) {
            Ok(slot) => Some(slot),
            Err(e) => {
                warn!("Skipping malformed {} slot: {:#}", visit, e);
                None
            }
        })
        .collect()
}

impl SlotCatalog {
    pub fn visit1(&self) -> &[Slot] {
        &self.visit1
    }

    pub fn visit2(&self) -> &[Slot] {
        &self.visit2
    }

    pub fn is_loaded(&self) -> bool {
        self.refreshed_at.is_some()
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    pub fn find_visit1(&self, key: SlotKey) -> Option<&Slot> {
        self.visit1.iter().find(|slot| slot.key() == key)
    }

    pub fn find_visit2(&self, key: SlotKey) -> Option<&Slot> {
        self.visit2.iter().find(|slot| slot.key() == key)
    }

    /// Swaps in a fresh snapshot, normalizing every row into a [`Slot`].
    pub fn replace(&mut self, payload: SlotsPayload) {
        let visit1 = normalize(payload.visit1, "Visit 1");
        let visit2 = normalize(payload.visit2, "Visit 2");

        debug!(
            "Slot catalog replaced: {} Visit 1, {} Visit 2",
            visit1.len(),
            visit2.len()
        );

        self.visit1 = visit1;
        self.visit2 = visit2;
        self.refreshed_at = Some(Utc::now());
    }

    /// Applies the outcome of a `getSlots` call.
    ///
    /// # Errors
    ///
    /// `BookingError::Fetch` if the call failed; the existing snapshot is
    /// kept.
    pub fn apply_fetch(&mut self, fetched: eyre::Result<SlotsPayload>) -> BookingResult<()> {
        match fetched {
            Ok(payload) => {
                self.replace(payload);
                Ok(())
            }
            Err(e) => {
                warn!("Slot refresh failed: {:#}", e);
                Err(BookingError::Fetch("Failed to fetch slots".to_string()))
            }
        }
    }

    /// Fetches and swaps in the backend's current snapshot.
    pub async fn refresh(&mut self, backend: &dyn BookingBackend) -> BookingResult<()> {
        let fetched = backend.get_slots().await;
        self.apply_fetch(fetched)
    }
}
