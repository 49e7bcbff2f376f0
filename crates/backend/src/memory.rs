use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Days, NaiveDate, NaiveTime};
use eyre::Result;
use tokio::sync::RwLock;
use tracing::debug;
use visitbook_core::{
    filter,
    models::{
        booking::{Booking, BookingRecord, CancelOutcome, SubmissionRequest, SubmitOutcome},
        slot::{RawSlot, Slot, SlotKey, SlotsPayload},
    },
};

use crate::BookingBackend;

#[derive(Debug, Clone)]
struct StoredBooking {
    name: String,
    visit1: Slot,
    visit2: Slot,
}

#[derive(Debug, Default)]
struct MemoryState {
    visit1: Vec<Slot>,
    visit2: Vec<Slot>,
    bookings: HashMap<String, StoredBooking>,
}

impl MemoryState {
    fn taken_visit1(&self, key: SlotKey) -> bool {
        self.bookings.values().any(|b| b.visit1.key() == key)
    }

    fn taken_visit2(&self, key: SlotKey) -> bool {
        self.bookings.values().any(|b| b.visit2.key() == key)
    }
}

/// Backend kept in process memory.
///
/// Honours the same contract as the remote store: one booking per address,
/// booked slots disappear from `getSlots` until the booking is cancelled,
/// and business failures come back as `success == false`.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: RwLock<MemoryState>,
}

impl InMemoryBackend {
    pub fn new(visit1: Vec<Slot>, visit2: Vec<Slot>) -> Self {
        Self {
            state: RwLock::new(MemoryState {
                visit1,
                visit2,
                bookings: HashMap::new(),
            }),
        }
    }

    /// Seeds a week of slots starting the day after `today`: Visit 1 at
    /// 09:00 and 13:00, Visit 2 at 10:00 and 14:00.
    pub fn seeded(today: NaiveDate) -> Self {
        let mut visit1 = Vec::new();
        let mut visit2 = Vec::new();

        for offset in 1..=7 {
            let Some(day) = today.checked_add_days(Days::new(offset)) else {
                continue;
            };
            visit1.extend(
                [(9, 0), (13, 0)]
                    .into_iter()
                    .filter_map(|(h, m)| demo_slot("v1", day, h, m)),
            );
            if let Some(next) = filter::visit2_date_for(day) {
                visit2.extend(
                    [(10, 0), (14, 0)]
                        .into_iter()
                        .filter_map(|(h, m)| demo_slot("v2", next, h, m)),
                );
            }
        }

        Self::new(visit1, visit2)
    }
}

fn demo_slot(prefix: &str, date: NaiveDate, hour: u32, minute: u32) -> Option<Slot> {
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
    Some(Slot {
        id: format!("{}-{}-{}", prefix, date.format("%Y%m%d"), time.format("%H%M")),
        date_label: date.format("%a %b %-d").to_string(),
        time_label: time.format("%-I:%M %p").to_string(),
        date,
        time,
    })
}

fn rejected(message: &str) -> SubmitOutcome {
    SubmitOutcome {
        success: false,
        message: Some(message.to_string()),
    }
}

#[async_trait]
impl BookingBackend for InMemoryBackend {
    async fn get_slots(&self) -> Result<SlotsPayload> {
        let state = self.state.read().await;

        let visit1 = state
            .visit1
            .iter()
            .filter(|slot| !state.taken_visit1(slot.key()))
            .map(RawSlot::from)
            .collect();
        let visit2 = state
            .visit2
            .iter()
            .filter(|slot| !state.taken_visit2(slot.key()))
            .map(RawSlot::from)
            .collect();

        Ok(SlotsPayload { visit1, visit2 })
    }

    async fn get_booking(&self, address: &str) -> Result<BookingRecord> {
        let state = self.state.read().await;
        Ok(state
            .bookings
            .get(address)
            .map(|b| BookingRecord::from(Booking::from_slots(&b.visit1, &b.visit2)))
            .unwrap_or_default())
    }

    async fn submit_booking(&self, request: &SubmissionRequest) -> Result<SubmitOutcome> {
        let mut state = self.state.write().await;

        if state.bookings.contains_key(&request.address) {
            return Ok(rejected("You already have a booking."));
        }

        let visit1 = state
            .visit1
            .iter()
            .find(|slot| slot.key() == request.visit1)
            .cloned();
        let visit2 = state
            .visit2
            .iter()
            .find(|slot| slot.key() == request.visit2)
            .cloned();

        let (Some(visit1), Some(visit2)) = (visit1, visit2) else {
            return Ok(rejected("Selected slot does not exist."));
        };

        if state.taken_visit1(visit1.key()) || state.taken_visit2(visit2.key()) {
            return Ok(rejected("Selected slot is no longer available."));
        }

        if !filter::are_compatible(&visit1, &visit2) {
            return Ok(rejected("Visit 2 must be the day after Visit 1."));
        }

        debug!("Booking {} and {} for {}", visit1.key(), visit2.key(), request.address);
        state.bookings.insert(
            request.address.clone(),
            StoredBooking {
                name: request.name.clone(),
                visit1,
                visit2,
            },
        );

        Ok(SubmitOutcome {
            success: true,
            message: None,
        })
    }

    async fn cancel_booking(&self, address: &str) -> Result<CancelOutcome> {
        let mut state = self.state.write().await;
        let removed = state.bookings.remove(address);
        if let Some(booking) = &removed {
            debug!("Cancelled booking of {} for {}", booking.name, address);
        }
        Ok(CancelOutcome {
            success: removed.is_some(),
        })
    }
}
