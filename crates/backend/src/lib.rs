//! # Visitbook Backend
//!
//! The booking client talks to a remote slot/booking store through four
//! request/response operations, each keyed by an operation tag:
//!
//! | Tag             | Inputs                          | Output                         |
//! |-----------------|---------------------------------|--------------------------------|
//! | `getSlots`      | none                            | `{ visit1: [...], visit2: [...] }` |
//! | `getBooking`    | address                         | booking record or empty        |
//! | `submitBooking` | address, name, visit1, visit2   | `{ success, message? }`        |
//! | `cancelBooking` | address                         | `{ success }`                  |
//!
//! [`BookingBackend`] is that contract. A transport failure is an `Err`;
//! a business failure (slot taken, nothing to cancel) is an `Ok` outcome
//! with `success == false`. The two are never folded together.

/// Environment configuration for reaching the backend
pub mod config;
/// Verification code delivery
pub mod delivery;
/// HTTP implementation of the backend contract
pub mod http;
/// In-process implementation of the backend contract
pub mod memory;
/// mockall doubles of the backend and code delivery traits
pub mod mock;

use async_trait::async_trait;
use eyre::Result;
use visitbook_core::models::{
    booking::{BookingRecord, CancelOutcome, SubmissionRequest, SubmitOutcome},
    slot::SlotsPayload,
};

pub use delivery::CodeSender;

/// Operation tags understood by the backend.
pub mod op {
    pub const GET_SLOTS: &str = "getSlots";
    pub const GET_BOOKING: &str = "getBooking";
    pub const SUBMIT_BOOKING: &str = "submitBooking";
    pub const CANCEL_BOOKING: &str = "cancelBooking";
}

/// Remote slot and booking store.
#[async_trait]
pub trait BookingBackend: Send + Sync {
    /// Current snapshot of both slot lists.
    async fn get_slots(&self) -> Result<SlotsPayload>;

    /// The booking held by `address`. An empty record means there is none.
    async fn get_booking(&self, address: &str) -> Result<BookingRecord>;

    async fn submit_booking(&self, request: &SubmissionRequest) -> Result<SubmitOutcome>;

    async fn cancel_booking(&self, address: &str) -> Result<CancelOutcome>;
}
