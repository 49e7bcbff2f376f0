//! # Visitbook Session
//!
//! The client-side state machine for booking a pair of visits:
//!
//! - **VerificationFlow**: issues a one-time code, runs the re-issue
//!   countdown and gates everything else on a matching code.
//! - **SlotCatalog**: the latest snapshot of Visit 1 and Visit 2 slots.
//! - **BookingSession**: owns one of each plus the user's selection and
//!   booking, and drives the backend calls for browsing, submitting and
//!   cancelling.
//!
//! All mutation happens through `&mut` methods on the session, one event at
//! a time. Backend calls are split into `begin_*` / `finish_*` halves so a
//! driver can keep handling input while a request is outstanding.

/// Slot snapshot fetched from the backend
pub mod catalog;
/// Session settings loaded from the environment
pub mod config;
/// Top-level booking state machine
pub mod session;
/// One-time code issuance, countdown and verification
pub mod verification;

pub use catalog::SlotCatalog;
pub use session::{BookingSession, Delivery, SessionPhase, SubmitTicket, Ticket};
pub use verification::{CodeIssue, CodeSource, VerificationFlow, VerificationPhase};
