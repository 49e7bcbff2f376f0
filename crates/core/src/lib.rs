//! # Visitbook Core
//!
//! Domain types shared by the visit booking client: offered slots, the
//! user's in-progress selection, confirmed bookings, the wire records
//! exchanged with the booking backend, and the error taxonomy.
//!
//! The [`filter`] module holds the one cross-field rule of the system:
//! Visit 2 always falls exactly one calendar day after Visit 1.

/// Error types surfaced to the user
pub mod errors;
/// Compatibility rules between Visit 1 and Visit 2 slots
pub mod filter;
/// Domain and wire models
pub mod models;
