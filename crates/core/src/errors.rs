use std::fmt;

use thiserror::Error;

/// Backend requests tracked by a booking session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Slots,
    Booking,
    Submit,
    Cancel,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RequestKind::Slots => "slot refresh",
            RequestKind::Booking => "booking lookup",
            RequestKind::Submit => "booking submission",
            RequestKind::Cancel => "booking cancellation",
        };
        f.write_str(label)
    }
}

/// Why a cancellation did not go through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelFailure {
    /// The backend answered and reported there was nothing to cancel.
    NoBookingFound,
    /// The backend could not be reached or answered with garbage.
    Transport(String),
}

impl fmt::Display for CancelFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelFailure::NoBookingFound => f.write_str("no booking found"),
            CancelFailure::Transport(reason) => write!(f, "error cancelling booking: {}", reason),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid verification code")]
    InvalidCode,

    #[error("Fetch error: {0}")]
    Fetch(String),

    // Backend reasons are shown to the user verbatim.
    #[error("{0}")]
    Submission(String),

    #[error("Cancellation failed: {0}")]
    Cancellation(CancelFailure),

    #[error("A {0} is already in progress")]
    InFlight(RequestKind),
}

impl BookingError {
    pub fn validation(message: impl Into<String>) -> Self {
        BookingError::Validation(message.into())
    }
}

pub type BookingResult<T> = Result<T, BookingError>;
