//! Error Types for Camp Bookings

use thiserror::Error;

use crate::model::CapacityClass;

pub type Result<T> = std::result::Result<T, BookingError>;

#[derive(Error, Debug)]
pub enum BookingError {
    /// Malformed booking request
    #[error("Invalid booking: {0}")]
    Invalid(String),

    /// Combination missing from the pricing table
    #[error("No price for {days} day(s) in a {capacity} week")]
    UnpricedSelection {
        capacity: CapacityClass,
        days: usize,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl BookingError {
    /// Whether the caller sent something we refuse, as opposed to a server-side fault
    pub fn is_client_error(&self) -> bool {
        matches!(self, BookingError::Invalid(_) | BookingError::UnpricedSelection { .. })
    }
}
