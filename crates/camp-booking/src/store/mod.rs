//! Booking Persistence
//!
//! Narrow facade over customer, child, week and day storage.

mod memory;

pub use memory::MemoryBookingStore;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Booking, BookingId, BookingSummary, NewBooking};

/// Booking storage trait
///
/// Implementations must store a booking with its customer, children and
/// weeks as one unit: either all of it is visible afterwards or none of it.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Persist customer, children, booking and its weeks/days
    async fn create_booking(&self, booking: &NewBooking) -> Result<Booking>;

    /// Customer, children and weeks of a booking
    async fn summary(&self, booking_id: BookingId) -> Result<BookingSummary>;

    /// Remove a booking whose payment could not be initiated
    async fn discard(&self, booking_id: BookingId) -> Result<()>;
}
