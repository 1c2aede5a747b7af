//! # camp-booking
//!
//! Booking model, pricing table and booking persistence for the kids camp.
//!
//! ## Booking Shape
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Customer ── 1..2 Children                                   │
//! │     │                                                        │
//! │  Booking ── BookedWeek (summerFirstWeek, 5-day, Mo Tu We)    │
//! │          ── BookedWeek (christmasSecondWeek, 3-day, Mo Tu)   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each booked week is priced from a fixed table keyed by the week's
//! capacity class (3, 4 or 5 camp days) and the number of selected days.
//! The booking price is the sum over its weeks:
//!
//! ```text
//! 5-day week, 3 days  →  CHF 225
//! 3-day week, 2 days  →  CHF 150
//!                        ───────
//!                        CHF 375
//! ```

pub mod error;
pub mod model;
pub mod pricing;
pub mod store;

pub use error::{BookingError, Result};
pub use model::{
    Address, Amount, BookedWeek, Booking, BookingId, BookingRequest, BookingSummary, CampDay,
    CapacityClass, Child, ChildId, Customer, CustomerId, NewBooking, NewChild, NewCustomer,
    NewWeek, WeekSelection,
};
pub use pricing::{booking_price, week_price};
pub use store::{BookingStore, MemoryBookingStore};
