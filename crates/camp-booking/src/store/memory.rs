//! In-memory booking store, for development and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::BookingStore;
use crate::error::{BookingError, Result};
use crate::model::{
    BookedWeek, Booking, BookingId, BookingSummary, Child, ChildId, Customer, CustomerId,
    NewBooking,
};

#[derive(Default)]
struct Tables {
    customers: HashMap<CustomerId, Customer>,
    children: HashMap<CustomerId, Vec<Child>>,
    bookings: HashMap<BookingId, Booking>,
}

#[derive(Default)]
pub struct MemoryBookingStore {
    tables: RwLock<Tables>,
}

impl MemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn booking_count(&self) -> usize {
        self.tables.read().await.bookings.len()
    }
}

#[async_trait]
impl BookingStore for MemoryBookingStore {
    async fn create_booking(&self, new: &NewBooking) -> Result<Booking> {
        let now = Utc::now();
        let customer = Customer {
            id: CustomerId::new(),
            first_name: new.customer.first_name.trim().to_string(),
            last_name: new.customer.last_name.trim().to_string(),
            email: new.customer.email.trim().to_string(),
            phone: new.customer.phone.clone(),
            address: new.customer.address.clone(),
            created_at: now,
        };

        let children = new
            .children
            .iter()
            .map(|child| Child {
                id: ChildId::new(),
                customer_id: customer.id,
                first_name: child.first_name.trim().to_string(),
                last_name: child.last_name.trim().to_string(),
                birth_date: child.birth_date,
                notes: child.notes.clone(),
            })
            .collect();

        let booking = Booking {
            id: BookingId::new(),
            customer_id: customer.id,
            weeks: new
                .weeks
                .iter()
                .map(|week| BookedWeek {
                    name: week.name.clone(),
                    year: week.year,
                    capacity: week.capacity,
                    days: week.days.clone(),
                })
                .collect(),
            created_at: now,
        };

        let mut tables = self.tables.write().await;
        tables.children.insert(customer.id, children);
        tables.customers.insert(customer.id, customer);
        tables.bookings.insert(booking.id, booking.clone());

        tracing::debug!(booking_id = %booking.id, weeks = booking.weeks.len(), "Stored booking");
        Ok(booking)
    }

    async fn summary(&self, booking_id: BookingId) -> Result<BookingSummary> {
        let tables = self.tables.read().await;
        let booking = tables
            .bookings
            .get(&booking_id)
            .ok_or_else(|| BookingError::NotFound(format!("booking {booking_id}")))?;
        let customer = tables
            .customers
            .get(&booking.customer_id)
            .ok_or_else(|| BookingError::NotFound(format!("customer {}", booking.customer_id)))?;

        Ok(BookingSummary {
            booking: booking.clone(),
            customer: customer.clone(),
            children: tables
                .children
                .get(&customer.id)
                .cloned()
                .unwrap_or_default(),
        })
    }

    async fn discard(&self, booking_id: BookingId) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(booking) = tables.bookings.remove(&booking_id) {
            tables.customers.remove(&booking.customer_id);
            tables.children.remove(&booking.customer_id);
            tracing::debug!(booking_id = %booking_id, "Discarded booking");
        }
        Ok(())
    }
}
