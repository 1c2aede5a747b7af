//! Domain Models
//!
//! Customers, children and the camp weeks they book.
//! Money is kept as integer cents in [`Amount`] - the pricing table speaks
//! whole francs, the payment gateway speaks cents.

use std::collections::HashSet;
use std::fmt;
use std::iter::Sum;
use std::ops::Add;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{BookingError, Result};
use crate::pricing;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Customer identifier
    CustomerId
);
entity_id!(
    /// Child identifier
    ChildId
);
entity_id!(
    /// Booking identifier
    BookingId
);

/// Money in minor units (Rappen / cents)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Self = Self(0);

    /// Whole francs, as listed in the pricing table
    pub const fn from_major(francs: u32) -> Self {
        Self(francs as i64 * 100)
    }

    /// Value the payment gateway expects
    pub const fn minor_units(self) -> i64 {
        self.0
    }
}

impl Add for Amount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CHF {}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// How many camp days a week offers (3, 4 or 5)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum CapacityClass {
    ThreeDay,
    FourDay,
    FiveDay,
}

impl CapacityClass {
    pub const fn days(self) -> usize {
        match self {
            CapacityClass::ThreeDay => 3,
            CapacityClass::FourDay => 4,
            CapacityClass::FiveDay => 5,
        }
    }
}

impl TryFrom<u8> for CapacityClass {
    type Error = String;

    fn try_from(days: u8) -> std::result::Result<Self, Self::Error> {
        match days {
            3 => Ok(CapacityClass::ThreeDay),
            4 => Ok(CapacityClass::FourDay),
            5 => Ok(CapacityClass::FiveDay),
            other => Err(format!("unsupported week capacity: {other} days")),
        }
    }
}

impl From<CapacityClass> for u8 {
    fn from(capacity: CapacityClass) -> Self {
        match capacity {
            CapacityClass::ThreeDay => 3,
            CapacityClass::FourDay => 4,
            CapacityClass::FiveDay => 5,
        }
    }
}

impl fmt::Display for CapacityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-day", self.days())
    }
}

/// A camp day within a week
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampDay {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

impl fmt::Display for CampDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CampDay::Monday => "Montag",
            CampDay::Tuesday => "Dienstag",
            CampDay::Wednesday => "Mittwoch",
            CampDay::Thursday => "Donnerstag",
            CampDay::Friday => "Freitag",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Incoming request
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub zip: String,
    pub city: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCustomer {
    pub first_name: String,
    pub last_name: String,
    pub email: String,

    #[serde(default)]
    pub phone: Option<String>,

    #[serde(default)]
    pub address: Option<Address>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChild {
    pub first_name: String,
    pub last_name: String,

    #[serde(default)]
    pub birth_date: Option<NaiveDate>,

    /// Allergies, medication and the like
    #[serde(default)]
    pub notes: Option<String>,
}

/// One week as selected in the booking form
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekSelection {
    /// Week marker, e.g. `summerFirstWeek`
    pub name: String,

    /// Calendar year; the current season is assumed when absent
    #[serde(default)]
    pub year: Option<i32>,

    pub max_days: CapacityClass,
    pub booked_days: Vec<CampDay>,
}

/// Payload of `POST /payment`
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub customer: NewCustomer,
    pub children: Vec<NewChild>,
    pub booked_weeks: Vec<WeekSelection>,
}

const MAX_CHILDREN: usize = 2;

impl BookingRequest {
    /// Check the request and resolve missing years to `season_year`.
    pub fn validate(self, season_year: i32) -> Result<NewBooking> {
        let customer = self.customer;
        if customer.first_name.trim().is_empty() || customer.last_name.trim().is_empty() {
            return Err(BookingError::Invalid("customer name is required".into()));
        }
        if !is_plausible_email(&customer.email) {
            return Err(BookingError::Invalid(format!(
                "invalid customer email: {}",
                customer.email
            )));
        }

        if self.children.is_empty() || self.children.len() > MAX_CHILDREN {
            return Err(BookingError::Invalid(format!(
                "a booking covers 1 to {MAX_CHILDREN} children, got {}",
                self.children.len()
            )));
        }
        if self
            .children
            .iter()
            .any(|c| c.first_name.trim().is_empty() || c.last_name.trim().is_empty())
        {
            return Err(BookingError::Invalid("child name is required".into()));
        }

        if self.booked_weeks.is_empty() {
            return Err(BookingError::Invalid("at least one week must be booked".into()));
        }

        let mut seen_weeks = HashSet::new();
        let mut weeks = Vec::with_capacity(self.booked_weeks.len());
        for selection in self.booked_weeks {
            let year = selection.year.unwrap_or(season_year);
            if selection.name.trim().is_empty() {
                return Err(BookingError::Invalid("week name is required".into()));
            }
            if !seen_weeks.insert((selection.name.clone(), year)) {
                return Err(BookingError::Invalid(format!(
                    "week {} {year} booked twice",
                    selection.name
                )));
            }

            let mut days = selection.booked_days;
            let requested = days.len();
            days.sort_unstable();
            days.dedup();
            if days.len() != requested {
                return Err(BookingError::Invalid(format!(
                    "week {} lists a day more than once",
                    selection.name
                )));
            }
            if days.is_empty() || days.len() > selection.max_days.days() {
                return Err(BookingError::Invalid(format!(
                    "week {} allows 1 to {} days, got {}",
                    selection.name,
                    selection.max_days.days(),
                    days.len()
                )));
            }

            weeks.push(NewWeek {
                name: selection.name,
                year,
                capacity: selection.max_days,
                days,
            });
        }

        Ok(NewBooking {
            customer,
            children: self.children,
            weeks,
        })
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.trim().split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.ends_with('.'),
        None => false,
    }
}

/// A validated week, ready to be priced and stored
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewWeek {
    pub name: String,
    pub year: i32,
    pub capacity: CapacityClass,
    pub days: Vec<CampDay>,
}

/// A validated booking request
#[derive(Clone, Debug)]
pub struct NewBooking {
    pub customer: NewCustomer,
    pub children: Vec<NewChild>,
    pub weeks: Vec<NewWeek>,
}

impl NewBooking {
    /// Sum of the week prices
    pub fn price(&self) -> Result<Amount> {
        pricing::booking_price(&self.weeks)
    }
}

// ============================================================================
// Stored records
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<Address>,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Child {
    pub id: ChildId,
    pub customer_id: CustomerId,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookedWeek {
    pub name: String,
    pub year: i32,
    pub capacity: CapacityClass,
    pub days: Vec<CampDay>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub customer_id: CustomerId,
    pub weeks: Vec<BookedWeek>,
    pub created_at: DateTime<Utc>,
}

/// Everything the confirmation emails need to know about a booking
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BookingSummary {
    pub booking: Booking,
    pub customer: Customer,
    pub children: Vec<Child>,
}

impl BookingSummary {
    pub fn weeks(&self) -> &[BookedWeek] {
        &self.booking.weeks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(weeks: serde_json::Value) -> BookingRequest {
        serde_json::from_value(serde_json::json!({
            "customer": {
                "firstName": "Anna",
                "lastName": "Muster",
                "email": "anna@example.ch"
            },
            "children": [{ "firstName": "Lia", "lastName": "Muster" }],
            "bookedWeeks": weeks
        }))
        .unwrap()
    }

    #[test]
    fn test_request_deserializes_camel_case() {
        let req = request(serde_json::json!([
            { "name": "summerFirstWeek", "maxDays": 5, "bookedDays": ["monday", "friday"] }
        ]));
        assert_eq!(req.booked_weeks[0].max_days, CapacityClass::FiveDay);
        assert_eq!(req.booked_weeks[0].booked_days, vec![CampDay::Monday, CampDay::Friday]);
        assert_eq!(req.booked_weeks[0].year, None);
    }

    #[test]
    fn test_unknown_capacity_rejected_on_parse() {
        let parsed: std::result::Result<WeekSelection, _> = serde_json::from_value(serde_json::json!({
            "name": "odd", "maxDays": 6, "bookedDays": ["monday"]
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_validate_resolves_season_year() {
        let booking = request(serde_json::json!([
            { "name": "summerFirstWeek", "maxDays": 5, "bookedDays": ["tuesday", "monday"] },
            { "name": "christmasSecondWeek", "year": 2026, "maxDays": 3, "bookedDays": ["monday"] }
        ]))
        .validate(2025)
        .unwrap();

        assert_eq!(booking.weeks[0].year, 2025);
        assert_eq!(booking.weeks[0].days, vec![CampDay::Monday, CampDay::Tuesday]);
        assert_eq!(booking.weeks[1].year, 2026);
    }

    #[test]
    fn test_validate_rejects_too_many_days() {
        let err = request(serde_json::json!([
            { "name": "w", "maxDays": 3, "bookedDays": ["monday", "tuesday", "wednesday", "thursday"] }
        ]))
        .validate(2025)
        .unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_validate_rejects_duplicate_days_and_weeks() {
        let dup_day = request(serde_json::json!([
            { "name": "w", "maxDays": 5, "bookedDays": ["monday", "monday"] }
        ]))
        .validate(2025);
        assert!(matches!(dup_day, Err(BookingError::Invalid(_))));

        let dup_week = request(serde_json::json!([
            { "name": "w", "maxDays": 5, "bookedDays": ["monday"] },
            { "name": "w", "maxDays": 5, "bookedDays": ["friday"] }
        ]))
        .validate(2025);
        assert!(matches!(dup_week, Err(BookingError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_empty_selection_and_bad_email() {
        let empty = request(serde_json::json!([])).validate(2025);
        assert!(matches!(empty, Err(BookingError::Invalid(_))));

        let mut req = request(serde_json::json!([
            { "name": "w", "maxDays": 4, "bookedDays": ["monday"] }
        ]));
        req.customer.email = "not-an-email".into();
        assert!(matches!(req.validate(2025), Err(BookingError::Invalid(_))));
    }

    #[test]
    fn test_amount_display_and_sum() {
        let total: Amount = [Amount::from_major(225), Amount::from_major(150)].into_iter().sum();
        assert_eq!(total.minor_units(), 37_500);
        assert_eq!(total.to_string(), "CHF 375.00");
    }
}
