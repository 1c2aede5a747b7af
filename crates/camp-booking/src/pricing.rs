//! Camp Pricing
//!
//! Fixed price table, keyed by week capacity and number of booked days.
//!
//! ```text
//!            1 day   2 days   3 days   4 days   5 days
//! 5-day      75      150      225      290      290
//! 4-day      75      150      225      240      -
//! 3-day      75      150      180      -        -
//! ```

use crate::error::{BookingError, Result};
use crate::model::{Amount, CapacityClass, NewWeek};

/// Price of a single week
pub fn week_price(capacity: CapacityClass, days: usize) -> Result<Amount> {
    let francs = match (capacity, days) {
        (_, 1) => 75,
        (_, 2) => 150,
        (CapacityClass::ThreeDay, 3) => 180,
        (CapacityClass::FourDay | CapacityClass::FiveDay, 3) => 225,
        (CapacityClass::FourDay, 4) => 240,
        (CapacityClass::FiveDay, 4 | 5) => 290,
        _ => return Err(BookingError::UnpricedSelection { capacity, days }),
    };

    Ok(Amount::from_major(francs))
}

/// Price of a whole booking
pub fn booking_price(weeks: &[NewWeek]) -> Result<Amount> {
    weeks
        .iter()
        .map(|week| week_price(week.capacity, week.days.len()))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CampDay;

    fn week(capacity: CapacityClass, days: &[CampDay]) -> NewWeek {
        NewWeek {
            name: "summerFirstWeek".into(),
            year: 2025,
            capacity,
            days: days.to_vec(),
        }
    }

    #[test]
    fn test_price_table() {
        let table = [
            (CapacityClass::FiveDay, [75, 150, 225, 290, 290].as_slice()),
            (CapacityClass::FourDay, [75, 150, 225, 240].as_slice()),
            (CapacityClass::ThreeDay, [75, 150, 180].as_slice()),
        ];

        for (capacity, prices) in table {
            for (i, francs) in prices.iter().enumerate() {
                assert_eq!(
                    week_price(capacity, i + 1).unwrap(),
                    Amount::from_major(*francs),
                    "{capacity} week with {} days",
                    i + 1
                );
            }
        }
    }

    #[test]
    fn test_unpriced_selection_fails_loud() {
        assert!(matches!(
            week_price(CapacityClass::ThreeDay, 4),
            Err(BookingError::UnpricedSelection { days: 4, .. })
        ));
        assert!(week_price(CapacityClass::FiveDay, 0).is_err());
        assert!(week_price(CapacityClass::FiveDay, 6).is_err());
    }

    #[test]
    fn test_booking_price_sums_weeks() {
        let weeks = [
            week(
                CapacityClass::FiveDay,
                &[CampDay::Monday, CampDay::Tuesday, CampDay::Wednesday],
            ),
            week(CapacityClass::ThreeDay, &[CampDay::Monday, CampDay::Tuesday]),
        ];
        assert_eq!(booking_price(&weeks).unwrap(), Amount::from_major(375));
        assert_eq!(booking_price(&weeks[..1]).unwrap().minor_units(), 22_500);
    }
}
