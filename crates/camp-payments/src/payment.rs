//! Payment Records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use camp_booking::{Amount, BookingId};

/// Unique payment identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(Uuid);

impl PaymentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PaymentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PaymentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transaction status as reported by the gateway
///
/// A payment without a status is pending: nobody has asked the gateway yet,
/// or the gateway had nothing actionable to say.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Authorized,
    Captured,
    Canceled,
    #[serde(other)]
    Unrecognized,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Authorized => "AUTHORIZED",
            TransactionStatus::Captured => "CAPTURED",
            TransactionStatus::Canceled => "CANCELED",
            TransactionStatus::Unrecognized => "UNRECOGNIZED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Captured | TransactionStatus::Canceled)
    }

    /// Whether a payment currently in `current` may move to `self`
    ///
    /// Allowed: unset → AUTHORIZED | CAPTURED | CANCELED, AUTHORIZED → CAPTURED | CANCELED.
    pub fn can_follow(self, current: Option<TransactionStatus>) -> bool {
        match current {
            None => matches!(
                self,
                TransactionStatus::Authorized
                    | TransactionStatus::Captured
                    | TransactionStatus::Canceled
            ),
            Some(TransactionStatus::Authorized) => self.is_terminal(),
            Some(_) => false,
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payment for one booking
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,

    pub booking_id: BookingId,

    /// Amount charged, in minor units
    pub price: Amount,

    /// `None` while pending
    pub status: Option<TransactionStatus>,

    /// Gateway transaction id, known once authorized
    pub transaction_id: Option<String>,

    /// Gateway capture id
    pub capture_id: Option<String>,

    pub captured_at: Option<DateTime<Utc>>,

    /// End of the capture lease held by one finalize call
    pub capture_lease_until: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(booking_id: BookingId, price: Amount) -> Self {
        let now = Utc::now();
        Self {
            id: PaymentId::new(),
            booking_id,
            price,
            status: None,
            transaction_id: None,
            capture_id: None,
            captured_at: None,
            capture_lease_until: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status_label(&self) -> &'static str {
        self.status.map_or("PENDING", |s| s.as_str())
    }

    /// Whether a finalize call may be inside the gateway capture right now
    pub fn capture_in_progress(&self, now: DateTime<Utc>) -> bool {
        self.capture_lease_until.is_some_and(|until| until > now)
    }
}
