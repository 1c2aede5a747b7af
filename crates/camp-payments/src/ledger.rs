//! Payment Ledger
//!
//! Stores payments and their correlation tokens. Every status change goes
//! through a conditional update, so concurrent finalize calls on the same
//! token cannot capture twice or move a payment out of a terminal state.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use camp_booking::{Amount, BookingId};

use crate::error::{PaymentError, Result};
use crate::gateway::CaptureReceipt;
use crate::payment::{Payment, PaymentId, TransactionStatus};
use crate::token::{CorrelationRecord, CorrelationToken};

/// Gateway side of a new payment
#[derive(Clone, Debug)]
pub struct NewCorrelation {
    pub token: CorrelationToken,
    pub gateway_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of a conditional update
#[derive(Clone, Debug)]
pub struct StatusUpdate {
    /// Payment after the update attempt
    pub payment: Payment,

    /// Whether this call changed the payment
    pub applied: bool,
}

/// Payment storage trait
#[async_trait]
pub trait PaymentLedger: Send + Sync {
    /// Create a pending payment and bind its correlation token, atomically
    async fn open(
        &self,
        booking_id: BookingId,
        price: Amount,
        correlation: NewCorrelation,
    ) -> Result<Payment>;

    /// Look up a correlation token (exact match)
    async fn correlation(&self, token: &CorrelationToken) -> Result<Option<CorrelationRecord>>;

    async fn payment(&self, id: PaymentId) -> Result<Option<Payment>>;

    /// Cache a gateway status, only if none is recorded yet
    async fn record_status(
        &self,
        id: PaymentId,
        status: TransactionStatus,
        transaction_id: Option<String>,
    ) -> Result<StatusUpdate>;

    /// Take the capture lease on an authorized payment
    ///
    /// Returns `false` when the payment is not authorized or another caller
    /// holds an unexpired lease.
    async fn claim_capture(&self, id: PaymentId, lease: Duration) -> Result<bool>;

    /// Drop the capture lease after a failed capture
    async fn release_capture(&self, id: PaymentId) -> Result<()>;

    /// AUTHORIZED → CAPTURED, nothing else
    async fn complete_capture(&self, id: PaymentId, receipt: &CaptureReceipt) -> Result<StatusUpdate>;

    /// Force CANCELED, unless captured or held by an unexpired capture lease
    async fn cancel(&self, id: PaymentId) -> Result<StatusUpdate>;
}

#[derive(Default)]
struct LedgerTables {
    payments: HashMap<PaymentId, Payment>,
    tokens: HashMap<CorrelationToken, CorrelationRecord>,
}

impl LedgerTables {
    fn payment_mut(&mut self, id: PaymentId) -> Result<&mut Payment> {
        self.payments
            .get_mut(&id)
            .ok_or(PaymentError::PaymentNotFound(id))
    }
}

/// In-memory payment ledger (for development and tests)
#[derive(Default)]
pub struct MemoryLedger {
    tables: RwLock<LedgerTables>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lease_end(lease: Duration, now: DateTime<Utc>) -> DateTime<Utc> {
    now + chrono::Duration::from_std(lease).unwrap_or_else(|_| chrono::Duration::days(1))
}

#[async_trait]
impl PaymentLedger for MemoryLedger {
    async fn open(
        &self,
        booking_id: BookingId,
        price: Amount,
        correlation: NewCorrelation,
    ) -> Result<Payment> {
        let mut tables = self.tables.write().await;
        if tables.tokens.contains_key(&correlation.token) {
            return Err(PaymentError::Storage("correlation token already bound".into()));
        }

        let payment = Payment::new(booking_id, price);
        let record = CorrelationRecord {
            token: correlation.token.clone(),
            payment_id: payment.id,
            gateway_token: correlation.gateway_token,
            expires_at: correlation.expires_at,
            created_at: payment.created_at,
        };

        tables.tokens.insert(correlation.token, record);
        tables.payments.insert(payment.id, payment.clone());
        Ok(payment)
    }

    async fn correlation(&self, token: &CorrelationToken) -> Result<Option<CorrelationRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.tokens.get(token).cloned())
    }

    async fn payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        let tables = self.tables.read().await;
        Ok(tables.payments.get(&id).cloned())
    }

    async fn record_status(
        &self,
        id: PaymentId,
        status: TransactionStatus,
        transaction_id: Option<String>,
    ) -> Result<StatusUpdate> {
        let mut tables = self.tables.write().await;
        let payment = tables.payment_mut(id)?;

        let applied = payment.status.is_none() && status.can_follow(None);
        if applied {
            payment.status = Some(status);
            if transaction_id.is_some() {
                payment.transaction_id = transaction_id;
            }
            payment.updated_at = Utc::now();
        }

        Ok(StatusUpdate {
            payment: payment.clone(),
            applied,
        })
    }

    async fn claim_capture(&self, id: PaymentId, lease: Duration) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let payment = tables.payment_mut(id)?;
        let now = Utc::now();

        if payment.status != Some(TransactionStatus::Authorized) {
            return Ok(false);
        }
        if payment.capture_in_progress(now) {
            return Ok(false);
        }
        if let Some(until) = payment.capture_lease_until {
            tracing::warn!(payment_id = %id, lease_until = %until, "Taking over expired capture lease");
        }

        payment.capture_lease_until = Some(lease_end(lease, now));
        payment.updated_at = now;
        Ok(true)
    }

    async fn release_capture(&self, id: PaymentId) -> Result<()> {
        let mut tables = self.tables.write().await;
        let payment = tables.payment_mut(id)?;
        payment.capture_lease_until = None;
        Ok(())
    }

    async fn complete_capture(&self, id: PaymentId, receipt: &CaptureReceipt) -> Result<StatusUpdate> {
        let mut tables = self.tables.write().await;
        let payment = tables.payment_mut(id)?;

        let applied = payment.status == Some(TransactionStatus::Authorized);
        if applied {
            payment.status = Some(TransactionStatus::Captured);
            payment.capture_id.clone_from(&receipt.capture_id);
            payment.captured_at = Some(receipt.captured_at);
            payment.capture_lease_until = None;
            payment.updated_at = Utc::now();
        }

        Ok(StatusUpdate {
            payment: payment.clone(),
            applied,
        })
    }

    async fn cancel(&self, id: PaymentId) -> Result<StatusUpdate> {
        let mut tables = self.tables.write().await;
        let payment = tables.payment_mut(id)?;

        let capturing = payment.capture_in_progress(Utc::now());
        let applied = !capturing && TransactionStatus::Canceled.can_follow(payment.status);
        if capturing {
            tracing::warn!(payment_id = %id, "Ignoring cancel while a capture is in progress");
        } else if applied {
            payment.status = Some(TransactionStatus::Canceled);
            payment.capture_lease_until = None;
            payment.updated_at = Utc::now();
        } else if payment.status == Some(TransactionStatus::Captured) {
            tracing::warn!(payment_id = %id, "Ignoring cancel for captured payment");
        }

        Ok(StatusUpdate {
            payment: payment.clone(),
            applied,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open(ledger: &MemoryLedger) -> (Payment, CorrelationToken) {
        let token = CorrelationToken::generate();
        let payment = ledger
            .open(
                BookingId::new(),
                Amount::from_major(225),
                NewCorrelation {
                    token: token.clone(),
                    gateway_token: "gw-token".into(),
                    expires_at: Utc::now() + chrono::Duration::hours(1),
                },
            )
            .await
            .unwrap();
        (payment, token)
    }

    fn receipt() -> CaptureReceipt {
        CaptureReceipt {
            capture_id: Some("cap-1".into()),
            status: "CAPTURED".into(),
            captured_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_open_binds_token() {
        let ledger = MemoryLedger::new();
        let (payment, token) = open(&ledger).await;

        let record = ledger.correlation(&token).await.unwrap().unwrap();
        assert_eq!(record.payment_id, payment.id);
        assert_eq!(record.gateway_token, "gw-token");
        assert!(payment.status.is_none());

        let other = CorrelationToken::from_string(&token.as_str()[..16]);
        assert!(ledger.correlation(&other).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_record_status_only_when_unset() {
        let ledger = MemoryLedger::new();
        let (payment, _) = open(&ledger).await;

        let first = ledger
            .record_status(payment.id, TransactionStatus::Authorized, Some("txn-1".into()))
            .await
            .unwrap();
        assert!(first.applied);

        let second = ledger
            .record_status(payment.id, TransactionStatus::Canceled, None)
            .await
            .unwrap();
        assert!(!second.applied);
        assert_eq!(second.payment.status, Some(TransactionStatus::Authorized));
        assert_eq!(second.payment.transaction_id.as_deref(), Some("txn-1"));
    }

    #[tokio::test]
    async fn test_pending_status_is_not_cached() {
        let ledger = MemoryLedger::new();
        let (payment, _) = open(&ledger).await;

        let update = ledger
            .record_status(payment.id, TransactionStatus::Pending, None)
            .await
            .unwrap();
        assert!(!update.applied);
        assert!(update.payment.status.is_none());
    }

    #[tokio::test]
    async fn test_capture_lease_is_exclusive() {
        let ledger = MemoryLedger::new();
        let (payment, _) = open(&ledger).await;
        let lease = Duration::from_secs(60);

        // nothing to capture yet
        assert!(!ledger.claim_capture(payment.id, lease).await.unwrap());

        ledger
            .record_status(payment.id, TransactionStatus::Authorized, Some("txn-1".into()))
            .await
            .unwrap();
        assert!(ledger.claim_capture(payment.id, lease).await.unwrap());
        assert!(!ledger.claim_capture(payment.id, lease).await.unwrap());

        ledger.release_capture(payment.id).await.unwrap();
        assert!(ledger.claim_capture(payment.id, lease).await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_lease_can_be_taken_over() {
        let ledger = MemoryLedger::new();
        let (payment, _) = open(&ledger).await;
        ledger
            .record_status(payment.id, TransactionStatus::Authorized, Some("txn-1".into()))
            .await
            .unwrap();

        assert!(ledger.claim_capture(payment.id, Duration::ZERO).await.unwrap());
        assert!(ledger.claim_capture(payment.id, Duration::ZERO).await.unwrap());
    }

    #[tokio::test]
    async fn test_complete_capture_requires_authorized() {
        let ledger = MemoryLedger::new();
        let (payment, _) = open(&ledger).await;

        let early = ledger.complete_capture(payment.id, &receipt()).await.unwrap();
        assert!(!early.applied);

        ledger
            .record_status(payment.id, TransactionStatus::Authorized, Some("txn-1".into()))
            .await
            .unwrap();
        let done = ledger.complete_capture(payment.id, &receipt()).await.unwrap();
        assert!(done.applied);
        assert_eq!(done.payment.status, Some(TransactionStatus::Captured));
        assert_eq!(done.payment.capture_id.as_deref(), Some("cap-1"));

        let again = ledger.complete_capture(payment.id, &receipt()).await.unwrap();
        assert!(!again.applied);
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent_and_respects_capture() {
        let ledger = MemoryLedger::new();
        let (payment, _) = open(&ledger).await;

        assert!(ledger.cancel(payment.id).await.unwrap().applied);
        let again = ledger.cancel(payment.id).await.unwrap();
        assert!(!again.applied);
        assert_eq!(again.payment.status, Some(TransactionStatus::Canceled));

        let (captured, _) = open(&ledger).await;
        ledger
            .record_status(captured.id, TransactionStatus::Captured, Some("txn-2".into()))
            .await
            .unwrap();
        let refused = ledger.cancel(captured.id).await.unwrap();
        assert!(!refused.applied);
        assert_eq!(refused.payment.status, Some(TransactionStatus::Captured));
    }

    #[tokio::test]
    async fn test_cancel_waits_for_running_capture() {
        let ledger = MemoryLedger::new();
        let (payment, _) = open(&ledger).await;
        ledger
            .record_status(payment.id, TransactionStatus::Authorized, Some("txn-1".into()))
            .await
            .unwrap();
        assert!(ledger.claim_capture(payment.id, Duration::from_secs(60)).await.unwrap());

        let refused = ledger.cancel(payment.id).await.unwrap();
        assert!(!refused.applied);
        assert_eq!(refused.payment.status, Some(TransactionStatus::Authorized));

        // a failed capture gives the payment back
        ledger.release_capture(payment.id).await.unwrap();
        let canceled = ledger.cancel(payment.id).await.unwrap();
        assert!(canceled.applied);
        assert_eq!(canceled.payment.status, Some(TransactionStatus::Canceled));
    }

    #[tokio::test]
    async fn test_cancel_after_expired_lease() {
        let ledger = MemoryLedger::new();
        let (payment, _) = open(&ledger).await;
        ledger
            .record_status(payment.id, TransactionStatus::Authorized, Some("txn-1".into()))
            .await
            .unwrap();
        assert!(ledger.claim_capture(payment.id, Duration::ZERO).await.unwrap());

        assert!(ledger.cancel(payment.id).await.unwrap().applied);
    }

    #[tokio::test]
    async fn test_unknown_payment() {
        let ledger = MemoryLedger::new();
        assert!(matches!(
            ledger.cancel(PaymentId::new()).await,
            Err(PaymentError::PaymentNotFound(_))
        ));
    }
}
