//! Payment Orchestrator
//!
//! Drives a booking's payment through its lifecycle:
//!
//! ```text
//! NEW ──initiate──▶ PENDING ──finalize──▶ AUTHORIZED ──capture──▶ CAPTURED
//!                      │                      │
//!                      └──── abort / mark_failed ────▶ CANCELED
//! ```
//!
//! `finalize` may run concurrently for one token (browser redirect racing
//! client polling). Only the caller holding the ledger's capture lease talks
//! to the gateway's capture endpoint and sends the confirmation mails.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, Utc};
use tokio::task::JoinHandle;

use camp_booking::{Amount, BookingId, BookingRequest, BookingStore};

use crate::error::{PaymentError, Result};
use crate::gateway::{CreateTransaction, PaymentGateway};
use crate::ledger::{NewCorrelation, PaymentLedger};
use crate::notify::Mailer;
use crate::payment::{Payment, PaymentId, TransactionStatus};
use crate::token::{CorrelationRecord, CorrelationToken};

pub const SUCCESS_MESSAGE: &str =
    "Danke für Ihre Bezahlung. Sie erhalten in kürze zwei Bestätigungs-E-Mails.";
pub const ABORT_MESSAGE: &str = "Die Zahlung wurde durch Sie abgebrochen.";
pub const PENDING_MESSAGE: &str =
    "Ihre Zahlung wird noch verarbeitet. Bitte versuchen Sie es in Kürze erneut.";

/// Orchestrator settings
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// Page the payer's browser returns to; the correlation token is appended
    pub return_url: String,

    /// Public base URL of this service, for the gateway's fail notification
    pub public_api_url: String,

    /// Shown on the payment page
    pub description: String,

    /// Year for weeks booked without one (current year when `None`)
    pub season_year: Option<i32>,

    /// How long one finalize call may hold an authorized payment for capture
    ///
    /// Raised to twice the gateway's request timeout when shorter.
    pub capture_lease: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            return_url: "http://localhost:3000/payment/complete".into(),
            public_api_url: "http://localhost:3000".into(),
            description: "Kids Camp".into(),
            season_year: None,
            capture_lease: Duration::from_secs(120),
        }
    }
}

impl OrchestratorConfig {
    fn return_url_for(&self, token: &CorrelationToken) -> String {
        let separator = if self.return_url.contains('?') { '&' } else { '?' };
        format!("{}{separator}customToken={token}", self.return_url)
    }

    fn fail_notify_url_for(&self, token: &CorrelationToken) -> String {
        format!(
            "{}/payment/failed?customToken={token}",
            self.public_api_url.trim_end_matches('/')
        )
    }
}

/// What the payer is told after finalize
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// Captured now or earlier
    Captured,

    /// Payer aborted or payment was canceled
    Aborted,

    /// Not settled yet, try again later
    Pending,
}

impl FinalizeOutcome {
    pub fn message(self) -> &'static str {
        match self {
            FinalizeOutcome::Captured => SUCCESS_MESSAGE,
            FinalizeOutcome::Aborted => ABORT_MESSAGE,
            FinalizeOutcome::Pending => PENDING_MESSAGE,
        }
    }

    pub fn is_settled(self) -> bool {
        !matches!(self, FinalizeOutcome::Pending)
    }

    fn of(payment: &Payment) -> Self {
        match payment.status {
            Some(TransactionStatus::Captured) => FinalizeOutcome::Captured,
            Some(TransactionStatus::Canceled) => FinalizeOutcome::Aborted,
            other => {
                tracing::debug!(payment_id = %payment.id, status = ?other, "Payment not settled");
                FinalizeOutcome::Pending
            }
        }
    }
}

/// A payment waiting for the payer
#[derive(Clone, Debug)]
pub struct Initiated {
    pub payment_id: PaymentId,
    pub booking_id: BookingId,
    pub token: CorrelationToken,

    /// Gateway payment page
    pub redirect_url: String,

    pub price: Amount,
    pub expires_at: DateTime<Utc>,
}

/// Background status polling
#[derive(Clone, Debug)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            max_attempts: 90,
        }
    }
}

pub struct PaymentOrchestrator {
    bookings: Arc<dyn BookingStore>,
    ledger: Arc<dyn PaymentLedger>,
    gateway: Arc<dyn PaymentGateway>,
    mailer: Arc<dyn Mailer>,
    config: OrchestratorConfig,
}

impl PaymentOrchestrator {
    pub fn new(
        bookings: Arc<dyn BookingStore>,
        ledger: Arc<dyn PaymentLedger>,
        gateway: Arc<dyn PaymentGateway>,
        mailer: Arc<dyn Mailer>,
        mut config: OrchestratorConfig,
    ) -> Self {
        // a lease must outlive the capture call it guards
        let min_lease = gateway.request_timeout().saturating_mul(2);
        if config.capture_lease < min_lease {
            tracing::warn!(
                configured_secs = config.capture_lease.as_secs(),
                gateway_timeout_secs = gateway.request_timeout().as_secs(),
                "Capture lease shorter than twice the gateway timeout, extending it"
            );
            config.capture_lease = min_lease;
        }

        Self {
            bookings,
            ledger,
            gateway,
            mailer,
            config,
        }
    }

    pub fn gateway_name(&self) -> &str {
        self.gateway.name()
    }

    fn season_year(&self) -> i32 {
        self.config.season_year.unwrap_or_else(|| Utc::now().year())
    }

    /// Store the booking and open a gateway transaction for it
    ///
    /// The booking is discarded again when no payment could be stored.
    pub async fn initiate(&self, request: BookingRequest) -> Result<Initiated> {
        let booking = request.validate(self.season_year())?;
        let price = booking.price()?;

        let stored = self.bookings.create_booking(&booking).await?;
        let token = CorrelationToken::generate();

        let transaction = CreateTransaction {
            amount: price,
            order_id: stored.id.to_string(),
            description: self.config.description.clone(),
            payer_email: Some(booking.customer.email.trim().to_string()),
            return_url: self.config.return_url_for(&token),
            fail_notify_url: self.config.fail_notify_url_for(&token),
        };

        let created = match self.gateway.create(&transaction).await {
            Ok(created) => created,
            Err(e) => {
                e.log("create");
                self.discard_booking(stored.id).await;
                return Err(e.into());
            }
        };

        let correlation = NewCorrelation {
            token: token.clone(),
            gateway_token: created.token.clone(),
            expires_at: created.expiration,
        };
        let payment = match self.ledger.open(stored.id, price, correlation).await {
            Ok(payment) => payment,
            Err(e) => {
                tracing::error!(
                    booking_id = %stored.id,
                    gateway_token = %created.token,
                    error = %e,
                    "Gateway transaction opened but payment not stored - reconcile manually"
                );
                self.discard_booking(stored.id).await;
                return Err(e);
            }
        };

        tracing::info!(
            payment_id = %payment.id,
            booking_id = %stored.id,
            price = %price,
            weeks = stored.weeks.len(),
            gateway = self.gateway.name(),
            "Payment initiated"
        );

        Ok(Initiated {
            payment_id: payment.id,
            booking_id: stored.id,
            token,
            redirect_url: created.redirect_url,
            price,
            expires_at: created.expiration,
        })
    }

    /// Settle a payment after the payer left the payment page
    ///
    /// Safe to call repeatedly: once captured, later calls only report success.
    pub async fn finalize(&self, token: &CorrelationToken) -> Result<FinalizeOutcome> {
        let correlation = self.correlation(token).await?;
        let mut payment = self.load_payment(correlation.payment_id).await?;

        if payment.status.is_none() {
            let state = match self.gateway.status(&correlation.gateway_token).await {
                Ok(state) => state,
                Err(e) if e.is_abort() => {
                    tracing::info!(payment_id = %payment.id, "Payer aborted the payment");
                    return Ok(self.settle_abort(payment.id).await);
                }
                Err(e) => {
                    e.log("status");
                    return Err(e.into());
                }
            };

            if !state.status.can_follow(None) {
                tracing::info!(
                    payment_id = %payment.id,
                    status = %state.status,
                    "Transaction not settled at the gateway yet"
                );
                return Ok(FinalizeOutcome::Pending);
            }

            let update = self
                .ledger
                .record_status(payment.id, state.status, state.transaction_id)
                .await?;
            payment = update.payment;

            // auto-captured by the gateway, nothing left for us to capture
            if update.applied && payment.status == Some(TransactionStatus::Captured) {
                self.notify_success(&payment).await;
            }
        }

        if payment.status == Some(TransactionStatus::Authorized) {
            return self.capture(&payment).await;
        }

        Ok(FinalizeOutcome::of(&payment))
    }

    /// Cancel the payment behind a token
    ///
    /// Canceling twice is fine. Captured payments stay captured.
    pub async fn mark_failed(&self, token: &CorrelationToken) -> Result<Payment> {
        let correlation = self.correlation(token).await?;
        let update = self.ledger.cancel(correlation.payment_id).await?;

        if update.applied {
            tracing::info!(payment_id = %update.payment.id, "Payment canceled");
        } else {
            tracing::debug!(
                payment_id = %update.payment.id,
                status = update.payment.status_label(),
                "Cancel left payment unchanged"
            );
        }

        Ok(update.payment)
    }

    /// Finalize in the background until the payment settles
    pub fn spawn_poll(self: &Arc<Self>, token: CorrelationToken, config: PollConfig) -> JoinHandle<()> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            orchestrator.poll_until_settled(&token, &config).await;
        })
    }

    /// Returns the settled outcome, or `None` when polling gave up
    pub async fn poll_until_settled(
        &self,
        token: &CorrelationToken,
        config: &PollConfig,
    ) -> Option<FinalizeOutcome> {
        for attempt in 1..=config.max_attempts {
            tokio::time::sleep(config.interval).await;

            match self.correlation(token).await {
                Ok(correlation) if correlation.is_expired() => {
                    tracing::debug!(attempt, "Gateway token expired, stop polling");
                    return None;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(attempt, error = %e, "Stop polling");
                    return None;
                }
            }

            match self.finalize(token).await {
                Ok(outcome) if outcome.is_settled() => {
                    tracing::debug!(attempt, outcome = ?outcome, "Payment settled by background poll");
                    return Some(outcome);
                }
                Ok(_) => {}
                Err(e) => tracing::debug!(attempt, error = %e, "Background status poll failed"),
            }
        }

        None
    }

    async fn capture(&self, payment: &Payment) -> Result<FinalizeOutcome> {
        if !self
            .ledger
            .claim_capture(payment.id, self.config.capture_lease)
            .await?
        {
            tracing::info!(payment_id = %payment.id, "Capture already in progress");
            let current = self.load_payment(payment.id).await?;
            return Ok(FinalizeOutcome::of(&current));
        }

        let Some(transaction_id) = payment.transaction_id.as_deref() else {
            self.release_capture(payment.id).await;
            return Err(PaymentError::MissingTransactionId(payment.id));
        };

        let receipt = match self.gateway.capture(transaction_id).await {
            Ok(receipt) => receipt,
            Err(e) if e.is_abort() => {
                tracing::info!(payment_id = %payment.id, "Transaction aborted before capture");
                self.release_capture(payment.id).await;
                return Ok(self.settle_abort(payment.id).await);
            }
            Err(e) => {
                e.log("capture");
                self.release_capture(payment.id).await;
                return Err(e.into());
            }
        };

        let update = match self.ledger.complete_capture(payment.id, &receipt).await {
            Ok(update) => update,
            Err(e) => {
                tracing::error!(
                    payment_id = %payment.id,
                    transaction_id,
                    error = %e,
                    "Captured at the gateway but not recorded - reconcile manually"
                );
                return Err(e);
            }
        };

        if !update.applied {
            // the payer has been charged, whatever the ledger says
            tracing::error!(
                payment_id = %payment.id,
                transaction_id,
                status = update.payment.status_label(),
                "Captured at the gateway but the ledger moved on - reconcile manually"
            );
            return Ok(FinalizeOutcome::Captured);
        }

        tracing::info!(
            payment_id = %payment.id,
            transaction_id,
            price = %payment.price,
            "Payment captured"
        );
        self.notify_success(&update.payment).await;

        Ok(FinalizeOutcome::of(&update.payment))
    }

    /// Record an abort; a failing ledger does not change what the payer is told
    async fn settle_abort(&self, id: PaymentId) -> FinalizeOutcome {
        match self.ledger.cancel(id).await {
            Ok(update) => FinalizeOutcome::of(&update.payment),
            Err(e) => {
                tracing::error!(payment_id = %id, error = %e, "Failed updating canceled payment");
                FinalizeOutcome::Aborted
            }
        }
    }

    async fn notify_success(&self, payment: &Payment) {
        let booking = match self.bookings.summary(payment.booking_id).await {
            Ok(booking) => booking,
            Err(e) => {
                tracing::error!(
                    payment_id = %payment.id,
                    booking_id = %payment.booking_id,
                    error = %e,
                    "Cannot load booking for confirmation mails"
                );
                return;
            }
        };

        if let Err(e) = self
            .mailer
            .send_payment_success_to_customer(&booking, payment.price)
            .await
        {
            tracing::error!(payment_id = %payment.id, error = %e, "Customer confirmation mail failed");
        }
        if let Err(e) = self
            .mailer
            .send_payment_success_to_operator(&booking, payment.price)
            .await
        {
            tracing::error!(payment_id = %payment.id, error = %e, "Operator notification mail failed");
        }
    }

    async fn correlation(&self, token: &CorrelationToken) -> Result<CorrelationRecord> {
        self.ledger
            .correlation(token)
            .await?
            .ok_or(PaymentError::UnknownToken)
    }

    async fn load_payment(&self, id: PaymentId) -> Result<Payment> {
        self.ledger
            .payment(id)
            .await?
            .ok_or(PaymentError::PaymentNotFound(id))
    }

    async fn discard_booking(&self, id: BookingId) {
        if let Err(e) = self.bookings.discard(id).await {
            tracing::error!(booking_id = %id, error = %e, "Failed to discard booking");
        }
    }

    async fn release_capture(&self, id: PaymentId) {
        if let Err(e) = self.ledger.release_capture(id).await {
            tracing::warn!(payment_id = %id, error = %e, "Failed to release capture lease");
        }
    }
}
