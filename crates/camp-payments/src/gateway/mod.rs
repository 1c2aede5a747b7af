//! Payment Gateway Integration
//!
//! The gateway runs a two-phase charge: the payer authorizes on a hosted
//! payment page, we capture afterwards.
//!
//! ```text
//! create ──▶ payer on payment page ──▶ status (assert) ──▶ capture
//!                    │
//!                    └── payer aborts ──▶ TRANSACTION_ABORTED
//! ```
//!
//! None of the calls retry on their own; callers decide.

mod mock;
mod saferpay;

pub use mock::{GatewayCall, MockGateway};
pub use saferpay::{SaferpayClient, SaferpayConfig};

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use camp_booking::Amount;

use crate::payment::TransactionStatus;

/// Error name the gateway reports when the payer cancelled the payment page
pub const TRANSACTION_ABORTED: &str = "TRANSACTION_ABORTED";

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Request to open a payment page transaction
#[derive(Clone, Debug)]
pub struct CreateTransaction {
    /// Amount to authorize
    pub amount: Amount,

    /// Merchant reference shown in the gateway backoffice
    pub order_id: String,

    pub description: String,

    /// Payer address for gateway receipts
    pub payer_email: Option<String>,

    /// Where the payer's browser returns after the payment page
    pub return_url: String,

    /// Called by the gateway when the transaction fails
    pub fail_notify_url: String,
}

/// An opened payment page transaction
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreatedTransaction {
    /// URL to redirect the payer to
    pub redirect_url: String,

    /// Gateway token for later status queries
    pub token: String,

    pub expiration: DateTime<Utc>,
}

/// Current state of a transaction
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionState {
    pub status: TransactionStatus,
    pub transaction_id: Option<String>,
}

/// Result of a capture
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CaptureReceipt {
    pub capture_id: Option<String>,

    /// Gateway status string, e.g. `CAPTURED`
    pub status: String,

    pub captured_at: DateTime<Utc>,
}

/// Diagnostics of an error response from the gateway
#[derive(Clone, Debug, Default)]
pub struct GatewayFailure {
    pub http_status: Option<u16>,

    /// Machine-readable error name, e.g. `TRANSACTION_ABORTED`
    pub error_name: Option<String>,

    pub message: Option<String>,

    /// Raw response body
    pub body: String,

    /// Raw response headers
    pub headers: Vec<(String, String)>,
}

impl std::fmt::Display for GatewayFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error_name.as_deref().unwrap_or("UNKNOWN"))?;
        if let Some(status) = self.http_status {
            write!(f, " (HTTP {status})")?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        Ok(())
    }
}

/// Gateway errors
///
/// `Aborted` is an expected outcome (the payer walked away), everything
/// else is a failure of the call itself.
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    #[error("Transaction aborted: {0}")]
    Aborted(GatewayFailure),

    #[error("Gateway rejected request: {0}")]
    Rejected(GatewayFailure),

    #[error("Gateway timed out after {0:?}")]
    Timeout(Duration),

    #[error("Gateway transport error: {0}")]
    Transport(String),

    #[error("Unexpected gateway response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Classify an error response by its error name
    pub fn from_failure(failure: GatewayFailure) -> Self {
        if failure.error_name.as_deref() == Some(TRANSACTION_ABORTED) {
            GatewayError::Aborted(failure)
        } else {
            GatewayError::Rejected(failure)
        }
    }

    pub fn is_abort(&self) -> bool {
        matches!(self, GatewayError::Aborted(_))
    }

    pub fn failure(&self) -> Option<&GatewayFailure> {
        match self {
            GatewayError::Aborted(f) | GatewayError::Rejected(f) => Some(f),
            _ => None,
        }
    }

    pub fn error_name(&self) -> Option<&str> {
        self.failure().and_then(|f| f.error_name.as_deref())
    }

    /// Log with the raw response attached
    pub fn log(&self, operation: &str) {
        match self.failure() {
            Some(failure) => tracing::error!(
                operation,
                error = %self,
                body = %failure.body,
                headers = ?failure.headers,
                "Gateway call failed"
            ),
            None => tracing::error!(operation, error = %self, "Gateway call failed"),
        }
    }
}

/// Payment gateway client trait
///
/// Implemented by [`SaferpayClient`] for the real thing and [`MockGateway`]
/// for local development and tests.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a payment page transaction
    async fn create(&self, request: &CreateTransaction) -> GatewayResult<CreatedTransaction>;

    /// Query the transaction behind a payment page token
    async fn status(&self, token: &str) -> GatewayResult<TransactionState>;

    /// Capture an authorized transaction
    async fn capture(&self, transaction_id: &str) -> GatewayResult<CaptureReceipt>;

    /// Gateway name
    fn name(&self) -> &str;

    /// Upper bound for a single gateway call
    fn request_timeout(&self) -> Duration;
}
