//! Mock Payment Gateway
//!
//! For local development and tests. Transactions live in memory, every new
//! transaction starts in a configurable status, and errors can be queued per
//! call.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::{
    CaptureReceipt, CreateTransaction, CreatedTransaction, GatewayError, GatewayFailure,
    GatewayResult, PaymentGateway, TransactionState,
};
use crate::payment::TransactionStatus;

/// Gateway operation, for call counting and error injection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GatewayCall {
    Create,
    Status,
    Capture,
}

#[derive(Default)]
struct MockState {
    /// Status per gateway token
    transactions: HashMap<String, TransactionStatus>,
    failures: HashMap<GatewayCall, VecDeque<GatewayError>>,
}

/// In-memory gateway
pub struct MockGateway {
    state: Mutex<MockState>,
    initial_status: TransactionStatus,
    latency: Duration,
    creates: AtomicUsize,
    statuses: AtomicUsize,
    captures: AtomicUsize,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    /// Payers authorize immediately
    pub fn new() -> Self {
        Self::with_initial_status(TransactionStatus::Authorized)
    }

    pub fn with_initial_status(initial_status: TransactionStatus) -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            initial_status,
            latency: Duration::ZERO,
            creates: AtomicUsize::new(0),
            statuses: AtomicUsize::new(0),
            captures: AtomicUsize::new(0),
        }
    }

    /// Delay every call (to widen race windows in tests)
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Override the status of a transaction
    pub async fn set_status(&self, token: &str, status: TransactionStatus) {
        self.state
            .lock()
            .await
            .transactions
            .insert(token.to_string(), status);
    }

    /// Make the next `call` fail with `error`
    pub async fn fail_next(&self, call: GatewayCall, error: GatewayError) {
        self.state
            .lock()
            .await
            .failures
            .entry(call)
            .or_default()
            .push_back(error);
    }

    /// How often `call` was invoked
    pub fn calls(&self, call: GatewayCall) -> usize {
        let counter = match call {
            GatewayCall::Create => &self.creates,
            GatewayCall::Status => &self.statuses,
            GatewayCall::Capture => &self.captures,
        };
        counter.load(Ordering::SeqCst)
    }

    async fn enter(&self, call: GatewayCall) -> GatewayResult<()> {
        let counter = match call {
            GatewayCall::Create => &self.creates,
            GatewayCall::Status => &self.statuses,
            GatewayCall::Capture => &self.captures,
        };
        counter.fetch_add(1, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let mut state = self.state.lock().await;
        match state.failures.get_mut(&call).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn transaction_id(token: &str) -> String {
    format!("txn-{token}")
}

fn unknown(name: &str, message: String) -> GatewayError {
    GatewayError::Rejected(GatewayFailure {
        http_status: Some(400),
        error_name: Some(name.into()),
        message: Some(message.clone()),
        body: format!(r#"{{"ErrorName":"{name}","ErrorMessage":"{message}"}}"#),
        headers: Vec::new(),
    })
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create(&self, request: &CreateTransaction) -> GatewayResult<CreatedTransaction> {
        self.enter(GatewayCall::Create).await?;

        let token = format!("mock-{}", uuid::Uuid::new_v4().simple());
        self.state
            .lock()
            .await
            .transactions
            .insert(token.clone(), self.initial_status);

        tracing::info!(
            order_id = %request.order_id,
            amount = request.amount.minor_units(),
            token = %token,
            "Mock payment page created"
        );

        Ok(CreatedTransaction {
            redirect_url: format!("https://mock-gateway.local/pay/{token}"),
            token,
            expiration: Utc::now() + chrono::Duration::hours(1),
        })
    }

    async fn status(&self, token: &str) -> GatewayResult<TransactionState> {
        self.enter(GatewayCall::Status).await?;

        let state = self.state.lock().await;
        let status = state
            .transactions
            .get(token)
            .copied()
            .ok_or_else(|| unknown("TOKEN_INVALID", format!("Unknown token {token}")))?;

        Ok(TransactionState {
            status,
            transaction_id: matches!(
                status,
                TransactionStatus::Authorized | TransactionStatus::Captured
            )
            .then(|| transaction_id(token)),
        })
    }

    async fn capture(&self, transaction_id: &str) -> GatewayResult<CaptureReceipt> {
        self.enter(GatewayCall::Capture).await?;

        let mut state = self.state.lock().await;
        let status = transaction_id
            .strip_prefix("txn-")
            .and_then(|token| state.transactions.get_mut(token))
            .ok_or_else(|| {
                unknown(
                    "TRANSACTION_NOT_FOUND",
                    format!("Unknown transaction {transaction_id}"),
                )
            })?;

        if *status != TransactionStatus::Authorized {
            return Err(unknown(
                "TRANSACTION_IN_WRONG_STATE",
                format!("Transaction {transaction_id} is {status}"),
            ));
        }
        *status = TransactionStatus::Captured;

        Ok(CaptureReceipt {
            capture_id: Some(format!("{transaction_id}-capture")),
            status: TransactionStatus::Captured.as_str().into(),
            captured_at: Utc::now(),
        })
    }

    fn name(&self) -> &str {
        "MockGateway"
    }

    fn request_timeout(&self) -> Duration {
        self.latency
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camp_booking::Amount;

    fn request() -> CreateTransaction {
        CreateTransaction {
            amount: Amount::from_major(225),
            order_id: "order-1".into(),
            description: "Kids Camp".into(),
            payer_email: None,
            return_url: "https://camp.local/return".into(),
            fail_notify_url: "https://camp.local/failed".into(),
        }
    }

    #[tokio::test]
    async fn test_mock_authorize_and_capture() {
        let gateway = MockGateway::new();
        let created = gateway.create(&request()).await.unwrap();

        let state = gateway.status(&created.token).await.unwrap();
        assert_eq!(state.status, TransactionStatus::Authorized);

        let txn = state.transaction_id.unwrap();
        gateway.capture(&txn).await.unwrap();
        assert_eq!(
            gateway.status(&created.token).await.unwrap().status,
            TransactionStatus::Captured
        );

        // a second capture is refused, as by the real gateway
        assert!(gateway.capture(&txn).await.is_err());
        assert_eq!(gateway.calls(GatewayCall::Capture), 2);
    }

    #[tokio::test]
    async fn test_mock_injected_failure_is_consumed() {
        let gateway = MockGateway::new();
        gateway
            .fail_next(GatewayCall::Create, GatewayError::Transport("connection reset".into()))
            .await;

        assert!(gateway.create(&request()).await.is_err());
        assert!(gateway.create(&request()).await.is_ok());
        assert_eq!(gateway.calls(GatewayCall::Create), 2);
    }

    #[tokio::test]
    async fn test_mock_unknown_token() {
        let gateway = MockGateway::new();
        let err = gateway.status("nope").await.unwrap_err();
        assert_eq!(err.error_name(), Some("TOKEN_INVALID"));
    }
}
