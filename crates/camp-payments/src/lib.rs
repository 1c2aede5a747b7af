//! # camp-payments
//!
//! Payment lifecycle for kids camp bookings.
//!
//! ## Flow
//!
//! The payer is sent to the gateway's hosted payment page and comes back to
//! the camp site, which then asks this crate to settle the payment.
//!
//! ```text
//! ┌─────────────┐  initiate  ┌─────────────────┐  redirect  ┌─────────────┐
//! │  Camp Site  │───────────▶│  Saferpay Hosted │──────────▶│  Camp Site  │
//! │  (booking)  │            │  Payment Page    │            │  (return)   │
//! └─────────────┘            └─────────────────┘            └──────┬──────┘
//!                                     │ fail notify                │ finalize
//!                                     ▼                            ▼
//!                              mark_failed ──▶ CANCELED    status ─▶ capture ─▶ CAPTURED
//! ```
//!
//! A [`CorrelationToken`] ties the return and fail URLs to one payment. The
//! [`PaymentLedger`] applies every status change conditionally, so finalize
//! can be retried and raced without capturing twice.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use camp_payments::{PaymentOrchestrator, SaferpayClient, MemoryLedger, LogMailer};
//!
//! let orchestrator = PaymentOrchestrator::new(
//!     bookings,
//!     Arc::new(MemoryLedger::new()),
//!     Arc::new(SaferpayClient::from_env()?),
//!     Arc::new(LogMailer::new("camp@example.ch")),
//!     OrchestratorConfig::default(),
//! );
//!
//! let initiated = orchestrator.initiate(request).await?;
//! // Redirect payer to: initiated.redirect_url
//!
//! let outcome = orchestrator.finalize(&token).await?;
//! println!("{}", outcome.message());
//! ```

mod error;
pub mod gateway;
mod ledger;
mod notify;
mod orchestrator;
mod payment;
mod token;

pub use error::{PaymentError, Result};
pub use gateway::{
    CaptureReceipt, CreateTransaction, CreatedTransaction, GatewayCall, GatewayError,
    GatewayFailure, MockGateway, PaymentGateway, SaferpayClient, SaferpayConfig,
    TransactionState,
};
pub use ledger::{MemoryLedger, NewCorrelation, PaymentLedger, StatusUpdate};
pub use notify::{
    customer_confirmation, operator_notice, LogMailer, MailMessage, Mailer, MemoryOutbox,
    NotifyError,
};
pub use orchestrator::{
    FinalizeOutcome, Initiated, OrchestratorConfig, PaymentOrchestrator, PollConfig,
    ABORT_MESSAGE, PENDING_MESSAGE, SUCCESS_MESSAGE,
};
pub use payment::{Payment, PaymentId, TransactionStatus};
pub use token::{CorrelationRecord, CorrelationToken};
