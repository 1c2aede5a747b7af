//! Payment Notifications
//!
//! Confirmation mails for captured payments. Delivery problems are reported
//! to the caller but never undo a payment.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

use camp_booking::{Amount, BookingSummary};

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Mail delivery failed: {0}")]
    Delivery(String),
}

/// A rendered mail
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Mail transport trait
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Confirmation for the customer
    async fn send_payment_success_to_customer(
        &self,
        booking: &BookingSummary,
        price: Amount,
    ) -> Result<(), NotifyError>;

    /// Notice for the camp operator
    async fn send_payment_success_to_operator(
        &self,
        booking: &BookingSummary,
        price: Amount,
    ) -> Result<(), NotifyError>;
}

fn booking_details(booking: &BookingSummary, price: Amount) -> String {
    let mut details = String::new();
    let _ = writeln!(details, "Kinder:");
    for child in &booking.children {
        let _ = writeln!(details, "  - {} {}", child.first_name, child.last_name);
        if let Some(notes) = &child.notes {
            let _ = writeln!(details, "    Hinweise: {notes}");
        }
    }
    let _ = writeln!(details, "Wochen:");
    for week in booking.weeks() {
        let days: Vec<String> = week.days.iter().map(ToString::to_string).collect();
        let _ = writeln!(details, "  - {} {}: {}", week.name, week.year, days.join(", "));
    }
    let _ = writeln!(details, "Betrag: {price}");
    details
}

pub fn customer_confirmation(booking: &BookingSummary, price: Amount) -> MailMessage {
    MailMessage {
        to: booking.customer.email.clone(),
        subject: "Buchungsbestätigung Kids Camp".into(),
        body: format!(
            "Hallo {}\n\nVielen Dank für Ihre Buchung. Wir haben Ihre Zahlung erhalten.\n\n{}",
            booking.customer.first_name,
            booking_details(booking, price)
        ),
    }
}

pub fn operator_notice(booking: &BookingSummary, price: Amount, operator: &str) -> MailMessage {
    MailMessage {
        to: operator.to_string(),
        subject: format!("Neue Buchung: {}", booking.customer.full_name()),
        body: format!(
            "Kunde: {} <{}>\nBuchung: {}\n\n{}",
            booking.customer.full_name(),
            booking.customer.email,
            booking.booking.id,
            booking_details(booking, price)
        ),
    }
}

/// Writes mails to the log instead of sending them
pub struct LogMailer {
    operator: String,
}

impl LogMailer {
    pub fn new(operator: impl Into<String>) -> Self {
        Self {
            operator: operator.into(),
        }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send_payment_success_to_customer(
        &self,
        booking: &BookingSummary,
        price: Amount,
    ) -> Result<(), NotifyError> {
        let mail = customer_confirmation(booking, price);
        tracing::info!(to = %mail.to, subject = %mail.subject, body = %mail.body, "Customer mail");
        Ok(())
    }

    async fn send_payment_success_to_operator(
        &self,
        booking: &BookingSummary,
        price: Amount,
    ) -> Result<(), NotifyError> {
        let mail = operator_notice(booking, price, &self.operator);
        tracing::info!(to = %mail.to, subject = %mail.subject, body = %mail.body, "Operator mail");
        Ok(())
    }
}

/// Keeps sent mails in memory (for tests)
pub struct MemoryOutbox {
    operator: String,
    sent: Mutex<Vec<MailMessage>>,
    failing: AtomicBool,
}

impl MemoryOutbox {
    pub fn new(operator: impl Into<String>) -> Self {
        Self {
            operator: operator.into(),
            sent: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// Make every following delivery fail
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().await.clone()
    }

    async fn deliver(&self, mail: MailMessage) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Delivery(format!("refusing mail to {}", mail.to)));
        }
        self.sent.lock().await.push(mail);
        Ok(())
    }
}

#[async_trait]
impl Mailer for MemoryOutbox {
    async fn send_payment_success_to_customer(
        &self,
        booking: &BookingSummary,
        price: Amount,
    ) -> Result<(), NotifyError> {
        self.deliver(customer_confirmation(booking, price)).await
    }

    async fn send_payment_success_to_operator(
        &self,
        booking: &BookingSummary,
        price: Amount,
    ) -> Result<(), NotifyError> {
        self.deliver(operator_notice(booking, price, &self.operator)).await
    }
}
