//! Payment Error Types

use thiserror::Error;

use camp_booking::BookingError;

use crate::gateway::GatewayError;
use crate::payment::PaymentId;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Payment gateway call failed
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Booking could not be validated, priced or stored
    #[error(transparent)]
    Booking(#[from] BookingError),

    /// No payment is bound to the correlation token
    #[error("Unknown correlation token")]
    UnknownToken,

    #[error("Payment not found: {0}")]
    PaymentNotFound(PaymentId),

    /// Authorized payment without a gateway transaction to capture
    #[error("Payment {0} is authorized but has no transaction id")]
    MissingTransactionId(PaymentId),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PaymentError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::Gateway(e) => !e.is_abort(),
            PaymentError::Storage(_) => true,
            _ => false,
        }
    }

    /// Whether the caller sent a bad booking
    pub fn is_client_error(&self) -> bool {
        matches!(self, PaymentError::Booking(e) if e.is_client_error())
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            PaymentError::Booking(e) if e.is_client_error() => e.to_string(),
            PaymentError::UnknownToken | PaymentError::PaymentNotFound(_) => {
                "Zahlung nicht gefunden.".into()
            }
            PaymentError::Config(_) => "Service configuration error.".into(),
            _ => "Internal server error".into(),
        }
    }
}
