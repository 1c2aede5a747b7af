//! Correlation Tokens
//!
//! A correlation token travels through the payer's browser (return and fail
//! URLs) and leads back to exactly one payment. It is generated locally so
//! the gateway's own token never leaves the server.

use chrono::{DateTime, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::payment::PaymentId;

/// Random hex token (16 bytes from the OS CSPRNG)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationToken(String);

impl CorrelationToken {
    /// Bytes of entropy per token
    pub const BYTES: usize = 16;

    pub fn generate() -> Self {
        let mut bytes = [0u8; Self::BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Wrap a token received from a client, as-is
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Binding of a correlation token to its payment and gateway transaction
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CorrelationRecord {
    pub token: CorrelationToken,

    pub payment_id: PaymentId,

    /// The gateway's token for the payment page transaction
    pub gateway_token: String,

    /// When the gateway stops accepting the token
    pub expires_at: DateTime<Utc>,

    pub created_at: DateTime<Utc>,
}

impl CorrelationRecord {
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_token_generation() {
        let token = CorrelationToken::generate();
        assert_eq!(token.as_str().len(), CorrelationToken::BYTES * 2);
        assert!(token.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_tokens_are_unique() {
        let tokens: HashSet<_> = (0..1000).map(|_| CorrelationToken::generate()).collect();
        assert_eq!(tokens.len(), 1000);
    }

    #[test]
    fn test_from_string_keeps_value() {
        let token = CorrelationToken::from_string("ABCdef");
        assert_eq!(token.as_str(), "ABCdef");
        assert_ne!(token, CorrelationToken::from_string("abcdef"));
    }
}
