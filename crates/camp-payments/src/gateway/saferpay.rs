//! Saferpay JSON API client
//!
//! Implements the payment page flow:
//! `PaymentPage/Initialize` → `PaymentPage/Assert` → `Transaction/Capture`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{
    CaptureReceipt, CreateTransaction, CreatedTransaction, GatewayError, GatewayFailure,
    GatewayResult, PaymentGateway, TransactionState,
};
use crate::error::{PaymentError, Result};
use crate::payment::TransactionStatus;

const SPEC_VERSION: &str = "1.33";
const DEFAULT_BASE_URL: &str = "https://test.saferpay.com/api";
const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Saferpay connection settings
#[derive(Clone, Debug)]
pub struct SaferpayConfig {
    /// API root, e.g. `https://www.saferpay.com/api`
    pub base_url: String,

    pub customer_id: String,
    pub terminal_id: String,

    /// JSON API basic-auth user
    pub api_user: String,
    pub api_password: String,

    /// Upper bound for every call
    pub timeout: Duration,

    pub currency: String,

    /// Payment page language
    pub language: String,
}

impl SaferpayConfig {
    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let required = |name: &str| {
            std::env::var(name).map_err(|_| PaymentError::Config(format!("{name} not set")))
        };

        let timeout_secs = std::env::var("SAFERPAY_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Ok(Self {
            base_url: std::env::var("SAFERPAY_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.into()),
            customer_id: required("SAFERPAY_CUSTOMER_ID")?,
            terminal_id: required("SAFERPAY_TERMINAL_ID")?,
            api_user: required("SAFERPAY_API_USER")?,
            api_password: required("SAFERPAY_API_PASSWORD")?,
            timeout: Duration::from_secs(timeout_secs),
            currency: std::env::var("SAFERPAY_CURRENCY").unwrap_or_else(|_| "CHF".into()),
            language: std::env::var("SAFERPAY_LANGUAGE").unwrap_or_else(|_| "de".into()),
        })
    }
}

/// Saferpay client wrapper
pub struct SaferpayClient {
    http: reqwest::Client,
    config: SaferpayConfig,
}

impl SaferpayClient {
    pub fn new(config: SaferpayConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaymentError::Config(format!("HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(SaferpayConfig::from_env()?)
    }

    fn request_header(&self) -> RequestHeader {
        RequestHeader {
            spec_version: SPEC_VERSION.into(),
            customer_id: self.config.customer_id.clone(),
            request_id: uuid::Uuid::new_v4().to_string(),
            retry_indicator: 0,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> GatewayResult<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let response = self
            .http
            .post(self.url(path))
            .basic_auth(&self.config.api_user, Some(&self.config.api_password))
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    value.to_str().unwrap_or("<binary>").to_string(),
                )
            })
            .collect();
        let text = response.text().await.map_err(|e| self.transport_error(&e))?;

        if status.is_success() {
            serde_json::from_str(&text).map_err(|e| GatewayError::Decode(format!("{path}: {e}")))
        } else {
            Err(GatewayError::from_failure(parse_failure(
                status.as_u16(),
                headers,
                text,
            )))
        }
    }

    fn transport_error(&self, err: &reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout(self.config.timeout)
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}

/// Build failure diagnostics from an error response
fn parse_failure(status: u16, headers: Vec<(String, String)>, body: String) -> GatewayFailure {
    let parsed: Option<ErrorResponse> = serde_json::from_str(&body).ok();
    let (error_name, message) = parsed.map_or((None, None), |e| (e.error_name, e.error_message));

    GatewayFailure {
        http_status: Some(status),
        error_name,
        message,
        body,
        headers,
    }
}

#[async_trait]
impl PaymentGateway for SaferpayClient {
    async fn create(&self, request: &CreateTransaction) -> GatewayResult<CreatedTransaction> {
        let body = InitializeRequest {
            request_header: self.request_header(),
            terminal_id: self.config.terminal_id.clone(),
            payment: PaymentBody {
                amount: AmountBody {
                    value: request.amount.minor_units().to_string(),
                    currency_code: self.config.currency.clone(),
                },
                order_id: request.order_id.clone(),
                description: request.description.clone(),
            },
            payer: PayerBody {
                language_code: self.config.language.clone(),
            },
            return_url: UrlBody {
                url: request.return_url.clone(),
            },
            notification: NotificationBody {
                payer_email: request.payer_email.clone(),
                fail_notify_url: request.fail_notify_url.clone(),
            },
        };

        let response: InitializeResponse = self.post("Payment/v1/PaymentPage/Initialize", &body).await?;
        tracing::debug!(order_id = %request.order_id, expiration = %response.expiration, "Saferpay payment page initialized");

        Ok(CreatedTransaction {
            redirect_url: response.redirect_url,
            token: response.token,
            expiration: response.expiration,
        })
    }

    async fn status(&self, token: &str) -> GatewayResult<TransactionState> {
        let body = AssertRequest {
            request_header: self.request_header(),
            token: token.to_string(),
        };

        let response: AssertResponse = self.post("Payment/v1/PaymentPage/Assert", &body).await?;

        Ok(TransactionState {
            status: response.transaction.status,
            transaction_id: Some(response.transaction.id),
        })
    }

    async fn capture(&self, transaction_id: &str) -> GatewayResult<CaptureReceipt> {
        let body = CaptureRequest {
            request_header: self.request_header(),
            transaction_reference: TransactionReference {
                transaction_id: transaction_id.to_string(),
            },
        };

        let response: CaptureResponse = self.post("Payment/v1/Transaction/Capture", &body).await?;

        Ok(CaptureReceipt {
            capture_id: response.capture_id,
            status: response.status,
            captured_at: response.date.unwrap_or_else(Utc::now),
        })
    }

    fn name(&self) -> &str {
        "Saferpay"
    }

    fn request_timeout(&self) -> Duration {
        self.config.timeout
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct RequestHeader {
    spec_version: String,
    customer_id: String,
    request_id: String,
    retry_indicator: u8,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct InitializeRequest {
    request_header: RequestHeader,
    terminal_id: String,
    payment: PaymentBody,
    payer: PayerBody,
    return_url: UrlBody,
    notification: NotificationBody,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct PaymentBody {
    amount: AmountBody,
    order_id: String,
    description: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct AmountBody {
    value: String,
    currency_code: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct PayerBody {
    language_code: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct UrlBody {
    url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct NotificationBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    payer_email: Option<String>,
    fail_notify_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InitializeResponse {
    token: String,
    expiration: DateTime<Utc>,
    redirect_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct AssertRequest {
    request_header: RequestHeader,
    token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AssertResponse {
    transaction: TransactionBody,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TransactionBody {
    status: TransactionStatus,
    id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct CaptureRequest {
    request_header: RequestHeader,
    transaction_reference: TransactionReference,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct TransactionReference {
    transaction_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CaptureResponse {
    #[serde(default)]
    capture_id: Option<String>,
    status: String,
    #[serde(default)]
    date: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorResponse {
    #[serde(default)]
    error_name: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
}
