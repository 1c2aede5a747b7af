//! HTTP Handlers

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use camp_booking::BookingRequest;
use camp_payments::{CorrelationToken, PaymentError, PaymentOrchestrator};

use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub gateway: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct CreatePaymentResponse {
    #[serde(rename = "redirectURL")]
    pub redirect_url: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    #[serde(rename = "customToken")]
    pub custom_token: Option<String>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>, code: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            message: message.into(),
            code: code.into(),
        }),
    )
}

fn payments(state: &AppState) -> Result<&Arc<PaymentOrchestrator>, ApiError> {
    state.payments.as_ref().ok_or_else(|| {
        api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Payments not configured",
            "PAYMENTS_DISABLED",
        )
    })
}

fn payment_error(e: &PaymentError, code: &str) -> ApiError {
    let status = if e.is_client_error() {
        tracing::warn!("Rejected booking: {}", e);
        StatusCode::BAD_REQUEST
    } else if matches!(e, PaymentError::UnknownToken) {
        tracing::warn!("Unknown payment token");
        StatusCode::NOT_FOUND
    } else {
        tracing::error!("Payment error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    };

    api_error(status, e.user_message(), code)
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        gateway: state
            .payments
            .as_ref()
            .map(|payments| payments.gateway_name().to_string()),
    })
}

/// Store a booking and start its payment
pub async fn create_payment(
    State(state): State<AppState>,
    payload: Result<Json<BookingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatePaymentResponse>), ApiError> {
    let payments = payments(&state)?;

    let Json(request) = payload.map_err(|rejection| {
        tracing::warn!("Malformed booking: {}", rejection.body_text());
        api_error(StatusCode::BAD_REQUEST, rejection.body_text(), "INVALID_BOOKING")
    })?;

    let initiated = payments
        .initiate(request)
        .await
        .map_err(|e| payment_error(&e, "PAYMENT_INIT_ERROR"))?;

    if let Some(poll) = &state.poll {
        payments.spawn_poll(initiated.token.clone(), poll.clone());
    }

    Ok((
        StatusCode::CREATED,
        Json(CreatePaymentResponse {
            redirect_url: initiated.redirect_url,
        }),
    ))
}

/// Settle the payment after the payer returned from the payment page
pub async fn finalize_payment(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<MessageResponse>, ApiError> {
    let payments = payments(&state)?;

    let token = query
        .custom_token
        .map(CorrelationToken::from_string)
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "customToken is required", "MISSING_TOKEN"))?;

    let outcome = payments
        .finalize(&token)
        .await
        .map_err(|e| payment_error(&e, "PAYMENT_FINALIZE_ERROR"))?;

    Ok(Json(MessageResponse {
        message: outcome.message().into(),
    }))
}

/// Gateway fail notification
///
/// Always acknowledged, the gateway does not act on our answer.
pub async fn payment_failed(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> StatusCode {
    let (Some(payments), Some(token)) = (state.payments.as_ref(), query.custom_token) else {
        tracing::warn!("Ignoring fail notification without payments or token");
        return StatusCode::OK;
    };

    if let Err(e) = payments.mark_failed(&CorrelationToken::from_string(token)).await {
        match e {
            PaymentError::UnknownToken => tracing::warn!("Fail notification for unknown token"),
            e => tracing::error!("Failed to mark payment as failed: {}", e),
        }
    }

    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, Response},
    };
    use camp_booking::MemoryBookingStore;
    use camp_payments::{
        GatewayCall, LogMailer, MemoryLedger, MockGateway, OrchestratorConfig, ABORT_MESSAGE,
        SUCCESS_MESSAGE,
    };
    use tower::ServiceExt;

    fn booking_json() -> serde_json::Value {
        serde_json::json!({
            "customer": {
                "firstName": "Anna",
                "lastName": "Muster",
                "email": "anna@example.ch"
            },
            "children": [{ "firstName": "Lia", "lastName": "Muster" }],
            "bookedWeeks": [
                { "name": "summerFirstWeek", "maxDays": 5, "bookedDays": ["monday", "tuesday", "wednesday"] }
            ]
        })
    }

    fn state_with(gateway: Arc<MockGateway>) -> AppState {
        let orchestrator = PaymentOrchestrator::new(
            Arc::new(MemoryBookingStore::new()),
            Arc::new(MemoryLedger::new()),
            gateway,
            Arc::new(LogMailer::new("camp@example.ch")),
            OrchestratorConfig {
                season_year: Some(2025),
                ..Default::default()
            },
        );

        AppState {
            payments: Some(Arc::new(orchestrator)),
            poll: None,
        }
    }

    async fn send(state: AppState, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response: Response<Body> = crate::app(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_payment_returns_redirect() {
        let state = state_with(Arc::new(MockGateway::new()));
        let (status, body) = send(state, post_json("/payment", &booking_json())).await;

        assert_eq!(status, StatusCode::CREATED);
        assert!(body["redirectURL"]
            .as_str()
            .unwrap()
            .starts_with("https://mock-gateway.local/pay/"));
    }

    #[tokio::test]
    async fn test_create_payment_rejects_invalid_booking() {
        let mut booking = booking_json();
        booking["children"] = serde_json::json!([]);

        let state = state_with(Arc::new(MockGateway::new()));
        let (status, body) = send(state, post_json("/payment", &booking)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "PAYMENT_INIT_ERROR");
        assert!(body["message"].as_str().unwrap().contains("children"));
    }

    #[tokio::test]
    async fn test_create_payment_rejects_malformed_body() {
        let state = state_with(Arc::new(MockGateway::new()));
        let (status, body) = send(
            state,
            post_json("/payment", &serde_json::json!({ "customer": "nobody" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_BOOKING");
    }

    #[tokio::test]
    async fn test_create_payment_gateway_failure_is_internal_error() {
        let gateway = Arc::new(MockGateway::new());
        gateway
            .fail_next(
                GatewayCall::Create,
                camp_payments::GatewayError::Transport("connection refused".into()),
            )
            .await;

        let (status, body) = send(state_with(gateway), post_json("/payment", &booking_json())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal server error");
    }

    #[tokio::test]
    async fn test_finalize_captures_and_is_idempotent() {
        let gateway = Arc::new(MockGateway::new());
        let state = state_with(gateway.clone());
        let request: BookingRequest = serde_json::from_value(booking_json()).unwrap();
        let initiated = state
            .payments
            .as_ref()
            .unwrap()
            .initiate(request)
            .await
            .unwrap();
        let uri = format!("/payment/finalize?customToken={}", initiated.token);

        for _ in 0..2 {
            let (status, body) = send(
                state.clone(),
                Request::get(uri.as_str()).body(Body::empty()).unwrap(),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["message"], SUCCESS_MESSAGE);
        }
        assert_eq!(gateway.calls(GatewayCall::Capture), 1);
    }

    #[tokio::test]
    async fn test_finalize_after_fail_notification_reports_abort() {
        let state = state_with(Arc::new(MockGateway::new()));
        let request: BookingRequest = serde_json::from_value(booking_json()).unwrap();
        let initiated = state
            .payments
            .as_ref()
            .unwrap()
            .initiate(request)
            .await
            .unwrap();

        let failed = format!("/payment/failed?customToken={}", initiated.token);
        let (status, _) = send(
            state.clone(),
            Request::post(failed.as_str()).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let finalize = format!("/payment/finalize?customToken={}", initiated.token);
        let (status, body) = send(
            state,
            Request::get(finalize.as_str()).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], ABORT_MESSAGE);
    }

    #[tokio::test]
    async fn test_finalize_unknown_token_is_not_found() {
        let state = state_with(Arc::new(MockGateway::new()));
        let (status, _) = send(
            state,
            Request::get("/payment/finalize?customToken=deadbeef")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_payment_failed_always_ok() {
        let state = state_with(Arc::new(MockGateway::new()));
        let (status, body) = send(
            state,
            Request::post("/payment/failed?customToken=deadbeef")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.is_null());
    }

    #[tokio::test]
    async fn test_payments_disabled() {
        let state = AppState {
            payments: None,
            poll: None,
        };
        let (status, body) = send(state.clone(), post_json("/payment", &booking_json())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["code"], "PAYMENTS_DISABLED");

        let (status, body) = send(state, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["gateway"].is_null());
    }
}
