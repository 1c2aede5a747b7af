//! Application State

use std::sync::Arc;

use camp_payments::{PaymentOrchestrator, PollConfig};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Payment orchestrator (optional - None if no gateway is configured)
    pub payments: Option<Arc<PaymentOrchestrator>>,

    /// Background status polling after initiate
    pub poll: Option<PollConfig>,
}
