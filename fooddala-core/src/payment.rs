use crate::api::OrderApi;
use crate::CoreResult;
use async_trait::async_trait;
use fooddala_shared::Money;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Processing,
    Succeeded,
    Failed,
}

/// What the payer claims to have paid, sent for verification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRequest {
    pub order_id: String,
    pub order_reference: String,
    pub amount: Money,
    pub transaction_ref: Option<String>,
}

#[async_trait]
pub trait PaymentVerifier: Send + Sync {
    /// Confirm whether the payment for an order has landed
    async fn verify(&self, request: &VerificationRequest) -> CoreResult<PaymentStatus>;
}

/// Asks the backend to verify the payment.
pub struct BackendVerifier {
    api: Arc<dyn OrderApi>,
}

impl BackendVerifier {
    pub fn new(api: Arc<dyn OrderApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl PaymentVerifier for BackendVerifier {
    async fn verify(&self, request: &VerificationRequest) -> CoreResult<PaymentStatus> {
        let verified = self.api.verify_payment(request).await?;
        Ok(if verified { PaymentStatus::Succeeded } else { PaymentStatus::Failed })
    }
}

/// Used when no verification backend is configured: reports success after a fixed delay.
pub struct SimulatedVerifier {
    delay: Duration,
}

impl SimulatedVerifier {
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(2);

    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for SimulatedVerifier {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DELAY)
    }
}

#[async_trait]
impl PaymentVerifier for SimulatedVerifier {
    async fn verify(&self, request: &VerificationRequest) -> CoreResult<PaymentStatus> {
        tracing::debug!("Simulating verification for {} ({})", request.order_reference, request.amount);
        tokio::time::sleep(self.delay).await;
        Ok(PaymentStatus::Succeeded)
    }
}
