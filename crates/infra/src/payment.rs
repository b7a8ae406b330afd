//! Payment gateway port.
//!
//! The processor's intent lifecycle is an external concern; this boundary
//! only creates intents at checkout and receives terminal outcomes via the
//! webhook (see the checkout service).

use async_trait::async_trait;
use thiserror::Error;

use shopforge_core::OrderId;

/// Handle returned by the processor for an asynchronous payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    pub intent_id: String,
    /// Opaque handle the client uses to complete the payment.
    pub client_secret: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaymentError {
    #[error("payment gateway rejected the request: {0}")]
    Rejected(String),

    #[error("payment gateway unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a payment intent for an order total (smallest currency unit).
    async fn create_intent(
        &self,
        order_id: OrderId,
        amount: u64,
    ) -> Result<PaymentIntent, PaymentError>;
}

/// Deterministic gateway for dev/test: derives the intent from the order id.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockPaymentGateway;

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_intent(
        &self,
        order_id: OrderId,
        amount: u64,
    ) -> Result<PaymentIntent, PaymentError> {
        if amount == 0 {
            return Err(PaymentError::Rejected("amount must be positive".to_string()));
        }
        Ok(PaymentIntent {
            intent_id: format!("pi_{order_id}"),
            client_secret: format!("cs_{order_id}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_gateway_is_deterministic() {
        let gateway = MockPaymentGateway;
        let order_id = OrderId::new();
        let first = gateway.create_intent(order_id, 10_000).await.unwrap();
        let second = gateway.create_intent(order_id, 10_000).await.unwrap();
        assert_eq!(first, second);
        assert!(first.intent_id.starts_with("pi_"));
    }

    #[tokio::test]
    async fn mock_gateway_rejects_zero_amount() {
        let gateway = MockPaymentGateway;
        assert!(matches!(
            gateway.create_intent(OrderId::new(), 0).await.unwrap_err(),
            PaymentError::Rejected(_)
        ));
    }
}
