//! Checkout / order finalizer.
//!
//! Converts a cart (or a single buy-now item) into an order, claims the
//! stock already held by the cart lines, and reconciles the claim against
//! terminal payment outcomes delivered by the processor's webhook.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use shopforge_cart::{CartLineItem, summarize, validate_quantity};
use shopforge_core::{DomainError, OrderId, Owner, ProductId, VariantId};
use shopforge_orders::{
    Order, OrderLine, OrderStatus, PaymentMethod, PaymentStatus, ShippingInfo,
    validate_status_transition,
};

use crate::cart_store::CartStore;
use crate::error::ServiceError;
use crate::order_store::OrderStore;
use crate::payment::{PaymentGateway, PaymentIntent};
use crate::stock_ledger::{StockLedger, reserve_with_retry};

/// Terminal outcome reported by the payment processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    Succeeded,
    Failed,
    Cancelled,
}

/// Whether a webhook delivery did work or was a recognized replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookDisposition {
    Processed,
    Ignored,
}

#[derive(Debug, Clone)]
pub struct CheckoutOutcome {
    pub order: Order,
    /// Client handle for asynchronous payment methods.
    pub payment: Option<PaymentIntent>,
}

pub struct CheckoutService {
    ledger: Arc<dyn StockLedger>,
    carts: Arc<dyn CartStore>,
    orders: Arc<dyn OrderStore>,
    gateway: Arc<dyn PaymentGateway>,
}

impl CheckoutService {
    pub fn new(
        ledger: Arc<dyn StockLedger>,
        carts: Arc<dyn CartStore>,
        orders: Arc<dyn OrderStore>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            ledger,
            carts,
            orders,
            gateway,
        }
    }

    /// Create an order from the owner's cart, claiming its reservations.
    ///
    /// A still-active hold transfers to the order as-is: its expiry is
    /// CAS-nulled so the sweep can no longer reclaim it, and the ledger is
    /// untouched. A hold the sweep already reclaimed is re-reserved
    /// atomically; if any re-reserve fails, every hold taken by this call is
    /// released and the checkout aborts with `InsufficientStock`.
    pub async fn create_order(
        &self,
        owner: &Owner,
        shipping: ShippingInfo,
        method: PaymentMethod,
        now: DateTime<Utc>,
    ) -> Result<CheckoutOutcome, ServiceError> {
        shipping.validate()?;

        let lines = self.carts.list_for_owner(owner).await?;
        if lines.is_empty() {
            return Err(DomainError::validation("cart is empty").into());
        }

        let mut held: Vec<(VariantId, i64)> = Vec::new();
        for line in &lines {
            let quantity = i64::from(line.quantity);
            let claimed = line.hold_active() && self.carts.clear_hold(line.id).await?;
            if !claimed {
                // The window lapsed (or the sweep won the race): take fresh
                // stock for this line.
                if let Err(err) =
                    reserve_with_retry(self.ledger.as_ref(), line.variant_id, quantity).await
                {
                    self.rollback_holds(&held).await;
                    return Err(err.into());
                }
            }
            held.push((line.variant_id, quantity));
        }

        let order_lines = lines
            .iter()
            .map(|line| OrderLine {
                product_id: line.product_id,
                variant_id: line.variant_id,
                quantity: line.quantity,
                unit_price: line.price_at_time,
            })
            .collect();

        let order = match Order::new(owner.clone(), shipping, method, order_lines, now) {
            Ok(order) => order,
            Err(err) => {
                self.rollback_holds(&held).await;
                return Err(err.into());
            }
        };

        let amount = summarize(&lines, 0).total;
        let outcome = match self.finalize(order, amount).await {
            Ok(outcome) => outcome,
            Err(err) => {
                self.rollback_holds(&held).await;
                return Err(err);
            }
        };

        if method == PaymentMethod::CashOnDelivery {
            // Synchronous settlement: the cart is consumed immediately. Card
            // payments keep the lines until the success webhook confirms.
            self.carts.delete_for_owner(owner).await?;
        }

        info!(
            order_id = %outcome.order.id,
            owner = %owner,
            lines = outcome.order.lines.len(),
            method = ?method,
            "order created from cart"
        );
        Ok(outcome)
    }

    /// Create a single-line order directly, bypassing the cart.
    ///
    /// The reservation and its claim happen in the same call; no cart line
    /// ever exists, so neither the sweep nor the cart surface can see it.
    pub async fn buy_now(
        &self,
        owner: &Owner,
        product_id: ProductId,
        variant_id: VariantId,
        quantity: u32,
        shipping: ShippingInfo,
        method: PaymentMethod,
        now: DateTime<Utc>,
    ) -> Result<CheckoutOutcome, ServiceError> {
        validate_quantity(quantity)?;
        shipping.validate()?;

        let variant = reserve_with_retry(self.ledger.as_ref(), variant_id, i64::from(quantity))
            .await
            .map_err(ServiceError::from)?;
        let held = vec![(variant_id, i64::from(quantity))];
        if variant.product_id != product_id {
            self.rollback_holds(&held).await;
            return Err(DomainError::validation("variant does not belong to product").into());
        }

        let order_lines = vec![OrderLine {
            product_id,
            variant_id,
            quantity,
            unit_price: variant.price,
        }];
        let order = match Order::new(owner.clone(), shipping, method, order_lines, now) {
            Ok(order) => order,
            Err(err) => {
                self.rollback_holds(&held).await;
                return Err(err.into());
            }
        };

        // Price the single line with the same rules as a cart checkout.
        let pricing_line = CartLineItem::new(
            owner.clone(),
            product_id,
            variant_id,
            quantity,
            variant.price,
            now,
        )?;
        let amount = summarize(std::slice::from_ref(&pricing_line), 0).total;

        let outcome = match self.finalize(order, amount).await {
            Ok(outcome) => outcome,
            Err(err) => {
                self.rollback_holds(&held).await;
                return Err(err);
            }
        };

        info!(order_id = %outcome.order.id, owner = %owner, %variant_id, quantity, "buy-now order created");
        Ok(outcome)
    }

    /// Reconcile a terminal payment outcome. At-least-once delivery is
    /// assumed: a replay is answered as a success no-op.
    pub async fn payment_webhook(
        &self,
        order_id: OrderId,
        outcome: PaymentOutcome,
    ) -> Result<WebhookDisposition, ServiceError> {
        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or(DomainError::NotFound)?;

        match outcome {
            PaymentOutcome::Succeeded => {
                if !self
                    .orders
                    .transition_payment(order_id, PaymentStatus::Pending, PaymentStatus::Paid)
                    .await?
                {
                    info!(%order_id, "replayed payment-success webhook ignored");
                    return Ok(WebhookDisposition::Ignored);
                }
                // The claim already consumed the stock; only the cart lines
                // that fed this order are cleaned up.
                self.consume_cart_lines(&order).await?;
                info!(%order_id, "payment confirmed");
                Ok(WebhookDisposition::Processed)
            }
            PaymentOutcome::Failed | PaymentOutcome::Cancelled => {
                if !self
                    .orders
                    .transition_payment(order_id, PaymentStatus::Pending, PaymentStatus::Failed)
                    .await?
                {
                    info!(%order_id, "replayed payment-failure webhook ignored");
                    return Ok(WebhookDisposition::Ignored);
                }
                self.release_order_lines(&order).await?;
                if !self
                    .orders
                    .transition_status(order_id, order.status, OrderStatus::Cancelled)
                    .await?
                {
                    warn!(%order_id, "order status moved concurrently; not cancelled here");
                }
                info!(%order_id, ?outcome, "payment failed; reservations released");
                Ok(WebhookDisposition::Processed)
            }
        }
    }

    /// Admin-driven status transition.
    ///
    /// Cancelling an unpaid order settles payment as failed first; that CAS
    /// decides whether this call releases the stock or a failure webhook
    /// already did.
    pub async fn transition_order_status(
        &self,
        order_id: OrderId,
        next: OrderStatus,
    ) -> Result<Order, ServiceError> {
        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or(DomainError::NotFound)?;
        validate_status_transition(order.status, next, order.payment_status)?;

        if next == OrderStatus::Cancelled
            && self
                .orders
                .transition_payment(order_id, PaymentStatus::Pending, PaymentStatus::Failed)
                .await?
        {
            self.release_order_lines(&order).await?;
        }

        if !self
            .orders
            .transition_status(order_id, order.status, next)
            .await?
        {
            return Err(DomainError::conflict("order status changed concurrently").into());
        }

        info!(%order_id, from = %order.status, to = %next, "order status transitioned");
        self.orders
            .get(order_id)
            .await?
            .ok_or_else(|| DomainError::NotFound.into())
    }

    pub async fn get_order(&self, order_id: OrderId) -> Result<Order, ServiceError> {
        self.orders
            .get(order_id)
            .await?
            .ok_or_else(|| DomainError::NotFound.into())
    }

    async fn finalize(
        &self,
        mut order: Order,
        amount: u64,
    ) -> Result<CheckoutOutcome, ServiceError> {
        let payment = match order.payment_method {
            PaymentMethod::Card => {
                let intent = self
                    .gateway
                    .create_intent(order.id, amount)
                    .await
                    .map_err(|err| ServiceError::Payment(err.to_string()))?;
                order.payment_intent_id = Some(intent.intent_id.clone());
                Some(intent)
            }
            PaymentMethod::CashOnDelivery => None,
        };

        self.orders.insert(order.clone()).await?;
        Ok(CheckoutOutcome { order, payment })
    }

    /// Delete the owner's cart lines matching the order's variants. A line
    /// re-added after checkout still holds fresh stock; its hold is released
    /// before deletion so the ledger stays balanced.
    async fn consume_cart_lines(&self, order: &Order) -> Result<(), ServiceError> {
        let variants: Vec<VariantId> = order.lines.iter().map(|l| l.variant_id).collect();
        for line in self.carts.list_for_owner(&order.owner).await? {
            if !variants.contains(&line.variant_id) {
                continue;
            }
            if self.carts.clear_hold(line.id).await? {
                self.ledger
                    .release(line.variant_id, i64::from(line.quantity))
                    .await?;
            }
            self.carts.delete(line.id).await?;
        }
        Ok(())
    }

    async fn release_order_lines(&self, order: &Order) -> Result<(), ServiceError> {
        for line in &order.lines {
            self.ledger
                .release(line.variant_id, i64::from(line.quantity))
                .await?;
        }
        Ok(())
    }

    async fn rollback_holds(&self, held: &[(VariantId, i64)]) {
        // Claimed lines end up with a cleared hold and their stock released,
        // exactly like swept lines; a retried checkout re-reserves for them.
        for (variant_id, quantity) in held {
            if let Err(err) = self.ledger.release(*variant_id, *quantity).await {
                warn!(%variant_id, error = %err, "failed to roll back checkout hold");
            }
        }
    }
}
