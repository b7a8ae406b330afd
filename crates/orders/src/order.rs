use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopforge_core::{
    DomainError, DomainResult, Entity, OrderId, Owner, ProductId, ValueObject, VariantId,
};

/// Order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Preparing,
    Shipping,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled | Self::Refunded)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Preparing => "preparing",
            Self::Shipping => "shipping",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment status lifecycle. Pending is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
        }
    }
}

impl core::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the buyer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Asynchronous card payment via the external processor.
    Card,
    /// Settled on delivery; no payment intent is created.
    CashOnDelivery,
}

/// Shipping contact details captured at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingInfo {
    pub recipient: String,
    pub address_line: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

impl ShippingInfo {
    pub fn validate(&self) -> DomainResult<()> {
        let fields = [
            ("recipient", &self.recipient),
            ("address_line", &self.address_line),
            ("city", &self.city),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(DomainError::validation(format!("{name} cannot be empty")));
            }
        }
        Ok(())
    }
}

impl ValueObject for ShippingInfo {}

/// Order line: snapshots taken from the cart at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub variant_id: VariantId,
    pub quantity: u32,
    /// Price in smallest currency unit (e.g., cents).
    pub unit_price: u64,
}

impl OrderLine {
    pub fn line_total(&self) -> u64 {
        self.unit_price * u64::from(self.quantity)
    }
}

/// An order. Its lines own the stock claimed from cart reservations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub owner: Owner,
    pub shipping: ShippingInfo,
    pub payment_method: PaymentMethod,
    pub lines: Vec<OrderLine>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    /// Opaque processor handle for asynchronous payment methods.
    pub payment_intent_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn new(
        owner: Owner,
        shipping: ShippingInfo,
        payment_method: PaymentMethod,
        lines: Vec<OrderLine>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        shipping.validate()?;
        if lines.is_empty() {
            return Err(DomainError::validation("order must have at least one line"));
        }
        Ok(Self {
            id: OrderId::new(),
            owner,
            shipping,
            payment_method,
            lines,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_intent_id: None,
            created_at: now,
        })
    }

    pub fn total_amount(&self) -> u64 {
        self.lines.iter().map(OrderLine::line_total).sum()
    }
}

impl Entity for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Validate an order-status transition.
///
/// Happy path is linear: pending → preparing → shipping → delivered.
/// Any non-terminal status may go to cancelled, but only while payment is
/// not `Paid` — a paid order needs a refund flow, not a cancellation.
pub fn validate_status_transition(
    current: OrderStatus,
    next: OrderStatus,
    payment: PaymentStatus,
) -> DomainResult<()> {
    use OrderStatus::*;

    if matches!(
        (current, next),
        (Pending, Preparing) | (Preparing, Shipping) | (Shipping, Delivered)
    ) {
        return Ok(());
    }

    if next == Cancelled {
        if current.is_terminal() {
            return Err(DomainError::invariant(format!(
                "cannot cancel an order in terminal status {current}"
            )));
        }
        if payment == PaymentStatus::Paid {
            return Err(DomainError::invariant(
                "paid orders cannot be cancelled; refund instead",
            ));
        }
        return Ok(());
    }

    Err(DomainError::invariant(format!(
        "illegal order status transition: {current} -> {next}"
    )))
}

/// Validate a payment-status transition.
///
/// Only pending → paid and pending → failed are legal; anything else is a
/// replayed or out-of-order signal.
pub fn validate_payment_transition(
    current: PaymentStatus,
    next: PaymentStatus,
) -> DomainResult<()> {
    match (current, next) {
        (PaymentStatus::Pending, PaymentStatus::Paid)
        | (PaymentStatus::Pending, PaymentStatus::Failed) => Ok(()),
        _ => Err(DomainError::conflict(format!(
            "illegal payment transition: {current} -> {next}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopforge_core::SessionToken;

    fn shipping() -> ShippingInfo {
        ShippingInfo {
            recipient: "Ada Lovelace".to_string(),
            address_line: "12 Analytical Way".to_string(),
            city: "London".to_string(),
            postal_code: "N1 9GU".to_string(),
            country: "GB".to_string(),
        }
    }

    fn order_line(quantity: u32, unit_price: u64) -> OrderLine {
        OrderLine {
            product_id: ProductId::new(),
            variant_id: VariantId::new(),
            quantity,
            unit_price,
        }
    }

    fn owner() -> Owner {
        Owner::Guest(SessionToken::new("sess-orders").unwrap())
    }

    #[test]
    fn new_order_starts_pending_pending() {
        let order = Order::new(
            owner(),
            shipping(),
            PaymentMethod::Card,
            vec![order_line(2, 1_000)],
            Utc::now(),
        )
        .unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.total_amount(), 2_000);
    }

    #[test]
    fn new_order_rejects_empty_lines_and_blank_shipping() {
        assert!(Order::new(owner(), shipping(), PaymentMethod::Card, vec![], Utc::now()).is_err());

        let mut bad = shipping();
        bad.city = "  ".to_string();
        assert!(
            Order::new(
                owner(),
                bad,
                PaymentMethod::Card,
                vec![order_line(1, 100)],
                Utc::now()
            )
            .is_err()
        );
    }

    #[test]
    fn linear_happy_path_is_allowed() {
        use OrderStatus::*;
        let payment = PaymentStatus::Paid;
        validate_status_transition(Pending, Preparing, payment).unwrap();
        validate_status_transition(Preparing, Shipping, payment).unwrap();
        validate_status_transition(Shipping, Delivered, payment).unwrap();
    }

    #[test]
    fn status_skips_are_rejected() {
        use OrderStatus::*;
        assert!(validate_status_transition(Pending, Shipping, PaymentStatus::Pending).is_err());
        assert!(validate_status_transition(Pending, Delivered, PaymentStatus::Pending).is_err());
        assert!(validate_status_transition(Shipping, Preparing, PaymentStatus::Pending).is_err());
    }

    #[test]
    fn cancel_allowed_from_non_terminal_while_unpaid() {
        use OrderStatus::*;
        validate_status_transition(Pending, Cancelled, PaymentStatus::Pending).unwrap();
        validate_status_transition(Preparing, Cancelled, PaymentStatus::Failed).unwrap();
        validate_status_transition(Shipping, Cancelled, PaymentStatus::Pending).unwrap();
    }

    #[test]
    fn cancel_rejected_once_paid_or_terminal() {
        use OrderStatus::*;
        assert!(validate_status_transition(Preparing, Cancelled, PaymentStatus::Paid).is_err());
        assert!(validate_status_transition(Delivered, Cancelled, PaymentStatus::Paid).is_err());
        assert!(validate_status_transition(Cancelled, Cancelled, PaymentStatus::Pending).is_err());
    }

    #[test]
    fn transitions_out_of_terminal_states_are_rejected() {
        use OrderStatus::*;
        assert!(validate_status_transition(Delivered, Shipping, PaymentStatus::Paid).is_err());
        assert!(validate_status_transition(Cancelled, Preparing, PaymentStatus::Pending).is_err());
        assert!(validate_status_transition(Refunded, Pending, PaymentStatus::Failed).is_err());
    }

    #[test]
    fn payment_transitions_only_leave_pending() {
        use PaymentStatus::*;
        validate_payment_transition(Pending, Paid).unwrap();
        validate_payment_transition(Pending, Failed).unwrap();

        assert!(validate_payment_transition(Paid, Failed).is_err());
        assert!(validate_payment_transition(Failed, Paid).is_err());
        assert!(validate_payment_transition(Paid, Paid).is_err());
        assert!(validate_payment_transition(Pending, Pending).is_err());
    }
}
