//! Request/response DTOs and JSON mapping helpers.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use shopforge_cart::CartLineItem;
use shopforge_catalog::{Product, Variant};
use shopforge_core::{OrderId, ProductId, VariantId};
use shopforge_infra::{CheckoutOutcome, PaymentOutcome};
use shopforge_orders::{Order, OrderStatus, PaymentMethod, ShippingInfo};

// ─────────────────────────────────────────────────────────────────────────────
// Requests
// ─────────────────────────────────────────────────────────────────────────────

/// Guest identity on GET/DELETE requests (query parameter).
#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub session_id: Option<String>,
    /// Already-evaluated discount amount, in smallest currency unit.
    pub discount: Option<u64>,
}

/// Guest identity on POST requests without further payload.
#[derive(Debug, Deserialize)]
pub struct SessionBody {
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    pub variant_id: VariantId,
    pub quantity: u32,
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    /// Zero or negative removes the line.
    pub quantity: i64,
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MergeRequest {
    /// The guest session being merged into the authenticated user's cart.
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct BuyNowRequest {
    pub product_id: ProductId,
    pub variant_id: VariantId,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub session_id: Option<String>,
    pub shipping: ShippingInfo,
    pub payment_method: PaymentMethod,
    /// Present for buy-now checkout; absent to check out the whole cart.
    pub buy_now: Option<BuyNowRequest>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentWebhookRequest {
    pub order_id: OrderId,
    pub outcome: PaymentOutcome,
    /// Provider event id; logged for correlation, not stored.
    pub event_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateVariantRequest {
    pub sku: String,
    pub name: String,
    /// Price in smallest currency unit.
    pub price: u64,
    pub initial_stock: i64,
}

#[derive(Debug, Deserialize)]
pub struct RestockRequest {
    pub delta: i64,
}

#[derive(Debug, Deserialize)]
pub struct StatusTransitionRequest {
    pub status: OrderStatus,
}

// ─────────────────────────────────────────────────────────────────────────────
// Response mapping
// ─────────────────────────────────────────────────────────────────────────────

pub fn line_to_json(line: &CartLineItem, now: DateTime<Utc>) -> serde_json::Value {
    json!({
        "id": line.id.to_string(),
        "product_id": line.product_id.to_string(),
        "variant_id": line.variant_id.to_string(),
        "quantity": line.quantity,
        "price_at_time": line.price_at_time,
        "line_total": line.line_total(),
        // A lapsed-but-unswept hold still blocks stock, but the client should
        // treat it as gone; checkout re-validates either way.
        "hold_active": line.hold_active() && !line.hold_expired(now),
        "reserved_until": line.reserved_until,
    })
}

pub fn product_to_json(product: &Product) -> serde_json::Value {
    json!({
        "id": product.id.to_string(),
        "name": product.name,
        "description": product.description,
        "status": product.status,
        "created_at": product.created_at,
    })
}

/// Public variant view: exposes `available`, never the raw counters.
pub fn variant_to_json(variant: &Variant) -> serde_json::Value {
    json!({
        "id": variant.id.to_string(),
        "sku": variant.sku,
        "name": variant.name,
        "price": variant.price,
        "available": variant.available(),
    })
}

/// Admin variant view: includes the ledger counters.
pub fn variant_admin_json(variant: &Variant) -> serde_json::Value {
    json!({
        "id": variant.id.to_string(),
        "product_id": variant.product_id.to_string(),
        "sku": variant.sku,
        "name": variant.name,
        "price": variant.price,
        "inventory_quantity": variant.inventory_quantity,
        "reserved_quantity": variant.reserved_quantity,
        "available": variant.available(),
    })
}

pub fn order_to_json(order: &Order) -> serde_json::Value {
    json!({
        "id": order.id.to_string(),
        "status": order.status,
        "payment_status": order.payment_status,
        "payment_method": order.payment_method,
        "payment_intent_id": order.payment_intent_id,
        "shipping": order.shipping,
        "lines": order.lines.iter().map(|line| json!({
            "product_id": line.product_id.to_string(),
            "variant_id": line.variant_id.to_string(),
            "quantity": line.quantity,
            "unit_price": line.unit_price,
            "line_total": line.line_total(),
        })).collect::<Vec<_>>(),
        "total_amount": order.total_amount(),
        "created_at": order.created_at,
    })
}

pub fn checkout_to_json(outcome: &CheckoutOutcome) -> serde_json::Value {
    json!({
        "order": order_to_json(&outcome.order),
        "payment": outcome.payment.as_ref().map(|intent| json!({
            "intent_id": intent.intent_id,
            "client_secret": intent.client_secret,
        })),
    })
}
