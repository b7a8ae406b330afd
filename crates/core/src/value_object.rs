//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**: two instances
/// with the same attribute values are the same value. To "modify" one, build
/// a new one. `ShippingInfo` and a computed `CartSummary` are value objects;
/// a `CartLineItem` (which keeps its identity across quantity edits) is not.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
