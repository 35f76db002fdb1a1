//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Markups, price bounds and performance metrics are compared by their values;
/// two `Markup::Percentage(2_000)` are the same markup wherever they appear.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
