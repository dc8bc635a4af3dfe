//! Typed views of the text status columns and the order state machine.
//!
//! Entities store these values as strings; the engine converts with `parse` on
//! read and `as_str` on write, so an unknown value in the store surfaces as a
//! validation error instead of silently matching nothing.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of an order.
///
/// `Pending → Confirmed → Preparing → Delivered`, with `Cancelled` reachable from
/// every non-terminal state. `Delivered` and `Cancelled` are sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created, stock untouched
    Pending,
    /// Accepted by the farmer, stock deducted
    Confirmed,
    /// Being prepared for handover
    Preparing,
    /// Handed over
    Delivered,
    /// Withdrawn by a party or by the system
    Cancelled,
}

impl OrderStatus {
    /// Column value for this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Preparing => "preparing",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses a column value.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "preparing" => Ok(Self::Preparing),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(Error::validation(format!("unknown order status '{other}'"))),
        }
    }

    /// Whether the state machine allows moving from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Confirmed)
                | (Self::Confirmed, Self::Preparing)
                | (Self::Preparing, Self::Delivered)
                | (
                    Self::Pending | Self::Confirmed | Self::Preparing,
                    Self::Cancelled
                )
        )
    }

    /// Only pending orders can be confirmed.
    #[must_use]
    pub const fn can_be_confirmed(self) -> bool {
        self.can_transition_to(Self::Confirmed)
    }

    /// Any non-terminal order can be cancelled.
    #[must_use]
    pub const fn can_be_cancelled(self) -> bool {
        self.can_transition_to(Self::Cancelled)
    }

    /// Whether an order in this state has had its quantity deducted from stock.
    #[must_use]
    pub const fn holds_stock(self) -> bool {
        matches!(self, Self::Confirmed | Self::Preparing)
    }

    /// `Delivered` and `Cancelled` accept no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Availability of a product listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    /// Listed with stock
    Active,
    /// Listed, no stock left
    SoldOut,
    /// Withdrawn by the farmer; never reactivated by stock changes
    Inactive,
}

impl ProductStatus {
    /// Column value for this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::SoldOut => "sold_out",
            Self::Inactive => "inactive",
        }
    }

    /// Parses a column value.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "active" => Ok(Self::Active),
            "sold_out" => Ok(Self::SoldOut),
            "inactive" => Ok(Self::Inactive),
            other => Err(Error::validation(format!(
                "unknown product status '{other}'"
            ))),
        }
    }

    /// Status a listing should carry after its remaining stock changed.
    #[must_use]
    pub const fn after_stock_change(self, remaining: i32) -> Self {
        match self {
            Self::Inactive => Self::Inactive,
            _ if remaining == 0 => Self::SoldOut,
            _ => Self::Active,
        }
    }
}

/// How the buyer receives the goods; selects the delivery fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    /// Collected at the farm
    Pickup,
    /// Local delivery
    Delivery,
    /// Parcel shipping
    Shipping,
}

impl DeliveryMethod {
    /// Column value for this method.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pickup => "pickup",
            Self::Delivery => "delivery",
            Self::Shipping => "shipping",
        }
    }
}

/// Who cancelled an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelledBy {
    /// The buyer withdrew
    Buyer,
    /// The farmer declined
    Farmer,
    /// The cleanup job expired it
    System,
}

impl CancelledBy {
    /// Column value for this actor.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buyer => "buyer",
            Self::Farmer => "farmer",
            Self::System => "system",
        }
    }
}

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Sells products
    Farmer,
    /// Buys products
    Buyer,
    /// Operates the marketplace
    Admin,
}

impl UserRole {
    /// Column value for this role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Farmer => "farmer",
            Self::Buyer => "buyer",
            Self::Admin => "admin",
        }
    }
}

/// Kind of content carried by a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Plain text
    #[default]
    Text,
    /// Image attachment
    Image,
    /// File attachment
    File,
}

impl MessageType {
    /// Column value for this type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::File => "file",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    #[test]
    fn test_forward_transitions_do_not_skip() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Confirmed));
        assert!(OrderStatus::Confirmed.can_transition_to(OrderStatus::Preparing));
        assert!(OrderStatus::Preparing.can_transition_to(OrderStatus::Delivered));

        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Preparing));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Delivered));
        assert!(!OrderStatus::Confirmed.can_transition_to(OrderStatus::Delivered));
        assert!(!OrderStatus::Confirmed.can_transition_to(OrderStatus::Pending));
    }

    #[test]
    fn test_terminal_states_are_sinks() {
        for terminal in [OrderStatus::Delivered, OrderStatus::Cancelled] {
            assert!(terminal.is_terminal());
            for next in ALL {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_cancellation_and_stock_holding() {
        assert!(OrderStatus::Pending.can_be_cancelled());
        assert!(OrderStatus::Confirmed.can_be_cancelled());
        assert!(OrderStatus::Preparing.can_be_cancelled());
        assert!(!OrderStatus::Delivered.can_be_cancelled());

        assert!(!OrderStatus::Pending.holds_stock());
        assert!(OrderStatus::Confirmed.holds_stock());
        assert!(OrderStatus::Preparing.holds_stock());
        assert!(!OrderStatus::Cancelled.holds_stock());
    }

    #[test]
    fn test_status_parse_matches_as_str() {
        for status in ALL {
            assert_eq!(OrderStatus::parse(status.as_str()).ok(), Some(status));
        }
        assert!(OrderStatus::parse("approved").is_err());
        assert!(ProductStatus::parse("archived").is_err());
    }

    #[test]
    fn test_product_status_after_stock_change() {
        assert_eq!(
            ProductStatus::Active.after_stock_change(0),
            ProductStatus::SoldOut
        );
        assert_eq!(
            ProductStatus::SoldOut.after_stock_change(3),
            ProductStatus::Active
        );
        assert_eq!(
            ProductStatus::Inactive.after_stock_change(3),
            ProductStatus::Inactive
        );
    }
}
