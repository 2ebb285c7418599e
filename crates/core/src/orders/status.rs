//! Order Status

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Delivery status of an order.
///
/// The first five variants form the delivery pipeline, in order. `Cancelled`
/// sits outside it, as does `Unknown`, which stands in for any status string
/// this client does not recognise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    /// Received, not yet worked on.
    #[default]
    Pending,
    /// Being picked and packed.
    Processing,
    /// Handed to the carrier.
    Shipped,
    /// On the courier's final run.
    OutForDelivery,
    /// Received by the customer.
    Delivered,
    /// Withdrawn before delivery.
    Cancelled,
    /// Anything else the server reports.
    Unknown,
}

/// The delivery pipeline, in order.
pub const PIPELINE: [OrderStatus; 5] = [
    OrderStatus::Pending,
    OrderStatus::Processing,
    OrderStatus::Shipped,
    OrderStatus::OutForDelivery,
    OrderStatus::Delivered,
];

impl OrderStatus {
    /// Position in [`PIPELINE`], or `None` for statuses outside it.
    pub fn stage_index(self) -> Option<usize> {
        PIPELINE.iter().position(|stage| *stage == self)
    }

    /// Whether no further transition is possible.
    pub fn is_final(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Whether back-office staff may move an order from `self` to `next`.
    ///
    /// Pipeline statuses only move forward (skipping stages is allowed).
    /// Cancellation is possible from any non-final status. An unrecognised
    /// status may be corrected to any known one.
    pub fn can_transition_to(self, next: Self) -> bool {
        if next == Self::Unknown || self.is_final() {
            return false;
        }

        if self == Self::Unknown || next == Self::Cancelled {
            return true;
        }

        match (self.stage_index(), next.stage_index()) {
            (Some(from), Some(to)) => to > from,
            _ => false,
        }
    }

    /// Wire name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::OutForDelivery => "out_for_delivery",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Processing => "Processing",
            Self::Shipped => "Shipped",
            Self::OutForDelivery => "Out for delivery",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
            Self::Unknown => "Unknown",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = std::convert::Infallible;

    /// Parses case-insensitively, treating spaces and hyphens as underscores.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalised = value.trim().to_ascii_lowercase().replace([' ', '-'], "_");

        Ok(match normalised.as_str() {
            "pending" => Self::Pending,
            "processing" => Self::Processing,
            "shipped" => Self::Shipped,
            "out_for_delivery" => Self::OutForDelivery,
            "delivered" => Self::Delivered,
            "cancelled" | "canceled" => Self::Cancelled,
            _ => Self::Unknown,
        })
    }
}

impl From<String> for OrderStatus {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(status) => status,
            Err(never) => match never {},
        }
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn parsing_is_lenient() {
        let parse = |value: &str| OrderStatus::from(value.to_string());

        assert_eq!(parse("Out for Delivery"), OrderStatus::OutForDelivery);
        assert_eq!(parse("out-for-delivery"), OrderStatus::OutForDelivery);
        assert_eq!(parse("CANCELED"), OrderStatus::Cancelled);
        assert_eq!(parse("lost"), OrderStatus::Unknown);
    }

    #[test]
    fn serde_uses_wire_names() -> TestResult {
        let status: OrderStatus = serde_json::from_str("\"shipped\"")?;

        assert_eq!(status, OrderStatus::Shipped);
        assert_eq!(
            serde_json::to_string(&OrderStatus::OutForDelivery)?,
            "\"out_for_delivery\""
        );

        Ok(())
    }

    #[test]
    fn pipeline_indices_follow_declaration_order() {
        assert_eq!(OrderStatus::Pending.stage_index(), Some(0));
        assert_eq!(OrderStatus::Delivered.stage_index(), Some(4));
        assert_eq!(OrderStatus::Cancelled.stage_index(), None);
        assert_eq!(OrderStatus::Unknown.stage_index(), None);
    }

    #[test]
    fn transitions_only_move_forward() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::OutForDelivery));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Processing));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Shipped));
    }

    #[test]
    fn cancellation_is_allowed_until_delivery() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::OutForDelivery,
        ] {
            assert!(status.can_transition_to(OrderStatus::Cancelled), "{status}");
        }

        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Pending));
    }

    #[test]
    fn unknown_status_can_be_corrected() {
        assert!(OrderStatus::Unknown.can_transition_to(OrderStatus::Shipped));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Unknown));
    }
}
