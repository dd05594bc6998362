use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;

/// Lifecycle of a single-farm order.
///
/// `delivered` and `cancelled` are terminal. Every other state may move forward along
/// the chain (skipping steps is allowed) or be cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Placed,
    Confirmed,
    Processing,
    Ready,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "placed",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Ready => "ready",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    fn rank(&self) -> u8 {
        match self {
            OrderStatus::Placed => 0,
            OrderStatus::Confirmed => 1,
            OrderStatus::Processing => 2,
            OrderStatus::Ready => 3,
            OrderStatus::OutForDelivery => 4,
            OrderStatus::Delivered => 5,
            OrderStatus::Cancelled => u8::MAX,
        }
    }

    /// Statuses in which a delivery code can be checked.
    pub fn accepts_verification(&self) -> bool {
        matches!(self, OrderStatus::Ready | OrderStatus::OutForDelivery)
    }

    /// Statuses in which a fresh delivery code can be issued.
    pub fn accepts_code_regeneration(&self) -> bool {
        matches!(
            self,
            OrderStatus::Processing | OrderStatus::Ready | OrderStatus::OutForDelivery
        )
    }

    /// Validate a status change requested through the status endpoint.
    pub fn ensure_transition(&self, next: OrderStatus) -> Result<(), AppError> {
        if self.is_terminal() {
            return Err(AppError::BadRequest(format!(
                "Order is already {} and cannot change status",
                self.as_str()
            )));
        }
        if next == OrderStatus::Cancelled {
            return Ok(());
        }
        if next.rank() <= self.rank() {
            return Err(AppError::BadRequest(format!(
                "Cannot move order from {} to {}",
                self.as_str(),
                next.as_str()
            )));
        }
        Ok(())
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "placed" => Ok(OrderStatus::Placed),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "processing" => Ok(OrderStatus::Processing),
            "ready" => Ok(OrderStatus::Ready),
            "out_for_delivery" => Ok(OrderStatus::OutForDelivery),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(AppError::BadRequest(format!("Invalid order status {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cod,
    Upi,
    Card,
    Online,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cod => "cod",
            PaymentMethod::Upi => "upi",
            PaymentMethod::Card => "card",
            PaymentMethod::Online => "online",
        }
    }

    pub fn is_cod(&self) -> bool {
        matches!(self, PaymentMethod::Cod)
    }
}

impl FromStr for PaymentMethod {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cod" => Ok(PaymentMethod::Cod),
            "upi" => Ok(PaymentMethod::Upi),
            "card" => Ok(PaymentMethod::Card),
            "online" => Ok(PaymentMethod::Online),
            other => Err(AppError::BadRequest(format!("Invalid payment method {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(AppError::BadRequest(format!("Invalid payment status {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryType {
    Delivery,
    Pickup,
}

impl DeliveryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryType::Delivery => "delivery",
            DeliveryType::Pickup => "pickup",
        }
    }
}

impl FromStr for DeliveryType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "delivery" => Ok(DeliveryType::Delivery),
            "pickup" => Ok(DeliveryType::Pickup),
            other => Err(AppError::BadRequest(format!("Invalid delivery type {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_moves_and_skips_are_allowed() {
        assert!(OrderStatus::Placed.ensure_transition(OrderStatus::Confirmed).is_ok());
        assert!(OrderStatus::Confirmed.ensure_transition(OrderStatus::Ready).is_ok());
        assert!(OrderStatus::Ready.ensure_transition(OrderStatus::OutForDelivery).is_ok());
        assert!(OrderStatus::OutForDelivery.ensure_transition(OrderStatus::Delivered).is_ok());
    }

    #[test]
    fn backward_and_repeated_moves_are_rejected() {
        assert!(OrderStatus::Ready.ensure_transition(OrderStatus::Confirmed).is_err());
        assert!(OrderStatus::Processing.ensure_transition(OrderStatus::Processing).is_err());
        assert!(OrderStatus::Confirmed.ensure_transition(OrderStatus::Placed).is_err());
    }

    #[test]
    fn cancel_reachable_from_every_open_state() {
        for status in [
            OrderStatus::Placed,
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Ready,
            OrderStatus::OutForDelivery,
        ] {
            assert!(status.ensure_transition(OrderStatus::Cancelled).is_ok(), "{status}");
        }
    }

    #[test]
    fn terminal_states_are_frozen() {
        assert!(OrderStatus::Delivered.ensure_transition(OrderStatus::Cancelled).is_err());
        assert!(OrderStatus::Cancelled.ensure_transition(OrderStatus::Confirmed).is_err());
    }

    #[test]
    fn status_strings_round_trip_through_serde_names() {
        let json = serde_json::to_string(&OrderStatus::OutForDelivery).unwrap();
        assert_eq!(json, "\"out_for_delivery\"");
        assert_eq!(
            "out_for_delivery".parse::<OrderStatus>().unwrap(),
            OrderStatus::OutForDelivery
        );
        assert!("shipped".parse::<OrderStatus>().is_err());
    }
}
