use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    domain::{
        status::{DeliveryType, OrderStatus, PaymentMethod},
        verification::CODE_LENGTH,
    },
    error::{AppError, AppResult},
    models::{DeliveryAddress, DeliverySlot, DeliveryVerification, Order},
};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItemRequest>,
    pub delivery_type: DeliveryType,
    pub delivery_address: Option<DeliveryAddress>,
    pub delivery_slot: Option<DeliverySlot>,
    pub payment_method: PaymentMethod,
    pub discount_code: Option<String>,
    /// Cart items to clear after checkout. All of the buyer's cart items when absent.
    #[serde(default)]
    pub cart_ids: Vec<Uuid>,
}

impl CreateOrderRequest {
    pub fn validate(&self) -> AppResult<()> {
        if self.items.is_empty() {
            return Err(AppError::BadRequest("Order must contain at least one item".into()));
        }
        if self.items.iter().any(|item| item.quantity <= 0) {
            return Err(AppError::BadRequest("Quantity must be greater than 0".into()));
        }
        if self.delivery_type == DeliveryType::Delivery {
            match &self.delivery_address {
                Some(address) => address.validate()?,
                None => {
                    return Err(AppError::BadRequest(
                        "Delivery address is required for delivery orders".into(),
                    ));
                }
            }
        }
        match &self.delivery_slot {
            Some(slot) if !slot.time_slot.trim().is_empty() => Ok(()),
            _ => Err(AppError::BadRequest("Delivery slot is required".into())),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MultiOrder {
    pub multi: bool,
    pub orders: Vec<Order>,
}

/// A checkout touching one farm returns that order, otherwise the multi envelope.
#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum CheckoutResult {
    Single(Box<Order>),
    Multi(MultiOrder),
}

impl CheckoutResult {
    pub fn from_orders(mut orders: Vec<Order>) -> Self {
        if orders.len() == 1 {
            if let Some(order) = orders.pop() {
                return CheckoutResult::Single(Box::new(order));
            }
        }
        CheckoutResult::Multi(MultiOrder {
            multi: true,
            orders,
        })
    }

    pub fn into_orders(self) -> Vec<Order> {
        match self {
            CheckoutResult::Single(order) => vec![*order],
            CheckoutResult::Multi(multi) => multi.orders,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyDeliveryRequest {
    pub order_id: Uuid,
    pub verification_code: String,
}

impl VerifyDeliveryRequest {
    pub fn validate(&self) -> AppResult<()> {
        if self.verification_code.trim().is_empty() {
            return Err(AppError::BadRequest("Verification code is required".into()));
        }
        if self.verification_code.trim().chars().count() != CODE_LENGTH {
            return Err(AppError::BadRequest(format!(
                "Verification code must be {CODE_LENGTH} characters"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyDeliveryResponse {
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub verification: DeliveryVerification,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegenerateCodeResponse {
    /// Returned to the buyer only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateAddressRequest {
    pub delivery_address: DeliveryAddress,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn request(delivery_type: DeliveryType) -> CreateOrderRequest {
        CreateOrderRequest {
            items: vec![OrderItemRequest {
                product_id: Uuid::new_v4(),
                quantity: 2,
            }],
            delivery_type,
            delivery_address: None,
            delivery_slot: Some(DeliverySlot {
                date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
                time_slot: "09:00-12:00".into(),
            }),
            payment_method: PaymentMethod::Cod,
            discount_code: None,
            cart_ids: vec![],
        }
    }

    #[test]
    fn pickup_needs_no_address() {
        assert!(request(DeliveryType::Pickup).validate().is_ok());
        assert!(request(DeliveryType::Delivery).validate().is_err());
    }

    #[test]
    fn rejects_empty_or_non_positive_items() {
        let mut empty = request(DeliveryType::Pickup);
        empty.items.clear();
        assert!(empty.validate().is_err());

        let mut zero = request(DeliveryType::Pickup);
        zero.items[0].quantity = 0;
        assert!(zero.validate().is_err());
    }

    #[test]
    fn slot_is_required() {
        let mut req = request(DeliveryType::Pickup);
        req.delivery_slot = None;
        assert!(req.validate().is_err());
    }

    #[test]
    fn checkout_result_shape_follows_order_count() {
        let json = serde_json::to_value(CheckoutResult::Multi(MultiOrder {
            multi: true,
            orders: vec![],
        }))
        .unwrap();
        assert_eq!(json["multi"], true);
        assert!(CheckoutResult::from_orders(vec![]).into_orders().is_empty());
    }

    #[test]
    fn verification_code_length_is_checked() {
        let req = VerifyDeliveryRequest {
            order_id: Uuid::new_v4(),
            verification_code: "ABC".into(),
        };
        assert!(req.validate().is_err());
    }
}
