use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    domain::{
        geo::GeoPoint,
        status::{DeliveryType, OrderStatus, PaymentMethod, PaymentStatus},
    },
    entity::{
        cart_items::Model as CartItemModel, farms::Model as FarmModel,
        order_items::Model as OrderItemModel, order_status_history::Model as HistoryModel,
        orders::Model as OrderModel, products::Model as ProductModel,
    },
    error::{AppError, AppResult},
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Farm {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub address: String,
    pub contact_phone: String,
    pub location: GeoPoint,
    pub certification_score: f64,
    pub certifications: Vec<String>,
    pub rating: f64,
    pub created_at: DateTime<Utc>,
}

impl From<FarmModel> for Farm {
    fn from(model: FarmModel) -> Self {
        Farm {
            id: model.id,
            owner_id: model.owner_id,
            name: model.name,
            address: model.address,
            contact_phone: model.contact_phone,
            location: GeoPoint {
                longitude: model.longitude,
                latitude: model.latitude,
            },
            certification_score: model.certification_score,
            certifications: string_list(model.certifications),
            rating: model.rating,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub farm_id: Uuid,
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub price: i64,
    pub unit: String,
    pub stock: i32,
    pub is_active: bool,
    pub is_organic: bool,
    pub government_price: Option<i64>,
    pub predicted_price: Option<i64>,
    pub rating: f64,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProductModel> for Product {
    fn from(model: ProductModel) -> Self {
        Product {
            id: model.id,
            farm_id: model.farm_id,
            name: model.name,
            category: model.category,
            description: model.description,
            price: model.price,
            unit: model.unit,
            stock: model.stock,
            is_active: model.is_active,
            is_organic: model.is_organic,
            government_price: model.government_price,
            predicted_price: model.predicted_price,
            rating: model.rating,
            tags: string_list(model.tags),
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CartItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

impl From<CartItemModel> for CartItem {
    fn from(model: CartItemModel) -> Self {
        CartItem {
            id: model.id,
            product_id: model.product_id,
            user_id: model.user_id,
            quantity: model.quantity,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DeliveryAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
}

impl DeliveryAddress {
    pub fn validate(&self) -> AppResult<()> {
        let required = [
            (&self.street, "Street address is required"),
            (&self.city, "City is required"),
            (&self.state, "State is required"),
            (&self.zip_code, "Zip code is required"),
        ];
        for (value, message) in required {
            if value.trim().is_empty() {
                return Err(AppError::BadRequest(message.into()));
            }
        }
        let zip = self.zip_code.trim();
        if zip.len() != 6 || !zip.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AppError::BadRequest("Invalid zip code format".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DeliverySlot {
    pub date: NaiveDate,
    pub time_slot: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub price: i64,
    pub unit: String,
}

impl From<OrderItemModel> for OrderItem {
    fn from(model: OrderItemModel) -> Self {
        OrderItem {
            product_id: model.product_id,
            product_name: model.product_name,
            quantity: model.quantity,
            price: model.price,
            unit: model.unit,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatusEntry {
    pub status: OrderStatus,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VerificationCodeInfo {
    /// Only present when the buyer is looking at the order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub generated_at: Option<DateTime<Utc>>,
    pub verified: bool,
    pub verified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeliveryVerification {
    pub required: bool,
    pub verified: bool,
    pub verified_by: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
}

impl DeliveryVerification {
    pub fn from_entity(model: &OrderModel) -> Self {
        DeliveryVerification {
            required: model.verification_required,
            verified: model.delivery_verified,
            verified_by: model.delivery_verified_by.clone(),
            verified_at: model.delivery_verified_at.map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub farm_id: Uuid,
    pub farmer_id: Option<Uuid>,
    pub items: Vec<OrderItem>,
    pub total_amount: i64,
    pub discount: i64,
    pub discount_code: Option<String>,
    pub delivery_type: DeliveryType,
    pub delivery_address: Option<DeliveryAddress>,
    pub delivery_slot: DeliverySlot,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
    pub status_history: Vec<StatusEntry>,
    pub verification_code: Option<VerificationCodeInfo>,
    pub delivery_verification: DeliveryVerification,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Assemble the API view. The code value is revealed only when `reveal_code` is set.
    pub fn from_parts(
        model: OrderModel,
        items: Vec<OrderItemModel>,
        history: Vec<HistoryModel>,
        reveal_code: bool,
    ) -> AppResult<Order> {
        let status_history = history
            .into_iter()
            .map(|entry| -> AppResult<StatusEntry> {
                Ok(StatusEntry {
                    status: stored(&entry.status)?,
                    timestamp: entry.created_at.with_timezone(&Utc),
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        let verification_code = model.verification_code.as_ref().map(|code| VerificationCodeInfo {
            code: reveal_code.then(|| code.clone()),
            generated_at: model.code_generated_at.map(|dt| dt.with_timezone(&Utc)),
            verified: model.code_verified,
            verified_at: model.code_verified_at.map(|dt| dt.with_timezone(&Utc)),
        });

        let delivery_address = model
            .delivery_address
            .clone()
            .map(serde_json::from_value::<DeliveryAddress>)
            .transpose()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("corrupt delivery address: {e}")))?;
        let delivery_slot = serde_json::from_value::<DeliverySlot>(model.delivery_slot.clone())
            .map_err(|e| AppError::Internal(anyhow::anyhow!("corrupt delivery slot: {e}")))?;

        Ok(Order {
            id: model.id,
            buyer_id: model.buyer_id,
            farm_id: model.farm_id,
            farmer_id: model.farmer_id,
            items: items.into_iter().map(OrderItem::from).collect(),
            total_amount: model.total_amount,
            discount: model.discount,
            discount_code: model.discount_code.clone(),
            delivery_type: stored(&model.delivery_type)?,
            delivery_address,
            delivery_slot,
            payment_method: stored(&model.payment_method)?,
            payment_status: stored(&model.payment_status)?,
            order_status: stored(&model.order_status)?,
            status_history,
            verification_code,
            delivery_verification: DeliveryVerification::from_entity(&model),
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        })
    }
}

/// Parse an enum column written by this service.
pub fn stored<T: FromStr>(value: &str) -> AppResult<T> {
    value
        .parse::<T>()
        .map_err(|_| AppError::Internal(anyhow::anyhow!("unexpected stored value {value}")))
}

/// Decode a JSONB string array, tolerating anything else as empty.
pub fn string_list(value: serde_json::Value) -> Vec<String> {
    serde_json::from_value(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(zip: &str) -> DeliveryAddress {
        DeliveryAddress {
            street: "12 Market Road".into(),
            city: "Pune".into(),
            state: "MH".into(),
            zip_code: zip.into(),
        }
    }

    #[test]
    fn address_requires_six_digit_zip() {
        assert!(address("411001").validate().is_ok());
        assert!(address("41100").validate().is_err());
        assert!(address("41100A").validate().is_err());
    }

    #[test]
    fn address_requires_every_field() {
        let mut blank_city = address("411001");
        blank_city.city = "  ".into();
        assert!(matches!(blank_city.validate(), Err(AppError::BadRequest(msg)) if msg == "City is required"));
    }

    #[test]
    fn string_list_tolerates_bad_json() {
        assert_eq!(string_list(serde_json::json!(["a", "b"])), vec!["a", "b"]);
        assert!(string_list(serde_json::json!({"a": 1})).is_empty());
    }
}
