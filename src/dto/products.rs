use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    domain::geo::GeoPoint,
    error::{AppError, AppResult},
    models::Product,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub price: i64,
    pub unit: String,
    pub stock: i32,
    #[serde(default)]
    pub is_organic: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CreateProductRequest {
    pub fn validate(&self) -> AppResult<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::BadRequest("Product name is required".into()));
        }
        if self.category.trim().is_empty() {
            return Err(AppError::BadRequest("Category is required".into()));
        }
        if self.unit.trim().is_empty() {
            return Err(AppError::BadRequest("Unit is required".into()));
        }
        validate_amounts(Some(self.price), Some(self.stock))
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub unit: Option<String>,
    pub stock: Option<i32>,
    pub is_active: Option<bool>,
    pub is_organic: Option<bool>,
    pub tags: Option<Vec<String>>,
}

impl UpdateProductRequest {
    pub fn validate(&self) -> AppResult<()> {
        validate_amounts(self.price, self.stock)
    }
}

fn validate_amounts(price: Option<i64>, stock: Option<i32>) -> AppResult<()> {
    if price.is_some_and(|p| p < 0) {
        return Err(AppError::BadRequest("Price cannot be negative".into()));
    }
    if stock.is_some_and(|s| s < 0) {
        return Err(AppError::BadRequest("Stock cannot be negative".into()));
    }
    Ok(())
}

#[derive(Serialize, ToSchema)]
#[serde(transparent)]
pub struct ProductList {
    #[schema(value_type = Vec<Product>)]
    pub items: Vec<Product>,
}

/// Farm fields attached to discovery results.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FarmSummary {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub location: GeoPoint,
    pub certification_score: f64,
    pub certifications: Vec<String>,
    pub rating: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct NearbyProduct {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub price: i64,
    pub unit: String,
    pub stock: i32,
    pub is_organic: bool,
    pub rating: f64,
    pub tags: Vec<String>,
    pub distance_km: f64,
    pub final_score: f64,
    pub farm: FarmSummary,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NearbyProducts {
    pub count: usize,
    pub radius: f64,
    pub user_location: GeoPoint,
    pub products: Vec<NearbyProduct>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SearchProduct {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub price: i64,
    pub unit: String,
    pub stock: i32,
    pub is_organic: bool,
    pub is_active: bool,
    pub government_price: Option<i64>,
    pub predicted_price: Option<i64>,
    pub rating: f64,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// Metres from the search point, when one was given.
    pub distance: Option<f64>,
    pub farm: FarmSummary,
}

#[derive(Serialize, ToSchema)]
pub struct SearchProductList {
    pub items: Vec<SearchProduct>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CertifiedProduct {
    #[serde(flatten)]
    pub product: Product,
    pub farm_name: String,
    pub farm_certification_score: f64,
}

#[derive(Serialize, ToSchema)]
pub struct CertifiedProductList {
    pub items: Vec<CertifiedProduct>,
}
