use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    domain::geo::GeoPoint,
    error::{AppError, AppResult},
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateFarmRequest {
    pub name: String,
    pub address: String,
    pub contact_phone: String,
    pub location: GeoPoint,
    #[serde(default)]
    pub certifications: Vec<String>,
}

impl CreateFarmRequest {
    pub fn validate(&self) -> AppResult<GeoPoint> {
        if self.name.trim().is_empty() {
            return Err(AppError::BadRequest("Farm name is required".into()));
        }
        if self.address.trim().is_empty() {
            return Err(AppError::BadRequest("Address is required".into()));
        }
        if self.contact_phone.trim().is_empty() {
            return Err(AppError::BadRequest("Contact phone is required".into()));
        }
        GeoPoint::new(self.location.longitude, self.location.latitude)
    }
}
