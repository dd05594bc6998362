use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::{
    dto::farms::CreateFarmRequest,
    entity::farms::{ActiveModel, Column, Entity as Farms},
    error::{AppError, AppResult},
    middleware::auth::{Principal, Role, ensure_role},
    models::Farm,
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Register the caller's farm. A farmer has at most one farm; its certification score starts
/// at zero and is maintained by the certificate pipeline.
pub async fn create_farm(
    state: &AppState,
    principal: &Principal,
    payload: CreateFarmRequest,
) -> AppResult<ApiResponse<Farm>> {
    ensure_role(principal, Role::Farmer)?;
    let location = payload.validate()?;

    let existing = Farms::find()
        .filter(Column::OwnerId.eq(principal.user_id))
        .count(&state.orm)
        .await?;
    if existing > 0 {
        return Err(AppError::BadRequest("Farm already exists for this user".into()));
    }

    let farm = ActiveModel {
        id: Set(Uuid::new_v4()),
        owner_id: Set(principal.user_id),
        name: Set(payload.name.trim().to_string()),
        address: Set(payload.address.trim().to_string()),
        contact_phone: Set(payload.contact_phone.trim().to_string()),
        longitude: Set(location.longitude),
        latitude: Set(location.latitude),
        certification_score: Set(0.0),
        certifications: Set(serde_json::json!(payload.certifications)),
        rating: Set(0.0),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    tracing::info!(farm_id = %farm.id, owner_id = %principal.user_id, "farm created");

    Ok(ApiResponse::success(
        "Farm created",
        Farm::from(farm),
        Some(Meta::empty()),
    ))
}

pub async fn my_farm(state: &AppState, principal: &Principal) -> AppResult<ApiResponse<Farm>> {
    ensure_role(principal, Role::Farmer)?;
    let farm = Farms::find()
        .filter(Column::OwnerId.eq(principal.user_id))
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Farm profile"))?;
    Ok(ApiResponse::success("Farm", Farm::from(farm), None))
}

pub async fn get_farm(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Farm>> {
    let farm = Farms::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Farm"))?;
    Ok(ApiResponse::success("Farm", Farm::from(farm), None))
}
