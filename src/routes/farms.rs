use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::farms::CreateFarmRequest,
    error::AppResult,
    middleware::auth::Principal,
    models::Farm,
    response::ApiResponse,
    services::farm_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_farm))
        .route("/mine", get(my_farm))
        .route("/{id}", get(get_farm))
}

#[utoipa::path(
    post,
    path = "/api/farms",
    request_body = CreateFarmRequest,
    responses(
        (status = 201, description = "Farm created", body = ApiResponse<Farm>),
        (status = 400, description = "Invalid farm or the caller already has one"),
        (status = 403, description = "Caller is not a farmer"),
    ),
    security(("bearer_auth" = [])),
    tag = "Farms"
)]
pub async fn create_farm(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<CreateFarmRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Farm>>)> {
    let resp = farm_service::create_farm(&state, &principal, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/farms/mine",
    responses(
        (status = 200, description = "The caller's farm", body = ApiResponse<Farm>),
        (status = 404, description = "Farm profile not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Farms"
)]
pub async fn my_farm(
    State(state): State<AppState>,
    principal: Principal,
) -> AppResult<Json<ApiResponse<Farm>>> {
    let resp = farm_service::my_farm(&state, &principal).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/farms/{id}",
    params(
        ("id" = Uuid, Path, description = "Farm ID")
    ),
    responses(
        (status = 200, description = "Farm detail", body = ApiResponse<Farm>),
        (status = 404, description = "Farm not found"),
    ),
    tag = "Farms"
)]
pub async fn get_farm(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Farm>>> {
    let resp = farm_service::get_farm(&state, id).await?;
    Ok(Json(resp))
}
