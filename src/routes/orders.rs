use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
};
use uuid::Uuid;

use crate::{
    dto::orders::{
        CheckoutResult, CreateOrderRequest, OrderList, RegenerateCodeResponse,
        UpdateAddressRequest, UpdateOrderStatusRequest, VerifyDeliveryRequest,
        VerifyDeliveryResponse,
    },
    error::AppResult,
    middleware::auth::Principal,
    models::Order,
    response::ApiResponse,
    routes::params::OrderListQuery,
    services::{order_service, verification_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_order))
        .route("/mine", get(list_my_orders))
        .route("/farmer-orders", get(list_farmer_orders))
        .route("/farm/{farm_id}", get(list_farm_orders))
        .route("/verify", post(verify_delivery))
        .route("/{id}", get(get_order))
        .route("/{id}/status", patch(update_order_status))
        .route("/{id}/cancel", post(cancel_order))
        .route("/{id}/regenerate-code", post(regenerate_code))
        .route("/{id}/address", patch(update_delivery_address))
}

#[utoipa::path(
    post,
    path = "/api/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "One order, or one order per farm with `multi: true`", body = ApiResponse<CheckoutResult>),
        (status = 400, description = "Validation failed or insufficient stock"),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<CheckoutResult>>)> {
    let resp = order_service::create_order(&state, &principal, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/orders/mine",
    params(OrderListQuery),
    responses(
        (status = 200, description = "Orders placed by the caller", body = ApiResponse<OrderList>),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_my_orders(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = order_service::list_buyer_orders(&state, &principal, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders/farmer-orders",
    params(OrderListQuery),
    responses(
        (status = 200, description = "Orders assigned to the calling farmer", body = ApiResponse<OrderList>),
        (status = 403, description = "Caller is not a farmer"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_farmer_orders(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = order_service::list_farmer_orders(&state, &principal, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders/farm/{farm_id}",
    params(
        ("farm_id" = Uuid, Path, description = "Farm ID"),
        OrderListQuery
    ),
    responses(
        (status = 200, description = "Orders of one farm", body = ApiResponse<OrderList>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Farm not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_farm_orders(
    State(state): State<AppState>,
    principal: Principal,
    Path(farm_id): Path<Uuid>,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = order_service::list_farm_orders(&state, &principal, farm_id, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order detail", body = ApiResponse<Order>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Order not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = order_service::get_order(&state, &principal, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/orders/{id}/status",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<Order>),
        (status = 400, description = "Transition not allowed"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Order not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = order_service::update_order_status(&state, &principal, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/cancel",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order cancelled and stock restored", body = ApiResponse<Order>),
        (status = 400, description = "Order already delivered or cancelled"),
        (status = 403, description = "Only the buyer can cancel"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = order_service::cancel_order(&state, &principal, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/verify",
    request_body = VerifyDeliveryRequest,
    responses(
        (status = 200, description = "Delivery verified", body = ApiResponse<VerifyDeliveryResponse>),
        (status = 400, description = "Rejected; `data.reason` is one of not_required, already_verified, invalid_state, invalid_code, code_reused, expired"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Order not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn verify_delivery(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<VerifyDeliveryRequest>,
) -> AppResult<Json<ApiResponse<VerifyDeliveryResponse>>> {
    let resp = verification_service::verify_delivery(&state, &principal, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/regenerate-code",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "New code issued; the code is only returned to the buyer", body = ApiResponse<RegenerateCodeResponse>),
        (status = 400, description = "Order does not accept a new code"),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn regenerate_code(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<RegenerateCodeResponse>>> {
    let resp = verification_service::regenerate_code(&state, &principal, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/orders/{id}/address",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    request_body = UpdateAddressRequest,
    responses(
        (status = 200, description = "Address updated", body = ApiResponse<Order>),
        (status = 400, description = "Invalid address or order already closed"),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn update_delivery_address(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAddressRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = order_service::update_delivery_address(&state, &principal, id, payload).await?;
    Ok(Json(resp))
}
