use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::products::{
        CertifiedProductList, CreateProductRequest, NearbyProducts, ProductList,
        SearchProductList, UpdateProductRequest,
    },
    error::AppResult,
    middleware::auth::Principal,
    models::Product,
    response::ApiResponse,
    routes::params::{NearbyQuery, Pagination, SearchQuery, TopCertifiedQuery},
    services::{discovery_service, product_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_product))
        .route("/nearby", get(nearby_products))
        .route("/search", get(search_products))
        .route("/mine", get(my_products))
        .route("/top-certified", get(top_certified))
        .route(
            "/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
}

#[utoipa::path(
    get,
    path = "/api/products/nearby",
    params(NearbyQuery),
    responses(
        (status = 200, description = "Products from nearby farms ranked by certification and distance", body = ApiResponse<NearbyProducts>),
        (status = 400, description = "Missing or invalid coordinates or radius"),
    ),
    tag = "Products"
)]
pub async fn nearby_products(
    State(state): State<AppState>,
    principal: Option<Principal>,
    Query(query): Query<NearbyQuery>,
) -> AppResult<Json<ApiResponse<NearbyProducts>>> {
    let resp = discovery_service::nearby_products(&state, principal.as_ref(), query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/search",
    params(SearchQuery),
    responses(
        (status = 200, description = "Filtered product search", body = ApiResponse<SearchProductList>),
        (status = 400, description = "Invalid filters"),
    ),
    tag = "Products"
)]
pub async fn search_products(
    State(state): State<AppState>,
    principal: Option<Principal>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<ApiResponse<SearchProductList>>> {
    let resp = discovery_service::search_products(&state, principal.as_ref(), query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/top-certified",
    params(TopCertifiedQuery),
    responses(
        (status = 200, description = "Products from farms with a certification score above 70", body = ApiResponse<CertifiedProductList>)
    ),
    tag = "Products"
)]
pub async fn top_certified(
    State(state): State<AppState>,
    Query(query): Query<TopCertifiedQuery>,
) -> AppResult<Json<ApiResponse<CertifiedProductList>>> {
    let resp = product_service::top_certified(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/mine",
    params(Pagination),
    responses(
        (status = 200, description = "Products of the caller's farms", body = ApiResponse<ProductList>),
        (status = 403, description = "Caller is not a farmer"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn my_products(
    State(state): State<AppState>,
    principal: Principal,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = product_service::list_my_products(&state, &principal, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Get product", body = ApiResponse<Product>),
        (status = 404, description = "Product not found"),
    ),
    tag = "Products"
)]
pub async fn get_product(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = product_service::get_product(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Create product", body = ApiResponse<Product>),
        (status = 400, description = "Invalid product or caller has no farm"),
        (status = 403, description = "Caller is not a farmer"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<CreateProductRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Product>>)> {
    let resp = product_service::create_product(&state, &principal, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    put,
    path = "/api/products/{id}",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Updated product", body = ApiResponse<Product>),
        (status = 403, description = "Product belongs to another farm"),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = product_service::update_product(&state, &principal, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/products/{id}",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Deleted product", body = ApiResponse<serde_json::Value>),
        (status = 403, description = "Product belongs to another farm"),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = product_service::delete_product(&state, &principal, id).await?;
    Ok(Json(resp))
}
