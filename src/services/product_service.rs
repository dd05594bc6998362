use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    domain::{access::owns_farm, geo::escape_like},
    dto::products::{
        CertifiedProduct, CertifiedProductList, CreateProductRequest, ProductList,
        UpdateProductRequest,
    },
    entity::{
        farms::{Column as FarmCol, Entity as Farms, Model as FarmModel},
        products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{Principal, Role, ensure_role},
    models::Product,
    pricing,
    response::{ApiResponse, Meta},
    routes::params::{Pagination, TopCertifiedQuery},
    state::AppState,
};

/// Farms with a certification score above this feed the top-certified listing.
const TOP_CERTIFIED_MIN_SCORE: f64 = 70.0;

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let product = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;
    Ok(ApiResponse::success("Product", Product::from(product), None))
}

/// Products of every farm the calling farmer operates, newest first.
pub async fn list_my_products(
    state: &AppState,
    principal: &Principal,
    pagination: Pagination,
) -> AppResult<ApiResponse<ProductList>> {
    ensure_role(principal, Role::Farmer)?;
    let (page, limit, offset) = pagination.normalize();

    let mut farm_ids: Vec<Uuid> = Farms::find()
        .filter(FarmCol::OwnerId.eq(principal.user_id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|farm| farm.id)
        .collect();
    if let Some(farm_id) = principal.farm_id.filter(|id| !farm_ids.contains(id)) {
        farm_ids.push(farm_id);
    }

    let finder = Products::find()
        .filter(Column::FarmId.is_in(farm_ids))
        .order_by_desc(Column::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    Ok(ApiResponse::success(
        "Products",
        ProductList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn create_product(
    state: &AppState,
    principal: &Principal,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_role(principal, Role::Farmer)?;
    payload.validate()?;

    let farm = own_farm(&state.orm, principal).await?;
    let (government_price, predicted_price) =
        pricing::reference_prices(state.prices.as_ref(), payload.name.trim()).await;

    let product = ActiveModel {
        id: Set(Uuid::new_v4()),
        farm_id: Set(farm.id),
        name: Set(payload.name.trim().to_string()),
        category: Set(payload.category.trim().to_string()),
        description: Set(payload.description),
        price: Set(payload.price),
        unit: Set(payload.unit.trim().to_string()),
        stock: Set(payload.stock),
        is_active: Set(true),
        is_organic: Set(payload.is_organic),
        government_price: Set(government_price),
        predicted_price: Set(predicted_price),
        rating: Set(0.0),
        tags: Set(serde_json::json!(payload.tags)),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    tracing::info!(product_id = %product.id, farm_id = %farm.id, "product created");

    Ok(ApiResponse::success(
        "Product created",
        Product::from(product),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    principal: &Principal,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    payload.validate()?;
    let existing = owned_product(&state.orm, principal, id).await?;

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(category) = payload.category {
        active.category = Set(category);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(price) = payload.price {
        active.price = Set(price);
    }
    if let Some(unit) = payload.unit {
        active.unit = Set(unit);
    }
    if let Some(stock) = payload.stock {
        active.stock = Set(stock);
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }
    if let Some(is_organic) = payload.is_organic {
        active.is_organic = Set(is_organic);
    }
    if let Some(tags) = payload.tags {
        active.tags = Set(serde_json::json!(tags));
    }
    active.updated_at = Set(Utc::now().into());

    let product = active.update(&state.orm).await?;

    Ok(ApiResponse::success(
        "Updated",
        Product::from(product),
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    principal: &Principal,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let product = owned_product(&state.orm, principal, id).await?;
    Products::delete_by_id(product.id).exec(&state.orm).await?;

    tracing::info!(product_id = %id, by = %principal.user_id, "product deleted");

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// Active products from highly certified farms, best farm first.
pub async fn top_certified(
    state: &AppState,
    query: TopCertifiedQuery,
) -> AppResult<ApiResponse<CertifiedProductList>> {
    let mut finder = Products::find()
        .find_also_related(Farms)
        .filter(Column::IsActive.eq(true))
        .filter(FarmCol::CertificationScore.gt(TOP_CERTIFIED_MIN_SCORE));

    if let Some(category) = query.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        finder = finder.filter(
            Expr::col((Products, Column::Category)).ilike(escape_like(category)),
        );
    }

    let items = finder
        .order_by_desc(FarmCol::CertificationScore)
        .order_by_desc(Column::Rating)
        .limit(query.limit() as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .filter_map(|(product, farm)| {
            farm.map(|farm| CertifiedProduct {
                farm_name: farm.name,
                farm_certification_score: farm.certification_score,
                product: Product::from(product),
            })
        })
        .collect();

    Ok(ApiResponse::success(
        "Top certified products",
        CertifiedProductList { items },
        Some(Meta::empty()),
    ))
}

/// The farm new products are listed under: the session's farm when it has one, otherwise
/// the caller's first farm.
async fn own_farm<C: ConnectionTrait>(db: &C, principal: &Principal) -> AppResult<FarmModel> {
    if let Some(farm_id) = principal.farm_id {
        let farm = Farms::find_by_id(farm_id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::not_found("Farm"))?;
        if !owns_farm(principal, Some(farm.owner_id)) {
            return Err(AppError::forbidden());
        }
        return Ok(farm);
    }

    Farms::find()
        .filter(FarmCol::OwnerId.eq(principal.user_id))
        .order_by_asc(FarmCol::CreatedAt)
        .one(db)
        .await?
        .ok_or_else(|| AppError::BadRequest("Create a farm before adding products".into()))
}

async fn owned_product<C: ConnectionTrait>(
    db: &C,
    principal: &Principal,
    id: Uuid,
) -> AppResult<ProductModel> {
    let (product, farm) = Products::find_by_id(id)
        .find_also_related(Farms)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;

    let allowed = principal.is_admin()
        || principal.farm_id == Some(product.farm_id)
        || owns_farm(principal, farm.map(|f| f.owner_id));
    if !allowed {
        return Err(AppError::forbidden());
    }
    Ok(product)
}
