#![allow(dead_code)]

use farm_market_api::{
    db::{create_orm_conn, create_pool, run_migrations},
    entity::{
        farms::ActiveModel as FarmActive, products::ActiveModel as ProductActive,
        products::Entity as Products, users::ActiveModel as UserActive,
    },
    middleware::auth::{Principal, Role},
    state::AppState,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde_json::json;
use uuid::Uuid;

/// Connect and migrate, or `None` when no database is configured.
pub async fn test_state() -> anyhow::Result<Option<AppState>> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration tests."
            );
            return Ok(None);
        }
    };

    let pool = create_pool(&database_url).await?;
    let orm = create_orm_conn(&database_url).await?;
    run_migrations(&orm).await?;

    Ok(Some(AppState::new(pool, orm, "test-secret")))
}

pub fn principal(user_id: Uuid, role: Role, farm_id: Option<Uuid>) -> Principal {
    Principal {
        user_id,
        role,
        farm_id,
    }
}

pub async fn create_user(state: &AppState, role: Role) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    let user = UserActive {
        id: Set(id),
        email: Set(format!("{}-{id}@example.com", role.as_str())),
        name: Set(format!("test {}", role.as_str())),
        role: Set(role.as_str().to_string()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(user.id)
}

pub async fn create_farm(
    state: &AppState,
    owner_id: Uuid,
    longitude: f64,
    latitude: f64,
    certification_score: f64,
) -> anyhow::Result<Uuid> {
    let farm = FarmActive {
        id: Set(Uuid::new_v4()),
        owner_id: Set(owner_id),
        name: Set(format!("Farm {}", Uuid::new_v4().simple())),
        address: Set("1 Test Lane".into()),
        contact_phone: Set("+91 20 0000 0000".into()),
        longitude: Set(longitude),
        latitude: Set(latitude),
        certification_score: Set(certification_score),
        certifications: Set(json!(["PGS-India"])),
        rating: Set(4.0),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(farm.id)
}

pub async fn create_product(
    state: &AppState,
    farm_id: Uuid,
    name: &str,
    category: &str,
    price: i64,
    stock: i32,
) -> anyhow::Result<Uuid> {
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        farm_id: Set(farm_id),
        name: Set(name.to_string()),
        category: Set(category.to_string()),
        description: Set(None),
        price: Set(price),
        unit: Set("kg".into()),
        stock: Set(stock),
        is_active: Set(true),
        is_organic: Set(false),
        government_price: Set(None),
        predicted_price: Set(None),
        rating: Set(0.0),
        tags: Set(json!([])),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(product.id)
}

pub async fn stock_of(state: &AppState, product_id: Uuid) -> anyhow::Result<i32> {
    let product = Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| anyhow::anyhow!("product {product_id} vanished"))?;
    Ok(product.stock)
}

/// A farmer with one farm at the given point.
pub async fn farmer_with_farm(
    state: &AppState,
    longitude: f64,
    latitude: f64,
    certification_score: f64,
) -> anyhow::Result<(Principal, Uuid)> {
    let owner = create_user(state, Role::Farmer).await?;
    let farm_id = create_farm(state, owner, longitude, latitude, certification_score).await?;
    Ok((principal(owner, Role::Farmer, Some(farm_id)), farm_id))
}
