use chrono::Duration;
use farm_market_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    middleware::auth::{Principal, Role, issue_token},
};
use serde_json::json;
use uuid::Uuid;

struct SeedFarm {
    owner_email: &'static str,
    name: &'static str,
    address: &'static str,
    longitude: f64,
    latitude: f64,
    certification_score: f64,
    certifications: &'static [&'static str],
    products: &'static [(&'static str, &'static str, i64, &'static str, i32, bool)],
}

const FARMS: &[SeedFarm] = &[
    SeedFarm {
        owner_email: "farmer.green@example.com",
        name: "Green Valley Organics",
        address: "Survey 42, Hadapsar, Pune",
        longitude: 73.9260,
        latitude: 18.5089,
        certification_score: 86.0,
        certifications: &["NPOP Organic", "PGS-India"],
        products: &[
            ("Tomato", "vegetables", 40, "kg", 120, true),
            ("Spinach", "leafy greens", 25, "bunch", 80, true),
            ("Alphonso Mango", "fruits", 600, "dozen", 30, false),
        ],
    },
    SeedFarm {
        owner_email: "farmer.river@example.com",
        name: "Riverbend Dairy & Farm",
        address: "Plot 7, Wagholi, Pune",
        longitude: 73.9800,
        latitude: 18.5800,
        certification_score: 64.0,
        certifications: &["FSSAI"],
        products: &[
            ("Cow Milk", "dairy", 60, "litre", 200, false),
            ("Paneer", "dairy", 90, "250 g", 40, false),
            ("Tomato", "vegetables", 35, "kg", 60, false),
        ],
    },
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;

    let admin_id = ensure_user(&pool, "admin@example.com", "Admin", Role::Admin).await?;
    let buyer_id = ensure_user(&pool, "buyer@example.com", "Asha Buyer", Role::Buyer).await?;

    let ttl = Duration::days(7);
    println!("admin  {admin_id}: {}", token(&config, admin_id, Role::Admin, None, ttl)?);
    println!("buyer  {buyer_id}: {}", token(&config, buyer_id, Role::Buyer, None, ttl)?);

    for farm in FARMS {
        let owner_id = ensure_user(&pool, farm.owner_email, farm.name, Role::Farmer).await?;
        let farm_id = ensure_farm(&pool, owner_id, farm).await?;
        for product in farm.products {
            ensure_product(&pool, farm_id, product).await?;
        }
        println!(
            "farmer {owner_id} ({}): {}",
            farm.name,
            token(&config, owner_id, Role::Farmer, Some(farm_id), ttl)?
        );
    }

    println!("Seed completed");
    Ok(())
}

fn token(
    config: &AppConfig,
    user_id: Uuid,
    role: Role,
    farm_id: Option<Uuid>,
    ttl: Duration,
) -> anyhow::Result<String> {
    let principal = Principal {
        user_id,
        role,
        farm_id,
    };
    issue_token(&principal, &config.jwt_secret, ttl).map_err(|e| anyhow::anyhow!(e.to_string()))
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    name: &str,
    role: Role,
) -> anyhow::Result<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, name, role)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role, name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(name)
    .bind(role.as_str())
    .fetch_one(pool)
    .await?;
    Ok(id)
}

async fn ensure_farm(pool: &sqlx::PgPool, owner_id: Uuid, farm: &SeedFarm) -> anyhow::Result<Uuid> {
    let existing: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM farms WHERE owner_id = $1")
        .bind(owner_id)
        .fetch_optional(pool)
        .await?;
    if let Some((id,)) = existing {
        return Ok(id);
    }

    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO farms (id, owner_id, name, address, contact_phone, longitude, latitude,
                           certification_score, certifications)
        VALUES ($1, $2, $3, $4, '+91 20 0000 0000', $5, $6, $7, $8)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(owner_id)
    .bind(farm.name)
    .bind(farm.address)
    .bind(farm.longitude)
    .bind(farm.latitude)
    .bind(farm.certification_score)
    .bind(json!(farm.certifications))
    .fetch_one(pool)
    .await?;
    Ok(id)
}

async fn ensure_product(
    pool: &sqlx::PgPool,
    farm_id: Uuid,
    (name, category, price, unit, stock, organic): &(&str, &str, i64, &str, i32, bool),
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO products (id, farm_id, name, category, price, unit, stock, is_organic)
        SELECT $1, $2, $3, $4, $5, $6, $7, $8
        WHERE NOT EXISTS (SELECT 1 FROM products WHERE farm_id = $2 AND name = $3)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(farm_id)
    .bind(*name)
    .bind(*category)
    .bind(*price)
    .bind(*unit)
    .bind(*stock)
    .bind(*organic)
    .execute(pool)
    .await?;
    Ok(())
}
