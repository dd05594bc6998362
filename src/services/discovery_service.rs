//! Location-aware product discovery.
//!
//! Distances and ranking are computed in PostgreSQL so only the final page leaves the
//! database. See [`geo::distance_sql`] for the distance expression.

use serde_json::Value;
use sqlx::{FromRow, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    domain::geo::{self, GeoPoint, METRES_PER_SCORE_POINT},
    dto::products::{FarmSummary, NearbyProduct, NearbyProducts, SearchProduct, SearchProductList},
    error::{AppError, AppResult},
    middleware::auth::Principal,
    models::string_list,
    response::{ApiResponse, Meta},
    routes::params::{NearbyQuery, SearchQuery, SearchSortBy},
    state::AppState,
};

#[derive(Debug, FromRow)]
struct NearbyRow {
    id: Uuid,
    name: String,
    category: String,
    description: Option<String>,
    price: i64,
    unit: String,
    stock: i32,
    is_organic: bool,
    rating: f64,
    tags: Value,
    farm_id: Uuid,
    farm_name: String,
    farm_address: String,
    farm_longitude: f64,
    farm_latitude: f64,
    certification_score: f64,
    certifications: Value,
    farm_rating: f64,
    distance_m: f64,
    final_score: f64,
}

impl From<NearbyRow> for NearbyProduct {
    fn from(row: NearbyRow) -> Self {
        NearbyProduct {
            id: row.id,
            name: row.name,
            category: row.category,
            description: row.description,
            price: row.price,
            unit: row.unit,
            stock: row.stock,
            is_organic: row.is_organic,
            rating: row.rating,
            tags: string_list(row.tags),
            distance_km: round_to(row.distance_m / 1000.0, 1),
            final_score: round_to(row.final_score, 2),
            farm: FarmSummary {
                id: row.farm_id,
                name: row.farm_name,
                address: row.farm_address,
                location: GeoPoint {
                    longitude: row.farm_longitude,
                    latitude: row.farm_latitude,
                },
                certification_score: row.certification_score,
                certifications: string_list(row.certifications),
                rating: row.farm_rating,
            },
        }
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Farm and owner a farmer caller should not see in their own results.
fn own_farm_filter(principal: Option<&Principal>) -> (Option<Uuid>, Option<Uuid>) {
    match principal {
        Some(p) if p.is_farmer() => (Some(p.user_id), p.farm_id),
        _ => (None, None),
    }
}

/// Farms near a point, best composite score first, flattened to one row per product.
///
/// A farm's score is `certification_score - distance_m / 100`. Only farms with at least
/// one active product matching `query` are ranked, and only the top `limit` farms are
/// returned.
pub async fn nearby_products(
    state: &AppState,
    principal: Option<&Principal>,
    query: NearbyQuery,
) -> AppResult<ApiResponse<NearbyProducts>> {
    let (Some(longitude), Some(latitude)) = (query.longitude, query.latitude) else {
        return Err(AppError::BadRequest(
            "Longitude and latitude are required".into(),
        ));
    };
    let origin = GeoPoint::new(longitude, latitude)?;

    let radius_km = query.radius_km();
    if !radius_km.is_finite() || radius_km <= 0.0 {
        return Err(AppError::BadRequest("Radius must be greater than 0".into()));
    }
    let radius_m = radius_km * 1000.0;
    let min_score = query.min_score.unwrap_or(0.0);
    let pattern = geo::contains_pattern(query.query.as_deref());
    let (exclude_owner, exclude_farm) = own_farm_filter(principal);
    let (lat_min, lat_max) = origin.latitude_band(radius_m);

    let distance = geo::distance_sql("$1", "$2", "f.latitude", "f.longitude");
    let sql = format!(
        r#"
        WITH in_range AS (
            SELECT f.id, f.name, f.address, f.longitude, f.latitude,
                   f.certification_score, f.certifications, f.rating,
                   {distance} AS distance_m
            FROM farms f
            WHERE f.latitude BETWEEN $3 AND $4
              AND f.certification_score >= $5
              AND ($7::uuid IS NULL OR f.owner_id <> $7)
              AND ($8::uuid IS NULL OR f.id <> $8)
        ),
        ranked AS (
            SELECT r.*, r.certification_score - r.distance_m / {METRES_PER_SCORE_POINT} AS final_score
            FROM in_range r
            WHERE r.distance_m <= $6
              AND EXISTS (
                  SELECT 1 FROM products p
                  WHERE p.farm_id = r.id AND p.is_active
                    AND ($9::text IS NULL OR p.name ILIKE $9)
              )
            ORDER BY final_score DESC
            LIMIT $10
        )
        SELECT p.id, p.name, p.category, p.description, p.price, p.unit, p.stock,
               p.is_organic, p.rating, p.tags,
               r.id AS farm_id, r.name AS farm_name, r.address AS farm_address,
               r.longitude AS farm_longitude, r.latitude AS farm_latitude,
               r.certification_score, r.certifications, r.rating AS farm_rating,
               r.distance_m, r.final_score
        FROM ranked r
        JOIN products p ON p.farm_id = r.id
        WHERE p.is_active AND ($9::text IS NULL OR p.name ILIKE $9)
        ORDER BY r.final_score DESC, r.id, p.created_at DESC
        "#
    );

    let rows = sqlx::query_as::<_, NearbyRow>(&sql)
        .bind(origin.latitude)
        .bind(origin.longitude)
        .bind(lat_min)
        .bind(lat_max)
        .bind(min_score)
        .bind(radius_m)
        .bind(exclude_owner)
        .bind(exclude_farm)
        .bind(pattern)
        .bind(query.limit())
        .fetch_all(&state.pool)
        .await?;

    let products: Vec<NearbyProduct> = rows.into_iter().map(NearbyProduct::from).collect();

    tracing::debug!(
        longitude,
        latitude,
        radius_km,
        results = products.len(),
        "nearby products"
    );

    Ok(ApiResponse::success(
        "Nearby products",
        NearbyProducts {
            count: products.len(),
            radius: radius_km,
            user_location: origin,
            products,
        },
        Some(Meta::empty()),
    ))
}

#[derive(Debug, FromRow)]
struct SearchRow {
    id: Uuid,
    name: String,
    category: String,
    description: Option<String>,
    price: i64,
    unit: String,
    stock: i32,
    is_organic: bool,
    is_active: bool,
    government_price: Option<i64>,
    predicted_price: Option<i64>,
    rating: f64,
    tags: Value,
    created_at: chrono::DateTime<chrono::Utc>,
    distance_m: Option<f64>,
    farm_id: Uuid,
    farm_name: String,
    farm_address: String,
    farm_longitude: f64,
    farm_latitude: f64,
    certification_score: f64,
    certifications: Value,
    farm_rating: f64,
}

impl From<SearchRow> for SearchProduct {
    fn from(row: SearchRow) -> Self {
        SearchProduct {
            id: row.id,
            name: row.name,
            category: row.category,
            description: row.description,
            price: row.price,
            unit: row.unit,
            stock: row.stock,
            is_organic: row.is_organic,
            is_active: row.is_active,
            government_price: row.government_price,
            predicted_price: row.predicted_price,
            rating: row.rating,
            tags: string_list(row.tags),
            created_at: row.created_at,
            distance: row.distance_m,
            farm: FarmSummary {
                id: row.farm_id,
                name: row.farm_name,
                address: row.farm_address,
                location: GeoPoint {
                    longitude: row.farm_longitude,
                    latitude: row.farm_latitude,
                },
                certification_score: row.certification_score,
                certifications: string_list(row.certifications),
                rating: row.farm_rating,
            },
        }
    }
}

/// Validated search filters.
#[derive(Debug, Clone, Default)]
struct SearchFilters {
    pattern: Option<String>,
    category: Option<String>,
    min_price: Option<i64>,
    max_price: Option<i64>,
    is_organic: Option<bool>,
    min_cert_score: f64,
    origin: Option<GeoPoint>,
    radius_m: Option<f64>,
    exclude_owner: Option<Uuid>,
    exclude_farm: Option<Uuid>,
}

impl SearchFilters {
    fn from_query(query: &SearchQuery, principal: Option<&Principal>) -> AppResult<Self> {
        let origin = match (query.longitude, query.latitude) {
            (Some(lng), Some(lat)) => Some(GeoPoint::new(lng, lat)?),
            (None, None) => None,
            _ => {
                return Err(AppError::BadRequest(
                    "Latitude and longitude must be given together".into(),
                ));
            }
        };
        if query.radius.is_some_and(|r| !r.is_finite() || r <= 0.0) {
            return Err(AppError::BadRequest("Radius must be greater than 0".into()));
        }
        if let (Some(min), Some(max)) = (query.min_price, query.max_price) {
            if min > max {
                return Err(AppError::BadRequest(
                    "min_price cannot exceed max_price".into(),
                ));
            }
        }
        let (exclude_owner, exclude_farm) = own_farm_filter(principal);
        Ok(SearchFilters {
            pattern: geo::contains_pattern(query.query.as_deref()),
            category: query
                .category
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(geo::escape_like),
            min_price: query.min_price,
            max_price: query.max_price,
            is_organic: query.is_organic,
            min_cert_score: query.min_cert_score.unwrap_or(0.0),
            radius_m: origin.and(query.radius),
            origin,
            exclude_owner,
            exclude_farm,
        })
    }

    /// `FROM ... WHERE ...` shared by the page and count queries.
    fn push_body(&self, qb: &mut QueryBuilder<'static, Postgres>) {
        qb.push(" FROM products p JOIN farms f ON f.id = p.farm_id");
        if let Some(origin) = self.origin {
            qb.push(" CROSS JOIN (SELECT ");
            qb.push_bind(origin.latitude);
            qb.push("::float8 AS lat, ");
            qb.push_bind(origin.longitude);
            qb.push("::float8 AS lng) o");
        }
        qb.push(" WHERE p.is_active AND f.certification_score >= ");
        qb.push_bind(self.min_cert_score);

        if let Some(pattern) = &self.pattern {
            qb.push(" AND p.name ILIKE ").push_bind(pattern.clone());
        }
        if let Some(category) = &self.category {
            qb.push(" AND p.category ILIKE ").push_bind(category.clone());
        }
        if let Some(min) = self.min_price {
            qb.push(" AND p.price >= ").push_bind(min);
        }
        if let Some(max) = self.max_price {
            qb.push(" AND p.price <= ").push_bind(max);
        }
        if let Some(organic) = self.is_organic {
            qb.push(" AND p.is_organic = ").push_bind(organic);
        }
        if let Some(owner) = self.exclude_owner {
            qb.push(" AND f.owner_id <> ").push_bind(owner);
        }
        if let Some(farm) = self.exclude_farm {
            qb.push(" AND f.id <> ").push_bind(farm);
        }
        if let (Some(origin), Some(radius_m)) = (self.origin, self.radius_m) {
            let (lat_min, lat_max) = origin.latitude_band(radius_m);
            qb.push(" AND f.latitude BETWEEN ")
                .push_bind(lat_min)
                .push(" AND ")
                .push_bind(lat_max);
            qb.push(" AND ")
                .push(self.distance_expr())
                .push(" <= ")
                .push_bind(radius_m);
        }
    }

    fn distance_expr(&self) -> String {
        geo::distance_sql("o.lat", "o.lng", "f.latitude", "f.longitude")
    }

    fn order_by(&self, sort_by: Option<SearchSortBy>) -> &'static str {
        let sort_by = match sort_by {
            Some(SearchSortBy::Distance) if self.origin.is_none() => None,
            None if self.origin.is_some() => Some(SearchSortBy::Distance),
            other => other,
        };
        match sort_by {
            Some(SearchSortBy::Distance) => " ORDER BY distance_m ASC, p.id",
            Some(SearchSortBy::CertScore) => " ORDER BY f.certification_score DESC, p.id",
            Some(SearchSortBy::Price) => " ORDER BY p.price ASC, p.id",
            None => " ORDER BY p.created_at DESC, p.id",
        }
    }
}

/// Product-first search over active products with optional location filtering.
pub async fn search_products(
    state: &AppState,
    principal: Option<&Principal>,
    query: SearchQuery,
) -> AppResult<ApiResponse<SearchProductList>> {
    let filters = SearchFilters::from_query(&query, principal)?;
    let (page, limit, offset) = query.pagination().normalize();

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
    filters.push_body(&mut count);
    let total: i64 = count
        .build_query_scalar()
        .fetch_one(&state.pool)
        .await?;

    let mut select = QueryBuilder::<Postgres>::new(
        "SELECT p.id, p.name, p.category, p.description, p.price, p.unit, p.stock, \
         p.is_organic, p.is_active, p.government_price, p.predicted_price, p.rating, p.tags, \
         p.created_at, \
         f.id AS farm_id, f.name AS farm_name, f.address AS farm_address, \
         f.longitude AS farm_longitude, f.latitude AS farm_latitude, \
         f.certification_score, f.certifications, f.rating AS farm_rating, ",
    );
    if filters.origin.is_some() {
        select
            .push("round(")
            .push(filters.distance_expr())
            .push(") AS distance_m");
    } else {
        select.push("NULL::float8 AS distance_m");
    }
    filters.push_body(&mut select);
    select.push(filters.order_by(query.sort_by));
    select.push(" LIMIT ").push_bind(limit);
    select.push(" OFFSET ").push_bind(offset);

    let items: Vec<SearchProduct> = select
        .build_query_as::<SearchRow>()
        .fetch_all(&state.pool)
        .await?
        .into_iter()
        .map(SearchProduct::from)
        .collect();

    Ok(ApiResponse::success(
        "Products",
        SearchProductList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::auth::Role;

    fn query() -> SearchQuery {
        SearchQuery::default()
    }

    #[test]
    fn rounding_matches_response_precision() {
        assert_eq!(round_to(1234.0 / 1000.0, 1), 1.2);
        assert_eq!(round_to(87.456, 2), 87.46);
    }

    #[test]
    fn distance_sort_needs_coordinates() {
        let filters = SearchFilters::from_query(&query(), None).unwrap();
        assert_eq!(
            filters.order_by(Some(SearchSortBy::Distance)),
            " ORDER BY p.created_at DESC, p.id"
        );

        let located = SearchFilters::from_query(
            &SearchQuery {
                latitude: Some(18.52),
                longitude: Some(73.85),
                ..query()
            },
            None,
        )
        .unwrap();
        assert_eq!(located.order_by(None), " ORDER BY distance_m ASC, p.id");
        assert_eq!(
            located.order_by(Some(SearchSortBy::Price)),
            " ORDER BY p.price ASC, p.id"
        );
    }

    #[test]
    fn radius_without_coordinates_is_ignored() {
        let filters = SearchFilters::from_query(
            &SearchQuery {
                radius: Some(5000.0),
                ..query()
            },
            None,
        )
        .unwrap();
        assert_eq!(filters.radius_m, None);
    }

    #[test]
    fn half_a_location_is_rejected() {
        let result = SearchFilters::from_query(
            &SearchQuery {
                latitude: Some(18.52),
                ..query()
            },
            None,
        );
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn farmers_are_excluded_from_their_own_results() {
        let farmer = Principal {
            user_id: Uuid::new_v4(),
            role: Role::Farmer,
            farm_id: Some(Uuid::new_v4()),
        };
        let filters = SearchFilters::from_query(&query(), Some(&farmer)).unwrap();
        assert_eq!(filters.exclude_owner, Some(farmer.user_id));
        assert_eq!(filters.exclude_farm, farmer.farm_id);

        let buyer = Principal {
            role: Role::Buyer,
            ..farmer
        };
        let filters = SearchFilters::from_query(&query(), Some(&buyer)).unwrap();
        assert_eq!(filters.exclude_owner, None);
    }
}
