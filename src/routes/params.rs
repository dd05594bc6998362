use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::domain::status::OrderStatus;

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
pub struct Pagination {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl Pagination {
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * per_page;
        (page, per_page, offset)
    }
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
pub struct OrderListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<OrderStatus>,
}

impl OrderListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
pub struct NearbyQuery {
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    /// Kilometres, default 10.
    pub radius: Option<f64>,
    pub min_score: Option<f64>,
    pub query: Option<String>,
    pub limit: Option<i64>,
}

impl NearbyQuery {
    pub const DEFAULT_RADIUS_KM: f64 = 10.0;
    pub const DEFAULT_LIMIT: i64 = 20;

    pub fn radius_km(&self) -> f64 {
        self.radius.unwrap_or(Self::DEFAULT_RADIUS_KM)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, 100)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SearchSortBy {
    Distance,
    CertScore,
    Price,
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
pub struct SearchQuery {
    pub query: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub is_organic: Option<bool>,
    pub min_cert_score: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Metres; only applied together with coordinates.
    pub radius: Option<f64>,
    pub sort_by: Option<SearchSortBy>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl SearchQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
pub struct TopCertifiedQuery {
    pub category: Option<String>,
    pub limit: Option<i64>,
}

impl TopCertifiedQuery {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(10).clamp(1, 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_clamps_page_and_size() {
        let p = Pagination {
            page: Some(0),
            per_page: Some(500),
        };
        assert_eq!(p.normalize(), (1, 100, 0));
        let p = Pagination {
            page: Some(3),
            per_page: Some(10),
        };
        assert_eq!(p.normalize(), (3, 10, 20));
    }

    #[test]
    fn nearby_defaults_and_limit_clamp() {
        let q = NearbyQuery::default();
        assert_eq!(q.radius_km(), 10.0);
        assert_eq!(q.limit(), 20);
        let q = NearbyQuery {
            limit: Some(0),
            ..Default::default()
        };
        assert_eq!(q.limit(), 1);
    }
}
