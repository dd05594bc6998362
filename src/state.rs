use std::sync::Arc;

use crate::{
    db::{DbPool, OrmConn},
    pricing::{NoPriceReference, PriceReference},
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub jwt_secret: Arc<str>,
    pub prices: Arc<dyn PriceReference>,
}

impl AppState {
    pub fn new(pool: DbPool, orm: OrmConn, jwt_secret: &str) -> Self {
        Self {
            pool,
            orm,
            jwt_secret: Arc::from(jwt_secret),
            prices: Arc::new(NoPriceReference),
        }
    }

    pub fn with_price_reference(mut self, prices: Arc<dyn PriceReference>) -> Self {
        self.prices = prices;
        self
    }
}
