use async_trait::async_trait;

/// Reference prices from outside services (government market data, price prediction).
///
/// Both lookups are advisory: callers store `None` when a source has nothing or fails.
#[async_trait]
pub trait PriceReference: Send + Sync {
    async fn government_price(&self, commodity: &str) -> anyhow::Result<Option<i64>>;
    async fn predicted_price(&self, commodity: &str) -> anyhow::Result<Option<i64>>;
}

/// Used when no price services are configured.
#[derive(Debug, Default, Clone)]
pub struct NoPriceReference;

#[async_trait]
impl PriceReference for NoPriceReference {
    async fn government_price(&self, _commodity: &str) -> anyhow::Result<Option<i64>> {
        Ok(None)
    }

    async fn predicted_price(&self, _commodity: &str) -> anyhow::Result<Option<i64>> {
        Ok(None)
    }
}

/// Look up both reference prices, logging and discarding failures.
pub async fn reference_prices(prices: &dyn PriceReference, commodity: &str) -> (Option<i64>, Option<i64>) {
    let government = prices.government_price(commodity).await.unwrap_or_else(|err| {
        tracing::warn!(commodity, error = %err, "government price lookup failed");
        None
    });
    let predicted = prices.predicted_price(commodity).await.unwrap_or_else(|err| {
        tracing::warn!(commodity, error = %err, "price prediction failed");
        None
    });
    (government, predicted)
}
