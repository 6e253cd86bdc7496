use async_trait::async_trait;
use chrono::Utc;

use crate::external::price_provider::{PriceProvider, PriceProviderError};
use crate::models::{Period, PricePoint, SeriesSource};
use crate::services::price_service::generate_mock_series;

/// Offline provider producing random-walk series; never fails.
#[derive(Debug, Default)]
pub struct MockPriceProvider;

#[async_trait]
impl PriceProvider for MockPriceProvider {
    fn source(&self) -> SeriesSource {
        SeriesSource::Mock
    }

    async fn fetch_daily_history(
        &self,
        _ticker: &str,
        period: Period,
    ) -> Result<Vec<PricePoint>, PriceProviderError> {
        let today = Utc::now().date_naive();
        Ok(generate_mock_series(period.days(), today, &mut rand::rng()))
    }
}
