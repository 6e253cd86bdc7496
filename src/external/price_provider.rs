use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Period, PricePoint, SeriesSource};

#[derive(Debug, Error)]
pub enum PriceProviderError {
    #[error("network error: {0}")]
    Network(String),

    #[error("bad response: {0}")]
    BadResponse(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("ticker not found")]
    NotFound,

    #[error("rate limited")]
    RateLimited,
}

#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Tag reported to clients for series this provider produced.
    fn source(&self) -> SeriesSource;

    /// Daily closes covering `period`, ascending by date.
    async fn fetch_daily_history(
        &self,
        ticker: &str,
        period: Period,
    ) -> Result<Vec<PricePoint>, PriceProviderError>;
}
