use std::collections::BTreeMap;

use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use futures::future::join_all;
use rand::Rng;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::external::price_provider::{PriceProvider, PriceProviderError};
use crate::models::{Period, PricePoint, PriceQuery, PriceSeriesResponse, SeriesSource};

pub const MAX_TICKERS_PER_REQUEST: usize = 20;

const MOCK_START_PRICE: f64 = 100.0;
const MOCK_DAILY_SWING: f64 = 0.04;

/// Random-walk daily closes: `days` points ending at `end`, oldest first.
/// Each step moves the price by up to ±2%.
pub fn generate_mock_series<R: Rng>(days: u32, end: NaiveDate, rng: &mut R) -> Vec<PricePoint> {
    let mut current = MOCK_START_PRICE;
    let mut points = Vec::with_capacity(days as usize);

    for offset in (0..days).rev() {
        points.push(PricePoint {
            date: end - ChronoDuration::days(offset as i64),
            close: (current * 100.0).round() / 100.0,
        });
        current *= 1.0 + (rng.random::<f64>() - 0.5) * MOCK_DAILY_SWING;
    }

    points
}

/// Validates the query into (tickers, period).
pub fn parse_query(query: &PriceQuery) -> Result<(Vec<String>, Period), AppError> {
    let tickers = query.ticker_list();
    if tickers.is_empty() {
        return Err(AppError::Validation("tickers must name at least one symbol".to_string()));
    }
    if tickers.len() > MAX_TICKERS_PER_REQUEST {
        return Err(AppError::Validation(format!(
            "at most {} tickers per request",
            MAX_TICKERS_PER_REQUEST
        )));
    }

    let period = Period::parse(&query.period).ok_or_else(|| {
        AppError::Validation(format!(
            "unsupported period '{}'; use 1mo, 3mo, 6mo, 1y, 2y or 5y",
            query.period
        ))
    })?;

    Ok((tickers, period))
}

async fn fetch_with_fallback(
    provider: &dyn PriceProvider,
    ticker: &str,
    period: Period,
) -> (Vec<PricePoint>, SeriesSource) {
    let reason = match provider.fetch_daily_history(ticker, period).await {
        Ok(points) if !points.is_empty() => {
            info!("✓ Fetched {} points for {} from {:?}", points.len(), ticker, provider.source());
            return (points, provider.source());
        }
        Ok(_) => "empty series".to_string(),
        Err(PriceProviderError::RateLimited) => "rate limited".to_string(),
        Err(e) => e.to_string(),
    };

    warn!("Price fetch for {} failed ({}), using mock series", ticker, reason);
    let today = Utc::now().date_naive();
    (
        generate_mock_series(period.days(), today, &mut rand::rng()),
        SeriesSource::Mock,
    )
}

/// Fetches every ticker concurrently; a failed ticker gets a mock series.
pub async fn get_price_series(
    provider: &dyn PriceProvider,
    tickers: &[String],
    period: Period,
) -> PriceSeriesResponse {
    let fetches = tickers.iter().map(|ticker| async move {
        let (points, source) = fetch_with_fallback(provider, ticker, period).await;
        (ticker.clone(), points, source)
    });

    let mut data = BTreeMap::new();
    let mut sources = BTreeMap::new();
    for (ticker, points, source) in join_all(fetches).await {
        data.insert(ticker.clone(), points);
        sources.insert(ticker, source);
    }

    PriceSeriesResponse {
        data,
        sources,
        timestamp: Utc::now(),
    }
}
