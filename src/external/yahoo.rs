use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;
use url::Url;

use crate::external::price_provider::{PriceProvider, PriceProviderError};
use crate::models::{Period, PricePoint, SeriesSource};

const CHART_BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart/";

pub struct YahooProvider {
    client: reqwest::Client,
    base_url: Url,
}

impl YahooProvider {
    pub fn new() -> Result<Self, PriceProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("Mozilla/5.0 (compatible; legacy-guardians/0.1)")
            .build()
            .map_err(|e| PriceProviderError::Network(e.to_string()))?;
        let base_url = Url::parse(CHART_BASE_URL)
            .map_err(|e| PriceProviderError::Parse(e.to_string()))?;

        Ok(Self { client, base_url })
    }

    fn chart_url(&self, ticker: &str, period: Period) -> Result<Url, PriceProviderError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| PriceProviderError::Parse("chart URL cannot be a base".into()))?
            .pop_if_empty()
            .push(ticker);
        url.query_pairs_mut()
            .append_pair("range", period.as_range())
            .append_pair("interval", "1d");
        Ok(url)
    }
}

// Minimal response structs (only what we need)
#[derive(Debug, Deserialize)]
struct YahooChartResponse {
    chart: YahooChart,
}

#[derive(Debug, Deserialize)]
struct YahooChart {
    result: Option<Vec<YahooResult>>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct YahooResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: YahooIndicators,
}

#[derive(Debug, Deserialize)]
struct YahooIndicators {
    quote: Vec<YahooQuote>,
}

#[derive(Debug, Deserialize)]
struct YahooQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

fn parse_chart(body: YahooChartResponse) -> Result<Vec<PricePoint>, PriceProviderError> {
    if let Some(error) = body.chart.error.filter(|e| !e.is_null()) {
        return Err(PriceProviderError::BadResponse(error.to_string()));
    }

    let result = body
        .chart
        .result
        .and_then(|mut r| r.pop())
        .ok_or_else(|| PriceProviderError::BadResponse("missing result".into()))?;

    // timestamp aligns with close list by index
    let closes = &result
        .indicators
        .quote
        .first()
        .ok_or_else(|| PriceProviderError::BadResponse("missing quote".into()))?
        .close;

    let mut out = Vec::with_capacity(result.timestamp.len());
    for (i, ts) in result.timestamp.iter().enumerate() {
        // skip missing closes
        let Some(close) = closes.get(i).copied().flatten() else { continue };

        let dt = DateTime::from_timestamp(*ts, 0)
            .ok_or_else(|| PriceProviderError::Parse("bad timestamp".into()))?;

        out.push(PricePoint {
            date: dt.date_naive(),
            close,
        });
    }

    out.sort_by_key(|p| p.date);
    out.dedup_by_key(|p| p.date);
    Ok(out)
}

#[async_trait]
impl PriceProvider for YahooProvider {
    fn source(&self) -> SeriesSource {
        SeriesSource::Yahoo
    }

    async fn fetch_daily_history(
        &self,
        ticker: &str,
        period: Period,
    ) -> Result<Vec<PricePoint>, PriceProviderError> {
        let url = self.chart_url(ticker, period)?;

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PriceProviderError::Network(e.to_string()))?;

        match resp.status() {
            reqwest::StatusCode::TOO_MANY_REQUESTS => return Err(PriceProviderError::RateLimited),
            reqwest::StatusCode::NOT_FOUND => return Err(PriceProviderError::NotFound),
            s if !s.is_success() => {
                return Err(PriceProviderError::BadResponse(format!("HTTP {}", s)))
            }
            _ => {}
        }

        let body = resp
            .json::<YahooChartResponse>()
            .await
            .map_err(|e| PriceProviderError::Parse(e.to_string()))?;

        parse_chart(body)
    }
}
