use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// One daily close for a ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// Where a ticker's series came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesSource {
    Yahoo,
    Mock,
}

/// Lookback window accepted by `GET /prices`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    OneMonth,
    ThreeMonths,
    SixMonths,
    OneYear,
    TwoYears,
    FiveYears,
}

impl Period {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "1mo" => Some(Period::OneMonth),
            "3mo" => Some(Period::ThreeMonths),
            "6mo" => Some(Period::SixMonths),
            "1y" => Some(Period::OneYear),
            "2y" => Some(Period::TwoYears),
            "5y" => Some(Period::FiveYears),
            _ => None,
        }
    }

    pub fn days(&self) -> u32 {
        match self {
            Period::OneMonth => 30,
            Period::ThreeMonths => 90,
            Period::SixMonths => 180,
            Period::OneYear => 365,
            Period::TwoYears => 730,
            Period::FiveYears => 1825,
        }
    }

    /// Range token understood by the Yahoo chart API.
    pub fn as_range(&self) -> &'static str {
        match self {
            Period::OneMonth => "1mo",
            Period::ThreeMonths => "3mo",
            Period::SixMonths => "6mo",
            Period::OneYear => "1y",
            Period::TwoYears => "2y",
            Period::FiveYears => "5y",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceQuery {
    pub tickers: String,
    #[serde(default = "default_period")]
    pub period: String,
}

fn default_period() -> String {
    "1y".to_string()
}

impl PriceQuery {
    /// Trimmed, upper-cased, de-duplicated tickers in request order.
    pub fn ticker_list(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for ticker in self.tickers.split(',') {
            let ticker = ticker.trim().to_uppercase();
            if !ticker.is_empty() && !out.contains(&ticker) {
                out.push(ticker);
            }
        }
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSeriesResponse {
    pub data: BTreeMap<String, Vec<PricePoint>>,
    pub sources: BTreeMap<String, SeriesSource>,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticker_list_normalizes_input() {
        let query = PriceQuery {
            tickers: " aapl, GLD,,aapl ,msft ".into(),
            period: "1y".into(),
        };
        assert_eq!(query.ticker_list(), vec!["AAPL", "GLD", "MSFT"]);
    }

    #[test]
    fn test_period_parsing() {
        assert_eq!(Period::parse("6MO"), Some(Period::SixMonths));
        assert_eq!(Period::parse("1y").map(|p| p.days()), Some(365));
        assert_eq!(Period::parse("10y"), None);
    }
}
