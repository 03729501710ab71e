use regex::Regex;
use reqwest::Client;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, warn};

use crate::api_types::YahooChartResponse;

const MARKET_TIMEOUT: Duration = Duration::from_secs(5);

/// Companies worth annotating, in priority order; first match in the title
/// wins.
const TICKER_MAP: &[(&str, &str)] = &[
    ("NVIDIA", "NVDA"),
    ("Tesla", "TSLA"),
    ("Apple", "AAPL"),
    ("Google", "GOOGL"),
    ("Microsoft", "MSFT"),
    ("Amazon", "AMZN"),
    ("Meta", "META"),
    ("Facebook", "META"),
];

fn ticker_patterns() -> &'static Vec<(Regex, &'static str)> {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        TICKER_MAP
            .iter()
            .map(|(company, ticker)| {
                // word-bounded so "Meta" never fires on "metadata"
                let re = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(company))).unwrap();
                (re, *ticker)
            })
            .collect()
    })
}

pub fn detect_ticker(text: &str) -> Option<&'static str> {
    ticker_patterns()
        .iter()
        .find(|(re, _)| re.is_match(text))
        .map(|(_, ticker)| *ticker)
}

async fn fetch_quote(client: Client, ticker: &'static str) -> Option<(f64, f64)> {
    let url = format!("https://query1.finance.yahoo.com/v8/finance/chart/{}", ticker);
    let response: YahooChartResponse = client
        .get(&url)
        .send()
        .await
        .ok()?
        .error_for_status()
        .ok()?
        .json()
        .await
        .ok()?;

    let meta = &response.chart.result.first()?.meta;
    Some((meta.regular_market_price?, meta.previous()?))
}

fn format_snapshot(ticker: &str, price: f64, prev: f64) -> String {
    if price == 0.0 || prev == 0.0 {
        return String::new();
    }
    let pct = ((price - prev) / prev) * 100.0;
    format!(" ({}: ${:.2} {:+.1}%)", ticker, price, pct)
}

/// Market-data snippet for a story title, or empty. The quote fetch runs in
/// its own task under a hard wall-clock timeout; on expiry the task is
/// aborted and the snapshot treated as absent, so a wedged lookup can never
/// stall the pipeline.
pub async fn market_snapshot(client: &Client, text: &str) -> String {
    let Some(ticker) = detect_ticker(text) else {
        return String::new();
    };
    debug!("Market lookup - ticker={}", ticker);

    let mut handle = tokio::spawn(fetch_quote(client.clone(), ticker));
    match tokio::time::timeout(MARKET_TIMEOUT, &mut handle).await {
        Ok(Ok(Some((price, prev)))) => format_snapshot(ticker, price, prev),
        Ok(_) => String::new(),
        Err(_) => {
            handle.abort();
            warn!("Market data timed out for {} (task aborted)", ticker);
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_companies_case_insensitively() {
        assert_eq!(detect_ticker("NVIDIA posts record earnings"), Some("NVDA"));
        assert_eq!(detect_ticker("tesla recalls cars"), Some("TSLA"));
        assert_eq!(detect_ticker("Meta and Apple spar"), Some("AAPL"));
    }

    #[test]
    fn map_order_breaks_ties() {
        // both present; NVIDIA comes first in the map
        assert_eq!(detect_ticker("Tesla buys chips from NVIDIA"), Some("NVDA"));
    }

    #[test]
    fn requires_word_boundaries() {
        assert_eq!(detect_ticker("New metadata standards announced"), None);
        assert_eq!(detect_ticker("Pineapple season is here"), None);
    }

    #[test]
    fn unmatched_titles_yield_none() {
        assert_eq!(detect_ticker("Rust 2.0 released"), None);
    }

    #[test]
    fn snapshot_formatting() {
        assert_eq!(
            format_snapshot("NVDA", 120.5, 118.0),
            " (NVDA: $120.50 +2.1%)"
        );
        assert_eq!(
            format_snapshot("TSLA", 200.0, 250.0),
            " (TSLA: $200.00 -20.0%)"
        );
        assert_eq!(format_snapshot("AAPL", 0.0, 100.0), "");
        assert_eq!(format_snapshot("AAPL", 100.0, 0.0), "");
    }
}
