use serde::{Deserialize, Serialize};

/// Item payload from the Hacker News Firebase API. Jobs and dead items may
/// omit url/title, so everything stays optional at the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct HnItem {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub time: Option<i64>, // unix seconds
}

#[derive(Debug, Clone, Serialize)]
pub struct TavilySearchRequest {
    pub api_key: String,
    pub query: String,
    pub search_depth: String, // "basic" | "advanced"
    pub max_results: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TavilySearchResponse {
    #[serde(default)]
    pub results: Vec<TavilyResult>,
}

/// One Tavily hit. The API has grown fields over time; anything beyond
/// url/content/title is ignored on purpose.
#[derive(Debug, Clone, Deserialize)]
pub struct TavilyResult {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// Yahoo v8 chart response, trimmed to the meta block we read.
#[derive(Debug, Clone, Deserialize)]
pub struct YahooChartResponse {
    pub chart: YahooChart,
}

#[derive(Debug, Clone, Deserialize)]
pub struct YahooChart {
    #[serde(default)]
    pub result: Vec<YahooChartResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct YahooChartResult {
    pub meta: YahooQuoteMeta,
}

#[derive(Debug, Clone, Deserialize)]
pub struct YahooQuoteMeta {
    #[serde(rename = "regularMarketPrice", default)]
    pub regular_market_price: Option<f64>,
    #[serde(rename = "chartPreviousClose", default)]
    pub chart_previous_close: Option<f64>,
    #[serde(rename = "previousClose", default)]
    pub previous_close: Option<f64>,
}

impl YahooQuoteMeta {
    /// Regular-session previous close when present, else the chart one.
    pub fn previous(&self) -> Option<f64> {
        self.previous_close.or(self.chart_previous_close)
    }
}
