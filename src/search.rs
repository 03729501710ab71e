use anyhow::{Context, Result};
use reqwest::Client;
use tracing::{debug, info};

use crate::api_types::{TavilySearchRequest, TavilySearchResponse};
use crate::models::EvidenceItem;

const TAVILY_ENDPOINT: &str = "https://api.tavily.com/search";

/// Retrieve web-search evidence for one story. Results are coerced into
/// `EvidenceItem` records here, at the boundary; entries missing a url or
/// content are dropped.
pub async fn search_evidence(
    client: &Client,
    api_key: &str,
    query: &str,
    max_results: usize,
) -> Result<Vec<EvidenceItem>> {
    let start = std::time::Instant::now();
    debug!("Search starting - query_length={} chars", query.len());

    let request = TavilySearchRequest {
        api_key: api_key.to_string(),
        query: query.to_string(),
        search_depth: "basic".to_string(),
        max_results,
    };

    let response: TavilySearchResponse = client
        .post(TAVILY_ENDPOINT)
        .json(&request)
        .send()
        .await
        .context("Tavily request failed")?
        .error_for_status()
        .context("Tavily returned an error status")?
        .json()
        .await
        .context("Decoding Tavily response")?;

    let items = coerce_results(response);

    info!(
        "Search completed - duration={:.2}s, results={}",
        start.elapsed().as_secs_f32(),
        items.len()
    );
    Ok(items)
}

fn coerce_results(response: TavilySearchResponse) -> Vec<EvidenceItem> {
    response
        .results
        .into_iter()
        .filter_map(|r| {
            let url = r.url.unwrap_or_default();
            let content = r.content.unwrap_or_default();
            if url.is_empty() || content.is_empty() {
                return None;
            }
            Some(EvidenceItem {
                url,
                content,
                title: r.title.unwrap_or_default(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_types::TavilyResult;

    fn result(url: Option<&str>, content: Option<&str>) -> TavilyResult {
        TavilyResult {
            url: url.map(|s| s.to_string()),
            content: content.map(|s| s.to_string()),
            title: Some("t".to_string()),
        }
    }

    #[test]
    fn coercion_drops_incomplete_results() {
        let resp = TavilySearchResponse {
            results: vec![
                result(Some("https://ex.com/a"), Some("body")),
                result(Some("https://ex.com/b"), None),
                result(None, Some("body")),
                result(Some(""), Some("body")),
            ],
        };
        let items = coerce_results(resp);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].url, "https://ex.com/a");
        assert_eq!(items[0].content, "body");
    }

    #[test]
    fn response_tolerates_missing_fields() {
        let items: TavilySearchResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(items.results.is_empty());

        let items: TavilySearchResponse = serde_json::from_str(
            r#"{"results": [{"url": "https://ex.com", "content": "c", "score": 0.9}]}"#,
        )
        .unwrap();
        assert_eq!(items.results.len(), 1);
    }
}
