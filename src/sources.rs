use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::Client;
use tracing::{debug, error, info, warn};

use crate::api_types::HnItem;
use crate::models::Candidate;

const SEED_LIMIT: usize = 3;
const HN_SCAN_DEPTH: usize = 30;

// Feed fetches get a browser UA; several outlets 403 plain clients.
const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Known source names and their feed URLs. `hackernews` goes through the
/// HN API instead of a feed.
pub fn preset_source(name: &str) -> Option<&'static str> {
    match name {
        "hackernews" => Some("hn"),
        "techcrunch" => Some("https://techcrunch.com/feed/"),
        "theverge" => Some("https://www.theverge.com/rss/index.xml"),
        "wired" => Some("https://www.wired.com/feed/rss"),
        "nytimes" => Some("https://rss.nytimes.com/services/xml/rss/nyt/Technology.xml"),
        "wsj" => Some("https://feeds.a.dj.com/rss/RSSWSJD.xml"),
        _ => None,
    }
}

/// Resolve the `--source` argument into seed candidates: preset name, raw
/// feed URL, or (with a warning) the Hacker News default. Fetch failures
/// yield an empty seed list so the run completes empty instead of dying.
pub async fn resolve_seeds(client: &Client, source_arg: &str) -> Vec<Candidate> {
    let source_input = source_arg.to_lowercase();

    if let Some(preset) = preset_source(&source_input) {
        if preset == "hn" {
            info!("Source: Hacker News (API)");
            return fetch_hn_top_stories(client, SEED_LIMIT, HN_SCAN_DEPTH)
                .await
                .unwrap_or_else(|e| {
                    error!("HN fetch failed - error={}", e);
                    Vec::new()
                });
        }
        info!("Source: {} (RSS: {})", source_input, preset);
        return fetch_rss_feed(client, preset, SEED_LIMIT)
            .await
            .unwrap_or_else(|e| {
                error!("RSS fetch failed - feed={}, error={}", preset, e);
                Vec::new()
            });
    }

    if source_input.starts_with("http") {
        info!("Source: Custom RSS ({})", source_input);
        return fetch_rss_feed(client, &source_input, SEED_LIMIT)
            .await
            .unwrap_or_else(|e| {
                error!("RSS fetch failed - feed={}, error={}", source_input, e);
                Vec::new()
            });
    }

    warn!("Unknown source '{}', defaulting to Hacker News", source_input);
    fetch_hn_top_stories(client, SEED_LIMIT, HN_SCAN_DEPTH)
        .await
        .unwrap_or_else(|e| {
            error!("HN fetch failed - error={}", e);
            Vec::new()
        })
}

/// Front-page position decays fast on HN; weight rank against age so a
/// fresh #3 can beat a stale #1.
fn hn_hotness(rank: usize, time_posted_unix: i64) -> f64 {
    if rank == 0 {
        return 0.0;
    }
    let age_hours =
        ((Utc::now().timestamp() - time_posted_unix) as f64 / 3600.0).max(0.0);
    (1.0 / rank as f64) * (-age_hours / 24.0).exp()
}

pub async fn fetch_hn_top_stories(
    client: &Client,
    limit: usize,
    scan_depth: usize,
) -> Result<Vec<Candidate>> {
    let start = std::time::Instant::now();

    let top_ids: Vec<u64> = client
        .get("https://hacker-news.firebaseio.com/v0/topstories.json")
        .send()
        .await
        .context("Requesting HN top stories")?
        .error_for_status()
        .context("HTTP error from HN top stories")?
        .json()
        .await
        .context("Decoding HN top story ids")?;

    let mut candidates = Vec::new();
    for (rank, sid) in top_ids.iter().take(scan_depth).enumerate() {
        let item_url = format!("https://hacker-news.firebaseio.com/v0/item/{}.json", sid);
        // individual items can 404 or be dead; skip, never abort the scan
        let item: HnItem = match client.get(&item_url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.json().await {
                Ok(item) => item,
                Err(e) => {
                    debug!("Skipping HN item {} - decode error={}", sid, e);
                    continue;
                }
            },
            Ok(resp) => {
                debug!("Skipping HN item {} - status={}", sid, resp.status());
                continue;
            }
            Err(e) => {
                debug!("Skipping HN item {} - error={}", sid, e);
                continue;
            }
        };

        if let (Some(title), Some(url)) = (item.title, item.url) {
            let score = hn_hotness(rank + 1, item.time.unwrap_or(0));
            candidates.push(Candidate { title, url, score });
        }
    }

    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    candidates.truncate(limit);

    info!(
        "HN fetch completed - duration={:.2}s, candidates={}",
        start.elapsed().as_secs_f32(),
        candidates.len()
    );
    Ok(candidates)
}

pub async fn fetch_rss_feed(client: &Client, feed_url: &str, limit: usize) -> Result<Vec<Candidate>> {
    let start = std::time::Instant::now();

    let body = client
        .get(feed_url)
        .header(reqwest::header::USER_AGENT, BROWSER_UA)
        .send()
        .await
        .with_context(|| format!("Requesting feed {}", feed_url))?
        .error_for_status()
        .with_context(|| format!("HTTP error for feed {}", feed_url))?
        .text()
        .await
        .with_context(|| format!("Reading feed body from {}", feed_url))?;

    let candidates = parse_feed(&body, limit)?;
    info!(
        "Feed fetch completed - feed={}, duration={:.2}s, candidates={}",
        feed_url,
        start.elapsed().as_secs_f32(),
        candidates.len()
    );
    Ok(candidates)
}

/// Streaming parse of RSS `<item>` or Atom `<entry>` elements. Atom links
/// live in an `href` attribute, RSS links in element text; both are
/// handled, earlier entries score higher.
pub fn parse_feed(xml: &str, limit: usize) -> Result<Vec<Candidate>> {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut candidates = Vec::new();
    let mut in_item = false;
    let mut current_tag = String::new();
    let mut title = String::new();
    let mut link = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name_buf = e.local_name().as_ref().to_vec();
                let name = std::str::from_utf8(&name_buf).unwrap_or("").to_string();
                if name == "item" || name == "entry" {
                    in_item = true;
                    title.clear();
                    link.clear();
                } else if name == "link" && in_item && link.is_empty() {
                    // Atom link as a paired tag still carries href
                    for attr in e.attributes().flatten() {
                        if attr.key.local_name().as_ref() == b"href" {
                            link = attr.unescape_value().unwrap_or_default().into_owned();
                        }
                    }
                }
                current_tag = name;
            }
            Ok(Event::Empty(e)) => {
                // Atom: <link href="..."/>
                if in_item && e.local_name().as_ref() == b"link" && link.is_empty() {
                    for attr in e.attributes().flatten() {
                        if attr.key.local_name().as_ref() == b"href" {
                            link = attr.unescape_value().unwrap_or_default().into_owned();
                        }
                    }
                }
            }
            Ok(Event::End(e)) => {
                let name_buf = e.local_name().as_ref().to_vec();
                let name = std::str::from_utf8(&name_buf).unwrap_or("");
                if (name == "item" || name == "entry") && in_item {
                    in_item = false;
                    if !link.is_empty() {
                        let story_title = if title.is_empty() {
                            "Untitled Story".to_string()
                        } else {
                            title.clone()
                        };
                        candidates.push(Candidate {
                            title: story_title,
                            url: link.clone(),
                            // position is the only ranking signal a feed gives us
                            score: (100 - candidates.len()) as f64,
                        });
                        if candidates.len() >= limit {
                            break;
                        }
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if in_item {
                    let text = e.unescape().unwrap_or_default().into_owned();
                    match current_tag.as_str() {
                        "title" => title = text,
                        "link" => link = text,
                        _ => {}
                    }
                }
            }
            Ok(Event::CData(e)) => {
                if in_item && current_tag == "title" {
                    title = String::from_utf8_lossy(e.as_ref()).into_owned();
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => anyhow::bail!("Feed XML parse error: {}", e),
            _ => {}
        }
    }

    Ok(candidates)
}
