use anyhow::{Context, Result};
use awful_aj::{config::AwfulJadeConfig, template::ChatTemplate};
use itertools::Itertools;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::analyze::{llm_call, parse_story_analysis, AnalysisError};
use crate::citations::normalize_url;
use crate::market::market_snapshot;
use crate::models::{make_story_id, AcceptedStory, Candidate, EvidenceItem, StoryAnalysis};
use crate::prompts::user_story_analysis;
use crate::render::render_digest;
use crate::report::{RunReport, RunStatus};
use crate::search::search_evidence;
use crate::sources::resolve_seeds;
use crate::validate::{validate_analysis, ValidationError};

const MAX_RETRIES: usize = 2; // 3 attempts total
const MIN_CONTENT_LENGTH: usize = 300;
const SEARCH_RESULTS: usize = 3;
const CONTEXT_SNIPPET_CHARS: usize = 600;
const STORY_PACING: Duration = Duration::from_secs(10);
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// One generation attempt's failure. Every kind is retryable within the
/// story's attempt budget; the distinction exists so the retry loop can
/// log and branch on kind instead of string-matching.
#[derive(Debug, Error)]
enum StoryError {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("model call failed: {0}")]
    Upstream(String),
}

enum StoryOutcome {
    Accepted(Box<AcceptedStory>),
    Skipped(&'static str),
    Failed(String),
}

pub async fn run_briefing(
    cfg: &AwfulJadeConfig,
    tpl: &ChatTemplate,
    tavily_key: &str,
    source: &str,
    output_dir: &str,
    report_path: &Path,
    date_str: &str,
) -> Result<()> {
    let mut report = RunReport::new();
    report.save(report_path)?;

    match run_pipeline(
        cfg,
        tpl,
        tavily_key,
        source,
        output_dir,
        report_path,
        date_str,
        &mut report,
    )
    .await
    {
        Ok(()) => Ok(()),
        Err(e) => {
            report.status = RunStatus::Failed;
            report.error = Some(e.to_string());
            let _ = report.save(report_path);
            Err(e)
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_pipeline(
    cfg: &AwfulJadeConfig,
    tpl: &ChatTemplate,
    tavily_key: &str,
    source: &str,
    output_dir: &str,
    report_path: &Path,
    date_str: &str,
    report: &mut RunReport,
) -> Result<()> {
    let pipeline_start = std::time::Instant::now();
    info!("Pipeline started - source={}, date={}", source, date_str);

    let client = Client::builder().timeout(HTTP_TIMEOUT).build()?;

    // 1) seed candidates from the configured source
    let seeds = resolve_seeds(&client, source).await;
    report.metrics.seeded = seeds.len();
    report.save(report_path)?;
    info!("Seeding completed - candidates={}", seeds.len());

    // 2) per-story loop, strictly sequential; the pacing delay protects
    //    third-party rate limits
    let mut accepted: Vec<AcceptedStory> = Vec::new();
    for seed in &seeds {
        tokio::time::sleep(STORY_PACING).await;

        match process_story(&client, cfg, tpl, tavily_key, seed).await {
            StoryOutcome::Accepted(story) => {
                report.record_success(story.id.clone(), story.title.clone());
                accepted.push(*story);
            }
            StoryOutcome::Skipped(reason) => {
                info!("Skipping {} - reason={}", seed.title, reason);
                report.record_skip(
                    make_story_id(&seed.url, &seed.title),
                    seed.title.clone(),
                    reason.to_string(),
                );
            }
            StoryOutcome::Failed(last_err) => {
                warn!("Story failed - title={}, error={}", seed.title, last_err);
                report.record_failure(
                    make_story_id(&seed.url, &seed.title),
                    seed.title.clone(),
                    last_err,
                );
            }
        }
        report.save(report_path)?;
    }

    // 3) publish, or terminate cleanly with nothing to show
    if accepted.is_empty() {
        warn!("No stories generated.");
        report.status = RunStatus::CompletedEmpty;
        report.save(report_path)?;
        return Ok(());
    }

    let digest = render_digest(date_str, &accepted);
    let out_dir = Path::new(output_dir);
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Creating output directory {}", out_dir.display()))?;
    let out_path = out_dir.join(format!("{}.md", date_str));
    std::fs::write(&out_path, digest)
        .with_context(|| format!("Writing digest to {}", out_path.display()))?;

    info!(
        "Published - path={}, stories={}, total_duration={:.2}s",
        out_path.display(),
        accepted.len(),
        pipeline_start.elapsed().as_secs_f32()
    );

    report.status = RunStatus::Success;
    report.save(report_path)?;
    Ok(())
}

/// Carry one candidate through enrichment, generation, validation and the
/// market annotation. Nothing in here is allowed to abort the run.
async fn process_story(
    client: &Client,
    cfg: &AwfulJadeConfig,
    tpl: &ChatTemplate,
    tavily_key: &str,
    seed: &Candidate,
) -> StoryOutcome {
    let title = &seed.title;
    let seed_url = normalize_url(&seed.url);
    if seed_url.is_empty() {
        return StoryOutcome::Skipped("missing seed URL");
    }

    info!("Enriching: {}", title);
    let evidence = match search_evidence(client, tavily_key, title, SEARCH_RESULTS).await {
        Ok(items) => items,
        Err(e) => {
            warn!("Search failed - story={}, error={}", title, e);
            Vec::new()
        }
    };

    let total_content: usize = evidence.iter().map(|r| r.content.chars().count()).sum();
    if total_content < MIN_CONTENT_LENGTH {
        return StoryOutcome::Skipped("insufficient evidence content");
    }

    // The allow-list is derived from this story's own evidence and fixed
    // before generation starts.
    let allowed = build_allow_list(&evidence);
    if allowed.is_empty() {
        return StoryOutcome::Skipped("no valid evidence URLs");
    }

    let primary_url = primary_citation_target(&seed_url, &allowed);
    let context = context_lines(&evidence);
    let allowed_json = serde_json::json!(allowed).to_string();
    let prompt = user_story_analysis(
        title,
        &context,
        &redact_scheme(&seed_url),
        &primary_url,
        &allowed_json,
    );

    // Generating -> Validating with a fixed retry budget and linearly
    // increasing backoff. A terminal failure here stays confined to this
    // story.
    let mut last_err = String::new();
    for attempt in 0..=MAX_RETRIES {
        match attempt_story(cfg, tpl, &prompt, &allowed).await {
            Ok(None) => {
                info!("Skipping {} (model returned empty)", title);
                return StoryOutcome::Skipped("model abstained");
            }
            Ok(Some(analysis)) => {
                let market_data = market_snapshot(client, title).await;
                return StoryOutcome::Accepted(Box::new(AcceptedStory {
                    id: make_story_id(&seed.url, title),
                    title: title.clone(),
                    market_data,
                    bullets: analysis.bullets,
                    source: primary_url.clone(),
                    seed_canonical: seed_url.clone(),
                }));
            }
            Err(e) => {
                last_err = e.to_string();
                match &e {
                    StoryError::Upstream(_) => warn!(
                        "Attempt {} failed for '{}' - upstream: {}",
                        attempt + 1,
                        title,
                        last_err
                    ),
                    StoryError::Analysis(_) => warn!(
                        "Attempt {} failed for '{}' - malformed analysis: {}",
                        attempt + 1,
                        title,
                        last_err
                    ),
                    StoryError::Validation(_) => warn!(
                        "Attempt {} failed for '{}' - citation check: {}",
                        attempt + 1,
                        title,
                        last_err
                    ),
                }
                if attempt < MAX_RETRIES {
                    tokio::time::sleep(Duration::from_secs(5 * (attempt as u64 + 1))).await;
                }
            }
        }
    }

    StoryOutcome::Failed(last_err)
}

/// One Generating -> Validating pass. `Ok(None)` is the model's explicit
/// abstention (zero bullets).
async fn attempt_story(
    cfg: &AwfulJadeConfig,
    tpl: &ChatTemplate,
    prompt: &str,
    allowed: &[String],
) -> Result<Option<StoryAnalysis>, StoryError> {
    let raw = llm_call(cfg, tpl, prompt)
        .await
        .map_err(|e| StoryError::Upstream(e.to_string()))?;

    let analysis = parse_story_analysis(&raw)?;
    if analysis.bullets.is_empty() {
        return Ok(None);
    }

    validate_analysis(&analysis.bullets, allowed)?;
    Ok(Some(analysis))
}

/// Normalized evidence URLs, first occurrence wins, order preserved.
fn build_allow_list(evidence: &[EvidenceItem]) -> Vec<String> {
    evidence
        .iter()
        .map(|r| normalize_url(&r.url))
        .filter(|u| !u.is_empty())
        .unique()
        .collect()
}

/// The citation target offered to the model: the seed itself when the
/// evidence corroborates it, otherwise the best evidence URL.
fn primary_citation_target(seed_url: &str, allowed: &[String]) -> String {
    match allowed.iter().find(|u| u.as_str() == seed_url) {
        Some(u) => u.clone(),
        None => allowed
            .first()
            .cloned()
            .unwrap_or_else(|| seed_url.to_string()),
    }
}

/// Defang the seed URL scheme before it enters the prompt.
fn redact_scheme(url: &str) -> String {
    url.replace("https://", "hxxps://")
        .replace("http://", "hxxp://")
}

fn clip_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn context_lines(evidence: &[EvidenceItem]) -> String {
    evidence
        .iter()
        .map(|r| {
            let flat = r.content.replace('\n', " ");
            let snippet = clip_chars(flat.trim(), CONTEXT_SNIPPET_CHARS);
            format!("- {} (Source: {})", snippet, normalize_url(&r.url))
        })
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(url: &str, content: &str) -> EvidenceItem {
        EvidenceItem {
            url: url.to_string(),
            content: content.to_string(),
            title: String::new(),
        }
    }

    #[test]
    fn allow_list_is_normalized_and_deduped_in_order() {
        let evidence = vec![
            item("https://EX.com/a/?utm_source=rss", "x"),
            item("https://other.com/b", "y"),
            item("https://ex.com/a", "z"),
        ];
        assert_eq!(
            build_allow_list(&evidence),
            vec!["https://ex.com/a", "https://other.com/b"]
        );
    }

    #[test]
    fn primary_target_prefers_seed_when_corroborated() {
        let allowed = vec![
            "https://a.com/1".to_string(),
            "https://seed.com/s".to_string(),
        ];
        assert_eq!(
            primary_citation_target("https://seed.com/s", &allowed),
            "https://seed.com/s"
        );
        assert_eq!(
            primary_citation_target("https://elsewhere.com/x", &allowed),
            "https://a.com/1"
        );
    }

    #[test]
    fn redaction_defangs_both_schemes() {
        assert_eq!(redact_scheme("https://ex.com/a"), "hxxps://ex.com/a");
        assert_eq!(redact_scheme("http://ex.com/a"), "hxxp://ex.com/a");
    }

    #[test]
    fn context_lines_flatten_and_truncate() {
        let long = "word ".repeat(200); // 1000 chars
        let evidence = vec![item("https://ex.com/a", &format!("line1\nline2 {long}"))];
        let ctx = context_lines(&evidence);
        assert!(ctx.starts_with("- line1 line2"));
        assert!(ctx.ends_with("(Source: https://ex.com/a)"));
        // snippet capped well below the raw content length
        assert!(ctx.len() < 700);
    }

    #[test]
    fn clip_chars_respects_char_boundaries() {
        assert_eq!(clip_chars("héllo wörld", 5), "héllo");
        assert_eq!(clip_chars("short", 600), "short");
    }
}
