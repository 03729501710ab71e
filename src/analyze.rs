use anyhow::{anyhow, Result};
use awful_aj::{api::ask, config::AwfulJadeConfig, template::ChatTemplate};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::StoryAnalysis;

/// Failures of the generation step itself, before the allow-list is ever
/// consulted. Both kinds are retryable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("model response did not contain parseable JSON")]
    ParseFailure,

    #[error("bullet count {0} is out of bounds (must be 0 or 2-3)")]
    ArityViolation(usize),
}

pub async fn llm_call(cfg: &AwfulJadeConfig, tpl: &ChatTemplate, user: &str) -> Result<String> {
    let start = std::time::Instant::now();

    debug!("LLM call starting - prompt_length={} chars", user.len());

    // Map Box<dyn StdError> -> anyhow::Error *before* `?`
    let answer = ask(cfg, user.to_string(), tpl, None, None, false)
        .await
        .map_err(|e| anyhow!(e.to_string()))?;

    let elapsed = start.elapsed();
    info!(
        "LLM API call completed - duration={:.2}s, response_length={} chars",
        elapsed.as_secs_f32(),
        answer.len()
    );

    Ok(answer)
}

fn fence_pattern() -> &'static Regex {
    static FENCE_RE: OnceLock<Regex> = OnceLock::new();
    FENCE_RE.get_or_init(|| Regex::new(r"(?is)```(?:json)?\s*([\s\S]*?)\s*```").unwrap())
}

/// Pull a JSON value out of a chatty model response: direct parse first,
/// then a fenced ```json block, then the outermost {...} or [...] slice.
pub fn extract_json_block(text: &str) -> Option<Value> {
    let text = text.trim();
    if let Ok(v) = serde_json::from_str(text) {
        return Some(v);
    }

    if let Some(caps) = fence_pattern().captures(text) {
        if let Ok(v) = serde_json::from_str(caps.get(1).map_or("", |m| m.as_str())) {
            return Some(v);
        }
    }

    if let (Some(s), Some(e)) = (text.find('{'), text.rfind('}')) {
        if s < e {
            if let Ok(v) = serde_json::from_str(&text[s..=e]) {
                return Some(v);
            }
        }
    }
    if let (Some(s), Some(e)) = (text.find('['), text.rfind(']')) {
        if s < e {
            if let Ok(v) = serde_json::from_str(&text[s..=e]) {
                return Some(v);
            }
        }
    }
    None
}

/// Parse a raw model response into a StoryAnalysis and enforce the bullet
/// arity rule. Runs before validation.
pub fn parse_story_analysis(raw: &str) -> Result<StoryAnalysis, AnalysisError> {
    let value = extract_json_block(raw).ok_or(AnalysisError::ParseFailure)?;
    let analysis: StoryAnalysis =
        serde_json::from_value(value).map_err(|_| AnalysisError::ParseFailure)?;
    if !analysis.arity_ok() {
        return Err(AnalysisError::ArityViolation(analysis.bullets.len()));
    }
    Ok(analysis)
}
