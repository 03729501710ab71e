use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

/// A fetched candidate story. `score` is used for ranking/selection only,
/// never for validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub title: String,
    pub url: String,
    pub score: f64,
}

/// The fixed internal record every search-result shape is coerced into at
/// the collaborator boundary; core logic never sees source-specific shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub url: String,
    pub content: String,
    pub title: String,
}

/// Generation result: 0 bullets means "context insufficient", otherwise
/// 2 or 3 bullets, each ending in a `[Source](URL)` citation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryAnalysis {
    #[serde(default)]
    pub bullets: Vec<String>,
}

impl StoryAnalysis {
    /// Bullet count must be 0, 2, or 3: never 1, never more than 3.
    /// Checked before validation runs.
    pub fn arity_ok(&self) -> bool {
        matches!(self.bullets.len(), 0 | 2 | 3)
    }
}

/// A story that survived generation and validation, ready to render.
#[derive(Debug, Clone, Serialize)]
pub struct AcceptedStory {
    pub id: String,
    pub title: String,
    pub market_data: String,
    pub bullets: Vec<String>,
    pub source: String,
    pub seed_canonical: String,
}

pub fn make_story_id(url: &str, title: &str) -> String {
    format!("{:016x}", xxh3_64(format!("{}|{}", url, title).as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis(n: usize) -> StoryAnalysis {
        StoryAnalysis {
            bullets: (0..n).map(|i| format!("bullet {i}")).collect(),
        }
    }

    #[test]
    fn arity_allows_zero_two_three() {
        assert!(analysis(0).arity_ok());
        assert!(analysis(2).arity_ok());
        assert!(analysis(3).arity_ok());
    }

    #[test]
    fn arity_rejects_one_and_four() {
        assert!(!analysis(1).arity_ok());
        assert!(!analysis(4).arity_ok());
    }

    #[test]
    fn story_ids_are_stable() {
        let a = make_story_id("https://ex.com/a", "Title");
        let b = make_story_id("https://ex.com/a", "Title");
        assert_eq!(a, b);
        assert_ne!(a, make_story_id("https://ex.com/b", "Title"));
    }
}
