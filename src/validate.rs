use std::collections::HashSet;
use thiserror::Error;

use crate::citations::{extract_urls, normalize_url, terminal_citation};

/// Ways a generated bullet set can violate the evidence allow-list.
/// All of them are retryable at the story level.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("bullet has no citation URL (text: ...{excerpt})")]
    MissingCitation { excerpt: String },

    #[error("citation URL not in allow-list: {url}")]
    CitationNotAllowed { url: String },

    #[error("hallucinated URL in bullet body: {url}")]
    HallucinatedBodyUrl { url: String },
}

/// Last `max` chars of a bullet, enough to identify it in a log line
/// without echoing the whole generated text.
fn tail_excerpt(s: &str, max: usize) -> String {
    let count = s.chars().count();
    s.chars().skip(count.saturating_sub(max)).collect()
}

/// Enforce that every bullet's citation, and every other URL it mentions,
/// is a member of the allow-list. Fail-fast on the first violation.
///
/// The allow-list is re-normalized here; callers may pass raw or already
/// normalized URLs (normalization is idempotent). An empty bullet set is
/// an abstention, not a failure. Pure aside from the returned error.
pub fn validate_analysis(
    bullets: &[String],
    allowed_urls: &[String],
) -> Result<(), ValidationError> {
    let normalized_allowed: HashSet<String> =
        allowed_urls.iter().map(|u| normalize_url(u)).collect();

    for bullet in bullets {
        let citation = terminal_citation(bullet).ok_or_else(|| {
            ValidationError::MissingCitation {
                excerpt: tail_excerpt(bullet, 50),
            }
        })?;

        if !normalized_allowed.contains(&citation) {
            return Err(ValidationError::CitationNotAllowed { url: citation });
        }

        // Anything mentioned in the body besides the citation must also be
        // backed by evidence.
        for url in extract_urls(bullet) {
            if url != citation && !normalized_allowed.contains(&url) {
                return Err(ValidationError::HallucinatedBodyUrl { url });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed(urls: &[&str]) -> Vec<String> {
        urls.iter().map(|u| u.to_string()).collect()
    }

    fn bullets(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn empty_bullets_are_valid() {
        assert_eq!(validate_analysis(&[], &allowed(&["https://ex.com"])), Ok(()));
    }

    #[test]
    fn accepts_cited_bullets() {
        let b = bullets(&[
            "Company X raised funds. [TechCrunch](https://techcrunch.com/story)",
            "Valuation reached $1B. [TechCrunch](https://techcrunch.com/story)",
        ]);
        let a = allowed(&["https://techcrunch.com/story"]);
        assert_eq!(validate_analysis(&b, &a), Ok(()));
    }

    #[test]
    fn rejects_citation_outside_allowlist() {
        let b = bullets(&["Claim [S](https://evil.com)"]);
        let a = allowed(&["https://ex.com"]);
        assert!(matches!(
            validate_analysis(&b, &a),
            Err(ValidationError::CitationNotAllowed { .. })
        ));
    }

    #[test]
    fn rejects_hallucinated_body_url() {
        let b = bullets(&["See https://evil.com also [S](https://ex.com)"]);
        let a = allowed(&["https://ex.com"]);
        match validate_analysis(&b, &a) {
            Err(ValidationError::HallucinatedBodyUrl { url }) => {
                assert_eq!(url, "https://evil.com/");
            }
            other => panic!("expected HallucinatedBodyUrl, got {other:?}"),
        }
    }

    #[test]
    fn rejects_bullet_without_citation() {
        let long_tail = "x".repeat(80);
        let b = bullets(&[&format!("No links anywhere {long_tail}")]);
        match validate_analysis(&b, &allowed(&["https://ex.com"])) {
            Err(ValidationError::MissingCitation { excerpt }) => {
                assert!(excerpt.chars().count() <= 50);
            }
            other => panic!("expected MissingCitation, got {other:?}"),
        }
    }

    #[test]
    fn allowlist_entries_are_renormalized() {
        // raw allow-list entry with tracking params still matches the
        // normalized citation
        let b = bullets(&["Fact. [S](https://ex.com/a)"]);
        let a = allowed(&["https://EX.com/a/?utm_source=feed"]);
        assert_eq!(validate_analysis(&b, &a), Ok(()));
    }

    #[test]
    fn repeated_citation_in_body_is_fine() {
        let b = bullets(&[
            "Per https://ex.com/a the deal closed. [Source](https://ex.com/a)",
        ]);
        let a = allowed(&["https://ex.com/a"]);
        assert_eq!(validate_analysis(&b, &a), Ok(()));
    }

    #[test]
    fn allowed_body_mention_with_different_citation() {
        let b = bullets(&[
            "Covered at https://ex.com/b too. [Source](https://ex.com/a)",
        ]);
        let a = allowed(&["https://ex.com/a", "https://ex.com/b"]);
        assert_eq!(validate_analysis(&b, &a), Ok(()));
    }

    #[test]
    fn stops_at_first_violation() {
        let b = bullets(&[
            "Bad citation [S](https://evil.com)",
            "No citation at all",
        ]);
        let a = allowed(&["https://ex.com"]);
        // first bullet's violation wins
        assert!(matches!(
            validate_analysis(&b, &a),
            Err(ValidationError::CitationNotAllowed { .. })
        ));
    }
}
