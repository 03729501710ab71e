use percent_encoding::percent_decode_str;
use regex::Regex;
use std::sync::OnceLock;
use url::{form_urlencoded, Url};

/// Matches an http(s) URL up to the first character that cannot belong to it
/// inside prose or markdown (whitespace, brackets, quote, paren, angle).
fn url_pattern() -> &'static Regex {
    static URL_RE: OnceLock<Regex> = OnceLock::new();
    URL_RE.get_or_init(|| Regex::new(r#"https?://[^\s\]\[")>]+"#).unwrap())
}

fn percent_decode(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

/// Canonicalize a URL so equivalent links compare equal: https-coerced
/// scheme, lower-cased host, trailing slash stripped (root `/` kept),
/// tracking query params removed, fragment dropped. Idempotent.
///
/// Fail-open: anything that does not parse is returned unchanged, so a
/// malformed citation fails allow-list membership instead of aborting the
/// story.
pub fn normalize_url(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let decoded = percent_decode(raw);
    let parsed = match Url::parse(&decoded) {
        Ok(p) => p,
        Err(_) => return raw.to_string(),
    };
    let Some(host) = parsed.host_str() else {
        // mailto: and friends carry no authority we can canonicalize
        return raw.to_string();
    };

    let scheme = match parsed.scheme() {
        "http" | "https" => "https",
        other => other,
    };

    let mut out = String::with_capacity(decoded.len());
    out.push_str(scheme);
    out.push_str("://");
    if !parsed.username().is_empty() {
        out.push_str(parsed.username());
        if let Some(pass) = parsed.password() {
            out.push(':');
            out.push_str(pass);
        }
        out.push('@');
    }
    out.push_str(&host.to_lowercase());
    if let Some(port) = parsed.port() {
        out.push(':');
        out.push_str(&port.to_string());
    }

    // Strip the trailing slash run; "/" alone is the root and stays.
    let path = parsed.path();
    if path == "/" {
        out.push('/');
    } else {
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() {
            out.push('/');
        } else {
            out.push_str(trimmed);
        }
    }

    // Keep non-tracking query pairs in their original order, blank values
    // included; re-encode what survives. Keys match case-insensitively,
    // values are untouched.
    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| {
            let k = k.to_lowercase();
            !(k.starts_with("utm_") || k == "ref" || k == "source")
        })
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if !kept.is_empty() {
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(kept)
            .finish();
        out.push('?');
        out.push_str(&query);
    }

    // fragment always dropped
    out
}

/// Peel markdown and prose artifacts off a raw regex match before
/// normalization.
fn clean_raw_url(raw: &str) -> String {
    let mut u = percent_decode(raw);

    // A scan that ran into markdown link syntax keeps only the URL part.
    if let Some(idx) = u.find("](") {
        u.truncate(idx);
    }

    let u = u.trim_start_matches('<');
    let mut u = u
        .trim_end_matches(['.', ',', ']', '"', '\'', ')', '>', ' '])
        .to_string();

    // Unbalanced close-parens belong to the surrounding prose, e.g.
    // "(see https://x.com/page)"; a balanced paren inside the path stays.
    while u.ends_with(')') && u.matches(')').count() > u.matches('(').count() {
        u.pop();
    }
    u
}

/// Every URL found in `text`, cleaned and normalized, in order of
/// appearance. Duplicates are kept; entries that normalize to empty are
/// dropped. Pure; no state survives between calls.
pub fn extract_urls(text: &str) -> Vec<String> {
    let mut urls = Vec::new();
    for m in url_pattern().find_iter(text) {
        let cleaned = clean_raw_url(m.as_str());
        let norm = normalize_url(&cleaned);
        if !norm.is_empty() {
            urls.push(norm);
        }
    }
    urls
}

/// The citation of a bullet is the last URL it contains; the required
/// output format puts the source link at the end, so anything earlier is a
/// body mention. None means the bullet cites nothing.
pub fn terminal_citation(bullet: &str) -> Option<String> {
    extract_urls(bullet).pop()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_is_idempotent() {
        let inputs = [
            "https://EX.com/a/?utm_source=x&id=1",
            "http://example.com/path/",
            "https://ex.com/",
            "https://ex.com/a?b=&c=1",
            "https://ex.com/wiki/Foo_(bar)",
            "https://ex.com/a%20b",
            "not a url at all",
            "",
        ];
        for u in inputs {
            let once = normalize_url(u);
            assert_eq!(normalize_url(&once), once, "input: {u:?}");
        }
    }

    #[test]
    fn strips_tracking_params_and_lowercases_host() {
        assert_eq!(
            normalize_url("https://EX.com/a/?utm_source=x&id=1"),
            "https://ex.com/a?id=1"
        );
        assert_eq!(
            normalize_url("https://ex.com/a?UTM_Campaign=z&ref=feed&Source=rss&id=1"),
            "https://ex.com/a?id=1"
        );
    }

    #[test]
    fn tracking_keys_match_on_key_not_value() {
        // value mentioning "ref" survives
        assert_eq!(
            normalize_url("https://ex.com/a?q=ref&id=utm_x"),
            "https://ex.com/a?q=ref&id=utm_x"
        );
    }

    #[test]
    fn trailing_slash_stripped_but_root_kept() {
        assert_eq!(normalize_url("https://ex.com/path/"), "https://ex.com/path");
        assert_eq!(normalize_url("https://ex.com/"), "https://ex.com/");
    }

    #[test]
    fn http_coerced_other_schemes_kept() {
        assert_eq!(normalize_url("http://Ex.com/a"), "https://ex.com/a");
        assert_eq!(normalize_url("ftp://Ex.com/a/"), "ftp://ex.com/a");
    }

    #[test]
    fn blank_query_values_are_retained() {
        assert_eq!(
            normalize_url("https://ex.com/a?b=&c=1"),
            "https://ex.com/a?b=&c=1"
        );
    }

    #[test]
    fn fragment_is_dropped() {
        assert_eq!(
            normalize_url("https://ex.com/a#section-2"),
            "https://ex.com/a"
        );
    }

    #[test]
    fn percent_encoded_input_is_decoded_once() {
        assert_eq!(
            normalize_url("https://ex.com/%7Euser"),
            "https://ex.com/~user"
        );
    }

    #[test]
    fn unparseable_input_passes_through() {
        assert_eq!(normalize_url("not a url at all"), "not a url at all");
        assert_eq!(normalize_url(""), "");
    }

    #[test]
    fn extracts_url_from_markdown_link() {
        assert_eq!(
            extract_urls("See [here](https://ex.com/x) for more."),
            vec!["https://ex.com/x"]
        );
    }

    #[test]
    fn strips_prose_closing_paren() {
        assert_eq!(
            extract_urls("(see https://ex.com/page)"),
            vec!["https://ex.com/page"]
        );
    }

    #[test]
    fn strips_trailing_punctuation() {
        assert_eq!(
            extract_urls("Read https://ex.com/x, then <https://ex.com/y>."),
            vec!["https://ex.com/x", "https://ex.com/y"]
        );
    }

    #[test]
    fn preserves_order_and_duplicates() {
        let text = "https://b.com/1 then https://a.com/2 then https://b.com/1";
        assert_eq!(
            extract_urls(text),
            vec!["https://b.com/1", "https://a.com/2", "https://b.com/1"]
        );
    }

    #[test]
    fn extraction_is_pure() {
        let text = "See [here](https://ex.com/x) and (https://ex.com/y).";
        assert_eq!(extract_urls(text), extract_urls(text));
    }

    #[test]
    fn citation_is_the_last_url() {
        let bullet = "Fact A https://a.com and Fact B [Name](https://b.com)";
        assert_eq!(
            terminal_citation(bullet),
            Some(normalize_url("https://b.com"))
        );
    }

    #[test]
    fn citation_missing_when_no_url() {
        assert_eq!(terminal_citation("No links here."), None);
    }
}
