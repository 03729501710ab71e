/// Prompt for the per-story analysis call. The seed URL is scheme-redacted
/// so the model cannot copy it back as a live citation; only the allow-list
/// carries citable URLs.
pub fn user_story_analysis(
    title: &str,
    context: &str,
    seed_url_redacted: &str,
    primary_url: &str,
    allowed_urls_json: &str,
) -> String {
    format!(
        r#"You are a strict financial analyst.
STORY: {title}
CONTEXT: {context}

SEED URL (Reference Only): {seed}
PRIMARY CITATION TARGET: {primary}

TASK: Write 2-3 bullet points summarizing the story.

CRITICAL RULES:
1. Return ONLY a valid JSON object.
2. Every bullet MUST end with the citation format: [Source Name](URL)
3. DO NOT add a trailing period after the citation.
4. Use URLs from this list ONLY: {allowed}
5. If context is insufficient, return "bullets": []

OUTPUT SCHEMA: {{"bullets": ["Bullet text [Source](URL)", "Another bullet [Source](URL)"]}}"#,
        title = title,
        context = context,
        seed = seed_url_redacted,
        primary = primary_url,
        allowed = allowed_urls_json
    )
}
