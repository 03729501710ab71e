// src/render.rs
use crate::models::AcceptedStory;

/// Assemble the dated digest document: YAML frontmatter, a briefing
/// heading, then one section per accepted story with its market snippet
/// and validated bullets.
pub fn render_digest(date_str: &str, stories: &[AcceptedStory]) -> String {
    let mut md = String::new();

    md.push_str(&format!(
        "---\n\
         title: \"Daily Briefing: {date}\"\n\
         pubDate: \"{date}\"\n\
         description: \"AI-curated analysis of {count} tech stories.\"\n\
         tags: [\"tech\", \"ai\"]\n\
         ---\n\
         # ☕ Daily Tech Briefing\n",
        date = date_str,
        count = stories.len()
    ));

    for s in stories {
        md.push_str(&format!("## [{}]({}){}\n", s.title, s.source, s.market_data));
        for b in &s.bullets {
            md.push_str(&format!("* {}\n", b));
        }
        md.push('\n');
    }

    md
}
