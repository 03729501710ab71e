mod analyze;
mod api_types;
mod citations;
mod market;
mod models;
mod orchestrator;
mod prompts;
mod render;
mod report;
mod search;
mod sources;
mod validate;

use anyhow::Result;
use awful_aj::{config, template};
use chrono::Local;
use clap::Parser;
use orchestrator::run_briefing;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Awful News Briefing - citation-validated daily news digest generator
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// News source preset (hackernews, techcrunch, theverge, wired,
    /// nytimes, wsj) or a raw RSS/Atom feed URL
    #[arg(short, long, default_value = "hackernews")]
    source: String,

    /// Output directory for the rendered digest (default: "out")
    #[arg(short, long, default_value = "out")]
    output_dir: String,

    /// Path to awful_aj config file (overrides AJ_CONFIG environment variable)
    #[arg(short, long)]
    config: Option<String>,

    /// Where the run report JSON is persisted
    #[arg(long, default_value = "run_report.json")]
    report: String,
}

fn resolve_config_path(cli_config: Option<&str>) -> Result<PathBuf> {
    // 1) CLI flag wins
    if let Some(p) = cli_config {
        debug!("Using config file from --config argument: {}", p);
        return Ok(PathBuf::from(p));
    }

    // 2) AJ_CONFIG, else <base>/config.yaml
    if let Ok(p) = std::env::var("AJ_CONFIG") {
        return Ok(PathBuf::from(p));
    }

    let base_dir = if let Ok(dir) = std::env::var("AJ_CONFIG_DIR") {
        PathBuf::from(dir)
    } else {
        awful_aj::config_dir().map_err(|e| anyhow::anyhow!(e.to_string()))?
    };

    // make the template dir visible to the awful_aj loader
    if std::env::var("AJ_TEMPLATE_DIR").is_err() {
        std::env::set_var("AJ_TEMPLATE_DIR", base_dir.join("templates"));
    }

    Ok(base_dir.join("config.yaml"))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(true)
        .init();

    info!("Starting awful_news_briefing");

    let args = Args::parse();

    // Credentials are checked up front; missing config is fatal before any
    // story is touched.
    let tavily_key = std::env::var("TAVILY_API_KEY")
        .map_err(|_| anyhow::anyhow!("Missing TAVILY_API_KEY environment variable"))?;

    let cfg_path = resolve_config_path(args.config.as_deref())?;

    // Friendlier error if missing
    if !cfg_path.exists() {
        return Err(anyhow::anyhow!(
            "awful_aj config not found at {}\n\
             Use --config to specify a config file, or set AJ_CONFIG environment variable.\n\
             Example config.yaml:\n\
             api_key: \"YOUR_KEY\"\napi_base: \"http://localhost:5001/v1\"\nmodel: \"qwen3_30b_a3\"\n",
            cfg_path.display()
        ));
    }

    // Load config via awful_aj
    let cfg = config::load_config(
        cfg_path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("invalid config path"))?,
    )
    .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    // Analyst template by name; loader uses AJ_TEMPLATE_DIR or defaults
    let tpl_name = std::env::var("AJ_TEMPLATE_ANALYST")
        .unwrap_or_else(|_| "news_briefing_analyst".to_string());
    let tpl = template::load_template(&tpl_name)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let date_str = Local::now().format("%Y-%m-%d").to_string();
    info!(
        "Run parameters - source={}, date={}, output_dir={}",
        args.source, date_str, args.output_dir
    );

    run_briefing(
        &cfg,
        &tpl,
        &tavily_key,
        &args.source,
        &args.output_dir,
        Path::new(&args.report),
        &date_str,
    )
    .await
}
