/*!
Sentiment summary of a YouTube video's latest comments.

Usage:
    comment_analyzer <URL-OR-ID> [OPTIONS]

Options:
    --config <PATH>       Configuration file path (default: $SPL_TOOLKIT_CONFIG or config.toml)
    --help                Show this help message

The API key is read from `youtube.api_key` or `YOUTUBE_API_KEY`.
*/

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use spl_toolkit::analyzer::AnalysisSession;
use spl_toolkit::comments::YouTubeClient;
use spl_toolkit::config::Config;
use spl_toolkit::sentiment::{default_scorer, Sentiment};

const BAR_WIDTH: usize = 30;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let args: Vec<String> = env::args().collect();
    let Some((input, config_path)) = parse_args(&args)? else {
        return Ok(());
    };

    let cfg = match config_path {
        Some(path) => {
            let mut cfg = Config::from_file(&path)?;
            cfg.apply_overrides(|key| env::var(key).ok());
            cfg
        }
        None => Config::load(),
    };
    cfg.validate().context("invalid configuration")?;

    let client = YouTubeClient::from_config(&cfg.youtube).context("cannot reach the YouTube API")?;
    let session = AnalysisSession::new(Arc::new(client), default_scorer(), cfg.youtube.page_size);

    info!(input=%input, "Analyzing comments");
    let notices = session.refresh(&input).await;
    for notice in &notices {
        eprintln!("{notice}");
    }

    let state = session.snapshot().await;
    let Some(video_id) = state.video_id else {
        bail!("analysis failed");
    };

    println!("Video: {video_id}");
    match state.comment_count {
        Some(n) => println!("Total comments: {n}"),
        None => println!("Total comments: unknown"),
    }
    println!("Analyzed: {}", state.comments.len());
    println!();

    println!("Sentiment Analysis");
    let pct = state.summary.percentages();
    for (sentiment, share) in [
        (Sentiment::Agree, pct.agree),
        (Sentiment::Disagree, pct.disagree),
        (Sentiment::Neutral, pct.neutral),
    ] {
        println!(
            "  {:<9} {:>5.1}%  ({})",
            sentiment.label(),
            share,
            state.summary.count(sentiment)
        );
    }
    println!();

    println!("Comment Distribution");
    let peak = state.monthly.peak().max(1);
    for (month, count) in state.monthly.iter() {
        let bar = "#".repeat(count * BAR_WIDTH / peak);
        println!("  {month} {bar:<width$} {count}", width = BAR_WIDTH);
    }
    Ok(())
}

fn parse_args(args: &[String]) -> Result<Option<(String, Option<PathBuf>)>> {
    let mut input = None;
    let mut config_path = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(None);
            }
            "--config" => {
                let value = args.get(i + 1).context("--config requires a value")?;
                config_path = Some(PathBuf::from(value));
                i += 1;
            }
            other if input.is_none() && !other.starts_with("--") => input = Some(other.to_string()),
            other => bail!("Unknown argument: {}", other),
        }
        i += 1;
    }

    match input {
        Some(input) => Ok(Some((input, config_path))),
        None => {
            print_help();
            bail!("missing video URL or id");
        }
    }
}

fn print_help() {
    println!("YouTube Comment Analyzer");
    println!();
    println!("USAGE:");
    println!("    comment_analyzer <URL-OR-ID> [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --config <PATH>       Configuration file path");
    println!("    --help, -h            Show this help message");
    println!();
    println!("ENVIRONMENT:");
    println!("    YOUTUBE_API_KEY       YouTube Data API v3 key");
    println!("    RUST_LOG              Log filter (e.g. info)");
}
