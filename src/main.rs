//! `streamsift` CLI - resolve locators and inspect the scanner offline

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use streamsift::{ContentKind, Resolver, Scanner, SiteRules};

#[derive(Parser)]
#[command(name = "streamsift")]
#[command(about = "Stream source resolution pipeline")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a locator URL into playable stream descriptors
    Resolve {
        /// Locator URL to resolve
        locator: String,

        /// Referer hint for the first hop
        #[arg(short, long)]
        referer: Option<String>,

        /// Site rules TOML file (defaults to the config-dir rules)
        #[arg(long)]
        rules: Option<std::path::PathBuf>,

        /// Maximum chain depth
        #[arg(long, default_value = "6")]
        max_depth: usize,

        /// Emit descriptors as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Scan a saved HTML or script file for candidates (no network)
    Scan {
        /// File to scan
        file: std::path::PathBuf,

        /// Treat the input as a script blob instead of HTML
        #[arg(long)]
        script: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging; RUST_LOG overrides the default level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Resolve {
            locator,
            referer,
            rules,
            max_depth,
            json,
        } => {
            cmd_resolve(&locator, referer.as_deref(), rules.as_deref(), max_depth, json).await?;
        }
        Commands::Scan { file, script } => {
            cmd_scan(&file, script)?;
        }
    }

    Ok(())
}

async fn cmd_resolve(
    locator: &str,
    referer: Option<&str>,
    rules_path: Option<&std::path::Path>,
    max_depth: usize,
    json: bool,
) -> Result<()> {
    let rules = match rules_path {
        Some(path) => SiteRules::load(path)?,
        None => SiteRules::load_default()?,
    };

    let resolver = Resolver::builder()
        .rules(rules)
        .max_depth(max_depth)
        .build()
        .context("failed to build resolver")?;

    let streams = resolver.resolve(locator, referer).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&streams)?);
        return Ok(());
    }

    if streams.is_empty() {
        println!("No playable sources found");
        return Ok(());
    }

    println!("Found {} source(s):", streams.len());
    for stream in &streams {
        let adaptive = if stream.is_adaptive { " [adaptive]" } else { "" };
        println!(
            "  {:<12} {:?}{}  {}",
            stream.source_name, stream.quality, adaptive, stream.playback_url
        );
        for track in &stream.subtitle_tracks {
            println!("      sub: {} ({})", track.url, track.label);
        }
    }

    Ok(())
}

fn cmd_scan(file: &std::path::Path, script: bool) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let kind = if script {
        ContentKind::Script
    } else {
        ContentKind::Html
    };

    let scanner = Scanner::with_rules(&SiteRules::load_default()?);
    let candidates = scanner.scan(&content, kind);

    if candidates.is_empty() {
        println!("No candidates found");
        return Ok(());
    }

    println!("Found {} candidate(s):", candidates.len());
    for candidate in &candidates {
        println!(
            "  {:<12} {}",
            format!("{:?}", candidate.origin),
            candidate.raw_url
        );
    }

    Ok(())
}
