use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use colored::Colorize;
use sitewarc_core::crawl::{
    CrawlOptions, CrawlProgressCallback, OutputPaths, execute_crawl, generate_crawl_summary,
};
use sitewarc_core::report::{
    ReportFormat, analyze, generate_json_report, generate_text_report, load_metadata, save_report,
};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::info;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, fmt};
use url::Url;

/// Log target prefix shared by every crate in the workspace.
const LOG_TARGET: &str = "sitewarc";

pub fn print_banner() {
    println!(
        "{} {}",
        "sitewarc".bright_cyan().bold(),
        env!("CARGO_PKG_VERSION").bright_black()
    );
    println!("{}", "single-site crawler, WARC/CDX archiver".bright_black());
    println!();
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

/// Console verbosity: `-q` wins over `-v`.
pub fn console_level(quiet: bool, verbose: bool) -> LevelFilter {
    if quiet {
        LevelFilter::ERROR
    } else if verbose {
        LevelFilter::INFO
    } else {
        LevelFilter::WARN
    }
}

/// Installs the global subscriber: console at `console`, and a DEBUG
/// run log when `log_path` is given. Other crates' events are kept at WARN.
pub fn init_logging(log_path: Option<&Path>, console: LevelFilter) -> Result<()> {
    let console_layer = fmt::layer()
        .without_time()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(
            Targets::new()
                .with_target(LOG_TARGET, console)
                .with_default(console.min(LevelFilter::WARN)),
        );

    let file_layer = match log_path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(
                        Targets::new()
                            .with_target(LOG_TARGET, LevelFilter::DEBUG)
                            .with_default(LevelFilter::WARN),
                    ),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install logger")?;
    Ok(())
}

/// Parse a seed URL, trying to add http:// if needed
pub fn parse_seed_url(raw: &str) -> Result<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        bail!("Seed URL is empty");
    }

    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{}", raw)
    };

    let parsed = Url::parse(&candidate).with_context(|| format!("Invalid seed URL '{}'", raw))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => bail!("Unsupported scheme '{}' in seed URL (use http or https)", other),
    }
    if parsed.host_str().is_none() {
        bail!("Seed URL '{}' has no host", raw);
    }

    Ok(candidate)
}

/// Expands a leading `~` in the output directory.
pub fn expand_output_dir(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

pub fn crawl_options_from_matches(sub_matches: &ArgMatches) -> Result<CrawlOptions> {
    let url = sub_matches
        .get_one::<String>("URL")
        .context("A seed URL is required")?;
    let output = sub_matches
        .get_one::<String>("output")
        .map(String::as_str)
        .unwrap_or("./archive");

    let delay_secs = sub_matches.get_one::<f64>("delay").copied().unwrap_or(1.0);
    if !delay_secs.is_finite() || delay_secs < 0.0 {
        bail!("--delay must be a non-negative number of seconds");
    }

    let quiet = sub_matches.get_flag("quiet");
    let verbose = sub_matches.get_flag("verbose");

    Ok(CrawlOptions {
        url: parse_seed_url(url)?,
        output_dir: expand_output_dir(output),
        allowed_domains: sub_matches
            .get_many::<String>("allow-domain")
            .map(|hosts| hosts.cloned().collect())
            .unwrap_or_default(),
        max_depth: sub_matches.get_one::<usize>("depth").copied().unwrap_or(0),
        delay_secs,
        timeout_secs: sub_matches.get_one::<u64>("timeout").copied().unwrap_or(30),
        show_progress_bars: !quiet && !verbose,
    })
}

pub async fn handle_crawl(sub_matches: &ArgMatches) -> Result<()> {
    let quiet = sub_matches.get_flag("quiet");
    let verbose = sub_matches.get_flag("verbose");
    let options = crawl_options_from_matches(sub_matches)?;

    fs::create_dir_all(&options.output_dir).with_context(|| {
        format!(
            "Failed to create output directory {}",
            options.output_dir.display()
        )
    })?;
    let paths = OutputPaths::for_seed(&options.output_dir, &options.url)?;
    init_logging(Some(&paths.log), console_level(quiet, verbose))?;

    info!("Start URL: {}", options.url);
    info!(
        "Max Depth: {}",
        if options.max_depth == 0 {
            "Unlimited".to_string()
        } else {
            options.max_depth.to_string()
        }
    );
    info!("Delay: {}s between requests", options.delay_secs);
    info!("Output WARC: {}", paths.warc.display());
    info!("Output CDX:  {}", paths.cdx.display());
    info!("Log file:    {}", paths.log.display());

    if !quiet {
        print_divider();
        println!("{} {}", "→".blue(), options.url.bright_white());
        println!(
            "{} Max depth: {}",
            "→".blue(),
            if options.max_depth == 0 {
                "unlimited".to_string()
            } else {
                options.max_depth.to_string()
            }
        );
        println!("{} Delay: {}s", "→".blue(), options.delay_secs);
        if !options.allowed_domains.is_empty() {
            println!(
                "{} Allowed hosts: {}",
                "→".blue(),
                options.allowed_domains.join(", ")
            );
        }
        print_divider();
        println!();
    }

    let progress_callback: Option<CrawlProgressCallback> = if quiet {
        None
    } else {
        Some(Arc::new(|msg: String| {
            println!("{}", msg.bright_black());
        }))
    };

    let summary = execute_crawl(options, &paths, progress_callback, None)
        .await
        .context("Crawl failed")?;

    if !quiet {
        println!("\n{} Crawl complete!\n", "✓".green().bold());
        print!("{}", generate_crawl_summary(&summary));
    }
    Ok(())
}

pub fn handle_report(sub_matches: &ArgMatches) -> Result<()> {
    let file = sub_matches
        .get_one::<PathBuf>("FILE")
        .context("An input file is required")?;
    let format_name = sub_matches
        .get_one::<String>("format")
        .map(String::as_str)
        .unwrap_or("text");
    let format = ReportFormat::from_str(format_name)
        .with_context(|| format!("Unknown report format '{}'", format_name))?;

    let data = load_metadata(file)
        .with_context(|| format!("Failed to load crawl metadata from {}", file.display()))?;
    let analysis = analyze(&data);

    let content = match format {
        ReportFormat::Text => generate_text_report(&analysis, &file.display().to_string()),
        ReportFormat::Json => generate_json_report(&analysis)?,
    };

    match sub_matches.get_one::<PathBuf>("output") {
        Some(path) => {
            save_report(&content, path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            println!(
                "{} Report saved to: {}",
                "✓".green().bold(),
                path.display().to_string().bright_white()
            );
        }
        None => print!("{}", content),
    }

    if let Some(path) = sub_matches.get_one::<PathBuf>("json") {
        save_report(&generate_json_report(&analysis)?, path)
            .with_context(|| format!("Failed to write analysis to {}", path.display()))?;
        println!(
            "{} Analysis data saved to: {}",
            "✓".green().bold(),
            path.display().to_string().bright_white()
        );
    }

    Ok(())
}
