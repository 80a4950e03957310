use crate::archive::{ArchiveStream, ArchiveWriter};
use crate::cdx::IndexEntry;
use crate::error::{ArchiveError, Result};
use chrono::{DateTime, Local};
use indicatif::{ProgressBar, ProgressStyle};
use sitewarc_scanner::{CaptureSink, CrawlStats, Crawler, FetchResult, normalize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::warn;
use url::Url;

pub const SOFTWARE: &str = concat!("sitewarc/", env!("CARGO_PKG_VERSION"));
const RUN_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Options for configuring a crawl operation
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub url: String,
    pub output_dir: PathBuf,
    /// Hosts the crawl may visit. Empty means the seed's host only.
    pub allowed_domains: Vec<String>,
    /// 0 means unlimited.
    pub max_depth: usize,
    pub delay_secs: f64,
    pub timeout_secs: u64,
    pub show_progress_bars: bool,
}

impl CrawlOptions {
    pub fn new(url: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            output_dir: output_dir.into(),
            allowed_domains: Vec::new(),
            max_depth: 0,
            delay_secs: 1.0,
            timeout_secs: sitewarc_scanner::fetcher::DEFAULT_TIMEOUT_SECS,
            show_progress_bars: false,
        }
    }
}

/// The three files one run produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub warc: PathBuf,
    pub cdx: PathBuf,
    pub log: PathBuf,
}

impl OutputPaths {
    /// `<host>-<YYYYmmddHHMMSS>.{warc.gz,cdx,log}` inside `dir`.
    pub fn for_run(dir: &Path, host: &str, started: &DateTime<Local>) -> Self {
        let stem = format!("{}-{}", host, started.format(RUN_TIMESTAMP_FORMAT));
        Self {
            warc: dir.join(format!("{}.warc.gz", stem)),
            cdx: dir.join(format!("{}.cdx", stem)),
            log: dir.join(format!("{}.log", stem)),
        }
    }

    /// Paths for a run starting now, named after the seed's host.
    pub fn for_seed(dir: &Path, seed_url: &str) -> Result<Self> {
        let host = seed_host(seed_url)?;
        Ok(Self::for_run(dir, &host, &Local::now()))
    }
}

/// Callback for reporting crawl progress
pub type CrawlProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Callback for reporting each archived record as it is written
pub type CrawlResultCallback = Arc<dyn Fn(&IndexEntry) + Send + Sync>;

/// Outcome of one run.
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub start_url: String,
    pub max_depth: usize,
    pub delay_secs: f64,
    pub stats: CrawlStats,
    pub records_written: usize,
    pub elapsed: Duration,
    pub paths: OutputPaths,
}

/// Archive writer that also reports every committed record.
struct ReportingSink<'a, W: ArchiveStream> {
    writer: &'a mut ArchiveWriter<W>,
    on_record: Option<CrawlResultCallback>,
}

impl<W: ArchiveStream> CaptureSink for ReportingSink<'_, W> {
    type Error = ArchiveError;

    fn capture(&mut self, url: &str, result: &FetchResult) -> std::result::Result<(), ArchiveError> {
        let entry = self.writer.write(url, result)?;
        if let Some(ref callback) = self.on_record {
            callback(&entry);
        }
        Ok(())
    }
}

/// Host component of a seed URL, as used in output file names.
pub fn seed_host(seed_url: &str) -> Result<String> {
    let normalized = normalize(seed_url)?;
    Url::parse(&normalized)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .ok_or_else(|| ArchiveError::InvalidOption(format!("{} has no host", seed_url)))
}

/// Execute a crawl, archiving every response to `paths`.
///
/// Fails only before traversal starts (bad options, unwritable output);
/// per-URL problems are counted in the returned stats.
pub async fn execute_crawl(
    options: CrawlOptions,
    paths: &OutputPaths,
    progress_callback: Option<CrawlProgressCallback>,
    result_callback: Option<CrawlResultCallback>,
) -> Result<CrawlSummary> {
    let CrawlOptions {
        url,
        output_dir,
        allowed_domains,
        max_depth,
        delay_secs,
        timeout_secs,
        show_progress_bars,
    } = options;

    let delay = Duration::try_from_secs_f64(delay_secs).map_err(|_| {
        ArchiveError::InvalidOption(format!("delay must be a non-negative number, got {}", delay_secs))
    })?;
    if timeout_secs == 0 {
        return Err(ArchiveError::InvalidOption(
            "timeout must be at least one second".to_string(),
        ));
    }

    std::fs::create_dir_all(&output_dir).map_err(|source| ArchiveError::Open {
        path: output_dir.clone(),
        source,
    })?;
    let mut writer = ArchiveWriter::create(&paths.warc, &paths.cdx, SOFTWARE)?;

    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message("Starting crawl...");
        Some(Arc::new(pb))
    } else {
        None
    };

    let processed_count = Arc::new(AtomicUsize::new(0));
    let internal_progress_callback: sitewarc_scanner::ProgressCallback = match progress_bar {
        Some(ref pb) => {
            let pb_clone = pb.clone();
            let count_clone = processed_count.clone();
            Arc::new(move |count: usize, url: String| {
                count_clone.store(count, Ordering::Relaxed);
                pb_clone.set_message(format!("[{}] {}", count, url));
                pb_clone.tick();
            })
        }
        None => {
            let count_clone = processed_count.clone();
            Arc::new(move |count: usize, _url: String| {
                count_clone.store(count, Ordering::Relaxed);
            })
        }
    };

    let mut crawler = Crawler::with_timeout(timeout_secs)?
        .with_max_depth(max_depth)
        .with_delay(delay)
        .with_progress_callback(internal_progress_callback);
    if !allowed_domains.is_empty() {
        crawler = crawler.with_allowed_hosts(allowed_domains);
    }

    if let Some(ref callback) = progress_callback {
        callback(format!("Crawling {}", url));
    }

    let started = Instant::now();
    let mut sink = ReportingSink {
        writer: &mut writer,
        on_record: result_callback,
    };
    let crawl_result = crawler.crawl(&url, &mut sink).await;

    if let Err(e) = writer.finish() {
        warn!("Failed to flush archive output: {}", e);
    }

    if let Some(ref pb) = progress_bar {
        let total = processed_count.load(Ordering::Relaxed);
        pb.finish_with_message(format!("Crawl complete! {} URLs processed", total));
    }

    let stats = crawl_result?;
    Ok(CrawlSummary {
        start_url: url,
        max_depth,
        delay_secs,
        stats,
        records_written: writer.records_written(),
        elapsed: started.elapsed(),
        paths: paths.clone(),
    })
}

/// Human-readable end-of-run summary
pub fn generate_crawl_summary(summary: &CrawlSummary) -> String {
    let rule = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";
    let depth = if summary.max_depth == 0 {
        "Unlimited".to_string()
    } else {
        summary.max_depth.to_string()
    };

    let mut report = String::new();
    report.push_str(rule);
    report.push_str("\n# Summary:\n");
    report.push_str(&format!("  Start URL: {}\n", summary.start_url));
    report.push_str(&format!("  Max depth: {}\n", depth));
    report.push_str(&format!("  Delay: {}s between requests\n", summary.delay_secs));
    report.push_str(&format!("  Total URLs crawled: {}\n", summary.stats.crawled));
    report.push_str(&format!("  URLs skipped: {}\n", summary.stats.skipped));
    report.push_str(&format!("  Errors encountered: {}\n", summary.stats.errors));
    report.push_str(&format!("  Records archived: {}\n", summary.records_written));
    if summary.stats.write_errors > 0 {
        report.push_str(&format!("  Write errors: {}\n", summary.stats.write_errors));
    }
    report.push_str(&format!("  Elapsed: {:.1}s\n", summary.elapsed.as_secs_f64()));

    report.push_str("\n# Output:\n");
    report.push_str(&format!("  WARC file: {}\n", summary.paths.warc.display()));
    report.push_str(&format!("  CDX file:  {}\n", summary.paths.cdx.display()));
    report.push_str(&format!("  Log file:  {}\n", summary.paths.log.display()));

    report.push_str("\n# Uploading to the Internet Archive:\n");
    report.push_str("  1. Create an account at https://archive.org\n");
    report.push_str("  2. Upload the .warc.gz file to a new item\n");
    report.push_str("  3. Set the item's mediatype to 'web'\n");
    report.push('\n');
    report.push_str(rule);

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_output_paths_for_run() {
        let started = Local.with_ymd_and_hms(2024, 3, 1, 9, 5, 7).unwrap();
        let paths = OutputPaths::for_run(Path::new("/tmp/out"), "example.org", &started);
        assert_eq!(paths.warc, PathBuf::from("/tmp/out/example.org-20240301090507.warc.gz"));
        assert_eq!(paths.cdx, PathBuf::from("/tmp/out/example.org-20240301090507.cdx"));
        assert_eq!(paths.log, PathBuf::from("/tmp/out/example.org-20240301090507.log"));
    }

    #[test]
    fn test_seed_host() {
        assert_eq!(seed_host("http://WWW.Example.org:80/a").unwrap(), "www.example.org");
        assert!(seed_host("not a url").is_err());
    }

    #[test]
    fn test_summary_mentions_counts_and_files() {
        let summary = CrawlSummary {
            start_url: "http://example.org/".to_string(),
            max_depth: 0,
            delay_secs: 1.0,
            stats: CrawlStats {
                crawled: 3,
                skipped: 1,
                errors: 1,
                archived: 2,
                write_errors: 0,
            },
            records_written: 2,
            elapsed: Duration::from_secs(4),
            paths: OutputPaths::for_run(
                Path::new("out"),
                "example.org",
                &Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
            ),
        };

        let report = generate_crawl_summary(&summary);
        assert!(report.contains("Max depth: Unlimited"));
        assert!(report.contains("Total URLs crawled: 3"));
        assert!(report.contains("Errors encountered: 1"));
        assert!(report.contains("Records archived: 2"));
        assert!(!report.contains("Write errors"));
        assert!(report.contains("example.org-20240102030405.warc.gz"));
    }
}
