use crate::admission::AdmissionFilter;
use crate::error::{Result, ScanError};
use crate::extract::extract_links;
use crate::fetcher::{DEFAULT_TIMEOUT_SECS, Fetch, HttpFetcher};
use crate::frontier::{Frontier, FrontierEntry};
use crate::normalize::normalize;
use crate::result::{CrawlStats, FetchResult};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Called with the running crawl counter and the URL about to be fetched.
pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);

/// Destination for every successful fetch, keyed by the requested URL.
pub trait CaptureSink {
    type Error: Display;

    fn capture(&mut self, url: &str, result: &FetchResult) -> std::result::Result<(), Self::Error>;
}

/// Mutable state of one crawl run: the frontier, its visited set and the
/// counters. Nothing outlives the run.
pub struct CrawlSession {
    frontier: Frontier,
    stats: CrawlStats,
}

impl CrawlSession {
    pub fn new(frontier: Frontier) -> Self {
        Self {
            frontier,
            stats: CrawlStats::default(),
        }
    }

    /// Pop entries until one that was not dispatched before, and mark it.
    pub fn next_entry(&mut self) -> Option<FrontierEntry> {
        while let Some(entry) = self.frontier.pop() {
            if !self.frontier.mark_visited(&entry.url) {
                self.stats.skipped += 1;
                debug!("Skipping already visited URL: {}", entry.url);
                continue;
            }
            self.stats.crawled += 1;
            return Some(entry);
        }
        None
    }

    /// Queue discovered links one level below `parent_depth`, in the order
    /// given. Returns how many were accepted.
    pub fn enqueue_links<I>(&mut self, links: I, parent_depth: usize) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        links
            .into_iter()
            .filter(|link| self.frontier.push(link, parent_depth + 1))
            .count()
    }

    pub fn record_fetch_error(&mut self, url: &str, err: &ScanError) {
        self.stats.errors += 1;
        error!("Error fetching {}: {}", url, err);
    }

    pub fn record_capture<E: Display>(&mut self, url: &str, outcome: std::result::Result<(), E>) {
        match outcome {
            Ok(()) => self.stats.archived += 1,
            Err(e) => {
                self.stats.write_errors += 1;
                error!("Error writing archive record for {}: {}", url, e);
            }
        }
    }

    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    pub fn frontier_mut(&mut self) -> &mut Frontier {
        &mut self.frontier
    }

    pub fn stats(&self) -> &CrawlStats {
        &self.stats
    }

    pub fn into_stats(self) -> CrawlStats {
        self.stats
    }
}

pub struct Crawler<F = HttpFetcher> {
    fetcher: F,
    max_depth: usize,
    delay: Duration,
    allowed_hosts: Option<Vec<String>>,
    progress_callback: Option<ProgressCallback>,
}

impl Crawler<HttpFetcher> {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_timeout(timeout_secs: u64) -> Result<Self> {
        Ok(Self::with_fetcher(HttpFetcher::with_timeout(timeout_secs)?))
    }
}

impl<F: Fetch> Crawler<F> {
    pub fn with_fetcher(fetcher: F) -> Self {
        Self {
            fetcher,
            max_depth: 0,
            delay: DEFAULT_DELAY,
            allowed_hosts: None,
            progress_callback: None,
        }
    }

    /// `0` means unlimited.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Replace the default allow-list (the start URL's host).
    pub fn with_allowed_hosts(mut self, hosts: Vec<String>) -> Self {
        self.allowed_hosts = Some(hosts);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Walk the site breadth-first from `start_url`, handing every response to
    /// `sink`. Only a start URL that cannot be parsed is an error; everything
    /// that goes wrong per URL is logged, counted and skipped.
    pub async fn crawl<S: CaptureSink>(&self, start_url: &str, sink: &mut S) -> Result<CrawlStats> {
        let seed = normalize(start_url)?;
        let filter = match &self.allowed_hosts {
            Some(hosts) => AdmissionFilter::new(hosts),
            None => AdmissionFilter::for_seed(&seed)
                .ok_or_else(|| ScanError::MalformedUrl(format!("{} has no host", start_url)))?,
        };

        info!(
            "Starting crawl of {} (max depth: {}, delay: {:?})",
            seed,
            if self.max_depth == 0 {
                "unlimited".to_string()
            } else {
                self.max_depth.to_string()
            },
            self.delay
        );

        let mut session = CrawlSession::new(Frontier::new(filter, self.max_depth));
        if !session.frontier_mut().seed(&seed) {
            warn!("Start URL {} is not admitted by the allow-list", seed);
        }

        while let Some(entry) = session.next_entry() {
            let count = session.stats().crawled;
            info!("[{}] Crawling (depth={}): {}", count, entry.depth, entry.url);
            if let Some(ref callback) = self.progress_callback {
                callback(count, entry.url.clone());
            }

            match self.fetcher.fetch(&entry.url).await {
                Ok(result) => {
                    let outcome = sink.capture(&entry.url, &result);
                    session.record_capture(&entry.url, outcome);

                    if result.is_html() {
                        let html = String::from_utf8_lossy(&result.body);
                        let links = extract_links(&html, &result.final_url);
                        let added = session.enqueue_links(links, entry.depth);
                        if added > 0 {
                            debug!("Added {} new links to queue from {}", added, entry.url);
                        }
                    }
                }
                Err(e) => session.record_fetch_error(&entry.url, &e),
            }

            if !session.frontier().is_empty() && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        let stats = session.into_stats();
        info!(
            "Crawl complete. Crawled {} URLs ({} archived, {} errors, {} skipped)",
            stats.crawled, stats.archived, stats.errors, stats.skipped
        );
        Ok(stats)
    }
}
