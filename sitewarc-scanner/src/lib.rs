pub mod admission;
pub mod crawler;
pub mod error;
pub mod extract;
pub mod fetcher;
pub mod frontier;
pub mod normalize;
pub mod result;

pub use admission::AdmissionFilter;
pub use crawler::{CaptureSink, CrawlSession, Crawler, ProgressCallback};
pub use error::ScanError;
pub use extract::{LinkSource, ScraperDocument, extract_links};
pub use fetcher::{Fetch, HttpFetcher};
pub use frontier::{Frontier, FrontierEntry};
pub use normalize::normalize;
pub use result::{CrawlStats, FetchResult};
