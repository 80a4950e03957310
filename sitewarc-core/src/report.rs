// Report generation from crawl metadata

use crate::cdx::read_index;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};
use url::Url;

const TOP_N: usize = 10;
const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";
const THIN_RULE: &str = "────────────────────────────────────────────────────────────────────────────────\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

/// The fields the analysis reads from one page entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageInfo {
    pub url: Option<String>,
    pub timestamp: Option<String>,
    pub mime: Option<String>,
    pub status: Option<String>,
}

impl PageInfo {
    pub fn from_value(page: &Value) -> Self {
        Self {
            url: field(page, &["url", "uri"]),
            timestamp: field(page, &["timestamp", "ts"]),
            mime: field(page, &["mime", "content-type"]),
            status: field(page, &["status"]).filter(|status| status != "0"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Count {
    pub value: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub first: String,
    pub last: String,
    pub total_timestamps: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrawlAnalysis {
    pub total_pages: usize,
    /// Scalar and object top-level keys of the source document.
    pub crawl_metadata: Map<String, Value>,
    pub urls_crawled: usize,
    pub unique_domains: usize,
    pub domain_distribution: Vec<Count>,
    pub content_types: Vec<Count>,
    pub http_statuses: Vec<Count>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRange>,
    pub file_extensions: Vec<Count>,
}

/// Reads a crawl-metadata JSON document, or a `.cdx` index written by a crawl.
pub fn load_metadata(path: &Path) -> Result<Value> {
    let is_index = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("cdx"));

    if is_index {
        let pages: Vec<Value> = read_index(path)?
            .into_iter()
            .map(|entry| {
                json!({
                    "url": entry.url,
                    "timestamp": entry.timestamp,
                    "mime": entry.content_type,
                    "status": entry.status,
                })
            })
            .collect();
        debug!("Loaded {} index entries from {}", pages.len(), path.display());
        return Ok(json!({ "source": path.display().to_string(), "pages": pages }));
    }

    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Page entries: the `pages` array, else `resources`, else the document
/// itself when it is an array.
pub fn extract_pages(data: &Value) -> Vec<&Value> {
    if let Some(pages) = data.get("pages").and_then(Value::as_array)
        && !pages.is_empty()
    {
        return pages.iter().collect();
    }
    if let Some(resources) = data.get("resources").and_then(Value::as_array) {
        return resources.iter().collect();
    }
    data.as_array()
        .map(|pages| pages.iter().collect())
        .unwrap_or_default()
}

pub fn analyze(data: &Value) -> CrawlAnalysis {
    let pages = extract_pages(data);

    let crawl_metadata: Map<String, Value> = data
        .as_object()
        .map(|object| {
            object
                .iter()
                .filter(|(key, value)| {
                    key.as_str() != "pages" && key.as_str() != "resources" && !value.is_array()
                })
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        })
        .unwrap_or_default();

    let mut analysis = CrawlAnalysis {
        total_pages: pages.len(),
        crawl_metadata,
        ..Default::default()
    };

    if pages.is_empty() {
        warn!("No pages found in the data structure");
        return analysis;
    }

    let mut urls = Vec::new();
    let mut domains: HashMap<String, usize> = HashMap::new();
    let mut timestamps = Vec::new();
    let mut content_types: HashMap<String, usize> = HashMap::new();
    let mut statuses: HashMap<String, usize> = HashMap::new();

    for page in pages.iter().map(|page| PageInfo::from_value(page)) {
        if let Some(url) = page.url {
            if let Some(domain) = domain_of(&url) {
                *domains.entry(domain).or_default() += 1;
            }
            urls.push(url);
        }
        if let Some(ts) = page.timestamp {
            timestamps.push(ts);
        }
        if let Some(mime) = page.mime {
            *content_types.entry(mime).or_default() += 1;
        }
        if let Some(status) = page.status {
            *statuses.entry(status).or_default() += 1;
        }
    }

    let mut extensions: HashMap<String, usize> = HashMap::new();
    for ext in urls.iter().filter_map(|url| file_extension(url)) {
        *extensions.entry(ext).or_default() += 1;
    }

    analysis.urls_crawled = urls.len();
    analysis.unique_domains = domains.len();
    analysis.domain_distribution = top_counts(domains, TOP_N);
    analysis.content_types = top_counts(content_types, usize::MAX);
    analysis.file_extensions = top_counts(extensions, TOP_N);

    let mut statuses: Vec<Count> = statuses
        .into_iter()
        .map(|(value, count)| Count { value, count })
        .collect();
    statuses.sort_by(|a, b| a.value.cmp(&b.value));
    analysis.http_statuses = statuses;

    if let (Some(first), Some(last)) = (timestamps.iter().min(), timestamps.iter().max()) {
        analysis.time_range = Some(TimeRange {
            first: first.clone(),
            last: last.clone(),
            total_timestamps: timestamps.len(),
        });
    }

    analysis
}

pub fn generate_text_report(analysis: &CrawlAnalysis, source: &str) -> String {
    let mut report = String::new();

    report.push_str(RULE);
    report.push_str("                          SITEWARC CRAWL ANALYSIS REPORT\n");
    report.push_str(RULE);
    report.push('\n');
    report.push_str(&format!(
        "Generated:    {}\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    ));
    report.push_str(&format!("Source:       {}\n\n", source));

    if !analysis.crawl_metadata.is_empty() {
        section(&mut report, "CRAWL METADATA");
        for (key, value) in &analysis.crawl_metadata {
            report.push_str(&format!("  {}: {}\n", key, display_value(value)));
        }
        report.push('\n');
    }

    section(&mut report, "OVERVIEW");
    report.push_str(&format!("  Total Pages:    {}\n", analysis.total_pages));
    report.push_str(&format!("  URLs Crawled:   {}\n", analysis.urls_crawled));
    report.push_str(&format!("  Unique Domains: {}\n\n", analysis.unique_domains));

    if let Some(ref range) = analysis.time_range {
        section(&mut report, "TIME RANGE");
        report.push_str(&format!("  First: {}\n", range.first));
        report.push_str(&format!("  Last:  {}\n", range.last));
        report.push_str(&format!(
            "  Entries with timestamps: {}\n\n",
            range.total_timestamps
        ));
    }

    if !analysis.domain_distribution.is_empty() {
        section(&mut report, "TOP DOMAINS");
        for entry in &analysis.domain_distribution {
            report.push_str(&format!("  {}: {} pages\n", entry.value, entry.count));
        }
        report.push('\n');
    }

    if !analysis.content_types.is_empty() {
        section(&mut report, "CONTENT TYPES");
        for entry in &analysis.content_types {
            report.push_str(&format!("  {}: {}\n", entry.value, entry.count));
        }
        report.push('\n');
    }

    if !analysis.http_statuses.is_empty() {
        section(&mut report, "HTTP STATUS CODES");
        for entry in &analysis.http_statuses {
            report.push_str(&format!("  {}: {}\n", entry.value, entry.count));
        }
        report.push('\n');
    }

    if !analysis.file_extensions.is_empty() {
        section(&mut report, "FILE EXTENSIONS");
        for entry in &analysis.file_extensions {
            report.push_str(&format!("  .{}: {}\n", entry.value, entry.count));
        }
        report.push('\n');
    }

    report.push_str(RULE);
    report.push_str("                                  End of Report\n");
    report.push_str(RULE);

    report
}

pub fn generate_json_report(analysis: &CrawlAnalysis) -> std::result::Result<String, serde_json::Error> {
    serde_json::to_string_pretty(analysis)
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

fn section(report: &mut String, title: &str) {
    report.push_str(title);
    report.push('\n');
    report.push_str(THIN_RULE);
}

/// First of `keys` holding a non-empty scalar, as a string.
fn field(page: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| page.get(key))
        .find_map(scalar_string)
        .filter(|value| !value.is_empty())
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn display_value(value: &Value) -> String {
    scalar_string(value).unwrap_or_else(|| value.to_string())
}

/// `host` or `host:port`, as written in the URL.
fn domain_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// Lowercased extension of the last path segment, if it has one.
fn file_extension(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed.path().rsplit('/').next()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Highest counts first, ties by name, at most `limit` entries.
fn top_counts(counts: HashMap<String, usize>, limit: usize) -> Vec<Count> {
    let mut sorted: Vec<Count> = counts
        .into_iter()
        .map(|(value, count)| Count { value, count })
        .collect();
    sorted.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    sorted.truncate(limit);
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_fallbacks() {
        let page = json!({"uri": "http://a.org/x", "ts": "2024", "content-type": "text/html", "status": 200});
        let info = PageInfo::from_value(&page);
        assert_eq!(info.url.as_deref(), Some("http://a.org/x"));
        assert_eq!(info.timestamp.as_deref(), Some("2024"));
        assert_eq!(info.mime.as_deref(), Some("text/html"));
        assert_eq!(info.status.as_deref(), Some("200"));
    }

    #[test]
    fn test_primary_key_wins() {
        let page = json!({"url": "http://a.org/", "uri": "http://b.org/"});
        assert_eq!(PageInfo::from_value(&page).url.as_deref(), Some("http://a.org/"));
    }

    #[test]
    fn test_empty_and_zero_values_are_ignored() {
        let page = json!({"url": "", "mime": null, "status": 0});
        assert_eq!(PageInfo::from_value(&page), PageInfo::default());
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("http://a.org/img/Logo.PNG"), Some("png".to_string()));
        assert_eq!(file_extension("http://a.org/v1.2/page"), None);
        assert_eq!(file_extension("http://a.org/.hidden"), None);
        assert_eq!(file_extension("http://a.org/"), None);
    }

    #[test]
    fn test_domain_keeps_explicit_port() {
        assert_eq!(domain_of("http://a.org:8080/x"), Some("a.org:8080".to_string()));
        assert_eq!(domain_of("http://a.org:80/x"), Some("a.org".to_string()));
        assert_eq!(domain_of("nonsense"), None);
    }

    #[test]
    fn test_top_counts_order_and_limit() {
        let counts = HashMap::from([
            ("b".to_string(), 2),
            ("a".to_string(), 2),
            ("c".to_string(), 5),
            ("d".to_string(), 1),
        ]);
        let top = top_counts(counts, 3);
        let names: Vec<&str> = top.iter().map(|c| c.value.as_str()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }
}
