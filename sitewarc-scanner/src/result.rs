use serde::{Deserialize, Serialize};

/// One HTTP response as captured by a [`Fetch`](crate::fetcher::Fetch) implementation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResult {
    pub status_code: u16,
    /// Reason phrase for the status line, e.g. `OK`. May be empty.
    pub reason: String,
    /// Protocol token for the status line, e.g. `HTTP/1.1`.
    pub http_version: String,
    /// Response headers in wire order.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// Location after redirects were followed.
    pub final_url: String,
}

impl FetchResult {
    pub fn new(status_code: u16, final_url: String) -> Self {
        Self {
            status_code,
            reason: String::new(),
            http_version: "HTTP/1.1".to_string(),
            headers: Vec::new(),
            body: Vec::new(),
            final_url,
        }
    }

    /// Case-insensitive lookup of the first header with this name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn is_html(&self) -> bool {
        self.content_type()
            .map(|ct| ct.to_ascii_lowercase().contains("text/html"))
            .unwrap_or(false)
    }

    /// The HTTP status line without its line terminator.
    pub fn status_line(&self) -> String {
        if self.reason.is_empty() {
            format!("{} {}", self.http_version, self.status_code)
        } else {
            format!("{} {} {}", self.http_version, self.status_code, self.reason)
        }
    }
}

/// Counters reported at the end of a crawl run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlStats {
    /// Entries dispatched to the fetcher.
    pub crawled: usize,
    /// Entries dropped at dispatch time (already visited, out of bounds, not allowed).
    pub skipped: usize,
    /// Fetch failures.
    pub errors: usize,
    /// Responses handed to the capture sink successfully.
    pub archived: usize,
    /// Responses the capture sink failed to persist.
    pub write_errors: usize,
}
