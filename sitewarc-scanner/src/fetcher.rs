use crate::error::Result;
use crate::result::FetchResult;
use reqwest::{Client, Version};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

pub const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (compatible; sitewarc/",
    env!("CARGO_PKG_VERSION"),
    "; +https://github.com/trapdoorsec/sitewarc)"
);
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_REDIRECTS: usize = 10;

/// Transport contract the crawler needs: one GET, redirects followed,
/// a typed failure for anything that did not produce a full response.
pub trait Fetch {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<FetchResult>> + Send;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    /// Bodies are kept as sent: no `Accept-Encoding` is offered and a
    /// compressed response is archived compressed, with its headers intact.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .no_gzip()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.div_ceil(2)))
            .cookie_store(true)
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;

        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResult> {
        debug!("Fetching URL: {}", url);

        let response = self.client.get(url).send().await?;

        let status = response.status();
        let mut result = FetchResult::new(status.as_u16(), response.url().to_string());
        result.reason = status.canonical_reason().unwrap_or_default().to_string();
        result.http_version = status_line_version(response.version()).to_string();
        result.headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        result.body = response.bytes().await?.to_vec();

        debug!(
            "Response: {} - {} bytes",
            result.status_code,
            result.body.len()
        );
        Ok(result)
    }
}

/// Records use HTTP/1.x message framing whatever protocol carried them.
fn status_line_version(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        _ => "HTTP/1.1",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScanError;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method, path},
    };

    #[tokio::test]
    async fn test_fetch_captures_status_headers_and_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .and(header("user-agent", USER_AGENT))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .insert_header("x-archive", "yes")
                    .set_body_bytes(b"<html>\xff</html>".to_vec()),
            )
            .mount(&mock_server)
            .await;

        let fetcher = HttpFetcher::new().unwrap();
        let url = format!("{}/page", mock_server.uri());
        let result = fetcher.fetch(&url).await.unwrap();

        assert_eq!(result.status_code, 200);
        assert_eq!(result.reason, "OK");
        assert_eq!(result.status_line(), "HTTP/1.1 200 OK");
        assert_eq!(result.content_type(), Some("text/html"));
        assert_eq!(result.header("X-Archive"), Some("yes"));
        assert_eq!(result.body, b"<html>\xff</html>".to_vec());
        assert_eq!(result.final_url, url);
    }

    #[tokio::test]
    async fn test_compressed_body_is_kept_as_sent() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"hello").unwrap();
        let compressed = encoder.finish().unwrap();

        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gz"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/plain")
                    .insert_header("content-encoding", "gzip")
                    .set_body_bytes(compressed.clone()),
            )
            .mount(&mock_server)
            .await;

        let fetcher = HttpFetcher::new().unwrap();
        let result = fetcher
            .fetch(&format!("{}/gz", mock_server.uri()))
            .await
            .unwrap();

        assert_eq!(result.body, compressed);
        assert_eq!(result.header("Content-Encoding"), Some("gzip"));
        let length = compressed.len().to_string();
        assert_eq!(result.header("Content-Length"), Some(length.as_str()));

        let requests = mock_server.received_requests().await.unwrap();
        assert!(requests[0].headers.get("accept-encoding").is_none());
    }

    #[tokio::test]
    async fn test_fetch_follows_redirects() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(
                ResponseTemplate::new(301)
                    .insert_header("location", format!("{}/new", mock_server.uri()).as_str()),
            )
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_string("moved"))
            .mount(&mock_server)
            .await;

        let fetcher = HttpFetcher::new().unwrap();
        let result = fetcher
            .fetch(&format!("{}/old", mock_server.uri()))
            .await
            .unwrap();

        assert_eq!(result.status_code, 200);
        assert_eq!(result.final_url, format!("{}/new", mock_server.uri()));
        assert_eq!(result.body, b"moved".to_vec());
    }

    #[tokio::test]
    async fn test_error_status_is_still_a_response() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
            .mount(&mock_server)
            .await;

        let fetcher = HttpFetcher::new().unwrap();
        let result = fetcher.fetch(&mock_server.uri()).await.unwrap();
        assert_eq!(result.status_line(), "HTTP/1.1 404 Not Found");
    }

    #[tokio::test]
    async fn test_timeout_is_a_transport_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&mock_server)
            .await;

        let fetcher = HttpFetcher::with_timeout(1).unwrap();
        let result = fetcher.fetch(&mock_server.uri()).await;
        assert!(matches!(result, Err(ScanError::Transport(_))));
    }

    #[tokio::test]
    async fn test_connection_refused_is_a_transport_error() {
        let fetcher = HttpFetcher::with_timeout(2).unwrap();
        let result = fetcher.fetch("http://127.0.0.1:9/").await;
        assert!(matches!(result, Err(ScanError::Transport(_))));
    }
}
