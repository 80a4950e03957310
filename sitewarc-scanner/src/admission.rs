use std::collections::HashSet;
use url::Url;

/// Scheme and host allow-list gating which URLs may enter the frontier.
///
/// Entries are `host` or `host:port`; a scheme default port and `:80` are
/// never part of the key, whatever the scheme.
#[derive(Debug, Clone)]
pub struct AdmissionFilter {
    allowed_hosts: HashSet<String>,
}

impl AdmissionFilter {
    pub fn new<I, S>(allowed_hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed_hosts: allowed_hosts
                .into_iter()
                .map(|host| strip_default_port(&host.as_ref().to_ascii_lowercase()).to_string())
                .collect(),
        }
    }

    /// Single-entry allow-list holding the seed URL's host.
    pub fn for_seed(seed: &str) -> Option<Self> {
        let parsed = Url::parse(seed).ok()?;
        Some(Self::new([host_key(&parsed)?]))
    }

    pub fn allowed_hosts(&self) -> impl Iterator<Item = &str> {
        self.allowed_hosts.iter().map(String::as_str)
    }

    /// Whether `url` may be fetched. Never fails: anything that does not parse
    /// is simply not allowed.
    pub fn is_allowed(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url.trim()) else {
            return false;
        };

        let scheme = parsed.scheme();
        if scheme != "http" && scheme != "https" {
            return false;
        }

        // Credentials in the authority never match a bare allow-listed host
        if !parsed.username().is_empty() || parsed.password().is_some() {
            return false;
        }

        host_key(&parsed).is_some_and(|key| self.allowed_hosts.contains(&key))
    }
}

/// `host` or `host:port`. Url already drops a port equal to the scheme
/// default; an explicit `:80` is dropped on https too.
fn host_key(parsed: &Url) -> Option<String> {
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(80) | None => host.to_string(),
        Some(port) => format!("{}:{}", host, port),
    })
}

fn strip_default_port(host: &str) -> &str {
    host.strip_suffix(":80").unwrap_or(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> AdmissionFilter {
        AdmissionFilter::new(["example.org"])
    }

    #[test]
    fn test_allows_http_and_https_on_listed_host() {
        let filter = filter();
        assert!(filter.is_allowed("http://example.org/"));
        assert!(filter.is_allowed("https://example.org/a/b?c=d"));
        assert!(filter.is_allowed("http://example.org:80/a"));
        assert!(filter.is_allowed("HTTP://EXAMPLE.ORG/a"));
    }

    #[test]
    fn test_rejects_other_schemes() {
        let filter = filter();
        for url in [
            "ftp://example.org/file",
            "mailto:admin@example.org",
            "javascript:void(0)",
            "file:///etc/passwd",
            "data:text/html,hello",
        ] {
            assert!(!filter.is_allowed(url), "{}", url);
        }
    }

    #[test]
    fn test_rejects_other_hosts() {
        let filter = filter();
        assert!(!filter.is_allowed("http://other.org/"));
        assert!(!filter.is_allowed("http://sub.example.org/"));
        assert!(!filter.is_allowed("http://example.org.evil.com/"));
        assert!(!filter.is_allowed("http://example.org:8080/"));
        assert!(!filter.is_allowed("http://user@example.org/"));
    }

    #[test]
    fn test_malformed_input_is_rejected_without_panicking() {
        let filter = filter();
        for url in ["", "   ", "not a url", "http://", "://example.org", "http://[::1", "/b"] {
            assert!(!filter.is_allowed(url), "{:?}", url);
        }
    }

    #[test]
    fn test_port_80_is_ignored_for_any_scheme() {
        let filter = filter();
        assert!(filter.is_allowed("https://example.org:80/"));
        assert!(filter.is_allowed("https://example.org:443/"));
        assert!(!filter.is_allowed("https://example.org:8443/"));

        let filter = AdmissionFilter::for_seed("https://example.org:80/start").unwrap();
        assert_eq!(filter.allowed_hosts().collect::<Vec<_>>(), vec!["example.org"]);
    }

    #[test]
    fn test_allow_list_entries_are_normalized() {
        let filter = AdmissionFilter::new(["Example.ORG:80"]);
        assert!(filter.is_allowed("http://example.org/"));
    }

    #[test]
    fn test_for_seed() {
        let filter = AdmissionFilter::for_seed("http://Example.org:80/html/home/index.asp").unwrap();
        assert_eq!(filter.allowed_hosts().collect::<Vec<_>>(), vec!["example.org"]);
        assert!(filter.is_allowed("http://example.org/other"));
        assert!(AdmissionFilter::for_seed("not a url").is_none());
    }

    #[test]
    fn test_seed_on_non_default_port() {
        let filter = AdmissionFilter::for_seed("http://127.0.0.1:5555/start").unwrap();
        assert!(filter.is_allowed("http://127.0.0.1:5555/other"));
        assert!(!filter.is_allowed("http://127.0.0.1/other"));
        assert!(!filter.is_allowed("http://127.0.0.1:5556/other"));
    }
}
