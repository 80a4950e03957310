//! WARC/1.1 record serialization.
//!
//! A `.warc.gz` file is a concatenation of gzip members, one per record, so
//! every record can be decompressed on its own and a damaged tail only costs
//! the record it belongs to.

use chrono::{DateTime, Utc};
use flate2::Compression;
use flate2::write::GzEncoder;
use sha2::{Digest, Sha256};
use sitewarc_scanner::FetchResult;
use std::io::{self, Write};

pub const WARC_VERSION: &str = "WARC/1.1";
pub const WARC_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
const CRLF: &[u8] = b"\r\n";

/// One WARC record: named header fields followed by a content block.
#[derive(Debug, Clone)]
pub struct WarcRecord {
    headers: Vec<(String, String)>,
    block: Vec<u8>,
}

impl WarcRecord {
    /// `warcinfo` record describing the file and the software that wrote it.
    pub fn warcinfo(filename: &str, date: &DateTime<Utc>, fields: &[(&str, &str)]) -> Self {
        let mut block = Vec::new();
        for (name, value) in fields {
            push_field(&mut block, name, value);
        }

        let mut record = Self::new("warcinfo", date, block);
        record.push_header("WARC-Filename", filename);
        record.push_header("Content-Type", "application/warc-fields");
        record
    }

    /// `response` record holding the full HTTP response for `target_uri`.
    pub fn response(target_uri: &str, date: &DateTime<Utc>, result: &FetchResult) -> Self {
        let block = http_response_block(result);
        let payload_digest = labelled_digest(&result.body);
        let block_digest = labelled_digest(&block);

        let mut record = Self::new("response", date, block);
        record.push_header("WARC-Target-URI", target_uri);
        record.push_header("WARC-Payload-Digest", &payload_digest);
        record.push_header("WARC-Block-Digest", &block_digest);
        record.push_header("Content-Type", "application/http; msgtype=response");
        record
    }

    fn new(record_type: &str, date: &DateTime<Utc>, block: Vec<u8>) -> Self {
        let mut record = Self {
            headers: Vec::new(),
            block,
        };
        record.push_header("WARC-Type", record_type);
        record.push_header("WARC-Record-ID", &record_id());
        record.push_header("WARC-Date", &date.format(WARC_DATE_FORMAT).to_string());
        record
    }

    fn push_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn block(&self) -> &[u8] {
        &self.block
    }

    /// Uncompressed record bytes, including the trailing blank lines.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.block.len() + 512);
        out.extend_from_slice(WARC_VERSION.as_bytes());
        out.extend_from_slice(CRLF);
        for (name, value) in &self.headers {
            push_field(&mut out, name, value);
        }
        push_field(&mut out, "Content-Length", &self.block.len().to_string());
        out.extend_from_slice(CRLF);
        out.extend_from_slice(&self.block);
        out.extend_from_slice(CRLF);
        out.extend_from_slice(CRLF);
        out
    }

    /// The record as one self-contained gzip member.
    pub fn to_gzip_member(&self) -> io::Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&self.to_bytes())?;
        encoder.finish()
    }
}

/// Status line, headers in received order, blank line, body bytes.
pub fn http_response_block(result: &FetchResult) -> Vec<u8> {
    let mut block = Vec::with_capacity(result.body.len() + 1024);
    block.extend_from_slice(result.status_line().as_bytes());
    block.extend_from_slice(CRLF);
    for (name, value) in &result.headers {
        push_field(&mut block, name, value);
    }
    block.extend_from_slice(CRLF);
    block.extend_from_slice(&result.body);
    block
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn labelled_digest(bytes: &[u8]) -> String {
    format!("sha256:{}", sha256_hex(bytes))
}

fn record_id() -> String {
    format!("<urn:uuid:{}>", uuid::Uuid::new_v4())
}

fn push_field(out: &mut Vec<u8>, name: &str, value: &str) {
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(b": ");
    // Folded or injected line breaks would end the header block early
    for byte in value.bytes() {
        out.push(if byte == b'\r' || byte == b'\n' { b' ' } else { byte });
    }
    out.extend_from_slice(CRLF);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use flate2::read::GzDecoder;
    use std::io::Read;

    fn date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap()
    }

    fn response() -> FetchResult {
        let mut result = FetchResult::new(200, "http://example.org/".to_string());
        result.reason = "OK".to_string();
        result.headers = vec![
            ("Server".to_string(), "nginx".to_string()),
            ("Content-Type".to_string(), "text/html".to_string()),
            ("Set-Cookie".to_string(), "a=1".to_string()),
        ];
        result.body = b"<html>\x00\xfe</html>".to_vec();
        result
    }

    #[test]
    fn test_http_block_layout() {
        let block = http_response_block(&response());
        let mut expected = b"HTTP/1.1 200 OK\r\nServer: nginx\r\nContent-Type: text/html\r\nSet-Cookie: a=1\r\n\r\n".to_vec();
        expected.extend_from_slice(b"<html>\x00\xfe</html>");
        assert_eq!(block, expected);
    }

    #[test]
    fn test_response_record_headers() {
        let result = response();
        let record = WarcRecord::response("http://example.org/", &date(), &result);

        assert_eq!(record.header("WARC-Type"), Some("response"));
        assert_eq!(record.header("WARC-Date"), Some("2024-03-01T12:30:05Z"));
        assert_eq!(record.header("WARC-Target-URI"), Some("http://example.org/"));
        assert_eq!(
            record.header("Content-Type"),
            Some("application/http; msgtype=response")
        );
        assert_eq!(
            record.header("WARC-Payload-Digest").unwrap(),
            format!("sha256:{}", sha256_hex(&result.body))
        );
        let id = record.header("WARC-Record-ID").unwrap();
        assert!(id.starts_with("<urn:uuid:") && id.ends_with('>'));
    }

    #[test]
    fn test_record_ids_are_unique() {
        let result = response();
        let a = WarcRecord::response("http://example.org/", &date(), &result);
        let b = WarcRecord::response("http://example.org/", &date(), &result);
        assert_ne!(a.header("WARC-Record-ID"), b.header("WARC-Record-ID"));
    }

    #[test]
    fn test_serialized_record_framing() {
        let record = WarcRecord::response("http://example.org/", &date(), &response());
        let bytes = record.to_bytes();

        assert!(bytes.starts_with(b"WARC/1.1\r\nWARC-Type: response\r\n"));
        assert!(bytes.ends_with(b"</html>\r\n\r\n"));

        let header_end = bytes
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .unwrap();
        let header = String::from_utf8_lossy(&bytes[..header_end]);
        let declared: usize = header
            .lines()
            .find_map(|line| line.strip_prefix("Content-Length: "))
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(declared, record.block().len());
        assert_eq!(&bytes[header_end + 4..header_end + 4 + declared], record.block());
    }

    #[test]
    fn test_gzip_member_round_trip() {
        let record = WarcRecord::response("http://example.org/", &date(), &response());
        let member = record.to_gzip_member().unwrap();

        let mut decoded = Vec::new();
        GzDecoder::new(&member[..]).read_to_end(&mut decoded).unwrap();
        assert_eq!(decoded, record.to_bytes());
    }

    #[test]
    fn test_warcinfo_record() {
        let record = WarcRecord::warcinfo(
            "site.warc.gz",
            &date(),
            &[("software", "sitewarc/0.1"), ("format", "WARC File Format 1.1")],
        );
        assert_eq!(record.header("WARC-Type"), Some("warcinfo"));
        assert_eq!(record.header("WARC-Filename"), Some("site.warc.gz"));
        assert_eq!(
            record.block(),
            b"software: sitewarc/0.1\r\nformat: WARC File Format 1.1\r\n"
        );
    }

    #[test]
    fn test_line_breaks_in_values_are_flattened() {
        let mut out = Vec::new();
        push_field(&mut out, "X-Test", "a\r\nInjected: yes");
        assert_eq!(out, b"X-Test: a  Injected: yes\r\n");
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
