use crate::error::{ArchiveError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const CDX_HEADER: &str = "!url !date !status !content-type !length !digest";

/// One index line, pointing at one response record in the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub url: String,
    pub timestamp: String,
    pub status: u16,
    pub content_type: String,
    pub length: usize,
    pub digest: String,
}

impl IndexEntry {
    /// Space separated line without the trailing newline. Fields never
    /// contain spaces, so every line splits back into six fields.
    pub fn to_line(&self) -> String {
        format!(
            "{} {} {} {} {} {}",
            escape_url(&self.url),
            self.timestamp,
            self.status,
            content_type_field(&self.content_type),
            self.length,
            self.digest
        )
    }

    pub fn parse_line(line: &str) -> Option<Self> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let [url, timestamp, status, content_type, length, digest] = fields.as_slice() else {
            return None;
        };

        Some(Self {
            url: url.to_string(),
            timestamp: timestamp.to_string(),
            status: status.parse().ok()?,
            content_type: content_type.to_string(),
            length: length.parse().ok()?,
            digest: digest.to_string(),
        })
    }
}

/// Reads every entry of an index file, skipping the header line.
pub fn read_index(path: &Path) -> Result<Vec<IndexEntry>> {
    let contents = fs::read_to_string(path)?;
    contents
        .lines()
        .filter(|line| !line.is_empty() && !line.starts_with('!'))
        .map(|line| {
            IndexEntry::parse_line(line)
                .ok_or_else(|| ArchiveError::InvalidIndexLine(line.to_string()))
        })
        .collect()
}

fn escape_url(url: &str) -> String {
    let mut escaped = String::with_capacity(url.len());
    for c in url.chars() {
        if c.is_whitespace() {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                escaped.push_str(&format!("%{:02X}", byte));
            }
        } else {
            escaped.push(c);
        }
    }
    escaped
}

fn content_type_field(content_type: &str) -> String {
    let compact: String = content_type
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if compact.is_empty() {
        "-".to_string()
    } else {
        compact
    }
}
