use crate::cdx::{CDX_HEADER, IndexEntry};
use crate::error::{ArchiveError, Result};
use crate::warc::{WARC_DATE_FORMAT, WarcRecord, sha256_hex};
use chrono::Utc;
use sitewarc_scanner::{CaptureSink, FetchResult};
use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{debug, warn};

const CONFORMS_TO: &str = "https://iipc.github.io/warc-specifications/";

/// A byte stream that can be cut back to an earlier length.
pub trait ArchiveStream: Write {
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;

    fn sync(&mut self) -> io::Result<()> {
        self.flush()
    }
}

impl ArchiveStream for File {
    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)?;
        self.seek(SeekFrom::Start(len))?;
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        self.flush()?;
        self.sync_all()
    }
}

/// Owns the archive and index streams for one run.
///
/// Every successful `write` appends exactly one gzip member to the archive
/// and exactly one line to the index. A failed write leaves both streams at
/// their last committed length, so the two always describe the same records.
pub struct ArchiveWriter<W: ArchiveStream = File> {
    warc: W,
    cdx: W,
    warc_len: u64,
    cdx_len: u64,
    records_written: usize,
}

impl ArchiveWriter<File> {
    /// Creates (or truncates) both output files and writes their headers.
    pub fn create(warc_path: &Path, cdx_path: &Path, software: &str) -> Result<Self> {
        let warc = open_output(warc_path)?;
        let cdx = open_output(cdx_path)?;

        let filename = warc_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        debug!("Created WARC file: {}", warc_path.display());
        debug!("Created CDX file: {}", cdx_path.display());
        Self::from_streams(warc, cdx, &filename, software)
    }
}

impl<W: ArchiveStream> ArchiveWriter<W> {
    /// Wraps two empty streams, writing the `warcinfo` record and the index header.
    pub fn from_streams(warc: W, cdx: W, filename: &str, software: &str) -> Result<Self> {
        let mut writer = Self {
            warc,
            cdx,
            warc_len: 0,
            cdx_len: 0,
            records_written: 0,
        };

        let info = WarcRecord::warcinfo(
            filename,
            &Utc::now(),
            &[
                ("software", software),
                ("format", "WARC File Format 1.1"),
                ("conformsTo", CONFORMS_TO),
            ],
        );
        let member = info.to_gzip_member()?;
        let header = format!("{}\n", CDX_HEADER);
        writer.commit(&member, header.as_bytes())?;

        Ok(writer)
    }

    /// Archives one response under `url` and indexes it.
    pub fn write(&mut self, url: &str, result: &FetchResult) -> Result<IndexEntry> {
        let date = Utc::now();
        let record = WarcRecord::response(url, &date, result);
        let member = record
            .to_gzip_member()
            .map_err(|source| write_error(url, source))?;

        let entry = IndexEntry {
            url: url.to_string(),
            timestamp: date.format(WARC_DATE_FORMAT).to_string(),
            status: result.status_code,
            content_type: result.content_type().unwrap_or_default().to_string(),
            length: result.body.len(),
            digest: sha256_hex(&result.body),
        };
        let line = format!("{}\n", entry.to_line());

        self.commit(&member, line.as_bytes())
            .map_err(|source| write_error(url, source))?;
        self.records_written += 1;

        debug!(
            "Wrote WARC record: {} ({} bytes, {})",
            url, entry.length, entry.content_type
        );
        Ok(entry)
    }

    /// Flushes and syncs both streams.
    pub fn finish(&mut self) -> Result<()> {
        self.warc.sync()?;
        self.cdx.sync()?;
        Ok(())
    }

    /// Response records committed so far (the `warcinfo` record is not counted).
    pub fn records_written(&self) -> usize {
        self.records_written
    }

    pub fn into_streams(self) -> (W, W) {
        (self.warc, self.cdx)
    }

    fn commit(&mut self, member: &[u8], line: &[u8]) -> io::Result<()> {
        if let Err(e) = write_and_flush(&mut self.warc, member) {
            self.rollback();
            return Err(e);
        }

        if let Err(e) = write_and_flush(&mut self.cdx, line) {
            self.rollback();
            return Err(e);
        }

        self.warc_len += member.len() as u64;
        self.cdx_len += line.len() as u64;
        Ok(())
    }

    fn rollback(&mut self) {
        if let Err(e) = self.warc.truncate_to(self.warc_len) {
            warn!("Failed to roll back archive to {} bytes: {}", self.warc_len, e);
        }
        if let Err(e) = self.cdx.truncate_to(self.cdx_len) {
            warn!("Failed to roll back index to {} bytes: {}", self.cdx_len, e);
        }
    }
}

impl<W: ArchiveStream> CaptureSink for ArchiveWriter<W> {
    type Error = ArchiveError;

    fn capture(&mut self, url: &str, result: &FetchResult) -> std::result::Result<(), ArchiveError> {
        self.write(url, result).map(|_| ())
    }
}

fn open_output(path: &Path) -> Result<File> {
    File::create(path).map_err(|source| ArchiveError::Open {
        path: path.to_path_buf(),
        source,
    })
}

fn write_and_flush<W: Write>(stream: &mut W, bytes: &[u8]) -> io::Result<()> {
    stream.write_all(bytes)?;
    stream.flush()
}

fn write_error(url: &str, source: io::Error) -> ArchiveError {
    ArchiveError::Write {
        url: url.to_string(),
        source,
    }
}
