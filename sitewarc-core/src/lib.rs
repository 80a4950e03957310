pub mod archive;
pub mod cdx;
pub mod crawl;
pub mod error;
pub mod report;
pub mod warc;

pub use archive::ArchiveWriter;
pub use cdx::IndexEntry;
pub use error::ArchiveError;
