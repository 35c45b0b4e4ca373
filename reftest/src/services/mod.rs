//! Services: FITS reading, discovery, extraction and ingestion

pub mod file_scanner;
pub mod fits_header;
pub mod ingest;
pub mod metadata_extractor;

pub use file_scanner::{FileScanner, ScanError};
pub use fits_header::{FitsFile, Header, HeaderValue};
pub use ingest::{IngestMode, IngestOutcome, IngestPipeline, IngestReport};
pub use metadata_extractor::MetadataExtractor;
