//! Reddit post archiver library.
//!
//! Fetches a post and its comment tree, classifies its media, downloads the
//! media (merging DASH audio and video where needed) and assembles a
//! self-contained JSON archive record.

pub mod archive;
pub mod classify;
pub mod config;
pub mod constants;
pub mod error;
pub mod fetcher;
pub mod media;
pub mod reddit;
pub mod report;
pub mod store;

pub use archive::{ArchiveOptions, ArchiveRecord, Archiver, ProcessOutcome};
pub use classify::{classify, MediaKind};
pub use config::Config;
pub use error::{ArchiveError, FetchError};
pub use fetcher::Fetcher;
pub use report::{ReportEntry, RunReport};
pub use store::{ArchiveStore, Bucket};
