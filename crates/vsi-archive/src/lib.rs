//! Virtual archive access.
//!
//! Resolves paths of the form `/vsizip//vsicurl/<url>/<entry>` (a file inside
//! a ZIP fetched over HTTP) or `/vsizip/<local-path>/<entry>` and reads the
//! single entry without downloading the whole archive:
//!
//! 1. the source is wrapped in a blocking `Read + Seek` adapter that turns
//!    reads into buffered range requests,
//! 2. `zip::ZipArchive` parses the central directory once per archive,
//! 3. the entry is inflated and CRC-checked by the zip reader.
//!
//! A missing entry is reported as `Ok(None)`, distinct from I/O failure.

pub mod archive;
pub mod error;
pub mod path;
pub mod range_reader;
pub mod reader;
pub mod source;

pub use archive::ZipIndex;
pub use error::{ArchiveError, Result};
pub use path::{ArchiveLocation, VirtualPath};
pub use range_reader::RangeReader;
pub use reader::ArchiveReader;
pub use source::{FileRangeSource, HttpRangeSource, MemoryRangeSource, RangeSource};
