//! Decodes archive streams and writes their entries to disk.
//!
//! [`open_archive`] recognizes a zip archive or sniffs the compression filter
//! of a byte stream and checks that a tar archive follows. A [`TarDecoder`] or
//! [`ZipDecoder`] then hands out the entries and their data blocks, which
//! [`extract`] forwards to an [`EntrySink`] such as the [`DiskSink`].

mod decoder;
mod entry;
mod error;
mod extract;
mod sink;

pub use decoder::{
    ArchiveDecoder, ArchiveStream, DecodedEntry, Filter, Filtered, OpenedArchive, Rejoined,
    TarDecoder, TarEntry, ZipDecoder, ZipEntry, open_archive,
};
pub use entry::{DataBlock, EntryHeader, EntryKind};
pub use error::{DecodeError, ExtractError, OpenError, SinkError};
pub use extract::{ExtractSummary, extract, extract_archive};
pub use sink::{DiskSink, EntrySink, SinkOptions};
