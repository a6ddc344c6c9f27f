//! Builds small archives in memory.
use std::io::{Cursor, Write};

use tar::{EntryType, Header};
use zip::{CompressionMethod, DateTime, ZipWriter, write::SimpleFileOptions};

/// Modification time stamped on every generated entry.
pub const TEST_MTIME: u64 = 1_700_000_000;

/// An entry of a generated tar archive.
#[derive(Debug, Clone)]
pub enum TestEntry {
    File {
        path: String,
        contents: Vec<u8>,
        mode: u32,
    },
    Dir {
        path: String,
        mode: u32,
    },
    Symlink {
        path: String,
        target: String,
    },
    HardLink {
        path: String,
        target: String,
    },
    Fifo {
        path: String,
    },
}

impl TestEntry {
    pub fn file(path: impl Into<String>, contents: impl AsRef<[u8]>) -> Self {
        Self::File {
            path: path.into(),
            contents: contents.as_ref().to_vec(),
            mode: 0o644,
        }
    }

    pub fn dir(path: impl Into<String>) -> Self {
        Self::Dir {
            path: path.into(),
            mode: 0o755,
        }
    }

    pub fn symlink(path: impl Into<String>, target: impl Into<String>) -> Self {
        Self::Symlink {
            path: path.into(),
            target: target.into(),
        }
    }

    pub fn hard_link(path: impl Into<String>, target: impl Into<String>) -> Self {
        Self::HardLink {
            path: path.into(),
            target: target.into(),
        }
    }

    pub fn fifo(path: impl Into<String>) -> Self {
        Self::Fifo { path: path.into() }
    }

}

fn header(entry_type: EntryType, size: u64, mode: u32) -> Header {
    let mut header = Header::new_gnu();
    header.set_entry_type(entry_type);
    header.set_size(size);
    header.set_mode(mode);
    header.set_mtime(TEST_MTIME);
    header
}

/// Serializes `entries` into an uncompressed tar archive.
pub fn tar_archive(entries: &[TestEntry]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for entry in entries {
        match entry {
            TestEntry::File {
                path,
                contents,
                mode,
            } => {
                let mut header = header(EntryType::Regular, contents.len() as u64, *mode);
                builder
                    .append_data(&mut header, path, contents.as_slice())
                    .unwrap();
            }
            TestEntry::Dir { path, mode } => {
                let mut header = header(EntryType::Directory, 0, *mode);
                builder
                    .append_data(&mut header, path, std::io::empty())
                    .unwrap();
            }
            TestEntry::Symlink { path, target } => {
                let mut header = header(EntryType::Symlink, 0, 0o777);
                builder.append_link(&mut header, path, target).unwrap();
            }
            TestEntry::HardLink { path, target } => {
                let mut header = header(EntryType::Link, 0, 0o644);
                builder.append_link(&mut header, path, target).unwrap();
            }
            TestEntry::Fifo { path } => {
                let mut header = header(EntryType::Fifo, 0, 0o644);
                builder
                    .append_data(&mut header, path, std::io::empty())
                    .unwrap();
            }
        }
    }
    builder.into_inner().unwrap()
}

/// Serializes `entries` into a zip archive whose local headers carry the
/// entry sizes, so it can be read as a stream.
///
/// Zip has no hard links or fifos, those entries panic.
pub fn zip_archive(entries: &[TestEntry]) -> Vec<u8> {
    // `TEST_MTIME` in the DOS time format.
    let modified = DateTime::from_date_and_time(2023, 11, 14, 22, 13, 20).unwrap();
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(modified);

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for entry in entries {
        match entry {
            TestEntry::File {
                path,
                contents,
                mode,
            } => {
                writer
                    .start_file(path.as_str(), options.unix_permissions(*mode))
                    .unwrap();
                writer.write_all(contents).unwrap();
            }
            TestEntry::Dir { path, mode } => writer
                .add_directory(path.as_str(), options.unix_permissions(*mode))
                .unwrap(),
            TestEntry::Symlink { path, target } => writer
                .add_symlink(path.as_str(), target.as_str(), options)
                .unwrap(),
            TestEntry::HardLink { .. } | TestEntry::Fifo { .. } => {
                panic!("zip archives cannot hold {entry:?}")
            }
        }
    }
    writer.finish().unwrap().into_inner()
}

/// Compression filters the decoder detects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Bzip2,
    Xz,
    Lzma,
    Zstd,
}

/// Wraps `bytes` in the given compression filter.
pub fn compress(bytes: &[u8], compression: Compression) -> Vec<u8> {
    match compression {
        Compression::None => bytes.to_vec(),
        Compression::Gzip => {
            let mut encoder =
                flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(bytes).unwrap();
            encoder.finish().unwrap()
        }
        Compression::Bzip2 => {
            let mut encoder =
                bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
            encoder.write_all(bytes).unwrap();
            encoder.finish().unwrap()
        }
        Compression::Xz => {
            let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
            encoder.write_all(bytes).unwrap();
            encoder.finish().unwrap()
        }
        Compression::Lzma => {
            let options = xz2::stream::LzmaOptions::new_preset(6).unwrap();
            let stream = xz2::stream::Stream::new_lzma_encoder(&options).unwrap();
            let mut encoder = xz2::write::XzEncoder::new_stream(Vec::new(), stream);
            encoder.write_all(bytes).unwrap();
            encoder.finish().unwrap()
        }
        Compression::Zstd => zstd::stream::encode_all(bytes, 0).unwrap(),
    }
}
