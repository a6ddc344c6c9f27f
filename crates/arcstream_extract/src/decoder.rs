//! Opens archive streams and decodes their entries.
use std::{
    borrow::Cow,
    io::{self, Chain, Cursor, Read},
    path::PathBuf,
    sync::Arc,
};

use chrono::NaiveDate;

use tracing::debug;

use crate::{
    entry::{DataBlock, EntryHeader, EntryKind},
    error::{DecodeError, OpenError},
};

/// Number of leading bytes inspected to detect a compression filter.
const MAGIC_LEN: usize = 8;

/// Size of a tar header block.
const BLOCK_LEN: usize = 512;

/// Upper bound on the size of a single data block handed to the sink.
const DATA_BLOCK_LEN: usize = 64 * 1024;

const ZIP_LOCAL_HEADER: &[u8] = b"PK\x03\x04";
const ZIP_END_OF_CENTRAL_DIRECTORY: &[u8] = b"PK\x05\x06";

/// File type bits of a unix mode and the value marking a symlink.
const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

/// Decodes the entries of an archive, one at a time.
///
/// An entry borrows the decoder, so its data has to be drained or dropped
/// before the next entry can be requested.
pub trait ArchiveDecoder {
    type Entry<'e>: DecodedEntry
    where
        Self: 'e;

    /// Decodes the next entry header. `None` marks the end of the archive.
    fn next_entry(&mut self) -> Result<Option<Self::Entry<'_>>, DecodeError>;
}

/// An entry produced by an [`ArchiveDecoder`].
pub trait DecodedEntry {
    fn header(&self) -> &EntryHeader;

    /// Decodes the next block of payload. `None` marks the end of the entry.
    fn next_block(&mut self) -> Result<Option<DataBlock<'_>>, DecodeError>;
}

/// Bytes consumed while sniffing the stream, put back in front of the rest.
pub type Rejoined<R> = Chain<Cursor<Vec<u8>>, R>;

/// The reader a [`tar::Archive`] opened by [`open_archive`] decodes from.
pub type ArchiveStream<R> = Rejoined<Filtered<Rejoined<R>>>;

/// Compression filters recognized in front of a tar stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    None,
    Gzip,
    Bzip2,
    Xz,
    Lzma,
    Zstd,
}

impl Filter {
    /// Detects the filter from the first bytes of a stream.
    pub fn detect(magic: &[u8]) -> Result<Self, OpenError> {
        match magic {
            [0x1f, 0x8b, 0x08, ..] => Ok(Self::Gzip),
            [b'B', b'Z', b'h', b'1'..=b'9', 0x31, 0x41, 0x59, ..]
            | [b'B', b'Z', b'h', b'1'..=b'9', 0x17, 0x72, 0x45, ..] => Ok(Self::Bzip2),
            [0xfd, b'7', b'z', b'X', b'Z', 0x00, ..] => Ok(Self::Xz),
            [0x28, 0xb5, 0x2f, 0xfd, ..] => Ok(Self::Zstd),
            [0x5d, 0x00, 0x00, ..] => Ok(Self::Lzma),
            [0x1f, 0x9d, ..] => Err(OpenError::UnsupportedFormat("compress")),
            [b'7', b'z', 0xbc, 0xaf, 0x27, 0x1c, ..] => Err(OpenError::UnsupportedFormat("7z")),
            _ => Ok(Self::None),
        }
    }

    /// Wraps `reader` in the matching decompressor.
    pub fn wrap<R: Read>(self, reader: R) -> Result<Filtered<R>, OpenError> {
        Ok(match self {
            Self::None => Filtered::None(reader),
            Self::Gzip => Filtered::Gzip(flate2::read::MultiGzDecoder::new(reader)),
            Self::Bzip2 => Filtered::Bzip2(bzip2::read::MultiBzDecoder::new(reader)),
            Self::Xz => Filtered::Xz(xz2::read::XzDecoder::new(reader)),
            Self::Lzma => {
                let stream = xz2::stream::Stream::new_lzma_decoder(u64::MAX)
                    .map_err(|err| DecodeError::Corrupt(Arc::new(io::Error::other(err))))?;
                Filtered::Xz(xz2::read::XzDecoder::new_stream(reader, stream))
            }
            Self::Zstd => {
                Filtered::Zstd(zstd::stream::read::Decoder::new(reader).map_err(DecodeError::from)?)
            }
        })
    }
}

/// A stream with its compression filter removed.
pub enum Filtered<R: Read> {
    None(R),
    Gzip(flate2::read::MultiGzDecoder<R>),
    Bzip2(bzip2::read::MultiBzDecoder<R>),
    Xz(xz2::read::XzDecoder<R>),
    Zstd(zstd::stream::read::Decoder<'static, io::BufReader<R>>),
}

impl<R: Read> Read for Filtered<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Filtered::None(reader) => reader.read(buf),
            Filtered::Gzip(reader) => reader.read(buf),
            Filtered::Bzip2(reader) => reader.read(buf),
            Filtered::Xz(reader) => reader.read(buf),
            Filtered::Zstd(reader) => reader.read(buf),
        }
    }
}

/// An archive stream whose format has been recognized.
pub enum OpenedArchive<R: Read> {
    /// A tar archive, possibly behind a compression filter.
    Tar(tar::Archive<ArchiveStream<R>>),
    /// A zip archive read front to back through its local headers.
    Zip(ZipDecoder<Rejoined<R>>),
}

impl<R: Read> OpenedArchive<R> {
    pub fn format(&self) -> &'static str {
        match self {
            OpenedArchive::Tar(_) => "tar",
            OpenedArchive::Zip(_) => "zip",
        }
    }
}

/// Opens an archive on top of `source`, accepting every supported format and
/// filter.
///
/// The first bytes are read eagerly: a source that yields nothing, a filter
/// that cannot be decoded, or a stream that does not start with a tar header
/// or a zip local header fails here instead of during extraction.
pub fn open_archive<R: Read>(mut source: R) -> Result<OpenedArchive<R>, OpenError> {
    let magic = read_prefix(&mut source, MAGIC_LEN)?;
    if magic.is_empty() {
        return Err(OpenError::EmptyStream);
    }

    if magic.starts_with(ZIP_LOCAL_HEADER) || magic.starts_with(ZIP_END_OF_CENTRAL_DIRECTORY) {
        debug!("detected zip archive");
        let finished = magic.starts_with(ZIP_END_OF_CENTRAL_DIRECTORY);
        return Ok(OpenedArchive::Zip(ZipDecoder {
            reader: Cursor::new(magic).chain(source),
            scratch: vec![0; DATA_BLOCK_LEN],
            finished,
        }));
    }

    let filter = Filter::detect(&magic)?;
    debug!(?filter, "detected stream filter");

    let mut decoded = filter.wrap(Cursor::new(magic).chain(source))?;
    let first_block = read_prefix(&mut decoded, BLOCK_LEN)?;
    if !is_tar_header(&first_block) {
        return Err(OpenError::NotAnArchive);
    }

    Ok(OpenedArchive::Tar(tar::Archive::new(
        Cursor::new(first_block).chain(decoded),
    )))
}

fn read_prefix<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>, DecodeError> {
    let mut prefix = Vec::with_capacity(len);
    reader.take(len as u64).read_to_end(&mut prefix)?;
    Ok(prefix)
}

/// Checks whether `block` is a tar header with a valid checksum, or the
/// all-zero block that terminates an empty archive.
fn is_tar_header(block: &[u8]) -> bool {
    if block.len() != BLOCK_LEN {
        return false;
    }
    if block.iter().all(|byte| *byte == 0) {
        return true;
    }
    let Some(expected) = parse_octal(&block[148..156]) else {
        return false;
    };

    let checksum_field = 148..156;
    let (unsigned, signed) = block.iter().enumerate().fold(
        (0u64, 0i64),
        |(unsigned, signed), (idx, byte)| {
            let byte = if checksum_field.contains(&idx) { b' ' } else { *byte };
            (unsigned + u64::from(byte), signed + i64::from(byte as i8))
        },
    );
    expected == unsigned || i64::try_from(expected).is_ok_and(|expected| expected == signed)
}

fn parse_octal(field: &[u8]) -> Option<u64> {
    let mut digits = field
        .iter()
        .skip_while(|byte| **byte == b' ')
        .take_while(|byte| (b'0'..=b'7').contains(*byte))
        .peekable();
    digits.peek()?;
    Some(digits.fold(0u64, |value, digit| value * 8 + u64::from(digit - b'0')))
}

/// Decodes tar entries from an opened [`tar::Archive`].
pub struct TarDecoder<'a, R: Read + 'a> {
    entries: tar::Entries<'a, R>,
    scratch: Vec<u8>,
}

impl<'a, R: Read + 'a> TarDecoder<'a, R> {
    pub fn new(archive: &'a mut tar::Archive<R>) -> Result<Self, DecodeError> {
        Ok(Self {
            entries: archive.entries()?,
            scratch: vec![0; DATA_BLOCK_LEN],
        })
    }
}

impl<'a, R: Read + 'a> ArchiveDecoder for TarDecoder<'a, R> {
    type Entry<'e>
        = TarEntry<'e, 'a, R>
    where
        Self: 'e;

    fn next_entry(&mut self) -> Result<Option<TarEntry<'_, 'a, R>>, DecodeError> {
        let entry = match self.entries.next() {
            None => return Ok(None),
            Some(entry) => entry?,
        };
        let header = entry_header(&entry)?;
        Ok(Some(TarEntry {
            inner: entry,
            header,
            scratch: self.scratch.as_mut_slice(),
            offset: 0,
        }))
    }
}

/// An entry of a tar archive. Dropping it skips the remaining payload.
pub struct TarEntry<'e, 'a, R: Read + 'a> {
    inner: tar::Entry<'a, R>,
    header: EntryHeader,
    scratch: &'e mut [u8],
    offset: u64,
}

impl<'a, R: Read + 'a> DecodedEntry for TarEntry<'_, 'a, R> {
    fn header(&self) -> &EntryHeader {
        &self.header
    }

    fn next_block(&mut self) -> Result<Option<DataBlock<'_>>, DecodeError> {
        let len = read_block(&mut self.inner, self.scratch, &self.header, self.offset)?;
        if len == 0 {
            return Ok(None);
        }
        let offset = self.offset;
        self.offset += len as u64;
        Ok(Some(DataBlock {
            offset,
            bytes: &self.scratch[..len],
        }))
    }
}

/// Reads the next run of payload into `scratch`, returning 0 at the end.
///
/// A payload that ends before the declared size is corrupt.
fn read_block<R: Read + ?Sized>(
    reader: &mut R,
    scratch: &mut [u8],
    header: &EntryHeader,
    offset: u64,
) -> Result<usize, DecodeError> {
    let len = loop {
        match reader.read(scratch) {
            Ok(len) => break len,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        }
    };
    if len == 0 && offset < header.size {
        return Err(DecodeError::Corrupt(Arc::new(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "`{}` ended after {offset} of {} bytes",
                header.path.display(),
                header.size
            ),
        ))));
    }
    Ok(len)
}

fn entry_header<R: Read>(entry: &tar::Entry<'_, R>) -> Result<EntryHeader, DecodeError> {
    let header = entry.header();
    let entry_type = header.entry_type();
    let kind = if entry_type.is_dir() {
        EntryKind::Directory
    } else if entry_type.is_symlink() {
        EntryKind::Symlink
    } else if entry_type.is_hard_link() {
        EntryKind::HardLink
    } else if entry_type.is_file() || entry_type.is_contiguous() || entry_type.is_gnu_sparse() {
        EntryKind::File
    } else if entry_type.is_character_special() {
        EntryKind::Other("character device")
    } else if entry_type.is_block_special() {
        EntryKind::Other("block device")
    } else if entry_type.is_fifo() {
        EntryKind::Other("fifo")
    } else {
        EntryKind::Other("unknown")
    };

    Ok(EntryHeader {
        path: entry.path()?.into_owned(),
        kind,
        mode: header.mode().ok(),
        mtime: header.mtime().ok(),
        link_target: entry.link_name()?.map(Cow::into_owned),
        size: entry.size(),
    })
}

/// Decodes a zip archive from its local file headers.
///
/// Only entries whose sizes are recorded in the local header can be read
/// this way. Decoding stops at the central directory.
pub struct ZipDecoder<R> {
    reader: R,
    scratch: Vec<u8>,
    finished: bool,
}

impl<R: Read> ArchiveDecoder for ZipDecoder<R> {
    type Entry<'e>
        = ZipEntry<'e>
    where
        Self: 'e;

    fn next_entry(&mut self) -> Result<Option<ZipEntry<'_>>, DecodeError> {
        if self.finished {
            return Ok(None);
        }
        let Self {
            reader, scratch, ..
        } = self;
        let Some(mut inner) = zip::read::read_zipfile_from_stream(reader)? else {
            self.finished = true;
            return Ok(None);
        };
        let header = zip_entry_header(&mut inner)?;
        Ok(Some(ZipEntry {
            inner,
            header,
            scratch: scratch.as_mut_slice(),
            offset: 0,
        }))
    }
}

/// An entry of a zip archive. Dropping it skips the remaining payload.
pub struct ZipEntry<'e> {
    inner: zip::read::ZipFile<'e>,
    header: EntryHeader,
    scratch: &'e mut [u8],
    offset: u64,
}

impl DecodedEntry for ZipEntry<'_> {
    fn header(&self) -> &EntryHeader {
        &self.header
    }

    fn next_block(&mut self) -> Result<Option<DataBlock<'_>>, DecodeError> {
        let len = read_block(&mut self.inner, self.scratch, &self.header, self.offset)?;
        if len == 0 {
            return Ok(None);
        }
        let offset = self.offset;
        self.offset += len as u64;
        Ok(Some(DataBlock {
            offset,
            bytes: &self.scratch[..len],
        }))
    }
}

/// Builds the header of a zip entry. The payload of a symlink is its target
/// and is consumed here.
fn zip_entry_header(entry: &mut zip::read::ZipFile<'_>) -> Result<EntryHeader, DecodeError> {
    let mode = entry.unix_mode();
    let mtime = entry.last_modified().and_then(|modified| {
        NaiveDate::from_ymd_opt(
            i32::from(modified.year()),
            u32::from(modified.month()),
            u32::from(modified.day()),
        )?
        .and_hms_opt(
            u32::from(modified.hour()),
            u32::from(modified.minute()),
            u32::from(modified.second()),
        )
        .and_then(|datetime| u64::try_from(datetime.and_utc().timestamp()).ok())
    });
    let mut header = EntryHeader {
        path: PathBuf::from(entry.name()),
        kind: EntryKind::File,
        mode: mode.map(|mode| mode & !S_IFMT),
        mtime,
        link_target: None,
        size: entry.size(),
    };

    if entry.is_dir() {
        header.kind = EntryKind::Directory;
        header.size = 0;
    } else if mode.is_some_and(|mode| mode & S_IFMT == S_IFLNK) {
        let mut target = String::new();
        entry.read_to_string(&mut target)?;
        header.kind = EntryKind::Symlink;
        header.link_target = Some(PathBuf::from(target));
        header.size = 0;
    }
    Ok(header)
}

#[cfg(test)]
mod test {
    use std::{
        io::{Cursor, Read},
        path::PathBuf,
    };

    use arcstream_test_utils::{
        Compression, TEST_MTIME, TestEntry, compress, tar_archive, zip_archive,
    };
    use rstest::rstest;

    use super::{
        ArchiveDecoder, ArchiveStream, DecodedEntry, Filter, OpenedArchive, TarDecoder,
        open_archive,
    };
    use crate::{
        entry::{EntryHeader, EntryKind},
        error::{DecodeError, OpenError},
    };

    type Decoded = Vec<(PathBuf, EntryKind, Vec<u8>)>;

    fn open_tar(bytes: Vec<u8>) -> tar::Archive<ArchiveStream<Cursor<Vec<u8>>>> {
        match open_archive(Cursor::new(bytes)).unwrap() {
            OpenedArchive::Tar(archive) => archive,
            OpenedArchive::Zip(_) => panic!("expected a tar archive"),
        }
    }

    fn collect<D: ArchiveDecoder>(decoder: &mut D) -> (Vec<EntryHeader>, Decoded) {
        let mut headers = Vec::new();
        let mut decoded = Vec::new();
        while let Some(mut entry) = decoder.next_entry().unwrap() {
            let header = entry.header().clone();
            let mut payload = Vec::new();
            while let Some(block) = entry.next_block().unwrap() {
                assert_eq!(block.offset, payload.len() as u64);
                payload.extend_from_slice(block.bytes);
            }
            decoded.push((header.path.clone(), header.kind, payload));
            headers.push(header);
        }
        (headers, decoded)
    }

    /// Collects `(path, kind, payload)` for every entry of `bytes`.
    fn decode_all(bytes: Vec<u8>) -> Decoded {
        decode_with_headers(bytes).1
    }

    fn decode_with_headers(bytes: Vec<u8>) -> (Vec<EntryHeader>, Decoded) {
        match open_archive(Cursor::new(bytes)).unwrap() {
            OpenedArchive::Tar(mut archive) => collect(&mut TarDecoder::new(&mut archive).unwrap()),
            OpenedArchive::Zip(mut decoder) => collect(&mut decoder),
        }
    }

    #[rstest]
    #[case::plain(Compression::None)]
    #[case::gzip(Compression::Gzip)]
    #[case::bzip2(Compression::Bzip2)]
    #[case::xz(Compression::Xz)]
    #[case::lzma(Compression::Lzma)]
    #[case::zstd(Compression::Zstd)]
    fn decodes_every_supported_filter(#[case] compression: Compression) {
        let tar = tar_archive(&[
            TestEntry::dir("docs/"),
            TestEntry::file("docs/hello.txt", "hi"),
            TestEntry::symlink("latest", "docs/hello.txt"),
        ]);
        let decoded = decode_all(compress(&tar, compression));

        assert_eq!(
            decoded,
            vec![
                (PathBuf::from("docs"), EntryKind::Directory, Vec::new()),
                (PathBuf::from("docs/hello.txt"), EntryKind::File, b"hi".to_vec()),
                (PathBuf::from("latest"), EntryKind::Symlink, Vec::new()),
            ]
        );
    }

    #[rstest]
    #[case::gzip(&[0x1f, 0x8b, 0x08, 0x00], Filter::Gzip)]
    #[case::bzip2(b"BZh91AY&SY", Filter::Bzip2)]
    #[case::xz(&[0xfd, b'7', b'z', b'X', b'Z', 0x00, 0x00], Filter::Xz)]
    #[case::zstd(&[0x28, 0xb5, 0x2f, 0xfd, 0x00], Filter::Zstd)]
    #[case::lzma(&[0x5d, 0x00, 0x00, 0x80, 0x00], Filter::Lzma)]
    #[case::tar_named_like_bzip2(b"BZh.txt\0", Filter::None)]
    #[case::plain(b"hello.txt", Filter::None)]
    fn detects_filters(#[case] magic: &[u8], #[case] expected: Filter) {
        assert_eq!(Filter::detect(magic).unwrap(), expected);
    }

    #[rstest]
    #[case::seven_zip(&[b'7', b'z', 0xbc, 0xaf, 0x27, 0x1c, 0x00], "7z")]
    #[case::compress(&[0x1f, 0x9d, 0x90], "compress")]
    fn rejects_unsupported_formats(#[case] magic: &[u8], #[case] format: &str) {
        let result = open_archive(Cursor::new(magic.to_vec()));
        assert!(matches!(result, Err(OpenError::UnsupportedFormat(name)) if name == format));
    }

    #[rstest]
    #[case::tar(tar_archive(&[TestEntry::file("a.txt", "a")]), "tar")]
    #[case::gzip_tar(compress(&tar_archive(&[]), Compression::Gzip), "tar")]
    #[case::zip(zip_archive(&[TestEntry::file("a.txt", "a")]), "zip")]
    #[case::empty_zip(zip_archive(&[]), "zip")]
    fn recognizes_archive_formats(#[case] bytes: Vec<u8>, #[case] format: &str) {
        assert_eq!(open_archive(Cursor::new(bytes)).unwrap().format(), format);
    }

    #[test]
    fn decodes_streamed_zip_archives() {
        let payload: Vec<u8> = (0..=255u8).cycle().take(150_000).collect();
        let zip = zip_archive(&[
            TestEntry::dir("docs/"),
            TestEntry::file("docs/hello.txt", "hi"),
            TestEntry::file("docs/empty.txt", ""),
            TestEntry::file("data.bin", &payload),
            TestEntry::symlink("latest", "docs/hello.txt"),
        ]);

        let (headers, decoded) = decode_with_headers(zip);

        assert_eq!(
            decoded,
            vec![
                (PathBuf::from("docs"), EntryKind::Directory, Vec::new()),
                (PathBuf::from("docs/hello.txt"), EntryKind::File, b"hi".to_vec()),
                (PathBuf::from("docs/empty.txt"), EntryKind::File, Vec::new()),
                (PathBuf::from("data.bin"), EntryKind::File, payload),
                (PathBuf::from("latest"), EntryKind::Symlink, Vec::new()),
            ]
        );
        assert_eq!(headers[1].mode, Some(0o644));
        assert_eq!(headers[1].mtime, Some(TEST_MTIME));
        assert_eq!(
            headers[4].link_target.as_deref(),
            Some(std::path::Path::new("docs/hello.txt"))
        );
    }

    #[test]
    fn empty_zip_archives_have_no_entries() {
        assert!(decode_all(zip_archive(&[])).is_empty());
    }

    #[test]
    fn truncated_zip_payload_is_a_decode_error() {
        // xorshift noise so deflate cannot shrink it below the cut.
        let mut state = 0x2545_f491u32;
        let noise: Vec<u8> = std::iter::repeat_with(|| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as u8
        })
        .take(100_000)
        .collect();
        let mut zip = zip_archive(&[TestEntry::file("cut.bin", noise)]);
        zip.truncate(2000);
        let OpenedArchive::Zip(mut decoder) = open_archive(Cursor::new(zip)).unwrap() else {
            panic!("expected a zip archive");
        };
        let mut entry = decoder.next_entry().unwrap().unwrap();

        let result = loop {
            match entry.next_block() {
                Ok(Some(_)) => {}
                other => break other.map(|block| block.is_some()),
            }
        };
        assert!(matches!(result, Err(DecodeError::Corrupt(_))));
    }

    #[test]
    fn empty_source_fails_to_open() {
        assert!(matches!(
            open_archive(Cursor::new(Vec::new())),
            Err(OpenError::EmptyStream)
        ));
    }

    #[rstest]
    #[case::html(b"<html><body>404 not found</body></html>".to_vec())]
    #[case::random_block(vec![0xab; 2048])]
    fn non_archives_fail_to_open(#[case] body: Vec<u8>) {
        assert!(matches!(
            open_archive(Cursor::new(body)),
            Err(OpenError::NotAnArchive)
        ));
    }

    #[test]
    fn broken_compression_fails_to_open() {
        let mut garbage = vec![0x1f, 0x8b, 0x08];
        garbage.extend_from_slice(&[0xff; 64]);
        assert!(matches!(
            open_archive(Cursor::new(garbage)),
            Err(OpenError::Decode(DecodeError::Corrupt(_)))
        ));
    }

    #[test]
    fn empty_archive_has_no_entries() {
        assert!(decode_all(tar_archive(&[])).is_empty());
    }

    #[test]
    fn unread_payloads_are_skipped() {
        let tar = tar_archive(&[
            TestEntry::file("big.bin", vec![1u8; 200_000]),
            TestEntry::file("small.txt", "after"),
        ]);
        let mut archive = open_tar(tar);
        let mut decoder = TarDecoder::new(&mut archive).unwrap();

        let first = decoder.next_entry().unwrap().unwrap();
        assert_eq!(first.header().size, 200_000);
        drop(first);

        let mut second = decoder.next_entry().unwrap().unwrap();
        assert_eq!(second.header().path.to_str(), Some("small.txt"));
        let block = second.next_block().unwrap().unwrap();
        assert_eq!(block.bytes, b"after");
        assert!(decoder.next_entry().is_ok());
    }

    #[test]
    fn large_payloads_arrive_in_ordered_blocks() {
        let payload: Vec<u8> = (0..=255u8).cycle().take(300_000).collect();
        let tar = tar_archive(&[TestEntry::file("data.bin", &payload)]);
        let mut archive = open_tar(tar);
        let mut decoder = TarDecoder::new(&mut archive).unwrap();
        let mut entry = decoder.next_entry().unwrap().unwrap();

        let mut offsets = Vec::new();
        let mut received = Vec::new();
        while let Some(block) = entry.next_block().unwrap() {
            offsets.push(block.offset);
            received.extend_from_slice(block.bytes);
        }
        assert!(offsets.len() > 1);
        assert!(offsets.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(received, payload);
    }

    #[test]
    fn truncated_payload_is_a_decode_error() {
        let mut tar = tar_archive(&[TestEntry::file("cut.bin", vec![9u8; 4096])]);
        tar.truncate(512 + 1000);
        let mut archive = open_tar(tar);
        let mut decoder = TarDecoder::new(&mut archive).unwrap();
        let mut entry = decoder.next_entry().unwrap().unwrap();

        let mut read = 0;
        let result = loop {
            match entry.next_block() {
                Ok(Some(block)) => read += block.bytes.len(),
                other => break other.map(|block| block.is_some()),
            }
        };
        assert!(read <= 1000);
        assert!(matches!(result, Err(DecodeError::Corrupt(_))));
    }

    #[test]
    fn filtered_reader_round_trips_plain_bytes() {
        let mut reader = Filter::None.wrap(Cursor::new(b"raw".to_vec())).unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"raw");
    }
}
