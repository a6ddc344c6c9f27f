use std::io::Read;

use tracing::{debug, warn};

use crate::{
    decoder::{ArchiveDecoder, DecodedEntry, OpenedArchive, TarDecoder},
    entry::EntryHeader,
    error::ExtractError,
    sink::EntrySink,
};

/// Counters collected while extracting one archive.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExtractSummary {
    /// Entries that were written completely.
    pub entries: usize,
    /// Entries the sink refused to create.
    pub skipped: usize,
    /// Payload bytes forwarded to the sink.
    pub bytes_written: u64,
}

/// Moves every entry produced by `decoder` into `sink`.
///
/// A sink that cannot create an entry only costs that entry: the decoder
/// skips the unread payload on its own when it advances. Decode errors and
/// failures while writing payload leave the stream position unknown and
/// stop the extraction. `on_entry` is called for every entry that was
/// written completely.
pub fn extract<D, S>(
    decoder: &mut D,
    sink: &mut S,
    on_entry: &mut dyn FnMut(&EntryHeader),
) -> Result<ExtractSummary, ExtractError>
where
    D: ArchiveDecoder + ?Sized,
    S: EntrySink + ?Sized,
{
    let mut summary = ExtractSummary::default();
    while let Some(mut entry) = decoder.next_entry()? {
        let header = entry.header().clone();

        if let Err(err) = sink.write_header(&header) {
            warn!("skipping `{}`: {err}", header.path.display());
            summary.skipped += 1;
            if let Err(err) = sink.finish_entry() {
                warn!("failed to finalize `{}`: {err}", header.path.display());
            }
            continue;
        }

        let copied = if header.has_payload() {
            copy_payload(&mut entry, sink, &header, &mut summary)
        } else {
            Ok(())
        };
        drop(entry);

        let finished = sink.finish_entry();
        if let Err(err) = &finished {
            warn!("failed to finalize `{}`: {err}", header.path.display());
        }
        copied?;
        if finished.is_ok() {
            summary.entries += 1;
            on_entry(&header);
        }
    }

    debug!(
        entries = summary.entries,
        skipped = summary.skipped,
        bytes = summary.bytes_written,
        "reached the end of the archive"
    );
    Ok(summary)
}

/// Runs [`extract`] with the decoder matching the format of `archive`.
pub fn extract_archive<R, S>(
    archive: &mut OpenedArchive<R>,
    sink: &mut S,
    on_entry: &mut dyn FnMut(&EntryHeader),
) -> Result<ExtractSummary, ExtractError>
where
    R: Read,
    S: EntrySink + ?Sized,
{
    match archive {
        OpenedArchive::Tar(archive) => extract(&mut TarDecoder::new(archive)?, sink, on_entry),
        OpenedArchive::Zip(decoder) => extract(decoder, sink, on_entry),
    }
}

fn copy_payload<E, S>(
    entry: &mut E,
    sink: &mut S,
    header: &EntryHeader,
    summary: &mut ExtractSummary,
) -> Result<(), ExtractError>
where
    E: DecodedEntry,
    S: EntrySink + ?Sized,
{
    while let Some(block) = entry.next_block()? {
        let len = block.bytes.len() as u64;
        sink.write_block(block)
            .map_err(|source| ExtractError::Write {
                path: header.path.clone(),
                source,
            })?;
        summary.bytes_written += len;
    }
    Ok(())
}
