use std::{
    io::{Seek, SeekFrom, Write},
    path::{Component, Path, PathBuf},
};

use fs_err as fs;
use tracing::{debug, trace};

use crate::{
    entry::{DataBlock, EntryHeader, EntryKind},
    error::SinkError,
};

/// Receives decoded entries and materializes them.
///
/// For every entry the extraction loop calls [`EntrySink::write_header`],
/// then [`EntrySink::write_block`] for each data block and finally
/// [`EntrySink::finish_entry`], even when an earlier step failed.
pub trait EntrySink {
    fn write_header(&mut self, header: &EntryHeader) -> Result<(), SinkError>;

    fn write_block(&mut self, block: DataBlock<'_>) -> Result<(), SinkError>;

    fn finish_entry(&mut self) -> Result<(), SinkError>;
}

impl<T: EntrySink + ?Sized> EntrySink for &mut T {
    fn write_header(&mut self, header: &EntryHeader) -> Result<(), SinkError> {
        (**self).write_header(header)
    }

    fn write_block(&mut self, block: DataBlock<'_>) -> Result<(), SinkError> {
        (**self).write_block(block)
    }

    fn finish_entry(&mut self) -> Result<(), SinkError> {
        (**self).finish_entry()
    }
}

/// Which metadata of the archive entries is restored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkOptions {
    pub preserve_permissions: bool,
    pub preserve_mtime: bool,
}

impl Default for SinkOptions {
    fn default() -> Self {
        Self {
            preserve_permissions: true,
            preserve_mtime: true,
        }
    }
}

/// The entry currently being written.
struct OpenEntry {
    header: EntryHeader,
    target: PathBuf,
    file: Option<fs::File>,
}

/// Metadata applied to a directory once the whole archive was written.
#[derive(Debug)]
struct DeferredDir {
    path: PathBuf,
    mode: Option<u32>,
    mtime: Option<u64>,
}

/// Writes entries below a destination directory.
///
/// Entries may not escape the destination, neither through absolute paths or
/// `..` components nor through symlinks extracted earlier. Directory metadata
/// is applied by [`DiskSink::close`] because writing the children would
/// otherwise touch the modification time again, and a read-only directory
/// could not receive its children at all.
pub struct DiskSink {
    root: PathBuf,
    options: SinkOptions,
    current: Option<OpenEntry>,
    deferred_dirs: Vec<DeferredDir>,
}

impl DiskSink {
    /// Creates the destination directory if needed.
    pub fn new(root: impl AsRef<Path>, options: SinkOptions) -> Result<Self, SinkError> {
        let root = root.as_ref();
        fs::create_dir_all(root)?;
        let root = fs::canonicalize(root)?;
        debug!("extracting to {}", root.display());
        Ok(Self {
            root,
            options,
            current: None,
            deferred_dirs: Vec::new(),
        })
    }

    /// Resolves an archive path to a location below the destination.
    fn target_path(&self, path: &Path) -> Result<PathBuf, SinkError> {
        let mut relative = PathBuf::new();
        for component in path.components() {
            match component {
                Component::Normal(part) => relative.push(part),
                Component::CurDir => {}
                Component::RootDir | Component::Prefix(_) | Component::ParentDir => {
                    return Err(SinkError::UnsafePath(path.to_path_buf()));
                }
            }
        }
        Ok(self.root.join(relative))
    }

    /// Creates the parent directories of `target` one level at a time.
    ///
    /// Every existing symlink on the way must resolve below the destination
    /// before anything is created behind it.
    fn prepare_parent(&self, target: &Path) -> Result<(), SinkError> {
        let unsafe_path = || SinkError::UnsafePath(target.to_path_buf());
        let relative = target
            .parent()
            .and_then(|parent| parent.strip_prefix(&self.root).ok())
            .ok_or_else(unsafe_path)?;

        let mut current = self.root.clone();
        for component in relative.components() {
            current.push(component);
            match fs::symlink_metadata(&current) {
                Ok(metadata) if metadata.file_type().is_symlink() => {
                    if !fs::canonicalize(&current)?.starts_with(&self.root) {
                        return Err(unsafe_path());
                    }
                }
                Ok(_) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    fs::create_dir(&current)?;
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    /// Removes whatever non-directory object occupies `target`.
    fn clear_target(target: &Path) -> Result<(), SinkError> {
        match fs::symlink_metadata(target) {
            Ok(metadata) if metadata.is_dir() => Ok(()),
            Ok(_) => Ok(fs::remove_file(target)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn create_entry(
        &self,
        header: &EntryHeader,
        target: &Path,
    ) -> Result<Option<fs::File>, SinkError> {
        match header.kind {
            EntryKind::Directory => {
                if target != self.root.as_path() {
                    Self::clear_target(target)?;
                    fs::create_dir_all(target)?;
                }
                if !fs::canonicalize(target)?.starts_with(&self.root) {
                    return Err(SinkError::UnsafePath(header.path.clone()));
                }
                Ok(None)
            }
            EntryKind::File => {
                Self::clear_target(target)?;
                let file = fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(target)?;
                Ok(Some(file))
            }
            EntryKind::Symlink => {
                let link_target = header
                    .link_target
                    .as_deref()
                    .ok_or_else(|| SinkError::UnsafePath(header.path.clone()))?;
                Self::clear_target(target)?;
                create_symlink(link_target, target)?;
                Ok(None)
            }
            EntryKind::HardLink => {
                let link_target = header
                    .link_target
                    .as_deref()
                    .ok_or_else(|| SinkError::UnsafePath(header.path.clone()))?;
                let source = self.target_path(link_target)?;
                if !fs::canonicalize(&source)?.starts_with(&self.root) {
                    return Err(SinkError::UnsafePath(header.path.clone()));
                }
                Self::clear_target(target)?;
                fs::hard_link(&source, target)?;
                Ok(None)
            }
            EntryKind::Other(kind) => Err(SinkError::UnsupportedEntry {
                path: header.path.clone(),
                kind,
            }),
        }
    }

    /// Applies the deferred directory metadata, deepest directories first.
    pub fn close(mut self) -> Result<(), SinkError> {
        if self.current.is_some() {
            self.finish_entry()?;
        }
        self.deferred_dirs
            .sort_by_key(|dir| std::cmp::Reverse(dir.path.components().count()));
        for dir in std::mem::take(&mut self.deferred_dirs) {
            if self.options.preserve_permissions {
                if let Some(mode) = dir.mode {
                    set_permissions(&dir.path, mode)?;
                }
            }
            if self.options.preserve_mtime {
                if let Some(mtime) = dir.mtime {
                    set_mtime(&dir.path, mtime)?;
                }
            }
        }
        Ok(())
    }
}

impl EntrySink for DiskSink {
    fn write_header(&mut self, header: &EntryHeader) -> Result<(), SinkError> {
        self.current = None;
        let target = self.target_path(&header.path)?;
        if target == self.root {
            // Entries like `./` name the destination itself.
            if header.kind != EntryKind::Directory {
                return Err(SinkError::UnsafePath(header.path.clone()));
            }
        } else {
            self.prepare_parent(&target)?;
        }
        trace!("creating {}", target.display());

        let file = self.create_entry(header, &target)?;
        self.current = Some(OpenEntry {
            header: header.clone(),
            target,
            file,
        });
        Ok(())
    }

    fn write_block(&mut self, block: DataBlock<'_>) -> Result<(), SinkError> {
        let entry = self.current.as_mut().ok_or(SinkError::NoOpenEntry)?;
        let Some(file) = entry.file.as_mut() else {
            return Err(SinkError::NotAFile(entry.header.path.clone()));
        };

        // All-zero blocks are left as holes, `finish_entry` sets the length.
        if block.bytes.iter().all(|byte| *byte == 0) {
            return Ok(());
        }
        file.seek(SeekFrom::Start(block.offset))?;
        file.write_all(block.bytes)?;
        Ok(())
    }

    fn finish_entry(&mut self) -> Result<(), SinkError> {
        let Some(entry) = self.current.take() else {
            return Ok(());
        };
        let OpenEntry {
            header,
            target,
            file,
        } = entry;

        match header.kind {
            EntryKind::File => {
                if let Some(file) = file {
                    file.set_len(header.size)?;
                    drop(file);
                }
                if self.options.preserve_permissions {
                    if let Some(mode) = header.mode {
                        set_permissions(&target, mode)?;
                    }
                }
                if self.options.preserve_mtime {
                    if let Some(mtime) = header.mtime {
                        set_mtime(&target, mtime)?;
                    }
                }
            }
            EntryKind::Directory => self.deferred_dirs.push(DeferredDir {
                path: target,
                mode: header.mode,
                mtime: header.mtime,
            }),
            EntryKind::Symlink | EntryKind::HardLink | EntryKind::Other(_) => {}
        }
        Ok(())
    }
}

#[cfg(unix)]
fn create_symlink(original: &Path, link: &Path) -> Result<(), SinkError> {
    Ok(fs::os::unix::fs::symlink(original, link)?)
}

#[cfg(windows)]
fn create_symlink(original: &Path, link: &Path) -> Result<(), SinkError> {
    Ok(fs::os::windows::fs::symlink_file(original, link)?)
}

#[cfg(unix)]
fn set_permissions(path: &Path, mode: u32) -> Result<(), SinkError> {
    use std::os::unix::fs::PermissionsExt;
    Ok(fs::set_permissions(
        path,
        std::fs::Permissions::from_mode(mode & 0o777),
    )?)
}

#[cfg(not(unix))]
fn set_permissions(_path: &Path, _mode: u32) -> Result<(), SinkError> {
    Ok(())
}

fn set_mtime(path: &Path, mtime: u64) -> Result<(), SinkError> {
    let mtime = filetime::FileTime::from_unix_time(i64::try_from(mtime).unwrap_or(i64::MAX), 0);
    filetime::set_file_mtime(path, mtime)?;
    Ok(())
}
