use std::path::PathBuf;

/// The kind of filesystem object an archive entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
    HardLink,
    /// Devices, fifos and other special files, named for diagnostics.
    Other(&'static str),
}

/// Path and metadata of a decoded archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryHeader {
    /// Path of the entry relative to the archive root.
    pub path: PathBuf,
    pub kind: EntryKind,
    /// Unix permission bits.
    pub mode: Option<u32>,
    /// Modification time in seconds since the unix epoch.
    pub mtime: Option<u64>,
    /// Target of symlinks and hard links.
    pub link_target: Option<PathBuf>,
    /// Declared size of the entry's payload.
    pub size: u64,
}

impl EntryHeader {
    pub fn new(path: impl Into<PathBuf>, kind: EntryKind) -> Self {
        Self {
            path: path.into(),
            kind,
            mode: None,
            mtime: None,
            link_target: None,
            size: 0,
        }
    }

    #[must_use]
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }

    #[must_use]
    pub fn with_mtime(mut self, mtime: u64) -> Self {
        self.mtime = Some(mtime);
        self
    }

    #[must_use]
    pub fn with_link_target(mut self, target: impl Into<PathBuf>) -> Self {
        self.link_target = Some(target.into());
        self
    }

    pub fn has_payload(&self) -> bool {
        self.size > 0
    }
}

/// A run of payload bytes starting at `offset` within the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataBlock<'a> {
    pub offset: u64,
    pub bytes: &'a [u8],
}
