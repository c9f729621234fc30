use std::fs::Metadata;

/// Identity of the file currently behind the log path.
///
/// Device + inode on unix. Elsewhere the creation time stands in, which is
/// enough to tell a rotated log apart from the one it replaced unless the
/// filesystem tunnels it: NTFS hands a file recreated under the same name
/// within ~15s the old creation time. Such a replacement is then only seen
/// as a reset if it is shorter than the consumed offset, like an in-place
/// rewrite on unix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileIdentity(IdentityKey);

#[cfg(unix)]
type IdentityKey = (u64, u64);

#[cfg(not(unix))]
type IdentityKey = Option<std::time::SystemTime>;

impl FileIdentity {
    #[cfg(unix)]
    pub fn of(metadata: &Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self((metadata.dev(), metadata.ino()))
    }

    #[cfg(not(unix))]
    pub fn of(metadata: &Metadata) -> Self {
        Self(metadata.created().ok())
    }
}

/// Outcome of comparing a [`LogPosition`] with the file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionChange {
    Unchanged,
    /// A different file now lives at the path
    Rotated,
    /// Same file, but shorter than the bytes already consumed
    Truncated,
}

impl PositionChange {
    pub fn is_reset(self) -> bool {
        !matches!(self, PositionChange::Unchanged)
    }
}

/// Cursor into the live log: which file, and how many bytes of it were consumed.
///
/// The offset only grows while the identity stays the same; any other
/// observation resets it to the start of the (new) file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogPosition {
    identity: Option<FileIdentity>,
    offset: u64,
}

impl LogPosition {
    pub fn new(identity: FileIdentity, offset: u64) -> Self {
        Self {
            identity: Some(identity),
            offset,
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn identity(&self) -> Option<FileIdentity> {
        self.identity
    }

    pub(crate) fn advance(&mut self, bytes: u64) {
        self.offset += bytes;
    }

    /// Check the position against the current identity and length of the file.
    pub fn observe(&mut self, identity: FileIdentity, len: u64) -> PositionChange {
        let change = match self.identity {
            Some(known) if known != identity => PositionChange::Rotated,
            _ if len < self.offset => PositionChange::Truncated,
            _ => PositionChange::Unchanged,
        };

        if change.is_reset() {
            self.offset = 0;
        }
        self.identity = Some(identity);
        change
    }
}
