use strata_error::{Result, Status};

/// Outcome of a successful read.
///
/// Fatal conditions (I/O failures, protocol violations, truncation inside a
/// declared record) are reported as errors instead; this enum only covers
/// the outcomes where the bytes in the destination are usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// The destination was filled completely.
    Full,
    /// Fewer bytes than requested, but the stream may produce more later.
    /// Common when reading from pipes.
    Incomplete,
    /// Fewer bytes than requested because the end of the stream was
    /// reached.
    Eof,
    /// The read succeeded, but the framing layer has silently patched an
    /// inconsistency earlier in the stream. The bytes may not be what the
    /// file's producer intended.
    TryRecovery,
}

impl ReadStatus {
    /// The public status code for this outcome.
    #[must_use]
    pub const fn status(self) -> Status {
        match self {
            Self::Full => Status::Ok,
            Self::Incomplete => Status::OkIncomplete,
            Self::Eof => Status::Eof,
            Self::TryRecovery => Status::ProtocolTryRecovery,
        }
    }
}

/// A byte stream in a protocol stack.
///
/// A handle is either a *leaf* (a physical file or an in-memory buffer) or
/// a *framing layer* that exclusively owns one inner handle and strips
/// in-band framing headers from its byte stream. Layers compose: consumers
/// read, seek, and tell on the outermost handle as if the framing were
/// absent.
///
/// Handles are synchronous and single-threaded; any operation may block in
/// the leaf's host I/O. A handle is not safe for concurrent use.
pub trait Handle {
    /// Read up to `dst.len()` bytes into `dst`.
    ///
    /// Returns the number of bytes actually read together with the read
    /// outcome. A zero-length destination returns `(0, Full)` without
    /// touching the underlying source.
    fn read(&mut self, dst: &mut [u8]) -> Result<(usize, ReadStatus)>;

    /// Set the logical position to byte offset `n`.
    ///
    /// Seeking to or beyond the end of the stream is allowed; the next
    /// read then reports EOF. Not every handle is seekable (pipes are
    /// not), in which case this fails with a not-supported error.
    fn seek(&mut self, n: u64) -> Result<()> {
        let _ = n;
        Err(strata_error::StrataError::not_implemented("seek"))
    }

    /// The current logical position, 0-based, relative to this layer.
    ///
    /// Each layer of a stack has its own logical view; the values differ
    /// across layers.
    fn tell(&mut self) -> Result<u64> {
        Err(strata_error::StrataError::not_implemented("tell"))
    }

    /// The current physical position in the outermost leaf.
    ///
    /// Identical on every layer of a stack.
    fn ptell(&mut self) -> Result<u64>;

    /// True when a subsequent read would report EOF.
    fn eof(&self) -> bool;

    /// Release resources, recursively closing any owned inner handle.
    ///
    /// Closing an already-closed handle is a no-op.
    fn close(&mut self) -> Result<()>;

    /// The most recent error message recorded on this handle, if any.
    ///
    /// The text is human readable and not stable for parsing. Call it
    /// right after the error occurred for an accurate description.
    fn error_message(&self) -> Option<&str> {
        None
    }
}

impl<H: Handle + ?Sized> Handle for Box<H> {
    fn read(&mut self, dst: &mut [u8]) -> Result<(usize, ReadStatus)> {
        (**self).read(dst)
    }

    fn seek(&mut self, n: u64) -> Result<()> {
        (**self).seek(n)
    }

    fn tell(&mut self) -> Result<u64> {
        (**self).tell()
    }

    fn ptell(&mut self) -> Result<u64> {
        (**self).ptell()
    }

    fn eof(&self) -> bool {
        (**self).eof()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn error_message(&self) -> Option<&str> {
        (**self).error_message()
    }
}
