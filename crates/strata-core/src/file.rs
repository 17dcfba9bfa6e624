use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};

use strata_error::{Result, StrataError};
use tracing::debug;

use crate::handle::{Handle, ReadStatus};

/// A leaf handle over a host file.
///
/// The host file's position at open time becomes the *base offset*: logical
/// offset 0 of this handle. That allows a caller to consume an unrelated
/// prelude (garbage, noise, a storage label) before handing the file over.
///
/// Everything the host file supports is supported here; features degrade
/// when the file is a stream (pipe). In that case the position query fails
/// at open, seek and tell report not-supported with the original error
/// text, and forward-only reads keep working.
#[derive(Debug)]
pub struct FileSource {
    file: Option<File>,
    /// Base offset, or None when the position query failed at open.
    zero: Option<u64>,
    /// The error text from the failed position query, kept for seek/tell.
    tell_error: Option<String>,
    at_eof: bool,
    last_error: Option<String>,
}

impl FileSource {
    /// Open over the host file, taking the current position as the base
    /// offset.
    #[must_use]
    pub fn open(mut file: File) -> Self {
        let (zero, tell_error) = match file.stream_position() {
            Ok(z) => (Some(z), None),
            Err(e) => {
                debug!(error = %e, "file: position query failed, handle is read-only forward");
                (None, Some(e.to_string()))
            }
        };
        Self {
            file: Some(file),
            zero,
            tell_error,
            at_eof: false,
            last_error: None,
        }
    }

    /// Open over the host file with an explicit base offset.
    ///
    /// The file is positioned at `zero` before any other operation.
    pub fn open_at(mut file: File, zero: u64) -> Result<Self> {
        file.seek(SeekFrom::Start(zero))?;
        Ok(Self {
            file: Some(file),
            zero: Some(zero),
            tell_error: None,
            at_eof: false,
            last_error: None,
        })
    }

    fn fail(&mut self, err: StrataError) -> StrataError {
        self.last_error = Some(err.to_string());
        err
    }

    fn not_seekable(&self) -> StrataError {
        let detail = self
            .tell_error
            .as_deref()
            .unwrap_or("position unavailable")
            .to_owned();
        StrataError::not_supported(detail)
    }

    fn host(&mut self) -> Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| StrataError::runtime("file: handle is closed"))
    }
}

impl Handle for FileSource {
    fn read(&mut self, dst: &mut [u8]) -> Result<(usize, ReadStatus)> {
        if dst.is_empty() {
            return Ok((0, ReadStatus::Full));
        }

        let mut nread = 0;
        while nread < dst.len() {
            let r = self.host()?.read(&mut dst[nread..]);
            match r {
                Ok(0) => {
                    self.at_eof = true;
                    return Ok((nread, ReadStatus::Eof));
                }
                Ok(n) => nread += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    return Ok((nread, ReadStatus::Incomplete));
                }
                Err(e) => return Err(self.fail(StrataError::Io(e))),
            }
        }
        Ok((nread, ReadStatus::Full))
    }

    fn seek(&mut self, n: u64) -> Result<()> {
        let Some(zero) = self.zero else {
            let err = self.not_seekable();
            return Err(self.fail(err));
        };
        let Some(target) = zero.checked_add(n) else {
            return Err(self.fail(StrataError::invalid_args(format!(
                "file: seek: offset (= {n}) not addressable"
            ))));
        };
        match self.host()?.seek(SeekFrom::Start(target)) {
            Ok(_) => {
                self.at_eof = false;
                Ok(())
            }
            Err(e) => Err(self.fail(StrataError::Io(e))),
        }
    }

    fn tell(&mut self) -> Result<u64> {
        let Some(zero) = self.zero else {
            let err = self.not_seekable();
            return Err(self.fail(err));
        };
        let pos = self.ptell()?;
        Ok(pos - zero)
    }

    fn ptell(&mut self) -> Result<u64> {
        match self.host()?.stream_position() {
            Ok(pos) => Ok(pos),
            Err(e) => Err(self.fail(StrataError::Io(e))),
        }
    }

    fn eof(&self) -> bool {
        self.at_eof
    }

    fn close(&mut self) -> Result<()> {
        drop(self.file.take());
        Ok(())
    }

    fn error_message(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}
