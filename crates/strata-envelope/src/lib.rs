//! Visible-envelope record framing.
//!
//! Provides [`VisibleEnvelope`], a framing layer over any [`Handle`] that
//! strips visible-envelope record headers from the byte stream.
//!
//! The on-disk layout is:
//! ```text
//! [Header: 4 bytes][payload]
//! [Header: 4 bytes][payload]
//! ...
//! ```
//! where a header is a little-endian `u16` record length followed by the
//! format bytes `0xFF 0x01`. The length counts the header itself, so it is
//! never below 4. There is no terminator record; the end of the last
//! record is expected to align with end-of-file of the underlying handle.
//!
//! Headers chain by length rather than absolute offset, so the format has
//! no 4 GiB bound. A record does not know its own offset into the file;
//! indexed headers are augmented with the offset they were found at, which
//! keeps the logical-to-physical mapping cheap.

use strata_core::{AddressMap, Frame, Handle, ReadHead, ReadStatus, RecordIndex};
use strata_error::{Result, StrataError};
use tracing::debug;

/// On-disk size of a visible-envelope header.
const HEADER_SIZE: usize = 4;

/// One parsed visible-envelope header, augmented with the physical offset
/// it was found at.
#[derive(Debug, Clone, Copy)]
struct EnvelopeFrame {
    /// Total record length, header included.
    length: i64,
    /// Physical offset of the header. In-memory only; the wire format
    /// does not carry it.
    offset: i64,
}

impl Frame for EnvelopeFrame {
    const HEADER_SIZE: i64 = 4;
    const GHOSTS: usize = 1;

    fn ghost(base: i64) -> Self {
        // base + length == base, so the first real header resolves its
        // offset from the ghost like from any other predecessor.
        Self {
            length: Self::HEADER_SIZE,
            offset: base - Self::HEADER_SIZE,
        }
    }

    fn end(&self) -> i64 {
        self.offset + self.length
    }
}

/// A visible-envelope framing layer over an inner handle.
///
/// Opening captures the inner handle's current position as the base
/// offset; the protocol may legitimately start mid-file, after the caller
/// has consumed an unrelated prelude such as a storage unit label. No
/// header is read at open time.
pub struct VisibleEnvelope<T> {
    inner: T,
    index: RecordIndex<EnvelopeFrame>,
    current: ReadHead,
    last_error: Option<String>,
}

impl<T: Handle> VisibleEnvelope<T> {
    /// Open a visible-envelope layer over `inner`, taking ownership of it.
    pub fn open(mut inner: T) -> Self {
        let zero = inner
            .tell()
            .ok()
            .and_then(|z| i64::try_from(z).ok())
            .unwrap_or(0);
        let addr = AddressMap::new(zero, EnvelopeFrame::HEADER_SIZE);
        let index = RecordIndex::new(addr);
        let current = ReadHead::ghost(index.last());
        Self {
            inner,
            index,
            current,
            last_error: None,
        }
    }

    /// Peel this layer off, transferring ownership of the inner handle to
    /// the caller.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Borrow the inner handle for observational queries.
    pub fn inner(&self) -> &T {
        &self.inner
    }

    fn fail(&mut self, err: StrataError) -> StrataError {
        self.last_error = Some(err.to_string());
        err
    }

    fn seek_inner(&mut self, physical: i64) -> Result<()> {
        let target = u64::try_from(physical).expect("physical offsets are non-negative");
        self.inner.seek(target)
    }

    /// Read the next header off the inner handle and index it.
    ///
    /// Returns false on a clean end-of-stream: the end of the last record
    /// aligns with EOF, there are no trailing bytes.
    fn parse_header(&mut self) -> Result<bool> {
        let mut buf = [0u8; HEADER_SIZE];
        let (n, status) = self.inner.read(&mut buf)?;

        if n < buf.len() {
            if n == 0 && self.inner.eof() {
                return Ok(false);
            }
            if status == ReadStatus::Incomplete && !self.inner.eof() {
                return Err(StrataError::io(
                    "visible envelope: incomplete read of record header, \
                     recovery not implemented",
                ));
            }
            return Err(StrataError::unexpected_eof(format!(
                "visible envelope: unexpected end of file when reading header, got {n} bytes"
            )));
        }

        let length = i64::from(u16::from_le_bytes([buf[0], buf[1]]));

        // The format version is always [0xFF 0x01]. Checking it on every
        // header helps identify broken and non-envelope files.
        if buf[2] != 0xFF || buf[3] != 0x01 {
            let record = self.index.len() + 1;
            return Err(StrataError::protocol_fatal(format!(
                "visible envelope: incorrect format version in record {record}"
            )));
        }
        if length < EnvelopeFrame::HEADER_SIZE {
            return Err(StrataError::protocol_fatal(format!(
                "visible envelope: record length (= {length}) is shorter than its own header"
            )));
        }

        let offset = self.index.get(self.index.last()).end();
        debug!(length, offset, "visible envelope: header indexed");
        self.index.append(EnvelopeFrame { length, offset })?;
        Ok(true)
    }

    fn read_payload(&mut self, dst: &mut [u8]) -> Result<usize> {
        let mut nread = 0;
        while nread < dst.len() {
            if self.inner.eof() {
                break;
            }
            if self.current.exhausted() {
                if self.current.pos() == self.index.last() {
                    // Might be EOF, or an empty record, so re-check from
                    // the top.
                    if self.parse_header()? {
                        self.current.move_to(&self.index, self.index.last());
                    }
                } else {
                    let next = self.current.next_record(&self.index);
                    self.seek_inner(next.tell(&self.index))?;
                    self.current = next;
                }
                continue;
            }

            let left =
                usize::try_from(self.current.bytes_left()).expect("record payload fits usize");
            let want = (dst.len() - nread).min(left);
            let (n, status) = self.inner.read(&mut dst[nread..nread + want])?;
            self.current
                .advance(i64::try_from(n).expect("read size fits i64"))?;
            nread += n;

            match status {
                ReadStatus::Full | ReadStatus::TryRecovery => {}
                ReadStatus::Eof | ReadStatus::Incomplete => {
                    if self.inner.eof() && !self.current.exhausted() {
                        let missing = self.current.bytes_left();
                        return Err(StrataError::unexpected_eof(format!(
                            "visible envelope: unexpected end of file when reading record, \
                             got {nread} bytes, expected {missing} more"
                        )));
                    }
                    return Ok(nread);
                }
            }
        }
        Ok(nread)
    }

    fn seek_impl(&mut self, n: u64) -> Result<()> {
        let Ok(n) = i64::try_from(n) else {
            return Err(StrataError::invalid_args(format!(
                "visible envelope: seek: offset (= {n}) not addressable"
            )));
        };

        if self.index.contains(n) {
            let pos = self.index.find(n, self.current.pos())?;
            let real = self.index.addr().physical(n, self.index.index_of(pos));
            self.seek_inner(real)?;
            self.current.move_to(&self.index, pos);
            let skip = real - self.current.tell(&self.index);
            self.current.advance(skip)?;
            return Ok(());
        }

        // The target is past the indexed records: follow the headers and
        // index them as we go.
        loop {
            let last = self.index.last();
            let real = self.index.addr().physical(n, self.index.index_of(last));
            let end = self.index.get(last).end();

            if real < end {
                self.seek_inner(real)?;
                self.current.move_to(&self.index, last);
                let skip = real - self.current.tell(&self.index);
                self.current.advance(skip)?;
                return Ok(());
            }
            if real == end {
                // Record boundary: park at the end and let the next read
                // move across the header.
                self.seek_inner(end)?;
                self.current.move_to(&self.index, last);
                self.current.skip();
                return Ok(());
            }

            self.seek_inner(end)?;
            if !self.parse_header()? {
                // Data ended somewhere in the last record. Without an
                // explicit read there is no telling whether the record was
                // complete; park at its end.
                let last = self.index.last();
                self.current.move_to(&self.index, last);
                self.current.skip();
                return Ok(());
            }
            if self.inner.eof() {
                // A valid header right at the end of the stream. Park the
                // head inside the declared range without touching the
                // stream any further.
                let last = self.index.last();
                let real = self.index.addr().physical(n, self.index.index_of(last));
                self.current.move_to(&self.index, last);
                let skip = (real - self.current.tell(&self.index)).min(self.current.bytes_left());
                self.current.advance(skip)?;
                return Ok(());
            }
        }
    }
}

impl<T: Handle> Handle for VisibleEnvelope<T> {
    fn read(&mut self, dst: &mut [u8]) -> Result<(usize, ReadStatus)> {
        if dst.is_empty() {
            return Ok((0, ReadStatus::Full));
        }

        let nread = match self.read_payload(dst) {
            Ok(n) => n,
            Err(e) => return Err(self.fail(e)),
        };
        let status = if nread == dst.len() {
            ReadStatus::Full
        } else if self.eof() {
            ReadStatus::Eof
        } else {
            ReadStatus::Incomplete
        };
        Ok((nread, status))
    }

    fn seek(&mut self, n: u64) -> Result<()> {
        match self.seek_impl(n) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(e)),
        }
    }

    fn tell(&mut self) -> Result<u64> {
        let record = self.index.index_of(self.current.pos());
        let logical = self
            .index
            .addr()
            .logical(self.current.tell(&self.index), record);
        Ok(u64::try_from(logical).expect("logical offsets are non-negative"))
    }

    fn ptell(&mut self) -> Result<u64> {
        self.inner.ptell()
    }

    fn eof(&self) -> bool {
        // There is no trailing header: the end of the last record should
        // align with EOF from the underlying handle. If not, the record is
        // either truncated or there are garbage bytes at the end.
        self.inner.eof()
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }

    fn error_message(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}
