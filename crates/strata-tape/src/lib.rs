//! Tape-image record framing.
//!
//! Provides [`TapeImage`], a framing layer over any [`Handle`] that strips
//! tape-image record headers from the byte stream on the fly.
//!
//! The on-disk layout is:
//! ```text
//! [Header: 12 bytes][payload]
//! [Header: 12 bytes][payload]
//! ...
//! [Header: 12 bytes, type = file]
//! ```
//! where a header is three little-endian `u32` fields: a record type
//! (0 = record, 1 = file), the absolute offset of the previous header, and
//! the absolute offset of the next one. One or two trailing file-type
//! headers terminate the stream, although the end mark is optional in
//! practice. The 32-bit offsets bound the format at 4 GiB.
//!
//! Headers are indexed as they are encountered; seeks inside the indexed
//! region reposition directly, seeks past it follow the header chain and
//! extend the index.

use strata_core::{AddressMap, Frame, Handle, ReadHead, ReadStatus, RecordIndex};
use strata_error::{Result, StrataError};
use tracing::{debug, warn};

/// On-disk size of a tape-image header.
const HEADER_SIZE: usize = 12;

/// The record type field of a tape-image header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    /// A regular record with payload.
    Record,
    /// A tape mark; terminates the logical file.
    File,
}

/// One parsed tape-image header.
///
/// Offsets are widened from the 32-bit wire fields so the address math is
/// uniform across the stack.
#[derive(Debug, Clone, Copy)]
struct TapeFrame {
    kind: FrameKind,
    prev: i64,
    next: i64,
}

impl Frame for TapeFrame {
    const HEADER_SIZE: i64 = 12;
    // Two ghosts, so the header two back from the first real one is still
    // a valid index element.
    const GHOSTS: usize = 2;

    fn ghost(base: i64) -> Self {
        Self {
            kind: FrameKind::Record,
            prev: 0,
            next: base,
        }
    }

    fn end(&self) -> i64 {
        self.next
    }
}

/// A tape-image framing layer over an inner handle.
///
/// Opening captures the inner handle's current position as the base
/// offset, so a stream can be handed over at any tape mark. No header is
/// read at open time; the first read or seek pulls the first header off
/// the stream. When the position query fails (pipes) the base falls back
/// to 0, which keeps purely forward reads working but makes seek targets
/// and the recovery base check unreliable.
///
/// Minor header inconsistencies (an unknown record type, a back pointer
/// that disagrees with the headers already seen) are patched in memory and
/// put the handle in sticky recovery: every successful read from then on
/// reports [`ReadStatus::TryRecovery`] so the caller knows the data came
/// from a repaired stream. A second anomaly while in recovery fails hard.
pub struct TapeImage<T> {
    inner: T,
    index: RecordIndex<TapeFrame>,
    current: ReadHead,
    recovery: bool,
    last_error: Option<String>,
}

impl<T: Handle> TapeImage<T> {
    /// Open a tape-image layer over `inner`, taking ownership of it.
    pub fn open(mut inner: T) -> Self {
        let zero = inner
            .tell()
            .ok()
            .and_then(|z| i64::try_from(z).ok())
            .unwrap_or(0);
        let addr = AddressMap::new(zero, TapeFrame::HEADER_SIZE);
        let index = RecordIndex::new(addr);
        let current = ReadHead::ghost(index.last());
        Self {
            inner,
            index,
            current,
            recovery: false,
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

    fn at_end(&self) -> bool {
        self.index.get(self.current.pos()).kind == FrameKind::File || self.inner.eof()
    }

    fn seek_inner(&mut self, physical: i64) -> Result<()> {
        let target = u64::try_from(physical).expect("physical offsets are non-negative");
        self.inner.seek(target)
    }

    /// Read the next header off the inner handle and index it.
    ///
    /// Returns false on a clean end-of-stream before the header, which is
    /// legitimate: the closing tape mark is optional in practice.
    fn parse_header(&mut self) -> Result<bool> {
        let mut buf = [0u8; HEADER_SIZE];
        let (n, status) = self.inner.read(&mut buf)?;

        if n < buf.len() {
            if n == 0 && self.inner.eof() {
                return Ok(false);
            }
            if status == ReadStatus::Incomplete && !self.inner.eof() {
                return Err(StrataError::failed_recovery(
                    "tapeimage: incomplete read of header, recovery not implemented",
                ));
            }
            return Err(StrataError::unexpected_eof(format!(
                "tapeimage: unexpected end of file when reading header, got {n} bytes"
            )));
        }

        let raw_kind = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let mut prev = i64::from(u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]));
        let next = i64::from(u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]));

        let kind_consistent = raw_kind <= 1;
        let kind = if raw_kind == 1 {
            FrameKind::File
        } else {
            FrameKind::Record
        };
        if !kind_consistent {
            // Maybe someone wrote the wrong record type by accident, or an
            // extension uses more types for semantics. If this is the only
            // problem with the record, pretend it is a regular one.
            if self.recovery {
                return Err(StrataError::failed_recovery(
                    "tapeimage: unknown header type while in recovery, file is likely corrupt",
                ));
            }
            warn!(
                header_type = raw_kind,
                "tapeimage: unknown header type, assuming record"
            );
            self.recovery = true;
        }

        if next <= prev {
            // No reasonable recovery: either the previous pointer or this
            // entire header is broken. Files over 4 GiB also end up here,
            // their offsets wrap the 32-bit fields.
            let msg = if kind_consistent {
                format!(
                    "file corrupt: next (= {next}) <= prev (= {prev}), \
                     file size might be over 4 GiB"
                )
            } else {
                format!(
                    "file corrupt: header type is not 0 or 1, \
                     next (= {next}) <= prev (= {prev}), file is likely missing data"
                )
            };
            return Err(StrataError::protocol_fatal(msg));
        }

        if self.index.len() >= 2 {
            // The back pointer must agree with the headers already seen.
            // When it does not, assume it is the back pointer that is
            // wrong and patch it, in memory only. Being sure would mean
            // walking the file back to front.
            let linked = self.index.get(self.index.prev(self.index.last())).next;
            if prev != linked {
                if self.recovery {
                    return Err(StrataError::failed_recovery(format!(
                        "file corrupt: prev (= {prev}) does not match the index (= {linked}), \
                         new error while in recovery, file is likely missing data"
                    )));
                }
                warn!(
                    got = prev,
                    expected = linked,
                    "tapeimage: back pointer does not match the index, patching"
                );
                self.recovery = true;
                prev = linked;
            }
        } else if self.recovery && self.index.len() == 1 {
            // Two headers so far. The second one's back pointer must point
            // at the first, which sits at the base offset.
            let base = self.index.base();
            if prev != base {
                return Err(StrataError::failed_recovery(format!(
                    "file corrupt: second header prev (= {prev}) must point to \
                     the base offset (= {base}), file is likely missing data"
                )));
            }
        }

        debug!(kind = ?kind, prev, next, "tapeimage: header indexed");
        self.index.append(TapeFrame { kind, prev, next })?;
        Ok(true)
    }

    fn read_payload(&mut self, dst: &mut [u8]) -> Result<usize> {
        let mut nread = 0;
        while nread < dst.len() {
            if self.at_end() {
                break;
            }
            if self.current.exhausted() {
                if self.current.pos() == self.index.last() {
                    // The next record is not indexed yet; read its header
                    // off the stream. Might be EOF, or an empty record, so
                    // re-check from the top.
                    if self.parse_header()? {
                        self.current.move_to(&self.index, self.index.last());
                    }
                } else {
                    // Already indexed: reposition the underlying stream to
                    // the next record's payload.
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
                ReadStatus::Full => {}
                ReadStatus::TryRecovery => self.recovery = true,
                ReadStatus::Eof | ReadStatus::Incomplete => {
                    if self.inner.eof() && !self.current.exhausted() {
                        let missing = self.current.bytes_left();
                        return Err(StrataError::unexpected_eof(format!(
                            "tapeimage: unexpected end of file when reading record, \
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
        if n > u64::from(u32::MAX) {
            return Err(StrataError::invalid_args(
                "tapeimage: seek offsets beyond 4 GiB are not addressable by this format",
            ));
        }
        let n = i64::try_from(n).expect("offset fits i64");

        if self.index.contains(n) {
            let pos = self.index.find(n, self.current.pos())?;
            let real = self.index.addr().physical(n, self.index.index_of(pos));
            self.seek_inner(real)?;
            self.current.move_to(&self.index, pos);
            let skip = real - self.current.tell(&self.index);
            self.current.advance(skip)?;
            return Ok(());
        }

        // The target is past the indexed records: follow the header chain
        // and index it as we go.
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
                // The byte after the last record's payload doubles as the
                // first byte of the next record's payload. Park at the end
                // and let the next read move across the header.
                self.seek_inner(end)?;
                self.current.move_to(&self.index, last);
                self.current.skip();
                return Ok(());
            }
            if self.index.index_of(last) >= 0 && self.index.get(last).kind == FrameKind::File {
                // Seeking past the end of the file is allowed, as in a
                // plain file; reads after it report EOF immediately.
                self.current.move_to(&self.index, last);
                self.current.skip();
                return Ok(());
            }

            self.seek_inner(end)?;
            if !self.parse_header()? {
                // Clean end-of-stream before the target: park at the last
                // record and let reads report EOF.
                let last = self.index.last();
                self.current.move_to(&self.index, last);
                self.current.skip();
                return Ok(());
            }
            if self.inner.eof() {
                // The header at the very end of the stream declares data
                // that is not there. Park the head inside the declared
                // range without touching the stream any further.
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

impl<T: Handle> Handle for TapeImage<T> {
    fn read(&mut self, dst: &mut [u8]) -> Result<(usize, ReadStatus)> {
        if dst.is_empty() {
            let status = if self.recovery {
                ReadStatus::TryRecovery
            } else {
                ReadStatus::Full
            };
            return Ok((0, status));
        }

        let nread = match self.read_payload(dst) {
            Ok(n) => n,
            Err(e) => return Err(self.fail(e)),
        };
        let status = if self.recovery {
            ReadStatus::TryRecovery
        } else if nread == dst.len() {
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
        self.at_end()
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }

    fn error_message(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use strata_core::MemorySource;
    use strata_error::Status;

    use super::*;

    fn header(kind: u32, prev: u32, next: u32) -> Vec<u8> {
        let mut h = Vec::with_capacity(HEADER_SIZE);
        h.extend_from_slice(&kind.to_le_bytes());
        h.extend_from_slice(&prev.to_le_bytes());
        h.extend_from_slice(&next.to_le_bytes());
        h
    }

    /// The 8-byte single-record file: one record, a file mark, and the
    /// terminating tape mark.
    fn single_record_file() -> Vec<u8> {
        let mut file = header(0, 0, 20);
        file.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        file.extend(header(1, 0, 32));
        file.extend(header(1, 20, 44));
        file
    }

    /// Three records of 8 bytes each, then the tape mark pair.
    fn three_record_file() -> Vec<u8> {
        let mut file = header(0, 0, 20);
        file.extend_from_slice(&[0, 1, 2, 3, 4, 5, 6, 7]);
        file.extend(header(0, 0, 40));
        file.extend_from_slice(&[8, 9, 10, 11, 12, 13, 14, 15]);
        file.extend(header(0, 20, 60));
        file.extend_from_slice(&[16, 17, 18, 19, 20, 21, 22, 23]);
        file.extend(header(1, 40, 72));
        file.extend(header(1, 60, 84));
        file
    }

    fn tape_over(file: Vec<u8>) -> TapeImage<MemorySource> {
        TapeImage::open(MemorySource::with_contents(file))
    }

    #[test]
    fn read_single_record_past_end() {
        let mut tif = tape_over(single_record_file());
        let mut buf = [0u8; 10];
        let (n, status) = tif.read(&mut buf).unwrap();
        assert_eq!(n, 8);
        assert_eq!(status, ReadStatus::Eof);
        assert_eq!(&buf[..8], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(tif.eof());
    }

    #[test]
    fn split_reads() {
        let mut tif = tape_over(single_record_file());
        let mut buf = [0u8; 4];

        let (n, status) = tif.read(&mut buf).unwrap();
        assert_eq!((n, status), (4, ReadStatus::Full));
        assert_eq!(buf, [1, 2, 3, 4]);

        let (n, status) = tif.read(&mut buf).unwrap();
        assert_eq!((n, status), (4, ReadStatus::Full));
        assert_eq!(buf, [5, 6, 7, 8]);
    }

    #[test]
    fn read_crosses_record_boundaries() {
        let mut tif = tape_over(three_record_file());
        let mut buf = [0u8; 24];
        let (n, status) = tif.read(&mut buf).unwrap();
        assert_eq!(n, 24);
        assert_eq!(status, ReadStatus::Full);
        let expected: Vec<u8> = (0..24).collect();
        assert_eq!(&buf[..], &expected[..]);

        let (n, status) = tif.read(&mut buf[..1]).unwrap();
        assert_eq!((n, status), (0, ReadStatus::Eof));
        assert!(tif.eof());
    }

    #[test]
    fn zero_length_read_does_not_touch_the_stream() {
        let mut tif = tape_over(single_record_file());
        let (n, status) = tif.read(&mut []).unwrap();
        assert_eq!((n, status), (0, ReadStatus::Full));
        assert_eq!(tif.tell().unwrap(), 0);
        assert_eq!(tif.ptell().unwrap(), 0);
    }

    #[test]
    fn tell_starts_at_zero_and_tracks_payload() {
        let mut tif = tape_over(three_record_file());
        assert_eq!(tif.tell().unwrap(), 0);

        let mut buf = [0u8; 4];
        tif.read(&mut buf).unwrap();
        assert_eq!(tif.tell().unwrap(), 4);

        let mut buf = [0u8; 8];
        tif.read(&mut buf).unwrap();
        assert_eq!(tif.tell().unwrap(), 12);
    }

    #[test]
    fn ptell_matches_the_inner_layer() {
        let mut tif = tape_over(three_record_file());
        assert_eq!(tif.ptell().unwrap(), 0);
        let mut buf = [0u8; 4];
        tif.read(&mut buf).unwrap();
        // 12 header bytes plus 4 payload bytes.
        assert_eq!(tif.ptell().unwrap(), 16);
    }

    #[test]
    fn seek_within_the_current_record() {
        let mut tif = tape_over(three_record_file());
        let mut buf = [0u8; 2];
        tif.read(&mut buf).unwrap();

        tif.seek(6).unwrap();
        assert_eq!(tif.tell().unwrap(), 6);
        tif.read(&mut buf).unwrap();
        assert_eq!(buf, [6, 7]);
    }

    #[test]
    fn seek_past_the_index_extends_it() {
        let mut tif = tape_over(three_record_file());
        tif.seek(17).unwrap();
        assert_eq!(tif.tell().unwrap(), 17);

        let mut buf = [0u8; 4];
        let (n, status) = tif.read(&mut buf).unwrap();
        assert_eq!((n, status), (4, ReadStatus::Full));
        assert_eq!(buf, [17, 18, 19, 20]);
    }

    #[test]
    fn seek_backwards_uses_the_index() {
        let mut tif = tape_over(three_record_file());
        let mut buf = [0u8; 24];
        tif.read(&mut buf).unwrap();

        tif.seek(2).unwrap();
        assert_eq!(tif.tell().unwrap(), 2);
        let mut buf = [0u8; 4];
        tif.read(&mut buf).unwrap();
        assert_eq!(buf, [2, 3, 4, 5]);
    }

    #[test]
    fn seek_to_record_border_not_indexed() {
        // Offset 8 is both one-past record 0 and the first byte of record
        // 1's payload; a read after the seek must not treat record 1's
        // header as payload.
        let mut tif = tape_over(three_record_file());
        tif.seek(8).unwrap();
        let mut buf = [0u8; 4];
        tif.read(&mut buf).unwrap();
        assert_eq!(buf, [8, 9, 10, 11]);
    }

    #[test]
    fn seek_to_record_border_indexed() {
        let mut tif = tape_over(three_record_file());
        let mut buf = [0u8; 24];
        tif.read(&mut buf).unwrap();

        tif.seek(8).unwrap();
        assert_eq!(tif.tell().unwrap(), 8);
        let mut buf = [0u8; 4];
        tif.read(&mut buf).unwrap();
        assert_eq!(buf, [8, 9, 10, 11]);
    }

    #[test]
    fn seek_to_logical_end_then_read_reports_eof() {
        let mut tif = tape_over(single_record_file());
        tif.seek(8).unwrap();
        let mut buf = [0u8; 4];
        let (n, status) = tif.read(&mut buf).unwrap();
        assert_eq!((n, status), (0, ReadStatus::Eof));
        assert!(tif.eof());
    }

    #[test]
    fn seek_past_eof_then_read_reports_eof() {
        let mut tif = tape_over(single_record_file());
        tif.seek(100).unwrap();
        let mut buf = [0u8; 4];
        let (n, status) = tif.read(&mut buf).unwrap();
        assert_eq!((n, status), (0, ReadStatus::Eof));
    }

    #[test]
    fn seek_back_after_eof_clears_it() {
        let mut tif = tape_over(single_record_file());
        let mut buf = [0u8; 10];
        tif.read(&mut buf).unwrap();
        assert!(tif.eof());

        tif.seek(0).unwrap();
        assert!(!tif.eof());
        let (n, status) = tif.read(&mut buf[..8]).unwrap();
        assert_eq!((n, status), (8, ReadStatus::Full));
        assert_eq!(&buf[..8], &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn seek_beyond_4gib_is_invalid() {
        let mut tif = tape_over(single_record_file());
        let err = tif.seek(u64::from(u32::MAX) + 1).unwrap_err();
        assert_eq!(err.status(), Status::InvalidArgs);
        assert!(tif.error_message().unwrap().contains("4 GiB"));
    }

    #[test]
    fn next_not_after_prev_is_fatal() {
        let mut file = header(0, 30, 12);
        file.extend_from_slice(&[0u8; 8]);
        let mut tif = tape_over(file);

        let mut buf = [0u8; 4];
        let err = tif.read(&mut buf).unwrap_err();
        assert_eq!(err.status(), Status::ProtocolFatalError);
        assert!(err.to_string().contains("4 GiB"));
    }

    #[test]
    fn bad_type_and_bad_linkage_is_fatal_with_missing_data() {
        let mut file = header(7, 30, 12);
        file.extend_from_slice(&[0u8; 8]);
        let mut tif = tape_over(file);

        let mut buf = [0u8; 4];
        let err = tif.read(&mut buf).unwrap_err();
        assert_eq!(err.status(), Status::ProtocolFatalError);
        assert!(err.to_string().contains("missing data"));
    }

    /// Records of 8, 16, and 8 bytes where the second and third headers
    /// carry an unknown type.
    fn bad_type_file() -> Vec<u8> {
        let mut file = header(0, 0, 20);
        file.extend_from_slice(&[0, 1, 2, 3, 4, 5, 6, 7]);
        file.extend(header(0xFFFF_FFFF, 0, 48));
        file.extend_from_slice(&[8, 9, 10, 11, 12, 13, 14, 15]);
        file.extend_from_slice(&[16, 17, 18, 19, 20, 21, 22, 23]);
        file.extend(header(0xFFFF_FFFF, 20, 68));
        file.extend_from_slice(&[24, 25, 26, 27, 28, 29, 30, 31]);
        file.extend(header(1, 48, 80));
        file
    }

    #[test]
    fn unknown_type_enters_sticky_recovery() {
        let mut tif = tape_over(bad_type_file());

        let mut buf = [0u8; 16];
        let (n, status) = tif.read(&mut buf).unwrap();
        assert_eq!((n, status), (16, ReadStatus::TryRecovery));
        let expected: Vec<u8> = (0..16).collect();
        assert_eq!(&buf[..], &expected[..]);

        // Still inside the patched record: recovery stays sticky.
        let mut buf = [0u8; 8];
        let (n, status) = tif.read(&mut buf).unwrap();
        assert_eq!((n, status), (8, ReadStatus::TryRecovery));

        // The third header carries the next anomaly; recovery fails.
        let err = tif.read(&mut buf).unwrap_err();
        assert_eq!(err.status(), Status::ProtocolFailedRecovery);
    }

    #[test]
    fn recovery_survives_seeks() {
        let mut tif = tape_over(bad_type_file());
        let mut buf = [0u8; 16];
        tif.read(&mut buf).unwrap();

        tif.seek(2).unwrap();
        let (n, status) = tif.read(&mut buf[..4]).unwrap();
        assert_eq!((n, status), (4, ReadStatus::TryRecovery));
        assert_eq!(&buf[..4], &[2, 3, 4, 5]);
    }

    #[test]
    fn recovery_is_sticky_for_zero_length_reads() {
        let mut tif = tape_over(bad_type_file());
        let mut buf = [0u8; 16];
        tif.read(&mut buf).unwrap();

        let (n, status) = tif.read(&mut []).unwrap();
        assert_eq!((n, status), (0, ReadStatus::TryRecovery));
    }

    #[test]
    fn bad_back_pointer_is_patched() {
        let mut file = header(0, 0, 20);
        file.extend_from_slice(&[0, 1, 2, 3, 4, 5, 6, 7]);
        file.extend(header(0, 0, 40));
        file.extend_from_slice(&[8, 9, 10, 11, 12, 13, 14, 15]);
        // Back pointer should be 20; patched in memory.
        file.extend(header(0, 999, 60));
        file.extend_from_slice(&[16, 17, 18, 19, 20, 21, 22, 23]);
        file.extend(header(1, 40, 72));

        let mut tif = tape_over(file);
        let mut buf = [0u8; 24];
        let (n, status) = tif.read(&mut buf).unwrap();
        assert_eq!((n, status), (24, ReadStatus::TryRecovery));
        let expected: Vec<u8> = (0..24).collect();
        assert_eq!(&buf[..], &expected[..]);
    }

    #[test]
    fn second_bad_back_pointer_fails_recovery() {
        let mut file = header(0, 0, 20);
        file.extend_from_slice(&[0u8; 8]);
        file.extend(header(0, 0, 40));
        file.extend_from_slice(&[0u8; 8]);
        file.extend(header(0, 999, 60));
        file.extend_from_slice(&[0u8; 8]);
        file.extend(header(0, 999, 80));
        file.extend_from_slice(&[0u8; 8]);

        let mut tif = tape_over(file);
        let mut buf = [0u8; 32];
        let err = tif.read(&mut buf).unwrap_err();
        assert_eq!(err.status(), Status::ProtocolFailedRecovery);
    }

    #[test]
    fn second_header_must_point_at_base_while_recovering() {
        // The first header's type is broken, so the layer is already in
        // recovery when the second header's back pointer turns out wrong.
        let mut file = header(7, 0, 20);
        file.extend_from_slice(&[0u8; 8]);
        file.extend(header(0, 4, 40));
        file.extend_from_slice(&[0u8; 8]);

        let mut tif = tape_over(file);
        let mut buf = [0u8; 16];
        let err = tif.read(&mut buf).unwrap_err();
        assert_eq!(err.status(), Status::ProtocolFailedRecovery);
        assert!(err.to_string().contains("base offset"));
    }

    #[test]
    fn truncation_inside_a_record_is_unexpected_eof() {
        let mut file = header(0, 0, 20);
        file.extend_from_slice(&[1, 2, 3, 4]);
        let mut tif = tape_over(file);

        let mut buf = [0u8; 8];
        let err = tif.read(&mut buf).unwrap_err();
        assert_eq!(err.status(), Status::UnexpectedEof);
        assert!(tif.error_message().unwrap().contains("unexpected end"));
    }

    #[test]
    fn truncation_inside_a_header_is_unexpected_eof() {
        let mut file = header(0, 0, 20);
        file.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        file.extend_from_slice(&[0, 0, 0, 0, 0]);
        let mut tif = tape_over(file);

        let mut buf = [0u8; 10];
        let err = tif.read(&mut buf).unwrap_err();
        assert_eq!(err.status(), Status::UnexpectedEof);
        assert!(err.to_string().contains("got 5 bytes"));
    }

    #[test]
    fn missing_end_mark_is_a_clean_eof() {
        let mut file = header(0, 0, 20);
        file.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let mut tif = tape_over(file);

        let mut buf = [0u8; 10];
        let (n, status) = tif.read(&mut buf).unwrap();
        assert_eq!((n, status), (8, ReadStatus::Eof));
        assert!(tif.eof());
    }

    #[test]
    fn empty_records_are_skipped() {
        let mut file = header(0, 0, 16);
        file.extend_from_slice(&[1, 2, 3, 4]);
        file.extend(header(0, 0, 28)); // empty record
        file.extend(header(0, 16, 44));
        file.extend_from_slice(&[5, 6, 7, 8]);
        file.extend(header(1, 28, 56));

        let mut tif = tape_over(file);
        let mut buf = [0u8; 8];
        let (n, status) = tif.read(&mut buf).unwrap();
        assert_eq!((n, status), (8, ReadStatus::Full));
        assert_eq!(buf, [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn opened_at_a_nonzero_base() {
        let mut file = vec![0xAA; 6];
        file.extend(header(0, 0, 26));
        file.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        file.extend(header(1, 6, 38));

        let mut mem = MemorySource::with_contents(file);
        mem.seek(6).unwrap();
        let mut tif = TapeImage::open(mem);

        assert_eq!(tif.tell().unwrap(), 0);
        let mut buf = [0u8; 8];
        let (n, status) = tif.read(&mut buf).unwrap();
        assert_eq!((n, status), (8, ReadStatus::Full));
        assert_eq!(buf, [1, 2, 3, 4, 5, 6, 7, 8]);

        tif.seek(2).unwrap();
        assert_eq!(tif.tell().unwrap(), 2);
        tif.read(&mut buf[..2]).unwrap();
        assert_eq!(&buf[..2], &[3, 4]);
    }

    #[test]
    fn peel_exposes_the_inner_position() {
        let mut tif = tape_over(single_record_file());
        let mut buf = [0u8; 4];
        tif.read(&mut buf).unwrap();

        let outer_ptell = tif.ptell().unwrap();
        let mut inner = tif.into_inner();
        assert_eq!(inner.ptell().unwrap(), outer_ptell);

        // The next raw bytes are the rest of the payload.
        let (n, _) = inner.read(&mut buf).unwrap();
        assert_eq!(n, 4);
        assert_eq!(buf, [5, 6, 7, 8]);
    }

    #[test]
    fn peek_is_observational() {
        let mut tif = tape_over(single_record_file());
        let mut buf = [0u8; 4];
        tif.read(&mut buf).unwrap();
        assert!(!tif.inner().eof());
    }

    #[test]
    fn close_recurses_into_the_leaf() {
        let mut tif = tape_over(single_record_file());
        tif.close().unwrap();
    }
}
