use strata_error::{Result, StrataError};

use crate::addr::AddressMap;

/// A record header as stored in a [`RecordIndex`].
///
/// Both framing protocols describe a record by where it *ends*: the
/// tape-image header carries the next header's offset, and the visible
/// envelope carries its own length plus an augmented start offset. That is
/// enough for the index, since records are contiguous: a record's payload
/// starts one header past the previous record's end.
pub trait Frame: Copy {
    /// On-disk size of the header, in bytes.
    const HEADER_SIZE: i64;

    /// Number of ghost frames prepended to the index.
    ///
    /// Ghosts make "look one back" operations total: the frame before the
    /// first real record is always a valid index element.
    const GHOSTS: usize;

    /// A ghost frame whose end is the given base offset, so the first real
    /// record's payload resolves to `base + HEADER_SIZE`.
    fn ghost(base: i64) -> Self;

    /// Physical offset one past the last byte of this record's payload.
    fn end(&self) -> i64;
}

/// A stable position in a [`RecordIndex`].
///
/// Positions stay valid across appends; raw references into the index do
/// not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pos(pub(crate) usize);

/// The record headers read so far, in increasing physical-offset order.
///
/// Append only: the index grows each time the framing layer reads a new
/// header from disk, never shrinks, and is never invalidated by seek.
#[derive(Debug)]
pub struct RecordIndex<F> {
    frames: Vec<F>,
    addr: AddressMap,
}

impl<F: Frame> RecordIndex<F> {
    /// Create an index holding only the ghost frame(s).
    #[must_use]
    pub fn new(addr: AddressMap) -> Self {
        let frames = vec![F::ghost(addr.base()); F::GHOSTS];
        Self { frames, addr }
    }

    /// The address map this index translates with.
    #[must_use]
    pub const fn addr(&self) -> &AddressMap {
        &self.addr
    }

    /// Base physical offset of the index.
    #[must_use]
    pub const fn base(&self) -> i64 {
        self.addr.base()
    }

    /// Number of real records indexed so far. Excludes the ghost(s).
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len() - F::GHOSTS
    }

    /// True when no real record has been indexed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Position of the first real record. Only meaningful when the index
    /// is not empty.
    #[must_use]
    pub fn begin(&self) -> Pos {
        Pos(F::GHOSTS)
    }

    /// Position of the last frame. This is a ghost when the index is
    /// empty.
    #[must_use]
    pub fn last(&self) -> Pos {
        Pos(self.frames.len() - 1)
    }

    /// Position of the frame before `pos`.
    #[must_use]
    pub fn prev(&self, pos: Pos) -> Pos {
        debug_assert!(pos.0 > 0);
        Pos(pos.0 - 1)
    }

    /// The frame at `pos`.
    #[must_use]
    pub fn get(&self, pos: Pos) -> &F {
        &self.frames[pos.0]
    }

    /// The 0-based record number of `pos`. Ghost positions are negative.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn index_of(&self, pos: Pos) -> i64 {
        pos.0 as i64 - F::GHOSTS as i64
    }

    /// Payload size of the record at `pos`, in bytes. Ghosts have none.
    #[must_use]
    pub fn payload_size(&self, pos: Pos) -> i64 {
        if self.index_of(pos) < 0 {
            return 0;
        }
        let start = self.get(self.prev(pos)).end() + F::HEADER_SIZE;
        self.get(pos).end() - start
    }

    /// Append a header read from disk.
    ///
    /// Appending may move the frames in memory; positions remain valid,
    /// references do not.
    pub fn append(&mut self, frame: F) -> Result<()> {
        self.frames
            .try_reserve(1)
            .map_err(|_| StrataError::runtime("record index: unable to store header"))?;
        self.frames.push(frame);
        Ok(())
    }

    /// Check if the logical offset `n` is already indexed. If it is,
    /// [`find`](Self::find) is defined and returns the right record.
    #[must_use]
    pub fn contains(&self, n: i64) -> bool {
        let last = self.last();
        n < self.addr.logical(self.get(last).end(), self.index_of(last))
    }

    /// True when the logical offset `n` falls within the record at `pos`.
    #[must_use]
    pub fn in_record(&self, n: i64, pos: Pos) -> bool {
        let record = self.index_of(pos);
        if record < 0 {
            return false;
        }
        let end = self.addr.logical(self.get(pos).end(), record);
        let begin = self.addr.logical(self.get(self.prev(pos)).end(), record - 1);
        n >= begin && n < end
    }

    /// Find the record containing the logical offset `n`.
    ///
    /// The hint is checked first: a real-world usage pattern is a lot of
    /// small forward seeks within the same record, and those never have to
    /// look at the rest of the index.
    ///
    /// The full lookup runs in two phases. Phase 1 is an approximating
    /// binary search that pretends logical and physical offsets are the
    /// same; since a physical offset is never smaller than its logical
    /// counterpart, the candidate it finds is the right record or one
    /// before it. Phase 2 walks forward from the candidate computing the
    /// true logical upper bound of each record, which needs the record
    /// number and is therefore out of reach of the binary search. With
    /// reasonable record sizes phase 2 does very few hops.
    ///
    /// Callers must check [`contains`](Self::contains) first; an offset
    /// beyond the index is reported as a runtime error.
    pub fn find(&self, n: i64, hint: Pos) -> Result<Pos> {
        debug_assert!(n >= 0);
        if self.in_record(n, hint) {
            return Ok(hint);
        }

        // phase 1
        let real = &self.frames[F::GHOSTS..];
        let candidate = real.partition_point(|f| self.addr.logical(f.end(), 0) <= n);

        // phase 2
        let mut pos = Pos(F::GHOSTS + candidate);
        while pos.0 < self.frames.len() {
            if n < self.addr.logical(self.get(pos).end(), self.index_of(pos)) {
                return Ok(pos);
            }
            pos = Pos(pos.0 + 1);
        }

        let last_byte = self.get(self.last()).end();
        Err(StrataError::runtime(format!(
            "record index: offset (= {n}) not in index, last indexed byte (= {last_byte})"
        )))
    }
}
