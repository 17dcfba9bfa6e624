use strata_error::{Result, StrataError};

use crate::index::{Frame, Pos, RecordIndex};

/// Cursor over a [`RecordIndex`], tracking the current record and how many
/// payload bytes are left to consume in it.
///
/// The head holds a stable position plus a byte count and nothing else;
/// everything derived (payload bounds, the physical tell) is recomputed
/// from the index on demand, so a head is never invalidated by the index
/// growing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadHead {
    pos: Pos,
    remaining: i64,
}

impl ReadHead {
    /// The head on a ghost node, used as the initial state: zero bytes
    /// remaining, positioned so the first real record is entered through
    /// the same path as any later record transition.
    #[must_use]
    pub const fn ghost(pos: Pos) -> Self {
        Self { pos, remaining: 0 }
    }

    /// The position of the current record.
    #[must_use]
    pub const fn pos(&self) -> Pos {
        self.pos
    }

    /// True when the current record is exhausted.
    #[must_use]
    pub const fn exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Payload bytes left to consume in the current record.
    #[must_use]
    pub const fn bytes_left(&self) -> i64 {
        self.remaining
    }

    /// Consume `n` bytes of the current record.
    pub fn advance(&mut self, n: i64) -> Result<()> {
        debug_assert!(n >= 0);
        if n > self.remaining {
            return Err(StrataError::invalid_args(
                "advancing read head past end-of-record",
            ));
        }
        self.remaining -= n;
        Ok(())
    }

    /// Skip to the end of the current record.
    pub fn skip(&mut self) {
        self.remaining = 0;
    }

    /// Reposition to the start of the record at `pos`.
    ///
    /// The new state is computed from `pos` and its neighbours alone; the
    /// head's previous position is never consulted.
    pub fn move_to<F: Frame>(&mut self, index: &RecordIndex<F>, pos: Pos) {
        self.pos = pos;
        self.remaining = index.payload_size(pos);
    }

    /// A head at the start of the adjacent record. Must not be called on
    /// the last indexed record.
    #[must_use]
    pub fn next_record<F: Frame>(&self, index: &RecordIndex<F>) -> Self {
        debug_assert!(self.pos != index.last());
        let mut next = *self;
        next.move_to(index, Pos(self.pos.0 + 1));
        next
    }

    /// The physical offset of the head. Corresponds to the offset the
    /// underlying layer reports when the two are in step.
    #[must_use]
    pub fn tell<F: Frame>(&self, index: &RecordIndex<F>) -> i64 {
        index.get(self.pos).end() - self.remaining
    }
}
