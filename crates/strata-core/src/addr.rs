/// Address translator between physical and logical offsets.
///
/// Physical offsets are the ones reported by the underlying layer; logical
/// offsets are the ones presented to the user, in the byte stream with no
/// interleaved headers. Translating in either direction needs to know how
/// many headers precede the address, so both functions take the 0-based
/// record number the address falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressMap {
    zero: i64,
    header_size: i64,
}

impl AddressMap {
    /// Create a map with the given base offset and per-record header size.
    #[must_use]
    pub const fn new(zero: i64, header_size: i64) -> Self {
        Self { zero, header_size }
    }

    /// The logical address of the physical address `addr` within record
    /// number `record`. A record number of -1 refers to the ghost node and
    /// makes the base offset translate to logical 0.
    #[must_use]
    pub const fn logical(&self, addr: i64, record: i64) -> i64 {
        addr - self.header_size * (record + 1) - self.zero
    }

    /// The physical address of the logical address `addr` within record
    /// number `record`.
    ///
    /// Assumes the logical address actually falls within that record.
    #[must_use]
    pub const fn physical(&self, addr: i64, record: i64) -> i64 {
        addr + self.header_size * (record + 1) + self.zero
    }

    /// Base address of the map, i.e. the first possible physical address.
    /// Usually, but not necessarily, zero.
    #[must_use]
    pub const fn base(&self) -> i64 {
        self.zero
    }
}
