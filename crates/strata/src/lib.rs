//! Stackable byte-stream protocols for layered well-log file formats.
//!
//! Scientific and well-log files are often wrapped in one or more
//! transparent encapsulation formats: record-framing headers layered
//! around a payload. This crate opens a leaf source (a physical file or an
//! in-memory buffer), wraps it in zero or more framing layers, and exposes
//! a logical byte stream that omits the framing bytes. Reads, seeks, and
//! tells on the outermost handle behave as if the framing were absent.
//!
//! Two framing protocols are provided: [`TapeImage`] (12-byte headers with
//! previous/next pointers and a terminating tape mark) and
//! [`VisibleEnvelope`] (4-byte headers carrying a record length and a
//! format version). Layers compose freely; a tape-image file whose payload
//! is itself visible-envelope framed is read by stacking the two.
//!
//! ```
//! use strata::{Handle, MemorySource, ReadStatus, TapeImage};
//!
//! // A tape-image file with one 8-byte record and its tape marks.
//! let mut file = Vec::new();
//! file.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 0, 20, 0, 0, 0]);
//! file.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
//! file.extend_from_slice(&[1, 0, 0, 0, 0, 0, 0, 0, 32, 0, 0, 0]);
//!
//! let mut tif = TapeImage::open(MemorySource::with_contents(file));
//! let mut payload = [0u8; 8];
//! let (n, status) = tif.read(&mut payload)?;
//! assert_eq!(n, 8);
//! assert_eq!(status, ReadStatus::Full);
//! assert_eq!(payload, [1, 2, 3, 4, 5, 6, 7, 8]);
//! # Ok::<(), strata::StrataError>(())
//! ```
//!
//! Reading a framed file never writes to it, and a single handle is not
//! meant for concurrent use; see the individual types for the contract
//! details.

pub use strata_core::{
    AddressMap, FileSource, Frame, Handle, MemorySource, Pos, ReadHead, ReadStatus, RecordIndex,
};
pub use strata_envelope::VisibleEnvelope;
pub use strata_error::{Result, Status, StrataError};
pub use strata_tape::TapeImage;
