use thiserror::Error;

/// Primary error type for strata operations.
///
/// Structured variants for the conditions a protocol stack can hit, with a
/// stable mapping onto the numeric [`Status`] codes of the public surface.
/// Error messages are human readable and not suited for parsing.
#[derive(Error, Debug)]
pub enum StrataError {
    /// Functionality is not implemented by this layer.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// The operation requires an inner layer, and leaf handles own none.
    #[error("{op}: not supported for leaf handles")]
    LeafProtocol { op: &'static str },

    /// Implemented and supported in general, but not for this handle's
    /// configuration. The classic case is seek or tell on a pipe.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// A problem with the physical device; a read or write could not be
    /// performed correctly.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error *from* the runtime, such as failing to grow the record
    /// index, as opposed to an error at runtime.
    #[error("runtime error: {0}")]
    Runtime(String),

    /// An invalid argument, such as seeking beyond what the handle can
    /// address.
    #[error("invalid argument: {0}")]
    InvalidArgs(String),

    /// A fatal, unrecoverable protocol error. The reads themselves
    /// succeeded, but the bytes are inconsistent with what the framing
    /// expects.
    #[error("protocol error: {0}")]
    ProtocolFatal(String),

    /// Recovery from an earlier protocol violation was in progress, and
    /// another violation occurred.
    #[error("protocol recovery failed: {0}")]
    FailedRecovery(String),

    /// The underlying handle reported end-of-file while an outer framing
    /// layer expected there to be more data.
    #[error("unexpected end of file: {0}")]
    UnexpectedEof(String),
}

/// Status codes for the public surface.
///
/// Every public operation maps its outcome onto one of these. The numeric
/// values are stable within a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Status {
    /// Successful result.
    Ok = 0,
    /// Successful but incomplete, e.g. a read against a blocked pipe.
    OkIncomplete = 1,
    /// Functionality not implemented by this handle.
    NotImplemented = 2,
    /// Implemented in general, but not for leaf handles.
    LeafProtocol = 3,
    /// Implemented in general, but not for this handle's configuration.
    NotSupported = 4,
    /// An implementation failure escaped the library boundary.
    UnhandledException = 5,
    /// A problem with the physical device.
    IoError = 6,
    /// An error from the runtime, e.g. an allocation failure.
    RuntimeError = 7,
    /// An invalid argument was passed.
    InvalidArgs = 8,
    /// Fatal, unrecoverable protocol violation.
    ProtocolFatalError = 9,
    /// A protocol violation was patched in memory; data keeps flowing but
    /// came from a repaired stream.
    ProtocolTryRecovery = 10,
    /// More violations occurred while recovery was already in progress.
    ProtocolFailedRecovery = 11,
    /// End-of-file was reached during the operation.
    Eof = 12,
    /// End-of-file was reached although the framing declared more data.
    UnexpectedEof = 13,
}

impl StrataError {
    /// Map this error to its public status code.
    #[must_use]
    pub const fn status(&self) -> Status {
        match self {
            Self::NotImplemented(_) => Status::NotImplemented,
            Self::LeafProtocol { .. } => Status::LeafProtocol,
            Self::NotSupported(_) => Status::NotSupported,
            Self::Io(_) => Status::IoError,
            Self::Runtime(_) => Status::RuntimeError,
            Self::InvalidArgs(_) => Status::InvalidArgs,
            Self::ProtocolFatal(_) => Status::ProtocolFatalError,
            Self::FailedRecovery(_) => Status::ProtocolFailedRecovery,
            Self::UnexpectedEof(_) => Status::UnexpectedEof,
        }
    }

    /// Whether the framing bytes themselves were inconsistent, as opposed
    /// to the device or the caller being at fault.
    #[must_use]
    pub const fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::ProtocolFatal(_) | Self::FailedRecovery(_) | Self::UnexpectedEof(_)
        )
    }

    /// Get the process exit code for this error (for CLI use).
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        self.status() as i32
    }

    /// Create a not-implemented error.
    pub fn not_implemented(what: impl Into<String>) -> Self {
        Self::NotImplemented(what.into())
    }

    /// Create a leaf-protocol error for the named operation.
    #[must_use]
    pub const fn leaf_protocol(op: &'static str) -> Self {
        Self::LeafProtocol { op }
    }

    /// Create a not-supported error.
    pub fn not_supported(detail: impl Into<String>) -> Self {
        Self::NotSupported(detail.into())
    }

    /// Create a runtime error.
    pub fn runtime(detail: impl Into<String>) -> Self {
        Self::Runtime(detail.into())
    }

    /// Create an I/O error from a bare message, for device-level failures
    /// that did not originate in a [`std::io::Error`].
    pub fn io(detail: impl Into<String>) -> Self {
        Self::Io(std::io::Error::other(detail.into()))
    }

    /// Create an invalid-argument error.
    pub fn invalid_args(detail: impl Into<String>) -> Self {
        Self::InvalidArgs(detail.into())
    }

    /// Create a fatal protocol error.
    pub fn protocol_fatal(detail: impl Into<String>) -> Self {
        Self::ProtocolFatal(detail.into())
    }

    /// Create a failed-recovery error.
    pub fn failed_recovery(detail: impl Into<String>) -> Self {
        Self::FailedRecovery(detail.into())
    }

    /// Create an unexpected end-of-file error.
    pub fn unexpected_eof(detail: impl Into<String>) -> Self {
        Self::UnexpectedEof(detail.into())
    }
}

/// Result type alias using [`StrataError`].
pub type Result<T> = std::result::Result<T, StrataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = StrataError::protocol_fatal("next (= 4) <= prev (= 8)");
        assert_eq!(err.to_string(), "protocol error: next (= 4) <= prev (= 8)");
    }

    #[test]
    fn error_display_leaf() {
        let err = StrataError::leaf_protocol("peel");
        assert_eq!(err.to_string(), "peel: not supported for leaf handles");
    }

    #[test]
    fn error_display_unexpected_eof() {
        let err = StrataError::unexpected_eof("got 3 bytes");
        assert_eq!(err.to_string(), "unexpected end of file: got 3 bytes");
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            StrataError::not_implemented("seek").status(),
            Status::NotImplemented
        );
        assert_eq!(
            StrataError::leaf_protocol("peek").status(),
            Status::LeafProtocol
        );
        assert_eq!(
            StrataError::not_supported("tell on a pipe").status(),
            Status::NotSupported
        );
        assert_eq!(StrataError::runtime("oom").status(), Status::RuntimeError);
        assert_eq!(
            StrataError::invalid_args("n < 0").status(),
            Status::InvalidArgs
        );
        assert_eq!(
            StrataError::protocol_fatal("bad magic").status(),
            Status::ProtocolFatalError
        );
        assert_eq!(
            StrataError::failed_recovery("second anomaly").status(),
            Status::ProtocolFailedRecovery
        );
        assert_eq!(
            StrataError::unexpected_eof("truncated").status(),
            Status::UnexpectedEof
        );
    }

    #[test]
    fn status_values_are_stable() {
        assert_eq!(Status::Ok as i32, 0);
        assert_eq!(Status::OkIncomplete as i32, 1);
        assert_eq!(Status::NotImplemented as i32, 2);
        assert_eq!(Status::LeafProtocol as i32, 3);
        assert_eq!(Status::NotSupported as i32, 4);
        assert_eq!(Status::UnhandledException as i32, 5);
        assert_eq!(Status::IoError as i32, 6);
        assert_eq!(Status::RuntimeError as i32, 7);
        assert_eq!(Status::InvalidArgs as i32, 8);
        assert_eq!(Status::ProtocolFatalError as i32, 9);
        assert_eq!(Status::ProtocolTryRecovery as i32, 10);
        assert_eq!(Status::ProtocolFailedRecovery as i32, 11);
        assert_eq!(Status::Eof as i32, 12);
        assert_eq!(Status::UnexpectedEof as i32, 13);
    }

    #[test]
    fn is_protocol_error() {
        assert!(StrataError::protocol_fatal("x").is_protocol_error());
        assert!(StrataError::failed_recovery("x").is_protocol_error());
        assert!(StrataError::unexpected_eof("x").is_protocol_error());
        assert!(!StrataError::invalid_args("x").is_protocol_error());
        assert!(!StrataError::runtime("x").is_protocol_error());
    }

    #[test]
    fn io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: StrataError = io_err.into();
        assert!(matches!(err, StrataError::Io(_)));
        assert_eq!(err.status(), Status::IoError);
    }

    #[test]
    fn exit_code() {
        assert_eq!(StrataError::invalid_args("x").exit_code(), 8);
        assert_eq!(StrataError::protocol_fatal("x").exit_code(), 9);
        assert_eq!(StrataError::unexpected_eof("x").exit_code(), 13);
    }
}
