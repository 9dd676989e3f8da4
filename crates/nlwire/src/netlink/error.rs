//! Error types for netlink operations.

use std::io;

use super::attr::AttrDataType;

/// Result type for netlink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building, sending, receiving or parsing
/// netlink messages.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error from socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Kernel returned an error code in an `NLMSG_ERROR` message.
    #[error("kernel error: {message} (errno {errno})")]
    Kernel {
        /// The errno value from the kernel (positive).
        errno: i32,
        /// Portable classification of `errno`.
        kind: ErrorKind,
        /// Human-readable error message.
        message: String,
    },

    /// Kernel error with operation context.
    #[error("{operation}: {message} (errno {errno})")]
    KernelWithContext {
        /// The operation that failed.
        operation: String,
        /// The errno value from the kernel (positive).
        errno: i32,
        /// Portable classification of `errno`.
        kind: ErrorKind,
        /// Human-readable error message.
        message: String,
    },

    /// Fewer bytes were available than a fixed-size structure needs.
    #[error("message truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Expected length.
        expected: usize,
        /// Bytes actually available.
        actual: usize,
    },

    /// A message header declares a length the buffer cannot back.
    #[error("invalid message length {declared} ({available} bytes available)")]
    MessageLength {
        /// Length from `nlmsg_len`.
        declared: usize,
        /// Bytes remaining in the buffer.
        available: usize,
    },

    /// An attribute header declares a length its container cannot back.
    #[error("invalid attribute length {declared} ({available} bytes available)")]
    AttrLength {
        /// Length from `nla_len`.
        declared: usize,
        /// Bytes remaining in the container.
        available: usize,
    },

    /// Invalid message format.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Attribute payload too short for the requested value.
    #[error("invalid attribute: {0}")]
    InvalidAttribute(String),

    /// Attribute failed validation against an expected data type.
    #[error("attribute {attr_type} is not a valid {data_type:?}: {reason}")]
    Validation {
        /// Attribute type, flags masked off.
        attr_type: u16,
        /// The data type it was checked against.
        data_type: AttrDataType,
        /// What was wrong with it.
        reason: ValidationFailure,
    },

    /// Sequence number mismatch.
    #[error("sequence mismatch: expected {expected}, got {actual}")]
    SequenceMismatch {
        /// Expected sequence number.
        expected: u32,
        /// Actual sequence number received.
        actual: u32,
    },

    /// Port ID mismatch.
    #[error("port id mismatch: expected {expected}, got {actual}")]
    PortIdMismatch {
        /// Expected port ID.
        expected: u32,
        /// Actual port ID received.
        actual: u32,
    },

    /// The kernel flagged the dump as inconsistent (`NLM_F_DUMP_INTR`).
    #[error("dump was interrupted, results may be inconsistent")]
    DumpInterrupted,

    /// The kernel dropped messages (`NLMSG_OVERRUN`).
    #[error("netlink receive overrun, data was lost")]
    Overrun,

    /// Not enough room in the message buffer.
    #[error("buffer full: need {needed} bytes, capacity is {capacity}")]
    BufferFull {
        /// Bytes the write would have needed.
        needed: usize,
        /// Total buffer capacity.
        capacity: usize,
    },

    /// Attribute does not fit the 16-bit length field.
    #[error("attribute too large: {len} bytes")]
    AttrTooLarge {
        /// Attribute length including header.
        len: usize,
    },
}

/// Reason an attribute failed [`Attr::validate`](super::attr::Attr::validate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationFailure {
    /// Payload shorter than the type requires.
    #[error("payload too short: expected {expected} bytes, got {actual}")]
    TooShort {
        /// Required payload length.
        expected: usize,
        /// Actual payload length.
        actual: usize,
    },

    /// Payload longer than the type allows.
    #[error("payload too long: expected {expected} bytes, got {actual}")]
    TooLong {
        /// Allowed payload length.
        expected: usize,
        /// Actual payload length.
        actual: usize,
    },

    /// String payload is empty.
    #[error("empty payload")]
    Empty,

    /// Flag carries a payload.
    #[error("flag carries {actual} payload bytes")]
    NotEmpty {
        /// Actual payload length.
        actual: usize,
    },

    /// NUL-terminated string without terminator.
    #[error("missing NUL terminator")]
    NotTerminated,

    /// Nested payload is not a well-formed attribute stream.
    #[error("malformed nested attributes")]
    MalformedNest,
}

impl ValidationFailure {
    fn errno(self) -> i32 {
        match self {
            Self::NotTerminated => libc::EINVAL,
            _ => libc::ERANGE,
        }
    }
}

/// Portable classification of platform error codes.
///
/// Netlink error frames carry raw errno values whose numbering differs
/// between platforms. Callers that only need to branch on the broad class
/// of failure match on this instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    PermissionDenied,
    NotFound,
    AlreadyExists,
    Busy,
    Interrupted,
    Io,
    InvalidArgument,
    OutOfRange,
    NotSupported,
    NoBufferSpace,
    Protocol,
    Other,
}

/// Platform errno to [`ErrorKind`].
const ERRNO_KINDS: &[(i32, ErrorKind)] = &[
    (libc::EPERM, ErrorKind::PermissionDenied),
    (libc::EACCES, ErrorKind::PermissionDenied),
    (libc::ENOENT, ErrorKind::NotFound),
    (libc::ENODEV, ErrorKind::NotFound),
    (libc::ESRCH, ErrorKind::NotFound),
    (libc::EEXIST, ErrorKind::AlreadyExists),
    (libc::EBUSY, ErrorKind::Busy),
    (libc::EINTR, ErrorKind::Interrupted),
    (libc::EIO, ErrorKind::Io),
    (libc::EINVAL, ErrorKind::InvalidArgument),
    (libc::ERANGE, ErrorKind::OutOfRange),
    (libc::EOPNOTSUPP, ErrorKind::NotSupported),
    (libc::ENOSPC, ErrorKind::NoBufferSpace),
    (libc::ENOBUFS, ErrorKind::NoBufferSpace),
    (libc::EPROTO, ErrorKind::Protocol),
    (libc::EBADMSG, ErrorKind::Protocol),
];

impl ErrorKind {
    /// Classify a (positive) errno value.
    pub fn from_errno(errno: i32) -> Self {
        ERRNO_KINDS
            .iter()
            .find(|(code, _)| *code == errno)
            .map(|(_, kind)| *kind)
            .unwrap_or(ErrorKind::Other)
    }
}

impl Error {
    /// Create a kernel error from the error field of an `NLMSG_ERROR`.
    ///
    /// The kernel sends negative errno values; positive values are accepted
    /// as well.
    pub fn from_errno(errno: i32) -> Self {
        let errno = errno.saturating_abs();
        let message = io::Error::from_raw_os_error(errno).to_string();
        Self::Kernel {
            errno,
            kind: ErrorKind::from_errno(errno),
            message,
        }
    }

    /// Create a kernel error with operation context.
    pub fn from_errno_with_context(errno: i32, operation: impl Into<String>) -> Self {
        Self::from_errno(errno).with_context(operation)
    }

    /// Add context to this error.
    ///
    /// Wraps kernel errors with operation context. Other errors are returned unchanged.
    pub fn with_context(self, operation: impl Into<String>) -> Self {
        match self {
            Self::Kernel {
                errno,
                kind,
                message,
            } => Self::KernelWithContext {
                operation: operation.into(),
                errno,
                kind,
                message,
            },
            other => other,
        }
    }

    /// The errno equivalent of this error.
    ///
    /// Kernel errors report the kernel's code, I/O errors their OS code, and
    /// codec errors the value a C netlink library would have set.
    pub fn errno(&self) -> Option<i32> {
        match self {
            Self::Kernel { errno, .. } | Self::KernelWithContext { errno, .. } => Some(*errno),
            Self::Io(e) => e.raw_os_error(),
            Self::Truncated { .. } | Self::MessageLength { .. } | Self::AttrLength { .. } => {
                Some(libc::EBADMSG)
            }
            Self::InvalidMessage(_) | Self::InvalidAttribute(_) => Some(libc::EINVAL),
            Self::Validation { reason, .. } => Some(reason.errno()),
            Self::SequenceMismatch { .. } => Some(libc::EPROTO),
            Self::PortIdMismatch { .. } => Some(libc::ESRCH),
            Self::DumpInterrupted => Some(libc::EINTR),
            Self::Overrun => Some(libc::ENOBUFS),
            Self::BufferFull { .. } => Some(libc::ENOSPC),
            Self::AttrTooLarge { .. } => Some(libc::ERANGE),
        }
    }

    /// Portable classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Kernel { kind, .. } | Self::KernelWithContext { kind, .. } => *kind,
            other => other
                .errno()
                .map(ErrorKind::from_errno)
                .unwrap_or(ErrorKind::Other),
        }
    }

    /// Check if this is a "not found" error (ENOENT, ENODEV, etc.).
    pub fn is_not_found(&self) -> bool {
        self.is_kernel() && self.kind() == ErrorKind::NotFound
    }

    /// Check if this is a permission error (EPERM, EACCES).
    pub fn is_permission_denied(&self) -> bool {
        self.is_kernel() && self.kind() == ErrorKind::PermissionDenied
    }

    /// Check if this is an "already exists" error (EEXIST).
    pub fn is_already_exists(&self) -> bool {
        self.is_kernel() && self.kind() == ErrorKind::AlreadyExists
    }

    /// Check if this is a "device busy" error (EBUSY).
    pub fn is_busy(&self) -> bool {
        self.is_kernel() && self.kind() == ErrorKind::Busy
    }

    fn is_kernel(&self) -> bool {
        matches!(self, Self::Kernel { .. } | Self::KernelWithContext { .. })
    }
}
