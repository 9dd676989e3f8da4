//! Netlink message header, framing and iteration.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::attr::AttrIter;
use super::error::{Error, Result};

/// Netlink message header alignment.
pub const NLMSG_ALIGNTO: usize = 4;

/// Align a length to NLMSG_ALIGNTO boundary.
#[inline]
pub const fn nlmsg_align(len: usize) -> usize {
    (len + NLMSG_ALIGNTO - 1) & !(NLMSG_ALIGNTO - 1)
}

/// Size of the netlink message header.
pub const NLMSG_HDRLEN: usize = nlmsg_align(std::mem::size_of::<NlMsgHdr>());

/// Message types below this value are reserved for control messages.
pub const NLMSG_MIN_TYPE: u16 = 0x10;

/// Length a message with `payload_len` payload bytes declares in its header.
///
/// The declared length is not padded; only the spacing between messages is.
#[inline]
pub const fn nlmsg_size(payload_len: usize) -> usize {
    NLMSG_HDRLEN + payload_len
}

/// Bytes a message with `payload_len` payload bytes occupies in a buffer,
/// trailing padding included.
#[inline]
pub const fn nlmsg_total_size(payload_len: usize) -> usize {
    nlmsg_align(nlmsg_size(payload_len))
}

/// Netlink message header (mirrors struct nlmsghdr).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct NlMsgHdr {
    /// Length of message including header.
    pub nlmsg_len: u32,
    /// Message type.
    pub nlmsg_type: u16,
    /// Additional flags.
    pub nlmsg_flags: u16,
    /// Sequence number.
    pub nlmsg_seq: u32,
    /// Sending process port ID.
    pub nlmsg_pid: u32,
}

impl NlMsgHdr {
    /// Create a new message header.
    pub fn new(msg_type: u16, flags: u16) -> Self {
        Self {
            nlmsg_len: NLMSG_HDRLEN as u32,
            nlmsg_type: msg_type,
            nlmsg_flags: flags,
            nlmsg_seq: 0,
            nlmsg_pid: 0,
        }
    }

    /// Get the payload length (total length minus header).
    ///
    /// Fails if the declared length cannot even hold the header.
    pub fn payload_len(&self) -> Result<usize> {
        (self.nlmsg_len as usize)
            .checked_sub(NLMSG_HDRLEN)
            .ok_or(Error::MessageLength {
                declared: self.nlmsg_len as usize,
                available: NLMSG_HDRLEN,
            })
    }

    /// Check if this is a control message (type below [`NLMSG_MIN_TYPE`]).
    pub fn is_control(&self) -> bool {
        self.nlmsg_type < NLMSG_MIN_TYPE
    }

    /// Check if this is an error message.
    pub fn is_error(&self) -> bool {
        self.nlmsg_type == NlMsgType::ERROR
    }

    /// Check if this is a done message.
    pub fn is_done(&self) -> bool {
        self.nlmsg_type == NlMsgType::DONE
    }

    /// Check if this message has the multi flag.
    pub fn is_multi(&self) -> bool {
        self.nlmsg_flags & NLM_F_MULTI != 0
    }

    /// Check if the kernel flagged the dump this message belongs to as
    /// interrupted.
    pub fn is_dump_interrupted(&self) -> bool {
        self.nlmsg_flags & NLM_F_DUMP_INTR != 0
    }

    /// Check the sequence number against the expected one.
    ///
    /// Zero on either side is a wildcard: kernel notifications carry
    /// sequence 0, and an expected sequence of 0 disables the check.
    pub fn seq_ok(&self, seq: u32) -> bool {
        self.nlmsg_seq == 0 || seq == 0 || self.nlmsg_seq == seq
    }

    /// Check the port ID against the expected one, with the same wildcard
    /// rule as [`seq_ok`](Self::seq_ok).
    pub fn port_id_ok(&self, port_id: u32) -> bool {
        self.nlmsg_pid == 0 || port_id == 0 || self.nlmsg_pid == port_id
    }

    /// Convert header to bytes.
    pub fn as_bytes(&self) -> &[u8] {
        <Self as IntoBytes>::as_bytes(self)
    }

    /// Read a header from the start of `data`.
    pub fn read(data: &[u8]) -> Result<Self> {
        Self::read_from_prefix(data)
            .map(|(hdr, _)| hdr)
            .map_err(|_| Error::Truncated {
                expected: std::mem::size_of::<Self>(),
                actual: data.len(),
            })
    }
}

/// Standard netlink control message types.
pub struct NlMsgType;

impl NlMsgType {
    /// No operation, message must be discarded.
    pub const NOOP: u16 = 1;
    /// Error message or ACK.
    pub const ERROR: u16 = 2;
    /// End of multipart message.
    pub const DONE: u16 = 3;
    /// Data lost, request resend.
    pub const OVERRUN: u16 = 4;
}

/// Netlink message flags.
pub const NLM_F_REQUEST: u16 = 0x01;
pub const NLM_F_MULTI: u16 = 0x02;
pub const NLM_F_ACK: u16 = 0x04;
pub const NLM_F_ECHO: u16 = 0x08;
pub const NLM_F_DUMP_INTR: u16 = 0x10;
pub const NLM_F_DUMP_FILTERED: u16 = 0x20;

// Modifiers to GET request
pub const NLM_F_ROOT: u16 = 0x100;
pub const NLM_F_MATCH: u16 = 0x200;
pub const NLM_F_ATOMIC: u16 = 0x400;
pub const NLM_F_DUMP: u16 = NLM_F_ROOT | NLM_F_MATCH;

// Modifiers to NEW request
pub const NLM_F_REPLACE: u16 = 0x100;
pub const NLM_F_EXCL: u16 = 0x200;
pub const NLM_F_CREATE: u16 = 0x400;
pub const NLM_F_APPEND: u16 = 0x800;

// Flags for ACK message
pub const NLM_F_CAPPED: u16 = 0x100;
pub const NLM_F_ACK_TLVS: u16 = 0x200;

/// Extended ACK attribute carrying a human-readable error string.
pub const NLMSGERR_ATTR_MSG: u16 = 1;

/// Check that `buf` starts with a complete, well-framed message.
///
/// True iff a header fits and its declared length is at least the header
/// size and at most `buf.len()`.
pub fn nlmsg_ok(buf: &[u8]) -> bool {
    match NlMsgHdr::read(buf) {
        Ok(hdr) => {
            let len = hdr.nlmsg_len as usize;
            len >= NLMSG_HDRLEN && len <= buf.len()
        }
        Err(_) => false,
    }
}

/// A validated view of one netlink message inside a caller buffer.
#[derive(Debug, Clone, Copy)]
pub struct Message<'a> {
    header: NlMsgHdr,
    /// Exactly `nlmsg_len` bytes, header included.
    bytes: &'a [u8],
}

impl<'a> Message<'a> {
    /// Parse the message at the start of `buf`.
    ///
    /// Fails unless the declared length covers the header and fits in `buf`.
    pub fn parse(buf: &'a [u8]) -> Result<Self> {
        let header = NlMsgHdr::read(buf)?;
        let len = header.nlmsg_len as usize;
        if len < NLMSG_HDRLEN || len > buf.len() {
            return Err(Error::MessageLength {
                declared: len,
                available: buf.len(),
            });
        }
        Ok(Self {
            header,
            bytes: &buf[..len],
        })
    }

    /// The message header.
    pub fn header(&self) -> &NlMsgHdr {
        &self.header
    }

    /// Message type.
    pub fn msg_type(&self) -> u16 {
        self.header.nlmsg_type
    }

    /// Message flags.
    pub fn flags(&self) -> u16 {
        self.header.nlmsg_flags
    }

    /// Sequence number.
    pub fn seq(&self) -> u32 {
        self.header.nlmsg_seq
    }

    /// Port ID.
    pub fn port_id(&self) -> u32 {
        self.header.nlmsg_pid
    }

    /// Declared length, header included.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True if the message has no payload.
    pub fn is_empty(&self) -> bool {
        self.bytes.len() == NLMSG_HDRLEN
    }

    /// The whole message, header included.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// The payload following the header.
    pub fn payload(&self) -> &'a [u8] {
        &self.bytes[NLMSG_HDRLEN..]
    }

    /// Payload length.
    pub fn payload_len(&self) -> usize {
        self.bytes.len() - NLMSG_HDRLEN
    }

    /// The payload starting `offset` bytes in, with `offset` rounded up to
    /// the alignment boundary.
    ///
    /// Used to skip a subsystem's fixed sub-header.
    pub fn payload_at(&self, offset: usize) -> Result<&'a [u8]> {
        let payload = self.payload();
        let start = nlmsg_align(offset);
        payload.get(start..).ok_or(Error::Truncated {
            expected: start,
            actual: payload.len(),
        })
    }

    /// Read a fixed sub-header from the start of the payload.
    pub fn extra_header<T: FromBytes>(&self) -> Result<T> {
        let payload = self.payload();
        T::read_from_prefix(payload)
            .map(|(hdr, _)| hdr)
            .map_err(|_| Error::Truncated {
                expected: std::mem::size_of::<T>(),
                actual: payload.len(),
            })
    }

    /// Iterate the attributes following a sub-header of `offset` bytes.
    pub fn attrs(&self, offset: usize) -> Result<AttrIter<'a>> {
        self.payload_at(offset).map(AttrIter::new)
    }

    /// Decode the payload of an `NLMSG_ERROR` message.
    pub fn error(&self) -> Result<NlMsgError> {
        NlMsgError::read(self.payload())
    }

    /// The extended ACK error string of an `NLMSG_ERROR` message, if the
    /// kernel attached one.
    pub fn ext_ack_message(&self) -> Option<&'a str> {
        if self.flags() & NLM_F_ACK_TLVS == 0 {
            return None;
        }
        let err = self.error().ok()?;
        // Without NLM_F_CAPPED the kernel echoes the whole request.
        let echoed = if self.flags() & NLM_F_CAPPED != 0 {
            NLMSG_HDRLEN
        } else {
            // A bogus echoed length must not overflow the alignment.
            nlmsg_align((err.msg.nlmsg_len as usize).min(self.payload().len()))
        };
        let offset = std::mem::size_of::<i32>() + echoed;
        let tlvs = self.payload().get(offset..)?;
        AttrIter::new(tlvs)
            .map_while(|attr| attr.ok())
            .find(|attr| attr.kind() == NLMSGERR_ATTR_MSG && attr.payload_len() >= 1)
            .and_then(|attr| attr.get_str_nul().ok())
    }
}

/// Iterator over netlink messages in a buffer.
///
/// Stops after the first malformed message, yielding its error once.
#[derive(Debug, Clone)]
pub struct MessageIter<'a> {
    data: &'a [u8],
}

impl<'a> MessageIter<'a> {
    /// Create a new message iterator.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len()
    }
}

impl<'a> Iterator for MessageIter<'a> {
    type Item = Result<Message<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.is_empty() {
            return None;
        }

        let msg = match Message::parse(self.data) {
            Ok(msg) => msg,
            Err(e) => {
                self.data = &[];
                return Some(Err(e));
            }
        };

        // The last message may omit its trailing padding.
        let aligned_len = nlmsg_align(msg.len()).min(self.data.len());
        self.data = &self.data[aligned_len..];

        Some(Ok(msg))
    }
}

impl std::iter::FusedIterator for MessageIter<'_> {}

/// Netlink error message payload.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct NlMsgError {
    /// Error code (negative errno or 0 for ACK).
    pub error: i32,
    /// Original message header that caused the error.
    pub msg: NlMsgHdr,
}

impl NlMsgError {
    /// Read an error payload.
    pub fn read(data: &[u8]) -> Result<Self> {
        Self::read_from_prefix(data)
            .map(|(err, _)| err)
            .map_err(|_| Error::Truncated {
                expected: std::mem::size_of::<Self>(),
                actual: data.len(),
            })
    }

    /// Check if this is an ACK (no error).
    pub fn is_ack(&self) -> bool {
        self.error == 0
    }

    /// Convert to bytes.
    pub fn as_bytes(&self) -> &[u8] {
        <Self as IntoBytes>::as_bytes(self)
    }
}
