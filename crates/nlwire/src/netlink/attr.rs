//! Netlink attribute (rtattr/nlattr) handling.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::error::{Error, Result, ValidationFailure};

/// Netlink attribute alignment.
pub const NLA_ALIGNTO: usize = 4;

/// Align a length to NLA_ALIGNTO boundary.
#[inline]
pub const fn nla_align(len: usize) -> usize {
    (len + NLA_ALIGNTO - 1) & !(NLA_ALIGNTO - 1)
}

/// Size of the attribute header.
pub const NLA_HDRLEN: usize = nla_align(std::mem::size_of::<NlAttr>());

/// Netlink attribute header (mirrors struct nlattr / struct rtattr).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct NlAttr {
    /// Length including header.
    pub nla_len: u16,
    /// Attribute type.
    pub nla_type: u16,
}

/// Attribute type flags.
pub const NLA_F_NESTED: u16 = 1 << 15;
pub const NLA_F_NET_BYTEORDER: u16 = 1 << 14;
pub const NLA_TYPE_MASK: u16 = !(NLA_F_NESTED | NLA_F_NET_BYTEORDER);

impl NlAttr {
    /// Create a new attribute header.
    ///
    /// The caller guarantees `NLA_HDRLEN + data_len` fits in 16 bits.
    pub fn new(attr_type: u16, data_len: usize) -> Self {
        Self {
            nla_len: (NLA_HDRLEN + data_len) as u16,
            nla_type: attr_type,
        }
    }

    /// Get the attribute type without flags.
    pub fn kind(&self) -> u16 {
        self.nla_type & NLA_TYPE_MASK
    }

    /// Check if this is a nested attribute.
    pub fn is_nested(&self) -> bool {
        self.nla_type & NLA_F_NESTED != 0
    }

    /// Check if the payload is in network byte order.
    pub fn is_net_byteorder(&self) -> bool {
        self.nla_type & NLA_F_NET_BYTEORDER != 0
    }

    /// Get the payload length (total length minus header).
    pub fn payload_len(&self) -> usize {
        (self.nla_len as usize).saturating_sub(NLA_HDRLEN)
    }

    /// Convert to bytes.
    pub fn as_bytes(&self) -> &[u8] {
        <Self as IntoBytes>::as_bytes(self)
    }

    /// Read an attribute header from the start of `data`.
    pub fn read(data: &[u8]) -> Result<Self> {
        Self::read_from_prefix(data)
            .map(|(attr, _)| attr)
            .map_err(|_| Error::Truncated {
                expected: std::mem::size_of::<Self>(),
                actual: data.len(),
            })
    }
}

/// Check that `buf` starts with a complete, well-framed attribute.
pub fn nla_ok(buf: &[u8]) -> bool {
    match NlAttr::read(buf) {
        Ok(attr) => {
            let len = attr.nla_len as usize;
            len >= NLA_HDRLEN && len <= buf.len()
        }
        Err(_) => false,
    }
}

/// Data types an attribute payload can be validated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrDataType {
    /// No constraint.
    Unspec,
    U8,
    U16,
    U32,
    U64,
    /// Non-empty string, terminator optional.
    String,
    /// Presence-only attribute with an empty payload.
    Flag,
    /// Milliseconds as a u64.
    Msecs,
    /// A stream of child attributes.
    Nested,
    /// Nested attributes preceded by a fixed struct; not checked.
    NestedCompat,
    /// Non-empty string ending in a NUL byte.
    NulString,
    /// Opaque bytes; only `validate_len` constrains the length.
    Binary,
}

impl AttrDataType {
    /// Payload length implied by the type, or 0 when it implies none.
    pub const fn fixed_len(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
            Self::U64 | Self::Msecs => 8,
            _ => 0,
        }
    }
}

/// A validated view of one attribute inside a message or nested attribute.
#[derive(Debug, Clone, Copy)]
pub struct Attr<'a> {
    header: NlAttr,
    payload: &'a [u8],
}

impl<'a> Attr<'a> {
    /// Parse the attribute at the start of `buf`.
    pub fn parse(buf: &'a [u8]) -> Result<Self> {
        let header = NlAttr::read(buf)?;
        let len = header.nla_len as usize;
        if len < NLA_HDRLEN || len > buf.len() {
            return Err(Error::AttrLength {
                declared: len,
                available: buf.len(),
            });
        }
        Ok(Self {
            header,
            payload: &buf[NLA_HDRLEN..len],
        })
    }

    /// Attribute type with the nested and byte-order flags masked off.
    pub fn kind(&self) -> u16 {
        self.header.kind()
    }

    /// Attribute type as found on the wire.
    pub fn raw_type(&self) -> u16 {
        self.header.nla_type
    }

    /// Length including header.
    pub fn len(&self) -> usize {
        self.header.nla_len as usize
    }

    /// True if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Payload length.
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// The payload bytes.
    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    /// Check if the nested flag is set.
    pub fn is_nested(&self) -> bool {
        self.header.is_nested()
    }

    /// Check if the network byte order flag is set.
    pub fn is_net_byteorder(&self) -> bool {
        self.header.is_net_byteorder()
    }

    /// Iterate the child attributes of a nested attribute.
    pub fn nested(&self) -> AttrIter<'a> {
        AttrIter::new(self.payload)
    }

    fn fixed<const N: usize>(&self, what: &str) -> Result<[u8; N]> {
        self.payload
            .first_chunk::<N>()
            .copied()
            .ok_or_else(|| {
                Error::InvalidAttribute(format!(
                    "truncated {} attribute {}: {} bytes",
                    what,
                    self.kind(),
                    self.payload.len()
                ))
            })
    }

    /// Extract a u8 value.
    pub fn get_u8(&self) -> Result<u8> {
        self.fixed::<1>("u8").map(|b| b[0])
    }

    /// Extract a u16 value (native endian).
    pub fn get_u16(&self) -> Result<u16> {
        self.fixed("u16").map(u16::from_ne_bytes)
    }

    /// Extract a u32 value (native endian).
    pub fn get_u32(&self) -> Result<u32> {
        self.fixed("u32").map(u32::from_ne_bytes)
    }

    /// Extract a u64 value (native endian).
    pub fn get_u64(&self) -> Result<u64> {
        self.fixed("u64").map(u64::from_ne_bytes)
    }

    /// Extract a u16 value (big endian / network order).
    pub fn get_u16_be(&self) -> Result<u16> {
        self.fixed("u16").map(u16::from_be_bytes)
    }

    /// Extract a u32 value (big endian / network order).
    pub fn get_u32_be(&self) -> Result<u32> {
        self.fixed("u32").map(u32::from_be_bytes)
    }

    /// Extract the whole payload as a string.
    pub fn get_str(&self) -> Result<&'a str> {
        std::str::from_utf8(self.payload)
            .map_err(|e| Error::InvalidAttribute(format!("invalid UTF-8: {}", e)))
    }

    /// Extract a string ending at the first NUL byte (or the payload end).
    pub fn get_str_nul(&self) -> Result<&'a str> {
        let len = self
            .payload
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.payload.len());
        std::str::from_utf8(&self.payload[..len])
            .map_err(|e| Error::InvalidAttribute(format!("invalid UTF-8: {}", e)))
    }

    /// Check the type is at most `max_type` (flags masked off).
    pub fn type_valid(&self, max_type: u16) -> bool {
        self.kind() <= max_type
    }

    /// Validate the payload against `data_type`.
    ///
    /// Fixed-width integer types must match their width exactly.
    pub fn validate(&self, data_type: AttrDataType) -> Result<()> {
        self.check(data_type, data_type.fixed_len())
    }

    /// Validate the payload against `data_type` and an explicit length.
    pub fn validate_len(&self, data_type: AttrDataType, len: usize) -> Result<()> {
        self.check(data_type, len)
    }

    fn check(&self, data_type: AttrDataType, expected: usize) -> Result<()> {
        let actual = self.payload.len();
        let fail = |reason| {
            Err(Error::Validation {
                attr_type: self.kind(),
                data_type,
                reason,
            })
        };

        if actual < expected {
            return fail(ValidationFailure::TooShort { expected, actual });
        }

        match data_type {
            AttrDataType::Flag if actual > 0 => {
                return fail(ValidationFailure::NotEmpty { actual });
            }
            AttrDataType::String if actual == 0 => return fail(ValidationFailure::Empty),
            AttrDataType::NulString => {
                if actual == 0 {
                    return fail(ValidationFailure::Empty);
                }
                if self.payload[actual - 1] != 0 {
                    return fail(ValidationFailure::NotTerminated);
                }
            }
            AttrDataType::Nested if actual > 0 => {
                if actual < NLA_HDRLEN {
                    return fail(ValidationFailure::TooShort {
                        expected: NLA_HDRLEN,
                        actual,
                    });
                }
                if self.nested().any(|child| child.is_err()) {
                    return fail(ValidationFailure::MalformedNest);
                }
            }
            _ => {}
        }

        if expected != 0 && actual > expected {
            return fail(ValidationFailure::TooLong { expected, actual });
        }
        Ok(())
    }
}

/// Iterator over netlink attributes in a buffer.
///
/// Stops after the first malformed attribute, yielding its error once.
#[derive(Debug, Clone)]
pub struct AttrIter<'a> {
    data: &'a [u8],
}

impl<'a> AttrIter<'a> {
    /// Create a new attribute iterator.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Check if there are no more attributes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len()
    }
}

impl<'a> Iterator for AttrIter<'a> {
    type Item = Result<Attr<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.is_empty() {
            return None;
        }

        let attr = match Attr::parse(self.data) {
            Ok(attr) => attr,
            Err(e) => {
                self.data = &[];
                return Some(Err(e));
            }
        };

        let aligned_len = nla_align(attr.len()).min(self.data.len());
        self.data = &self.data[aligned_len..];

        Some(Ok(attr))
    }
}

impl std::iter::FusedIterator for AttrIter<'_> {}
