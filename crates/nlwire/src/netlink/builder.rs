//! Message builder for constructing netlink messages in a caller buffer.
//!
//! The builder never allocates: it writes into the slice it was given and
//! keeps the header's `nlmsg_len` equal to the bytes written so far. Every
//! write checks capacity first, so a failed write leaves the message as it
//! was.
//!
//! # Example
//!
//! ```
//! use nlwire::netlink::{MessageBuilder, NLM_F_REQUEST};
//!
//! let mut buf = [0u8; 256];
//! let mut builder = MessageBuilder::with_header(&mut buf, 16, NLM_F_REQUEST)?;
//! builder.put_str_nul(3, "eth0")?;
//!
//! let mut info = builder.nest_start(18)?;
//! info.put_str(1, "dummy")?;
//! info.end()?;
//!
//! let msg = builder.finish();
//! assert_eq!(msg.len(), 16 + 12 + 4 + 12);
//! # Ok::<(), nlwire::Error>(())
//! ```

use std::ops::{Deref, DerefMut};

use zerocopy::{Immutable, IntoBytes};

use super::attr::{NLA_F_NESTED, NLA_HDRLEN, NlAttr, nla_align};
use super::error::{Error, Result};
use super::message::{Message, NLMSG_HDRLEN, NlMsgHdr, nlmsg_align};

// Field offsets inside struct nlmsghdr.
const LEN_OFFSET: usize = 0;
const TYPE_OFFSET: usize = 4;
const FLAGS_OFFSET: usize = 6;
const SEQ_OFFSET: usize = 8;
const PID_OFFSET: usize = 12;

/// Builder for constructing a netlink message inside a borrowed buffer.
#[derive(Debug)]
pub struct MessageBuilder<'buf> {
    buf: &'buf mut [u8],
}

impl<'buf> MessageBuilder<'buf> {
    /// Start a message at the beginning of `buf`.
    ///
    /// The header is zeroed and its length set to the header size.
    pub fn new(buf: &'buf mut [u8]) -> Result<Self> {
        if buf.len() < NLMSG_HDRLEN {
            return Err(Error::BufferFull {
                needed: NLMSG_HDRLEN,
                capacity: buf.len(),
            });
        }
        buf[..NLMSG_HDRLEN].fill(0);
        let mut builder = Self { buf };
        builder.set_len(NLMSG_HDRLEN);
        Ok(builder)
    }

    /// Start a message with the given type and flags.
    pub fn with_header(buf: &'buf mut [u8], msg_type: u16, flags: u16) -> Result<Self> {
        let mut builder = Self::new(buf)?;
        builder.set_type(msg_type);
        builder.set_flags(flags);
        Ok(builder)
    }

    /// Get the current message length (`nlmsg_len`).
    pub fn len(&self) -> usize {
        self.read_u32(LEN_OFFSET) as usize
    }

    /// Check if the message is empty (header only).
    pub fn is_empty(&self) -> bool {
        self.len() == NLMSG_HDRLEN
    }

    /// Total size of the underlying buffer.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes still available for extra headers and attributes.
    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(nlmsg_align(self.len()))
    }

    /// A copy of the current header.
    pub fn header(&self) -> NlMsgHdr {
        NlMsgHdr {
            nlmsg_len: self.read_u32(LEN_OFFSET),
            nlmsg_type: self.read_u16(TYPE_OFFSET),
            nlmsg_flags: self.read_u16(FLAGS_OFFSET),
            nlmsg_seq: self.read_u32(SEQ_OFFSET),
            nlmsg_pid: self.read_u32(PID_OFFSET),
        }
    }

    /// Set the message type.
    pub fn set_type(&mut self, msg_type: u16) {
        self.write(TYPE_OFFSET, &msg_type.to_ne_bytes());
    }

    /// Set the message flags.
    pub fn set_flags(&mut self, flags: u16) {
        self.write(FLAGS_OFFSET, &flags.to_ne_bytes());
    }

    /// Add flags to the ones already set.
    pub fn add_flags(&mut self, flags: u16) {
        let current = self.read_u16(FLAGS_OFFSET);
        self.set_flags(current | flags);
    }

    /// Set the sequence number.
    pub fn set_seq(&mut self, seq: u32) {
        self.write(SEQ_OFFSET, &seq.to_ne_bytes());
    }

    /// Set the port ID.
    pub fn set_port_id(&mut self, port_id: u32) {
        self.write(PID_OFFSET, &port_id.to_ne_bytes());
    }

    /// Reserve an aligned, zeroed region of `size` bytes for a
    /// subsystem-specific header and return it.
    pub fn put_extra_header(&mut self, size: usize) -> Result<&mut [u8]> {
        let size = nlmsg_align(size);
        let start = self.reserve(size)?;
        Ok(&mut self.buf[start..start + size])
    }

    /// Append a fixed-size struct as the subsystem-specific header.
    pub fn put_extra_header_as<T: IntoBytes + Immutable>(&mut self, value: &T) -> Result<()> {
        let bytes = value.as_bytes();
        let region = self.put_extra_header(bytes.len())?;
        region[..bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Append an attribute with the given type and data.
    pub fn put_attr(&mut self, attr_type: u16, data: &[u8]) -> Result<()> {
        self.put_attr_with(attr_type, data.len(), |payload| {
            payload.copy_from_slice(data)
        })
    }

    /// Append an empty (flag) attribute with no payload.
    pub fn put_flag(&mut self, attr_type: u16) -> Result<()> {
        self.put_attr(attr_type, &[])
    }

    /// Append a u8 attribute.
    pub fn put_u8(&mut self, attr_type: u16, value: u8) -> Result<()> {
        self.put_attr(attr_type, &[value])
    }

    /// Append a u16 attribute (native endian).
    pub fn put_u16(&mut self, attr_type: u16, value: u16) -> Result<()> {
        self.put_attr(attr_type, &value.to_ne_bytes())
    }

    /// Append a u32 attribute (native endian).
    pub fn put_u32(&mut self, attr_type: u16, value: u32) -> Result<()> {
        self.put_attr(attr_type, &value.to_ne_bytes())
    }

    /// Append a u64 attribute (native endian).
    pub fn put_u64(&mut self, attr_type: u16, value: u64) -> Result<()> {
        self.put_attr(attr_type, &value.to_ne_bytes())
    }

    /// Append a u16 attribute (big endian / network order).
    pub fn put_u16_be(&mut self, attr_type: u16, value: u16) -> Result<()> {
        self.put_attr(attr_type, &value.to_be_bytes())
    }

    /// Append a u32 attribute (big endian / network order).
    pub fn put_u32_be(&mut self, attr_type: u16, value: u32) -> Result<()> {
        self.put_attr(attr_type, &value.to_be_bytes())
    }

    /// Append a string attribute without NUL terminator.
    pub fn put_str(&mut self, attr_type: u16, value: &str) -> Result<()> {
        self.put_attr(attr_type, value.as_bytes())
    }

    /// Append a NUL-terminated string attribute.
    pub fn put_str_nul(&mut self, attr_type: u16, value: &str) -> Result<()> {
        let bytes = value.as_bytes();
        // The terminator is the zero byte left by `reserve`.
        self.put_attr_with(attr_type, bytes.len() + 1, |payload| {
            payload[..bytes.len()].copy_from_slice(bytes)
        })
    }

    /// Start a nested attribute.
    ///
    /// Attributes written through the returned guard become children of the
    /// nest. Call [`Nest::end`] to fix up its length; dropping the guard
    /// without ending it removes the nest and its children again.
    pub fn nest_start(&mut self, attr_type: u16) -> Result<Nest<'_, 'buf>> {
        let offset = self.reserve(NLA_HDRLEN)?;
        let attr = NlAttr::new(attr_type | NLA_F_NESTED, 0);
        self.buf[offset..offset + NLA_HDRLEN].copy_from_slice(attr.as_bytes());
        Ok(Nest {
            builder: self,
            offset,
            open: true,
        })
    }

    /// The unused part of the buffer after the current end of the message.
    pub fn tail_mut(&mut self) -> &mut [u8] {
        let start = nlmsg_align(self.len()).min(self.buf.len());
        &mut self.buf[start..]
    }

    /// Get the current message bytes for inspection.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len()]
    }

    /// View the message built so far.
    pub fn message(&self) -> Result<Message<'_>> {
        Message::parse(self.as_bytes())
    }

    /// Finalize and return the message bytes.
    pub fn finish(self) -> &'buf [u8] {
        let len = self.len();
        let buf: &'buf [u8] = self.buf;
        &buf[..len]
    }

    fn put_attr_with<F>(&mut self, attr_type: u16, payload_len: usize, fill: F) -> Result<()>
    where
        F: FnOnce(&mut [u8]),
    {
        let len = NLA_HDRLEN + payload_len;
        if len > u16::MAX as usize {
            return Err(Error::AttrTooLarge { len });
        }
        let start = self.reserve(nla_align(len))?;
        let attr = NlAttr::new(attr_type, payload_len);
        self.buf[start..start + NLA_HDRLEN].copy_from_slice(attr.as_bytes());
        fill(&mut self.buf[start + NLA_HDRLEN..start + len]);
        Ok(())
    }

    /// Grow the message by `size` zeroed bytes and return where they start.
    fn reserve(&mut self, size: usize) -> Result<usize> {
        let start = nlmsg_align(self.len());
        let end = start + size;
        if end > self.buf.len() {
            return Err(Error::BufferFull {
                needed: end,
                capacity: self.buf.len(),
            });
        }
        self.buf[start..end].fill(0);
        self.set_len(end);
        Ok(start)
    }

    fn set_len(&mut self, len: usize) {
        self.write(LEN_OFFSET, &(len as u32).to_ne_bytes());
    }

    fn write(&mut self, offset: usize, bytes: &[u8]) {
        self.buf[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    fn read_u16(&self, offset: usize) -> u16 {
        u16::from_ne_bytes([self.buf[offset], self.buf[offset + 1]])
    }

    fn read_u32(&self, offset: usize) -> u32 {
        u32::from_ne_bytes([
            self.buf[offset],
            self.buf[offset + 1],
            self.buf[offset + 2],
            self.buf[offset + 3],
        ])
    }
}

/// An open nested attribute.
///
/// Derefs to the [`MessageBuilder`], so children are appended with the
/// usual `put_*` calls, and further nests can be opened inside it. The
/// builder stays mutably borrowed until the nest is ended or dropped, so a
/// message cannot be finished with a provisional nest length in it.
#[must_use = "dropping a nest without calling `end` removes it from the message"]
#[derive(Debug)]
pub struct Nest<'a, 'buf> {
    builder: &'a mut MessageBuilder<'buf>,
    offset: usize,
    open: bool,
}

impl Nest<'_, '_> {
    /// Close the nest, writing its final length.
    pub fn end(mut self) -> Result<()> {
        let len = self.builder.len() - self.offset;
        if len > u16::MAX as usize {
            return Err(Error::AttrTooLarge { len });
        }
        self.builder.write(self.offset, &(len as u16).to_ne_bytes());
        self.open = false;
        Ok(())
    }

    /// Discard the nest and everything written into it.
    pub fn cancel(self) {
        drop(self);
    }
}

impl<'buf> Deref for Nest<'_, 'buf> {
    type Target = MessageBuilder<'buf>;

    fn deref(&self) -> &Self::Target {
        &*self.builder
    }
}

impl DerefMut for Nest<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.builder
    }
}

impl Drop for Nest<'_, '_> {
    fn drop(&mut self) {
        if self.open {
            self.builder.set_len(self.offset);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::attr::{Attr, AttrIter};
    use crate::netlink::message::{MessageIter, NLM_F_REQUEST};
    use crate::netlink::parse::parse_nested;
    use crate::netlink::{Signal, fixtures};

    #[test]
    fn test_simple_message() {
        let mut buf = [0xffu8; 32];
        let msg = MessageBuilder::with_header(&mut buf, 16, NLM_F_REQUEST)
            .unwrap()
            .finish();
        assert_eq!(msg.len(), NLMSG_HDRLEN);

        let header = NlMsgHdr::read(msg).unwrap();
        assert_eq!(header.nlmsg_len as usize, NLMSG_HDRLEN);
        assert_eq!(header.nlmsg_type, 16);
        assert_eq!(header.nlmsg_flags, NLM_F_REQUEST);
        assert_eq!(header.nlmsg_seq, 0);
        assert_eq!(header.nlmsg_pid, 0);
    }

    #[test]
    fn test_buffer_smaller_than_header() {
        let mut buf = [0u8; 8];
        assert!(matches!(
            MessageBuilder::new(&mut buf),
            Err(Error::BufferFull { needed: 16, capacity: 8 })
        ));
    }

    #[test]
    fn test_header_fields() {
        let mut buf = [0u8; 32];
        let mut builder = MessageBuilder::new(&mut buf).unwrap();
        builder.set_type(20);
        builder.set_flags(NLM_F_REQUEST);
        builder.add_flags(0x100);
        builder.set_seq(77);
        builder.set_port_id(4242);

        let header = builder.header();
        assert_eq!(header.nlmsg_type, 20);
        assert_eq!(header.nlmsg_flags, NLM_F_REQUEST | 0x100);
        assert_eq!(header.nlmsg_seq, 77);
        assert_eq!(header.nlmsg_pid, 4242);
        assert_eq!(header, NlMsgHdr::read(builder.as_bytes()).unwrap());
    }

    #[test]
    fn test_round_trip() {
        let mut buf = [0u8; 256];
        let mut builder = MessageBuilder::with_header(&mut buf, 16, NLM_F_REQUEST).unwrap();
        builder
            .put_extra_header_as(&fixtures::IfInfoMsg {
                ifi_index: 3,
                ..Default::default()
            })
            .unwrap();
        builder.put_u8(1, 0xab).unwrap();
        builder.put_u16(2, 0xbeef).unwrap();
        builder.put_u32(3, 0xdead_beef).unwrap();
        builder.put_u64(4, u64::MAX - 1).unwrap();
        builder.put_str(5, "abc").unwrap();
        builder.put_str_nul(6, "eth0").unwrap();
        builder.put_flag(7).unwrap();
        let data = builder.finish();

        let msgs: Vec<_> = MessageIter::new(data).collect::<Result<_>>().unwrap();
        assert_eq!(msgs.len(), 1);
        let msg = msgs[0];
        assert_eq!(msg.len(), data.len());

        let ifi: fixtures::IfInfoMsg = msg.extra_header().unwrap();
        assert_eq!(ifi.ifi_index, 3);

        let attrs: Vec<Attr<'_>> = msg
            .attrs(std::mem::size_of::<fixtures::IfInfoMsg>())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        let kinds: Vec<u16> = attrs.iter().map(|a| a.kind()).collect();
        assert_eq!(kinds, [1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(attrs[0].get_u8().unwrap(), 0xab);
        assert_eq!(attrs[1].get_u16().unwrap(), 0xbeef);
        assert_eq!(attrs[2].get_u32().unwrap(), 0xdead_beef);
        assert_eq!(attrs[3].get_u64().unwrap(), u64::MAX - 1);
        assert_eq!(attrs[4].get_str().unwrap(), "abc");
        assert_eq!(attrs[5].payload_len(), 5);
        assert_eq!(attrs[5].get_str_nul().unwrap(), "eth0");
        assert!(attrs[6].is_empty());
    }

    #[test]
    fn test_attribute_grows_message_by_aligned_size() {
        let mut buf = [0u8; 64];
        let mut builder = MessageBuilder::new(&mut buf).unwrap();
        builder.put_u8(1, 1).unwrap();
        assert_eq!(builder.len(), NLMSG_HDRLEN + 8);
        builder.put_str(2, "abcde").unwrap();
        assert_eq!(builder.len(), NLMSG_HDRLEN + 8 + 12);

        let data = builder.as_bytes();
        // Padding after the 5-byte string is zeroed.
        assert_eq!(&data[NLMSG_HDRLEN + 8 + 9..], &[0, 0, 0]);
    }

    #[test]
    fn test_extra_header_is_aligned_and_zeroed() {
        let mut buf = [0xffu8; 64];
        let mut builder = MessageBuilder::new(&mut buf).unwrap();
        let region = builder.put_extra_header(6).unwrap();
        assert_eq!(region.len(), 8);
        assert!(region.iter().all(|&b| b == 0));
        region[0] = 9;
        assert_eq!(builder.len(), NLMSG_HDRLEN + 8);
        assert_eq!(builder.message().unwrap().payload()[0], 9);
    }

    #[test]
    fn test_nested_round_trip() {
        const CHILDREN: u16 = 5;

        let mut buf = [0u8; 256];
        let mut builder = MessageBuilder::new(&mut buf).unwrap();
        builder.put_u32(1, 1).unwrap();
        let mut nest = builder.nest_start(2).unwrap();
        for i in 0..CHILDREN {
            nest.put_u32(i + 1, u32::from(i) * 10).unwrap();
        }
        nest.end().unwrap();
        builder.put_u32(3, 3).unwrap();
        let data = builder.finish();

        let msg = Message::parse(data).unwrap();
        let top: Vec<_> = msg.attrs(0).unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(top.len(), 3);

        let nest = top[1];
        assert!(nest.is_nested());
        assert_eq!(nest.kind(), 2);
        assert_eq!(nest.len(), NLA_HDRLEN + usize::from(CHILDREN) * 8);

        let mut seen = Vec::new();
        let signal = parse_nested(&nest, |attr| {
            seen.push((attr.kind(), attr.get_u32()?));
            Ok(Signal::Continue)
        })
        .unwrap();
        assert_eq!(signal, Signal::Continue);
        assert_eq!(seen, [(1, 0), (2, 10), (3, 20), (4, 30), (5, 40)]);
        assert_eq!(top[2].get_u32().unwrap(), 3);
    }

    #[test]
    fn test_nest_inside_nest() {
        let mut buf = [0u8; 128];
        let mut builder = MessageBuilder::new(&mut buf).unwrap();
        let mut outer = builder.nest_start(1).unwrap();
        outer.put_u8(1, 7).unwrap();
        let mut inner = outer.nest_start(2).unwrap();
        inner.put_str_nul(1, "x").unwrap();
        inner.end().unwrap();
        outer.end().unwrap();
        let data = builder.finish();

        let outer = Attr::parse(&data[NLMSG_HDRLEN..]).unwrap();
        assert_eq!(outer.len(), NLA_HDRLEN + 8 + NLA_HDRLEN + 8);
        let children: Vec<_> = outer.nested().collect::<Result<_>>().unwrap();
        assert_eq!(children.len(), 2);
        let grandchildren: Vec<_> = children[1].nested().collect::<Result<_>>().unwrap();
        assert_eq!(grandchildren[0].get_str_nul().unwrap(), "x");
    }

    #[test]
    fn test_empty_nest() {
        let mut buf = [0u8; 64];
        let mut builder = MessageBuilder::new(&mut buf).unwrap();
        builder.nest_start(4).unwrap().end().unwrap();
        let data = builder.finish();
        let attr = Attr::parse(&data[NLMSG_HDRLEN..]).unwrap();
        assert_eq!(attr.len(), NLA_HDRLEN);
        assert_eq!(AttrIter::new(attr.payload()).count(), 0);
    }

    #[test]
    fn test_dropped_nest_is_cancelled() {
        let mut buf = [0u8; 64];
        let mut builder = MessageBuilder::new(&mut buf).unwrap();
        builder.put_u32(1, 1).unwrap();
        let before = builder.len();
        {
            let mut nest = builder.nest_start(2).unwrap();
            nest.put_u32(1, 5).unwrap();
        }
        assert_eq!(builder.len(), before);

        let mut nest = builder.nest_start(2).unwrap();
        nest.put_u32(1, 5).unwrap();
        nest.cancel();
        assert_eq!(builder.len(), before);
    }

    #[test]
    fn test_buffer_full_leaves_message_intact() {
        let mut buf = [0u8; 28];
        let mut builder = MessageBuilder::new(&mut buf).unwrap();
        builder.put_u32(1, 1).unwrap();
        let before = builder.as_bytes().to_vec();

        assert!(matches!(
            builder.put_u64(2, 2),
            Err(Error::BufferFull { needed: 36, capacity: 28 })
        ));
        assert_eq!(builder.as_bytes(), &before[..]);
        assert_eq!(builder.remaining(), 4);

        // A nest header still fits, its child does not.
        let mut nest = builder.nest_start(3).unwrap();
        assert!(nest.put_u8(1, 1).is_err());
        nest.end().unwrap();
        assert_eq!(builder.len(), 28);
    }

    #[test]
    fn test_attr_too_large() {
        let mut buf = vec![0u8; 100_000];
        let mut builder = MessageBuilder::new(&mut buf).unwrap();
        let big = vec![1u8; u16::MAX as usize];
        assert!(matches!(
            builder.put_attr(1, &big),
            Err(Error::AttrTooLarge { .. })
        ));
        assert!(builder.is_empty());

        let mut nest = builder.nest_start(1).unwrap();
        nest.put_attr(1, &big[..40_000]).unwrap();
        nest.put_attr(2, &big[..40_000]).unwrap();
        assert!(matches!(nest.end(), Err(Error::AttrTooLarge { .. })));
        assert!(builder.is_empty());
    }

    #[test]
    fn test_tail_mut() {
        let mut buf = [0u8; 40];
        let mut builder = MessageBuilder::new(&mut buf).unwrap();
        builder.put_u8(1, 1).unwrap();
        assert_eq!(builder.tail_mut().len(), 40 - NLMSG_HDRLEN - 8);
    }
}
