//! Callback-driven attribute walking.
//!
//! [`parse_payload`] and friends hand each attribute of a region to a
//! callback until the callback asks to stop or fails. [`AttrTable`] is the
//! usual companion: it indexes the attributes of one level by type so a
//! handler can look them up directly.

use tracing::debug;

use super::attr::{Attr, AttrIter};
use super::callback::Signal;
use super::error::Result;
use super::message::Message;

/// Walk the attributes in `payload`.
///
/// Returns [`Signal::Stop`] if the callback stopped the walk, and
/// [`Signal::Continue`] once every attribute was visited. Callback errors
/// and malformed attributes end the walk with that error.
pub fn parse_payload<'a, F>(payload: &'a [u8], mut cb: F) -> Result<Signal>
where
    F: FnMut(Attr<'a>) -> Result<Signal>,
{
    for attr in AttrIter::new(payload) {
        if cb(attr?)? == Signal::Stop {
            return Ok(Signal::Stop);
        }
    }
    Ok(Signal::Continue)
}

/// Walk the attributes of `msg` that follow a sub-header of `offset` bytes.
pub fn parse_attrs<'a, F>(msg: &Message<'a>, offset: usize, cb: F) -> Result<Signal>
where
    F: FnMut(Attr<'a>) -> Result<Signal>,
{
    parse_payload(msg.payload_at(offset)?, cb)
}

/// Walk the children of a nested attribute.
pub fn parse_nested<'a, F>(attr: &Attr<'a>, cb: F) -> Result<Signal>
where
    F: FnMut(Attr<'a>) -> Result<Signal>,
{
    parse_payload(attr.payload(), cb)
}

/// Attributes of one nesting level, indexed by type.
///
/// Types above `max_type` are skipped. When a type repeats, the last
/// occurrence wins.
#[derive(Debug, Clone)]
pub struct AttrTable<'a> {
    attrs: Vec<Option<Attr<'a>>>,
}

impl<'a> AttrTable<'a> {
    /// Index every attribute yielded by `iter`.
    pub fn parse(iter: AttrIter<'a>, max_type: u16) -> Result<Self> {
        let mut attrs = vec![None; usize::from(max_type) + 1];
        for attr in iter {
            let attr = attr?;
            match attrs.get_mut(usize::from(attr.kind())) {
                Some(slot) => *slot = Some(attr),
                None => debug!(kind = attr.kind(), max_type, "skipping out-of-range attribute"),
            }
        }
        Ok(Self { attrs })
    }

    /// Index the attributes of `msg` following a sub-header of `offset` bytes.
    pub fn from_message(msg: &Message<'a>, offset: usize, max_type: u16) -> Result<Self> {
        Self::parse(msg.attrs(offset)?, max_type)
    }

    /// Index the children of a nested attribute.
    pub fn from_nested(attr: &Attr<'a>, max_type: u16) -> Result<Self> {
        Self::parse(attr.nested(), max_type)
    }

    /// Look up an attribute by type.
    pub fn get(&self, kind: u16) -> Option<Attr<'a>> {
        self.attrs.get(usize::from(kind)).copied().flatten()
    }

    /// Check whether an attribute of this type was present.
    pub fn contains(&self, kind: u16) -> bool {
        self.get(kind).is_some()
    }

    /// Highest type the table can hold.
    pub fn max_type(&self) -> u16 {
        (self.attrs.len() - 1) as u16
    }

    /// The present attributes in type order.
    pub fn iter(&self) -> impl Iterator<Item = Attr<'a>> + '_ {
        self.attrs.iter().filter_map(|slot| *slot)
    }
}
