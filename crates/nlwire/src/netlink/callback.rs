//! Dispatch of received message batches.
//!
//! A single `recv` may return many messages: the parts of a dump, an ACK,
//! or a kernel error. [`run`] walks such a batch, checks every message
//! against the request it answers, and routes data messages to the
//! caller's callback and control messages (`NLMSG_NOOP`, `NLMSG_ERROR`,
//! `NLMSG_DONE`, `NLMSG_OVERRUN`) to [`ControlHandlers`] or their default
//! behaviour.
//!
//! Every callback returns a [`Signal`]. [`Signal::Stop`] ends the batch
//! and is passed back to the caller, errors end it with that error.
//!
//! # Example
//!
//! ```
//! use nlwire::netlink::{Signal, run};
//!
//! # let batch: &[u8] = &[];
//! let mut links = 0;
//! let signal = run(batch, 0, 0, |msg| {
//!     if msg.msg_type() == 16 {
//!         links += 1;
//!     }
//!     Ok(Signal::Continue)
//! })?;
//! # let _ = signal;
//! # Ok::<(), nlwire::Error>(())
//! ```

use std::fmt;

use tracing::{debug, trace};

use super::error::{Error, Result};
use super::message::{Message, MessageIter, NLMSG_MIN_TYPE, NlMsgType};

/// Outcome of a callback that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Keep processing.
    Continue,
    /// Processing is complete.
    Stop,
}

/// Control message types with a default handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlType {
    /// `NLMSG_NOOP`, ignored by default.
    Noop,
    /// `NLMSG_ERROR`, an ACK or a kernel error.
    Error,
    /// `NLMSG_DONE`, end of a dump.
    Done,
    /// `NLMSG_OVERRUN`, data was lost.
    Overrun,
}

impl ControlType {
    /// Map a message type to its control type.
    pub fn from_msg_type(msg_type: u16) -> Option<Self> {
        match msg_type {
            NlMsgType::NOOP => Some(Self::Noop),
            NlMsgType::ERROR => Some(Self::Error),
            NlMsgType::DONE => Some(Self::Done),
            NlMsgType::OVERRUN => Some(Self::Overrun),
            _ => None,
        }
    }

    /// The message type this control type is carried in.
    pub fn msg_type(self) -> u16 {
        match self {
            Self::Noop => NlMsgType::NOOP,
            Self::Error => NlMsgType::ERROR,
            Self::Done => NlMsgType::DONE,
            Self::Overrun => NlMsgType::OVERRUN,
        }
    }
}

/// A caller-supplied control message handler.
pub type ControlCallback<'h> = Box<dyn FnMut(Message<'_>) -> Result<Signal> + 'h>;

/// Per-type overrides for control message handling, indexed by the raw
/// control message type (0 to `NLMSG_MIN_TYPE - 1`).
///
/// Known types without an override keep their default behaviour, see
/// [`default_control`]. Other control types without an override are
/// skipped.
#[derive(Default)]
pub struct ControlHandlers<'h> {
    slots: [Option<ControlCallback<'h>>; NLMSG_MIN_TYPE as usize],
}

impl<'h> ControlHandlers<'h> {
    /// Handlers that all use the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the handler for `kind`, builder style.
    pub fn on<F>(mut self, kind: ControlType, handler: F) -> Self
    where
        F: FnMut(Message<'_>) -> Result<Signal> + 'h,
    {
        self.set(kind, handler);
        self
    }

    /// Override the handler for `kind`.
    pub fn set<F>(&mut self, kind: ControlType, handler: F)
    where
        F: FnMut(Message<'_>) -> Result<Signal> + 'h,
    {
        self.slots[usize::from(kind.msg_type())] = Some(Box::new(handler));
    }

    /// Install a handler for any control message type, including those
    /// without a [`ControlType`].
    ///
    /// Fails with [`Error::InvalidMessage`] if `msg_type` is a data type.
    pub fn set_raw<F>(&mut self, msg_type: u16, handler: F) -> Result<()>
    where
        F: FnMut(Message<'_>) -> Result<Signal> + 'h,
    {
        let slot = self.slot_mut(msg_type)?;
        *slot = Some(Box::new(handler));
        Ok(())
    }

    /// Restore the default handler for `kind`.
    pub fn clear(&mut self, kind: ControlType) {
        self.slots[usize::from(kind.msg_type())] = None;
    }

    /// Remove the handler for a raw control message type.
    pub fn clear_raw(&mut self, msg_type: u16) -> Result<()> {
        *self.slot_mut(msg_type)? = None;
        Ok(())
    }

    /// Check whether `kind` has an override.
    pub fn is_set(&self, kind: ControlType) -> bool {
        self.is_set_raw(kind.msg_type())
    }

    /// Check whether a raw control message type has a handler.
    pub fn is_set_raw(&self, msg_type: u16) -> bool {
        self.slots
            .get(usize::from(msg_type))
            .is_some_and(Option::is_some)
    }

    fn slot_mut(&mut self, msg_type: u16) -> Result<&mut Option<ControlCallback<'h>>> {
        self.slots.get_mut(usize::from(msg_type)).ok_or_else(|| {
            Error::InvalidMessage(format!(
                "message type {msg_type} is not a control type"
            ))
        })
    }

    fn dispatch(&mut self, msg: Message<'_>) -> Result<Signal> {
        let msg_type = msg.msg_type();
        if let Some(handler) = self
            .slots
            .get_mut(usize::from(msg_type))
            .and_then(Option::as_mut)
        {
            return handler(msg);
        }
        match ControlType::from_msg_type(msg_type) {
            Some(kind) => default_control(kind, msg),
            None => {
                debug!(msg_type, "skipping unknown control message");
                Ok(Signal::Continue)
            }
        }
    }
}

impl fmt::Debug for ControlHandlers<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let set: Vec<_> = (0..NLMSG_MIN_TYPE)
            .filter(|msg_type| self.is_set_raw(*msg_type))
            .collect();
        f.debug_struct("ControlHandlers")
            .field("overridden", &set)
            .finish()
    }
}

/// Default handling of a control message.
///
/// - `NLMSG_NOOP` continues.
/// - `NLMSG_ERROR` stops on an ACK (error code 0) and otherwise fails with
///   the kernel's errno, plus the extended ACK message when present.
/// - `NLMSG_DONE` stops.
/// - `NLMSG_OVERRUN` fails with [`Error::Overrun`].
pub fn default_control(kind: ControlType, msg: Message<'_>) -> Result<Signal> {
    match kind {
        ControlType::Noop => Ok(Signal::Continue),
        ControlType::Error => {
            let err = msg.error()?;
            if err.is_ack() {
                return Ok(Signal::Stop);
            }
            let mut error = Error::from_errno(err.error);
            if let (Error::Kernel { message, .. }, Some(ext)) = (&mut error, msg.ext_ack_message())
            {
                message.push_str(": ");
                message.push_str(ext);
            }
            Err(error)
        }
        ControlType::Done => Ok(Signal::Stop),
        ControlType::Overrun => Err(Error::Overrun),
    }
}

/// Process a batch of received messages with default control handling.
///
/// `seq` and `port_id` are the values the batch must answer; 0 accepts
/// any. Returns [`Signal::Stop`] if a callback stopped processing (a
/// completed dump or an ACK) and [`Signal::Continue`] if the batch ran out
/// first and more data should be received.
pub fn run<'a, F>(buf: &'a [u8], seq: u32, port_id: u32, data_cb: F) -> Result<Signal>
where
    F: FnMut(Message<'a>) -> Result<Signal>,
{
    run_with(buf, seq, port_id, data_cb, &mut ControlHandlers::new())
}

/// Process a batch of received messages with custom control handlers.
pub fn run_with<'a, F>(
    buf: &'a [u8],
    seq: u32,
    port_id: u32,
    mut data_cb: F,
    handlers: &mut ControlHandlers<'_>,
) -> Result<Signal>
where
    F: FnMut(Message<'a>) -> Result<Signal>,
{
    for msg in MessageIter::new(buf) {
        let msg = msg?;
        let header = msg.header();
        trace!(
            msg_type = msg.msg_type(),
            flags = msg.flags(),
            seq = msg.seq(),
            len = msg.len(),
            "dispatching message"
        );

        if !header.seq_ok(seq) {
            return Err(Error::SequenceMismatch {
                expected: seq,
                actual: msg.seq(),
            });
        }
        if !header.port_id_ok(port_id) {
            return Err(Error::PortIdMismatch {
                expected: port_id,
                actual: msg.port_id(),
            });
        }
        if header.is_dump_interrupted() {
            return Err(Error::DumpInterrupted);
        }

        let signal = if msg.msg_type() >= NLMSG_MIN_TYPE {
            data_cb(msg)?
        } else {
            handlers.dispatch(msg)?
        };

        if signal == Signal::Stop {
            return Ok(Signal::Stop);
        }
    }
    Ok(Signal::Continue)
}
