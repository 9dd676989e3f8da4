//! Netlink wire format and request/response plumbing.
//!
//! The codec half works on caller-provided buffers and never allocates:
//!
//! - [`MessageBuilder`] writes a message header, an optional subsystem
//!   header and attributes (nested ones through [`Nest`]).
//! - [`MessageIter`] and [`AttrIter`] walk received bytes as borrowed
//!   [`Message`] and [`Attr`] views.
//! - [`run`] dispatches a received batch to callbacks, handling ACKs,
//!   kernel errors and the end of dumps.
//!
//! [`NetlinkSocket`] and [`Connection`] put those pieces on a tokio
//! socket.
//!
//! # Quick Start
//!
//! ```ignore
//! use nlwire::netlink::{Connection, MessageBuilder, Protocol, Signal};
//!
//! let conn = Connection::new(Protocol::Route)?;
//!
//! let mut buf = [0u8; 64];
//! let mut req = MessageBuilder::with_header(&mut buf, RTM_GETLINK, 0)?;
//! req.put_extra_header(16)?;
//!
//! conn.dump(&mut req, |msg| {
//!     let attrs = AttrTable::from_message(&msg, 16, IFLA_MAX)?;
//!     if let Some(name) = attrs.get(IFLA_IFNAME) {
//!         println!("{}", name.get_str_nul()?);
//!     }
//!     Ok(Signal::Continue)
//! })
//! .await?;
//! ```

pub mod attr;
pub mod batch;
pub mod builder;
pub mod callback;
pub mod connection;
mod error;
#[cfg(test)]
mod fixtures;
pub mod message;
pub mod parse;
mod socket;

pub use attr::{Attr, AttrDataType, AttrIter, NLA_F_NESTED, NLA_F_NET_BYTEORDER, NLA_HDRLEN, NlAttr};
pub use batch::Batch;
pub use builder::{MessageBuilder, Nest};
pub use callback::{ControlHandlers, ControlType, Signal, default_control, run, run_with};
pub use connection::{Connection, Transport};
pub use error::{Error, ErrorKind, Result, ValidationFailure};
pub use message::{
    Message, MessageIter, NLM_F_ACK, NLM_F_DUMP, NLM_F_MULTI, NLM_F_REQUEST, NLMSG_HDRLEN,
    NlMsgError, NlMsgHdr, NlMsgType,
};
pub use parse::{AttrTable, parse_attrs, parse_nested, parse_payload};
pub use socket::{
    NetlinkSocket, NetlinkSocketBuilder, Protocol, SOCKET_BUFFER_SIZE, SOCKET_DUMP_SIZE,
    rtnetlink_groups,
};
