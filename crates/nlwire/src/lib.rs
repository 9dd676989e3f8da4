//! Netlink message codec and multipart response dispatcher for Linux.
//!
//! This crate builds and parses netlink messages in caller-provided
//! buffers: the 16-byte message header, a subsystem's fixed header, and
//! the type-length-value attributes that follow, including nested ones.
//! Received batches are dispatched message by message to callbacks that
//! decide whether to continue, stop or fail, the way multipart dumps and
//! acknowledgments require.
//!
//! The codec is protocol agnostic. Message types, attribute types and
//! subsystem headers for rtnetlink, generic netlink and the rest are the
//! caller's business.
//!
//! # Features
//!
//! - `integration` - Build the integration tests that talk to the kernel
//!
//! # Example
//!
//! ```ignore
//! use nlwire::netlink::{Connection, MessageBuilder, Protocol, Signal};
//!
//! #[tokio::main]
//! async fn main() -> nlwire::Result<()> {
//!     let conn = Connection::new(Protocol::Route)?;
//!
//!     let mut buf = [0u8; 64];
//!     let mut req = MessageBuilder::with_header(&mut buf, RTM_GETLINK, 0)?;
//!     req.put_extra_header(16)?;
//!
//!     conn.dump(&mut req, |msg| {
//!         println!("type {} len {}", msg.msg_type(), msg.len());
//!         Ok(Signal::Continue)
//!     })
//!     .await
//! }
//! ```

pub mod netlink;

// Re-export common types at crate root for convenience
pub use netlink::{Connection, Error, Protocol, Result};
