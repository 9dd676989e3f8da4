//! High-level netlink connection with request/response handling.
//!
//! A [`Connection`] stamps requests with a fresh sequence number and its
//! port ID, sends them, and feeds every reply datagram to [`run`] until the
//! exchange is over: a dump ends with `NLMSG_DONE`, an acknowledged request
//! with an `NLMSG_ERROR` carrying 0.
//!
//! # Example
//!
//! ```ignore
//! use nlwire::netlink::{Connection, MessageBuilder, Protocol, Signal};
//!
//! let conn = Connection::new(Protocol::Route)?;
//! let mut buf = [0u8; 64];
//! let mut req = MessageBuilder::with_header(&mut buf, RTM_GETLINK, 0)?;
//! req.put_extra_header(16)?;
//!
//! conn.dump(&mut req, |msg| {
//!     println!("link message, {} bytes", msg.len());
//!     Ok(Signal::Continue)
//! })
//! .await?;
//! ```

use std::sync::atomic::{AtomicU32, Ordering};

use tracing::{debug, trace};

use super::builder::MessageBuilder;
use super::callback::{ControlHandlers, Signal, run, run_with};
use super::error::{Error, Result};
use super::message::{Message, NLM_F_ACK, NLM_F_DUMP, NLM_F_REQUEST, NLMSG_HDRLEN};
use super::socket::{NetlinkSocket, Protocol, SOCKET_DUMP_SIZE};

/// Datagram transport a [`Connection`] runs over.
///
/// Implemented by [`NetlinkSocket`]; tests substitute an in-memory queue.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Local port ID replies are addressed to.
    fn port_id(&self) -> u32;

    /// Send one datagram.
    async fn send(&self, msg: &[u8]) -> Result<usize>;

    /// Receive one datagram into `buf`.
    async fn recv(&self, buf: &mut [u8]) -> Result<usize>;
}

impl Transport for NetlinkSocket {
    fn port_id(&self) -> u32 {
        NetlinkSocket::port_id(self)
    }

    async fn send(&self, msg: &[u8]) -> Result<usize> {
        NetlinkSocket::send(self, msg).await
    }

    async fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        NetlinkSocket::recv(self, buf).await
    }
}

/// High-level netlink connection.
#[derive(Debug)]
pub struct Connection<T: Transport = NetlinkSocket> {
    transport: T,
    seq: AtomicU32,
    recv_buffer_size: usize,
}

impl Connection<NetlinkSocket> {
    /// Create a new connection for the given protocol.
    pub fn new(protocol: Protocol) -> Result<Self> {
        Ok(Self::with_transport(NetlinkSocket::new(protocol)?))
    }

    /// Get the underlying socket.
    pub fn socket(&self) -> &NetlinkSocket {
        &self.transport
    }

    /// Get the underlying socket mutably, e.g. to join multicast groups.
    pub fn socket_mut(&mut self) -> &mut NetlinkSocket {
        &mut self.transport
    }
}

impl<T: Transport> Connection<T> {
    /// Wrap an existing transport.
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport,
            seq: AtomicU32::new(1),
            recv_buffer_size: SOCKET_DUMP_SIZE,
        }
    }

    /// Set the size of the buffer replies are received into.
    pub fn with_recv_buffer_size(mut self, size: usize) -> Self {
        self.recv_buffer_size = size.max(NLMSG_HDRLEN);
        self
    }

    /// Start sequence numbering at `seq`.
    pub fn with_initial_seq(self, seq: u32) -> Self {
        self.seq.store(seq, Ordering::Relaxed);
        self
    }

    /// Get the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Local port ID.
    pub fn port_id(&self) -> u32 {
        self.transport.port_id()
    }

    /// Get the next sequence number.
    ///
    /// Never returns 0, which would match replies to any request.
    pub fn next_seq(&self) -> u32 {
        loop {
            let seq = self.seq.fetch_add(1, Ordering::Relaxed);
            if seq != 0 {
                return seq;
            }
        }
    }

    /// Send a request and dispatch replies until a callback stops.
    ///
    /// The request's sequence number and port ID are overwritten.
    pub async fn execute<F>(&self, builder: &mut MessageBuilder<'_>, mut data_cb: F) -> Result<()>
    where
        F: FnMut(Message<'_>) -> Result<Signal>,
    {
        let seq = self.send_request(builder).await?;
        let port_id = self.port_id();
        self.receive(|batch| run(batch, seq, port_id, &mut data_cb))
            .await
    }

    /// Like [`execute`](Self::execute), with custom control handlers.
    pub async fn execute_with<F>(
        &self,
        builder: &mut MessageBuilder<'_>,
        mut data_cb: F,
        handlers: &mut ControlHandlers<'_>,
    ) -> Result<()>
    where
        F: FnMut(Message<'_>) -> Result<Signal>,
    {
        let seq = self.send_request(builder).await?;
        let port_id = self.port_id();
        self.receive(|batch| run_with(batch, seq, port_id, &mut data_cb, &mut *handlers))
            .await
    }

    /// Send a request that expects an ACK only (no data response).
    pub async fn request_ack(&self, builder: &mut MessageBuilder<'_>) -> Result<()> {
        builder.add_flags(NLM_F_REQUEST | NLM_F_ACK);
        self.execute(builder, |_| Ok(Signal::Continue)).await
    }

    /// Send a dump request and hand every returned object to `data_cb`.
    pub async fn dump<F>(&self, builder: &mut MessageBuilder<'_>, data_cb: F) -> Result<()>
    where
        F: FnMut(Message<'_>) -> Result<Signal>,
    {
        builder.add_flags(NLM_F_REQUEST | NLM_F_DUMP);
        self.execute(builder, data_cb).await
    }

    async fn send_request(&self, builder: &mut MessageBuilder<'_>) -> Result<u32> {
        let seq = self.next_seq();
        builder.set_seq(seq);
        builder.set_port_id(self.port_id());

        let msg = builder.as_bytes();
        debug!(
            msg_type = builder.header().nlmsg_type,
            seq,
            len = msg.len(),
            "sending request"
        );
        self.transport.send(msg).await?;
        Ok(seq)
    }

    async fn receive<D>(&self, mut dispatch: D) -> Result<()>
    where
        D: FnMut(&[u8]) -> Result<Signal>,
    {
        let mut buf = vec![0u8; self.recv_buffer_size];
        loop {
            let n = self.transport.recv(&mut buf).await?;
            trace!(len = n, "received datagram");
            if n == 0 {
                return Err(Error::Truncated {
                    expected: NLMSG_HDRLEN,
                    actual: 0,
                });
            }
            if dispatch(&buf[..n])? == Signal::Stop {
                return Ok(());
            }
        }
    }
}
