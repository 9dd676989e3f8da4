//! Low-level async netlink socket operations.

use std::io;
use std::os::unix::io::{AsRawFd, RawFd};

use bytes::{Bytes, BytesMut};
use netlink_sys::{Socket, SocketAddr, protocols};
use tokio::io::Interest;
use tokio::io::unix::AsyncFd;
use tracing::debug;

use super::error::Result;

/// Suggested buffer size for requests and ordinary replies.
pub const SOCKET_BUFFER_SIZE: usize = 8192;

/// Suggested receive buffer size for dumps.
///
/// The kernel fills each dump part up to the size of the reader's buffer,
/// so a larger buffer means fewer round trips.
pub const SOCKET_DUMP_SIZE: usize = 32768;

/// Netlink protocol families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Routing/device hook (ip, tc, etc.)
    Route,
    /// Generic netlink
    Generic,
    /// Netfilter
    Netfilter,
    /// Socket diagnostics
    SockDiag,
    /// Audit
    Audit,
    /// IPsec
    Xfrm,
    /// Kernel connector
    Connector,
    /// Kobject uevent
    KobjectUevent,
}

impl Protocol {
    fn as_isize(self) -> isize {
        match self {
            Protocol::Route => protocols::NETLINK_ROUTE,
            Protocol::Generic => protocols::NETLINK_GENERIC,
            Protocol::Netfilter => protocols::NETLINK_NETFILTER,
            Protocol::SockDiag => protocols::NETLINK_SOCK_DIAG,
            Protocol::Audit => protocols::NETLINK_AUDIT,
            Protocol::Xfrm => protocols::NETLINK_XFRM,
            Protocol::Connector => protocols::NETLINK_CONNECTOR,
            Protocol::KobjectUevent => protocols::NETLINK_KOBJECT_UEVENT,
        }
    }
}

/// Options applied when a [`NetlinkSocket`] is opened.
#[derive(Debug, Clone)]
pub struct NetlinkSocketBuilder {
    protocol: Protocol,
    port_id: u32,
    groups: u32,
    memberships: Vec<u32>,
    ext_ack: bool,
    cap_ack: bool,
    recv_buffer_size: Option<usize>,
}

impl NetlinkSocketBuilder {
    /// Start building a socket for `protocol`.
    pub fn new(protocol: Protocol) -> Self {
        Self {
            protocol,
            port_id: 0,
            groups: 0,
            memberships: Vec::new(),
            ext_ack: true,
            cap_ack: false,
            recv_buffer_size: None,
        }
    }

    /// Bind to a specific port ID instead of letting the kernel pick one.
    pub fn port_id(mut self, port_id: u32) -> Self {
        self.port_id = port_id;
        self
    }

    /// Legacy multicast group bitmask passed to `bind`.
    pub fn groups(mut self, groups: u32) -> Self {
        self.groups = groups;
        self
    }

    /// Join a multicast group by number after binding.
    pub fn membership(mut self, group: u32) -> Self {
        self.memberships.push(group);
        self
    }

    /// Ask the kernel for extended ACK messages (on by default).
    pub fn ext_ack(mut self, enable: bool) -> Self {
        self.ext_ack = enable;
        self
    }

    /// Ask the kernel not to echo the request payload in error messages.
    pub fn cap_ack(mut self, enable: bool) -> Self {
        self.cap_ack = enable;
        self
    }

    /// Set the kernel receive buffer size (`SO_RCVBUF`).
    pub fn recv_buffer_size(mut self, size: usize) -> Self {
        self.recv_buffer_size = Some(size);
        self
    }

    /// Open and bind the socket.
    pub fn build(self) -> Result<NetlinkSocket> {
        let mut socket = Socket::new(self.protocol.as_isize())?;
        socket.set_non_blocking(true)?;

        let mut addr = SocketAddr::new(self.port_id, self.groups);
        socket.bind(&addr)?;
        socket.get_address(&mut addr)?;
        let port_id = addr.port_number();

        for group in &self.memberships {
            socket.add_membership(*group)?;
        }

        if self.ext_ack {
            // Older kernels reject the option, errors stay plain errno values.
            if let Err(e) = socket.set_ext_ack(true) {
                debug!(error = %e, "extended ACK not supported");
            }
        }

        if self.cap_ack {
            socket.set_cap_ack(true)?;
        }
        if let Some(size) = self.recv_buffer_size {
            // SO_RCVBUF takes a C int.
            socket.set_rx_buf_sz(i32::try_from(size).unwrap_or(i32::MAX))?;
        }

        let socket = NetlinkSocket {
            fd: AsyncFd::new(socket)?,
            port_id,
            protocol: self.protocol,
        };

        debug!(protocol = ?socket.protocol, port_id, "opened netlink socket");
        Ok(socket)
    }
}

/// Async netlink socket.
pub struct NetlinkSocket {
    /// The underlying async file descriptor.
    fd: AsyncFd<Socket>,
    /// Local port ID (assigned by kernel unless requested).
    port_id: u32,
    /// Protocol this socket uses.
    protocol: Protocol,
}

impl std::fmt::Debug for NetlinkSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetlinkSocket")
            .field("fd", &self.as_raw_fd())
            .field("port_id", &self.port_id)
            .field("protocol", &self.protocol)
            .finish()
    }
}

impl NetlinkSocket {
    /// Create a new netlink socket for the given protocol.
    pub fn new(protocol: Protocol) -> Result<Self> {
        NetlinkSocketBuilder::new(protocol).build()
    }

    /// Configure a socket before opening it.
    pub fn builder(protocol: Protocol) -> NetlinkSocketBuilder {
        NetlinkSocketBuilder::new(protocol)
    }

    /// Get the local port ID.
    pub fn port_id(&self) -> u32 {
        self.port_id
    }

    /// Get the protocol.
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Subscribe to multicast groups.
    pub fn add_membership(&mut self, group: u32) -> Result<()> {
        self.fd.get_mut().add_membership(group)?;
        Ok(())
    }

    /// Unsubscribe from multicast groups.
    pub fn drop_membership(&mut self, group: u32) -> Result<()> {
        self.fd.get_mut().drop_membership(group)?;
        Ok(())
    }

    /// Set an integer socket option at the `SOL_NETLINK` level.
    pub fn set_opt(&self, option: i32, value: i32) -> Result<()> {
        setsockopt_int(self.as_raw_fd(), libc::SOL_NETLINK, option, value)
    }

    /// Read an integer socket option at the `SOL_NETLINK` level.
    pub fn get_opt(&self, option: i32) -> Result<i32> {
        let mut value: i32 = 0;
        let mut len = size_of::<i32>() as libc::socklen_t;
        // SAFETY: the fd is owned by `self.fd` and stays open for the call.
        // `value` and `len` are valid for writes of the advertised size.
        let ret = unsafe {
            libc::getsockopt(
                self.as_raw_fd(),
                libc::SOL_NETLINK,
                option,
                (&mut value as *mut i32).cast::<libc::c_void>(),
                &mut len,
            )
        };
        if ret < 0 {
            return Err(io::Error::last_os_error().into());
        }
        Ok(value)
    }

    /// Send a message (or a batch of messages).
    pub async fn send(&self, msg: &[u8]) -> Result<usize> {
        loop {
            let mut guard = self.fd.ready(Interest::WRITABLE).await?;

            match guard.try_io(|inner| inner.get_ref().send(msg, 0)) {
                Ok(result) => return Ok(result?),
                Err(_would_block) => continue,
            }
        }
    }

    /// Receive one datagram into `buf`, returning its length.
    ///
    /// A datagram larger than `buf` is truncated by the kernel.
    pub async fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        loop {
            let mut guard = self.fd.ready(Interest::READABLE).await?;

            match guard.try_io(|inner| {
                let mut tail = &mut buf[..];
                inner.get_ref().recv(&mut tail, 0)
            }) {
                Ok(result) => return Ok(result?),
                Err(_would_block) => continue,
            }
        }
    }

    /// Receive one datagram into a freshly allocated buffer.
    pub async fn recv_msg(&self) -> Result<Bytes> {
        // Allocate buffer with capacity - don't resize, let recv fill it
        let mut buf = BytesMut::with_capacity(SOCKET_DUMP_SIZE);

        loop {
            let mut guard = self.fd.ready(Interest::READABLE).await?;

            match guard.try_io(|inner| inner.get_ref().recv(&mut buf, 0)) {
                Ok(result) => {
                    result?;
                    return Ok(buf.freeze());
                }
                Err(_would_block) => continue,
            }
        }
    }
}

impl AsRawFd for NetlinkSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.get_ref().as_raw_fd()
    }
}

fn setsockopt_int(fd: RawFd, level: i32, option: i32, value: i32) -> Result<()> {
    // SAFETY: `fd` is an open socket and `value` lives for the duration of
    // the call; the kernel copies it before returning.
    let ret = unsafe {
        libc::setsockopt(
            fd,
            level,
            option,
            (&value as *const i32).cast::<libc::c_void>(),
            size_of::<i32>() as libc::socklen_t,
        )
    };
    if ret < 0 {
        return Err(io::Error::last_os_error().into());
    }
    Ok(())
}

/// Multicast groups for NETLINK_ROUTE.
pub mod rtnetlink_groups {
    pub const RTNLGRP_LINK: u32 = 1;
    pub const RTNLGRP_NOTIFY: u32 = 2;
    pub const RTNLGRP_NEIGH: u32 = 3;
    pub const RTNLGRP_TC: u32 = 4;
    pub const RTNLGRP_IPV4_IFADDR: u32 = 5;
    pub const RTNLGRP_IPV4_ROUTE: u32 = 7;
    pub const RTNLGRP_IPV6_IFADDR: u32 = 9;
    pub const RTNLGRP_IPV6_ROUTE: u32 = 11;
}
