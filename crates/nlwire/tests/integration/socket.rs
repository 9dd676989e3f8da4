//! Socket integration tests.

use nlwire::Result;
use std::os::fd::AsRawFd;

use nlwire::netlink::{NetlinkSocket, Protocol, rtnetlink_groups};

fn recv_buffer_size(socket: &NetlinkSocket) -> i32 {
    let mut value: i32 = 0;
    let mut len = size_of::<i32>() as libc::socklen_t;
    let ret = unsafe {
        libc::getsockopt(
            socket.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_RCVBUF,
            (&mut value as *mut i32).cast(),
            &mut len,
        )
    };
    assert_eq!(ret, 0, "getsockopt: {}", std::io::Error::last_os_error());
    value
}

#[tokio::test]
async fn test_kernel_assigns_port_id() -> Result<()> {
    let socket = NetlinkSocket::new(Protocol::Route)?;
    assert_ne!(socket.port_id(), 0);
    assert_eq!(socket.protocol(), Protocol::Route);

    let other = NetlinkSocket::new(Protocol::Route)?;
    assert_ne!(socket.port_id(), other.port_id());
    Ok(())
}

#[tokio::test]
async fn test_netlink_options() -> Result<()> {
    let socket = NetlinkSocket::builder(Protocol::Route)
        .cap_ack(true)
        .recv_buffer_size(1 << 16)
        .build()?;
    assert_eq!(socket.get_opt(libc::NETLINK_CAP_ACK)?, 1);

    socket.set_opt(libc::NETLINK_CAP_ACK, 0)?;
    assert_eq!(socket.get_opt(libc::NETLINK_CAP_ACK)?, 0);
    Ok(())
}

#[tokio::test]
async fn test_recv_buffer_size_applied() -> Result<()> {
    let small = NetlinkSocket::builder(Protocol::Route)
        .recv_buffer_size(4096)
        .build()?;
    let large = NetlinkSocket::builder(Protocol::Route)
        .recv_buffer_size(1 << 16)
        .build()?;
    // The kernel doubles the requested size for bookkeeping overhead.
    assert!(recv_buffer_size(&large) >= 1 << 16);
    assert!(recv_buffer_size(&small) < recv_buffer_size(&large));
    Ok(())
}

#[tokio::test]
async fn test_memberships() -> Result<()> {
    let mut socket = NetlinkSocket::builder(Protocol::Route)
        .membership(rtnetlink_groups::RTNLGRP_LINK)
        .build()?;
    socket.add_membership(rtnetlink_groups::RTNLGRP_IPV4_IFADDR)?;
    socket.drop_membership(rtnetlink_groups::RTNLGRP_LINK)?;
    Ok(())
}
