//! Print link notifications from the RTNLGRP_LINK multicast group.
//!
//! Run with: cargo run -p nlwire --example monitor_links
//!
//! Then, in another terminal (requires root):
//!   ip link add dummy0 type dummy && ip link del dummy0

use nlwire::netlink::{
    AttrTable, NetlinkSocket, Protocol, SOCKET_DUMP_SIZE, Signal, rtnetlink_groups, run,
};

const RTM_NEWLINK: u16 = 16;
const RTM_DELLINK: u16 = 17;
const IFLA_IFNAME: u16 = 3;
const IFLA_MAX: u16 = 64;
const IFINFOMSG_LEN: usize = 16;

#[tokio::main]
async fn main() -> nlwire::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let socket = NetlinkSocket::builder(Protocol::Route)
        .membership(rtnetlink_groups::RTNLGRP_LINK)
        .recv_buffer_size(SOCKET_DUMP_SIZE * 8)
        .build()?;
    println!("listening on port {}", socket.port_id());

    loop {
        let data = socket.recv_msg().await?;
        // Notifications carry no sequence number of ours.
        run(&data, 0, 0, |msg| {
            let event = match msg.msg_type() {
                RTM_NEWLINK => "new",
                RTM_DELLINK => "del",
                _ => return Ok(Signal::Continue),
            };
            let attrs = AttrTable::from_message(&msg, IFINFOMSG_LEN, IFLA_MAX)?;
            let name = match attrs.get(IFLA_IFNAME) {
                Some(attr) => attr.get_str_nul()?,
                None => "?",
            };
            println!("{event} link {name}");
            Ok(Signal::Continue)
        })?;
    }
}
