//! List network interfaces with an RTM_GETLINK dump.
//!
//! Run with: cargo run -p nlwire --example dump_links
//!
//! Set `RUST_LOG=nlwire=trace` to watch every message go through the
//! dispatcher.

use nlwire::netlink::{
    AttrTable, Connection, MessageBuilder, Protocol, SOCKET_BUFFER_SIZE, Signal,
};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

const RTM_GETLINK: u16 = 18;
const IFLA_IFNAME: u16 = 3;
const IFLA_MTU: u16 = 4;
const IFLA_LINKINFO: u16 = 18;
const IFLA_INFO_KIND: u16 = 1;
const IFLA_MAX: u16 = 64;
const IFF_UP: u32 = 0x1;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
struct IfInfoMsg {
    ifi_family: u8,
    ifi_pad: u8,
    ifi_type: u16,
    ifi_index: i32,
    ifi_flags: u32,
    ifi_change: u32,
}

#[tokio::main]
async fn main() -> nlwire::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let conn = Connection::new(Protocol::Route)?;

    let mut buf = [0u8; SOCKET_BUFFER_SIZE];
    let mut req = MessageBuilder::with_header(&mut buf, RTM_GETLINK, 0)?;
    req.put_extra_header_as(&IfInfoMsg::default())?;

    println!("{:>4}  {:<16} {:>6}  {:<5} KIND", "IDX", "NAME", "MTU", "STATE");
    conn.dump(&mut req, |msg| {
        let ifi: IfInfoMsg = msg.extra_header()?;
        let attrs = AttrTable::from_message(&msg, size_of::<IfInfoMsg>(), IFLA_MAX)?;

        let name = match attrs.get(IFLA_IFNAME) {
            Some(attr) => attr.get_str_nul()?,
            None => "?",
        };
        let mtu = attrs.get(IFLA_MTU).map(|a| a.get_u32()).transpose()?;
        let kind = match attrs.get(IFLA_LINKINFO) {
            Some(info) => AttrTable::from_nested(&info, IFLA_INFO_KIND)?
                .get(IFLA_INFO_KIND)
                .map(|a| a.get_str_nul())
                .transpose()?,
            None => None,
        };
        let state = if ifi.ifi_flags & IFF_UP != 0 { "UP" } else { "DOWN" };

        println!(
            "{:>4}  {:<16} {:>6}  {:<5} {}",
            ifi.ifi_index,
            name,
            mtu.map(|m| m.to_string()).unwrap_or_default(),
            state,
            kind.unwrap_or("-"),
        );
        Ok(Signal::Continue)
    })
    .await
}
