//! Common test utilities for integration tests.
//!
//! rtnetlink constants and request helpers shared by the test modules,
//! plus macros for tests that need root.

use std::sync::atomic::{AtomicU32, Ordering};

use nlwire::Result;
use nlwire::netlink::{AttrTable, Message, MessageBuilder};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

pub const RTM_NEWLINK: u16 = 16;
pub const RTM_DELLINK: u16 = 17;
pub const RTM_GETLINK: u16 = 18;

pub const IFLA_IFNAME: u16 = 3;
pub const IFLA_MTU: u16 = 4;
pub const IFLA_LINKINFO: u16 = 18;
pub const IFLA_INFO_KIND: u16 = 1;
pub const IFLA_MAX: u16 = 64;

/// struct ifinfomsg.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct IfInfoMsg {
    pub ifi_family: u8,
    pub ifi_pad: u8,
    pub ifi_type: u16,
    pub ifi_index: i32,
    pub ifi_flags: u32,
    pub ifi_change: u32,
}

/// Global counter for unique interface names.
static NAME_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Generate an interface name that no other test uses (at most 15 bytes).
pub fn unique_ifname(prefix: &str) -> String {
    let id = NAME_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("nlw{}{}{}", prefix, std::process::id() % 10_000, id)
}

/// Check if we're running as root.
pub fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

/// Start a link request with an empty ifinfomsg.
pub fn link_request(buf: &mut [u8], msg_type: u16, flags: u16) -> Result<MessageBuilder<'_>> {
    let mut builder = MessageBuilder::with_header(buf, msg_type, flags)?;
    builder.put_extra_header_as(&IfInfoMsg::default())?;
    Ok(builder)
}

/// Index the attributes of a link message.
pub fn link_attrs<'a>(msg: &Message<'a>) -> Result<AttrTable<'a>> {
    AttrTable::from_message(msg, size_of::<IfInfoMsg>(), IFLA_MAX)
}

/// Skip the test if not running as root.
#[macro_export]
macro_rules! require_root {
    () => {
        if !crate::common::is_root() {
            eprintln!("Skipping test: requires root");
            return Ok(());
        }
    };
}
