//! Netlink message fixtures for testing.
//!
//! Payloads are spelled out byte by byte as captured from `ip link show`
//! on a little-endian host. The fixtures are provided as functions that
//! return Vec<u8> so each test owns a buffer it can corrupt.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::message::{
    NLM_F_ACK_TLVS, NLM_F_CAPPED, NLM_F_MULTI, NLMSG_HDRLEN, NlMsgError, NlMsgHdr, NlMsgType,
    nlmsg_align,
};

/// rtnetlink new link message type.
pub const RTM_NEWLINK: u16 = 16;

/// Sequence number used by the dump fixtures.
pub const SEQ: u32 = 1_700_000_000;

/// Port ID the fixtures are addressed to.
pub const PORT_ID: u32 = 4242;

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

/// Wrap a payload in a netlink header, padding the result.
pub fn message(msg_type: u16, flags: u16, seq: u32, payload: &[u8]) -> Vec<u8> {
    let mut hdr = NlMsgHdr::new(msg_type, flags);
    hdr.nlmsg_len = (NLMSG_HDRLEN + payload.len()) as u32;
    hdr.nlmsg_seq = seq;
    hdr.nlmsg_pid = PORT_ID;

    let mut buf = hdr.as_bytes().to_vec();
    buf.extend_from_slice(payload);
    buf.resize(nlmsg_align(buf.len()), 0);
    buf
}

/// Link payload for the loopback interface.
pub fn link_loopback() -> Vec<u8> {
    vec![
        // ifinfomsg: family=0, pad=0, type=772 (ARPHRD_LOOPBACK), index=1, flags=0x49 (UP|LOOPBACK|RUNNING), change=0
        0x00, 0x00, // family, pad
        0x04, 0x03, // type = 772 (ARPHRD_LOOPBACK)
        0x01, 0x00, 0x00, 0x00, // index = 1
        0x49, 0x00, 0x00, 0x00, // flags = IFF_UP | IFF_LOOPBACK | IFF_RUNNING
        0x00, 0x00, 0x00, 0x00, // change = 0
        // IFLA_IFNAME = "lo"
        0x07, 0x00, // len = 7
        0x03, 0x00, // type = IFLA_IFNAME (3)
        b'l', b'o', 0x00, 0x00, // "lo\0" + padding
        // IFLA_MTU = 65536
        0x08, 0x00, // len = 8
        0x04, 0x00, // type = IFLA_MTU (4)
        0x00, 0x00, 0x01, 0x00, // mtu = 65536
        // IFLA_LINKINFO (nested)
        0x10, 0x80, // len = 16, NLA_F_NESTED
        0x12, 0x00, // type = IFLA_LINKINFO (18)
        //   IFLA_INFO_KIND = "vlan"
        0x09, 0x00, // len = 9
        0x01, 0x00, // type = IFLA_INFO_KIND (1)
        b'v', b'l', b'a', b'n', 0x00, 0x00, 0x00, 0x00, // "vlan\0" + padding
    ]
}

/// Link payload for an ethernet interface.
pub fn link_eth0() -> Vec<u8> {
    vec![
        // ifinfomsg: family=0, pad=0, type=1 (ARPHRD_ETHER), index=2, flags=0x1043 (UP|BROADCAST|RUNNING|MULTICAST), change=0
        0x00, 0x00, // family, pad
        0x01, 0x00, // type = 1 (ARPHRD_ETHER)
        0x02, 0x00, 0x00, 0x00, // index = 2
        0x43, 0x10, 0x00, 0x00, // flags
        0x00, 0x00, 0x00, 0x00, // change = 0
        // IFLA_IFNAME = "eth0"
        0x09, 0x00, // len = 9
        0x03, 0x00, // type = IFLA_IFNAME (3)
        b'e', b't', b'h', b'0', 0x00, 0x00, 0x00, 0x00, // "eth0\0" + padding
        // IFLA_MTU = 1500
        0x08, 0x00, // len = 8
        0x04, 0x00, // type = IFLA_MTU (4)
        0xdc, 0x05, 0x00, 0x00, // mtu = 1500
    ]
}

/// A complete RTM_GETLINK dump: two links followed by NLMSG_DONE.
pub fn link_dump() -> Vec<u8> {
    let mut buf = message(RTM_NEWLINK, NLM_F_MULTI, SEQ, &link_loopback());
    buf.extend(message(RTM_NEWLINK, NLM_F_MULTI, SEQ, &link_eth0()));
    buf.extend(done(SEQ));
    buf
}

/// NLMSG_DONE terminating a dump.
pub fn done(seq: u32) -> Vec<u8> {
    message(NlMsgType::DONE, NLM_F_MULTI, seq, &0i32.to_ne_bytes())
}

/// NLMSG_ERROR carrying `error` (0 for an acknowledgment).
pub fn ack(seq: u32, error: i32) -> Vec<u8> {
    let mut original = NlMsgHdr::new(RTM_NEWLINK, 0);
    original.nlmsg_len = NLMSG_HDRLEN as u32;
    original.nlmsg_seq = seq;
    original.nlmsg_pid = PORT_ID;

    let err = NlMsgError {
        error,
        msg: original,
    };
    message(NlMsgType::ERROR, 0, seq, err.as_bytes())
}

/// Capped NLMSG_ERROR with an extended ACK message attribute.
pub fn ext_ack_error(seq: u32, error: i32, msg: &str) -> Vec<u8> {
    let mut original = NlMsgHdr::new(RTM_NEWLINK, 0);
    // The echoed header still declares the full request length.
    original.nlmsg_len = 64;
    original.nlmsg_seq = seq;
    original.nlmsg_pid = PORT_ID;

    let err = NlMsgError {
        error,
        msg: original,
    };
    let mut payload = err.as_bytes().to_vec();

    // NLMSGERR_ATTR_MSG
    let attr_len = 4 + msg.len() + 1;
    payload.extend_from_slice(&(attr_len as u16).to_ne_bytes());
    payload.extend_from_slice(&1u16.to_ne_bytes());
    payload.extend_from_slice(msg.as_bytes());
    payload.push(0);
    payload.resize(nlmsg_align(payload.len()), 0);

    message(NlMsgType::ERROR, NLM_F_CAPPED | NLM_F_ACK_TLVS, seq, &payload)
}
