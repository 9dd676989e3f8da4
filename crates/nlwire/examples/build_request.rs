//! Build a batch of link requests and decode it again, without a socket.
//!
//! Run with: cargo run -p nlwire --example build_request

use nlwire::netlink::{
    AttrDataType, AttrTable, Batch, MessageBuilder, NLM_F_ACK, NLM_F_REQUEST, Signal,
    parse_nested, run,
};

const RTM_NEWLINK: u16 = 16;
const NLM_F_CREATE: u16 = 0x400;
const NLM_F_EXCL: u16 = 0x200;

const IFLA_IFNAME: u16 = 3;
const IFLA_MTU: u16 = 4;
const IFLA_LINKINFO: u16 = 18;
const IFLA_INFO_KIND: u16 = 1;
const IFLA_INFO_DATA: u16 = 2;
const IFLA_VLAN_ID: u16 = 1;
const IFLA_LINK: u16 = 5;
const IFLA_MAX: u16 = 64;

const IFINFOMSG_LEN: usize = 16;

fn add_vlan(builder: &mut MessageBuilder<'_>, seq: u32, name: &str, id: u16) -> nlwire::Result<()> {
    builder.set_type(RTM_NEWLINK);
    builder.set_flags(NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_EXCL);
    builder.set_seq(seq);
    builder.put_extra_header(IFINFOMSG_LEN)?;
    builder.put_str_nul(IFLA_IFNAME, name)?;
    builder.put_u32(IFLA_LINK, 2)?;
    builder.put_u32(IFLA_MTU, 1496)?;

    let mut info = builder.nest_start(IFLA_LINKINFO)?;
    info.put_str(IFLA_INFO_KIND, "vlan")?;
    let mut data = info.nest_start(IFLA_INFO_DATA)?;
    data.put_u16(IFLA_VLAN_ID, id)?;
    data.end()?;
    info.end()
}

fn hexdump(bytes: &[u8]) {
    for (i, chunk) in bytes.chunks(16).enumerate() {
        let hex: Vec<String> = chunk.iter().map(|b| format!("{b:02x}")).collect();
        println!("  {:04x}  {}", i * 16, hex.join(" "));
    }
}

fn main() -> nlwire::Result<()> {
    let mut buf = [0u8; 512];
    let mut batch = Batch::new(&mut buf);
    for (seq, (name, id)) in [("eth0.10", 10), ("eth0.20", 20)].into_iter().enumerate() {
        batch.push(|b| add_vlan(b, seq as u32 + 1, name, id))?;
    }

    println!("{} messages, {} bytes", batch.count(), batch.len());
    hexdump(batch.as_bytes());

    // Decode the batch as if it had been received.
    run(batch.as_bytes(), 0, 0, |msg| {
        let attrs = AttrTable::from_message(&msg, IFINFOMSG_LEN, IFLA_MAX)?;
        let name = attrs.get(IFLA_IFNAME).ok_or_else(|| {
            nlwire::Error::InvalidMessage("missing IFLA_IFNAME".into())
        })?;
        name.validate(AttrDataType::NulString)?;

        print!("seq {} {}", msg.seq(), name.get_str_nul()?);
        if let Some(info) = attrs.get(IFLA_LINKINFO) {
            info.validate(AttrDataType::Nested)?;
            parse_nested(&info, |attr| {
                match attr.kind() {
                    IFLA_INFO_KIND => print!(" kind {}", attr.get_str()?),
                    IFLA_INFO_DATA => {
                        let data = AttrTable::from_nested(&attr, IFLA_VLAN_ID)?;
                        if let Some(id) = data.get(IFLA_VLAN_ID) {
                            print!(" id {}", id.get_u16()?);
                        }
                    }
                    _ => {}
                }
                Ok(Signal::Continue)
            })?;
        }
        println!();
        Ok(Signal::Continue)
    })?;

    Ok(())
}
