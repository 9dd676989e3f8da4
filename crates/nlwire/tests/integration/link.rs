//! Link integration tests.

use nlwire::Result;
use nlwire::netlink::{
    Connection, NLM_F_ACK, NLM_F_REQUEST, Protocol, SOCKET_BUFFER_SIZE, Signal,
};

use crate::common::{
    IFLA_IFNAME, IFLA_INFO_KIND, IFLA_LINKINFO, IFLA_MTU, IfInfoMsg, RTM_DELLINK, RTM_GETLINK,
    RTM_NEWLINK, link_attrs, link_request, unique_ifname,
};

const NLM_F_CREATE: u16 = 0x400;
const NLM_F_EXCL: u16 = 0x200;

async fn dump_names(conn: &Connection) -> Result<Vec<(i32, String)>> {
    let mut buf = [0u8; SOCKET_BUFFER_SIZE];
    let mut req = link_request(&mut buf, RTM_GETLINK, 0)?;

    let mut links = Vec::new();
    conn.dump(&mut req, |msg| {
        let ifi: IfInfoMsg = msg.extra_header()?;
        let attrs = link_attrs(&msg)?;
        if let Some(name) = attrs.get(IFLA_IFNAME) {
            links.push((ifi.ifi_index, name.get_str_nul()?.to_string()));
        }
        Ok(Signal::Continue)
    })
    .await?;
    Ok(links)
}

async fn create_dummy(conn: &Connection, name: &str) -> Result<()> {
    let mut buf = [0u8; SOCKET_BUFFER_SIZE];
    let mut req = link_request(&mut buf, RTM_NEWLINK, NLM_F_CREATE | NLM_F_EXCL)?;
    req.put_str_nul(IFLA_IFNAME, name)?;
    let mut info = req.nest_start(IFLA_LINKINFO)?;
    info.put_str(IFLA_INFO_KIND, "dummy")?;
    info.end()?;
    conn.request_ack(&mut req).await
}

async fn delete_link(conn: &Connection, name: &str) -> Result<()> {
    let mut buf = [0u8; SOCKET_BUFFER_SIZE];
    let mut req = link_request(&mut buf, RTM_DELLINK, 0)?;
    req.put_str_nul(IFLA_IFNAME, name)?;
    conn.request_ack(&mut req).await
}

#[tokio::test]
async fn test_dump_finds_loopback() -> Result<()> {
    let conn = Connection::new(Protocol::Route)?;
    let links = dump_names(&conn).await?;
    assert!(!links.is_empty());
    assert!(
        links.iter().any(|(_, name)| name == "lo"),
        "lo should be listed: {links:?}"
    );
    Ok(())
}

#[tokio::test]
async fn test_get_loopback_by_name() -> Result<()> {
    let conn = Connection::new(Protocol::Route)?;
    let mut buf = [0u8; SOCKET_BUFFER_SIZE];
    let mut req = link_request(&mut buf, RTM_GETLINK, NLM_F_REQUEST)?;
    req.put_str_nul(IFLA_IFNAME, "lo")?;

    let mut mtu = None;
    conn.execute(&mut req, |msg| {
        let attrs = link_attrs(&msg)?;
        mtu = attrs.get(IFLA_MTU).map(|a| a.get_u32()).transpose()?;
        // A single reply, no NLMSG_DONE follows.
        Ok(Signal::Stop)
    })
    .await?;
    assert!(mtu.is_some_and(|m| m > 0));
    Ok(())
}

#[tokio::test]
async fn test_missing_link_is_not_found() -> Result<()> {
    let conn = Connection::new(Protocol::Route)?;
    let mut buf = [0u8; SOCKET_BUFFER_SIZE];
    let mut req = link_request(&mut buf, RTM_GETLINK, NLM_F_REQUEST | NLM_F_ACK)?;
    req.put_str_nul(IFLA_IFNAME, "nlwire-missing")?;

    let err = conn
        .execute(&mut req, |_| Ok(Signal::Continue))
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err}");
    Ok(())
}

#[tokio::test]
async fn test_create_and_delete_dummy() -> Result<()> {
    require_root!();

    let conn = Connection::new(Protocol::Route)?;
    let name = unique_ifname("d");

    create_dummy(&conn, &name).await?;
    let result = async {
        assert!(dump_names(&conn).await?.iter().any(|(_, n)| *n == name));

        let err = create_dummy(&conn, &name).await.unwrap_err();
        assert!(err.is_already_exists(), "unexpected error: {err}");
        Ok::<(), nlwire::Error>(())
    }
    .await;

    delete_link(&conn, &name).await?;
    assert!(!dump_names(&conn).await?.iter().any(|(_, n)| *n == name));
    result
}

#[tokio::test]
async fn test_unknown_kind_is_rejected() -> Result<()> {
    require_root!();

    let conn = Connection::new(Protocol::Route)?;
    let mut buf = [0u8; SOCKET_BUFFER_SIZE];
    let mut req = link_request(&mut buf, RTM_NEWLINK, NLM_F_CREATE | NLM_F_EXCL)?;
    req.put_str_nul(IFLA_IFNAME, &unique_ifname("x"))?;
    let mut info = req.nest_start(IFLA_LINKINFO)?;
    info.put_str(IFLA_INFO_KIND, "nlwire-bogus")?;
    info.end()?;

    let err = conn.request_ack(&mut req).await.unwrap_err();
    assert!(err.errno().is_some());
    Ok(())
}
