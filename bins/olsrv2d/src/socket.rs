use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::net::UdpSocket;

/// IANA "MANET" port (RFC 5498) shared by HELLO and TC traffic.
pub const MANET_PORT: u16 = 269;
/// LL-MANET-Routers IPv4 multicast group (RFC 5498).
pub const MANET_MCAST_V4: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 109);
/// LL-MANET-Routers IPv6 multicast group (RFC 5498).
pub const MANET_MCAST_V6: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 0x6d);

/// Bind a UDP socket for one interface and join the MANET multicast group
/// on it, scoped to `local_addr`. IPv4 scopes a multicast join by interface
/// address; IPv6 would need the interface's scope id, which this binary
/// does not resolve (see DESIGN.md) — IPv6 interfaces bind without joining.
pub async fn bind_interface_socket(local_addr: IpAddr) -> std::io::Result<UdpSocket> {
    let bind_addr = match local_addr {
        IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), MANET_PORT),
        IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), MANET_PORT),
    };

    let socket = UdpSocket::bind(bind_addr).await?;
    match local_addr {
        IpAddr::V4(v4) => socket.join_multicast_v4(MANET_MCAST_V4, v4)?,
        IpAddr::V6(_) => {}
    }
    Ok(socket)
}

/// Destination address for an outgoing HELLO/TC datagram on `family`.
pub fn multicast_target(local_addr: IpAddr) -> SocketAddr {
    match local_addr {
        IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(MANET_MCAST_V4), MANET_PORT),
        IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(MANET_MCAST_V6), MANET_PORT),
    }
}
