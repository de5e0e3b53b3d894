use std::net::IpAddr;

use ipnet::IpNet;
use nhdp::DomainId;
use rfc5444::{
    metric_encode, metric_flags, nbr_addr_type, pack_metric_tlv_value, tlv_type, AddressBlockEntry,
    AddressFamily, ContentSeqFlag, MessageContentProvider, MessageHeader, Tlv,
};

pub const TC_MSG_TYPE: u8 = 2;

/// One advertised neighbor in a TC message: its address, whether it's
/// routable/an originator (RFC 7181 §12.6), and its outgoing metric in each
/// domain this node advertises it for.
#[derive(Clone, Debug)]
pub struct TcNeighborAddr {
    pub addr: IpAddr,
    pub is_originator: bool,
    pub metrics: Vec<(DomainId, u32)>,
}

/// One attached (non-OLSR) network this node advertises reachability to,
/// with per-domain cost and hop distance.
#[derive(Clone, Debug)]
pub struct TcAttachedNetwork {
    pub prefix: IpNet,
    pub metrics: Vec<(DomainId, u32)>,
    pub distances: Vec<(DomainId, u8)>,
}

/// Builds TC messages advertising this node's MPR selector set (or full
/// advertised neighbor set, depending on willingness policy chosen by the
/// caller) plus any locally attached networks. Grounded on the writer's
/// split between per-fragment TLVs and the address block itself.
pub struct TcContentProvider {
    pub originator: IpAddr,
    pub family: AddressFamily,
    pub ansn: u16,
    pub hop_limit: u8,
    pub seq_num: u16,
    pub neighbors: Vec<TcNeighborAddr>,
    pub networks: Vec<TcAttachedNetwork>,
}

impl MessageContentProvider for TcContentProvider {
    fn message_header(&self) -> MessageHeader {
        MessageHeader {
            msg_type: TC_MSG_TYPE,
            addr_family: self.family,
            originator: Some(self.originator),
            hop_limit: Some(self.hop_limit),
            hop_count: Some(0),
            seq_num: Some(self.seq_num),
        }
    }

    fn message_tlvs(&self, complete: bool) -> Vec<Tlv> {
        let flag = if complete {
            ContentSeqFlag::Complete
        } else {
            ContentSeqFlag::Incomplete
        };
        vec![Tlv::new(
            tlv_type::CONTENT_SEQ_NUM,
            [self.ansn.to_be_bytes().as_slice(), &[flag.as_u8()]].concat(),
        )]
    }

    fn addresses(&self) -> Vec<AddressBlockEntry> {
        let mut out = Vec::with_capacity(self.neighbors.len() + self.networks.len());

        for n in &self.neighbors {
            let mut entry = AddressBlockEntry::new(n.addr, host_prefix_len(n.addr));
            let addr_type = if n.is_originator {
                nbr_addr_type::ROUTABLE | nbr_addr_type::ORIGINATOR
            } else {
                nbr_addr_type::ROUTABLE
            };
            entry = entry.with_tlv(Tlv::new(tlv_type::NBR_ADDR_TYPE, vec![addr_type]));
            for &(domain, metric) in &n.metrics {
                entry = entry.with_tlv(Tlv::with_ext(
                    tlv_type::LINK_METRIC,
                    domain,
                    pack_metric_tlv_value(metric_flags::OUTGOING_NEIGH, metric_encode(metric)).to_be_bytes().to_vec(),
                ));
            }
            out.push(entry);
        }

        for net in &self.networks {
            let mut entry = AddressBlockEntry::new(net.prefix.addr(), net.prefix.prefix_len());
            entry = entry.with_tlv(Tlv::new(tlv_type::NBR_ADDR_TYPE, vec![nbr_addr_type::ROUTABLE]));
            for &(domain, metric) in &net.metrics {
                entry = entry.with_tlv(Tlv::with_ext(
                    tlv_type::LINK_METRIC,
                    domain,
                    pack_metric_tlv_value(metric_flags::OUTGOING_NEIGH, metric_encode(metric)).to_be_bytes().to_vec(),
                ));
            }
            for &(domain, distance) in &net.distances {
                entry = entry.with_tlv(Tlv::with_ext(tlv_type::GATEWAY, domain, vec![distance]));
            }
            out.push(entry);
        }

        out
    }
}

fn host_prefix_len(addr: IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_single_fragment_tc() {
        let provider = TcContentProvider {
            originator: "10.0.0.1".parse().unwrap(),
            family: AddressFamily::V4,
            ansn: 7,
            hop_limit: 255,
            seq_num: 1,
            neighbors: vec![TcNeighborAddr {
                addr: "10.0.0.2".parse().unwrap(),
                is_originator: true,
                metrics: vec![(0, 100)],
            }],
            networks: vec![],
        };

        let mut provider = provider;
        let fragments = rfc5444::write_fragmented(&mut provider, 4096).unwrap();
        assert_eq!(fragments.len(), 1);

        let packet = rfc5444::Packet::decode(&{
            let mut buf = (1u16).to_be_bytes().to_vec();
            buf.extend_from_slice(&fragments[0]);
            buf
        })
        .unwrap();
        assert_eq!(packet.messages[0].header.msg_type, TC_MSG_TYPE);
        assert_eq!(packet.messages[0].addresses.len(), 1);
    }

    #[test]
    fn encodes_attached_network_with_gateway_distance() {
        let provider = TcContentProvider {
            originator: "10.0.0.1".parse().unwrap(),
            family: AddressFamily::V4,
            ansn: 1,
            hop_limit: 255,
            seq_num: 1,
            neighbors: vec![],
            networks: vec![TcAttachedNetwork {
                prefix: "192.168.0.0/24".parse().unwrap(),
                metrics: vec![(0, 50)],
                distances: vec![(0, 2)],
            }],
        };

        let mut provider = provider;
        let fragments = rfc5444::write_fragmented(&mut provider, 4096).unwrap();
        let packet = rfc5444::Packet::decode(&{
            let mut buf = (1u16).to_be_bytes().to_vec();
            buf.extend_from_slice(&fragments[0]);
            buf
        })
        .unwrap();

        let entry = &packet.messages[0].addresses[0];
        let gateway = entry.tlv(tlv_type::GATEWAY).unwrap();
        assert_eq!(gateway.ext_type, Some(0));
        assert_eq!(gateway.u8_value().unwrap(), 2);
    }
}
</content>
