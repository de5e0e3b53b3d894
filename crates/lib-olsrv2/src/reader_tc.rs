use std::time::Instant;

use ipnet::IpNet;
use rfc5444::{metric_decode, nbr_addr_type, tlv_type, unpack_metric_tlv_value, ContentSeqFlag, Message};

use crate::error::{Olsrv2Error, Olsrv2Result};
use crate::tc::{TcDb, TcEdge, TcEndpoint};
use crate::writer_tc::TC_MSG_TYPE;

/// Decode one received TC message fragment and fold it into `tc`. A
/// multi-fragment advertisement calls this once per fragment, in arrival
/// order, with the same (originator, ansn); `TcDb::merge_fragment` extends
/// rather than replaces when the ansn is unchanged, so fragments accumulate
/// correctly.
///
/// Per address: an `ORIGINATOR` bit in `NBR_ADDR_TYPE` means this is another
/// `tc_node` — one edge is recorded per domain-tagged `LINK_METRIC` TLV.
/// Otherwise, a `GATEWAY` TLV present means this is an attached endpoint —
/// one per domain-tagged `GATEWAY` TLV, its one-byte value the hop distance,
/// paired with that domain's `LINK_METRIC` TLV for cost. `is_virtual` on
/// decoded edges is always `false`; it is resolved locally by `TcDb`, never
/// carried on the wire.
pub fn ingest_tc_fragment(tc: &mut TcDb, msg: &Message, now: Instant, validity_ms: u64) -> Olsrv2Result<bool> {
    if msg.header.msg_type != TC_MSG_TYPE {
        return Err(Olsrv2Error::MalformedTc("unexpected message type"));
    }
    let originator = msg
        .header
        .originator
        .ok_or(Olsrv2Error::MalformedTc("missing originator"))?;

    let ansn = msg
        .tlv(tlv_type::CONTENT_SEQ_NUM)
        .ok_or(Olsrv2Error::MalformedTc("missing CONTENT_SEQ_NUM"))?;
    let ansn_bytes = &ansn.value;
    if ansn_bytes.len() < 3 {
        return Err(Olsrv2Error::MalformedTc("short CONTENT_SEQ_NUM"));
    }
    let seq = u16::from_be_bytes([ansn_bytes[0], ansn_bytes[1]]);
    let _complete = ContentSeqFlag::from_u8(ansn_bytes[2]);

    let mut edges = Vec::new();
    let mut endpoints = Vec::new();

    for entry in &msg.addresses {
        let Some(addr_type) = entry.tlv(tlv_type::NBR_ADDR_TYPE) else {
            continue;
        };
        let addr_type = addr_type.u8_value().map_err(|_| Olsrv2Error::MalformedTc("bad NBR_ADDR_TYPE"))?;

        if addr_type & nbr_addr_type::ORIGINATOR != 0 {
            for t in entry.tlvs(tlv_type::LINK_METRIC) {
                let domain = t.ext_type.unwrap_or(0);
                let metric = metric_decode(unpack_metric_tlv_value(t.u16_value().map_err(|_| {
                    Olsrv2Error::MalformedTc("bad LINK_METRIC")
                })?).1);
                edges.push(TcEdge {
                    domain,
                    to_originator: entry.addr,
                    metric,
                    is_virtual: false,
                });
            }
        } else if addr_type & nbr_addr_type::ROUTABLE != 0 {
            let Ok(prefix) = IpNet::new(entry.addr, entry.prefix_len) else {
                continue;
            };
            for gw in entry.tlvs(tlv_type::GATEWAY) {
                let domain = gw.ext_type.unwrap_or(0);
                let distance = gw.u8_value().map_err(|_| Olsrv2Error::MalformedTc("bad GATEWAY"))?;
                let metric = entry
                    .tlvs(tlv_type::LINK_METRIC)
                    .find(|t| t.ext_type.unwrap_or(0) == domain)
                    .map(|t| t.u16_value().map(|raw| unpack_metric_tlv_value(raw).1))
                    .transpose()
                    .map_err(|_| Olsrv2Error::MalformedTc("bad LINK_METRIC"))?
                    .map(metric_decode)
                    .unwrap_or(rfc5444::METRIC_INFINITE);
                endpoints.push(TcEndpoint { domain, prefix, metric, distance });
            }
        }
    }

    Ok(tc.merge_fragment(originator, seq, edges, endpoints, now, validity_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer_tc::{TcAttachedNetwork, TcContentProvider, TcNeighborAddr};
    use rfc5444::{AddressFamily, MessageContentProvider};

    fn encode(provider: &mut TcContentProvider) -> Message {
        let fragments = rfc5444::write_fragmented(provider, 4096).unwrap();
        assert_eq!(fragments.len(), 1);
        let mut buf = (1u16).to_be_bytes().to_vec();
        buf.extend_from_slice(&fragments[0]);
        let packet = rfc5444::Packet::decode(&buf).unwrap();
        packet.messages[0].clone()
    }

    #[test]
    fn ingests_neighbor_edge_per_domain() {
        let mut provider = TcContentProvider {
            originator: "10.0.0.1".parse().unwrap(),
            family: AddressFamily::V4,
            ansn: 1,
            hop_limit: 255,
            seq_num: 1,
            neighbors: vec![TcNeighborAddr {
                addr: "10.0.0.2".parse().unwrap(),
                is_originator: true,
                metrics: vec![(0, 10), (1, 20)],
            }],
            networks: vec![],
        };
        let msg = encode(&mut provider);

        let mut tc = TcDb::new();
        let now = Instant::now();
        ingest_tc_fragment(&mut tc, &msg, now, 60_000).unwrap();

        let id = tc.node_by_originator(&"10.0.0.1".parse().unwrap()).unwrap();
        let edges = tc.edges(id);
        assert_eq!(edges.len(), 2);
        assert!(edges.iter().any(|e| e.domain == 0 && e.metric == 10));
        assert!(edges.iter().any(|e| e.domain == 1 && e.metric == 20));
    }

    #[test]
    fn ingests_attached_network_with_distance() {
        let mut provider = TcContentProvider {
            originator: "10.0.0.1".parse().unwrap(),
            family: AddressFamily::V4,
            ansn: 1,
            hop_limit: 255,
            seq_num: 1,
            neighbors: vec![],
            networks: vec![TcAttachedNetwork {
                prefix: "192.168.0.0/24".parse().unwrap(),
                metrics: vec![(0, 50)],
                distances: vec![(0, 3)],
            }],
        };
        let msg = encode(&mut provider);

        let mut tc = TcDb::new();
        let now = Instant::now();
        ingest_tc_fragment(&mut tc, &msg, now, 60_000).unwrap();

        let id = tc.node_by_originator(&"10.0.0.1".parse().unwrap()).unwrap();
        let endpoints = tc.endpoints(id);
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].distance, 3);
        assert_eq!(endpoints[0].metric, 50);
    }
}
</content>
