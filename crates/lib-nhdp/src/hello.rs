use std::collections::HashSet;
use std::net::IpAddr;

use rfc5444::{
    tlv_type, AddressBlockEntry, AddressFamily, LinkStatusValue, LocalIf, Message, MessageHeader, Tlv,
    time_decode_ms, time_encode_ms,
};

use crate::domain::DomainId;
use crate::error::{NhdpError, NhdpResult};

pub const HELLO_MSG_TYPE: u8 = 1;

/// One address carried in a HELLO's address block, with the subset of
/// per-address TLVs NHDP/OLSRv2 attach to link addresses. `mpr_domains` and
/// `link_metrics` are per domain: each domain gets its own MPR marker /
/// link-metric TLV, tagged with that domain's id as the TLV's `ext_type`.
#[derive(Clone, Debug)]
pub struct HelloAddr {
    pub addr: IpAddr,
    pub local_if: Option<LocalIf>,
    pub link_status: Option<LinkStatusValue>,
    pub mpr_domains: HashSet<DomainId>,
    /// Per-domain packed (flags << 12 | encoded-metric) value straight off
    /// the wire; see `rfc5444::{pack,unpack}_metric_tlv_value`.
    pub link_metrics: Vec<(DomainId, u16)>,
}

impl HelloAddr {
    pub fn new(addr: IpAddr) -> Self {
        Self {
            addr,
            local_if: None,
            link_status: None,
            mpr_domains: HashSet::new(),
            link_metrics: Vec::new(),
        }
    }
}

/// A decoded/to-be-encoded HELLO message (RFC 6130 §3, extended with RFC
/// 7181 willingness and per-link metric TLVs). `willingness` carries one
/// entry per registered domain.
#[derive(Clone, Debug)]
pub struct HelloMessage {
    pub originator: Option<IpAddr>,
    pub validity_ms: u64,
    pub interval_ms: u64,
    pub willingness: Vec<(DomainId, u8)>,
    pub addrs: Vec<HelloAddr>,
}

impl HelloMessage {
    pub fn encode(&self, family: AddressFamily) -> NhdpResult<Message> {
        let mut tlvs = vec![
            Tlv::new(tlv_type::VALIDITY_TIME, vec![time_encode_ms(self.validity_ms)]),
            Tlv::new(tlv_type::INTERVAL_TIME, vec![time_encode_ms(self.interval_ms)]),
        ];
        for &(domain, willingness) in &self.willingness {
            tlvs.push(Tlv::with_ext(tlv_type::WILLINGNESS, domain, vec![willingness]));
        }

        let mut addresses = Vec::with_capacity(self.addrs.len());
        for a in &self.addrs {
            let mut entry = AddressBlockEntry::new(a.addr, full_prefix_len(a.addr));
            if let Some(local_if) = a.local_if {
                entry = entry.with_tlv(Tlv::new(tlv_type::LOCAL_IF, vec![local_if.as_u8()]));
            }
            if let Some(status) = a.link_status {
                entry = entry.with_tlv(Tlv::new(tlv_type::LINK_STATUS, vec![status.as_u8()]));
            }
            for &domain in &a.mpr_domains {
                entry = entry.with_tlv(Tlv::marker(tlv_type::MPR, domain));
            }
            for &(domain, metric) in &a.link_metrics {
                entry = entry.with_tlv(Tlv::with_ext(tlv_type::LINK_METRIC, domain, metric.to_be_bytes().to_vec()));
            }
            addresses.push(entry);
        }

        Ok(Message {
            header: MessageHeader {
                msg_type: HELLO_MSG_TYPE,
                addr_family: family,
                originator: self.originator,
                hop_limit: None,
                hop_count: None,
                seq_num: None,
            },
            tlvs,
            addresses,
        })
    }

    pub fn decode(msg: &Message) -> NhdpResult<Self> {
        if msg.header.msg_type != HELLO_MSG_TYPE {
            return Err(NhdpError::MalformedHello("unexpected message type"));
        }

        let validity_ms = msg
            .tlv(tlv_type::VALIDITY_TIME)
            .ok_or(NhdpError::MalformedHello("missing VALIDITY_TIME"))?
            .u8_value()
            .map(time_decode_ms)
            .map_err(|_| NhdpError::MalformedHello("bad VALIDITY_TIME"))?;

        let interval_ms = msg
            .tlv(tlv_type::INTERVAL_TIME)
            .ok_or(NhdpError::MalformedHello("missing INTERVAL_TIME"))?
            .u8_value()
            .map(time_decode_ms)
            .map_err(|_| NhdpError::MalformedHello("bad INTERVAL_TIME"))?;

        let mut willingness = Vec::new();
        for t in msg.tlvs(tlv_type::WILLINGNESS) {
            let domain = t.ext_type.unwrap_or(0);
            let value = t.u8_value().map_err(|_| NhdpError::MalformedHello("bad WILLINGNESS"))?;
            willingness.push((domain, value));
        }
        if willingness.is_empty() {
            willingness.push((0, crate::domain::WILLINGNESS_DEFAULT));
        }

        let mut addrs = Vec::with_capacity(msg.addresses.len());
        for entry in &msg.addresses {
            let mut a = HelloAddr::new(entry.addr);
            if let Some(t) = entry.tlv(tlv_type::LOCAL_IF) {
                a.local_if = Some(LocalIf::from_u8(t.u8_value()?)?);
            }
            if let Some(t) = entry.tlv(tlv_type::LINK_STATUS) {
                a.link_status = Some(LinkStatusValue::from_u8(t.u8_value()?)?);
            }
            a.mpr_domains = entry.tlvs(tlv_type::MPR).map(|t| t.ext_type.unwrap_or(0)).collect();
            for t in entry.tlvs(tlv_type::LINK_METRIC) {
                let domain = t.ext_type.unwrap_or(0);
                a.link_metrics.push((domain, t.u16_value()?));
            }
            addrs.push(a);
        }

        Ok(HelloMessage {
            originator: msg.header.originator,
            validity_ms,
            interval_ms,
            willingness,
            addrs,
        })
    }
}

fn full_prefix_len(addr: IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_hello() {
        let mut mpr_domains = HashSet::new();
        mpr_domains.insert(0);

        let hello = HelloMessage {
            originator: Some("10.0.0.1".parse().unwrap()),
            validity_ms: 6000,
            interval_ms: 2000,
            willingness: vec![(0, 7)],
            addrs: vec![
                HelloAddr {
                    addr: "10.0.0.1".parse().unwrap(),
                    local_if: Some(LocalIf::ThisIf),
                    link_status: None,
                    mpr_domains: HashSet::new(),
                    link_metrics: Vec::new(),
                },
                HelloAddr {
                    addr: "10.0.0.2".parse().unwrap(),
                    local_if: None,
                    link_status: Some(LinkStatusValue::Symmetric),
                    mpr_domains,
                    link_metrics: vec![(
                        0,
                        rfc5444::pack_metric_tlv_value(rfc5444::metric_flags::OUTGOING_LINK, rfc5444::metric_encode(100)),
                    )],
                },
            ],
        };

        let encoded = hello.encode(AddressFamily::V4).unwrap();
        let packet = rfc5444::Packet {
            messages: vec![encoded],
        };
        let bytes = packet.encode().unwrap();
        let decoded_packet = rfc5444::Packet::decode(&bytes).unwrap();
        let decoded = HelloMessage::decode(&decoded_packet.messages[0]).unwrap();

        assert_eq!(decoded.validity_ms, 6000);
        assert_eq!(decoded.willingness, vec![(0, 7)]);
        assert_eq!(decoded.addrs.len(), 2);
        assert_eq!(decoded.addrs[1].link_status, Some(LinkStatusValue::Symmetric));
        assert!(decoded.addrs[1].mpr_domains.contains(&0));
        assert_eq!(decoded.addrs[1].link_metrics.len(), 1);
    }

    #[test]
    fn multi_domain_willingness_and_mpr_survive_the_wire() {
        let mut mpr_domains = HashSet::new();
        mpr_domains.insert(0);
        mpr_domains.insert(2);

        let hello = HelloMessage {
            originator: Some("10.0.0.1".parse().unwrap()),
            validity_ms: 6000,
            interval_ms: 2000,
            willingness: vec![(0, 7), (2, 3)],
            addrs: vec![HelloAddr {
                addr: "10.0.0.2".parse().unwrap(),
                local_if: None,
                link_status: Some(LinkStatusValue::Symmetric),
                mpr_domains,
                link_metrics: vec![(0, 100), (2, 200)],
            }],
        };

        let encoded = hello.encode(AddressFamily::V4).unwrap();
        let decoded = HelloMessage::decode(&encoded).unwrap();

        let mut willingness = decoded.willingness.clone();
        willingness.sort();
        assert_eq!(willingness, vec![(0, 7), (2, 3)]);
        assert!(decoded.addrs[0].mpr_domains.contains(&0));
        assert!(decoded.addrs[0].mpr_domains.contains(&2));
        assert_eq!(decoded.addrs[0].link_metrics.len(), 2);
    }
}
