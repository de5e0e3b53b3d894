use std::net::IpAddr;

use binbuf::prelude::*;

use crate::addr::{addr_from_octets, addr_octets, read_address, write_address, AddressFamily};
use crate::error::{CodecError, CodecResult};
use crate::tlv::Tlv;

/// Fixed fields of an RFC 5444 message header. `hop_limit`/`hop_count` are
/// present on messages that may be forwarded (TC); `seq_num` is present on
/// messages the duplicate set needs to dedupe (HELLO and TC both carry one).
#[derive(Clone, Debug)]
pub struct MessageHeader {
    pub msg_type: u8,
    pub addr_family: AddressFamily,
    pub originator: Option<IpAddr>,
    pub hop_limit: Option<u8>,
    pub hop_count: Option<u8>,
    pub seq_num: Option<u16>,
}

/// One address carried in a message's address block, with the TLVs attached
/// to it.
#[derive(Clone, Debug, PartialEq)]
pub struct AddressBlockEntry {
    pub addr: IpAddr,
    pub prefix_len: u8,
    pub tlvs: Vec<Tlv>,
}

impl AddressBlockEntry {
    pub fn new(addr: IpAddr, prefix_len: u8) -> Self {
        Self {
            addr,
            prefix_len,
            tlvs: Vec::new(),
        }
    }

    pub fn with_tlv(mut self, tlv: Tlv) -> Self {
        self.tlvs.push(tlv);
        self
    }

    pub fn tlv(&self, tlv_type: u8) -> Option<&Tlv> {
        self.tlvs.iter().find(|t| t.tlv_type == tlv_type)
    }

    /// All TLVs of `tlv_type` attached to this address, one per `ext_type`
    /// when a per-domain TLV (willingness, MPR, link-metric) is tagged more
    /// than once.
    pub fn tlvs(&self, tlv_type: u8) -> impl Iterator<Item = &Tlv> {
        self.tlvs.iter().filter(move |t| t.tlv_type == tlv_type)
    }
}

/// A fully decoded (or to-be-encoded) RFC 5444 message: header, message-TLVs,
/// and an address block.
#[derive(Clone, Debug)]
pub struct Message {
    pub header: MessageHeader,
    pub tlvs: Vec<Tlv>,
    pub addresses: Vec<AddressBlockEntry>,
}

impl Message {
    pub fn tlv(&self, tlv_type: u8) -> Option<&Tlv> {
        self.tlvs.iter().find(|t| t.tlv_type == tlv_type)
    }

    /// All message-TLVs of `tlv_type`, one per `ext_type` when a per-domain
    /// TLV (e.g. `WILLINGNESS`) is carried once per registered domain.
    pub fn tlvs(&self, tlv_type: u8) -> impl Iterator<Item = &Tlv> {
        self.tlvs.iter().filter(move |t| t.tlv_type == tlv_type)
    }

    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        let mut body = WriteBuffer::new();

        if let Some(origin) = self.header.originator {
            write_address(&mut body, origin)?;
        }
        if let Some(hop_limit) = self.header.hop_limit {
            body.push(hop_limit);
        }
        if let Some(hop_count) = self.header.hop_count {
            body.push(hop_count);
        }
        if let Some(seq) = self.header.seq_num {
            seq.write_be(&mut body)?;
        }

        (self.tlvs.len() as u16).write_be(&mut body)?;
        for tlv in &self.tlvs {
            tlv.write(&mut body)?;
        }

        let byte_len = self.header.addr_family.byte_len() as usize;
        let octets: Vec<Vec<u8>> = self.addresses.iter().map(|e| addr_octets(e.addr)).collect();
        let head_len = common_prefix_len(&octets).min(byte_len);
        let tail_len = common_suffix_len(&octets, byte_len - head_len);

        (self.addresses.len() as u16).write_be(&mut body)?;
        body.push(head_len as u8);
        if head_len > 0 {
            body.write_slice(&octets[0][..head_len])?;
        }
        body.push(tail_len as u8);
        if tail_len > 0 {
            body.write_slice(&octets[0][byte_len - tail_len..])?;
        }
        for (entry, bytes) in self.addresses.iter().zip(&octets) {
            body.write_slice(&bytes[head_len..byte_len - tail_len])?;
            body.push(entry.prefix_len);
            (entry.tlvs.len() as u16).write_be(&mut body)?;
            for tlv in &entry.tlvs {
                tlv.write(&mut body)?;
            }
        }

        let mut out = WriteBuffer::new();
        out.push(self.header.msg_type);

        let mut flags = 0u8;
        if self.header.originator.is_some() {
            flags |= 0x1;
        }
        if self.header.hop_limit.is_some() {
            flags |= 0x2;
        }
        if self.header.hop_count.is_some() {
            flags |= 0x4;
        }
        if self.header.seq_num.is_some() {
            flags |= 0x8;
        }
        if flags & 0xF0 != 0 {
            unreachable!("flag bits beyond the four header fields are never set");
        }
        out.push(flags);
        out.push(self.header.addr_family.byte_len());
        (body.len() as u16).write_be(&mut out)?;
        out.write_slice(body.bytes())?;

        Ok(out.bytes().to_vec())
    }

    pub(crate) fn decode(buf: &mut ReadBuffer) -> CodecResult<Self> {
        let msg_type = buf.pop()?;
        let flags = buf.pop()?;
        if flags & 0xF0 != 0 {
            return Err(CodecError::UnknownMandatoryField("message flags"));
        }

        let addr_family = AddressFamily::from_byte_len(buf.pop()?)?;
        let size = u16::read_be(buf)? as usize;
        let start = buf.offset();

        let originator = if flags & 0x1 != 0 {
            Some(read_address(buf, addr_family)?)
        } else {
            None
        };
        let hop_limit = if flags & 0x2 != 0 { Some(buf.pop()?) } else { None };
        let hop_count = if flags & 0x4 != 0 { Some(buf.pop()?) } else { None };
        let seq_num = if flags & 0x8 != 0 { Some(u16::read_be(buf)?) } else { None };

        let tlv_count = u16::read_be(buf)? as usize;
        let mut tlvs = Vec::with_capacity(tlv_count);
        for _ in 0..tlv_count {
            tlvs.push(Tlv::read(buf)?);
        }

        let addr_count = u16::read_be(buf)? as usize;
        let byte_len = addr_family.byte_len() as usize;
        let head_len = buf.pop()? as usize;
        let head = if head_len > 0 { buf.read_slice(head_len)?.to_vec() } else { Vec::new() };
        let tail_len = buf.pop()? as usize;
        let tail = if tail_len > 0 { buf.read_slice(tail_len)?.to_vec() } else { Vec::new() };
        if head_len + tail_len > byte_len {
            return Err(CodecError::UnknownMandatoryField("address block head/tail overruns address length"));
        }
        let mid_len = byte_len - head_len - tail_len;

        let mut addresses = Vec::with_capacity(addr_count);
        for _ in 0..addr_count {
            let mid = buf.read_slice(mid_len)?;
            let mut full = Vec::with_capacity(byte_len);
            full.extend_from_slice(&head);
            full.extend_from_slice(mid);
            full.extend_from_slice(&tail);
            let addr = addr_from_octets(addr_family, &full);

            let prefix_len = buf.pop()?;
            let atlv_count = u16::read_be(buf)? as usize;
            let mut atlvs = Vec::with_capacity(atlv_count);
            for _ in 0..atlv_count {
                atlvs.push(Tlv::read(buf)?);
            }
            addresses.push(AddressBlockEntry {
                addr,
                prefix_len,
                tlvs: atlvs,
            });
        }

        let consumed = buf.offset() - start;
        if consumed != size {
            return Err(CodecError::TlvLengthMismatch {
                expected: size,
                found: consumed,
            });
        }

        Ok(Message {
            header: MessageHeader {
                msg_type,
                addr_family,
                originator,
                hop_limit,
                hop_count,
                seq_num,
            },
            tlvs,
            addresses,
        })
    }
}

/// Longest byte run shared by every address at the front of the block, the
/// RFC 5444 §5.4 "head" compression: a block of addresses on the same
/// subnet shares most of its leading bytes, so only the differing middle is
/// carried per address.
fn common_prefix_len(octets: &[Vec<u8>]) -> usize {
    let Some(first) = octets.first() else { return 0 };
    (0..first.len())
        .take_while(|&i| octets.iter().all(|addr| addr[i] == first[i]))
        .count()
}

/// Longest byte run shared at the back of the block (the "tail"), bounded
/// by `max` so it never overlaps the already-claimed head.
fn common_suffix_len(octets: &[Vec<u8>], max: usize) -> usize {
    let Some(first) = octets.first() else { return 0 };
    (1..=max)
        .take_while(|&len| octets.iter().all(|addr| addr[addr.len() - len] == first[first.len() - len]))
        .last()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tlv::tlv_type;

    fn sample() -> Message {
        Message {
            header: MessageHeader {
                msg_type: 1,
                addr_family: AddressFamily::V4,
                originator: Some("10.0.0.1".parse().unwrap()),
                hop_limit: Some(255),
                hop_count: Some(0),
                seq_num: Some(42),
            },
            tlvs: vec![Tlv::new(tlv_type::VALIDITY_TIME, vec![0x80])],
            addresses: vec![AddressBlockEntry::new("10.0.0.2".parse().unwrap(), 32)
                .with_tlv(Tlv::with_ext(tlv_type::LOCAL_IF, 0, vec![1]))],
        }
    }

    #[test]
    fn roundtrips_message() {
        let msg = sample();
        let bytes = msg.encode().unwrap();
        let mut rb = ReadBuffer::new(&bytes);
        let decoded = Message::decode(&mut rb).unwrap();

        assert_eq!(decoded.header.msg_type, msg.header.msg_type);
        assert_eq!(decoded.header.originator, msg.header.originator);
        assert_eq!(decoded.header.seq_num, msg.header.seq_num);
        assert_eq!(decoded.tlvs, msg.tlvs);
        assert_eq!(decoded.addresses, msg.addresses);
    }

    #[test]
    fn rejects_truncated_message() {
        let msg = sample();
        let mut bytes = msg.encode().unwrap();
        bytes.truncate(bytes.len() - 2);
        let mut rb = ReadBuffer::new(&bytes);
        assert!(Message::decode(&mut rb).is_err());
    }

    #[test]
    fn shared_prefix_is_compressed_and_recovered() {
        let msg = Message {
            header: MessageHeader {
                msg_type: 2,
                addr_family: AddressFamily::V4,
                originator: None,
                hop_limit: None,
                hop_count: None,
                seq_num: None,
            },
            tlvs: Vec::new(),
            addresses: vec![
                AddressBlockEntry::new("10.0.1.1".parse().unwrap(), 32),
                AddressBlockEntry::new("10.0.1.2".parse().unwrap(), 32),
                AddressBlockEntry::new("10.0.1.3".parse().unwrap(), 32),
            ],
        };

        assert_eq!(common_prefix_len(&[vec![10, 0, 1, 1], vec![10, 0, 1, 2], vec![10, 0, 1, 3]]), 3);

        let bytes = msg.encode().unwrap();
        let mut rb = ReadBuffer::new(&bytes);
        let decoded = Message::decode(&mut rb).unwrap();
        assert_eq!(decoded.addresses, msg.addresses);
    }
}
