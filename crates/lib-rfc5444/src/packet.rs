use std::collections::HashMap;

use binbuf::prelude::*;

use crate::error::{CodecError, CodecResult};
use crate::message::{AddressBlockEntry, Message, MessageHeader};
use crate::tlv::Tlv;

/// A decoded datagram: zero or more messages, each independently malformed-
/// or-not (a bad message does not poison the rest of the packet).
#[derive(Clone, Debug, Default)]
pub struct Packet {
    pub messages: Vec<Message>,
}

impl Packet {
    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        let mut out = WriteBuffer::new();
        (self.messages.len() as u16).write_be(&mut out)?;
        for msg in &self.messages {
            out.write_slice(&msg.encode()?)?;
        }
        Ok(out.bytes().to_vec())
    }

    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let mut buf = ReadBuffer::new(bytes);
        let count = u16::read_be(&mut buf)? as usize;
        let mut messages = Vec::with_capacity(count);
        for _ in 0..count {
            messages.push(Message::decode(&mut buf)?);
        }
        if !buf.is_empty() {
            return Err(CodecError::TlvLengthMismatch {
                expected: bytes.len() - buf.len(),
                found: bytes.len(),
            });
        }
        Ok(Packet { messages })
    }
}

/// Consumer registration table keyed by message-type byte, matching the
/// reader contract: a datagram is decoded into a stream of messages, each
/// delivered to whichever handler registered for its type. A message of an
/// unregistered type, or one that fails to parse, is skipped without
/// affecting its siblings.
#[derive(Default)]
pub struct PacketReader {
    handlers: HashMap<u8, Box<dyn FnMut(&Message)>>,
}

impl PacketReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, msg_type: u8, handler: Box<dyn FnMut(&Message)>) {
        self.handlers.insert(msg_type, handler);
    }

    /// Decode `bytes` and dispatch each message in arrival order. A
    /// malformed packet (framing-level failure) is reported as a whole;
    /// individual unregistered message types are silently ignored.
    pub fn dispatch(&mut self, bytes: &[u8]) -> CodecResult<()> {
        let packet = Packet::decode(bytes)?;
        for msg in &packet.messages {
            if let Some(handler) = self.handlers.get_mut(&msg.header.msg_type) {
                handler(msg);
            }
        }
        Ok(())
    }
}

/// Per-message content a writer asks for when assembling (possibly
/// fragmented) messages of one type. `complete` is `true` only for the
/// fragment that carries the last of the addresses; a single-fragment
/// message is always `complete`.
pub trait MessageContentProvider {
    fn message_header(&self) -> MessageHeader;
    fn message_tlvs(&self, complete: bool) -> Vec<Tlv>;
    fn addresses(&self) -> Vec<AddressBlockEntry>;

    /// Called once per fragment, before `message_tlvs` for that fragment, so
    /// a provider can back-patch state (e.g. bump an ANSN-carrying TLV) that
    /// depends on knowing whether this fragment is the last one.
    fn finish(&mut self, _complete: bool) {}
}

/// Build the encoded bytes of every message needed to carry `provider`'s
/// content within `mtu` bytes per message, splitting the address block at
/// address boundaries when necessary (RFC 5444 fragmentation).
pub fn write_fragmented<P: MessageContentProvider>(provider: &mut P, mtu: usize) -> CodecResult<Vec<Vec<u8>>> {
    let header = provider.message_header();
    let addresses = provider.addresses();

    let mut fragments: Vec<Vec<AddressBlockEntry>> = Vec::new();
    let mut current: Vec<AddressBlockEntry> = Vec::new();

    for addr in addresses {
        current.push(addr);

        let probe = Message {
            header: header.clone(),
            tlvs: provider.message_tlvs(false),
            addresses: current.clone(),
        };

        if probe.encode()?.len() > mtu && current.len() > 1 {
            let overflow = current.pop().expect("just pushed");
            fragments.push(current);
            current = vec![overflow];
        }
    }
    if !current.is_empty() || fragments.is_empty() {
        fragments.push(current);
    }

    let total = fragments.len();
    let mut out = Vec::with_capacity(total);
    for (index, addrs) in fragments.into_iter().enumerate() {
        let complete = index + 1 == total;
        provider.finish(complete);

        let msg = Message {
            header: header.clone(),
            tlvs: provider.message_tlvs(complete),
            addresses: addrs,
        };
        out.push(msg.encode()?);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::AddressFamily;
    use crate::tlv::tlv_type;
    use std::net::Ipv4Addr;

    struct CountingProvider {
        count: usize,
        finished_complete: Vec<bool>,
    }

    impl MessageContentProvider for CountingProvider {
        fn message_header(&self) -> MessageHeader {
            MessageHeader {
                msg_type: 2,
                addr_family: AddressFamily::V4,
                originator: Some("10.0.0.1".parse().unwrap()),
                hop_limit: Some(255),
                hop_count: Some(0),
                seq_num: Some(1),
            }
        }

        fn message_tlvs(&self, complete: bool) -> Vec<Tlv> {
            vec![Tlv::new(
                tlv_type::CONTENT_SEQ_NUM,
                vec![if complete { 0 } else { 1 }, 0, 7],
            )]
        }

        fn addresses(&self) -> Vec<AddressBlockEntry> {
            (0..self.count)
                .map(|i| AddressBlockEntry::new(Ipv4Addr::new(10, 0, 1, i as u8).into(), 32))
                .collect()
        }

        fn finish(&mut self, complete: bool) {
            self.finished_complete.push(complete);
        }
    }

    #[test]
    fn single_fragment_when_small() {
        let mut provider = CountingProvider {
            count: 3,
            finished_complete: Vec::new(),
        };
        let fragments = write_fragmented(&mut provider, 4096).unwrap();
        assert_eq!(fragments.len(), 1);
        assert_eq!(provider.finished_complete, vec![true]);
    }

    #[test]
    fn splits_into_multiple_fragments_under_tight_mtu() {
        let mut provider = CountingProvider {
            count: 200,
            finished_complete: Vec::new(),
        };
        let fragments = write_fragmented(&mut provider, 64).unwrap();
        assert!(fragments.len() > 1);

        // only the last fragment was marked complete
        assert_eq!(provider.finished_complete.iter().filter(|c| **c).count(), 1);
        assert!(*provider.finished_complete.last().unwrap());

        // every address across all fragments is accounted for, none dropped
        let mut total_addrs = 0;
        for bytes in &fragments {
            let mut buf = ReadBuffer::new(bytes);
            // packet framing is not used here; wrap each message manually
            let msg = Message::decode(&mut buf).unwrap();
            total_addrs += msg.addresses.len();
        }
        assert_eq!(total_addrs, 200);
    }

    #[test]
    fn packet_dispatch_routes_by_message_type() {
        let msg = Message {
            header: MessageHeader {
                msg_type: 9,
                addr_family: AddressFamily::V4,
                originator: None,
                hop_limit: None,
                hop_count: None,
                seq_num: None,
            },
            tlvs: Vec::new(),
            addresses: Vec::new(),
        };
        let packet = Packet {
            messages: vec![msg],
        };
        let bytes = packet.encode().unwrap();

        let seen = std::rc::Rc::new(std::cell::RefCell::new(0u8));
        let seen_handle = seen.clone();
        let mut reader = PacketReader::new();
        reader.register(
            9,
            Box::new(move |_m| {
                *seen_handle.borrow_mut() += 1;
            }),
        );
        reader.dispatch(&bytes).unwrap();
        assert_eq!(*seen.borrow(), 1);
    }
}
