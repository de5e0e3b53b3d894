//! RFC 5444 packet codec: messages, TLVs, and the RFC 7181/5497
//! exponent-mantissa quantizations layered on top of it.

mod addr;
mod error;
mod message;
mod packet;
mod quantize;
mod seq;
mod tlv;

pub use addr::AddressFamily;
pub use error::{CodecError, CodecResult};
pub use message::{AddressBlockEntry, Message, MessageHeader};
pub use packet::{write_fragmented, MessageContentProvider, Packet, PacketReader};
pub use quantize::{
    metric_decode, metric_encode, metric_flags, pack_metric_tlv_value, time_decode_ms, time_encode_ms,
    unpack_metric_tlv_value, METRIC_INFINITE, METRIC_INFINITE_ENCODED,
};
pub use seq::is_newer;
pub use tlv::{nbr_addr_type, tlv_type, ContentSeqFlag, LinkStatusValue, LocalIf, OtherNeighbValue, Tlv};
