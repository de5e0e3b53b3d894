use binbuf::prelude::*;

use crate::error::{CodecError, CodecResult};

/// TLV type identifiers, per the IANA "RFC5444 Message TLV Types" and
/// "RFC5444 Address Block TLV Types" registries (RFC 5497 §4, RFC 6130 §16.2,
/// RFC 7181 §18.3). Message TLVs and address-block TLVs are distinct type
/// spaces (they live in separate TLV lists on the wire), so the two groups
/// below may legitimately reuse the same numeric values.
pub mod tlv_type {
    // Message TLVs.
    pub const VALIDITY_TIME: u8 = 1;
    pub const INTERVAL_TIME: u8 = 2;
    pub const WILLINGNESS: u8 = 3;
    pub const CONTENT_SEQ_NUM: u8 = 4;

    // Address-block TLVs.
    pub const LOCAL_IF: u8 = 1;
    pub const LINK_STATUS: u8 = 2;
    pub const OTHER_NEIGHB: u8 = 3;
    pub const LINK_METRIC: u8 = 4;
    pub const MPR: u8 = 5;
    pub const NBR_ADDR_TYPE: u8 = 6;
    pub const GATEWAY: u8 = 7;
}

/// Value of a [`tlv_type::LOCAL_IF`] address TLV (RFC 6130 §7.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocalIf {
    ThisIf,
    OtherIf,
}

impl LocalIf {
    pub fn as_u8(self) -> u8 {
        match self {
            LocalIf::ThisIf => 0,
            LocalIf::OtherIf => 1,
        }
    }

    pub fn from_u8(value: u8) -> CodecResult<Self> {
        match value {
            0 => Ok(LocalIf::ThisIf),
            1 => Ok(LocalIf::OtherIf),
            _ => Err(CodecError::UnknownMandatoryField("LOCAL_IF value")),
        }
    }
}

/// Value of a [`tlv_type::LINK_STATUS`] address TLV.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkStatusValue {
    Symmetric,
    Heard,
    Lost,
}

impl LinkStatusValue {
    pub fn as_u8(self) -> u8 {
        match self {
            LinkStatusValue::Symmetric => 0,
            LinkStatusValue::Heard => 1,
            LinkStatusValue::Lost => 2,
        }
    }

    pub fn from_u8(value: u8) -> CodecResult<Self> {
        match value {
            0 => Ok(LinkStatusValue::Symmetric),
            1 => Ok(LinkStatusValue::Heard),
            2 => Ok(LinkStatusValue::Lost),
            _ => Err(CodecError::UnknownMandatoryField("LINK_STATUS value")),
        }
    }
}

/// Value of an [`tlv_type::OTHER_NEIGHB`] address TLV.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OtherNeighbValue {
    Symmetric,
    Lost,
}

impl OtherNeighbValue {
    pub fn as_u8(self) -> u8 {
        match self {
            OtherNeighbValue::Symmetric => 0,
            OtherNeighbValue::Lost => 1,
        }
    }

    pub fn from_u8(value: u8) -> CodecResult<Self> {
        match value {
            0 => Ok(OtherNeighbValue::Symmetric),
            1 => Ok(OtherNeighbValue::Lost),
            _ => Err(CodecError::UnknownMandatoryField("OTHER_NEIGHB value")),
        }
    }
}

/// Bits set in a [`tlv_type::NBR_ADDR_TYPE`] address TLV (RFC 7181 §12.6).
pub mod nbr_addr_type {
    pub const ROUTABLE: u8 = 0x1;
    pub const ORIGINATOR: u8 = 0x2;
}

/// Flag carried in a [`tlv_type::CONTENT_SEQ_NUM`] message TLV, signalling
/// whether this message carries the complete address set or is one of
/// several fragments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentSeqFlag {
    Complete,
    Incomplete,
}

impl ContentSeqFlag {
    pub fn as_u8(self) -> u8 {
        match self {
            ContentSeqFlag::Complete => 1,
            ContentSeqFlag::Incomplete => 0,
        }
    }

    pub fn from_u8(value: u8) -> Self {
        if value != 0 {
            ContentSeqFlag::Complete
        } else {
            ContentSeqFlag::Incomplete
        }
    }
}

/// A single TLV: a type, an optional per-domain extension type, and a
/// (possibly empty) value. Attached either to a message or to one address in
/// an address block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tlv {
    pub tlv_type: u8,
    pub ext_type: Option<u8>,
    pub value: Vec<u8>,
}

impl Tlv {
    pub fn new(tlv_type: u8, value: Vec<u8>) -> Self {
        Self {
            tlv_type,
            ext_type: None,
            value,
        }
    }

    pub fn with_ext(tlv_type: u8, ext_type: u8, value: Vec<u8>) -> Self {
        Self {
            tlv_type,
            ext_type: Some(ext_type),
            value,
        }
    }

    pub fn marker(tlv_type: u8, ext_type: u8) -> Self {
        Self::with_ext(tlv_type, ext_type, Vec::new())
    }

    pub fn u8_value(&self) -> CodecResult<u8> {
        self.value
            .first()
            .copied()
            .ok_or(CodecError::UnknownMandatoryField("empty TLV value"))
    }

    pub fn u16_value(&self) -> CodecResult<u16> {
        let bytes: [u8; 2] = self
            .value
            .get(..2)
            .ok_or(CodecError::UnknownMandatoryField("short TLV value"))?
            .try_into()
            .expect("checked length");
        Ok(u16::from_be_bytes(bytes))
    }

    pub(crate) fn read(buf: &mut ReadBuffer) -> CodecResult<Self> {
        let tlv_type = buf.pop()?;
        let flags = buf.pop()?;
        if flags & 0xF8 != 0 {
            return Err(CodecError::UnknownMandatoryField("tlv flags"));
        }

        let ext_type = if flags & 0x1 != 0 { Some(buf.pop()?) } else { None };
        let value = if flags & 0x2 != 0 {
            let len = u16::read_be(buf)? as usize;
            buf.read_vec(len)?
        } else {
            Vec::new()
        };

        Ok(Self {
            tlv_type,
            ext_type,
            value,
        })
    }

    pub(crate) fn write(&self, buf: &mut WriteBuffer) -> CodecResult<()> {
        buf.push(self.tlv_type);

        let mut flags = 0u8;
        if self.ext_type.is_some() {
            flags |= 0x1;
        }
        if !self.value.is_empty() {
            flags |= 0x2;
        }
        buf.push(flags);

        if let Some(ext) = self.ext_type {
            buf.push(ext);
        }
        if !self.value.is_empty() {
            (self.value.len() as u16).write_be(buf)?;
            buf.write_slice(&self.value)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(tlv: &Tlv) -> Tlv {
        let mut wb = WriteBuffer::new();
        tlv.write(&mut wb).unwrap();
        let mut rb = ReadBuffer::new(wb.bytes());
        Tlv::read(&mut rb).unwrap()
    }

    #[test]
    fn roundtrips_plain_tlv() {
        let tlv = Tlv::new(tlv_type::VALIDITY_TIME, vec![0x42]);
        assert_eq!(roundtrip(&tlv), tlv);
    }

    #[test]
    fn roundtrips_ext_type_and_marker() {
        let tlv = Tlv::with_ext(tlv_type::LINK_METRIC, 3, vec![0xAB, 0xCD]);
        assert_eq!(roundtrip(&tlv), tlv);

        let marker = Tlv::marker(tlv_type::MPR, 0);
        assert_eq!(roundtrip(&marker), marker);
    }

    #[test]
    fn rejects_unknown_flag_bits() {
        let mut wb = WriteBuffer::new();
        wb.push(tlv_type::VALIDITY_TIME);
        wb.push(0xFF);
        let mut rb = ReadBuffer::new(wb.bytes());
        assert!(Tlv::read(&mut rb).is_err());
    }
}
