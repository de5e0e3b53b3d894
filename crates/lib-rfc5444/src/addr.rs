use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use binbuf::prelude::*;

use crate::error::{CodecError, CodecResult};

/// Address family as carried in a message header's address-length byte.
/// Equality of addresses throughout this crate is family-then-bytes, which
/// falls directly out of comparing `std::net::IpAddr` values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    pub fn of(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => AddressFamily::V4,
            IpAddr::V6(_) => AddressFamily::V6,
        }
    }

    pub fn byte_len(self) -> u8 {
        match self {
            AddressFamily::V4 => 4,
            AddressFamily::V6 => 16,
        }
    }

    /// RFC 5444 requires the message address length to be 4 or 16 bytes.
    pub fn from_byte_len(len: u8) -> CodecResult<Self> {
        match len {
            4 => Ok(AddressFamily::V4),
            16 => Ok(AddressFamily::V6),
            other => Err(CodecError::InvalidAddressLength(other)),
        }
    }
}

pub(crate) fn read_address(buf: &mut ReadBuffer, family: AddressFamily) -> CodecResult<IpAddr> {
    let bytes = buf.read_slice(family.byte_len() as usize)?;
    Ok(match family {
        AddressFamily::V4 => IpAddr::V4(Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3])),
        AddressFamily::V6 => {
            let arr: [u8; 16] = bytes.try_into().expect("length checked by from_byte_len");
            IpAddr::V6(Ipv6Addr::from(arr))
        }
    })
}

pub(crate) fn write_address(buf: &mut WriteBuffer, addr: IpAddr) -> CodecResult<()> {
    match addr {
        IpAddr::V4(v4) => buf.write_slice(&v4.octets())?,
        IpAddr::V6(v6) => buf.write_slice(&v6.octets())?,
    }
    Ok(())
}

/// Raw octets of an address, for the address-block head/tail compression in
/// `message.rs` (which needs to compare and splice byte ranges rather than
/// write a whole address at once).
pub(crate) fn addr_octets(addr: IpAddr) -> Vec<u8> {
    match addr {
        IpAddr::V4(v4) => v4.octets().to_vec(),
        IpAddr::V6(v6) => v6.octets().to_vec(),
    }
}

/// Inverse of `addr_octets`. `bytes` must be exactly `family.byte_len()`
/// long, which the address-block reader guarantees by construction.
pub(crate) fn addr_from_octets(family: AddressFamily, bytes: &[u8]) -> IpAddr {
    match family {
        AddressFamily::V4 => {
            let arr: [u8; 4] = bytes.try_into().expect("address block enforces family byte length");
            IpAddr::V4(Ipv4Addr::from(arr))
        }
        AddressFamily::V6 => {
            let arr: [u8; 16] = bytes.try_into().expect("address block enforces family byte length");
            IpAddr::V6(Ipv6Addr::from(arr))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_v4_and_v6() {
        for addr in ["10.0.0.1".parse().unwrap(), "fe80::1".parse().unwrap()] {
            let family = AddressFamily::of(addr);
            let mut wb = WriteBuffer::new();
            write_address(&mut wb, addr).unwrap();
            let mut rb = ReadBuffer::new(wb.bytes());
            assert_eq!(read_address(&mut rb, family).unwrap(), addr);
        }
    }

    #[test]
    fn rejects_bad_address_length() {
        assert!(AddressFamily::from_byte_len(6).is_err());
    }
}
