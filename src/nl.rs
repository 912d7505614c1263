//! This module contains the top level netlink header code. Every
//! netlink message will be encapsulated in a top level `Nlmsghdr`.
//!
//! [`Nlmsghdr`] is the structure representing a header that all
//! netlink protocols require to be passed to the correct destination.
//! [`Nfgenmsg`] is the netfilter family header that follows it on
//! every conntrack message, carrying the address family and the
//! attribute body.
//!
//! # Design decisions
//!
//! Payloads for [`Nlmsghdr`] can be any type that implements [`Nl`];
//! the dispatcher receives messages as `Nlmsghdr<Buffer>` and decides
//! from `nl_type` how to interpret the raw payload.

use crate::{
    consts::{ct::NlAttrType, nl::NlmF},
    err::{DeError, SerError},
    types::{AttrBuffer, Buffer, DeBuffer, SerBuffer},
    Nl,
};

/// Length of the fixed netlink message header.
pub const NLMSG_HDRLEN: usize = 16;

/// Length of the fixed netfilter family header.
pub const NFGENMSG_HDRLEN: usize = 4;

/// Read the claimed length of the netlink message starting at `pos`.
pub(crate) fn packet_length(mem: &[u8], pos: usize) -> usize {
    let mut len = [0u8; 4];
    len.copy_from_slice(&mem[pos..pos + 4]);
    u32::from_ne_bytes(len) as usize
}

/// Top level netlink header and payload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Nlmsghdr<P> {
    /// Length of the netlink message
    pub nl_len: u32,
    /// Type of the netlink message
    pub nl_type: u16,
    /// Flags indicating properties of the request or response
    pub nl_flags: NlmF,
    /// Sequence number for netlink protocol
    pub nl_seq: u32,
    /// ID of the netlink destination for requests and source for
    /// responses
    pub nl_pid: u32,
    /// Payload of netlink message
    pub nl_payload: P,
}

impl<P> Nlmsghdr<P>
where
    P: Nl,
{
    /// Create a new top level netlink packet with a payload
    pub fn new(
        nl_len: Option<u32>,
        nl_type: u16,
        nl_flags: NlmF,
        nl_seq: Option<u32>,
        nl_pid: Option<u32>,
        nl_payload: P,
    ) -> Self {
        let mut nl = Nlmsghdr {
            nl_len: 0,
            nl_type,
            nl_flags,
            nl_seq: nl_seq.unwrap_or(0),
            nl_pid: nl_pid.unwrap_or(0),
            nl_payload,
        };
        nl.nl_len = nl_len.unwrap_or(nl.size() as u32);
        nl
    }
}

impl<P> Nl for Nlmsghdr<P>
where
    P: Nl,
{
    fn serialize(&self, mem: SerBuffer) -> Result<(), SerError> {
        if mem.len() != self.size() {
            return Err(SerError::UnexpectedEOB);
        }
        self.nl_len.serialize(&mut mem[0..4])?;
        self.nl_type.serialize(&mut mem[4..6])?;
        self.nl_flags.serialize(&mut mem[6..8])?;
        self.nl_seq.serialize(&mut mem[8..12])?;
        self.nl_pid.serialize(&mut mem[12..16])?;
        self.nl_payload.serialize(&mut mem[NLMSG_HDRLEN..])?;
        Ok(())
    }

    fn deserialize(mem: DeBuffer) -> Result<Self, DeError> {
        if mem.len() < NLMSG_HDRLEN {
            return Err(DeError::UnexpectedEOB);
        }
        let nl_len = u32::deserialize(&mem[0..4])?;
        if (nl_len as usize) < NLMSG_HDRLEN || nl_len as usize > mem.len() {
            return Err(DeError::UnexpectedEOB);
        }
        Ok(Nlmsghdr {
            nl_len,
            nl_type: u16::deserialize(&mem[4..6])?,
            nl_flags: NlmF::deserialize(&mem[6..8])?,
            nl_seq: u32::deserialize(&mem[8..12])?,
            nl_pid: u32::deserialize(&mem[12..16])?,
            nl_payload: P::deserialize(&mem[NLMSG_HDRLEN..nl_len as usize])?,
        })
    }

    fn size(&self) -> usize {
        NLMSG_HDRLEN + self.nl_payload.size()
    }

    fn type_size() -> Option<usize> {
        None
    }
}

/// Struct representing the contents of an error or ACK packet
/// returned by netlink. An `error` of 0 is an ACK.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Nlmsgerr {
    /// Error code; negative errno, or 0 for an ACK
    pub error: libc::c_int,
    /// Echoed header of the request that triggered the response
    pub nlmsg: Buffer,
}

impl Nl for Nlmsgerr {
    fn serialize(&self, mem: SerBuffer) -> Result<(), SerError> {
        if mem.len() != self.size() {
            return Err(SerError::UnexpectedEOB);
        }
        self.error.serialize(&mut mem[0..4])?;
        self.nlmsg.serialize(&mut mem[4..])?;
        Ok(())
    }

    fn deserialize(mem: DeBuffer) -> Result<Self, DeError> {
        if mem.len() < 4 {
            return Err(DeError::UnexpectedEOB);
        }
        Ok(Nlmsgerr {
            error: i32::deserialize(&mem[0..4])?,
            nlmsg: Buffer::from(&mem[4..]),
        })
    }

    fn size(&self) -> usize {
        4 + self.nlmsg.len()
    }

    fn type_size() -> Option<usize> {
        None
    }
}

/// The netfilter family header plus attribute body: the payload of
/// every conntrack and expectation message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Nfgenmsg<T> {
    /// Address family the message applies to (`AF_INET` here)
    pub family: u8,
    /// Netfilter netlink revision, [`NFNETLINK_V0`][crate::consts::nfnl::NFNETLINK_V0]
    pub version: u8,
    /// Resource id, big endian on the wire; unused by conntrack
    pub res_id: u16,
    /// Attributes included in the message body
    pub attrs: AttrBuffer<T>,
}

impl<T> Nfgenmsg<T>
where
    T: NlAttrType,
{
    /// Create a new netfilter message payload
    pub fn new(family: u8, version: u8, res_id: u16, attrs: AttrBuffer<T>) -> Self {
        Nfgenmsg {
            family,
            version,
            res_id,
            attrs,
        }
    }
}

impl<T> Nl for Nfgenmsg<T>
where
    T: NlAttrType,
{
    fn serialize(&self, mem: SerBuffer) -> Result<(), SerError> {
        if mem.len() != self.size() {
            return Err(SerError::UnexpectedEOB);
        }
        self.family.serialize(&mut mem[0..1])?;
        self.version.serialize(&mut mem[1..2])?;
        u16::to_be(self.res_id).serialize(&mut mem[2..4])?;
        self.attrs.serialize(&mut mem[NFGENMSG_HDRLEN..])?;
        Ok(())
    }

    fn deserialize(mem: DeBuffer) -> Result<Self, DeError> {
        if mem.len() < NFGENMSG_HDRLEN {
            return Err(DeError::UnexpectedEOB);
        }
        Ok(Nfgenmsg {
            family: u8::deserialize(&mem[0..1])?,
            version: u8::deserialize(&mem[1..2])?,
            res_id: u16::from_be(u16::deserialize(&mem[2..4])?),
            attrs: AttrBuffer::deserialize(&mem[NFGENMSG_HDRLEN..])?,
        })
    }

    fn size(&self) -> usize {
        NFGENMSG_HDRLEN + self.attrs.size()
    }

    fn type_size() -> Option<usize> {
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use std::io::Cursor;

    use byteorder::{NativeEndian, WriteBytesExt};

    use crate::{
        attr::Nlattr,
        consts::{ct::CtAttr, nfnl::nfnl_msg_type, nl::Nlmsg},
    };

    #[test]
    fn test_nlmsghdr_serialize() {
        let nl = Nlmsghdr::new(
            None,
            Nlmsg::Noop.into(),
            NlmF::empty(),
            None,
            None,
            Buffer::new(),
        );
        let mem = crate::serialize(&nl, true).unwrap();
        let mut s = [0u8; 16];
        {
            let mut c = Cursor::new(&mut s as &mut [u8]);
            c.write_u32::<NativeEndian>(16).unwrap();
            c.write_u16::<NativeEndian>(1).unwrap();
        };
        assert_eq!(&s, mem.as_slice())
    }

    #[test]
    fn test_nlmsghdr_deserialize() {
        let mut s = [0u8; 16];
        {
            let mut c = Cursor::new(&mut s as &mut [u8]);
            c.write_u32::<NativeEndian>(16).unwrap();
            c.write_u16::<NativeEndian>(1).unwrap();
            c.write_u16::<NativeEndian>(NlmF::ACK.bits()).unwrap();
        }
        let nl = Nlmsghdr::<Buffer>::deserialize(&s as &[u8]).unwrap();
        assert_eq!(nl.nl_type, u16::from(Nlmsg::Noop));
        assert_eq!(nl.nl_flags, NlmF::ACK);
        assert!(nl.nl_payload.is_empty());
    }

    #[test]
    fn test_nfgenmsg_round_trip() {
        let mut attrs = AttrBuffer::new();
        attrs.push(Nlattr::new(CtAttr::Timeout, u32::to_be(300)).unwrap());
        let nf = Nfgenmsg::new(libc::AF_INET as u8, 0, 0, attrs);
        let nl = Nlmsghdr::new(
            None,
            nfnl_msg_type(1, 0),
            NlmF::REQUEST | NlmF::ACK,
            Some(1),
            None,
            nf.clone(),
        );
        assert_eq!(nl.nl_len as usize, 16 + 4 + 8);

        let mem = crate::serialize(&nl, true).unwrap();
        let raw = Nlmsghdr::<Buffer>::deserialize(&mem).unwrap();
        let parsed = Nfgenmsg::<CtAttr>::deserialize(raw.nl_payload.as_ref()).unwrap();
        assert_eq!(parsed, nf);
    }

    #[test]
    fn test_nlmsgerr_ack() {
        let mut mem = Vec::new();
        mem.extend_from_slice(&0i32.to_ne_bytes());
        mem.extend_from_slice(&[0u8; 16]);
        let err = Nlmsgerr::deserialize(&mem).unwrap();
        assert_eq!(err.error, 0);
        assert_eq!(err.nlmsg.len(), 16);
    }
}
