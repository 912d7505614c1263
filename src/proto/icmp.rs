//! ICMP protocol handler. ICMP query flows are identified by the
//! message type, code and query id rather than a port pair.

use std::fmt;

use crate::{
    attr::{AttrHandle, Nlattr},
    consts::ct::ProtoAttr,
    ct::{ProtoTuple, Tuple},
    err::{DeError, SerError},
    proto::ProtoHandler,
    types::AttrBuffer,
};

/// Handler for ICMP tuples.
pub struct Icmp;

impl ProtoHandler for Icmp {
    fn name(&self) -> &'static str {
        "icmp"
    }

    fn protonum(&self) -> u8 {
        libc::IPPROTO_ICMP as u8
    }

    fn version(&self) -> &'static str {
        crate::VERSION
    }

    fn build_tuple_proto(
        &self,
        tuple: &Tuple,
        attrs: &mut AttrBuffer<ProtoAttr>,
    ) -> Result<(), SerError> {
        if let ProtoTuple::Icmp { id, ty, code } = tuple.l4 {
            attrs.push(Nlattr::new(ProtoAttr::IcmpType, ty)?);
            attrs.push(Nlattr::new(ProtoAttr::IcmpCode, code)?);
            attrs.push(Nlattr::new(ProtoAttr::IcmpId, u16::to_be(id))?);
        }
        Ok(())
    }

    fn parse_tuple_proto(
        &self,
        handle: &AttrHandle<ProtoAttr>,
        tuple: &mut Tuple,
    ) -> Result<(), DeError> {
        let mut id = 0;
        let mut ty = 0;
        let mut code = 0;
        if let Some(attr) = handle.get_attribute(ProtoAttr::IcmpType) {
            ty = attr.get_payload_as()?;
        }
        if let Some(attr) = handle.get_attribute(ProtoAttr::IcmpCode) {
            code = attr.get_payload_as()?;
        }
        if let Some(attr) = handle.get_attribute(ProtoAttr::IcmpId) {
            id = u16::from_be(attr.get_payload_as()?);
        }
        tuple.l4 = ProtoTuple::Icmp { id, ty, code };
        Ok(())
    }

    fn fmt_tuple_proto(&self, tuple: &Tuple, f: &mut dyn fmt::Write) -> fmt::Result {
        if let ProtoTuple::Icmp { id, ty, code } = tuple.l4 {
            write!(f, "type={} code={} id={} ", ty, code, id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_icmp_tuple_round_trip() {
        let handler = Icmp;
        let tuple = Tuple::new(
            std::net::Ipv4Addr::new(10, 0, 0, 1),
            std::net::Ipv4Addr::new(10, 0, 0, 2),
            ProtoTuple::Icmp {
                id: 0xbeef,
                ty: 8,
                code: 0,
            },
        );
        let mut attrs = AttrBuffer::new();
        handler.build_tuple_proto(&tuple, &mut attrs).unwrap();
        let mem = crate::serialize(&attrs, false).unwrap();

        let mut parsed = Tuple::default();
        handler
            .parse_tuple_proto(&AttrHandle::parse(&mem).unwrap(), &mut parsed)
            .unwrap();
        assert_eq!(parsed.l4, tuple.l4);
    }
}
