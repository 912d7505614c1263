//! UDP protocol handler. UDP has no per-flow protocol state, so only
//! the tuple hooks are implemented.

use std::fmt;

use crate::{
    attr::{AttrHandle, Nlattr},
    consts::ct::ProtoAttr,
    ct::{ProtoTuple, Tuple},
    err::{DeError, SerError},
    proto::ProtoHandler,
    types::AttrBuffer,
};

/// Handler for UDP tuples.
pub struct Udp;

impl ProtoHandler for Udp {
    fn name(&self) -> &'static str {
        "udp"
    }

    fn protonum(&self) -> u8 {
        libc::IPPROTO_UDP as u8
    }

    fn version(&self) -> &'static str {
        crate::VERSION
    }

    fn build_tuple_proto(
        &self,
        tuple: &Tuple,
        attrs: &mut AttrBuffer<ProtoAttr>,
    ) -> Result<(), SerError> {
        if let ProtoTuple::Udp { src_port, dst_port } = tuple.l4 {
            attrs.push(Nlattr::new(ProtoAttr::SrcPort, u16::to_be(src_port))?);
            attrs.push(Nlattr::new(ProtoAttr::DstPort, u16::to_be(dst_port))?);
        }
        Ok(())
    }

    fn parse_tuple_proto(
        &self,
        handle: &AttrHandle<ProtoAttr>,
        tuple: &mut Tuple,
    ) -> Result<(), DeError> {
        let mut src_port = 0;
        let mut dst_port = 0;
        if let Some(attr) = handle.get_attribute(ProtoAttr::SrcPort) {
            src_port = u16::from_be(attr.get_payload_as()?);
        }
        if let Some(attr) = handle.get_attribute(ProtoAttr::DstPort) {
            dst_port = u16::from_be(attr.get_payload_as()?);
        }
        tuple.l4 = ProtoTuple::Udp { src_port, dst_port };
        Ok(())
    }

    fn fmt_tuple_proto(&self, tuple: &Tuple, f: &mut dyn fmt::Write) -> fmt::Result {
        if let ProtoTuple::Udp { src_port, dst_port } = tuple.l4 {
            write!(f, "sport={} dport={} ", src_port, dst_port)?;
        }
        Ok(())
    }
}
