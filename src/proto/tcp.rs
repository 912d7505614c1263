//! TCP protocol handler.

use std::fmt;

use crate::{
    attr::{AttrHandle, Nlattr},
    consts::ct::{ProtoAttr, ProtoinfoAttr, ProtoinfoTcpAttr, TcpState},
    ct::{Flow, ProtoInfo, ProtoTuple, TcpInfo, Tuple},
    err::{DeError, SerError},
    proto::ProtoHandler,
    types::AttrBuffer,
};

/// Handler for TCP tuples and the TCP protocol info sub-tree.
pub struct Tcp;

impl ProtoHandler for Tcp {
    fn name(&self) -> &'static str {
        "tcp"
    }

    fn protonum(&self) -> u8 {
        libc::IPPROTO_TCP as u8
    }

    fn version(&self) -> &'static str {
        crate::VERSION
    }

    fn build_tuple_proto(
        &self,
        tuple: &Tuple,
        attrs: &mut AttrBuffer<ProtoAttr>,
    ) -> Result<(), SerError> {
        if let ProtoTuple::Tcp { src_port, dst_port } = tuple.l4 {
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
        tuple.l4 = ProtoTuple::Tcp { src_port, dst_port };
        Ok(())
    }

    fn build_protoinfo(
        &self,
        flow: &Flow,
        attrs: &mut AttrBuffer<ProtoinfoAttr>,
    ) -> Result<(), SerError> {
        if let Some(ProtoInfo::Tcp(info)) = flow.protoinfo() {
            let mut tcp = AttrBuffer::new();
            tcp.push(Nlattr::new(
                ProtoinfoTcpAttr::State,
                u8::from(info.state),
            )?);
            if info.wscale_original != 0 {
                tcp.push(Nlattr::new(
                    ProtoinfoTcpAttr::WscaleOriginal,
                    info.wscale_original,
                )?);
            }
            if info.wscale_reply != 0 {
                tcp.push(Nlattr::new(
                    ProtoinfoTcpAttr::WscaleReply,
                    info.wscale_reply,
                )?);
            }
            attrs.push(Nlattr::new_nested(ProtoinfoAttr::Tcp, tcp)?);
        }
        Ok(())
    }

    fn parse_protoinfo(
        &self,
        handle: &AttrHandle<ProtoinfoAttr>,
        flow: &mut Flow,
    ) -> Result<(), DeError> {
        if let Some(attr) = handle.get_attribute(ProtoinfoAttr::Tcp) {
            let tcp = attr.get_attr_handle::<ProtoinfoTcpAttr>()?;
            let mut info = TcpInfo::default();
            if let Some(state) = tcp.get_attribute(ProtoinfoTcpAttr::State) {
                info.state = TcpState::from(state.get_payload_as::<u8>()?);
            }
            if let Some(wscale) = tcp.get_attribute(ProtoinfoTcpAttr::WscaleOriginal) {
                info.wscale_original = wscale.get_payload_as()?;
            }
            if let Some(wscale) = tcp.get_attribute(ProtoinfoTcpAttr::WscaleReply) {
                info.wscale_reply = wscale.get_payload_as()?;
            }
            flow.set_protoinfo(Some(ProtoInfo::Tcp(info)));
        }
        Ok(())
    }

    fn fmt_tuple_proto(&self, tuple: &Tuple, f: &mut dyn fmt::Write) -> fmt::Result {
        if let ProtoTuple::Tcp { src_port, dst_port } = tuple.l4 {
            write!(f, "sport={} dport={} ", src_port, dst_port)?;
        }
        Ok(())
    }

    fn fmt_protoinfo(&self, info: &ProtoInfo, f: &mut dyn fmt::Write) -> fmt::Result {
        if let ProtoInfo::Tcp(info) = info {
            write!(f, "{} ", info.state)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_tuple_proto_round_trip() {
        let handler = Tcp;
        let tuple = Tuple::new(
            std::net::Ipv4Addr::new(10, 0, 0, 1),
            std::net::Ipv4Addr::new(10, 0, 0, 2),
            ProtoTuple::Tcp {
                src_port: 4321,
                dst_port: 443,
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

    #[test]
    fn test_ports_are_big_endian_on_the_wire() {
        let handler = Tcp;
        let tuple = Tuple::new(
            std::net::Ipv4Addr::UNSPECIFIED,
            std::net::Ipv4Addr::UNSPECIFIED,
            ProtoTuple::Tcp {
                src_port: 0x1234,
                dst_port: 0x0050,
            },
        );
        let mut attrs = AttrBuffer::new();
        handler.build_tuple_proto(&tuple, &mut attrs).unwrap();
        let src = attrs.iter().next().unwrap();
        assert_eq!(src.payload.as_ref(), &[0x12, 0x34]);
    }
}
