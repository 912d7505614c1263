//! Flow records and the codec translating them to and from the
//! nested attribute form conntrack messages use on the wire.
//!
//! # Design decisions
//!
//! A [`Flow`] is a plain value the caller builds with
//! [`FlowBuilder`], hands to an operation verb, and keeps. Fields
//! the kernel reports optionally are [`Option`]s: after a parse, a
//! field is `Some` exactly when the attribute was present in the
//! message, so presence never has to be tracked out of band.
//!
//! The layer 4 regions of tuples and protocol info are tagged sums
//! rather than fixed unions; the protocol handlers registered in a
//! [`ProtoRegistry`] contribute the matching attribute leaves on
//! build and fill the variants back in on parse. A protocol without
//! a handler degrades to the generic portion of the record.
//!
//! All scalar leaves are converted between host and big endian here,
//! at the attribute boundary.

use std::{
    fmt::{self, Write},
    net::Ipv4Addr,
};

use derive_builder::Builder;
use getset::{Getters, Setters};
use log::debug;

use crate::{
    attr::{AttrHandle, Nlattr},
    consts::ct::{
        ConnStatus, CounterAttr, CtAttr, IpAttr, NatAttr, ProtoAttr, TcpState, TupleAttr,
    },
    err::{DeError, SerError},
    proto::ProtoRegistry,
    types::{AttrBuffer, Buffer},
};

/// Direction of a flow: which of the two tuples a query matches on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dir {
    /// The tuple of the packet that created the flow
    Original,
    /// The tuple the kernel expects answers from
    Reply,
}

/// The layer 4 endpoints of a tuple. The variant must agree with the
/// protocol number of the enclosing [`Tuple`]; protocols without a
/// registered handler use [`ProtoTuple::Other`], which carries the
/// raw bytes of the protocol sub-tree as received from the kernel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProtoTuple {
    /// TCP port pair
    Tcp {
        /// Source port
        src_port: u16,
        /// Destination port
        dst_port: u16,
    },
    /// UDP port pair
    Udp {
        /// Source port
        src_port: u16,
        /// Destination port
        dst_port: u16,
    },
    /// SCTP port pair
    Sctp {
        /// Source port
        src_port: u16,
        /// Destination port
        dst_port: u16,
    },
    /// ICMP query endpoints
    Icmp {
        /// Query id
        id: u16,
        /// ICMP message type
        ty: u8,
        /// ICMP message code
        code: u8,
    },
    /// Raw bytes for a protocol no handler recognizes; empty for
    /// records the caller builds
    Other(Buffer),
}

impl ProtoTuple {
    /// The IANA protocol number implied by the variant, or [`None`]
    /// for [`ProtoTuple::Other`].
    pub fn protonum(&self) -> Option<u8> {
        match self {
            ProtoTuple::Tcp { .. } => Some(libc::IPPROTO_TCP as u8),
            ProtoTuple::Udp { .. } => Some(libc::IPPROTO_UDP as u8),
            ProtoTuple::Sctp { .. } => Some(libc::IPPROTO_SCTP as u8),
            ProtoTuple::Icmp { .. } => Some(libc::IPPROTO_ICMP as u8),
            ProtoTuple::Other(_) => None,
        }
    }
}

impl Default for ProtoTuple {
    fn default() -> Self {
        ProtoTuple::Other(Buffer::new())
    }
}

/// The endpoint pair identifying one direction of a flow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tuple {
    /// Source IPv4 address
    pub src: Ipv4Addr,
    /// Destination IPv4 address
    pub dst: Ipv4Addr,
    /// Layer 4 protocol number
    pub protonum: u8,
    /// Layer 4 endpoints
    pub l4: ProtoTuple,
}

impl Tuple {
    /// Create a tuple whose protocol number is implied by the layer 4
    /// variant. For [`ProtoTuple::Other`] use
    /// [`Tuple::with_protonum`].
    pub fn new(src: Ipv4Addr, dst: Ipv4Addr, l4: ProtoTuple) -> Self {
        let protonum = l4.protonum().unwrap_or(0);
        Tuple {
            src,
            dst,
            protonum,
            l4,
        }
    }

    /// Create a tuple with an explicit protocol number.
    pub fn with_protonum(src: Ipv4Addr, dst: Ipv4Addr, protonum: u8, l4: ProtoTuple) -> Self {
        Tuple {
            src,
            dst,
            protonum,
            l4,
        }
    }

    /// Adapter rendering the tuple through the handlers in
    /// `registry`: addresses first, then the protocol specific
    /// endpoints.
    pub fn display<'a>(&'a self, registry: &'a ProtoRegistry) -> TupleDisplay<'a> {
        TupleDisplay {
            tuple: self,
            registry,
        }
    }
}

impl Default for Tuple {
    fn default() -> Self {
        Tuple {
            src: Ipv4Addr::UNSPECIFIED,
            dst: Ipv4Addr::UNSPECIFIED,
            protonum: 0,
            l4: ProtoTuple::default(),
        }
    }
}

/// Per-direction traffic counters reported by the kernel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counter {
    /// Packets seen in this direction
    pub packets: u64,
    /// Bytes seen in this direction
    pub bytes: u64,
}

/// A NAT range to apply when creating a flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NatRange {
    /// Lower bound of the address range
    pub min_ip: Ipv4Addr,
    /// Upper bound of the address range; equal to `min_ip` for a
    /// single address
    pub max_ip: Ipv4Addr,
    /// Lower bound of the layer 4 endpoint range
    pub l4_min: u16,
    /// Upper bound of the layer 4 endpoint range
    pub l4_max: u16,
}

impl Default for NatRange {
    fn default() -> Self {
        NatRange {
            min_ip: Ipv4Addr::UNSPECIFIED,
            max_ip: Ipv4Addr::UNSPECIFIED,
            l4_min: 0,
            l4_max: 0,
        }
    }
}

/// TCP specific flow state reported in the protocol info sub-tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TcpInfo {
    /// Connection tracking state
    pub state: TcpState,
    /// Window scale factor in the original direction
    pub wscale_original: u8,
    /// Window scale factor in the reply direction
    pub wscale_reply: u8,
}

impl TcpInfo {
    /// Protocol info carrying only a state, the usual shape when
    /// creating a flow.
    pub fn new(state: TcpState) -> Self {
        TcpInfo {
            state,
            wscale_original: 0,
            wscale_reply: 0,
        }
    }
}

impl Default for TcpInfo {
    fn default() -> Self {
        TcpInfo::new(TcpState::None)
    }
}

/// Protocol specific flow state. Like [`ProtoTuple`], the variant is
/// filled by the protocol handler; a protocol without a handler keeps
/// the raw sub-tree bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProtoInfo {
    /// TCP state
    Tcp(TcpInfo),
    /// Raw bytes for a protocol no handler recognizes
    Other(Buffer),
}

/// A conntrack flow entry as seen by userspace.
///
/// Build one with [`FlowBuilder`]; both tuples are required and must
/// agree on the protocol number. Everything else defaults to absent.
/// Records returned through callbacks are produced by the parse side
/// of the codec, with `Some` marking exactly the attributes the
/// kernel included.
#[derive(Builder, Clone, Debug, Getters, Setters, PartialEq, Eq)]
#[builder(pattern = "owned", build_fn(validate = "Self::validate"))]
pub struct Flow {
    /// Tuple of the direction the flow was created in
    #[getset(get = "pub")]
    orig: Tuple,
    /// Tuple of the reply direction
    #[getset(get = "pub")]
    reply: Tuple,
    /// Status word; always written to the wire, defaulting to no
    /// bits set
    #[builder(default, setter(strip_option))]
    #[getset(get = "pub", set = "pub")]
    status: Option<ConnStatus>,
    /// Seconds until the kernel expires the entry; always written to
    /// the wire, defaulting to 0
    #[builder(default, setter(strip_option))]
    #[getset(get = "pub", set = "pub")]
    timeout: Option<u32>,
    /// User assigned mark; omitted from the wire when absent
    #[builder(default, setter(strip_option))]
    #[getset(get = "pub", set = "pub")]
    mark: Option<u32>,
    /// Kernel assigned id; omitted from the wire when absent
    #[builder(default, setter(strip_option))]
    #[getset(get = "pub", set = "pub")]
    id: Option<u32>,
    /// Protocol specific state contributed by the handler
    #[builder(default, setter(strip_option))]
    #[getset(get = "pub", set = "pub")]
    protoinfo: Option<ProtoInfo>,
    /// Counters in the original direction; kernel reported
    #[builder(default, setter(strip_option))]
    #[getset(get = "pub", set = "pub")]
    counters_orig: Option<Counter>,
    /// Counters in the reply direction; kernel reported
    #[builder(default, setter(strip_option))]
    #[getset(get = "pub", set = "pub")]
    counters_reply: Option<Counter>,
    /// Kernel reference count
    #[builder(default, setter(strip_option))]
    #[getset(get = "pub", set = "pub")]
    use_count: Option<u32>,
    /// NAT range to apply on create; omitted from the wire when
    /// absent
    #[builder(default, setter(strip_option))]
    #[getset(get = "pub", set = "pub")]
    nat: Option<NatRange>,
}

impl FlowBuilder {
    fn validate(&self) -> Result<(), String> {
        if let (Some(orig), Some(reply)) = (&self.orig, &self.reply) {
            if orig.protonum != reply.protonum {
                return Err(format!(
                    "tuple protocol numbers disagree between directions: {} != {}",
                    orig.protonum, reply.protonum
                ));
            }
        }
        Ok(())
    }
}

impl Flow {
    /// The tuple for the requested direction.
    pub fn tuple(&self, dir: Dir) -> &Tuple {
        match dir {
            Dir::Original => &self.orig,
            Dir::Reply => &self.reply,
        }
    }

    /// Adapter rendering the flow as the conventional one line form,
    /// printing only the fields that are present.
    pub fn display<'a>(&'a self, registry: &'a ProtoRegistry) -> FlowDisplay<'a> {
        FlowDisplay {
            flow: self,
            registry,
        }
    }

    /// Translate the record into its attribute vector.
    ///
    /// Emission order is fixed: tuples first, then status and
    /// timeout, then the optional attributes. `MARK`, `ID` and the
    /// NAT range are emitted only when set; the protocol info
    /// sub-tree only when a handler contributes to it.
    pub(crate) fn to_attrs(&self, registry: &ProtoRegistry) -> Result<AttrBuffer<CtAttr>, SerError> {
        let mut attrs = AttrBuffer::new();
        attrs.push(Nlattr::new_nested(
            CtAttr::TupleOrig,
            tuple_attrs(&self.orig, registry)?,
        )?);
        attrs.push(Nlattr::new_nested(
            CtAttr::TupleReply,
            tuple_attrs(&self.reply, registry)?,
        )?);
        attrs.push(Nlattr::new(
            CtAttr::Status,
            u32::to_be(self.status.unwrap_or_default().bits()),
        )?);
        attrs.push(Nlattr::new(
            CtAttr::Timeout,
            u32::to_be(self.timeout.unwrap_or(0)),
        )?);
        if let Some(mark) = self.mark {
            attrs.push(Nlattr::new(CtAttr::Mark, u32::to_be(mark))?);
        }
        if let Some(id) = self.id {
            attrs.push(Nlattr::new(CtAttr::Id, u32::to_be(id))?);
        }
        if let Some(handler) = registry.find_protonum(self.orig.protonum) {
            let mut info = AttrBuffer::new();
            handler.build_protoinfo(self, &mut info)?;
            if !info.is_empty() {
                attrs.push(Nlattr::new_nested(CtAttr::Protoinfo, info)?);
            }
        }
        if let Some(nat) = &self.nat {
            attrs.push(Nlattr::new_nested(
                CtAttr::NatSrc,
                nat_attrs(nat, self.orig.protonum, registry)?,
            )?);
        }
        Ok(attrs)
    }

    /// Populate a record from a parsed attribute vector. Fields whose
    /// attributes the message did not carry stay `None`.
    pub(crate) fn parse(
        handle: &AttrHandle<CtAttr>,
        registry: &ProtoRegistry,
    ) -> Result<Flow, DeError> {
        let mut flow = Flow {
            orig: Tuple::default(),
            reply: Tuple::default(),
            status: None,
            timeout: None,
            mark: None,
            id: None,
            protoinfo: None,
            counters_orig: None,
            counters_reply: None,
            use_count: None,
            nat: None,
        };
        if let Some(attr) = handle.get_attribute(CtAttr::TupleOrig) {
            flow.orig = parse_tuple(&attr.get_attr_handle()?, registry)?;
        }
        if let Some(attr) = handle.get_attribute(CtAttr::TupleReply) {
            flow.reply = parse_tuple(&attr.get_attr_handle()?, registry)?;
        }
        if let Some(attr) = handle.get_attribute(CtAttr::Status) {
            flow.status = Some(ConnStatus::from_bits_retain(u32::from_be(
                attr.get_payload_as()?,
            )));
        }
        if let Some(attr) = handle.get_attribute(CtAttr::Protoinfo) {
            match registry.find_protonum(flow.orig.protonum) {
                Some(handler) => handler.parse_protoinfo(&attr.get_attr_handle()?, &mut flow)?,
                None => flow.protoinfo = Some(ProtoInfo::Other(attr.payload.clone())),
            }
        }
        if let Some(attr) = handle.get_attribute(CtAttr::Timeout) {
            flow.timeout = Some(u32::from_be(attr.get_payload_as()?));
        }
        if let Some(attr) = handle.get_attribute(CtAttr::Mark) {
            flow.mark = Some(u32::from_be(attr.get_payload_as()?));
        }
        if let Some(attr) = handle.get_attribute(CtAttr::CountersOrig) {
            flow.counters_orig = Some(parse_counters(&attr.get_attr_handle()?)?);
        }
        if let Some(attr) = handle.get_attribute(CtAttr::CountersReply) {
            flow.counters_reply = Some(parse_counters(&attr.get_attr_handle()?)?);
        }
        if let Some(attr) = handle.get_attribute(CtAttr::Use) {
            flow.use_count = Some(u32::from_be(attr.get_payload_as()?));
        }
        if let Some(attr) = handle.get_attribute(CtAttr::Id) {
            flow.id = Some(u32::from_be(attr.get_payload_as()?));
        }
        Ok(flow)
    }
}

/// Build the nested attribute form of one tuple: the IP sub-tree
/// followed by the protocol sub-tree. The protocol number leaf is
/// always present; further leaves come from the handler, if any.
pub(crate) fn tuple_attrs(
    tuple: &Tuple,
    registry: &ProtoRegistry,
) -> Result<AttrBuffer<TupleAttr>, SerError> {
    let mut ip = AttrBuffer::new();
    ip.push(Nlattr::new(IpAttr::V4Src, &tuple.src.octets()[..])?);
    ip.push(Nlattr::new(IpAttr::V4Dst, &tuple.dst.octets()[..])?);

    let mut proto = AttrBuffer::new();
    proto.push(Nlattr::new(ProtoAttr::Num, tuple.protonum)?);
    match registry.find_protonum(tuple.protonum) {
        Some(handler) => handler.build_tuple_proto(tuple, &mut proto)?,
        None => debug!(
            "no handler for protocol {}, emitting generic tuple only",
            tuple.protonum
        ),
    }

    let mut attrs = AttrBuffer::new();
    attrs.push(Nlattr::new_nested(TupleAttr::Ip, ip)?);
    attrs.push(Nlattr::new_nested(TupleAttr::Proto, proto)?);
    Ok(attrs)
}

/// Parse one tuple sub-tree. Unknown protocols keep the raw protocol
/// sub-tree bytes in [`ProtoTuple::Other`].
pub(crate) fn parse_tuple(
    handle: &AttrHandle<TupleAttr>,
    registry: &ProtoRegistry,
) -> Result<Tuple, DeError> {
    let mut tuple = Tuple::default();
    if let Some(attr) = handle.get_attribute(TupleAttr::Ip) {
        let ip = attr.get_attr_handle::<IpAttr>()?;
        if let Some(src) = ip.get_attribute(IpAttr::V4Src) {
            tuple.src = ipv4_from_attr(src.payload.as_ref())?;
        }
        if let Some(dst) = ip.get_attribute(IpAttr::V4Dst) {
            tuple.dst = ipv4_from_attr(dst.payload.as_ref())?;
        }
    }
    if let Some(attr) = handle.get_attribute(TupleAttr::Proto) {
        let proto = attr.get_attr_handle::<ProtoAttr>()?;
        if let Some(num) = proto.get_attribute(ProtoAttr::Num) {
            tuple.protonum = num.get_payload_as::<u8>()?;
        }
        match registry.find_protonum(tuple.protonum) {
            Some(handler) => handler.parse_tuple_proto(&proto, &mut tuple)?,
            None => {
                debug!("no handler for protocol {}, keeping raw bytes", tuple.protonum);
                tuple.l4 = ProtoTuple::Other(attr.payload.clone());
            }
        }
    }
    Ok(tuple)
}

fn ipv4_from_attr(payload: &[u8]) -> Result<Ipv4Addr, DeError> {
    let octets: [u8; 4] = payload
        .try_into()
        .map_err(|_| DeError::new("IPv4 address attribute has the wrong length"))?;
    Ok(Ipv4Addr::from(octets))
}

/// Build the NAT range sub-tree. `MAXIP` appears only for a real
/// range; the protocol sub-tree container appears whenever the layer
/// 4 range is non-trivial, with its contents delegated to the
/// handler.
fn nat_attrs(
    nat: &NatRange,
    protonum: u8,
    registry: &ProtoRegistry,
) -> Result<AttrBuffer<NatAttr>, SerError> {
    let mut attrs = AttrBuffer::new();
    attrs.push(Nlattr::new(NatAttr::MinIp, &nat.min_ip.octets()[..])?);
    if nat.min_ip != nat.max_ip {
        attrs.push(Nlattr::new(NatAttr::MaxIp, &nat.max_ip.octets()[..])?);
    }
    if nat.l4_min != nat.l4_max {
        let mut proto = AttrBuffer::new();
        if let Some(handler) = registry.find_protonum(protonum) {
            handler.build_nat_proto(nat, &mut proto)?;
        }
        // The container is emitted even when no handler contributed
        // so the kernel can reject an empty range deterministically.
        attrs.push(Nlattr::new_nested(NatAttr::Proto, proto)?);
    }
    Ok(attrs)
}

fn parse_counters(handle: &AttrHandle<CounterAttr>) -> Result<Counter, DeError> {
    let mut counter = Counter::default();
    if let Some(attr) = handle.get_attribute(CounterAttr::Packets) {
        counter.packets = u64::from_be(attr.get_payload_as()?);
    }
    if let Some(attr) = handle.get_attribute(CounterAttr::Bytes) {
        counter.bytes = u64::from_be(attr.get_payload_as()?);
    }
    // Legacy 32 bit counters from older kernels; network to host,
    // then widen.
    if let Some(attr) = handle.get_attribute(CounterAttr::Packets32) {
        counter.packets = u64::from(u32::from_be(attr.get_payload_as()?));
    }
    if let Some(attr) = handle.get_attribute(CounterAttr::Bytes32) {
        counter.bytes = u64::from(u32::from_be(attr.get_payload_as()?));
    }
    Ok(counter)
}

/// Build the attribute vector of a query that matches on one tuple
/// and optionally an id; used by the get and delete verbs.
pub(crate) fn query_attrs(
    tuple: &Tuple,
    dir: Dir,
    id: Option<u32>,
    registry: &ProtoRegistry,
) -> Result<AttrBuffer<CtAttr>, SerError> {
    let tag = match dir {
        Dir::Original => CtAttr::TupleOrig,
        Dir::Reply => CtAttr::TupleReply,
    };
    let mut attrs = AttrBuffer::new();
    attrs.push(Nlattr::new_nested(tag, tuple_attrs(tuple, registry)?)?);
    if let Some(id) = id {
        attrs.push(Nlattr::new(CtAttr::Id, u32::to_be(id))?);
    }
    Ok(attrs)
}

/// [`fmt::Display`] adapter returned by [`Tuple::display`].
pub struct TupleDisplay<'a> {
    tuple: &'a Tuple,
    registry: &'a ProtoRegistry,
}

impl fmt::Display for TupleDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "src={} dst={} ", self.tuple.src, self.tuple.dst)?;
        if let Some(handler) = self.registry.find_protonum(self.tuple.protonum) {
            handler.fmt_tuple_proto(self.tuple, f)?;
        }
        Ok(())
    }
}

/// [`fmt::Display`] adapter returned by [`Flow::display`].
pub struct FlowDisplay<'a> {
    flow: &'a Flow,
    registry: &'a ProtoRegistry,
}

impl FlowDisplay<'_> {
    fn write_fields(&self, out: &mut String) -> fmt::Result {
        let flow = self.flow;
        let registry = self.registry;
        let handler = registry.find_protonum(flow.orig.protonum);
        let name = handler.as_ref().map(|h| h.name()).unwrap_or("unknown");
        write!(out, "{:<8} {} ", name, flow.orig.protonum)?;
        if let Some(timeout) = flow.timeout {
            write!(out, "{} ", timeout)?;
        }
        if let (Some(info), Some(handler)) = (&flow.protoinfo, &handler) {
            handler.fmt_protoinfo(info, out)?;
        }
        write!(out, "{}", flow.orig.display(registry))?;
        if let Some(counter) = &flow.counters_orig {
            write!(out, "packets={} bytes={} ", counter.packets, counter.bytes)?;
        }
        if let Some(status) = flow.status {
            if !status.contains(ConnStatus::SEEN_REPLY) {
                write!(out, "[UNREPLIED] ")?;
            }
        }
        write!(out, "{}", flow.reply.display(registry))?;
        if let Some(counter) = &flow.counters_reply {
            write!(out, "packets={} bytes={} ", counter.packets, counter.bytes)?;
        }
        if let Some(status) = flow.status {
            if status.contains(ConnStatus::ASSURED) {
                write!(out, "[ASSURED] ")?;
            }
        }
        if let Some(mark) = flow.mark {
            write!(out, "mark={} ", mark)?;
        }
        if let Some(use_count) = flow.use_count {
            write!(out, "use={} ", use_count)?;
        }
        if let Some(id) = flow.id {
            write!(out, "id={} ", id)?;
        }
        Ok(())
    }
}

impl fmt::Display for FlowDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut out = String::new();
        self.write_fields(&mut out)?;
        f.write_str(out.trim_end())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::proto::ProtoRegistry;

    fn tcp_flow() -> Flow {
        let orig = Tuple::new(
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(10, 0, 0, 2),
            ProtoTuple::Tcp {
                src_port: 1234,
                dst_port: 80,
            },
        );
        let reply = Tuple::new(
            Ipv4Addr::new(10, 0, 0, 2),
            Ipv4Addr::new(10, 0, 0, 1),
            ProtoTuple::Tcp {
                src_port: 80,
                dst_port: 1234,
            },
        );
        FlowBuilder::default()
            .orig(orig)
            .reply(reply)
            .status(ConnStatus::empty())
            .timeout(300)
            .build()
            .unwrap()
    }

    /// Expected nested image of one direction of the TCP flow above.
    fn tuple_image(src: [u8; 4], dst: [u8; 4], sport: u16, dport: u16) -> Vec<u8> {
        let mut mem = Vec::new();
        // CTA_TUPLE_IP
        mem.extend_from_slice(&20u16.to_ne_bytes());
        mem.extend_from_slice(&(1u16 | 0x8000).to_ne_bytes());
        mem.extend_from_slice(&8u16.to_ne_bytes());
        mem.extend_from_slice(&1u16.to_ne_bytes());
        mem.extend_from_slice(&src);
        mem.extend_from_slice(&8u16.to_ne_bytes());
        mem.extend_from_slice(&2u16.to_ne_bytes());
        mem.extend_from_slice(&dst);
        // CTA_TUPLE_PROTO
        mem.extend_from_slice(&28u16.to_ne_bytes());
        mem.extend_from_slice(&(2u16 | 0x8000).to_ne_bytes());
        mem.extend_from_slice(&5u16.to_ne_bytes());
        mem.extend_from_slice(&1u16.to_ne_bytes());
        mem.extend_from_slice(&[6, 0, 0, 0]);
        mem.extend_from_slice(&6u16.to_ne_bytes());
        mem.extend_from_slice(&2u16.to_ne_bytes());
        mem.extend_from_slice(&sport.to_be_bytes());
        mem.extend_from_slice(&[0, 0]);
        mem.extend_from_slice(&6u16.to_ne_bytes());
        mem.extend_from_slice(&3u16.to_ne_bytes());
        mem.extend_from_slice(&dport.to_be_bytes());
        mem.extend_from_slice(&[0, 0]);
        mem
    }

    #[test]
    fn test_create_tcp_flow_wire_image() {
        let registry = ProtoRegistry::with_builtins();
        let flow = tcp_flow();
        let attrs = flow.to_attrs(&registry).unwrap();
        let mem = crate::serialize(&attrs, false).unwrap();

        let mut expected = Vec::new();
        let orig = tuple_image([10, 0, 0, 1], [10, 0, 0, 2], 1234, 80);
        expected.extend_from_slice(&((4 + orig.len()) as u16).to_ne_bytes());
        expected.extend_from_slice(&(1u16 | 0x8000).to_ne_bytes());
        expected.extend_from_slice(&orig);
        let reply = tuple_image([10, 0, 0, 2], [10, 0, 0, 1], 80, 1234);
        expected.extend_from_slice(&((4 + reply.len()) as u16).to_ne_bytes());
        expected.extend_from_slice(&(2u16 | 0x8000).to_ne_bytes());
        expected.extend_from_slice(&reply);
        // CTA_STATUS = 0
        expected.extend_from_slice(&8u16.to_ne_bytes());
        expected.extend_from_slice(&3u16.to_ne_bytes());
        expected.extend_from_slice(&[0, 0, 0, 0]);
        // CTA_TIMEOUT = 300
        expected.extend_from_slice(&8u16.to_ne_bytes());
        expected.extend_from_slice(&7u16.to_ne_bytes());
        expected.extend_from_slice(&[0x00, 0x00, 0x01, 0x2c]);

        assert_eq!(mem, expected);
    }

    #[test]
    fn test_optional_attrs_omitted_when_absent() {
        let registry = ProtoRegistry::with_builtins();
        let flow = tcp_flow();
        let attrs = flow.to_attrs(&registry).unwrap();
        assert!(attrs.iter().all(|a| a.nla_type != CtAttr::Mark));
        assert!(attrs.iter().all(|a| a.nla_type != CtAttr::Id));
        assert!(attrs.iter().all(|a| a.nla_type != CtAttr::NatSrc));
    }

    #[test]
    fn test_optional_attrs_emitted_when_set() {
        let registry = ProtoRegistry::with_builtins();
        let mut flow = tcp_flow();
        flow.set_mark(Some(0xcafe));
        flow.set_id(Some(42));
        flow.set_nat(Some(NatRange {
            min_ip: Ipv4Addr::new(192, 168, 0, 1),
            max_ip: Ipv4Addr::new(192, 168, 0, 1),
            l4_min: 0,
            l4_max: 0,
        }));
        let attrs = flow.to_attrs(&registry).unwrap();
        assert!(attrs.iter().any(|a| a.nla_type == CtAttr::Mark));
        assert!(attrs.iter().any(|a| a.nla_type == CtAttr::Id));

        let nat = attrs
            .iter()
            .find(|a| a.nla_type == CtAttr::NatSrc)
            .unwrap();
        let nat_handle = nat.get_attr_handle::<NatAttr>().unwrap();
        assert!(nat_handle.get_attribute(NatAttr::MinIp).is_some());
        // Degenerate range: no MAXIP, no protocol sub-tree.
        assert!(nat_handle.get_attribute(NatAttr::MaxIp).is_none());
        assert!(nat_handle.get_attribute(NatAttr::Proto).is_none());
    }

    #[test]
    fn test_nat_range_emits_bounds() {
        let registry = ProtoRegistry::with_builtins();
        let mut flow = tcp_flow();
        flow.set_nat(Some(NatRange {
            min_ip: Ipv4Addr::new(192, 168, 0, 1),
            max_ip: Ipv4Addr::new(192, 168, 0, 8),
            l4_min: 1000,
            l4_max: 2000,
        }));
        let attrs = flow.to_attrs(&registry).unwrap();
        let nat = attrs
            .iter()
            .find(|a| a.nla_type == CtAttr::NatSrc)
            .unwrap();
        let nat_handle = nat.get_attr_handle::<NatAttr>().unwrap();
        assert!(nat_handle.get_attribute(NatAttr::MaxIp).is_some());
        assert!(nat_handle.get_attribute(NatAttr::Proto).is_some());
    }

    #[test]
    fn test_flow_round_trip() {
        let registry = ProtoRegistry::with_builtins();
        let mut flow = tcp_flow();
        flow.set_status(Some(ConnStatus::SEEN_REPLY | ConnStatus::ASSURED));
        flow.set_mark(Some(7));
        flow.set_id(Some(99));
        flow.set_protoinfo(Some(ProtoInfo::Tcp(TcpInfo::new(TcpState::Established))));

        let attrs = flow.to_attrs(&registry).unwrap();
        let mem = crate::serialize(&attrs, false).unwrap();
        let parsed = Flow::parse(&AttrHandle::parse(&mem).unwrap(), &registry).unwrap();

        assert_eq!(parsed.orig, flow.orig);
        assert_eq!(parsed.reply, flow.reply);
        assert_eq!(parsed.status, flow.status);
        assert_eq!(parsed.timeout, flow.timeout);
        assert_eq!(parsed.mark, flow.mark);
        assert_eq!(parsed.id, flow.id);
        assert_eq!(parsed.protoinfo, flow.protoinfo);
        assert_eq!(parsed.counters_orig, None);
        assert_eq!(parsed.use_count, None);
    }

    #[test]
    fn test_unknown_protocol_tuple() {
        // No sctp handler in this registry: protonum 132 degrades to
        // the generic portion.
        let registry = ProtoRegistry::empty();
        let tuple = Tuple::with_protonum(
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(10, 0, 0, 2),
            132,
            ProtoTuple::Sctp {
                src_port: 7,
                dst_port: 8,
            },
        );
        let attrs = tuple_attrs(&tuple, &registry).unwrap();
        let mem = crate::serialize(&attrs, false).unwrap();
        let handle = AttrHandle::<TupleAttr>::parse(&mem).unwrap();

        let proto = handle
            .get_attribute(TupleAttr::Proto)
            .unwrap()
            .get_attr_handle::<ProtoAttr>()
            .unwrap();
        assert_eq!(proto.len(), 1);
        assert!(proto.get_attribute(ProtoAttr::SrcPort).is_none());

        let parsed = parse_tuple(&handle, &registry).unwrap();
        assert_eq!(parsed.protonum, 132);
        assert_eq!(parsed.src, Ipv4Addr::new(10, 0, 0, 1));
        assert!(matches!(parsed.l4, ProtoTuple::Other(_)));
    }

    #[test]
    fn test_legacy_counters_are_byte_swapped() {
        let mut counters = AttrBuffer::new();
        counters.push(Nlattr::new(CounterAttr::Packets32, u32::to_be(17)).unwrap());
        counters.push(Nlattr::new(CounterAttr::Bytes32, u32::to_be(4096)).unwrap());
        let mem = crate::serialize(&counters, false).unwrap();
        let parsed = parse_counters(&AttrHandle::parse(&mem).unwrap()).unwrap();
        assert_eq!(parsed.packets, 17);
        assert_eq!(parsed.bytes, 4096);
    }

    #[test]
    fn test_query_attrs_reply_tuple_with_id() {
        let registry = ProtoRegistry::with_builtins();
        let flow = tcp_flow();
        let attrs = query_attrs(flow.reply(), Dir::Reply, Some(42), &registry).unwrap();
        assert!(attrs.iter().any(|a| a.nla_type == CtAttr::TupleReply));
        assert!(attrs.iter().all(|a| a.nla_type != CtAttr::TupleOrig));
        let id = attrs.iter().find(|a| a.nla_type == CtAttr::Id).unwrap();
        assert_eq!(id.payload.as_ref(), &[0x00, 0x00, 0x00, 0x2a]);

        // No id constraint, no ID attribute.
        let attrs = query_attrs(flow.reply(), Dir::Reply, None, &registry).unwrap();
        assert!(attrs.iter().all(|a| a.nla_type != CtAttr::Id));
    }

    #[test]
    fn test_builder_rejects_protocol_mismatch() {
        let orig = Tuple::new(
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(10, 0, 0, 2),
            ProtoTuple::Tcp {
                src_port: 1,
                dst_port: 2,
            },
        );
        let reply = Tuple::new(
            Ipv4Addr::new(10, 0, 0, 2),
            Ipv4Addr::new(10, 0, 0, 1),
            ProtoTuple::Udp {
                src_port: 2,
                dst_port: 1,
            },
        );
        assert!(FlowBuilder::default()
            .orig(orig)
            .reply(reply)
            .build()
            .is_err());
    }

    #[test]
    fn test_flow_display() {
        let registry = ProtoRegistry::with_builtins();
        let mut flow = tcp_flow();
        flow.set_status(Some(ConnStatus::SEEN_REPLY | ConnStatus::ASSURED));
        flow.set_protoinfo(Some(ProtoInfo::Tcp(TcpInfo::new(TcpState::Established))));
        flow.set_mark(Some(1));
        let line = flow.display(&registry).to_string();
        assert_eq!(
            line,
            "tcp      6 300 ESTABLISHED src=10.0.0.1 dst=10.0.0.2 \
             sport=1234 dport=80 src=10.0.0.2 dst=10.0.0.1 \
             sport=80 dport=1234 [ASSURED] mark=1"
        );
    }
}
