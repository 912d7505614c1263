//! Constants for the conntrack and expectation attribute tag spaces.
//!
//! The numeric values come from the kernel ABI in
//! `linux/netfilter/nfnetlink_conntrack.h` and
//! `linux/netfilter/nf_conntrack_common.h` and must never be
//! invented locally.

use bitflags::bitflags;

impl_trait!(
    /// Trait marking constants valid for use as attribute type tags
    NlAttrType, u16
);

impl_var_trait!(
    /// Top level attributes of a conntrack message
    CtAttr, u16, NlAttrType,
    TupleOrig => 1,
    TupleReply => 2,
    Status => 3,
    Protoinfo => 4,
    Help => 5,
    NatSrc => 6,
    Timeout => 7,
    Mark => 8,
    CountersOrig => 9,
    CountersReply => 10,
    Use => 11,
    Id => 12
);

impl_var_trait!(
    /// Attributes nested inside a tuple attribute
    TupleAttr, u16, NlAttrType,
    Ip => 1,
    Proto => 2
);

impl_var_trait!(
    /// Attributes nested inside the IP part of a tuple
    IpAttr, u16, NlAttrType,
    V4Src => 1,
    V4Dst => 2,
    V6Src => 3,
    V6Dst => 4
);

impl_var_trait!(
    /// Attributes nested inside the protocol part of a tuple. The
    /// leaves after `Num` are contributed by the layer 4 protocol
    /// handlers.
    ProtoAttr, u16, NlAttrType,
    Num => 1,
    SrcPort => 2,
    DstPort => 3,
    IcmpId => 4,
    IcmpType => 5,
    IcmpCode => 6
);

impl_var_trait!(
    /// Attributes nested inside the protocol info attribute
    ProtoinfoAttr, u16, NlAttrType,
    Tcp => 1
);

impl_var_trait!(
    /// Attributes nested inside the TCP protocol info attribute
    ProtoinfoTcpAttr, u16, NlAttrType,
    State => 1,
    WscaleOriginal => 2,
    WscaleReply => 3,
    FlagsOriginal => 4,
    FlagsReply => 5
);

impl_var_trait!(
    /// Attributes nested inside a per-direction counter attribute.
    /// `Packets`/`Bytes` are the 64 bit counters; `Packets32`/
    /// `Bytes32` are the legacy 32 bit ones older kernels report.
    CounterAttr, u16, NlAttrType,
    Packets => 1,
    Bytes => 2,
    Packets32 => 3,
    Bytes32 => 4
);

impl_var_trait!(
    /// Attributes nested inside the NAT range attribute
    NatAttr, u16, NlAttrType,
    MinIp => 1,
    MaxIp => 2,
    Proto => 3
);

impl_var_trait!(
    /// Attributes nested inside the protocol specific NAT range
    /// attribute
    ProtoNatAttr, u16, NlAttrType,
    PortMin => 1,
    PortMax => 2
);

impl_var_trait!(
    /// Top level attributes of an expectation message
    ExpAttr, u16, NlAttrType,
    Master => 1,
    Tuple => 2,
    Mask => 3,
    Timeout => 4,
    Id => 5,
    HelpName => 6
);

impl_var!(
    /// TCP connection tracking states reported in the protocol info
    /// sub-tree
    TcpState, u8,
    None => 0,
    SynSent => 1,
    SynRecv => 2,
    Established => 3,
    FinWait => 4,
    CloseWait => 5,
    LastAck => 6,
    TimeWait => 7,
    Close => 8,
    Listen => 9
);

impl std::fmt::Display for TcpState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            TcpState::None => "NONE",
            TcpState::SynSent => "SYN_SENT",
            TcpState::SynRecv => "SYN_RECV",
            TcpState::Established => "ESTABLISHED",
            TcpState::FinWait => "FIN_WAIT",
            TcpState::CloseWait => "CLOSE_WAIT",
            TcpState::LastAck => "LAST_ACK",
            TcpState::TimeWait => "TIME_WAIT",
            TcpState::Close => "CLOSE",
            TcpState::Listen => "LISTEN",
            TcpState::UnrecognizedVariant(_) => "UNKNOWN",
        };
        write!(f, "{}", name)
    }
}

bitflags! {
    /// The conntrack status word: a packed set of `IPS_*` bits
    /// describing what the kernel knows about a flow. Unknown bits
    /// reported by newer kernels are retained verbatim.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ConnStatus: u32 {
        /// The flow was expected by a helper
        const EXPECTED = 0x00000001;
        /// Packets have been seen in both directions
        const SEEN_REPLY = 0x00000002;
        /// The flow has passed the assurance criteria of its protocol
        const ASSURED = 0x00000004;
        /// The flow is confirmed: its original packet left the box
        const CONFIRMED = 0x00000008;
        /// Source NAT is applied
        const SRC_NAT = 0x00000010;
        /// Destination NAT is applied
        const DST_NAT = 0x00000020;
        /// Sequence number adjustment is in effect
        const SEQ_ADJUST = 0x00000040;
        /// Source NAT setup has completed
        const SRC_NAT_DONE = 0x00000080;
        /// Destination NAT setup has completed
        const DST_NAT_DONE = 0x00000100;
        /// The flow is being removed
        const DYING = 0x00000200;
        /// The timeout is fixed and must not be refreshed
        const FIXED_TIMEOUT = 0x00000400;
    }
}
