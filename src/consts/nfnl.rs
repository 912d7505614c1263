//! Constants for the netfilter netlink message family.
//!
//! Every message on a netfilter netlink socket carries a 16 bit
//! `nl_type` whose upper byte selects a netfilter subsystem and whose
//! lower byte is a message code scoped to that subsystem, plus an
//! `nfgenmsg` family header. This module wraps the subsystem ids and
//! the conntrack/expectation message codes.

use bitflags::bitflags;

impl_var!(
    /// Netfilter netlink subsystem identifiers: the upper byte of
    /// `nl_type`
    NfSubsys, u8,
    Ctnetlink => libc::NFNL_SUBSYS_CTNETLINK as u8,
    CtnetlinkExp => libc::NFNL_SUBSYS_CTNETLINK_EXP as u8
);

impl_var!(
    /// Conntrack message codes: the lower byte of `nl_type` when the
    /// subsystem is [`NfSubsys::Ctnetlink`]
    CtMsg, u8,
    New => 0,
    Get => 1,
    Delete => 2,
    GetCtrzero => 3
);

impl_var!(
    /// Expectation message codes: the lower byte of `nl_type` when
    /// the subsystem is [`NfSubsys::CtnetlinkExp`]
    ExpMsg, u8,
    New => 0,
    Get => 1,
    Delete => 2
);

/// Revision byte carried in the `nfgenmsg` header.
pub const NFNETLINK_V0: u8 = libc::NFNETLINK_V0 as u8;

/// Pack a subsystem id and a message code into a `nl_type` value.
pub const fn nfnl_msg_type(subsys: u8, msg: u8) -> u16 {
    ((subsys as u16) << 8) | (msg as u16)
}

/// The subsystem byte of a `nl_type` value.
pub const fn nfnl_subsys(nl_type: u16) -> u8 {
    (nl_type >> 8) as u8
}

/// The message code byte of a `nl_type` value.
pub const fn nfnl_msg_code(nl_type: u16) -> u8 {
    (nl_type & 0x00ff) as u8
}

bitflags! {
    /// Multicast group subscriptions for conntrack and expectation
    /// events. These are the legacy mask bits written directly into
    /// `sockaddr_nl.nl_groups` at bind time.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct NfGroup: u32 {
        /// New flow events
        const CONNTRACK_NEW = 0x00000001;
        /// Flow update events
        const CONNTRACK_UPDATE = 0x00000002;
        /// Flow destroy events
        const CONNTRACK_DESTROY = 0x00000004;
        /// New expectation events
        const CONNTRACK_EXP_NEW = 0x00000008;
        /// Expectation update events
        const CONNTRACK_EXP_UPDATE = 0x00000010;
        /// Expectation destroy events
        const CONNTRACK_EXP_DESTROY = 0x00000020;
    }
}

impl NfGroup {
    /// All conntrack flow event groups.
    pub fn all_conntrack() -> Self {
        NfGroup::CONNTRACK_NEW | NfGroup::CONNTRACK_UPDATE | NfGroup::CONNTRACK_DESTROY
    }

    /// All expectation event groups.
    pub fn all_expect() -> Self {
        NfGroup::CONNTRACK_EXP_NEW
            | NfGroup::CONNTRACK_EXP_UPDATE
            | NfGroup::CONNTRACK_EXP_DESTROY
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_msg_type_packing() {
        let ty = nfnl_msg_type(NfSubsys::Ctnetlink.into(), CtMsg::GetCtrzero.into());
        assert_eq!(ty, 0x0103);
        assert_eq!(nfnl_subsys(ty), 1);
        assert_eq!(nfnl_msg_code(ty), 3);
    }
}
