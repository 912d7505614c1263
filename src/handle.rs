//! The request dispatcher and the public operations surface.
//!
//! A [`Handle`] owns a netfilter netlink socket and drives one
//! request at a time: fill the header, build the attribute body,
//! send, then either wait for the ACK or pump the socket through a
//! callback until the dump terminator or the ACK arrives. Event
//! watching reuses the same pump without sending anything first.
//!
//! # Design decisions
//!
//! Exclusive ownership of an in-flight request is enforced by the
//! borrow checker: every verb takes `&mut self`, so two operations
//! cannot interleave on one handle. Callbacks are plain closures
//! invoked synchronously from the receive loop; returning
//! [`Verdict::Stop`] ends the loop. Messages from subsystems other
//! than conntrack and expectations are logged and dropped, matching
//! the tolerant behavior of the kernel side.

use std::{fmt, os::unix::io::AsRawFd, sync::Arc};

use log::{debug, warn};

use crate::{
    attr::AttrHandle,
    consts::{
        alignto,
        ct::{CtAttr, ExpAttr, NlAttrType},
        nfnl::{nfnl_msg_type, nfnl_subsys, nfnl_msg_code, CtMsg, ExpMsg, NfGroup, NfSubsys, NFNETLINK_V0},
        nl::{NlmF, Nlmsg},
        MAX_NL_LENGTH,
    },
    ct::{Dir, Flow, Tuple},
    err::{DeError, NlError, SerError},
    exp::Expectation,
    nl::{packet_length, Nfgenmsg, Nlmsgerr, Nlmsghdr, NLMSG_HDRLEN},
    proto::ProtoRegistry,
    socket::NlSocket,
    types::{AttrBuffer, Buffer},
    Nl,
};

/// What a received message says happened to the record it carries,
/// derived from the message code and header flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MsgKind {
    /// The entry was created
    New,
    /// The entry was updated
    Update,
    /// The entry was removed
    Destroy,
    /// The message code was not recognized
    Unknown,
}

impl fmt::Display for MsgKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let tag = match self {
            MsgKind::New => "[NEW]",
            MsgKind::Update => "[UPDATE]",
            MsgKind::Destroy => "[DESTROY]",
            MsgKind::Unknown => "[UNKNOWN]",
        };
        write!(f, "{}", tag)
    }
}

/// Returned by a callback to keep the receive loop going or end it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Keep draining replies
    Continue,
    /// Stop draining and return from the operation
    Stop,
}

/// Classify a data message. A `NEW` message code with the create
/// flags set announces a new entry; without them it is an update.
pub(crate) fn msg_kind(nl_type: u16, flags: NlmF) -> MsgKind {
    match nfnl_msg_code(nl_type) {
        0 => {
            if flags.intersects(NlmF::CREATE | NlmF::EXCL) {
                MsgKind::New
            } else {
                MsgKind::Update
            }
        }
        2 => MsgKind::Destroy,
        _ => MsgKind::Unknown,
    }
}

/// Outcome of routing one received datagram.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Drain {
    /// Keep receiving
    Continue,
    /// The terminator, the ACK, or a callback stop was seen
    Done,
}

/// Walk every message in one received datagram and route it.
///
/// Control messages terminate or abort the drain; data messages from
/// a foreign subsystem are logged and skipped; everything else goes
/// through `on_data`.
pub(crate) fn dispatch_datagram(
    mem: &[u8],
    on_data: &mut dyn FnMut(u16, NlmF, &[u8]) -> Result<Verdict, NlError>,
) -> Result<Drain, NlError> {
    let mut pos = 0;
    while pos < mem.len() {
        if mem.len() - pos < NLMSG_HDRLEN {
            return Err(NlError::De(DeError::UnexpectedEOB));
        }
        let len = packet_length(mem, pos);
        if len < NLMSG_HDRLEN || pos + len > mem.len() {
            return Err(NlError::De(DeError::UnexpectedEOB));
        }
        let msg = Nlmsghdr::<Buffer>::deserialize(&mem[pos..pos + len])?;
        pos += alignto(len);

        if msg.nl_type == u16::from(Nlmsg::Noop) {
            continue;
        }
        if msg.nl_type == u16::from(Nlmsg::Overrun) {
            return Err(NlError::new("netlink reported a receive queue overrun"));
        }
        if msg.nl_type == u16::from(Nlmsg::Done) {
            return Ok(Drain::Done);
        }
        if msg.nl_type == u16::from(Nlmsg::Error) {
            let err = Nlmsgerr::deserialize(msg.nl_payload.as_ref())?;
            if err.error == 0 {
                return Ok(Drain::Done);
            }
            return Err(NlError::Nlmsgerr(err.error));
        }

        let subsys = nfnl_subsys(msg.nl_type);
        if matches!(NfSubsys::from(subsys), NfSubsys::UnrecognizedVariant(_)) {
            warn!(
                "dropping message from foreign subsystem {} (type 0x{:04x})",
                subsys, msg.nl_type
            );
            continue;
        }
        match on_data(msg.nl_type, msg.nl_flags, msg.nl_payload.as_ref())? {
            Verdict::Continue => (),
            Verdict::Stop => return Ok(Drain::Done),
        }
    }
    Ok(Drain::Continue)
}

/// Parse one conntrack data message and hand the flow to the user
/// callback. Expectation messages arriving on the same socket are
/// skipped.
pub(crate) fn handle_flow_msg(
    registry: &ProtoRegistry,
    nl_type: u16,
    flags: NlmF,
    payload: &[u8],
    cb: &mut dyn FnMut(Flow, MsgKind) -> Verdict,
) -> Result<Verdict, NlError> {
    if NfSubsys::from(nfnl_subsys(nl_type)) != NfSubsys::Ctnetlink {
        debug!("skipping non-conntrack message of type 0x{:04x}", nl_type);
        return Ok(Verdict::Continue);
    }
    let nf = Nfgenmsg::<CtAttr>::deserialize(payload)?;
    let flow = Flow::parse(&AttrHandle::from_buffer(nf.attrs), registry)?;
    Ok(cb(flow, msg_kind(nl_type, flags)))
}

/// Parse one expectation data message and hand the record to the
/// user callback. Conntrack messages arriving on the same socket are
/// skipped.
pub(crate) fn handle_exp_msg(
    registry: &ProtoRegistry,
    nl_type: u16,
    flags: NlmF,
    payload: &[u8],
    cb: &mut dyn FnMut(Expectation, MsgKind) -> Verdict,
) -> Result<Verdict, NlError> {
    if NfSubsys::from(nfnl_subsys(nl_type)) != NfSubsys::CtnetlinkExp {
        debug!("skipping non-expectation message of type 0x{:04x}", nl_type);
        return Ok(Verdict::Continue);
    }
    let nf = Nfgenmsg::<ExpAttr>::deserialize(payload)?;
    let exp = Expectation::parse(&AttrHandle::from_buffer(nf.attrs), registry)?;
    Ok(cb(exp, msg_kind(nl_type, flags)))
}

/// A connection to the conntrack subsystem: the socket, the sequence
/// counter, and the protocol handler registry the codec consults.
///
/// One handle supports one in-flight operation; the socket is closed
/// when the handle is dropped.
pub struct Handle {
    socket: NlSocket,
    subsys: NfSubsys,
    seq: u32,
    registry: Arc<ProtoRegistry>,
}

impl Handle {
    /// Open a handle bound to `subsys`, subscribed to the event
    /// groups in `groups` (pass [`NfGroup::empty`] for request/reply
    /// use only). The process wide protocol handler registry is used.
    pub fn open(subsys: NfSubsys, groups: NfGroup) -> Result<Self, NlError> {
        Handle::open_with_registry(subsys, groups, Arc::clone(ProtoRegistry::global()))
    }

    /// Open a handle with a caller-scoped protocol handler registry.
    pub fn open_with_registry(
        subsys: NfSubsys,
        groups: NfGroup,
        registry: Arc<ProtoRegistry>,
    ) -> Result<Self, NlError> {
        let socket = NlSocket::connect(groups.bits())?;
        Ok(Handle {
            socket,
            subsys,
            seq: 0,
            registry,
        })
    }

    /// The raw socket file descriptor, for integration into an
    /// external poll loop.
    pub fn fd(&self) -> i32 {
        self.socket.as_raw_fd()
    }

    /// The subsystem this handle was opened for.
    pub fn subsys(&self) -> NfSubsys {
        self.subsys
    }

    /// The protocol handler registry this handle consults.
    pub fn registry(&self) -> &Arc<ProtoRegistry> {
        &self.registry
    }

    fn next_seq(&mut self) -> u32 {
        self.seq = self.seq.wrapping_add(1);
        self.seq
    }

    /// Serialize and send one request message.
    fn send_request<T>(
        &mut self,
        subsys: NfSubsys,
        msg_code: u8,
        flags: NlmF,
        attrs: AttrBuffer<T>,
    ) -> Result<(), NlError>
    where
        T: NlAttrType,
    {
        let payload = Nfgenmsg::new(libc::AF_INET as u8, NFNETLINK_V0, 0, attrs);
        let msg = Nlmsghdr::new(
            None,
            nfnl_msg_type(subsys.into(), msg_code),
            flags,
            Some(self.next_seq()),
            None,
            payload,
        );
        if msg.nl_len as usize > MAX_NL_LENGTH {
            return Err(NlError::Ser(SerError::TooLong(msg.nl_len as usize)));
        }
        let mem = crate::serialize(&msg, true)?;
        self.socket.send(&mem, 0)?;
        Ok(())
    }

    /// Receive and route datagrams until a terminator arrives.
    fn pump(
        &mut self,
        on_data: &mut dyn FnMut(u16, NlmF, &[u8]) -> Result<Verdict, NlError>,
    ) -> Result<(), NlError> {
        let mut mem = vec![0u8; MAX_NL_LENGTH];
        loop {
            let read = self.socket.recv(&mut mem, 0)? as usize;
            if read == 0 {
                return Err(NlError::new("netlink socket closed by peer"));
            }
            match dispatch_datagram(&mem[..read], on_data)? {
                Drain::Continue => (),
                Drain::Done => return Ok(()),
            }
        }
    }

    /// Wait for the ACK of the request just sent, ignoring any data
    /// messages delivered before it.
    fn ack_loop(&mut self) -> Result<(), NlError> {
        self.pump(&mut |nl_type, _, _| {
            debug!(
                "ignoring data message of type 0x{:04x} while waiting for an ACK",
                nl_type
            );
            Ok(Verdict::Continue)
        })
    }

    fn pump_flows(
        &mut self,
        cb: &mut dyn FnMut(Flow, MsgKind) -> Verdict,
    ) -> Result<(), NlError> {
        let registry = Arc::clone(&self.registry);
        self.pump(&mut |nl_type, flags, payload| {
            handle_flow_msg(&registry, nl_type, flags, payload, cb)
        })
    }

    fn pump_expectations(
        &mut self,
        cb: &mut dyn FnMut(Expectation, MsgKind) -> Verdict,
    ) -> Result<(), NlError> {
        let registry = Arc::clone(&self.registry);
        self.pump(&mut |nl_type, flags, payload| {
            handle_exp_msg(&registry, nl_type, flags, payload, cb)
        })
    }

    /// Create a new flow entry. Both tuples, and a timeout the kernel
    /// will accept, must be set on the record. Fails with the
    /// kernel's errno if the entry already exists.
    pub fn create_flow(&mut self, flow: &Flow) -> Result<(), NlError> {
        let attrs = flow.to_attrs(&self.registry)?;
        self.send_request(
            NfSubsys::Ctnetlink,
            CtMsg::New.into(),
            NlmF::REQUEST | NlmF::CREATE | NlmF::ACK | NlmF::EXCL,
            attrs,
        )?;
        self.ack_loop()
    }

    /// Update an existing flow entry in place.
    pub fn update_flow(&mut self, flow: &Flow) -> Result<(), NlError> {
        let attrs = flow.to_attrs(&self.registry)?;
        self.send_request(
            NfSubsys::Ctnetlink,
            CtMsg::New.into(),
            NlmF::REQUEST | NlmF::ACK,
            attrs,
        )?;
        self.ack_loop()
    }

    /// Delete the flow matching `tuple` in direction `dir`,
    /// optionally constrained to a specific conntrack id.
    pub fn delete_flow(
        &mut self,
        tuple: &Tuple,
        dir: Dir,
        id: Option<u32>,
    ) -> Result<(), NlError> {
        let attrs = crate::ct::query_attrs(tuple, dir, id, &self.registry)?;
        self.send_request(
            NfSubsys::Ctnetlink,
            CtMsg::Delete.into(),
            NlmF::REQUEST | NlmF::ACK | NlmF::ROOT | NlmF::MATCH,
            attrs,
        )?;
        self.ack_loop()
    }

    /// Look up the flow matching `tuple` in direction `dir` and hand
    /// it to `cb`.
    pub fn get_flow<F>(
        &mut self,
        tuple: &Tuple,
        dir: Dir,
        id: Option<u32>,
        mut cb: F,
    ) -> Result<(), NlError>
    where
        F: FnMut(Flow, MsgKind) -> Verdict,
    {
        let attrs = crate::ct::query_attrs(tuple, dir, id, &self.registry)?;
        self.send_request(
            NfSubsys::Ctnetlink,
            CtMsg::Get.into(),
            NlmF::REQUEST | NlmF::ACK,
            attrs,
        )?;
        self.pump_flows(&mut cb)
    }

    fn dump_flow_table(
        &mut self,
        msg_code: u8,
        cb: &mut dyn FnMut(Flow, MsgKind) -> Verdict,
    ) -> Result<(), NlError> {
        self.send_request(
            NfSubsys::Ctnetlink,
            msg_code,
            NlmF::REQUEST | NlmF::ROOT | NlmF::MATCH | NlmF::DUMP,
            AttrBuffer::<CtAttr>::new(),
        )?;
        self.pump_flows(cb)
    }

    /// Walk the whole conntrack table, handing every entry to `cb`.
    pub fn dump_flows<F>(&mut self, mut cb: F) -> Result<(), NlError>
    where
        F: FnMut(Flow, MsgKind) -> Verdict,
    {
        self.dump_flow_table(CtMsg::Get.into(), &mut cb)
    }

    /// Walk the whole conntrack table and atomically zero the
    /// traffic counters of every entry handed out.
    pub fn dump_flows_zero_counters<F>(&mut self, mut cb: F) -> Result<(), NlError>
    where
        F: FnMut(Flow, MsgKind) -> Verdict,
    {
        self.dump_flow_table(CtMsg::GetCtrzero.into(), &mut cb)
    }

    /// Remove every flow entry from the conntrack table.
    pub fn flush_flows(&mut self) -> Result<(), NlError> {
        self.send_request(
            NfSubsys::Ctnetlink,
            CtMsg::Delete.into(),
            NlmF::REQUEST | NlmF::ACK,
            AttrBuffer::<CtAttr>::new(),
        )?;
        self.ack_loop()
    }

    /// Turn the calling thread into an event pump for flow events.
    /// The handle must have been opened with the matching
    /// [`NfGroup`] subscriptions. Returns when `cb` returns
    /// [`Verdict::Stop`] or the socket errors.
    pub fn watch_flows<F>(&mut self, mut cb: F) -> Result<(), NlError>
    where
        F: FnMut(Flow, MsgKind) -> Verdict,
    {
        self.pump_flows(&mut cb)
    }

    /// Register a new expectation.
    pub fn create_expectation(&mut self, exp: &Expectation) -> Result<(), NlError> {
        let attrs = exp.to_attrs(&self.registry)?;
        self.send_request(
            NfSubsys::CtnetlinkExp,
            ExpMsg::New.into(),
            NlmF::REQUEST | NlmF::CREATE | NlmF::ACK,
            attrs,
        )?;
        self.pump_expectations(&mut |_, _| Verdict::Continue)
    }

    /// Look up the expectation whose master flow matches `tuple` and
    /// hand it to `cb`.
    pub fn get_expectation<F>(
        &mut self,
        tuple: &Tuple,
        id: Option<u32>,
        mut cb: F,
    ) -> Result<(), NlError>
    where
        F: FnMut(Expectation, MsgKind) -> Verdict,
    {
        let attrs = crate::exp::query_attrs(tuple, id, &self.registry)?;
        self.send_request(
            NfSubsys::CtnetlinkExp,
            ExpMsg::Get.into(),
            NlmF::REQUEST | NlmF::ACK,
            attrs,
        )?;
        self.pump_expectations(&mut cb)
    }

    /// Delete the expectation whose master flow matches `tuple`.
    pub fn delete_expectation(&mut self, tuple: &Tuple, id: Option<u32>) -> Result<(), NlError> {
        let attrs = crate::exp::query_attrs(tuple, id, &self.registry)?;
        self.send_request(
            NfSubsys::CtnetlinkExp,
            ExpMsg::Delete.into(),
            NlmF::REQUEST | NlmF::ACK | NlmF::ROOT | NlmF::MATCH,
            attrs,
        )?;
        self.ack_loop()
    }

    /// Walk the expectation table, handing every entry to `cb`.
    pub fn dump_expectations<F>(&mut self, mut cb: F) -> Result<(), NlError>
    where
        F: FnMut(Expectation, MsgKind) -> Verdict,
    {
        self.send_request(
            NfSubsys::CtnetlinkExp,
            ExpMsg::Get.into(),
            NlmF::REQUEST | NlmF::ROOT | NlmF::MATCH,
            AttrBuffer::<ExpAttr>::new(),
        )?;
        self.pump_expectations(&mut cb)
    }

    /// Remove every entry from the expectation table.
    pub fn flush_expectations(&mut self) -> Result<(), NlError> {
        self.send_request(
            NfSubsys::CtnetlinkExp,
            ExpMsg::Delete.into(),
            NlmF::REQUEST | NlmF::ACK,
            AttrBuffer::<ExpAttr>::new(),
        )?;
        self.ack_loop()
    }

    /// Turn the calling thread into an event pump for expectation
    /// events, like [`Handle::watch_flows`].
    pub fn watch_expectations<F>(&mut self, mut cb: F) -> Result<(), NlError>
    where
        F: FnMut(Expectation, MsgKind) -> Verdict,
    {
        self.pump_expectations(&mut cb)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use std::net::Ipv4Addr;

    use crate::ct::{FlowBuilder, ProtoTuple};

    fn sample_flow() -> Flow {
        FlowBuilder::default()
            .orig(Tuple::new(
                Ipv4Addr::new(10, 0, 0, 1),
                Ipv4Addr::new(10, 0, 0, 2),
                ProtoTuple::Tcp {
                    src_port: 1234,
                    dst_port: 80,
                },
            ))
            .reply(Tuple::new(
                Ipv4Addr::new(10, 0, 0, 2),
                Ipv4Addr::new(10, 0, 0, 1),
                ProtoTuple::Tcp {
                    src_port: 80,
                    dst_port: 1234,
                },
            ))
            .timeout(300)
            .build()
            .unwrap()
    }

    fn flow_msg_bytes(
        registry: &ProtoRegistry,
        msg_code: u8,
        flags: NlmF,
        flow: &Flow,
    ) -> Vec<u8> {
        let payload = Nfgenmsg::new(
            libc::AF_INET as u8,
            NFNETLINK_V0,
            0,
            flow.to_attrs(registry).unwrap(),
        );
        let msg = Nlmsghdr::new(
            None,
            nfnl_msg_type(NfSubsys::Ctnetlink.into(), msg_code),
            flags,
            None,
            None,
            payload,
        );
        crate::serialize(&msg, true).unwrap()
    }

    fn control_msg_bytes(nl_type: u16, error: i32) -> Vec<u8> {
        let msg = Nlmsghdr::new(
            None,
            nl_type,
            NlmF::empty(),
            None,
            None,
            Nlmsgerr {
                error,
                nlmsg: Buffer::from(&[0u8; 16][..]),
            },
        );
        crate::serialize(&msg, true).unwrap()
    }

    #[test]
    fn test_msg_kind_mapping() {
        let new_type = nfnl_msg_type(NfSubsys::Ctnetlink.into(), CtMsg::New.into());
        let del_type = nfnl_msg_type(NfSubsys::Ctnetlink.into(), CtMsg::Delete.into());
        assert_eq!(
            msg_kind(new_type, NlmF::CREATE | NlmF::EXCL),
            MsgKind::New
        );
        assert_eq!(msg_kind(new_type, NlmF::empty()), MsgKind::Update);
        assert_eq!(msg_kind(del_type, NlmF::empty()), MsgKind::Destroy);
        assert_eq!(
            msg_kind(
                nfnl_msg_type(NfSubsys::Ctnetlink.into(), CtMsg::Get.into()),
                NlmF::empty()
            ),
            MsgKind::Unknown
        );
    }

    #[test]
    fn test_dump_drains_three_entries() {
        let registry = ProtoRegistry::with_builtins();
        let flow = sample_flow();

        let mut datagram = Vec::new();
        for _ in 0..3 {
            datagram.extend_from_slice(&flow_msg_bytes(
                &registry,
                CtMsg::New.into(),
                NlmF::MULTI,
                &flow,
            ));
        }
        datagram.extend_from_slice(&control_msg_bytes(Nlmsg::Done.into(), 0));

        let mut seen = Vec::new();
        let status = dispatch_datagram(&datagram, &mut |nl_type, flags, payload| {
            handle_flow_msg(&registry, nl_type, flags, payload, &mut |flow, kind| {
                seen.push((flow, kind));
                Verdict::Continue
            })
        })
        .unwrap();

        assert_eq!(status, Drain::Done);
        assert_eq!(seen.len(), 3);
        for (parsed, kind) in &seen {
            assert_eq!(parsed.orig(), flow.orig());
            assert_eq!(*kind, MsgKind::Update);
        }
    }

    #[test]
    fn test_event_stream_kinds() {
        let registry = ProtoRegistry::with_builtins();
        let flow = sample_flow();

        let mut datagram = Vec::new();
        datagram.extend_from_slice(&flow_msg_bytes(
            &registry,
            CtMsg::New.into(),
            NlmF::CREATE | NlmF::EXCL,
            &flow,
        ));
        datagram.extend_from_slice(&flow_msg_bytes(
            &registry,
            CtMsg::New.into(),
            NlmF::empty(),
            &flow,
        ));
        datagram.extend_from_slice(&flow_msg_bytes(
            &registry,
            CtMsg::Delete.into(),
            NlmF::empty(),
            &flow,
        ));

        let mut kinds = Vec::new();
        let status = dispatch_datagram(&datagram, &mut |nl_type, flags, payload| {
            handle_flow_msg(&registry, nl_type, flags, payload, &mut |_, kind| {
                kinds.push(kind);
                Verdict::Continue
            })
        })
        .unwrap();

        assert_eq!(status, Drain::Continue);
        assert_eq!(
            kinds,
            vec![MsgKind::New, MsgKind::Update, MsgKind::Destroy]
        );
    }

    #[test]
    fn test_ack_terminates_drain() {
        let datagram = control_msg_bytes(Nlmsg::Error.into(), 0);
        let status = dispatch_datagram(&datagram, &mut |_, _, _| {
            panic!("an ACK is not a data message")
        })
        .unwrap();
        assert_eq!(status, Drain::Done);
    }

    #[test]
    fn test_kernel_errno_surfaces_untranslated() {
        let datagram = control_msg_bytes(Nlmsg::Error.into(), -libc::ENOENT);
        let err = dispatch_datagram(&datagram, &mut |_, _, _| Ok(Verdict::Continue)).unwrap_err();
        match err {
            NlError::Nlmsgerr(errno) => assert_eq!(errno, -libc::ENOENT),
            other => panic!("expected a kernel errno, got {}", other),
        }
    }

    #[test]
    fn test_foreign_subsystem_is_dropped() {
        let registry = ProtoRegistry::with_builtins();
        let flow = sample_flow();
        // Subsystem 10 is neither conntrack nor expectations.
        let payload = Nfgenmsg::new(
            libc::AF_INET as u8,
            NFNETLINK_V0,
            0,
            flow.to_attrs(&registry).unwrap(),
        );
        let msg = Nlmsghdr::new(
            None,
            nfnl_msg_type(10, 0),
            NlmF::empty(),
            None,
            None,
            payload,
        );
        let datagram = crate::serialize(&msg, true).unwrap();

        let status = dispatch_datagram(&datagram, &mut |_, _, _| {
            panic!("foreign subsystem messages must not reach the handler")
        })
        .unwrap();
        assert_eq!(status, Drain::Continue);
    }

    #[test]
    fn test_callback_stop_ends_drain() {
        let registry = ProtoRegistry::with_builtins();
        let flow = sample_flow();
        let mut datagram = Vec::new();
        for _ in 0..3 {
            datagram.extend_from_slice(&flow_msg_bytes(
                &registry,
                CtMsg::New.into(),
                NlmF::MULTI,
                &flow,
            ));
        }

        let mut calls = 0;
        let status = dispatch_datagram(&datagram, &mut |nl_type, flags, payload| {
            handle_flow_msg(&registry, nl_type, flags, payload, &mut |_, _| {
                calls += 1;
                Verdict::Stop
            })
        })
        .unwrap();

        assert_eq!(status, Drain::Done);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_expectation_messages_skipped_by_flow_handler() {
        let registry = ProtoRegistry::with_builtins();
        let flow = sample_flow();
        let payload = Nfgenmsg::new(
            libc::AF_INET as u8,
            NFNETLINK_V0,
            0,
            flow.to_attrs(&registry).unwrap(),
        );
        let msg = Nlmsghdr::new(
            None,
            nfnl_msg_type(NfSubsys::CtnetlinkExp.into(), ExpMsg::New.into()),
            NlmF::empty(),
            None,
            None,
            payload,
        );
        let datagram = crate::serialize(&msg, true).unwrap();

        let mut calls = 0;
        dispatch_datagram(&datagram, &mut |nl_type, flags, payload| {
            handle_flow_msg(&registry, nl_type, flags, payload, &mut |_, _| {
                calls += 1;
                Verdict::Continue
            })
        })
        .unwrap();
        assert_eq!(calls, 0);
    }
}
