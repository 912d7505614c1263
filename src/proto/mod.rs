//! The layer 4 protocol handler registry.
//!
//! The set of protocols conntrack can describe is open ended, so the
//! codec carries no protocol switches of its own: everything beyond
//! the generic portion of a record is delegated to a
//! [`ProtoHandler`]. Handlers for tcp, udp, icmp and sctp ship with
//! the crate; an application tracking an out-of-tree protocol
//! registers its own handler before using the codec.
//!
//! # Design decisions
//!
//! Registration is explicit. Handlers are trait objects in a
//! linear-scan list: the list is tiny, lookups are not on a fast
//! path, and a later registration for the same name shadows an
//! earlier one without ever evicting it.
//!
//! A handler compiled against a different version of this library
//! would corrupt messages silently, so
//! [`ProtoRegistry::register`] treats a version stamp mismatch as
//! fatal rather than recoverable.

use std::{fmt, sync::Arc};

use lazy_static::lazy_static;
use log::debug;
use parking_lot::RwLock;

use crate::{
    attr::AttrHandle,
    consts::ct::{ProtoAttr, ProtoNatAttr, ProtoinfoAttr},
    ct::{Flow, NatRange, ProtoInfo, Tuple},
    err::{DeError, SerError},
    types::AttrBuffer,
};

mod icmp;
mod sctp;
mod tcp;
mod udp;

pub use icmp::Icmp;
pub use sctp::Sctp;
pub use tcp::Tcp;
pub use udp::Udp;

/// One layer 4 protocol's contribution to the codec.
///
/// Every hook has a no-op default so a handler only implements the
/// regions its protocol actually uses: a protocol without flow state
/// skips the protocol info pair, one without NAT support skips the
/// NAT hook, and so on.
pub trait ProtoHandler: Send + Sync {
    /// Canonical lowercase protocol name, e.g. `"tcp"`.
    fn name(&self) -> &'static str;

    /// IANA protocol number the handler serves.
    fn protonum(&self) -> u8;

    /// Version stamp; must equal [`VERSION`][crate::VERSION].
    fn version(&self) -> &'static str;

    /// Append the protocol specific leaves of a tuple.
    fn build_tuple_proto(
        &self,
        tuple: &Tuple,
        attrs: &mut AttrBuffer<ProtoAttr>,
    ) -> Result<(), SerError> {
        let _ = (tuple, attrs);
        Ok(())
    }

    /// Fill the layer 4 variant of a tuple from parsed attributes.
    fn parse_tuple_proto(
        &self,
        handle: &AttrHandle<ProtoAttr>,
        tuple: &mut Tuple,
    ) -> Result<(), DeError> {
        let _ = (handle, tuple);
        Ok(())
    }

    /// Append the protocol info leaves of a flow.
    fn build_protoinfo(
        &self,
        flow: &Flow,
        attrs: &mut AttrBuffer<ProtoinfoAttr>,
    ) -> Result<(), SerError> {
        let _ = (flow, attrs);
        Ok(())
    }

    /// Fill the protocol info of a flow from parsed attributes.
    fn parse_protoinfo(
        &self,
        handle: &AttrHandle<ProtoinfoAttr>,
        flow: &mut Flow,
    ) -> Result<(), DeError> {
        let _ = (handle, flow);
        Ok(())
    }

    /// Append the protocol specific leaves of a NAT range. Reserved:
    /// none of the shipped handlers contribute here yet.
    fn build_nat_proto(
        &self,
        nat: &NatRange,
        attrs: &mut AttrBuffer<ProtoNatAttr>,
    ) -> Result<(), SerError> {
        let _ = (nat, attrs);
        Ok(())
    }

    /// Render the protocol specific endpoints of a tuple.
    fn fmt_tuple_proto(&self, tuple: &Tuple, f: &mut dyn fmt::Write) -> fmt::Result {
        let _ = (tuple, f);
        Ok(())
    }

    /// Render the protocol info of a flow.
    fn fmt_protoinfo(&self, info: &ProtoInfo, f: &mut dyn fmt::Write) -> fmt::Result {
        let _ = (info, f);
        Ok(())
    }
}

lazy_static! {
    static ref GLOBAL_REGISTRY: Arc<ProtoRegistry> = Arc::new(ProtoRegistry::with_builtins());
}

/// A set of protocol handlers keyed by name and protocol number.
///
/// [`Handle::open`][crate::handle::Handle::open] uses the process
/// wide default returned by [`ProtoRegistry::global`]; tests and
/// applications with unusual needs can scope their own with
/// [`Handle::open_with_registry`][crate::handle::Handle::open_with_registry].
pub struct ProtoRegistry {
    handlers: RwLock<Vec<Arc<dyn ProtoHandler>>>,
}

impl ProtoRegistry {
    /// A registry with no handlers at all.
    pub fn empty() -> Self {
        ProtoRegistry {
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// A registry seeded with the handlers shipped in this crate:
    /// tcp, udp, icmp and sctp.
    pub fn with_builtins() -> Self {
        let registry = ProtoRegistry::empty();
        registry.register(Arc::new(Tcp));
        registry.register(Arc::new(Udp));
        registry.register(Arc::new(Icmp));
        registry.register(Arc::new(Sctp));
        registry
    }

    /// The lazily initialized process wide registry, seeded with the
    /// built-in handlers.
    pub fn global() -> &'static Arc<ProtoRegistry> {
        &GLOBAL_REGISTRY
    }

    /// Insert a handler. Handlers are never evicted; registering a
    /// second handler under an existing name shadows the first for
    /// subsequent lookups.
    ///
    /// # Panics
    ///
    /// Terminates the process when the handler's version stamp does
    /// not equal [`VERSION`][crate::VERSION]. A handler built against
    /// another version of the library would corrupt messages
    /// silently, which is not a recoverable situation.
    pub fn register(&self, handler: Arc<dyn ProtoHandler>) {
        if handler.version() != crate::VERSION {
            panic!(
                "protocol handler `{}': version {} (I'm {})",
                handler.name(),
                handler.version(),
                crate::VERSION
            );
        }
        self.handlers.write().push(handler);
    }

    /// Look up a handler by canonical name.
    pub fn find(&self, name: &str) -> Option<Arc<dyn ProtoHandler>> {
        let found = self
            .handlers
            .read()
            .iter()
            .rev()
            .find(|h| h.name() == name)
            .map(Arc::clone);
        if found.is_none() {
            debug!("no protocol handler registered under name {}", name);
        }
        found
    }

    /// Look up a handler by protocol number.
    pub fn find_protonum(&self, protonum: u8) -> Option<Arc<dyn ProtoHandler>> {
        self.handlers
            .read()
            .iter()
            .rev()
            .find(|h| h.protonum() == protonum)
            .map(Arc::clone)
    }
}

impl fmt::Debug for ProtoRegistry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let names = self
            .handlers
            .read()
            .iter()
            .map(|h| h.name())
            .collect::<Vec<_>>();
        f.debug_struct("ProtoRegistry")
            .field("handlers", &names)
            .finish()
    }
}
