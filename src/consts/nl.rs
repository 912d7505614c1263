//! Constants for the top level netlink header.

use bitflags::bitflags;

use crate::{
    err::{DeError, SerError},
    types::{DeBuffer, SerBuffer},
    Nl,
};

impl_var!(
    /// Values for `nl_type` in `Nlmsghdr` that are handled by the
    /// netlink layer itself rather than a protocol family
    Nlmsg, u16,
    Noop => libc::NLMSG_NOOP as u16,
    Error => libc::NLMSG_ERROR as u16,
    Done => libc::NLMSG_DONE as u16,
    Overrun => libc::NLMSG_OVERRUN as u16
);

bitflags! {
    /// Values for `nl_flags` in `Nlmsghdr`
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct NlmF: u16 {
        /// This message is a request
        const REQUEST = libc::NLM_F_REQUEST as u16;
        /// Part of a multi-message response
        const MULTI = libc::NLM_F_MULTI as u16;
        /// Request an ACK from the kernel
        const ACK = libc::NLM_F_ACK as u16;
        /// Echo the request back
        const ECHO = libc::NLM_F_ECHO as u16;
        /// Return the complete table instead of a single entry
        const ROOT = libc::NLM_F_ROOT as u16;
        /// Return all entries matching the criteria in the request
        const MATCH = libc::NLM_F_MATCH as u16;
        /// Return an atomic snapshot of the table
        const ATOMIC = libc::NLM_F_ATOMIC as u16;
        /// Dump the table; equivalent to ROOT | MATCH
        const DUMP = libc::NLM_F_DUMP as u16;
        /// Replace an existing entry
        const REPLACE = libc::NLM_F_REPLACE as u16;
        /// Do not touch an entry if it already exists
        const EXCL = libc::NLM_F_EXCL as u16;
        /// Create an entry if it does not exist
        const CREATE = libc::NLM_F_CREATE as u16;
        /// Add to the end of the entry list
        const APPEND = libc::NLM_F_APPEND as u16;
    }
}

impl Nl for NlmF {
    fn serialize(&self, mem: SerBuffer) -> Result<(), SerError> {
        self.bits().serialize(mem)
    }

    fn deserialize(mem: DeBuffer) -> Result<Self, DeError> {
        Ok(NlmF::from_bits_retain(u16::deserialize(mem)?))
    }

    fn size(&self) -> usize {
        std::mem::size_of::<u16>()
    }

    fn type_size() -> Option<usize> {
        Some(std::mem::size_of::<u16>())
    }
}
