//! # Type safety for the weary conntrack user
//!
//! ## Rationale
//!
//! This crate is a pure Rust interface to the kernel connection
//! tracking subsystem reached through a netfilter netlink socket.
//! It lets an application list, query, create, update, delete and
//! monitor the flow entries the kernel maintains for stateful packet
//! inspection and NAT, as well as the expectation entries registered
//! by application layer helpers.
//!
//! ## The project is broken down into the following modules:
//! * `attr` - This defines the netlink attribute representation used
//! for the nested type-length-value trees conntrack messages are
//! built from.
//! * `consts` - This is where the kernel-defined constants are
//! wrapped into type safe enums and flag sets.
//! * `ct` - Flow records, the attribute codec translating them to and
//! from the wire, and their text formatters.
//! * `err` - This module contains all of the protocol and
//! library-level errors encountered in the code.
//! * `exp` - Expectation records and their codec.
//! * `handle` - The request dispatcher and the public operations
//! surface: one verb per conntrack or expectation operation.
//! * `nl` - This is the top level netlink header code that handles
//! the header that all netlink messages are encapsulated in, plus the
//! netfilter family header.
//! * `proto` - The layer 4 protocol handler registry. Handlers
//! contribute the protocol specific regions of tuples and flow
//! records; tcp, udp, icmp and sctp ship with the crate and
//! out-of-tree protocols can be registered at runtime.
//! * `socket` - This provides a thin socket structure for sending
//! and receiving netfilter netlink datagrams.
//!
//! ## [`Nl`] trait
//!
//! `lib.rs` at the top level contains the [`Nl`] trait which
//! provides buffer size calculation functions, a serialization
//! method, and a deserialization method. It also contains
//! implementations of [`Nl`] for common types.
//!
//! ## Design decisions
//!
//! Workflows go through [`Handle`][crate::handle::Handle]: open a
//! handle bound to the conntrack or expectation subsystem, call the
//! operation verbs, and receive parsed records through a callback
//! invoked synchronously from the receive loop. The library has no
//! internal threads and never retains a caller's record past the
//! call that accepted it.
//!
//! All multi-byte scalars on the conntrack wire are big endian; the
//! in-memory records hold host endian values and the codec converts
//! at the attribute boundary.

#![deny(missing_docs)]

#[macro_use]
mod macros;

pub mod attr;
pub mod consts;
pub mod ct;
pub mod err;
pub mod exp;
pub mod handle;
pub mod nl;
pub mod proto;
pub mod socket;
pub mod types;

use std::{io::Write, mem};

use byteorder::ByteOrder;

use crate::{
    consts::alignto,
    err::{DeError, SerError},
    types::{DeBuffer, SerBuffer},
};

/// Version stamp of this library.
///
/// Protocol handlers registered into a
/// [`ProtoRegistry`][crate::proto::ProtoRegistry] must carry exactly
/// this string; see
/// [`ProtoRegistry::register`][crate::proto::ProtoRegistry::register].
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Trait defining basic actions required for netlink communication.
/// Implementations for basic and `nfct`'s types are provided (see
/// below). Create new implementations if you have to work with a
/// netlink API that uses values of more unusual types.
pub trait Nl: Sized {
    /// Serialization method
    fn serialize(&self, mem: SerBuffer) -> Result<(), SerError>;

    /// Deserialization method
    fn deserialize(mem: DeBuffer) -> Result<Self, DeError>;

    /// The size of the binary representation of a type not aligned
    /// to 4-byte boundary size
    fn type_size() -> Option<usize>;

    /// The size of the binary representation of a type aligned
    /// to 4-byte boundary size
    fn type_asize() -> Option<usize> {
        Self::type_size().map(alignto)
    }

    /// The size of the binary representation of an existing value
    /// not aligned to 4-byte boundary size
    fn size(&self) -> usize;

    /// The size of the binary representation of an existing value
    /// aligned to 4-byte boundary size
    fn asize(&self) -> usize {
        alignto(self.size())
    }
}

/// Serialize an [`Nl`] value into a freshly allocated buffer,
/// zero padded to alignment when `aligned` is true.
pub fn serialize<T>(nl: &T, aligned: bool) -> Result<Vec<u8>, SerError>
where
    T: Nl,
{
    let mut mem = vec![0; if aligned { nl.asize() } else { nl.size() }];
    let size = nl.size();
    nl.serialize(&mut mem[..size])?;
    Ok(mem)
}

impl Nl for u8 {
    fn serialize(&self, mem: SerBuffer) -> Result<(), SerError> {
        let size = self.size();
        match mem.len() {
            i if i < size => return Err(SerError::UnexpectedEOB),
            i if i > size => return Err(SerError::BufferNotFilled),
            _ => (),
        };
        let _ = mem.as_mut().write(&[*self]);
        Ok(())
    }

    fn deserialize(mem: DeBuffer) -> Result<Self, DeError> {
        let size = Self::type_size().expect("Integers have static size");
        match mem.len() {
            i if i < size => return Err(DeError::IncompleteType(stringify!(u8))),
            i if i > size => return Err(DeError::DataLeftInBuffer(stringify!(u8))),
            _ => (),
        };
        Ok(*mem.first().expect("Length already checked"))
    }

    fn size(&self) -> usize {
        mem::size_of::<u8>()
    }

    fn type_size() -> Option<usize> {
        Some(mem::size_of::<u8>())
    }
}

impl Nl for u16 {
    fn serialize(&self, mem: SerBuffer) -> Result<(), SerError> {
        put_int!(*self, mem, write_u16);
        Ok(())
    }

    fn deserialize(mem: DeBuffer) -> Result<Self, DeError> {
        Ok(get_int!(mem, read_u16, u16))
    }

    fn size(&self) -> usize {
        mem::size_of::<u16>()
    }

    fn type_size() -> Option<usize> {
        Some(mem::size_of::<u16>())
    }
}

impl Nl for u32 {
    fn serialize(&self, mem: SerBuffer) -> Result<(), SerError> {
        put_int!(*self, mem, write_u32);
        Ok(())
    }

    fn deserialize(mem: DeBuffer) -> Result<Self, DeError> {
        Ok(get_int!(mem, read_u32, u32))
    }

    fn size(&self) -> usize {
        mem::size_of::<u32>()
    }

    fn type_size() -> Option<usize> {
        Some(mem::size_of::<u32>())
    }
}

impl Nl for i32 {
    fn serialize(&self, mem: SerBuffer) -> Result<(), SerError> {
        put_int!(*self, mem, write_i32);
        Ok(())
    }

    fn deserialize(mem: DeBuffer) -> Result<Self, DeError> {
        Ok(get_int!(mem, read_i32, i32))
    }

    fn size(&self) -> usize {
        mem::size_of::<i32>()
    }

    fn type_size() -> Option<usize> {
        Some(mem::size_of::<i32>())
    }
}

impl Nl for u64 {
    fn serialize(&self, mem: SerBuffer) -> Result<(), SerError> {
        put_int!(*self, mem, write_u64);
        Ok(())
    }

    fn deserialize(mem: DeBuffer) -> Result<Self, DeError> {
        Ok(get_int!(mem, read_u64, u64))
    }

    fn size(&self) -> usize {
        mem::size_of::<u64>()
    }

    fn type_size() -> Option<usize> {
        Some(mem::size_of::<u64>())
    }
}

impl<'a> Nl for &'a [u8] {
    fn serialize(&self, mem: SerBuffer) -> Result<(), SerError> {
        let size = self.size();
        match mem.len() {
            i if i > size => return Err(SerError::BufferNotFilled),
            i if i < size => return Err(SerError::UnexpectedEOB),
            _ => (),
        };
        if let Err(e) = mem.as_mut().write_all(self) {
            Err(SerError::Wrapped(e))
        } else {
            Ok(())
        }
    }

    fn deserialize(_m: DeBuffer) -> Result<Self, DeError> {
        unimplemented!("Use Buffer for deserialization of raw bytes")
    }

    fn size(&self) -> usize {
        self.len()
    }

    fn type_size() -> Option<usize> {
        None
    }
}
