//! Module containing various types used across the netlink
//! structures in `nfct`.
//!
//! # Design decisions
//! These structures are new types rather than type aliases in most
//! cases to allow the internal representation to change without
//! resulting in a breaking change.

use std::{
    iter::FromIterator,
    slice::{Iter, IterMut},
};

use crate::{
    attr::{parse_attrs, Nlattr, NlAttrType},
    err::{DeError, SerError},
    Nl,
};

/// A buffer of bytes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Buffer(Vec<u8>);

impl AsRef<[u8]> for Buffer {
    fn as_ref(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl AsMut<[u8]> for Buffer {
    fn as_mut(&mut self) -> &mut [u8] {
        self.0.as_mut_slice()
    }
}

impl<'a> From<&'a [u8]> for Buffer {
    fn from(slice: &'a [u8]) -> Self {
        Buffer(Vec::from(slice))
    }
}

impl From<Vec<u8>> for Buffer {
    fn from(vec: Vec<u8>) -> Self {
        Buffer(vec)
    }
}

impl Buffer {
    /// Create a new general purpose byte buffer.
    pub fn new() -> Self {
        Buffer(Vec::new())
    }

    /// Extend the given buffer with the contents of another slice.
    pub fn extend_from_slice(&mut self, slice: &[u8]) {
        self.0.extend_from_slice(slice)
    }

    /// Get the current length of the buffer.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Nl for Buffer {
    fn serialize(&self, mem: SerBuffer) -> Result<(), SerError> {
        self.0.as_slice().serialize(mem)
    }

    fn deserialize(mem: DeBuffer) -> Result<Self, DeError> {
        Ok(Buffer::from(mem))
    }

    fn size(&self) -> usize {
        self.0.len()
    }

    fn type_size() -> Option<usize> {
        None
    }
}

/// Type alias for a buffer to serialize into.
pub type SerBuffer<'a> = &'a mut [u8];

/// Type alias for a buffer to deserialize from.
pub type DeBuffer<'a> = &'a [u8];

/// A buffer of netlink attributes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttrBuffer<T>(Vec<Nlattr<T>>);

impl<T> AttrBuffer<T> {
    /// Create a new buffer of netlink attributes.
    pub fn new() -> Self {
        AttrBuffer(Vec::new())
    }

    /// Add a new netlink attribute to the end of the buffer.
    pub fn push(&mut self, attr: Nlattr<T>) {
        self.0.push(attr)
    }

    /// Return an iterator over immutable references to the elements
    /// in the buffer.
    pub fn iter(&self) -> Iter<'_, Nlattr<T>> {
        self.0.iter()
    }

    /// Return an iterator over mutable references to the elements
    /// in the buffer.
    pub fn iter_mut(&mut self) -> IterMut<'_, Nlattr<T>> {
        self.0.iter_mut()
    }

    /// Returns the number of elements in the buffer.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether the number of elements in the buffer is 0.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T> FromIterator<Nlattr<T>> for AttrBuffer<T> {
    fn from_iter<I>(i: I) -> Self
    where
        I: IntoIterator<Item = Nlattr<T>>,
    {
        AttrBuffer(Vec::from_iter(i))
    }
}

impl<T> IntoIterator for AttrBuffer<T> {
    type Item = Nlattr<T>;
    type IntoIter = <Vec<Nlattr<T>> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<T> Nl for AttrBuffer<T>
where
    T: NlAttrType,
{
    fn serialize(&self, mem: SerBuffer) -> Result<(), SerError> {
        let mut pos = 0;
        for attr in self.iter() {
            let asize = attr.asize();
            if pos + asize > mem.len() {
                return Err(SerError::UnexpectedEOB);
            }
            attr.serialize(&mut mem[pos..pos + asize])?;
            pos += asize;
        }
        if pos != mem.len() {
            return Err(SerError::BufferNotFilled);
        }
        Ok(())
    }

    fn deserialize(mem: DeBuffer) -> Result<Self, DeError> {
        Ok(AttrBuffer(parse_attrs(mem)?))
    }

    fn size(&self) -> usize {
        self.iter().fold(0, |acc, attr| acc + attr.asize())
    }

    fn type_size() -> Option<usize> {
        None
    }
}
