//! Netlink attribute code shared by every conntrack message.
//!
//! Conntrack message bodies are trees of type-length-value
//! attributes. [`Nlattr`] is one attribute: a 16 bit length, a 16 bit
//! type tag (with the nested bit split out), and a payload that is
//! either a serialized scalar or a concatenation of further
//! attributes. [`AttrHandle`] is the parse side: it walks an
//! attribute vector once and then hands out attributes by type tag,
//! so parse order never matters.

use crate::{
    consts::alignto,
    err::{DeError, SerError},
    types::{AttrBuffer, Buffer, DeBuffer, SerBuffer},
    Nl,
};

pub use crate::consts::ct::NlAttrType;

const NLA_HDRLEN: usize = 4;

/// Struct representing netlink attributes and payloads
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Nlattr<T> {
    /// Length of the attribute header and payload together
    pub nla_len: u16,
    /// Set when the payload contains nested attributes; serialized
    /// as the `NLA_F_NESTED` bit of the type field
    pub nla_nested: bool,
    /// Enum representing the type of the attribute payload
    pub nla_type: T,
    /// Payload of the attribute - either a serialized scalar or
    /// nested attributes
    pub payload: Buffer,
}

impl<T> Nlattr<T>
where
    T: NlAttrType,
{
    /// Create a new netlink attribute with a payload from an object
    /// implementing [`Nl`]
    pub fn new<P>(nla_type: T, payload: P) -> Result<Self, SerError>
    where
        P: Nl,
    {
        let payload = Buffer::from(crate::serialize(&payload, false)?);
        let mut nla = Nlattr {
            nla_len: 0,
            nla_nested: false,
            nla_type,
            payload,
        };
        nla.nla_len = nla.size() as u16;
        Ok(nla)
    }

    /// Create a new netlink attribute containing other attributes.
    /// The `NLA_F_NESTED` bit is set on the serialized type tag.
    pub fn new_nested<P>(nla_type: T, attrs: AttrBuffer<P>) -> Result<Self, SerError>
    where
        P: NlAttrType,
    {
        let payload = Buffer::from(crate::serialize(&attrs, false)?);
        let mut nla = Nlattr {
            nla_len: 0,
            nla_nested: true,
            nla_type,
            payload,
        };
        nla.nla_len = nla.size() as u16;
        Ok(nla)
    }

    /// Deserialize the payload as the provided type parameter
    pub fn get_payload_as<R>(&self) -> Result<R, DeError>
    where
        R: Nl,
    {
        R::deserialize(self.payload.as_ref())
    }

    /// Parse the payload as a vector of nested attributes and return
    /// a handle for traversing them
    pub fn get_attr_handle<P>(&self) -> Result<AttrHandle<P>, DeError>
    where
        P: NlAttrType,
    {
        AttrHandle::parse(self.payload.as_ref())
    }
}

impl<T> Nl for Nlattr<T>
where
    T: NlAttrType,
{
    /// Serialization accepts a buffer of either the exact or the
    /// aligned size; the trailing padding bytes are zeroed.
    fn serialize(&self, mem: SerBuffer) -> Result<(), SerError> {
        match mem.len() {
            i if i < self.size() => return Err(SerError::UnexpectedEOB),
            i if i > self.asize() => return Err(SerError::BufferNotFilled),
            _ => (),
        };
        self.nla_len.serialize(&mut mem[0..2])?;
        let type_bits: u16 = self.nla_type.clone().into()
            | if self.nla_nested { NLA_F_NESTED } else { 0 };
        type_bits.serialize(&mut mem[2..4])?;
        let payload_end = NLA_HDRLEN + self.payload.len();
        self.payload.serialize(&mut mem[NLA_HDRLEN..payload_end])?;
        for byte in mem[payload_end..].iter_mut() {
            *byte = 0;
        }
        Ok(())
    }

    fn deserialize(mem: DeBuffer) -> Result<Self, DeError> {
        if mem.len() < NLA_HDRLEN {
            return Err(DeError::UnexpectedEOB);
        }
        let nla_len = u16::deserialize(&mem[0..2])?;
        let type_bits = u16::deserialize(&mem[2..4])?;
        if (nla_len as usize) < NLA_HDRLEN || nla_len as usize > mem.len() {
            return Err(DeError::UnexpectedEOB);
        }
        Ok(Nlattr {
            nla_len,
            nla_nested: type_bits & NLA_F_NESTED != 0,
            nla_type: T::from(type_bits & NLA_TYPE_MASK),
            payload: Buffer::from(&mem[NLA_HDRLEN..nla_len as usize]),
        })
    }

    fn size(&self) -> usize {
        NLA_HDRLEN + self.payload.len()
    }

    fn type_size() -> Option<usize> {
        None
    }
}

const NLA_F_NESTED: u16 = 1 << 15;
const NLA_TYPE_MASK: u16 = !(1 << 15 | 1 << 14);

/// Walk a serialized attribute vector into parsed attributes.
pub(crate) fn parse_attrs<T>(mem: DeBuffer) -> Result<Vec<Nlattr<T>>, DeError>
where
    T: NlAttrType,
{
    let mut attrs = Vec::new();
    let mut pos = 0;
    while pos < mem.len() {
        if mem.len() - pos < NLA_HDRLEN {
            return Err(DeError::UnexpectedEOB);
        }
        let nla_len = u16::deserialize(&mem[pos..pos + 2])? as usize;
        if nla_len < NLA_HDRLEN || pos + nla_len > mem.len() {
            return Err(DeError::UnexpectedEOB);
        }
        attrs.push(Nlattr::deserialize(&mem[pos..pos + nla_len])?);
        pos += alignto(nla_len);
    }
    Ok(attrs)
}

/// Handle for traversing a parsed attribute vector by type tag.
#[derive(Debug)]
pub struct AttrHandle<T> {
    attrs: Vec<Nlattr<T>>,
}

impl<T> AttrHandle<T>
where
    T: NlAttrType,
{
    /// Parse a binary attribute vector into a handle
    pub fn parse(mem: DeBuffer) -> Result<Self, DeError> {
        Ok(AttrHandle {
            attrs: parse_attrs(mem)?,
        })
    }

    /// Wrap an already parsed attribute buffer
    pub fn from_buffer(attrs: AttrBuffer<T>) -> Self {
        AttrHandle {
            attrs: attrs.into_iter().collect(),
        }
    }

    /// Get the first attribute with the requested type tag, or
    /// [`None`] if the message did not carry it
    pub fn get_attribute(&self, t: T) -> Option<&Nlattr<T>> {
        self.attrs.iter().find(|a| a.nla_type == t)
    }

    /// Iterate over the attributes in message order
    pub fn iter(&self) -> std::slice::Iter<Nlattr<T>> {
        self.attrs.iter()
    }

    /// Number of attributes in the handle
    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    /// Whether the handle holds no attributes
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::consts::ct::{CtAttr, IpAttr, TupleAttr};

    #[test]
    fn test_attr_serialize() {
        let attr = Nlattr::new(CtAttr::Mark, 0xdeadbeefu32.to_be()).unwrap();
        let mem = crate::serialize(&attr, true).unwrap();
        let mut expected = Vec::new();
        expected.extend_from_slice(&8u16.to_ne_bytes());
        expected.extend_from_slice(&8u16.to_ne_bytes());
        expected.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(mem, expected);
    }

    #[test]
    fn test_attr_padding() {
        let attr = Nlattr::new(IpAttr::V4Src, 1u8).unwrap();
        assert_eq!(attr.size(), 5);
        assert_eq!(attr.asize(), 8);
        let mem = crate::serialize(&attr, true).unwrap();
        assert_eq!(&mem[4..], &[1, 0, 0, 0]);
    }

    #[test]
    fn test_nested_flag_round_trip() {
        let mut inner = AttrBuffer::new();
        inner
            .push(Nlattr::new(IpAttr::V4Src, u32::to_be(0x0a000001)).unwrap());
        let outer = Nlattr::new_nested(TupleAttr::Ip, inner).unwrap();
        let mem = crate::serialize(&outer, true).unwrap();

        let parsed = Nlattr::<TupleAttr>::deserialize(&mem[..outer.size()]).unwrap();
        assert!(parsed.nla_nested);
        assert_eq!(parsed.nla_type, TupleAttr::Ip);

        let inner_handle = parsed.get_attr_handle::<IpAttr>().unwrap();
        let src = inner_handle.get_attribute(IpAttr::V4Src).unwrap();
        assert_eq!(u32::from_be(src.get_payload_as::<u32>().unwrap()), 0x0a000001);
    }

    #[test]
    fn test_parse_attrs_by_tag() {
        let mut attrs = AttrBuffer::new();
        attrs.push(Nlattr::new(CtAttr::Status, u32::to_be(2)).unwrap());
        attrs.push(Nlattr::new(CtAttr::Timeout, u32::to_be(300)).unwrap());
        let mem = crate::serialize(&attrs, false).unwrap();

        let handle = AttrHandle::<CtAttr>::parse(&mem).unwrap();
        assert_eq!(handle.len(), 2);
        assert!(handle.get_attribute(CtAttr::Mark).is_none());
        let timeout = handle.get_attribute(CtAttr::Timeout).unwrap();
        assert_eq!(u32::from_be(timeout.get_payload_as::<u32>().unwrap()), 300);
    }
}
