//! Expectation records and their codec.
//!
//! An expectation is a template a stateful helper registers for a
//! flow it anticipates: the master flow that spawned it, the expected
//! tuple, and a mask describing which parts of the tuple have to
//! match. The wire form reuses the tuple sub-trees of the flow codec.

use std::fmt::{self, Write};

use derive_builder::Builder;
use getset::{Getters, Setters};

use crate::{
    attr::{AttrHandle, Nlattr},
    consts::ct::ExpAttr,
    ct::{parse_tuple, tuple_attrs, Tuple},
    err::{DeError, SerError},
    proto::ProtoRegistry,
    types::AttrBuffer,
};

/// An expectation entry as seen by userspace.
///
/// Build one with [`ExpectationBuilder`]; the three tuples are
/// required. Records produced by the parse side fill in whatever the
/// kernel reported and leave the rest at their defaults.
#[derive(Builder, Clone, Debug, Getters, Setters, PartialEq, Eq)]
#[builder(pattern = "owned")]
pub struct Expectation {
    /// Tuple of the flow that registered the expectation
    #[getset(get = "pub")]
    master: Tuple,
    /// Tuple the kernel expects to arrive
    #[getset(get = "pub")]
    tuple: Tuple,
    /// Mask applied to the expected tuple when matching
    #[getset(get = "pub")]
    mask: Tuple,
    /// Seconds until the expectation expires
    #[builder(default)]
    #[getset(get = "pub", set = "pub")]
    timeout: u32,
    /// Kernel assigned id; omitted from the wire when absent
    #[builder(default, setter(strip_option))]
    #[getset(get = "pub", set = "pub")]
    id: Option<u32>,
}

impl Expectation {
    /// Adapter rendering the expectation as the conventional one line
    /// form.
    pub fn display<'a>(&'a self, registry: &'a ProtoRegistry) -> ExpectationDisplay<'a> {
        ExpectationDisplay {
            exp: self,
            registry,
        }
    }

    /// Translate the record into its attribute vector: master,
    /// expected tuple and mask sub-trees, the timeout, and the id
    /// when set.
    pub(crate) fn to_attrs(
        &self,
        registry: &ProtoRegistry,
    ) -> Result<AttrBuffer<ExpAttr>, SerError> {
        let mut attrs = AttrBuffer::new();
        attrs.push(Nlattr::new_nested(
            ExpAttr::Master,
            tuple_attrs(&self.master, registry)?,
        )?);
        attrs.push(Nlattr::new_nested(
            ExpAttr::Tuple,
            tuple_attrs(&self.tuple, registry)?,
        )?);
        attrs.push(Nlattr::new_nested(
            ExpAttr::Mask,
            tuple_attrs(&self.mask, registry)?,
        )?);
        attrs.push(Nlattr::new(ExpAttr::Timeout, u32::to_be(self.timeout))?);
        if let Some(id) = self.id {
            attrs.push(Nlattr::new(ExpAttr::Id, u32::to_be(id))?);
        }
        Ok(attrs)
    }

    /// Populate a record from a parsed attribute vector.
    pub(crate) fn parse(
        handle: &AttrHandle<ExpAttr>,
        registry: &ProtoRegistry,
    ) -> Result<Expectation, DeError> {
        let mut exp = Expectation {
            master: Tuple::default(),
            tuple: Tuple::default(),
            mask: Tuple::default(),
            timeout: 0,
            id: None,
        };
        if let Some(attr) = handle.get_attribute(ExpAttr::Master) {
            exp.master = parse_tuple(&attr.get_attr_handle()?, registry)?;
        }
        if let Some(attr) = handle.get_attribute(ExpAttr::Tuple) {
            exp.tuple = parse_tuple(&attr.get_attr_handle()?, registry)?;
        }
        if let Some(attr) = handle.get_attribute(ExpAttr::Mask) {
            exp.mask = parse_tuple(&attr.get_attr_handle()?, registry)?;
        }
        if let Some(attr) = handle.get_attribute(ExpAttr::Timeout) {
            exp.timeout = u32::from_be(attr.get_payload_as()?);
        }
        if let Some(attr) = handle.get_attribute(ExpAttr::Id) {
            exp.id = Some(u32::from_be(attr.get_payload_as()?));
        }
        Ok(exp)
    }
}

/// Build the attribute vector of an expectation query: the tuple to
/// match (sent as the master sub-tree) and optionally an id. Used by
/// the get and delete verbs.
pub(crate) fn query_attrs(
    tuple: &Tuple,
    id: Option<u32>,
    registry: &ProtoRegistry,
) -> Result<AttrBuffer<ExpAttr>, SerError> {
    let mut attrs = AttrBuffer::new();
    attrs.push(Nlattr::new_nested(
        ExpAttr::Master,
        tuple_attrs(tuple, registry)?,
    )?);
    if let Some(id) = id {
        attrs.push(Nlattr::new(ExpAttr::Id, u32::to_be(id))?);
    }
    Ok(attrs)
}

/// [`fmt::Display`] adapter returned by [`Expectation::display`].
pub struct ExpectationDisplay<'a> {
    exp: &'a Expectation,
    registry: &'a ProtoRegistry,
}

impl fmt::Display for ExpectationDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut out = String::new();
        write!(
            out,
            "{} proto={} ",
            self.exp.timeout, self.exp.tuple.protonum
        )?;
        write!(out, "{}", self.exp.tuple.display(self.registry))?;
        if let Some(id) = self.exp.id {
            write!(out, "id={} ", id)?;
        }
        f.write_str(out.trim_end())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use std::net::Ipv4Addr;

    use crate::ct::ProtoTuple;

    fn sample_expectation() -> Expectation {
        let master = Tuple::new(
            Ipv4Addr::new(192, 168, 1, 1),
            Ipv4Addr::new(192, 168, 1, 2),
            ProtoTuple::Tcp {
                src_port: 21,
                dst_port: 40000,
            },
        );
        let tuple = Tuple::new(
            Ipv4Addr::new(192, 168, 1, 2),
            Ipv4Addr::new(192, 168, 1, 1),
            ProtoTuple::Tcp {
                src_port: 0,
                dst_port: 20,
            },
        );
        let mask = Tuple::with_protonum(
            Ipv4Addr::new(255, 255, 255, 255),
            Ipv4Addr::new(255, 255, 255, 255),
            libc::IPPROTO_TCP as u8,
            ProtoTuple::Tcp {
                src_port: 0,
                dst_port: 0xffff,
            },
        );
        ExpectationBuilder::default()
            .master(master)
            .tuple(tuple)
            .mask(mask)
            .timeout(200)
            .id(77)
            .build()
            .unwrap()
    }

    #[test]
    fn test_expectation_round_trip() {
        let registry = ProtoRegistry::with_builtins();
        let exp = sample_expectation();
        let attrs = exp.to_attrs(&registry).unwrap();
        let mem = crate::serialize(&attrs, false).unwrap();
        let parsed = Expectation::parse(&AttrHandle::parse(&mem).unwrap(), &registry).unwrap();
        assert_eq!(parsed, exp);
    }

    #[test]
    fn test_expectation_id_omitted_when_absent() {
        let registry = ProtoRegistry::with_builtins();
        let mut exp = sample_expectation();
        exp.set_id(None);
        let attrs = exp.to_attrs(&registry).unwrap();
        assert!(attrs.iter().all(|a| a.nla_type != ExpAttr::Id));
    }

    #[test]
    fn test_query_attrs_master_and_id() {
        let registry = ProtoRegistry::with_builtins();
        let exp = sample_expectation();
        let attrs = query_attrs(exp.master(), Some(5), &registry).unwrap();
        assert!(attrs.iter().any(|a| a.nla_type == ExpAttr::Master));
        let id = attrs.iter().find(|a| a.nla_type == ExpAttr::Id).unwrap();
        assert_eq!(id.payload.as_ref(), &5u32.to_be_bytes());
    }
}
