//! # High level notes
//!
//! The contents of this module are generated mostly by macros, which
//! implement the appropriate traits necessary to both be
//! serialized/deserialized and also provide an additional level of
//! type safety when constructing netlink packets. Some of the traits
//! generated in this module allow netlink structures to implement
//! trait bounds assuring that only compatible constant-based enums
//! are allowed to be passed in as parameters.
//!
//! Note that most of these constants come from the Linux kernel
//! headers, which can be found in `/usr/include/linux` on many
//! distros. The conntrack attribute tag space in particular is fixed
//! by the kernel ABI (`linux/netfilter/nfnetlink_conntrack.h`); this
//! module imports those published values and never invents tag
//! numbers.
//!
//! # Design decisions
//!
//! * Enums are used so that values can be checked based on a finite
//!   number of inputs as opposed to the range of whatever integer
//!   data type C defines as the struct member type. This makes it
//!   easier to catch garbage responses and corruption when an invalid
//!   netlink message is sent to the kernel.
//! * `UnrecognizedVariant` is included in each enum because
//!   completeness cannot be guaranteed for every constant for every
//!   protocol. This allows you to inspect the integer value returned
//!   and if you are sure that it is correct, you can use it. If it is
//!   a garbage value, this can also be useful for error reporting.
//! * Flag words (`nl_flags`, the conntrack status word, event group
//!   subscriptions) use the `bitflags` crate rather than enums; they
//!   are genuinely bit sets, not alternatives.

#[macro_use]
mod macros;

/// Constants related to the conntrack and expectation attribute tag
/// spaces
pub mod ct;
/// Constants related to the netfilter netlink message family
pub mod nfnl;
/// Constants related to generic netlink top level headers
pub mod nl;

/// Reimplementation of alignto macro in C
pub fn alignto(len: usize) -> usize {
    (len + libc::NLA_ALIGNTO as usize - 1) & !(libc::NLA_ALIGNTO as usize - 1)
}

/// Max supported message length for netlink messages supported by
/// the kernel.
pub const MAX_NL_LENGTH: usize = 32768;

#[cfg(test)]
mod test {
    use super::ct::*;

    #[test]
    fn test_generated_enum_into_from() {
        let orig: u16 = CtAttr::TupleOrig.into();
        assert_eq!(orig, 1);

        let orig_variant = CtAttr::from(1u16);
        assert_eq!(orig_variant, CtAttr::TupleOrig);

        let unknown = CtAttr::from(0x3f00u16);
        assert_eq!(unknown, CtAttr::UnrecognizedVariant(0x3f00));
    }
}
