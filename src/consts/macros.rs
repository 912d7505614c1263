// This is to facillitate the two different ways to call
// `impl_var`: one with doc comments and one without.
#[macro_export]
#[doc(hidden)]
macro_rules! impl_var_base {
    ($name:ident, $ty:ty, $( $var:ident => $val:expr ),* ) => {
        impl From<$ty> for $name {
            fn from(v: $ty) -> Self {
                match v {
                    $(
                        i if i == $val => $name::$var,
                    )*
                    i => $name::UnrecognizedVariant(i)
                }
            }
        }

        impl From<$name> for $ty {
            fn from(v: $name) -> Self {
                match v {
                    $(
                        $name::$var => $val,
                    )*
                    $name::UnrecognizedVariant(i) => i,
                }
            }
        }

        impl<'a> From<&'a $name> for $ty {
            fn from(v: &'a $name) -> Self {
                match *v {
                    $(
                        $name::$var => $val,
                    )*
                    $name::UnrecognizedVariant(i) => i,
                }
            }
        }

        impl $crate::Nl for $name {
            fn serialize(&self, mem: $crate::types::SerBuffer) -> Result<(), $crate::err::SerError> {
                let v: $ty = self.into();
                $crate::Nl::serialize(&v, mem)
            }

            fn deserialize(mem: $crate::types::DeBuffer) -> Result<Self, $crate::err::DeError> {
                let v = <$ty as $crate::Nl>::deserialize(mem)?;
                Ok(v.into())
            }

            fn size(&self) -> usize {
                std::mem::size_of::<$ty>()
            }

            fn type_size() -> Option<usize> {
                Some(std::mem::size_of::<$ty>())
            }
        }
    };
}

#[macro_export]
/// For naming a new enum, passing in what type it serializes to and
/// deserializes from, and providing a mapping from variants to
/// expressions (such as libc consts) that will ultimately be used in
/// the serialization/deserialization step when sending the netlink
/// message over the wire.
///
/// # Usage
///  Create an `enum` named "MyNetlinkProtoAttrs" that can be
///  serialized into `u16`s to use with Netlink.
///  ```ignore
///  impl_var!(
///     /// These are the attributes returned
///     /// by a fake netlink protocol.
///     MyNetlinkProtoAttrs, u16,
///     Id => 16u16,
///     Name => 17u16,
///     Size => 18u16
///  );
/// ```
macro_rules! impl_var {
    (
        $( #[$outer:meta] )*
        $name:ident, $ty:ty, $( $var:ident => $val:expr ),* $(,)?
    ) => (
        $(#[$outer])*
        #[derive(Clone, Copy, Debug, Eq, PartialEq)]
        pub enum $name {
            $(
                #[allow(missing_docs)]
                $var,
            )*
            /// Variant that signifies an invalid value while deserializing
            UnrecognizedVariant($ty),
        }

        impl_var_base!($name, $ty, $( $var => $val),* );
    );
}

#[macro_export]
/// For generating a marker trait that flags a new enum as usable in a
/// field that accepts a generic type. This way, the type can be
/// constrained when the impl is provided to only accept enums that
/// implement the marker trait that corresponds to the given marker
/// trait. The current convention is to use `impl_trait` to create the
/// trait with the name of the field that is the generic type and then
/// use `impl_var_trait` to flag the new enum as usable in this field.
macro_rules! impl_trait {
    ( $(#[$outer:meta])* $trait_name:ident, $to_from_ty:ty ) => {
        $(#[$outer])*
        pub trait $trait_name:
            $crate::Nl + PartialEq + Clone + From<$to_from_ty> + Into<$to_from_ty>
        {
        }

        impl $trait_name for $to_from_ty {}
    };
}

#[macro_export]
/// For defining a new enum implementing the provided marker trait.
/// It accepts a name for the enum and the target type for
/// serialization and deserialization conversions, as well as value
/// conversions for serialization and deserialization.
macro_rules! impl_var_trait {
    ( $( #[$outer:meta] )* $name:ident, $ty:ty, $impl_name:ident,
      $( $var:ident => $val:expr ),* $(,)? ) => (
        impl_var!( $(#[$outer])*
            $name, $ty, $( $var => $val ),*
        );

        impl $impl_name for $name {}
    );
}
