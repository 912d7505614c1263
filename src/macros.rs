macro_rules! put_int {
    ($to_write:expr, $mem:expr, $fn:ident) => {{
        let size = std::mem::size_of_val(&$to_write);
        match $mem.len() {
            i if i < size => return Err($crate::err::SerError::UnexpectedEOB),
            i if i > size => return Err($crate::err::SerError::BufferNotFilled),
            _ => (),
        };
        byteorder::NativeEndian::$fn($mem, $to_write)
    }};
    ($to_write:expr, $mem:expr, $fn:ident, $endian:ty) => {{
        let size = std::mem::size_of_val(&$to_write);
        match $mem.len() {
            i if i < size => return Err($crate::err::SerError::UnexpectedEOB),
            i if i > size => return Err($crate::err::SerError::BufferNotFilled),
            _ => (),
        };
        <$endian>::$fn($mem, $to_write)
    }};
}

macro_rules! get_int {
    ($mem:expr, $fn:ident, $ty:ty) => {{
        let size = std::mem::size_of::<$ty>();
        match $mem.len() {
            i if i < size => {
                return Err($crate::err::DeError::IncompleteType(stringify!($ty)))
            }
            i if i > size => {
                return Err($crate::err::DeError::DataLeftInBuffer(stringify!($ty)))
            }
            _ => (),
        };
        byteorder::NativeEndian::$fn($mem)
    }};
    ($mem:expr, $fn:ident, $ty:ty, $endian:ty) => {{
        let size = std::mem::size_of::<$ty>();
        match $mem.len() {
            i if i < size => {
                return Err($crate::err::DeError::IncompleteType(stringify!($ty)))
            }
            i if i > size => {
                return Err($crate::err::DeError::DataLeftInBuffer(stringify!($ty)))
            }
            _ => (),
        };
        <$endian>::$fn($mem)
    }};
}
