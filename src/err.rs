//! This is the module that contains the error types used in `nfct`
//!
//! There are three main types:
//! * [`NlError`] - the top level error returned by the operation
//!   verbs on [`Handle`][crate::handle::Handle].
//! * [`DeError`] - error while deserializing
//! * [`SerError`] - error while serializing
//!
//! # Design decisions
//! All errors implement [`std::error::Error`] in an attempt to allow
//! them to be used in conjunction with [`Result`] for easier error
//! management even at the protocol error level.
//!
//! Kernel-reported errors are never translated: the errno delivered
//! in a netlink ACK is surfaced verbatim through
//! [`NlError::Nlmsgerr`].

use std::{error::Error, fmt, io};

/// Top level error for the operation verbs.
#[derive(Debug)]
pub enum NlError {
    /// Variant for [`String`]-based messages
    Msg(String),
    /// A serialization error.
    Ser(SerError),
    /// A deserialization error.
    De(DeError),
    /// An error packet sent back by netlink: the raw negative errno
    /// reported by the kernel in the ACK.
    Nlmsgerr(i32),
    /// An IO error from the underlying socket.
    Io(io::Error),
    /// No ACK was received when the request asked for one.
    NoAck,
}

impl NlError {
    /// Create new error from a data type implementing
    /// [`Display`][std::fmt::Display]
    pub fn new<D>(s: D) -> Self
    where
        D: fmt::Display,
    {
        NlError::Msg(s.to_string())
    }
}

impl From<SerError> for NlError {
    fn from(err: SerError) -> Self {
        NlError::Ser(err)
    }
}

impl From<DeError> for NlError {
    fn from(err: DeError) -> Self {
        NlError::De(err)
    }
}

impl From<io::Error> for NlError {
    fn from(err: io::Error) -> Self {
        NlError::Io(err)
    }
}

impl fmt::Display for NlError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NlError::Msg(msg) => write!(f, "{}", msg),
            NlError::Ser(err) => write!(f, "Serialization error: {}", err),
            NlError::De(err) => write!(f, "Deserialization error: {}", err),
            NlError::Nlmsgerr(errno) => write!(
                f,
                "Error response received from netlink: {}",
                io::Error::from_raw_os_error(-*errno)
            ),
            NlError::Io(err) => write!(f, "IO error: {}", err),
            NlError::NoAck => write!(f, "No ack received"),
        }
    }
}

impl Error for NlError {}

/// Serialization error
#[derive(Debug)]
pub enum SerError {
    /// Abitrary error message
    Msg(String),
    /// The end of the buffer was reached before serialization finished
    UnexpectedEOB,
    /// Serialization did not fill the buffer
    BufferNotFilled,
    /// A message exceeds the maximum length the transport accepts
    TooLong(usize),
    /// A wrapped [`io::Error`]
    Wrapped(io::Error),
}

impl SerError {
    /// Create a new error with the given message as description
    pub fn new<D>(msg: D) -> Self
    where
        D: fmt::Display,
    {
        SerError::Msg(msg.to_string())
    }
}

impl fmt::Display for SerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SerError::Msg(s) => write!(f, "{}", s),
            SerError::UnexpectedEOB => write!(
                f,
                "The buffer was too small for the requested serialization operation",
            ),
            SerError::BufferNotFilled => write!(
                f,
                "The number of bytes written to the buffer did not fill the given space",
            ),
            SerError::TooLong(size) => write!(
                f,
                "A message of {} bytes exceeds the transport maximum",
                size
            ),
            SerError::Wrapped(err) => write!(f, "{}", err),
        }
    }
}

impl Error for SerError {}

/// Deserialization error
#[derive(Debug)]
pub enum DeError {
    /// Abitrary error message
    Msg(String),
    /// The end of the buffer was reached before deserialization
    /// finished
    UnexpectedEOB,
    /// Deserialization did not fill the buffer
    DataLeftInBuffer(&'static str),
    /// The buffer was not large enough to deserialize the given type
    IncompleteType(&'static str),
}

impl DeError {
    /// Create new error from a data type implementing
    /// [`Display`][std::fmt::Display]
    pub fn new<D>(s: D) -> Self
    where
        D: fmt::Display,
    {
        DeError::Msg(s.to_string())
    }
}

impl fmt::Display for DeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DeError::Msg(s) => write!(f, "{}", s),
            DeError::UnexpectedEOB => write!(
                f,
                "The buffer was not large enough to complete the deserialize operation",
            ),
            DeError::DataLeftInBuffer(ty) => {
                write!(f, "Bytes were left over after deserializing {}", ty)
            }
            DeError::IncompleteType(ty) => {
                write!(f, "Not enough bytes left in the buffer to deserialize {}", ty)
            }
        }
    }
}

impl Error for DeError {}
