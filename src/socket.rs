//! # Socket code around `libc`
//!
//! ## Notes
//!
//! This module provides a low level one-to-one mapping between `libc`
//! system call wrappers with defaults specific to netfilter netlink
//! sockets. Conntrack event subscriptions use the legacy group
//! bitmask written into `sockaddr_nl.nl_groups` at bind time, which
//! is how the kernel side of the conntrack event interface expects
//! them.

use std::{
    io,
    mem::{size_of, zeroed},
    os::unix::io::{AsRawFd, RawFd},
};

use libc::{self, c_int, c_void};

/// Handle for the socket file descriptor
pub struct NlSocket {
    fd: c_int,
    pid: u32,
}

impl NlSocket {
    /// Wrapper around `socket()` syscall filling in the
    /// netfilter-netlink-specific information
    pub fn new() -> Result<Self, io::Error> {
        let fd = match unsafe {
            libc::socket(libc::AF_NETLINK, libc::SOCK_RAW, libc::NETLINK_NETFILTER)
        } {
            i if i >= 0 => Ok(i),
            _ => Err(io::Error::last_os_error()),
        }?;
        Ok(NlSocket { fd, pid: 0 })
    }

    /// Use this function to bind to the socket, subscribing to the
    /// multicast groups in the provided bitmask. The kernel assigns
    /// the port id; it is readable through [`NlSocket::pid`]
    /// afterwards.
    pub fn bind(&mut self, groups: u32) -> Result<(), io::Error> {
        let mut nladdr = unsafe { zeroed::<libc::sockaddr_nl>() };
        nladdr.nl_family = libc::AF_NETLINK as u16;
        nladdr.nl_pid = 0;
        nladdr.nl_groups = groups;
        match unsafe {
            libc::bind(
                self.fd,
                &nladdr as *const _ as *const libc::sockaddr,
                size_of::<libc::sockaddr_nl>() as u32,
            )
        } {
            i if i >= 0 => (),
            _ => return Err(io::Error::last_os_error()),
        };
        let mut bound = unsafe { zeroed::<libc::sockaddr_nl>() };
        let mut socklen = size_of::<libc::sockaddr_nl>() as libc::socklen_t;
        match unsafe {
            libc::getsockname(
                self.fd,
                &mut bound as *mut _ as *mut libc::sockaddr,
                &mut socklen,
            )
        } {
            i if i >= 0 => (),
            _ => return Err(io::Error::last_os_error()),
        };
        self.pid = bound.nl_pid;
        Ok(())
    }

    /// Equivalent of `socket` and `bind` calls.
    pub fn connect(groups: u32) -> Result<Self, io::Error> {
        let mut s = NlSocket::new()?;
        s.bind(groups)?;
        Ok(s)
    }

    /// Send message encoded as byte slice to the kernel
    pub fn send<B>(&self, buf: B, flags: i32) -> Result<libc::ssize_t, io::Error>
    where
        B: AsRef<[u8]>,
    {
        match unsafe {
            libc::send(
                self.fd,
                buf.as_ref() as *const _ as *const c_void,
                buf.as_ref().len(),
                flags,
            )
        } {
            i if i >= 0 => Ok(i),
            _ => Err(io::Error::last_os_error()),
        }
    }

    /// Receive message encoded as byte slice from the netlink socket
    pub fn recv<B>(&self, mut buf: B, flags: i32) -> Result<libc::ssize_t, io::Error>
    where
        B: AsMut<[u8]>,
    {
        match unsafe {
            libc::recv(
                self.fd,
                buf.as_mut() as *mut _ as *mut c_void,
                buf.as_mut().len(),
                flags,
            )
        } {
            i if i >= 0 => Ok(i),
            _ => Err(io::Error::last_os_error()),
        }
    }

    /// The netlink port id the kernel assigned to this socket at bind
    /// time
    pub fn pid(&self) -> u32 {
        self.pid
    }
}

impl AsRawFd for NlSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for NlSocket {
    /// Closes underlying file descriptor to avoid file descriptor
    /// leaks.
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}
