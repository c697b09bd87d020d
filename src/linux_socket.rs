//! Raw `AF_PACKET` link-layer transport (SPEC_FULL.md §4.10) — the raw
//! socket acquisition spec.md §1 names as an external collaborator,
//! implemented here only so the two binaries run end-to-end.
//!
//! Grounded on `original_source/client/src/socket.c`'s `socket_create`
//! (promiscuous bind of an `AF_PACKET`/`SOCK_RAW` socket to one
//! interface) translated to direct `libc` syscalls, in the spirit of
//! `jfabienke-mbuscrate`'s low-level `libc`-based GPIO/PIO bindings.

#![cfg(target_os = "linux")]

use std::ffi::CString;
use std::io;
use std::mem;
use std::os::unix::io::RawFd;
use std::time::{Duration, Instant};

use crate::error::TransportError;
use crate::frame::{Frame, FRAME_LEN};
use crate::transport::FrameTransport;

const ETH_P_ALL: u16 = 0x0003;
/// Oversized relative to the 68-byte envelope to absorb whatever Ethernet
/// padding or header bytes the kernel hands back with a raw `AF_PACKET`
/// read; only the first `FRAME_LEN` bytes are ever inspected.
const RECV_BUF_LEN: usize = 2048;

/// One promiscuous-mode `AF_PACKET` socket bound to a single interface.
pub struct RawSocketTransport {
    fd: RawFd,
}

impl RawSocketTransport {
    /// Binds a raw socket to `interface` in promiscuous mode, mirroring
    /// `socket_create`: create `AF_PACKET`/`SOCK_RAW`, bind to the
    /// interface index, then join `PACKET_MR_PROMISC`.
    pub fn bind(interface: &str) -> io::Result<Self> {
        let ifname =
            CString::new(interface).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        unsafe {
            let ifindex = libc::if_nametoindex(ifname.as_ptr());
            if ifindex == 0 {
                return Err(io::Error::last_os_error());
            }

            let fd = libc::socket(libc::AF_PACKET, libc::SOCK_RAW, i32::from(ETH_P_ALL.to_be()));
            if fd < 0 {
                return Err(io::Error::last_os_error());
            }

            let mut addr: libc::sockaddr_ll = mem::zeroed();
            addr.sll_family = libc::AF_PACKET as u16;
            addr.sll_protocol = ETH_P_ALL.to_be();
            addr.sll_ifindex = ifindex as i32;
            let addr_ptr = std::ptr::addr_of!(addr).cast::<libc::sockaddr>();
            if libc::bind(fd, addr_ptr, mem::size_of::<libc::sockaddr_ll>() as u32) < 0 {
                let err = io::Error::last_os_error();
                libc::close(fd);
                return Err(err);
            }

            let mut mreq: libc::packet_mreq = mem::zeroed();
            mreq.mr_ifindex = ifindex as i32;
            mreq.mr_type = libc::PACKET_MR_PROMISC as u16;
            let mreq_ptr = std::ptr::addr_of!(mreq).cast::<libc::c_void>();
            if libc::setsockopt(
                fd,
                libc::SOL_PACKET,
                libc::PACKET_ADD_MEMBERSHIP,
                mreq_ptr,
                mem::size_of::<libc::packet_mreq>() as u32,
            ) < 0
            {
                let err = io::Error::last_os_error();
                libc::close(fd);
                return Err(err);
            }

            Ok(RawSocketTransport { fd })
        }
    }

    /// Sets `SO_RCVTIMEO`; a zero `timeval` disables the timeout so
    /// `recv()` blocks indefinitely, matching `timeout_ms = 0` in
    /// spec.md §4.3.
    fn set_recv_timeout(&self, timeout: Duration) -> io::Result<()> {
        let tv = libc::timeval {
            tv_sec: timeout.as_secs() as libc::time_t,
            tv_usec: libc::suseconds_t::from(timeout.subsec_micros()),
        };
        let ret = unsafe {
            libc::setsockopt(
                self.fd,
                libc::SOL_SOCKET,
                libc::SO_RCVTIMEO,
                std::ptr::addr_of!(tv).cast::<libc::c_void>(),
                mem::size_of::<libc::timeval>() as u32,
            )
        };
        if ret < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }
}

impl Drop for RawSocketTransport {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

impl FrameTransport for RawSocketTransport {
    fn send(&mut self, frame: &Frame) -> Result<(), TransportError> {
        let bytes = frame.as_bytes();
        let ret = unsafe {
            libc::send(self.fd, bytes.as_ptr().cast::<libc::c_void>(), bytes.len(), 0)
        };
        if ret < 0 {
            return Err(TransportError::Io(io::Error::last_os_error()));
        }
        Ok(())
    }

    fn recv(&mut self, timeout: Duration) -> Result<Option<Frame>, TransportError> {
        self.set_recv_timeout(timeout).map_err(TransportError::Io)?;
        let deadline = if timeout.is_zero() { None } else { Some(Instant::now() + timeout) };
        loop {
            let mut buf = [0u8; RECV_BUF_LEN];
            let ret = unsafe {
                libc::recv(self.fd, buf.as_mut_ptr().cast::<libc::c_void>(), buf.len(), 0)
            };
            if ret < 0 {
                let err = io::Error::last_os_error();
                if matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) {
                    return Ok(None);
                }
                return Err(TransportError::Io(err));
            }
            let n = ret as usize;
            if n >= FRAME_LEN {
                let mut raw = [0u8; FRAME_LEN];
                raw.copy_from_slice(&buf[..FRAME_LEN]);
                if let Some(frame) = Frame::decode_if_valid(&raw) {
                    return Ok(Some(frame));
                }
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Ok(None);
                }
            }
        }
    }
}
