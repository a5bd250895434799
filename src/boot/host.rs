//! Host frontend over the HTIF syscall proxy.
//!
//! A request is an eight-word packet handed to the host through `tohost`;
//! the host signals completion through `fromhost` and leaves the result in
//! the packet's first word. The supervisor runs identity-mapped, so kernel
//! virtual addresses double as the physical addresses the host expects.

use alloc::vec::Vec;
use core::cell::UnsafeCell;
use core::ptr;

use crate::loader::{ImageError, LoadImage};
use crate::sync::SpinNoIrqLock;

use super::{ArgBuf, BootError, HostInterface};

const SYS_OPENAT: u64 = 56;
const SYS_CLOSE: u64 = 57;
const SYS_PREAD: u64 = 67;
const SYS_GETMAINVARS: u64 = 2011;

const AT_FDCWD: u64 = -100i64 as u64;

#[repr(C, align(64))]
struct HtifReg(UnsafeCell<u64>);

unsafe impl Sync for HtifReg {}

// the host locates these two by symbol name
#[export_name = "tohost"]
static TOHOST: HtifReg = HtifReg(UnsafeCell::new(0));
#[export_name = "fromhost"]
static FROMHOST: HtifReg = HtifReg(UnsafeCell::new(0));

#[repr(C, align(64))]
struct Packet([u64; 8]);

static PACKET: SpinNoIrqLock<Packet> = SpinNoIrqLock::new(Packet([0; 8]));

/// Issue one proxied syscall and spin for the reply.
fn frontend_syscall(args: [u64; 8]) -> i64 {
    let mut packet = PACKET.lock();
    packet.0 = args;
    let pa = packet.0.as_ptr() as u64;
    unsafe {
        ptr::write_volatile(TOHOST.0.get(), pa);
        loop {
            let ack = ptr::read_volatile(FROMHOST.0.get());
            if ack != 0 {
                ptr::write_volatile(FROMHOST.0.get(), 0);
                break;
            }
        }
    }
    packet.0[0] as i64
}

/// Report an exit status to the host and stop. The low bit marks the word
/// as a final status rather than a request packet.
pub fn host_exit(code: u32) -> ! {
    unsafe { ptr::write_volatile(TOHOST.0.get(), ((code as u64) << 1) | 1) };
    crate::hart::park()
}

/// Command-line retrieval through the frontend.
pub struct FrontendHost;

impl HostInterface for FrontendHost {
    fn main_vars(&self, buf: &mut ArgBuf) -> Result<(), BootError> {
        let ret = frontend_syscall([
            SYS_GETMAINVARS,
            buf.base() as u64,
            buf.size_bytes() as u64,
            0,
            0,
            0,
            0,
            0,
        ]);
        // nonzero means the real argument list did not fit the buffer
        if ret != 0 {
            return Err(BootError::TooManyArgs);
        }
        Ok(())
    }
}

/// Whole-file reads through the frontend.
pub struct FrontendLoader;

const READ_CHUNK: usize = 4096;

impl LoadImage for FrontendLoader {
    fn load(&self, name: &str) -> Result<Vec<u8>, ImageError> {
        let mut path = Vec::with_capacity(name.len() + 1);
        path.extend_from_slice(name.as_bytes());
        path.push(0);
        let fd = frontend_syscall([
            SYS_OPENAT,
            AT_FDCWD,
            path.as_ptr() as u64,
            path.len() as u64,
            0, // O_RDONLY
            0,
            0,
            0,
        ]);
        if fd < 0 {
            return Err(ImageError::NotFound);
        }

        let mut image = Vec::new();
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let n = frontend_syscall([
                SYS_PREAD,
                fd as u64,
                chunk.as_mut_ptr() as u64,
                READ_CHUNK as u64,
                image.len() as u64,
                0,
                0,
                0,
            ]);
            if n < 0 {
                frontend_syscall([SYS_CLOSE, fd as u64, 0, 0, 0, 0, 0, 0]);
                return Err(ImageError::Malformed("host read failed"));
            }
            if n == 0 {
                break;
            }
            image.extend_from_slice(&chunk[..n as usize]);
        }
        frontend_syscall([SYS_CLOSE, fd as u64, 0, 0, 0, 0, 0, 0]);
        Ok(image)
    }
}
