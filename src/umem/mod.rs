//! Typed memory access with the user privilege's rights and translation view.
//!
//! Every access opens a scoped status-register override (the SUM window on
//! hardware), performs exactly one memory operation, and restores the
//! register to its pre-call value on all paths. A faulting access never returns an error value here:
//! it re-enters the trap dispatch path with the supervisor's own state
//! already consistent, and that path does not resume the interrupted
//! operation.

#[cfg(target_arch = "riscv64")]
mod machine;
#[cfg(not(target_arch = "riscv64"))]
pub mod sim;

#[cfg(not(target_arch = "riscv64"))]
use crate::hart::csr;

/// A primitive integer the accessor can move across the privilege boundary.
pub trait UserPrimitive: Copy + 'static {
    unsafe fn user_load(addr: usize, fault_pc: usize) -> Self;
    unsafe fn user_store(addr: usize, val: Self, fault_pc: usize);
}

/// Read one `T` at `addr` as the user program would.
///
/// `fault_pc` is the program-counter value the access is performed on behalf
/// of; a fault is reported against it. Safety: `addr` is an untrusted user
/// address, the caller must be prepared for the access to trap out.
#[inline(always)]
pub unsafe fn load<T: UserPrimitive>(addr: usize, fault_pc: usize) -> T {
    T::user_load(addr, fault_pc)
}

/// Write one `T` at `addr` as the user program would. See [`load`].
#[inline(always)]
pub unsafe fn store<T: UserPrimitive>(addr: usize, val: T, fault_pc: usize) {
    T::user_store(addr, val, fault_pc)
}

#[cfg(target_arch = "riscv64")]
macro_rules! unsigned_impl {
    ($ty:ty, $load:ident, $store:ident) => {
        impl UserPrimitive for $ty {
            #[inline(always)]
            unsafe fn user_load(addr: usize, fault_pc: usize) -> Self {
                machine::$load(addr, fault_pc)
            }
            #[inline(always)]
            unsafe fn user_store(addr: usize, val: Self, fault_pc: usize) {
                machine::$store(addr, val, fault_pc)
            }
        }
    };
}

#[cfg(target_arch = "riscv64")]
unsigned_impl!(u8, load_u8, store_u8);
#[cfg(target_arch = "riscv64")]
unsigned_impl!(u16, load_u16, store_u16);
#[cfg(target_arch = "riscv64")]
unsigned_impl!(u32, load_u32, store_u32);
#[cfg(target_arch = "riscv64")]
unsigned_impl!(u64, load_u64, store_u64);

#[cfg(not(target_arch = "riscv64"))]
macro_rules! unsigned_impl {
    ($ty:ty) => {
        impl UserPrimitive for $ty {
            unsafe fn user_load(addr: usize, fault_pc: usize) -> Self {
                let mut buf = [0u8; core::mem::size_of::<$ty>()];
                sim::read(addr, &mut buf, csr::ACCESS_OVERRIDE, fault_pc);
                Self::from_le_bytes(buf)
            }
            unsafe fn user_store(addr: usize, val: Self, fault_pc: usize) {
                sim::write(addr, &val.to_le_bytes(), csr::ACCESS_OVERRIDE, fault_pc);
            }
        }
    };
}

#[cfg(not(target_arch = "riscv64"))]
unsigned_impl!(u8);
#[cfg(not(target_arch = "riscv64"))]
unsigned_impl!(u16);
#[cfg(not(target_arch = "riscv64"))]
unsigned_impl!(u32);
#[cfg(not(target_arch = "riscv64"))]
unsigned_impl!(u64);

macro_rules! signed_impl {
    ($ty:ty, $un:ty) => {
        impl UserPrimitive for $ty {
            #[inline(always)]
            unsafe fn user_load(addr: usize, fault_pc: usize) -> Self {
                <$un>::user_load(addr, fault_pc) as $ty
            }
            #[inline(always)]
            unsafe fn user_store(addr: usize, val: Self, fault_pc: usize) {
                <$un>::user_store(addr, val as $un, fault_pc)
            }
        }
    };
}

signed_impl!(i8, u8);
signed_impl!(i16, u16);
signed_impl!(i32, u32);
signed_impl!(i64, u64);

impl UserPrimitive for usize {
    #[inline(always)]
    unsafe fn user_load(addr: usize, fault_pc: usize) -> Self {
        #[cfg(target_pointer_width = "64")]
        {
            u64::user_load(addr, fault_pc) as usize
        }
        #[cfg(target_pointer_width = "32")]
        {
            load_u64_split(addr, fault_pc) as usize
        }
    }
    #[inline(always)]
    unsafe fn user_store(addr: usize, val: Self, fault_pc: usize) {
        #[cfg(target_pointer_width = "64")]
        u64::user_store(addr, val as u64, fault_pc);
        #[cfg(target_pointer_width = "32")]
        store_u64_split(addr, val as u64, fault_pc);
    }
}

/// Composite 64-bit load for 32-bit-native platforms: two 32-bit accesses,
/// each satisfying the restoration guarantee on its own.
pub unsafe fn load_u64_split(addr: usize, fault_pc: usize) -> u64 {
    let lo = u32::user_load(addr, fault_pc) as u64;
    let hi = u32::user_load(addr + 4, fault_pc) as u64;
    lo | hi << 32
}

/// Composite counterpart of [`load_u64_split`].
pub unsafe fn store_u64_split(addr: usize, val: u64, fault_pc: usize) {
    u32::user_store(addr, val as u32, fault_pc);
    u32::user_store(addr + 4, (val >> 32) as u32, fault_pc);
}

/// Execute-view halfword read for the instruction fetcher. Returns the value
/// and the status-register image from before the override was installed.
#[inline(always)]
pub unsafe fn load_exec_u16(addr: usize, fault_pc: usize) -> (u32, usize) {
    #[cfg(target_arch = "riscv64")]
    {
        machine::load_exec_u16(addr, fault_pc)
    }
    #[cfg(not(target_arch = "riscv64"))]
    {
        let mut buf = [0u8; 2];
        let status = sim::read(addr, &mut buf, csr::FETCH_OVERRIDE, fault_pc);
        (u16::from_le_bytes(buf) as u32, status)
    }
}

/// Execute-view word read, see [`load_exec_u16`].
#[inline(always)]
pub unsafe fn load_exec_u32(addr: usize, fault_pc: usize) -> (u32, usize) {
    #[cfg(target_arch = "riscv64")]
    {
        machine::load_exec_u32(addr, fault_pc)
    }
    #[cfg(not(target_arch = "riscv64"))]
    {
        let mut buf = [0u8; 4];
        let status = sim::read(addr, &mut buf, csr::FETCH_OVERRIDE, fault_pc);
        (u32::from_le_bytes(buf), status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PAGE_SIZE;
    use crate::hart::csr;

    const BASE: usize = 0x4000_0000;

    fn setup() -> sim::SerialGuard {
        let g = sim::serialize();
        sim::reset();
        sim::map_page(BASE);
        sim::map_page(BASE + PAGE_SIZE);
        g
    }

    #[test]
    fn round_trip_all_widths() {
        let _g = setup();
        unsafe {
            for (i, v) in [0u8, 1, 0x7f, 0xff].into_iter().enumerate() {
                store::<u8>(BASE + i, v, 0);
                assert_eq!(load::<u8>(BASE + i, 0), v);
            }
            store::<u16>(BASE + 0x10, 0xbeef, 0);
            assert_eq!(load::<u16>(BASE + 0x10, 0), 0xbeef);
            store::<u32>(BASE + 0x20, 0xdead_beef, 0);
            assert_eq!(load::<u32>(BASE + 0x20, 0), 0xdead_beef);
            store::<u64>(BASE + 0x30, 0x0123_4567_89ab_cdef, 0);
            assert_eq!(load::<u64>(BASE + 0x30, 0), 0x0123_4567_89ab_cdef);
            store::<i8>(BASE + 0x40, -5, 0);
            assert_eq!(load::<i8>(BASE + 0x40, 0), -5);
            store::<i16>(BASE + 0x42, -600, 0);
            assert_eq!(load::<i16>(BASE + 0x42, 0), -600);
            store::<i32>(BASE + 0x44, -70_000, 0);
            assert_eq!(load::<i32>(BASE + 0x44, 0), -70_000);
            store::<i64>(BASE + 0x48, -5_000_000_000, 0);
            assert_eq!(load::<i64>(BASE + 0x48, 0), -5_000_000_000);
            store::<usize>(BASE + 0x50, usize::MAX - 1, 0);
            assert_eq!(load::<usize>(BASE + 0x50, 0), usize::MAX - 1);
        }
    }

    #[test]
    fn split_u64_matches_direct() {
        let _g = setup();
        unsafe {
            store_u64_split(BASE + 0x60, 0x1122_3344_5566_7788, 0);
            assert_eq!(load::<u64>(BASE + 0x60, 0), 0x1122_3344_5566_7788);
            assert_eq!(load_u64_split(BASE + 0x60, 0), 0x1122_3344_5566_7788);
            // halves land little-endian, low word first
            assert_eq!(load::<u32>(BASE + 0x60, 0), 0x5566_7788);
            assert_eq!(load::<u32>(BASE + 0x64, 0), 0x1122_3344);
        }
    }

    #[test]
    fn status_restored_after_plain_access() {
        let _g = setup();
        sim::set_status(csr::STATUS_FS);
        unsafe { store::<u32>(BASE, 7, 0) };
        assert_eq!(sim::status(), csr::STATUS_FS);
        unsafe { load::<u32>(BASE, 0) };
        assert_eq!(sim::status(), csr::STATUS_FS);
    }

    #[test]
    fn status_restored_after_fault() {
        let _g = setup();
        sim::set_status(csr::STATUS_SPIE);
        let unmapped = BASE + 0x10 * PAGE_SIZE;
        let r = std::panic::catch_unwind(|| unsafe { load::<u32>(unmapped, 0x1234) });
        assert!(r.is_err());
        // the handler saw the pre-call status, not the elevated window
        assert_eq!(sim::status(), csr::STATUS_SPIE);
        let fault = sim::last_fault().expect("fault recorded");
        assert_eq!(fault.addr, unmapped);
        assert_eq!(fault.fault_pc, 0x1234);
        assert!(!fault.write);
    }

    #[test]
    fn store_fault_also_restores() {
        let _g = setup();
        sim::set_status(0);
        let unmapped = BASE + 0x11 * PAGE_SIZE;
        let r = std::panic::catch_unwind(|| unsafe { store::<u8>(unmapped, 1, 0x88) });
        assert!(r.is_err());
        assert_eq!(sim::status(), 0);
        assert!(sim::last_fault().unwrap().write);
    }

    #[test]
    fn exec_load_reports_pre_override_status() {
        let _g = setup();
        sim::set_status(csr::STATUS_SPP);
        unsafe { store::<u32>(BASE, 0xabcd_ef01, 0) };
        let (v, status) = unsafe { load_exec_u32(BASE, 0) };
        assert_eq!(v, 0xabcd_ef01);
        assert_eq!(status, csr::STATUS_SPP);
        assert_eq!(sim::status(), csr::STATUS_SPP);
    }

    #[test]
    fn access_crossing_page_boundary() {
        let _g = setup();
        let addr = BASE + PAGE_SIZE - 2;
        unsafe {
            store::<u32>(addr, 0x5a5a_a5a5, 0);
            assert_eq!(load::<u32>(addr, 0), 0x5a5a_a5a5);
        }
    }
}
