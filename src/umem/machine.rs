//! Register-pinned accessor intrinsics for real riscv64 hardware.
//!
//! The window is three instructions: install the override with `csrrs`, do
//! the one access, restore with `csrw`. Register pinning is part of the trap
//! contract: a1 holds the override mask, a2 the faulting pc, a3 the saved
//! status image. If the guarded access itself traps, the dispatcher restores
//! the status register from a3 and reports the fault against a2; the `csrw`
//! is also the resumption point, so both exits restore.

#![allow(dead_code)]

use core::arch::asm;

use crate::hart::csr;

macro_rules! unprivileged_load {
    ($fn:ident, $ty:ty, $insn:literal) => {
        #[inline(always)]
        pub unsafe fn $fn(addr: usize, fault_pc: usize) -> $ty {
            let val: usize;
            asm!(
                "csrrs a3, sstatus, a1",
                concat!($insn, " {val}, 0({addr})"),
                "csrw sstatus, a3",
                val = lateout(reg) val,
                addr = in(reg) addr,
                in("a1") csr::ACCESS_OVERRIDE,
                in("a2") fault_pc,
                lateout("a3") _,
            );
            val as $ty
        }
    };
}

macro_rules! unprivileged_store {
    ($fn:ident, $ty:ty, $insn:literal) => {
        #[inline(always)]
        pub unsafe fn $fn(addr: usize, val: $ty, fault_pc: usize) {
            asm!(
                "csrrs a3, sstatus, a1",
                concat!($insn, " {val}, 0({addr})"),
                "csrw sstatus, a3",
                val = in(reg) val as usize,
                addr = in(reg) addr,
                in("a1") csr::ACCESS_OVERRIDE,
                in("a2") fault_pc,
                lateout("a3") _,
            );
        }
    };
}

unprivileged_load!(load_u8, u8, "lbu");
unprivileged_load!(load_u16, u16, "lhu");
unprivileged_load!(load_u32, u32, "lwu");
unprivileged_load!(load_u64, u64, "ld");
unprivileged_store!(store_u8, u8, "sb");
unprivileged_store!(store_u16, u16, "sh");
unprivileged_store!(store_u32, u32, "sw");
unprivileged_store!(store_u64, u64, "sd");

macro_rules! exec_load {
    ($fn:ident, $insn:literal) => {
        #[inline(always)]
        pub unsafe fn $fn(addr: usize, fault_pc: usize) -> (u32, usize) {
            let val: usize;
            let saved: usize;
            asm!(
                "csrrs a3, sstatus, a1",
                concat!($insn, " {val}, 0({addr})"),
                "csrw sstatus, a3",
                val = lateout(reg) val,
                addr = in(reg) addr,
                in("a1") csr::FETCH_OVERRIDE,
                in("a2") fault_pc,
                lateout("a3") saved,
            );
            (val as u32, saved)
        }
    };
}

exec_load!(load_exec_u16, "lhu");
exec_load!(load_exec_u32, "lwu");
