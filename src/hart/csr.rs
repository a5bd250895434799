#![allow(dead_code)]

use bit_field::BitField;

// riscv-privileged: sstatus layout
pub const STATUS_SIE: usize = 1 << 1;
pub const STATUS_SPIE: usize = 1 << 5;
pub const STATUS_SPP: usize = 1 << 8;
pub const STATUS_VS: usize = 3 << 9;
pub const STATUS_FS: usize = 3 << 13;
pub const STATUS_SUM: usize = 1 << 18;
pub const STATUS_MXR: usize = 1 << 19;

/// Status bits installed for the window of one user-rights data access.
pub const ACCESS_OVERRIDE: usize = STATUS_SUM;
/// Same window, but execute-view: instruction fetch from an X-only page.
pub const FETCH_OVERRIDE: usize = STATUS_SUM | STATUS_MXR;

const SATP_MODE_SV39: usize = 8;

/// Pack a root-table ppn into a Sv39 satp image. Pure, no CSR touched.
pub fn satp_sv39(root_ppn: usize) -> usize {
    debug_assert!(root_ppn < (1 << 44));
    let mut satp = 0usize;
    satp.set_bits(60..64, SATP_MODE_SV39);
    satp.set_bits(0..44, root_ppn);
    satp
}

pub fn satp_root_ppn(satp: usize) -> usize {
    satp.get_bits(0..44)
}

#[cfg(target_arch = "riscv64")]
mod imp {
    use core::arch::asm;

    pub fn read_status() -> usize {
        let ret: usize;
        unsafe { asm!("csrr {}, sstatus", out(reg) ret) };
        ret
    }
    pub unsafe fn set_status_bits(mask: usize) {
        asm!("csrs sstatus, {}", in(reg) mask);
    }
    pub unsafe fn clear_status_bits(mask: usize) {
        asm!("csrc sstatus, {}", in(reg) mask);
    }
    pub unsafe fn set_satp(satp: usize) {
        asm!("csrw satp, {}", in(reg) satp);
    }
    pub fn get_satp() -> usize {
        let ret: usize;
        unsafe { asm!("csrr {}, satp", out(reg) ret) };
        ret
    }
    pub unsafe fn write_sscratch(v: usize) {
        asm!("csrw sscratch, {}", in(reg) v);
    }
    pub unsafe fn write_sie(v: usize) {
        asm!("csrw sie, {}", in(reg) v);
    }
    pub fn get_sp() -> usize {
        let ret: usize;
        unsafe { asm!("mv {}, sp", out(reg) ret) };
        ret
    }
}

/// Simulated-hart variant: the control/status register lives in [`crate::umem::sim`].
#[cfg(not(target_arch = "riscv64"))]
mod imp {
    use crate::umem::sim;

    pub fn read_status() -> usize {
        sim::status()
    }
    pub unsafe fn set_status_bits(mask: usize) {
        sim::set_status(sim::status() | mask);
    }
    pub unsafe fn clear_status_bits(mask: usize) {
        sim::set_status(sim::status() & !mask);
    }
    pub unsafe fn set_satp(satp: usize) {
        sim::set_satp(satp);
    }
    pub fn get_satp() -> usize {
        sim::satp()
    }
    pub unsafe fn write_sscratch(v: usize) {
        sim::set_sscratch(v);
    }
    pub unsafe fn write_sie(_v: usize) {}
    pub fn get_sp() -> usize {
        0
    }
}

pub use imp::{
    clear_status_bits, get_satp, get_sp, read_status, set_satp, set_status_bits, write_sie,
    write_sscratch,
};
