#![allow(dead_code)]

#[cfg(target_arch = "riscv64")]
mod imp {
    use core::arch::asm;

    #[inline(always)]
    pub fn fence_i() {
        unsafe { asm!("fence.i") };
    }

    /// sfence_vma has two parameters, rs1 is address, rs2 is asid.
    /// rs1 = rs2 = x0 invalidates every cached translation.
    #[inline(always)]
    pub fn sfence_vma_all_global() {
        unsafe { asm!("sfence.vma x0, x0") };
    }
}

#[cfg(not(target_arch = "riscv64"))]
mod imp {
    use crate::umem::sim;

    #[inline(always)]
    pub fn fence_i() {
        sim::note_fence_i();
    }

    #[inline(always)]
    pub fn sfence_vma_all_global() {
        sim::note_sfence_vma();
    }
}

pub use imp::{fence_i, sfence_vma_all_global};
