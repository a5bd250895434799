//! Sv39 table-entry construction and translation-cache control.
//!
//! Entry encoding is pure: nothing here installs an entry anywhere, the
//! launcher's address-space setup consumes the packed values. The root of
//! the active address space is written exactly once per boot.

use core::sync::atomic::{AtomicUsize, Ordering};

use bit_field::BitField;
use bitflags::bitflags;

use crate::hart::{csr, sfence};

bitflags! {
    // riscv-privileged 4.3.1
    pub struct PTEFlags: u8 {
        const V = 1 << 0; // valid
        const R = 1 << 1; // readable
        const W = 1 << 2; // writable
        const X = 1 << 3; // executable
        const U = 1 << 4; // user mode
        const G = 1 << 5; // global mapping
        const A = 1 << 6; // accessed
        const D = 1 << 7; // dirty
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
#[repr(C)]
pub struct PageTableEntry {
    bits: usize,
}

impl PageTableEntry {
    /// Pack a leaf entry: frame number plus protection bits, valid forced on.
    ///
    /// Total for any in-range ppn; an out-of-range ppn is a caller contract
    /// violation.
    pub fn leaf(ppn: usize, flags: PTEFlags) -> Self {
        debug_assert!(ppn < (1 << 44));
        PageTableEntry {
            bits: ppn << 10 | (flags | PTEFlags::V).bits() as usize,
        }
    }
    /// Pack a next-level table descriptor: valid bit only, no leaf permissions.
    pub fn table(ppn: usize) -> Self {
        Self::leaf(ppn, PTEFlags::empty())
    }
    pub const fn empty() -> Self {
        PageTableEntry { bits: 0 }
    }
    pub fn bits(&self) -> usize {
        self.bits
    }
    pub fn ppn(&self) -> usize {
        self.bits.get_bits(10..54)
    }
    pub fn flags(&self) -> PTEFlags {
        PTEFlags::from_bits_truncate(self.bits as u8)
    }
    pub fn is_valid(&self) -> bool {
        self.flags().contains(PTEFlags::V)
    }
    pub fn is_directory(&self) -> bool {
        self.is_valid()
            && (self.flags() & (PTEFlags::R | PTEFlags::W | PTEFlags::X)) == PTEFlags::empty()
    }
    pub fn is_leaf(&self) -> bool {
        self.is_valid()
            && (self.flags() & (PTEFlags::R | PTEFlags::W | PTEFlags::X)) != PTEFlags::empty()
    }
    pub fn readable(&self) -> bool {
        self.flags().contains(PTEFlags::R)
    }
    pub fn writable(&self) -> bool {
        self.flags().contains(PTEFlags::W)
    }
    pub fn executable(&self) -> bool {
        self.flags().contains(PTEFlags::X)
    }
    pub fn is_user(&self) -> bool {
        self.flags().contains(PTEFlags::U)
    }
}

impl core::fmt::Debug for PageTableEntry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("PTE:{:#x}", self.bits))
    }
}

/// satp image of the active address space, zero until installed.
static ROOT_SATP: AtomicUsize = AtomicUsize::new(0);

/// Install the address-translation root. Called exactly once per boot; a
/// second install is an irrecoverable logic error.
pub unsafe fn install_root(root_ppn: usize) {
    let satp = csr::satp_sv39(root_ppn);
    if ROOT_SATP
        .compare_exchange(0, satp, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        panic!("translation root installed twice");
    }
    csr::set_satp(satp);
    flush_tlb();
}

pub fn root_satp() -> usize {
    ROOT_SATP.load(Ordering::SeqCst)
}

/// Invalidate every cached translation for the current address space.
/// Coarse-grained on purpose; this core never needs selective shootdown.
pub fn flush_tlb() {
    sfence::sfence_vma_all_global();
}

#[cfg(test)]
pub(crate) fn reset_root_for_test() {
    ROOT_SATP.store(0, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::umem::sim;

    #[test]
    fn leaf_packs_ppn_and_forces_valid() {
        let pte = PageTableEntry::leaf(0x8_0000, PTEFlags::R | PTEFlags::W | PTEFlags::U);
        assert_eq!(pte.ppn(), 0x8_0000);
        assert!(pte.is_valid());
        assert!(pte.is_leaf());
        assert!(!pte.is_directory());
        assert!(pte.readable() && pte.writable() && pte.is_user());
        assert!(!pte.executable());
        assert_eq!(pte.bits(), 0x8_0000 << 10 | 0b1_0111);
    }

    #[test]
    fn table_descriptor_is_directory() {
        let ptd = PageTableEntry::table(0x123);
        assert_eq!(ptd.ppn(), 0x123);
        assert!(ptd.is_valid());
        assert!(ptd.is_directory());
        assert!(!ptd.is_leaf());
        assert_eq!(ptd.bits(), 0x123 << 10 | 1);
    }

    #[test]
    fn empty_is_invalid() {
        assert!(!PageTableEntry::empty().is_valid());
    }

    #[test]
    fn max_ppn_round_trips() {
        let ppn = (1 << 44) - 1;
        assert_eq!(PageTableEntry::leaf(ppn, PTEFlags::X).ppn(), ppn);
    }

    #[test]
    fn install_root_writes_satp_and_flushes() {
        let _g = sim::serialize();
        sim::reset();
        reset_root_for_test();
        let flushes = sim::sfence_vma_count();
        unsafe { install_root(0x8_1234) };
        assert_ne!(root_satp(), 0);
        assert_eq!(crate::hart::csr::satp_root_ppn(root_satp()), 0x8_1234);
        assert_eq!(sim::satp(), root_satp());
        assert_eq!(sim::sfence_vma_count(), flushes + 1);
    }
}
