//! Fetch of the instruction a trap points at, RVC-aware.
//!
//! A wide (32-bit) encoding marks itself with `11` in the low two bits of
//! the first halfword; anything else is a compressed 16-bit encoding. The pc
//! may be halfword-misaligned relative to the 32-bit width, so the fetch is
//! one or two independent accessor calls, never a single straddling read.

use crate::umem;

/// Low-two-bit pattern of a wide encoding.
const WIDE_MARK: u32 = 0b11;

/// Returns the instruction at `fault_pc` (zero-extended if compressed) and
/// the status-register snapshot captured during the accessor sequence.
pub fn fetch_instruction(fault_pc: usize) -> (u32, usize) {
    if fault_pc & 2 == 0 {
        let (word, status) = unsafe { umem::load_exec_u32(fault_pc, fault_pc) };
        if word & WIDE_MARK == WIDE_MARK {
            (word, status)
        } else {
            (word & 0xffff, status)
        }
    } else {
        let (lo, status) = unsafe { umem::load_exec_u16(fault_pc, fault_pc) };
        if lo & WIDE_MARK == WIDE_MARK {
            // the second half gets its own accessor call, so a wide
            // instruction straddling a page boundary still fetches
            let (hi, status) = unsafe { umem::load_exec_u16(fault_pc + 2, fault_pc) };
            (lo | hi << 16, status)
        } else {
            (lo, status)
        }
    }
}

/// Width in bytes of a fetched instruction, for pc stepping.
pub fn instruction_len(insn: u32) -> usize {
    if insn & WIDE_MARK == WIDE_MARK {
        4
    } else {
        2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PAGE_SIZE;
    use crate::umem::{self, sim};

    const BASE: usize = 0x5000_0000;

    // c.addi a0, 1: a compressed encoding (low bits 01)
    const C_ADDI: u16 = 0x0505;
    // addi a0, a0, 1: the wide encoding of the same operation
    const ADDI: u32 = 0x0015_0513;

    fn place_bytes(addr: usize, bytes: &[u8]) {
        for (i, b) in bytes.iter().enumerate() {
            unsafe { umem::store::<u8>(addr + i, *b, 0) };
        }
    }

    #[test]
    fn short_encoding_at_every_alignment() {
        let _g = sim::serialize();
        sim::reset();
        sim::map_page(BASE);
        for offset in [0usize, 2, 4, 6, 8, 10] {
            let pc = BASE + 0x100 + offset;
            place_bytes(pc, &C_ADDI.to_le_bytes());
            let (insn, _) = fetch_instruction(pc);
            assert_eq!(insn, C_ADDI as u32, "offset {}", offset);
            assert_eq!(instruction_len(insn), 2);
        }
    }

    #[test]
    fn wide_encoding_at_every_alignment() {
        let _g = sim::serialize();
        sim::reset();
        sim::map_page(BASE);
        for offset in [0usize, 2, 4, 6] {
            let pc = BASE + 0x200 + offset;
            place_bytes(pc, &ADDI.to_le_bytes());
            let (insn, _) = fetch_instruction(pc);
            assert_eq!(insn, ADDI, "offset {}", offset);
            assert_eq!(instruction_len(insn), 4);
        }
    }

    #[test]
    fn wide_encoding_straddling_page_boundary() {
        let _g = sim::serialize();
        sim::reset();
        sim::map_page(BASE);
        sim::map_page(BASE + PAGE_SIZE);
        let pc = BASE + PAGE_SIZE - 2;
        place_bytes(pc, &ADDI.to_le_bytes());
        let (insn, _) = fetch_instruction(pc);
        assert_eq!(insn, ADDI);
    }

    #[test]
    fn short_encoding_in_last_halfword_of_page() {
        let _g = sim::serialize();
        sim::reset();
        sim::map_page(BASE);
        sim::map_page(BASE + PAGE_SIZE);
        let pc = BASE + PAGE_SIZE - 2;
        place_bytes(pc, &C_ADDI.to_le_bytes());
        let (insn, _) = fetch_instruction(pc);
        assert_eq!(insn, C_ADDI as u32);
    }

    #[test]
    fn status_snapshot_passes_through() {
        let _g = sim::serialize();
        sim::reset();
        sim::map_page(BASE);
        sim::set_status(crate::hart::csr::STATUS_SPP);
        place_bytes(BASE, &ADDI.to_le_bytes());
        let (_, status) = fetch_instruction(BASE);
        assert_eq!(status, crate::hart::csr::STATUS_SPP);
        assert_eq!(sim::status(), crate::hart::csr::STATUS_SPP);
    }
}
