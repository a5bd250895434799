#![allow(dead_code)]
use alloc::vec::Vec;

use crate::config::PAGE_SIZE;

// Execution of programs
pub const AT_NULL: usize = 0; /* end of vector */
pub const AT_IGNORE: usize = 1; /* entry should be ignored */
pub const AT_EXECFD: usize = 2; /* file descriptor of program */
pub const AT_PHDR: usize = 3; /* program headers for program */
pub const AT_PHENT: usize = 4; /* size of program header entry */
pub const AT_PHNUM: usize = 5; /* number of program headers */
pub const AT_PAGESZ: usize = 6; /* system page size */
pub const AT_BASE: usize = 7; /* base address of interpreter */
pub const AT_FLAGS: usize = 8; /* flags */
pub const AT_ENTRY: usize = 9; /* entry point of program */
pub const AT_SECURE: usize = 23; /* secure mode boolean */
pub const AT_RANDOM: usize = 25; /* address of 16 random bytes */

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuxHeader {
    pub aux_type: usize,
    pub value: usize,
}

impl AuxHeader {
    /// The vector handed to the single user process, terminator included.
    pub fn generate(
        entry_point: usize,
        ph_count: usize,
        ph_entry_size: usize,
        phdr_addr: usize,
        random_ptr: usize,
    ) -> Vec<Self> {
        let mut auxv = Vec::new();

        macro_rules! push {
            ($x1: expr, $x2: expr) => {
                auxv.push(AuxHeader {
                    aux_type: $x1,
                    value: $x2,
                });
            };
        }
        push!(AT_ENTRY, entry_point);
        push!(AT_PHNUM, ph_count);
        push!(AT_PHENT, ph_entry_size);
        push!(AT_PHDR, phdr_addr);
        push!(AT_PAGESZ, PAGE_SIZE);
        push!(AT_SECURE, 0);
        push!(AT_RANDOM, random_ptr);
        push!(AT_NULL, 0);
        auxv
    }
    pub fn write_to(self, dst: &mut [usize; 2]) {
        *dst = [self.aux_type, self.value];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_ends_with_null_sentinel() {
        let auxv = AuxHeader::generate(0x1_0000, 3, 56, 0x2000, 0x3000);
        let last = auxv.last().unwrap();
        assert_eq!(last.aux_type, AT_NULL);
        assert_eq!(last.value, 0);
        assert_eq!(auxv.iter().filter(|a| a.aux_type == AT_NULL).count(), 1);
    }

    #[test]
    fn keys_carry_the_image_description() {
        let auxv = AuxHeader::generate(0x1_0000, 3, 56, 0x2000, 0x3000);
        let find = |ty| auxv.iter().find(|a| a.aux_type == ty).unwrap().value;
        assert_eq!(find(AT_ENTRY), 0x1_0000);
        assert_eq!(find(AT_PHNUM), 3);
        assert_eq!(find(AT_PHENT), 56);
        assert_eq!(find(AT_PHDR), 0x2000);
        assert_eq!(find(AT_PAGESZ), PAGE_SIZE);
        assert_eq!(find(AT_SECURE), 0);
        assert_eq!(find(AT_RANDOM), 0x3000);
    }
}
