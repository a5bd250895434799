//! Memory subsystem: heap, table-entry construction, auxiliary vector.

pub mod auxv;
pub mod heap;
pub mod page_table;

use crate::config::{PAGE_SIZE_BITS, USER_BASE, USER_STACK_TOP};
use page_table::{PTEFlags, PageTableEntry};

const GIGA_PAGE_BITS: usize = 30;

/// Physical memory window the supervisor itself lives in.
const PHYS_MEMORY_START: usize = 0x8000_0000;
const PHYS_MEMORY_END: usize = 0x1_0000_0000;

/// RAM gigapage backing both user windows. The supervisor keeps the one
/// below it for its own image and heap; image offsets sit at the bottom of
/// this gigapage and the initial stack at its top, so they cannot collide.
const USER_PHYS_GIGA: usize = 0xC000_0000;

/// Populate the boot-time root table: identity gigapage leaves for the
/// supervisor's physical window, and user-flagged leaves backing the
/// gigapages that hold the user image base and the initial stack with RAM
/// frames. Everything else stays invalid.
pub fn fill_boot_entries(table: &mut [PageTableEntry; 512]) {
    let user = PTEFlags::U | rwxad();
    let kernel = PTEFlags::G | rwxad();
    for (i, entry) in table.iter_mut().enumerate() {
        let va = i << GIGA_PAGE_BITS;
        *entry = if is_user_giga(i) {
            PageTableEntry::leaf(USER_PHYS_GIGA >> PAGE_SIZE_BITS, user)
        } else if (PHYS_MEMORY_START..PHYS_MEMORY_END).contains(&va) {
            PageTableEntry::leaf(va >> PAGE_SIZE_BITS, kernel)
        } else {
            PageTableEntry::empty()
        };
    }
}

fn rwxad() -> PTEFlags {
    PTEFlags::R | PTEFlags::W | PTEFlags::X | PTEFlags::A | PTEFlags::D
}

fn is_user_giga(index: usize) -> bool {
    index == USER_BASE >> GIGA_PAGE_BITS || index == (USER_STACK_TOP - 1) >> GIGA_PAGE_BITS
}

#[cfg(target_arch = "riscv64")]
#[repr(C, align(4096))]
struct BootTable([PageTableEntry; 512]);

#[cfg(target_arch = "riscv64")]
static mut BOOT_TABLE: BootTable = BootTable([PageTableEntry::empty(); 512]);

/// Bring up the heap and install the boot address space. First hart only.
#[cfg(target_arch = "riscv64")]
pub fn init() {
    heap::init();
    unsafe {
        fill_boot_entries(&mut BOOT_TABLE.0);
        let root_ppn = BOOT_TABLE.0.as_ptr() as usize >> PAGE_SIZE_BITS;
        page_table::install_root(root_ppn);
    }
    println!("[rvpk] boot address space installed");
}
