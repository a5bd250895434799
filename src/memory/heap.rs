//! Supervisor heap, a static arena handed to a buddy allocator at boot.
//!
//! Only the riscv64 variant installs the global allocator; host builds run
//! on the standard library's own.

use buddy_system_allocator::LockedHeap;

#[cfg(target_arch = "riscv64")]
use crate::config::KERNEL_HEAP_SIZE;

#[cfg_attr(target_arch = "riscv64", global_allocator)]
#[allow(dead_code)]
static HEAP_ALLOCATOR: LockedHeap<32> = LockedHeap::empty();

#[cfg(target_arch = "riscv64")]
static mut HEAP_SPACE: [u8; KERNEL_HEAP_SIZE] = [0; KERNEL_HEAP_SIZE];

#[cfg(target_arch = "riscv64")]
pub fn init() {
    unsafe {
        HEAP_ALLOCATOR
            .lock()
            .init(HEAP_SPACE.as_ptr() as usize, KERNEL_HEAP_SIZE);
    }
    println!("[rvpk] heap: {} KB", KERNEL_HEAP_SIZE / 1024);
}
