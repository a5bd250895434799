#![allow(dead_code)]

pub const PAGE_SIZE: usize = 0x1000;
pub const PAGE_SIZE_BITS: usize = 12;

pub const KERNEL_HEAP_SIZE: usize = 0x20_0000; // 2MB
pub const KERNEL_STACK_SIZE: usize = PAGE_SIZE * 8;

/// ============================== USER ==============================
///
/// The single user process owns the low half of the Sv39 address space.
/// Its initial stack is built just below USER_STACK_TOP and grows down.
pub const USER_BASE: usize = 0x10000;
pub const USER_STACK_TOP: usize = 0x20_0000_0000;
pub const USER_STACK_SIZE: usize = PAGE_SIZE * 8;

/// ABI alignment of the user stack pointer at handoff.
pub const STACK_ALIGN: usize = 16;

/// Word capacity of the host argument buffer, argc included.
pub const MAX_ARGS: usize = 256;
