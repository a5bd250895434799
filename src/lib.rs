//! Privileged core of a minimal single-process supervisor for RISC-V.
//!
//! Exactly one user program runs in U-mode on top of this crate. The crate
//! provides the pieces the hardware does not give a supervisor for free:
//! typed memory access with the user's own rights and translation view
//! ([`umem`]), fetch of the faulting instruction during trap handling
//! ([`insn`]), page-table entry construction and TLB invalidation
//! ([`memory::page_table`]), and the one-way bootstrap into user mode
//! ([`boot`]).
//!
//! The architecture layer comes in two variants selected at build time:
//! inline-assembly intrinsics on riscv64 targets, and a simulated hart on
//! every other target. The simulated variant doubles as the unit-test
//! harness, so `cargo test` on the host exercises the portable logic against
//! the same contracts the hardware variant satisfies.

#![cfg_attr(all(not(test), target_arch = "riscv64"), no_std)]

extern crate alloc;

#[macro_use]
pub mod console;

pub mod boot;
pub mod config;
pub mod hart;
pub mod insn;
mod lang_items;
pub mod loader;
pub mod memory;
pub mod sync;
pub mod trap;
pub mod umem;
