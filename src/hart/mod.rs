//! Hart bring-up and the narrow CSR surface the rest of the crate uses.
//!
//! Exactly one hart runs the bootstrap; every other hart parks in a `wfi`
//! loop holding no resources (dispatching them later is outside this core).

pub mod csr;
pub mod interrupt;
#[cfg(target_arch = "riscv64")]
pub mod sbi;
pub mod sfence;

use core::sync::atomic::{AtomicUsize, Ordering};

#[cfg(target_arch = "riscv64")]
core::arch::global_asm!(
    "
    .section .text.entry
    .globl _start
_start:
    # a0 = hartid, a1 = device tree; 64KB boot stack slice per hart
    mv   t0, a0
    addi t0, t0, 1
    slli t0, t0, 16
    la   sp, boot_stack
    add  sp, sp, t0
    call rust_main
    .section .bss.stack
    .globl boot_stack
boot_stack:
    .space 4096 * 16 * 8
    .globl boot_stack_top
boot_stack_top:
"
);

const HART_NONE: usize = usize::MAX;

/// Which hart won the bootstrap. The nonzero idle value keeps the latch in
/// .data: `clear_bss` runs after the winner is chosen and must not rearm it
/// for late-arriving harts.
static FIRST_HART: AtomicUsize = AtomicUsize::new(HART_NONE);

/// True for exactly one caller per boot.
fn claim_boot_hart(hartid: usize) -> bool {
    FIRST_HART
        .compare_exchange(HART_NONE, hartid, Ordering::SeqCst, Ordering::SeqCst)
        .is_ok()
}

#[cfg(target_arch = "riscv64")]
static BOOT_STACK_TOP: AtomicUsize = AtomicUsize::new(0);

#[cfg(target_arch = "riscv64")]
#[no_mangle]
pub extern "C" fn rust_main(hartid: usize, _device_tree_paddr: usize) -> ! {
    if !claim_boot_hart(hartid) {
        // one hart bootstraps, the rest hold no resources
        park();
    }
    clear_bss();
    extern "C" {
        fn boot_stack();
    }
    BOOT_STACK_TOP.store(
        boot_stack as usize + (hartid + 1) * 4096 * 16,
        Ordering::SeqCst,
    );
    crate::console::init();
    println!("[rvpk]boot hart {}", hartid);
    unsafe {
        crate::trap::set_kernel_trap_entry();
        csr::write_sscratch(0);
        csr::write_sie(0);
        // SUM stays clear outside accessor windows
        csr::set_status_bits(csr::STATUS_FS | csr::STATUS_VS);
    }
    crate::memory::init();
    crate::boot::main()
}

/// Cooperative idle loop for harts that take no part in the bootstrap.
pub fn park() -> ! {
    loop {
        #[cfg(target_arch = "riscv64")]
        unsafe {
            riscv::asm::wfi()
        };
        #[cfg(not(target_arch = "riscv64"))]
        core::hint::spin_loop();
    }
}

pub fn current_sp() -> usize {
    csr::get_sp()
}

/// Top of the boot hart's stack slice, parked in sscratch across the stay
/// in U-mode.
#[cfg(target_arch = "riscv64")]
pub fn kernel_stack_top() -> usize {
    BOOT_STACK_TOP.load(Ordering::SeqCst)
}

/// clear bss to set static variables to zero.
#[cfg(target_arch = "riscv64")]
fn clear_bss() {
    extern "C" {
        fn sbss();
        fn ebss();
    }
    (sbss as usize..ebss as usize).for_each(|a| unsafe { (a as *mut u8).write_volatile(0) });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_latch_admits_exactly_one_hart() {
        // a zero-initialized latch would land in .bss and be rearmed by the
        // wipe; the idle value must be nonzero
        assert_ne!(HART_NONE, 0);
        assert!(claim_boot_hart(0));
        assert!(!claim_boot_hart(1));
        assert!(!claim_boot_hart(0));
    }
}
