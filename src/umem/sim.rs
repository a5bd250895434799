//! Simulated hart: the non-riscv variant of the architecture layer.
//!
//! One process-wide simulated hart carries the control/status register, the
//! translation root, and a sparse page-granular user memory. The accessor
//! and fetcher run against it with the same contract the hardware variant
//! satisfies, which makes it the unit-test harness: tests map pages, inject
//! faults by leaving holes, and inspect the register state afterwards.

use alloc::{boxed::Box, collections::BTreeMap};

use crate::{config::PAGE_SIZE, sync::mutex::SpinNoIrqLock};

pub use crate::trap::Fault;

struct SimHart {
    status: usize,
    satp: usize,
    sscratch: usize,
    fence_i: usize,
    sfence_vma: usize,
    last_fault: Option<Fault>,
    pages: BTreeMap<usize, Box<[u8; PAGE_SIZE]>>,
}

impl SimHart {
    const fn new() -> Self {
        Self {
            status: 0,
            satp: 0,
            sscratch: 0,
            fence_i: 0,
            sfence_vma: 0,
            last_fault: None,
            pages: BTreeMap::new(),
        }
    }
    fn byte_mut(&mut self, addr: usize) -> Option<&mut u8> {
        let page = self.pages.get_mut(&(addr & !(PAGE_SIZE - 1)))?;
        Some(&mut page[addr % PAGE_SIZE])
    }
}

static HART: SpinNoIrqLock<SimHart> = SpinNoIrqLock::new(SimHart::new());

/// One user-rights access of `dst.len()` bytes. Installs `mask` into the
/// status register, copies, restores, and returns the pre-call status image.
/// On a translation miss the status is restored first, then the fault is
/// handed to the trap dispatcher, which diverges.
pub(crate) unsafe fn read(addr: usize, dst: &mut [u8], mask: usize, fault_pc: usize) -> usize {
    access(addr, dst, false, mask, fault_pc)
}

/// Store counterpart of [`read`].
pub(crate) unsafe fn write(addr: usize, src: &[u8], mask: usize, fault_pc: usize) -> usize {
    // the copy direction is the only difference, share the walk
    debug_assert!(src.len() <= 8);
    let mut buf = [0u8; 8];
    buf[..src.len()].copy_from_slice(src);
    access(addr, &mut buf[..src.len()], true, mask, fault_pc)
}

fn access(addr: usize, buf: &mut [u8], write: bool, mask: usize, fault_pc: usize) -> usize {
    let mut hart = HART.lock();
    let saved = hart.status;
    hart.status = saved | mask;
    for i in 0..buf.len() {
        match hart.byte_mut(addr + i) {
            Some(byte) => {
                if write {
                    *byte = buf[i];
                } else {
                    buf[i] = *byte;
                }
            }
            None => {
                // restore before delivery: the handler must only ever see
                // the pre-call status
                hart.status = saved;
                let fault = Fault {
                    addr: addr + i,
                    fault_pc,
                    write,
                };
                hart.last_fault = Some(fault);
                drop(hart);
                crate::trap::dispatch_user_fault(fault);
            }
        }
    }
    hart.status = saved;
    saved
}

pub fn status() -> usize {
    HART.lock().status
}
pub fn set_status(v: usize) {
    HART.lock().status = v;
}
pub fn satp() -> usize {
    HART.lock().satp
}
pub fn set_satp(v: usize) {
    HART.lock().satp = v;
}
pub fn sscratch() -> usize {
    HART.lock().sscratch
}
pub fn set_sscratch(v: usize) {
    HART.lock().sscratch = v;
}

pub fn note_fence_i() {
    HART.lock().fence_i += 1;
}
pub fn note_sfence_vma() {
    HART.lock().sfence_vma += 1;
}
pub fn fence_i_count() -> usize {
    HART.lock().fence_i
}
pub fn sfence_vma_count() -> usize {
    HART.lock().sfence_vma
}

pub fn last_fault() -> Option<Fault> {
    HART.lock().last_fault
}

/// Back `va`'s page with zeroed simulated memory.
pub fn map_page(va: usize) {
    let mut hart = HART.lock();
    hart.pages
        .insert(va & !(PAGE_SIZE - 1), Box::new([0; PAGE_SIZE]));
}

pub fn unmap_page(va: usize) {
    HART.lock().pages.remove(&(va & !(PAGE_SIZE - 1)));
}

/// Drop all mappings and zero every register. Harness use.
pub fn reset() {
    let mut hart = HART.lock();
    *hart = SimHart::new();
}

static SERIAL: SpinNoIrqLock<()> = SpinNoIrqLock::new(());

pub struct SerialGuard(#[allow(dead_code)] crate::sync::mutex::MutexGuard<'static, (), crate::sync::SpinNoIrq>);

/// There is exactly one simulated hart; tests touching it take this guard.
pub fn serialize() -> SerialGuard {
    SerialGuard(SERIAL.lock())
}
