use crate::hart::interrupt;

pub mod mutex;

pub use mutex::{Mutex, MutexSupport, SpinLock, SpinNoIrqLock};

/// Spin & no-interrupt lock support.
#[derive(Debug)]
pub struct SpinNoIrq;

/// Holds the interrupt-enable state from before the critical section and
/// restores it on drop.
pub struct FlagsGuard(bool);

impl Drop for FlagsGuard {
    fn drop(&mut self) {
        unsafe { interrupt::restore(self.0) };
    }
}

impl FlagsGuard {
    pub fn no_irq_region() -> Self {
        Self(unsafe { interrupt::disable_and_store() })
    }
}

impl MutexSupport for SpinNoIrq {
    type GuardData = FlagsGuard;
    #[inline(always)]
    fn before_lock() -> Self::GuardData {
        FlagsGuard::no_irq_region()
    }
    fn after_unlock(_: &mut Self::GuardData) {}
}

/// Plain spin lock support, usable where interrupts are already off.
#[derive(Debug)]
pub struct Spin;

impl MutexSupport for Spin {
    type GuardData = ();
    #[inline(always)]
    fn before_lock() -> Self::GuardData {}
    fn after_unlock(_: &mut Self::GuardData) {}
}
