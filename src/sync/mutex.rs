#![allow(dead_code)]

use core::{
    cell::UnsafeCell,
    fmt,
    ops::{Deref, DerefMut},
    sync::atomic::{AtomicBool, Ordering},
};

pub type SpinLock<T> = Mutex<T, super::Spin>;
pub type SpinNoIrqLock<T> = Mutex<T, super::SpinNoIrq>;

pub struct Mutex<T: ?Sized, S: MutexSupport> {
    lock: AtomicBool,
    _marker: core::marker::PhantomData<S>,
    data: UnsafeCell<T>,
}

pub struct MutexGuard<'a, T: ?Sized, S: MutexSupport + 'a> {
    mutex: &'a Mutex<T, S>,
    support_guard: S::GuardData,
}

unsafe impl<T: ?Sized + Send, S: MutexSupport> Sync for Mutex<T, S> {}
unsafe impl<T: ?Sized + Send, S: MutexSupport> Send for Mutex<T, S> {}

impl<T, S: MutexSupport> Mutex<T, S> {
    pub const fn new(user_data: T) -> Mutex<T, S> {
        Mutex {
            lock: AtomicBool::new(false),
            _marker: core::marker::PhantomData,
            data: UnsafeCell::new(user_data),
        }
    }

    pub fn into_inner(self) -> T {
        let Mutex { data, .. } = self;
        data.into_inner()
    }
}

impl<T: ?Sized, S: MutexSupport> Mutex<T, S> {
    #[inline(always)]
    fn obtain_lock(&self) {
        while self
            .lock
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            // Wait until the lock looks unlocked before retrying
            while self.lock.load(Ordering::Relaxed) {
                core::hint::spin_loop();
            }
        }
    }

    #[inline(always)]
    pub fn lock(&self) -> MutexGuard<T, S> {
        let support_guard = S::before_lock();
        self.obtain_lock();
        MutexGuard {
            mutex: self,
            support_guard,
        }
    }

    pub fn try_lock(&self) -> Option<MutexGuard<T, S>> {
        let support_guard = S::before_lock();
        if self
            .lock
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            Some(MutexGuard {
                mutex: self,
                support_guard,
            })
        } else {
            None
        }
    }

    /// Assume the mutex is free and get reference of value.
    ///
    /// This is only safe during initialization.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn assert_unique_get(&self) -> &mut T {
        assert!(!self.lock.load(Ordering::Relaxed));
        &mut *self.data.get()
    }
}

impl<T: ?Sized + fmt::Debug, S: MutexSupport> fmt::Debug for Mutex<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.try_lock() {
            Some(guard) => write!(f, "Mutex {{ data: {:?} }}", &*guard),
            None => write!(f, "Mutex {{ <locked> }}"),
        }
    }
}

impl<T: ?Sized + Default, S: MutexSupport> Default for Mutex<T, S> {
    fn default() -> Mutex<T, S> {
        Mutex::new(Default::default())
    }
}

impl<'a, T: ?Sized, S: MutexSupport> Deref for MutexGuard<'a, T, S> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.mutex.data.get() }
    }
}

impl<'a, T: ?Sized, S: MutexSupport> DerefMut for MutexGuard<'a, T, S> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<'a, T: ?Sized, S: MutexSupport> Drop for MutexGuard<'a, T, S> {
    fn drop(&mut self) {
        self.mutex.lock.store(false, Ordering::Release);
        S::after_unlock(&mut self.support_guard);
    }
}

/// Low-level support for mutex.
pub trait MutexSupport {
    type GuardData;
    /// Called before lock() & try_lock()
    fn before_lock() -> Self::GuardData;
    /// Called when MutexGuard dropping
    fn after_unlock(_: &mut Self::GuardData);
}
