#[cfg(target_arch = "riscv64")]
use riscv::register::sstatus;

#[inline]
pub unsafe fn enable() {
    #[cfg(target_arch = "riscv64")]
    sstatus::set_sie();
}

pub unsafe fn restore(sie_before: bool) {
    if sie_before {
        enable()
    }
}

pub unsafe fn disable_and_store() -> bool {
    #[cfg(target_arch = "riscv64")]
    {
        let e = sstatus::read().sie();
        sstatus::clear_sie();
        e
    }
    #[cfg(not(target_arch = "riscv64"))]
    false
}
