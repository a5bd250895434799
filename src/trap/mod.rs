//! Supervisor trap plumbing and the one-way handoff into user mode.
//!
//! There is no general trap loop here: the only traps this supervisor
//! expects in S-mode are accessor faults, and those are terminal for the
//! interrupted operation.

pub mod context;

pub use context::Trapframe;

/// A user-rights access the translation could not satisfy. Built by the
/// architecture layer with the status register already restored to its
/// pre-window image, and delivered here, never returned as a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault {
    pub addr: usize,
    pub fault_pc: usize,
    pub write: bool,
}

/// Terminal delivery point for accessor faults. The interrupted access is
/// never resumed.
pub fn dispatch_user_fault(fault: Fault) -> ! {
    panic!(
        "user {} fault at {:#x} (pc {:#x})",
        if fault.write { "store" } else { "load" },
        fault.addr,
        fault.fault_pc
    );
}

#[cfg(target_arch = "riscv64")]
mod imp {
    use core::arch::global_asm;

    use riscv::register::{scause, sepc, stval, stvec};

    use super::{Fault, Trapframe};

    global_asm!(
        "
        .section .text
        .globl __kernel_trap_vector
        .align 2
    __kernel_trap_vector:
        # sscratch holds zero while in S-mode and the supervisor stack top
        # while in U-mode; the swap tells the two apart
        csrrw sp, sscratch, sp
        bnez  sp, 1f
        # trap from S-mode: undo the swap. Accessor contract: a3 carries
        # the pre-window sstatus image, a2 the pc the access was performed
        # on behalf of
        csrrw sp, sscratch, sp
        csrw  sstatus, a3
        mv    a0, a2
        call  kernel_trap_handler
    1:
        # trap from U-mode: sp is now the supervisor stack, the user sp
        # stays parked in sscratch
        call  user_trap_handler

        .globl __enter_user
        .align 2
    __enter_user:
        ld   t0, 32*8(a0)
        csrw sepc, t0
        ld   t0, 33*8(a0)
        csrw sstatus, t0
        ld   x1, 1*8(a0)
        ld   x2, 2*8(a0)
        ld   x3, 3*8(a0)
        ld   x4, 4*8(a0)
        ld   x5, 5*8(a0)
        ld   x6, 6*8(a0)
        ld   x7, 7*8(a0)
        ld   x8, 8*8(a0)
        ld   x9, 9*8(a0)
        ld   x11, 11*8(a0)
        ld   x12, 12*8(a0)
        ld   x13, 13*8(a0)
        ld   x14, 14*8(a0)
        ld   x15, 15*8(a0)
        ld   x16, 16*8(a0)
        ld   x17, 17*8(a0)
        ld   x18, 18*8(a0)
        ld   x19, 19*8(a0)
        ld   x20, 20*8(a0)
        ld   x21, 21*8(a0)
        ld   x22, 22*8(a0)
        ld   x23, 23*8(a0)
        ld   x24, 24*8(a0)
        ld   x25, 25*8(a0)
        ld   x26, 26*8(a0)
        ld   x27, 27*8(a0)
        ld   x28, 28*8(a0)
        ld   x29, 29*8(a0)
        ld   x30, 30*8(a0)
        ld   x31, 31*8(a0)
        ld   x10, 10*8(a0)
        sret
    "
    );

    extern "C" {
        fn __kernel_trap_vector();
        fn __enter_user(tf: *const Trapframe) -> !;
    }

    pub unsafe fn set_kernel_trap_entry() {
        stvec::write(__kernel_trap_vector as usize, stvec::TrapMode::Direct);
    }

    /// Drop into U-mode through the frame. Does not return: the next trap
    /// lands in `__kernel_trap_vector` with a fresh cause.
    pub unsafe fn run_user(tf: &Trapframe) -> ! {
        __enter_user(tf)
    }

    #[no_mangle]
    extern "C" fn kernel_trap_handler(fault_pc: usize) -> ! {
        use scause::{Exception, Trap};
        let tval = stval::read();
        match scause::read().cause() {
            Trap::Exception(Exception::LoadFault) | Trap::Exception(Exception::LoadPageFault) => {
                super::dispatch_user_fault(Fault {
                    addr: tval,
                    fault_pc,
                    write: false,
                })
            }
            Trap::Exception(Exception::StoreFault)
            | Trap::Exception(Exception::StorePageFault) => super::dispatch_user_fault(Fault {
                addr: tval,
                fault_pc,
                write: true,
            }),
            cause => panic!("unexpected supervisor trap {:?}, tval {:#x}", cause, tval),
        }
    }

    /// First trap out of the user program. Servicing user requests is
    /// outside this core, so every user trap is terminal.
    #[no_mangle]
    extern "C" fn user_trap_handler() -> ! {
        panic!(
            "user trap {:?} at {:#x}, tval {:#x}",
            scause::read().cause(),
            sepc::read(),
            stval::read(),
        )
    }
}

#[cfg(not(target_arch = "riscv64"))]
mod imp {
    pub unsafe fn set_kernel_trap_entry() {}
}

#[cfg(target_arch = "riscv64")]
pub use imp::run_user;
pub use imp::set_kernel_trap_entry;
