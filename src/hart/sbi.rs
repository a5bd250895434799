#![allow(dead_code)]

use core::arch::asm;

#[inline(always)]
fn sbi_call<const N: usize>((fid, eid): (usize, usize), args: [usize; N]) -> usize {
    let ret: usize;
    unsafe {
        let mut a = [0; 3];
        a[..N].copy_from_slice(&args);
        asm!(
            "ecall",
            inlateout("a0") a[0] => ret,
            in("a1") a[1],
            in("a2") a[2],
            in("a6") fid,
            in("a7") eid,
        );
    }
    ret
}

pub fn console_putchar(c: usize) {
    sbi_call((0, SBI_CONSOLE_PUTCHAR), [c]);
}

pub fn console_getchar() -> usize {
    sbi_call((0, SBI_CONSOLE_GETCHAR), [])
}

pub fn shutdown() -> ! {
    sbi_call((0, SBI_SHUTDOWN), []);
    panic!("It should shutdown!");
}

const SBI_CONSOLE_PUTCHAR: usize = 1;
const SBI_CONSOLE_GETCHAR: usize = 2;
const SBI_SHUTDOWN: usize = 8;
