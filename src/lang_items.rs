//! Freestanding runtime pieces for the riscv64 build; host builds get all
//! of this from std.

#[cfg(target_arch = "riscv64")]
#[panic_handler]
fn panic_handler(info: &core::panic::PanicInfo) -> ! {
    println!("{}{}{}", color_str!(31), info, color_str!(0));
    crate::hart::sbi::shutdown()
}
