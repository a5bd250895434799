#![allow(dead_code)]

use core::fmt::{self, Write};

use crate::sync::mutex::SpinNoIrqLock;

struct Stdout;

#[cfg(target_arch = "riscv64")]
#[inline(always)]
pub fn putchar(c: char) {
    crate::hart::sbi::console_putchar(c as usize);
}

/// Simulated console: output lands in a buffer the harness can drain.
#[cfg(not(target_arch = "riscv64"))]
static OUTPUT: SpinNoIrqLock<alloc::string::String> =
    SpinNoIrqLock::new(alloc::string::String::new());

#[cfg(not(target_arch = "riscv64"))]
#[inline(always)]
pub fn putchar(c: char) {
    OUTPUT.lock().push(c);
}

#[cfg(not(target_arch = "riscv64"))]
pub fn take_output() -> alloc::string::String {
    core::mem::take(&mut *OUTPUT.lock())
}

impl Write for Stdout {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            putchar(c);
        }
        Ok(())
    }
}

static WRITE_MUTEX: SpinNoIrqLock<Stdout> = SpinNoIrqLock::new(Stdout);

pub fn print(args: fmt::Arguments) {
    let _ = WRITE_MUTEX.lock().write_fmt(args);
}

macro_rules! print {
    ($fmt: literal $(, $($arg: tt)+)?) => {{
        $crate::console::print(format_args!($fmt $(, $($arg)+)?));
    }}
}

macro_rules! println {
    () => { $crate::console::print(format_args!("\n")) };
    ($fmt: literal $(, $($arg: tt)+)?) => {{
        $crate::console::print(format_args!(concat!($fmt, "\n") $(, $($arg)+)?));
    }}
}

macro_rules! color_str {
    ($n: expr) => {
        concat!("\x1b[", $n, "m")
    };
}

struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl log::Log for ConsoleLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }
    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let color = match record.level() {
            log::Level::Error => color_str!(31),
            log::Level::Warn => color_str!(93),
            log::Level::Info => color_str!(34),
            log::Level::Debug => color_str!(32),
            log::Level::Trace => color_str!(90),
        };
        println!(
            "{}[{:>5}] {}{}",
            color,
            record.level(),
            record.args(),
            color_str!(0)
        );
    }
    fn flush(&self) {}
}

pub fn init() {
    // tests call this repeatedly, only the first install matters
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(log::LevelFilter::Info);
}
