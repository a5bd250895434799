//! Bootstrap of the single user process: host argument retrieval, flag
//! parsing, image load, stack image, and the one-way drop into U-mode.

#[cfg(target_arch = "riscv64")]
pub mod host;
pub mod stack;

use alloc::vec::Vec;
use core::fmt;

use crate::config::MAX_ARGS;
use crate::loader::{self, ImageError, LoadImage};
use stack::StackLayout;

/// Word buffer the host fills with the command line: argc, then argc
/// absolute pointers into the buffer itself, a zero word, then the
/// NUL-terminated strings.
#[repr(C, align(8))]
pub struct ArgBuf {
    words: [u64; MAX_ARGS],
}

impl ArgBuf {
    pub const fn zeroed() -> Self {
        Self {
            words: [0; MAX_ARGS],
        }
    }

    pub fn base(&self) -> usize {
        self.words.as_ptr() as usize
    }

    pub fn size_bytes(&self) -> usize {
        core::mem::size_of_val(&self.words)
    }

    fn bytes(&self) -> &[u8] {
        unsafe { core::slice::from_raw_parts(self.words.as_ptr() as *const u8, self.size_bytes()) }
    }

    /// Host-side fill, for the frontend packet and for test doubles.
    pub fn set_word(&mut self, index: usize, value: u64) {
        self.words[index] = value;
    }

    pub fn set_byte(&mut self, offset: usize, value: u8) {
        let bytes = unsafe {
            core::slice::from_raw_parts_mut(self.words.as_mut_ptr() as *mut u8, self.size_bytes())
        };
        bytes[offset] = value;
    }

    /// Decode argc plus the argument strings the host wrote.
    pub fn collect_args(&self) -> Result<Vec<&str>, BootError> {
        let argc = self.words[0] as usize;
        if argc == 0 {
            return Err(BootError::NoProgram);
        }
        if argc + 2 > MAX_ARGS {
            return Err(BootError::TooManyArgs);
        }
        let base = self.base() as u64;
        let bytes = self.bytes();
        let mut args = Vec::with_capacity(argc);
        for i in 0..argc {
            let offset = self.words[1 + i]
                .checked_sub(base)
                .filter(|&o| (o as usize) < bytes.len())
                .ok_or(BootError::BadArgs("argument pointer outside buffer"))?
                as usize;
            let tail = &bytes[offset..];
            let len = tail
                .iter()
                .position(|&b| b == 0)
                .ok_or(BootError::BadArgs("unterminated argument string"))?;
            let s = core::str::from_utf8(&tail[..len])
                .map_err(|_| BootError::BadArgs("argument is not utf-8"))?;
            args.push(s);
        }
        Ok(args)
    }
}

/// How the launcher reaches its host: one call retrieving the command line.
pub trait HostInterface {
    fn main_vars(&self, buf: &mut ArgBuf) -> Result<(), BootError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootOptions {
    /// `-s`: report hardware counter deltas when the program exits.
    pub sample_counters: bool,
    /// `-p` clears this. Accepted for command-line compatibility and
    /// recorded for callers; segment placement here is eager either way,
    /// so a cleared flag changes nothing.
    pub demand_paging: bool,
}

impl Default for BootOptions {
    fn default() -> Self {
        Self {
            sample_counters: false,
            demand_paging: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootError {
    /// `-h`/`--help` was given; not a failure.
    Help,
    UnknownFlag(char),
    TooManyArgs,
    NoProgram,
    BadArgs(&'static str),
    Image(ImageError),
}

impl BootError {
    /// Process exit code reported to the host.
    pub fn exit_code(&self) -> u32 {
        match self {
            BootError::Help => 0,
            _ => 1,
        }
    }
}

impl From<ImageError> for BootError {
    fn from(e: ImageError) -> Self {
        BootError::Image(e)
    }
}

impl fmt::Display for BootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootError::Help => f.write_str(HELP_TEXT),
            BootError::UnknownFlag(c) => write!(f, "unrecognized option: `{}`", c),
            BootError::TooManyArgs => f.write_str("too many arguments"),
            BootError::NoProgram => f.write_str("need a target program"),
            BootError::BadArgs(why) => write!(f, "bad argument buffer: {}", why),
            BootError::Image(e) => write!(f, "cannot load target program: {:?}", e),
        }
    }
}

pub const HELP_TEXT: &str = "\
usage: rvpk [options] <program> [arguments]
options:
  -h, --help  print this message
  -s          print hardware counter deltas on exit
  -p          load the whole program eagerly
";

/// Split the host command line into options and the target program's argv.
/// The first word is the supervisor's own name and is skipped.
pub fn parse_args<'a>(args: &[&'a str]) -> Result<(BootOptions, Vec<&'a str>), BootError> {
    let mut options = BootOptions::default();
    let mut rest = &args[1..];
    while let Some(&arg) = rest.first() {
        if !arg.starts_with('-') {
            break;
        }
        match arg {
            "-h" | "--help" => return Err(BootError::Help),
            "-s" => options.sample_counters = true,
            "-p" => options.demand_paging = false,
            _ => return Err(BootError::UnknownFlag(arg.chars().nth(1).unwrap_or('-'))),
        }
        rest = &rest[1..];
    }
    if rest.is_empty() {
        return Err(BootError::NoProgram);
    }
    Ok((options, rest.to_vec()))
}

/// Boot advances through these in order, never backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BootStage {
    ArgsRetrieved,
    ImageLoaded,
    StackBuilt,
    UserModeEntered,
}

/// Everything `prepare` produced, ready for the privilege drop.
#[derive(Debug, Clone, Copy)]
pub struct LaunchPlan {
    pub options: BootOptions,
    pub entry: usize,
    pub layout: StackLayout,
    pub stage: BootStage,
}

pub struct Launcher<H, L> {
    host: H,
    images: L,
}

impl<H: HostInterface, L: LoadImage> Launcher<H, L> {
    pub fn new(host: H, images: L) -> Self {
        Self { host, images }
    }

    /// Run every boot stage short of the privilege drop: fetch the command
    /// line, parse flags, load and place the image, build the stack.
    pub fn prepare(&self) -> Result<LaunchPlan, BootError> {
        let mut stage;

        let mut buf = ArgBuf::zeroed();
        self.host.main_vars(&mut buf)?;
        let args = buf.collect_args()?;
        let (options, argv) = parse_args(&args)?;
        stage = BootStage::ArgsRetrieved;
        log::info!("boot: {} argument(s) for {}", argv.len(), argv[0]);

        let image = self.images.load(argv[0])?;
        let info = loader::parse_image(&image)?;
        loader::load_segments(&info);
        debug_assert!(stage < BootStage::ImageLoaded);
        stage = BootStage::ImageLoaded;
        log::info!("boot: image loaded, entry {:#x}", info.entry);

        let layout = stack::build_stack(&info, &argv, &[]);
        debug_assert!(stage < BootStage::StackBuilt);
        stage = BootStage::StackBuilt;
        log::info!("boot: user stack at {:#x}", layout.sp);

        Ok(LaunchPlan {
            options,
            entry: info.entry,
            layout,
            stage,
        })
    }
}

/// Drop into the user program. One way: the frame is consumed, interrupts
/// stay off until `sret` re-enables them in U-mode.
#[cfg(target_arch = "riscv64")]
pub fn launch(plan: LaunchPlan) -> ! {
    use crate::hart::{csr, sfence};
    use crate::trap::Trapframe;

    debug_assert_eq!(plan.stage, BootStage::StackBuilt);
    debug_assert_ne!(crate::memory::page_table::root_satp(), 0);
    // instruction stream just written through data accesses
    sfence::fence_i();
    let tf = Trapframe::init_user(plan.entry, plan.layout.sp);
    unsafe {
        csr::write_sscratch(crate::hart::kernel_stack_top());
        crate::trap::run_user(&tf)
    }
}

/// Hardware counter snapshot for the `-s` option.
#[cfg(target_arch = "riscv64")]
#[derive(Debug, Clone, Copy)]
pub struct Counters {
    pub cycle: usize,
    pub time: usize,
    pub instret: usize,
}

#[cfg(target_arch = "riscv64")]
impl Counters {
    pub fn sample() -> Self {
        use riscv::register::{cycle, instret, time};
        Self {
            cycle: cycle::read(),
            time: time::read(),
            instret: instret::read(),
        }
    }
}

/// Boot entry called from the hart bringup path.
#[cfg(target_arch = "riscv64")]
pub fn main() -> ! {
    let launcher = Launcher::new(host::FrontendHost, host::FrontendLoader);
    match launcher.prepare() {
        Ok(plan) => {
            if plan.options.sample_counters {
                let c = Counters::sample();
                println!(
                    "[rvpk] boot counters: cycle={} time={} instret={}",
                    c.cycle, c.time, c.instret
                );
            }
            launch(plan)
        }
        Err(e) => {
            println!("{}", e);
            host::host_exit(e.exit_code())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PAGE_SIZE, USER_BASE, USER_STACK_TOP};
    use crate::umem::{self, sim};

    fn fill_argbuf(buf: &mut ArgBuf, args: &[&str]) {
        buf.set_word(0, args.len() as u64);
        let mut cursor = (args.len() + 2) * 8;
        for (i, arg) in args.iter().enumerate() {
            buf.set_word(1 + i, (buf.base() + cursor) as u64);
            for &b in arg.as_bytes() {
                buf.set_byte(cursor, b);
                cursor += 1;
            }
            buf.set_byte(cursor, 0);
            cursor += 1;
        }
    }

    struct FixedHost(&'static [&'static str]);
    impl HostInterface for FixedHost {
        fn main_vars(&self, buf: &mut ArgBuf) -> Result<(), BootError> {
            fill_argbuf(buf, self.0);
            Ok(())
        }
    }

    struct FixedImage(alloc::vec::Vec<u8>);
    impl LoadImage for FixedImage {
        fn load(&self, name: &str) -> Result<alloc::vec::Vec<u8>, ImageError> {
            if name == "prog" {
                Ok(self.0.clone())
            } else {
                Err(ImageError::NotFound)
            }
        }
    }

    #[test]
    fn argbuf_round_trips_strings() {
        let mut buf = ArgBuf::zeroed();
        fill_argbuf(&mut buf, &["rvpk", "-s", "prog", "x y"]);
        assert_eq!(buf.collect_args().unwrap(), ["rvpk", "-s", "prog", "x y"]);
    }

    #[test]
    fn argbuf_rejects_stray_pointer() {
        let mut buf = ArgBuf::zeroed();
        buf.set_word(0, 1);
        buf.set_word(1, 0x10); // absolute address far below the buffer
        assert!(matches!(
            buf.collect_args(),
            Err(BootError::BadArgs(_))
        ));
    }

    #[test]
    fn flags_parse_and_stop_at_program() {
        let (opts, argv) = parse_args(&["rvpk", "-s", "-p", "prog", "-s"]).unwrap();
        assert!(opts.sample_counters);
        assert!(!opts.demand_paging);
        // flags after the program name belong to the program
        assert_eq!(argv, ["prog", "-s"]);
    }

    #[test]
    fn help_is_a_clean_exit_unknown_flag_is_not() {
        assert_eq!(parse_args(&["rvpk", "-h"]), Err(BootError::Help));
        assert_eq!(parse_args(&["rvpk", "--help", "prog"]), Err(BootError::Help));
        assert_eq!(BootError::Help.exit_code(), 0);
        let err = parse_args(&["rvpk", "-z", "prog"]).unwrap_err();
        assert_eq!(err, BootError::UnknownFlag('z'));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn missing_program_is_an_error() {
        assert_eq!(parse_args(&["rvpk"]), Err(BootError::NoProgram));
        assert_eq!(parse_args(&["rvpk", "-s"]), Err(BootError::NoProgram));
    }

    #[test]
    fn prepare_runs_stages_in_order() {
        let _g = sim::serialize();
        sim::reset();
        sim::map_page(USER_BASE);
        for i in 1..=4 {
            sim::map_page(USER_STACK_TOP - i * PAGE_SIZE);
        }
        let image = crate::loader::tests::minimal_image(USER_BASE as u64, &[0x13, 0, 0, 0], 8);
        let launcher = Launcher::new(FixedHost(&["rvpk", "-s", "prog", "data"]), FixedImage(image));

        let plan = launcher.prepare().unwrap();
        assert_eq!(plan.stage, BootStage::StackBuilt);
        assert_eq!(plan.entry, USER_BASE);
        assert!(plan.options.sample_counters);
        assert!(alloc::format!("{:?}", plan).contains("StackBuilt"));

        // image placed and stack parseable where the plan says
        assert_eq!(unsafe { umem::load::<u8>(USER_BASE, 0) }, 0x13);
        assert_eq!(unsafe { umem::load::<usize>(plan.layout.sp, 0) }, 2);
    }

    #[test]
    fn entry_context_matches_plan() {
        let _g = sim::serialize();
        sim::reset();
        sim::map_page(USER_BASE);
        for i in 1..=4 {
            sim::map_page(USER_STACK_TOP - i * PAGE_SIZE);
        }
        let image = crate::loader::tests::minimal_image(USER_BASE as u64 + 0x40, &[0x73], 1);
        let launcher = Launcher::new(FixedHost(&["rvpk", "prog"]), FixedImage(image));
        let plan = launcher.prepare().unwrap();

        let tf = crate::trap::Trapframe::init_user(plan.entry, plan.layout.sp);
        assert_eq!(tf.sepc, USER_BASE + 0x40);
        assert_eq!(tf.sp(), plan.layout.sp);
    }

    #[test]
    fn prepare_surfaces_missing_image() {
        let _g = sim::serialize();
        sim::reset();
        let launcher = Launcher::new(
            FixedHost(&["rvpk", "nosuch"]),
            FixedImage(alloc::vec::Vec::new()),
        );
        let err = launcher.prepare().unwrap_err();
        assert_eq!(err, BootError::Image(ImageError::NotFound));
        assert_eq!(err.exit_code(), 1);
    }
}
