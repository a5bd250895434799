//! Initial user stack image.
//!
//! Layout from the top down: the raw program-header table, then the argument
//! and environment strings, then (16-byte aligned) the pointer vector the C
//! runtime expects: argc, argv pointers, NULL, envp pointers, NULL, auxiliary
//! pairs. Every byte goes through the privileged accessor, so the same code
//! builds the image on hardware and under the simulated hart.

use alloc::vec::Vec;

use crate::config::{STACK_ALIGN, USER_STACK_TOP};
use crate::loader::ImageInfo;
use crate::memory::auxv::AuxHeader;
use crate::umem;

#[derive(Debug, Clone, Copy)]
pub struct StackLayout {
    /// Stack pointer handed to the user program, STACK_ALIGN aligned.
    pub sp: usize,
    pub argc: usize,
    pub argv_ptr: usize,
    pub envp_ptr: usize,
    /// Where the program-header table landed (the AT_PHDR value).
    pub phdr_addr: usize,
    pub random_ptr: usize,
}

fn push_bytes(top: &mut usize, bytes: &[u8]) -> usize {
    *top -= bytes.len();
    for (i, b) in bytes.iter().enumerate() {
        unsafe { umem::store::<u8>(*top + i, *b, 0) };
    }
    *top
}

fn push_str(top: &mut usize, s: &str) -> usize {
    push_bytes(top, &[0]);
    push_bytes(top, s.as_bytes())
}

/// Build the image below [`USER_STACK_TOP`] and return where everything
/// landed. Faults while writing surface through the trap dispatcher.
pub fn build_stack(info: &ImageInfo, args: &[&str], envp: &[&str]) -> StackLayout {
    let mut top = USER_STACK_TOP;

    let phdr_addr = push_bytes(&mut top, &info.phdr);

    let arg_addrs: Vec<usize> = args.iter().map(|s| push_str(&mut top, s)).collect();
    let env_addrs: Vec<usize> = envp.iter().map(|s| push_str(&mut top, s)).collect();

    top &= !(STACK_ALIGN - 1);
    let random_ptr = top;

    let auxv = AuxHeader::generate(
        info.entry,
        info.ph_count,
        info.ph_entry_size,
        phdr_addr,
        random_ptr,
    );

    // argc, argv[..] + NULL, envp[..] + NULL, aux pairs
    let words = 1 + (args.len() + 1) + (envp.len() + 1) + 2 * auxv.len();
    let sp = (top - words * core::mem::size_of::<usize>()) & !(STACK_ALIGN - 1);

    let mut cursor = sp;
    let mut push_word = |v: usize| {
        unsafe { umem::store::<usize>(cursor, v, 0) };
        cursor += core::mem::size_of::<usize>();
    };

    push_word(args.len());
    let argv_ptr = sp + core::mem::size_of::<usize>();
    for addr in &arg_addrs {
        push_word(*addr);
    }
    push_word(0);
    let envp_ptr = argv_ptr + (args.len() + 1) * core::mem::size_of::<usize>();
    for addr in &env_addrs {
        push_word(*addr);
    }
    push_word(0);
    for aux in &auxv {
        push_word(aux.aux_type);
        push_word(aux.value);
    }

    StackLayout {
        sp,
        argc: args.len(),
        argv_ptr,
        envp_ptr,
        phdr_addr,
        random_ptr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PAGE_SIZE;
    use crate::loader;
    use crate::memory::auxv;
    use crate::umem::sim;

    fn map_stack_pages() {
        for i in 1..=4 {
            sim::map_page(USER_STACK_TOP - i * PAGE_SIZE);
        }
    }

    fn read_word(addr: usize) -> usize {
        unsafe { umem::load::<usize>(addr, 0) }
    }

    fn read_cstr(mut addr: usize) -> alloc::string::String {
        let mut s = alloc::string::String::new();
        loop {
            let b = unsafe { umem::load::<u8>(addr, 0) };
            if b == 0 {
                return s;
            }
            s.push(b as char);
            addr += 1;
        }
    }

    #[test]
    fn image_parses_back_from_user_memory() {
        let _g = sim::serialize();
        sim::reset();
        map_stack_pages();
        let info =
            loader::parse_image(&loader::tests::minimal_image(0x1_0000, &[1, 2, 3], 8)).unwrap();

        let layout = build_stack(&info, &["prog", "-x", "input.txt"], &["TERM=dumb"]);

        assert_eq!(layout.sp % STACK_ALIGN, 0);
        assert_eq!(read_word(layout.sp), 3);
        assert_eq!(layout.argc, 3);

        // argv: three pointers then NULL, strings intact
        let argv: Vec<usize> = (0..3).map(|i| read_word(layout.argv_ptr + i * 8)).collect();
        assert_eq!(read_cstr(argv[0]), "prog");
        assert_eq!(read_cstr(argv[1]), "-x");
        assert_eq!(read_cstr(argv[2]), "input.txt");
        assert_eq!(read_word(layout.argv_ptr + 3 * 8), 0);

        // envp directly follows the argv terminator
        assert_eq!(layout.envp_ptr, layout.argv_ptr + 4 * 8);
        assert_eq!(read_cstr(read_word(layout.envp_ptr)), "TERM=dumb");
        assert_eq!(read_word(layout.envp_ptr + 8), 0);

        // aux pairs follow the envp terminator and end with AT_NULL
        let mut aux_addr = layout.envp_ptr + 2 * 8;
        let mut seen_phdr = false;
        loop {
            let ty = read_word(aux_addr);
            let value = read_word(aux_addr + 8);
            match ty {
                auxv::AT_NULL => break,
                auxv::AT_PHDR => {
                    assert_eq!(value, layout.phdr_addr);
                    seen_phdr = true;
                }
                auxv::AT_ENTRY => assert_eq!(value, 0x1_0000),
                auxv::AT_RANDOM => assert_eq!(value, layout.random_ptr),
                _ => {}
            }
            aux_addr += 2 * 8;
        }
        assert!(seen_phdr);

        // the relocated program-header table is byte-identical
        for (i, b) in info.phdr.iter().enumerate() {
            assert_eq!(unsafe { umem::load::<u8>(layout.phdr_addr + i, 0) }, *b);
        }
    }

    #[test]
    fn empty_environment_still_terminates() {
        let _g = sim::serialize();
        sim::reset();
        map_stack_pages();
        let info =
            loader::parse_image(&loader::tests::minimal_image(0x1_0000, &[1], 1)).unwrap();
        let layout = build_stack(&info, &["prog"], &[]);
        assert_eq!(read_word(layout.sp), 1);
        assert_eq!(read_word(layout.envp_ptr), 0);
        assert_eq!(layout.sp % STACK_ALIGN, 0);
    }
}
