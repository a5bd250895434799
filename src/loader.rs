//! User image parsing and placement.
//!
//! The image arrives as one byte buffer from the host. Parsing validates the
//! header up front the cheap way, then leans on `xmas_elf` for the rest.
//! Placement routes every byte through the privileged accessor, so the write
//! happens with the user's rights and translation view.

use alloc::vec::Vec;

use xmas_elf::{program::Type, ElfFile};

use crate::umem;

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const CLASS_64: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageError {
    /// The host has no file under the requested name.
    NotFound,
    BadMagic,
    /// Not a 64-bit image.
    BadClass,
    Malformed(&'static str),
}

/// One PT_LOAD region: the file-backed prefix plus its in-memory footprint.
pub struct LoadSegment {
    pub vaddr: usize,
    pub mem_size: usize,
    pub data: Vec<u8>,
}

/// Everything the launcher needs from a parsed image.
pub struct ImageInfo {
    pub entry: usize,
    pub ph_count: usize,
    pub ph_entry_size: usize,
    /// Raw program-header table, relocated onto the user stack for the
    /// runtime's benefit.
    pub phdr: Vec<u8>,
    pub segments: Vec<LoadSegment>,
}

/// How the launcher obtains the image bytes. The hardware variant fetches
/// from the host frontend; tests hand in buffers directly.
pub trait LoadImage {
    fn load(&self, name: &str) -> Result<Vec<u8>, ImageError>;
}

pub fn parse_image(data: &[u8]) -> Result<ImageInfo, ImageError> {
    if data.len() < 5 || data[..4] != ELF_MAGIC {
        return Err(ImageError::BadMagic);
    }
    if data[4] != CLASS_64 {
        return Err(ImageError::BadClass);
    }
    let elf = ElfFile::new(data).map_err(ImageError::Malformed)?;
    let pt2 = &elf.header.pt2;

    let ph_count = pt2.ph_count() as usize;
    let ph_entry_size = pt2.ph_entry_size() as usize;
    let ph_offset = pt2.ph_offset() as usize;
    let ph_table_end = ph_count
        .checked_mul(ph_entry_size)
        .and_then(|len| ph_offset.checked_add(len))
        .ok_or(ImageError::Malformed("program header table overflows"))?;
    let phdr = data
        .get(ph_offset..ph_table_end)
        .ok_or(ImageError::Malformed("truncated program header table"))?
        .to_vec();

    let mut segments = Vec::new();
    for ph in elf.program_iter() {
        if ph.get_type() != Ok(Type::Load) {
            continue;
        }
        let file_size = ph.file_size() as usize;
        let mem_size = ph.mem_size() as usize;
        if file_size > mem_size {
            return Err(ImageError::Malformed("segment file size exceeds memory size"));
        }
        let offset = ph.offset() as usize;
        let end = offset
            .checked_add(file_size)
            .ok_or(ImageError::Malformed("truncated segment"))?;
        let data = data
            .get(offset..end)
            .ok_or(ImageError::Malformed("truncated segment"))?
            .to_vec();
        segments.push(LoadSegment {
            vaddr: ph.virtual_addr() as usize,
            mem_size,
            data,
        });
    }
    if segments.is_empty() {
        return Err(ImageError::Malformed("no loadable segments"));
    }

    Ok(ImageInfo {
        entry: pt2.entry_point() as usize,
        ph_count,
        ph_entry_size,
        phdr,
        segments,
    })
}

/// Copy every loadable segment into user memory, zero-filling the
/// file-truncated tail. Faults surface through the trap dispatcher.
pub fn load_segments(info: &ImageInfo) {
    for seg in &info.segments {
        for (i, b) in seg.data.iter().enumerate() {
            unsafe { umem::store::<u8>(seg.vaddr + i, *b, 0) };
        }
        for i in seg.data.len()..seg.mem_size {
            unsafe { umem::store::<u8>(seg.vaddr + i, 0, 0) };
        }
    }
}
