//! Program image loading.
//!
//! Accepts either an ELF executable (segments placed at their stated
//! physical addresses) or a raw flat image placed at the initial PC.

use object::{Object, ObjectSegment};

use crate::common::INIT_PC;
use crate::mem::Memory;

/// Load a program image into memory and return the entry PC.
///
/// # Errors
/// Returns a description when the image does not fit in memory or the ELF
/// cannot be parsed.
pub fn load_image(image: &[u8], mem: &mut Memory) -> Result<u64, String> {
    if image.starts_with(&[0x7F, b'E', b'L', b'F']) {
        let file = object::File::parse(image).map_err(|e| format!("bad ELF: {e}"))?;
        for segment in file.segments() {
            let addr = segment.address();
            let data = segment.data().map_err(|e| format!("bad ELF segment: {e}"))?;
            if data.is_empty() {
                continue;
            }
            if (addr as usize).saturating_add(data.len()) > mem.size() {
                return Err(format!(
                    "segment at {addr:#x} ({} bytes) exceeds memory",
                    data.len()
                ));
            }
            mem.write_image(addr, data);
        }
        Ok(file.entry())
    } else {
        if image.len() > mem.size() - INIT_PC as usize {
            return Err(format!("flat image of {} bytes exceeds memory", image.len()));
        }
        mem.write_image(INIT_PC, image);
        Ok(INIT_PC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_image_loads_at_the_initial_pc() {
        let mut mem = Memory::new(16);
        let entry = load_image(&[0x13, 0x00, 0x00, 0x00], &mut mem).unwrap();
        assert_eq!(entry, INIT_PC);
        assert_eq!(mem.load_insn(INIT_PC).unwrap().bits(), 0x0000_0013);
    }
}
