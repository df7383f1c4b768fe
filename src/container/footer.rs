//! The optional v2 trailing frame index: a `"VPFootSt"`-prefixed block
//! naming every frame's absolute record offset, located via a fixed 16-byte
//! trailer at the very end of the file.
//!
//! Recovery is best-effort by design: any mismatch, truncation, or I/O
//! error during `try_recover` is swallowed and reported as `None`, which
//! tells the reader to fall back to header-scan mode instead.

use crate::error::{u64_to_usize, Error, Result};
use crate::io::{Data, Read, Seek, SeekFrom, Write};

const FOOTER_START_MAGIC: &[u8; 8] = b"VPFootSt";
const FOOTER_END_MAGIC: &[u8; 8] = b"VPFooter";

/// Fixed size of the trailing locator: `"VPFooter"` + a `u64` footer offset.
pub const TRAILER_SIZE: u64 = 16;

pub struct FooterIndex {
    pub frame_count: u32,
    pub offsets: Option<Vec<u64>>,
}

/// Writes the footer body at the writer's current position, followed by the
/// fixed trailer. `footer_start_offset` must be the absolute byte offset the
/// footer body itself starts at (i.e. the writer's position before this call).
pub fn write(write: &mut impl Write, frame_count: u32, offsets: Option<&[u64]>, footer_start_offset: u64) -> Result<()> {
    write.write_all(FOOTER_START_MAGIC)?;
    frame_count.write(write)?;

    let has_offset_table: u8 = if offsets.is_some() { 1 } else { 0 };
    has_offset_table.write(write)?;

    if let Some(offsets) = offsets {
        debug_assert_eq!(offsets.len(), frame_count as usize);
        u64::write_slice(write, offsets)?;
    }

    write.write_all(FOOTER_END_MAGIC)?;
    footer_start_offset.write(write)?;
    Ok(())
}

/// Attempts to locate and parse the footer in a file of the given length.
/// Returns `None` rather than an error on any failure, by design.
pub fn try_recover(source: &mut (impl Read + Seek), file_len: u64) -> Option<FooterIndex> {
    recover(source, file_len).ok()
}

fn recover(source: &mut (impl Read + Seek), file_len: u64) -> Result<FooterIndex> {
    if file_len < TRAILER_SIZE {
        return Err(Error::malformed("file too short to contain a footer trailer"));
    }

    source.seek(SeekFrom::Start(file_len - TRAILER_SIZE))?;

    let mut end_magic = [0u8; 8];
    source.read_exact(&mut end_magic)?;
    if &end_magic != FOOTER_END_MAGIC {
        return Err(Error::malformed("missing footer trailer magic"));
    }

    let footer_start = u64::read(source)?;
    if footer_start >= file_len {
        return Err(Error::malformed("footer start offset points past end of file"));
    }

    source.seek(SeekFrom::Start(footer_start))?;

    let mut start_magic = [0u8; 8];
    source.read_exact(&mut start_magic)?;
    if &start_magic != FOOTER_START_MAGIC {
        return Err(Error::malformed("footer start magic mismatch"));
    }

    let frame_count = u32::read(source)?;
    let has_offset_table = u8::read(source)?;

    let offsets = if has_offset_table != 0 {
        Some(u64::read_vec(source, u64_to_usize(frame_count as u64))?)
    } else {
        None
    };

    Ok(FooterIndex { frame_count, offsets })
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn roundtrip_with_offset_table() {
        let mut file = Vec::new();
        file.extend_from_slice(b"pretend frame records take up this much space...");
        let footer_start = file.len() as u64;

        write(&mut file, 3, Some(&[0, 17, 54]), footer_start).unwrap();
        let file_len = file.len() as u64;

        let mut cursor = Cursor::new(&mut file);
        let recovered = try_recover(&mut cursor, file_len).expect("footer should parse");
        assert_eq!(recovered.frame_count, 3);
        assert_eq!(recovered.offsets, Some(vec![0, 17, 54]));
    }

    #[test]
    fn roundtrip_without_offset_table() {
        let mut file = Vec::new();
        let footer_start = file.len() as u64;
        write(&mut file, 5, None, footer_start).unwrap();
        let file_len = file.len() as u64;

        let mut cursor = Cursor::new(&mut file);
        let recovered = try_recover(&mut cursor, file_len).expect("footer should parse");
        assert_eq!(recovered.frame_count, 5);
        assert_eq!(recovered.offsets, None);
    }

    #[test]
    fn truncated_footer_falls_back_silently() {
        let mut file = Vec::new();
        write(&mut file, 3, Some(&[0, 17, 54]), 0).unwrap();
        file.truncate(file.len() - 5);
        let file_len = file.len() as u64;

        let mut cursor = Cursor::new(&mut file);
        assert!(try_recover(&mut cursor, file_len).is_none());
    }

    #[test]
    fn empty_file_has_no_footer() {
        let mut file: Vec<u8> = Vec::new();
        let mut cursor = Cursor::new(&mut file);
        assert!(try_recover(&mut cursor, 0).is_none());
    }
}
