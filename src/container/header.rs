//! The fixed file-level header: magic, version, geometry, and opaque
//! metadata bytes.

use crate::error::{u64_to_usize, Error, Result};
use crate::frame::PackContext;
use crate::io::{Data, Read, Write};

const MAGIC: &[u8; 6] = b"Vidpak";

pub const VERSION_1: u16 = 1;
pub const VERSION_2: u16 = 2;

#[derive(Debug, Clone)]
pub struct Header {
    pub version: u16,
    pub width: u32,
    pub height: u32,
    pub bpp: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub metadata: Vec<u8>,
}

impl Header {
    pub fn new(version: u16, width: u32, height: u32, bpp: u32, tile_width: u32, tile_height: u32, metadata: Vec<u8>) -> Self {
        Self { version, width, height, bpp, tile_width, tile_height, metadata }
    }

    pub fn pack_context(&self) -> Result<PackContext> {
        PackContext::new(self.width, self.height, self.bpp, self.tile_width, self.tile_height)
    }

    pub fn write(&self, write: &mut impl Write) -> Result<()> {
        write.write_all(MAGIC)?;
        self.version.write(write)?;
        self.width.write(write)?;
        self.height.write(write)?;
        self.bpp.write(write)?;
        self.tile_width.write(write)?;
        self.tile_height.write(write)?;
        (self.metadata.len() as u32).write(write)?;
        write.write_all(&self.metadata)?;
        Ok(())
    }

    pub fn read(read: &mut impl Read) -> Result<Self> {
        let mut magic = [0u8; 6];
        read.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(Error::malformed("wrong magic bytes, this is not a vidpak file"));
        }

        let version = u16::read(read)?;
        if version != VERSION_1 && version != VERSION_2 {
            return Err(Error::malformed(format!("unsupported vidpak version {}", version)));
        }

        let width = u32::read(read)?;
        let height = u32::read(read)?;
        let bpp = u32::read(read)?;
        let tile_width = u32::read(read)?;
        let tile_height = u32::read(read)?;
        let metadata_len = u64_to_usize(u32::read(read)? as u64);
        let metadata = u8::read_vec(read, metadata_len)?;

        Ok(Self { version, width, height, bpp, tile_width, tile_height, metadata })
    }

    /// Byte length of the header as written, including the metadata bytes.
    /// Used by the writer to seed its in-memory `file_size` counter without
    /// a round trip through the filesystem.
    pub fn byte_size(&self) -> u64 {
        6 + 2 + 4 * 6 + self.metadata.len() as u64
    }

    pub fn is_v2(&self) -> bool {
        self.version == VERSION_2
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn roundtrip() {
        let header = Header::new(2, 128, 96, 12, 32, 32, b"camera-42".to_vec());
        let mut bytes = Vec::new();
        header.write(&mut bytes).unwrap();
        assert_eq!(bytes.len() as u64, header.byte_size());

        let mut cursor = bytes.as_slice();
        let restored = Header::read(&mut cursor).unwrap();
        assert_eq!(restored.version, header.version);
        assert_eq!(restored.width, header.width);
        assert_eq!(restored.height, header.height);
        assert_eq!(restored.bpp, header.bpp);
        assert_eq!(restored.tile_width, header.tile_width);
        assert_eq!(restored.tile_height, header.tile_height);
        assert_eq!(restored.metadata, header.metadata);
    }

    #[test]
    fn wrong_magic_is_malformed() {
        let bytes = b"NotVidp\x02\x00anything".to_vec();
        let mut cursor = bytes.as_slice();
        assert!(Header::read(&mut cursor).is_err());
    }

    #[test]
    fn unsupported_version_is_malformed() {
        let header = Header::new(2, 64, 64, 12, 32, 32, Vec::new());
        let mut bytes = Vec::new();
        header.write(&mut bytes).unwrap();
        bytes[6] = 99;
        bytes[7] = 0;

        let mut cursor = bytes.as_slice();
        assert!(Header::read(&mut cursor).is_err());
    }
}
