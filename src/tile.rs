//! Orchestrates the three tile-codec stages and owns the on-disk tile
//! record layout:
//!
//! ```text
//! u32 LE  fse_blob_size
//! u32 LE  high_bits_blob_size
//! bytes   fse_blob
//! bytes   high_bits_blob
//! ```

use crate::error::{u64_to_usize, usize_to_u64, Error, Result};
use crate::fse;
use crate::io::{Data, Read, Write};
use crate::residual;
use crate::predictor;

/// Packs one tile's pixels (already extracted from the frame raster into a
/// contiguous `width * height` buffer) into its on-disk record bytes.
pub fn pack(pixels: &[u16], width: usize, height: usize, bpp: u32, out: &mut impl Write) -> Result<()> {
    debug_assert_eq!(pixels.len(), width * height);

    let residuals = predictor::predict(pixels, width, height, bpp);
    let (low_bytes, high_bits_blob) = residual::split(&residuals, bpp);
    let fse_blob = fse::encode(&low_bytes);

    (usize_to_u64(fse_blob.len()) as u32).write(out)?;
    (usize_to_u64(high_bits_blob.len()) as u32).write(out)?;
    out.write_all(&fse_blob)?;
    out.write_all(&high_bits_blob)?;
    Ok(())
}

/// Inverse of [`pack`]: reads one tile record and reconstructs its pixels.
pub fn unpack(input: &mut impl Read, width: usize, height: usize, bpp: u32) -> Result<Vec<u16>> {
    let fse_blob_size = u64_to_usize(u32::read(input)? as u64);
    let high_bits_blob_size = u64_to_usize(u32::read(input)? as u64);

    let fse_blob = u8::read_vec(input, fse_blob_size)?;
    let high_bits_blob = u8::read_vec(input, high_bits_blob_size)?;

    let pixel_count = width * height;
    let low_bytes = fse::decode(&fse_blob, pixel_count)?;
    if low_bytes.len() != pixel_count {
        return Err(Error::malformed("FSE stream decoded to the wrong number of residuals for this tile"));
    }

    let residuals = residual::merge(&low_bytes, &high_bits_blob, bpp)?;
    Ok(predictor::reconstruct(&residuals, width, height, bpp))
}

/// Tight upper bound on a single tile's packed record size: the raw-mode
/// escape for the low-byte stream (one mode byte plus the uncompressed
/// bytes) in the worst case, plus the high-bits side stream packed at its
/// full per-residual bit width, plus the two `u32` size prefixes.
pub fn max_packed_size(tile_width: u32, tile_height: u32, bpp: u32) -> u64 {
    let pixel_count = tile_width as u64 * tile_height as u64;
    let fse_worst_case = pixel_count + 1;
    let high_bits_worst_case = crate::math::ceil_div(
        (pixel_count * residual::high_bit_count(bpp) as u64) as u32, 8,
    ) as u64;

    8 + fse_worst_case + high_bits_worst_case
}

#[cfg(test)]
mod test {
    use super::*;

    fn roundtrip(pixels: &[u16], width: usize, height: usize, bpp: u32) {
        let mut record = Vec::new();
        pack(pixels, width, height, bpp, &mut record).unwrap();

        assert!(
            record.len() as u64 <= max_packed_size(width as u32, height as u32, bpp),
            "packed tile exceeded its declared worst-case bound"
        );

        let mut cursor = record.as_slice();
        let restored = unpack(&mut cursor, width, height, bpp).unwrap();
        assert_eq!(pixels, restored.as_slice());
    }

    #[test]
    fn all_zeros_tile_is_tiny() {
        let pixels = vec![0u16; 64 * 64];
        let mut record = Vec::new();
        pack(&pixels, 64, 64, 12, &mut record).unwrap();
        assert!(record.len() < 64);
        roundtrip(&pixels, 64, 64, 12);
    }

    #[test]
    fn gradient_tile_roundtrips() {
        let width = 32;
        let height = 32;
        let pixels: Vec<u16> = (0..width * height)
            .map(|i| (((i % width) * 7 + (i / width) * 13) & 0xFFF) as u16)
            .collect();
        roundtrip(&pixels, width, height, 12);
    }

    #[test]
    fn noisy_tile_roundtrips_within_bound() {
        let mut state: u32 = 0x12345;
        let mut next = || {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state & 0xFFF) as u16
        };

        let pixels: Vec<u16> = (0..16 * 16).map(|_| next()).collect();
        roundtrip(&pixels, 16, 16, 12);
    }

    #[test]
    fn single_pixel_tile_roundtrips() {
        roundtrip(&[2048], 1, 1, 12);
    }

    #[test]
    fn low_bpp_tile_roundtrips() {
        let pixels: Vec<u16> = (0..8 * 8).map(|i| (i % 2) as u16).collect();
        roundtrip(&pixels, 8, 8, 1);
    }
}
