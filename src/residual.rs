//! Stage 2 of the tile codec: residual remapping to a byte alphabet.
//!
//! The signed residual is zigzag-folded into an unsigned magnitude-
//! interleaved integer, then split into a low byte (fed to the FSE coder,
//! since it is the ~0-peaked part of the distribution) and a small number of
//! high bits (packed verbatim into a side bitstream, since they are close to
//! uniform and not worth modeling). See DESIGN.md for why the alternative
//! two-byte encoding is not implemented here.

use crate::bits::{BitReader, BitWriter};
use crate::error::Result;
use crate::predictor::Residual;

/// Folds a signed residual into an unsigned "zigzag" integer:
/// 0, -1, 1, -2, 2, ... -> 0, 1, 2, 3, 4, ...
#[inline]
pub fn zigzag_encode(value: Residual) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

/// Inverse of [`zigzag_encode`].
#[inline]
pub fn zigzag_decode(value: u32) -> Residual {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}

/// Number of high bits left over once the low byte of a zigzagged residual
/// has been taken, for a given bit depth. Zero once `bpp <= 7`, since then
/// the whole zigzagged value already fits in one byte.
pub fn high_bit_count(bpp: u32) -> u32 {
    (bpp + 1).saturating_sub(8)
}

/// Splits each residual's zigzag encoding into a low byte stream (one byte
/// per residual, in order) and a tightly packed high-bits stream (`high_bit_count(bpp)`
/// bits per residual, LSB-first, packed across byte boundaries).
pub fn split(residuals: &[Residual], bpp: u32) -> (Vec<u8>, Vec<u8>) {
    let high_bits = high_bit_count(bpp);
    let mut low_bytes = Vec::with_capacity(residuals.len());
    let capacity_bytes = crate::math::ceil_div((residuals.len() as u32) * high_bits.max(1), 8) as usize;
    let mut high_writer = BitWriter::with_capacity(capacity_bytes);

    for &residual in residuals {
        let folded = zigzag_encode(residual);
        low_bytes.push((folded & 0xFF) as u8);

        if high_bits > 0 {
            high_writer.push(folded >> 8, high_bits);
        }
    }

    (low_bytes, high_writer.finish())
}

/// Inverse of [`split`]: reconstitutes the residual stream from the low byte
/// stream and the high-bits side stream.
pub fn merge(low_bytes: &[u8], high_bits_blob: &[u8], bpp: u32) -> Result<Vec<Residual>> {
    let high_bits = high_bit_count(bpp);
    let mut high_reader = BitReader::new(high_bits_blob);

    let mut residuals = Vec::with_capacity(low_bytes.len());
    for &low_byte in low_bytes {
        let high = if high_bits > 0 { high_reader.pull(high_bits)? } else { 0 };
        let folded = (low_byte as u32) | (high << 8);
        residuals.push(zigzag_decode(folded));
    }

    Ok(residuals)
}
