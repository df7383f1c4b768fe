//! `PackContext`: the per-handle, immutable configuration that binds
//! geometry (width, height, bit depth, tile size) to the tile codec and
//! drives the tile-parallel pack/unpack engine. State lives on the handle,
//! never in a global.

use std::convert::TryInto;

use crate::error::{usize_to_u64, Error, Result};
use crate::math::exact_tile_count;
use crate::tile;

/// Validated geometry for one frame stream, plus the worst-case packed size
/// it implies. Cheap to construct; cheap to clone; reused for every frame a
/// reader or writer handles, so the per-tile FSE tables are rebuilt fresh
/// each call rather than cached (tables depend on a tile's own histogram,
/// not on geometry alone).
#[derive(Debug, Clone)]
pub struct PackContext {
    width: u32,
    height: u32,
    bpp: u32,
    tile_width: u32,
    tile_height: u32,
    tiles_x: u32,
    tiles_y: u32,
    max_packed_size: u64,
}

impl PackContext {
    pub fn new(width: u32, height: u32, bpp: u32, tile_width: u32, tile_height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::usage("frame dimensions must be positive"));
        }

        if bpp == 0 || bpp > 16 {
            return Err(Error::usage("bpp must be in [1, 16]"));
        }

        if tile_width == 0 || tile_height == 0 {
            return Err(Error::usage("tile dimensions must be positive"));
        }

        if width % tile_width != 0 || height % tile_height != 0 {
            return Err(Error::usage("tile size must evenly divide the frame dimensions"));
        }

        let tiles_x = exact_tile_count(width, tile_width);
        let tiles_y = exact_tile_count(height, tile_height);

        let per_tile = tile::max_packed_size(tile_width, tile_height, bpp);
        let tile_count = tiles_x as u64 * tiles_y as u64;
        let max_packed_size = per_tile * tile_count;

        Ok(Self { width, height, bpp, tile_width, tile_height, tiles_x, tiles_y, max_packed_size })
    }

    pub fn width(&self) -> u32 { self.width }
    pub fn height(&self) -> u32 { self.height }
    pub fn bpp(&self) -> u32 { self.bpp }
    pub fn tile_width(&self) -> u32 { self.tile_width }
    pub fn tile_height(&self) -> u32 { self.tile_height }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Upper bound on `pack`'s output length, valid for any frame with this
    /// geometry. Exposed so callers can preallocate a single scratch buffer.
    pub fn max_packed_size(&self) -> u64 {
        self.max_packed_size
    }

    fn tile_coordinates(&self) -> Vec<(u32, u32)> {
        (0..self.tiles_y)
            .flat_map(|ty| (0..self.tiles_x).map(move |tx| (tx, ty)))
            .collect()
    }

    fn extract_tile(&self, pixels: &[u16], tile_x: u32, tile_y: u32) -> Vec<u16> {
        let width = self.width as usize;
        let tile_width = self.tile_width as usize;
        let tile_height = self.tile_height as usize;
        let x0 = tile_x as usize * tile_width;
        let y0 = tile_y as usize * tile_height;

        let mut out = Vec::with_capacity(tile_width * tile_height);
        for row in 0..tile_height {
            let start = (y0 + row) * width + x0;
            out.extend_from_slice(&pixels[start..start + tile_width]);
        }
        out
    }

    fn place_tile(&self, frame: &mut [u16], tile_pixels: &[u16], tile_x: u32, tile_y: u32) {
        let width = self.width as usize;
        let tile_width = self.tile_width as usize;
        let tile_height = self.tile_height as usize;
        let x0 = tile_x as usize * tile_width;
        let y0 = tile_y as usize * tile_height;

        for row in 0..tile_height {
            let start = (y0 + row) * width + x0;
            let tile_row = &tile_pixels[row * tile_width..(row + 1) * tile_width];
            frame[start..start + tile_width].copy_from_slice(tile_row);
        }
    }

    /// Packs one frame's pixel raster (row-major, `width * height` samples)
    /// into the tile-record stream `unpack` can later invert.
    pub fn pack(&self, pixels: &[u16]) -> Result<Vec<u8>> {
        if pixels.len() != self.pixel_count() {
            return Err(Error::usage("frame buffer does not match this context's geometry"));
        }

        let tile_coordinates = self.tile_coordinates();

        let tile_records: Vec<Vec<u8>> = pack_tiles(self, pixels, &tile_coordinates)?;

        let mut out = Vec::with_capacity(tile_records.iter().map(Vec::len).sum());
        for record in tile_records {
            out.extend_from_slice(&record);
        }

        // Open question #3: the reference implementation trusts the FSE
        // library's worst-case bound outright. We don't have that library's
        // track record, so we verify our own bound actually held instead of
        // silently handing back an oversized buffer.
        if usize_to_u64(out.len()) > self.max_packed_size {
            return Err(Error::malformed("packed frame exceeded its declared worst-case bound"));
        }

        Ok(out)
    }

    /// Inverse of `pack`. Errors if the tile records don't exactly cover
    /// `bytes`, or if any individual tile fails to decode.
    pub fn unpack(&self, bytes: &[u8]) -> Result<Vec<u16>> {
        let tile_coordinates = self.tile_coordinates();
        let tile_slices = split_tile_records(bytes, tile_coordinates.len())?;
        let tile_pixels = unpack_tiles(self, &tile_slices)?;

        let mut frame = vec![0u16; self.pixel_count()];
        for (index, &(tile_x, tile_y)) in tile_coordinates.iter().enumerate() {
            self.place_tile(&mut frame, &tile_pixels[index], tile_x, tile_y);
        }

        Ok(frame)
    }
}

fn pack_one_tile(ctx: &PackContext, pixels: &[u16], tile_x: u32, tile_y: u32) -> Result<Vec<u8>> {
    let tile_pixels = ctx.extract_tile(pixels, tile_x, tile_y);
    let mut record = Vec::new();
    tile::pack(&tile_pixels, ctx.tile_width as usize, ctx.tile_height as usize, ctx.bpp, &mut record)?;
    Ok(record)
}

fn unpack_one_tile(ctx: &PackContext, slice: &[u8]) -> Result<Vec<u16>> {
    let mut cursor = slice;
    tile::unpack(&mut cursor, ctx.tile_width as usize, ctx.tile_height as usize, ctx.bpp)
}

/// Walks the tile records front-to-back, reading only the two length
/// prefixes of each, to recover the byte span of every tile without
/// decoding it yet. This lets `unpack_tiles` hand each span to a worker
/// independently, rather than forcing decode to happen in file order.
fn split_tile_records(bytes: &[u8], tile_count: usize) -> Result<Vec<&[u8]>> {
    let mut offset = 0usize;
    let mut slices = Vec::with_capacity(tile_count);

    for _ in 0..tile_count {
        if bytes.len() < offset + 8 {
            return Err(Error::malformed("truncated tile record header"));
        }

        let fse_size = u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap()) as usize;
        let high_size = u32::from_le_bytes(bytes[offset + 4..offset + 8].try_into().unwrap()) as usize;
        let record_len = 8 + fse_size + high_size;

        if bytes.len() < offset + record_len {
            return Err(Error::malformed("truncated tile record payload"));
        }

        slices.push(&bytes[offset..offset + record_len]);
        offset += record_len;
    }

    if offset != bytes.len() {
        return Err(Error::malformed("trailing bytes after the last tile record"));
    }

    Ok(slices)
}

#[cfg(feature = "rayon")]
fn pack_tiles(ctx: &PackContext, pixels: &[u16], tile_coordinates: &[(u32, u32)]) -> Result<Vec<Vec<u8>>> {
    use rayon::prelude::*;
    tile_coordinates.par_iter()
        .map(|&(tile_x, tile_y)| pack_one_tile(ctx, pixels, tile_x, tile_y))
        .collect()
}

#[cfg(not(feature = "rayon"))]
fn pack_tiles(ctx: &PackContext, pixels: &[u16], tile_coordinates: &[(u32, u32)]) -> Result<Vec<Vec<u8>>> {
    tile_coordinates.iter()
        .map(|&(tile_x, tile_y)| pack_one_tile(ctx, pixels, tile_x, tile_y))
        .collect()
}

#[cfg(feature = "rayon")]
fn unpack_tiles(ctx: &PackContext, tile_slices: &[&[u8]]) -> Result<Vec<Vec<u16>>> {
    use rayon::prelude::*;
    tile_slices.par_iter()
        .map(|slice| unpack_one_tile(ctx, slice))
        .collect()
}

#[cfg(not(feature = "rayon"))]
fn unpack_tiles(ctx: &PackContext, tile_slices: &[&[u8]]) -> Result<Vec<Vec<u16>>> {
    tile_slices.iter()
        .map(|slice| unpack_one_tile(ctx, slice))
        .collect()
}
