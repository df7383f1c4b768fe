
//! Small integer helpers shared by the tile, frame and container layers.
//!
//! Unlike its ancestor (which needed mip/rip pyramid level arithmetic for
//! resolution levels), vidpak has a single fixed tile size per file, so the
//! rounding-mode machinery collapses to exact division: `tile_width` must
//! evenly divide `width` (and likewise for height).


/// Number of tiles along one axis. Requires `tile_size` to evenly divide
/// `full_size` -- callers must validate this invariant before calling.
pub fn exact_tile_count(full_size: u32, tile_size: u32) -> u32 {
    debug_assert_ne!(tile_size, 0);
    debug_assert_eq!(full_size % tile_size, 0, "tile size must evenly divide the frame dimension");
    full_size / tile_size
}

/// `ceil(numerator / divisor)`, for positive integers.
pub fn ceil_div(numerator: u32, divisor: u32) -> u32 {
    debug_assert_ne!(divisor, 0);
    (numerator + divisor - 1) / divisor
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tile_counts() {
        assert_eq!(exact_tile_count(128, 32), 4);
        assert_eq!(exact_tile_count(64, 64), 1);
    }

    #[test]
    fn ceil_division() {
        assert_eq!(ceil_div(0, 8), 0);
        assert_eq!(ceil_div(1, 8), 1);
        assert_eq!(ceil_div(8, 8), 1);
        assert_eq!(ceil_div(9, 8), 2);
        assert_eq!(ceil_div(5 * 8, 8), 5);
    }
}
