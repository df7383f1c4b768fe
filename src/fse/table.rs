//! Table construction and the symbol-level encode/decode loop for the tANS
//! coder. `fse/mod.rs` owns the blob framing (mode byte, frequency header,
//! raw-mode fallback); this module only knows about a fixed-size normalized
//! table and a byte alphabet.

use crate::bits::{BitReader, BitWriter};
use crate::error::{Error, Result};

/// `log2` of the normalized table size. Fixed, rather than adaptive to the
/// input length, matching the "12-bit normalized table" contract.
pub const TABLE_LOG: u32 = 12;
pub const TABLE_SIZE: usize = 1 << TABLE_LOG;

#[inline]
fn highbit(value: u32) -> u32 {
    debug_assert_ne!(value, 0);
    31 - value.leading_zeros()
}

/// Histogram of byte values, wide enough that `normalize` never has to worry
/// about overflow while rescaling.
pub fn count_bytes(bytes: &[u8]) -> [u64; 256] {
    let mut counts = [0u64; 256];
    for &byte in bytes {
        counts[byte as usize] += 1;
    }
    counts
}

/// Rescales a histogram to sum to exactly `TABLE_SIZE`, giving every present
/// symbol at least one slot (the classic FSE normalization, using the
/// largest-remainder method to distribute the rounding error).
pub fn normalize(counts: &[u64; 256], total: u64) -> [u32; 256] {
    let mut freq = [0u32; 256];
    if total == 0 {
        return freq;
    }

    let table_size = TABLE_SIZE as u64;
    let mut remainders: Vec<(u64, usize)> = Vec::new();
    let mut allocated: u64 = 0;

    for symbol in 0..256 {
        let count = counts[symbol];
        if count == 0 {
            continue;
        }

        let scaled = count * table_size;
        let mut scaled_freq = scaled / total;
        let remainder = scaled % total;
        if scaled_freq == 0 {
            scaled_freq = 1;
        }

        freq[symbol] = scaled_freq as u32;
        allocated += scaled_freq;
        remainders.push((remainder, symbol));
    }

    if allocated > table_size {
        let mut excess = allocated - table_size;
        let mut symbols: Vec<usize> = (0..256).filter(|&s| freq[s] > 0).collect();
        symbols.sort_unstable_by(|&a, &b| freq[b].cmp(&freq[a]));

        let mut cursor = 0;
        while excess > 0 {
            let symbol = symbols[cursor % symbols.len()];
            if freq[symbol] > 1 {
                freq[symbol] -= 1;
                excess -= 1;
            }
            cursor += 1;
        }
    } else if allocated < table_size {
        let mut deficit = table_size - allocated;
        remainders.sort_unstable_by(|a, b| b.0.cmp(&a.0));

        let mut cursor = 0;
        while deficit > 0 {
            let symbol = remainders[cursor % remainders.len()].1;
            freq[symbol] += 1;
            deficit -= 1;
            cursor += 1;
        }
    }

    freq
}

#[derive(Clone, Copy, Default)]
struct DecodeEntry {
    symbol: u8,
    nb_bits: u8,
    new_state_base: u16,
}

struct EncodeInterval {
    base: u16,
    nb_bits: u8,
    table_index: u16,
}

/// A built tANS table: the decode side (indexed directly by state) and the
/// encode side (per-symbol sorted intervals, searched by the state the
/// encoder is carrying backward through the input).
pub struct Tables {
    decode: Vec<DecodeEntry>,
    encode: [Vec<EncodeInterval>; 256],
}

impl Tables {
    pub fn build(freq: &[u32; 256]) -> Self {
        // Spread symbols across the table so that occurrences of the same
        // symbol land roughly `table_size / freq` apart from each other.
        // This specific step value is coprime with any power-of-two table
        // size, which guarantees every slot gets visited exactly once.
        let mut table_symbol = vec![0u8; TABLE_SIZE];
        let step = (TABLE_SIZE >> 1) + (TABLE_SIZE >> 3) + 3;
        let mask = TABLE_SIZE - 1;
        let mut position = 0usize;

        for symbol in 0..256 {
            for _ in 0..freq[symbol] {
                table_symbol[position] = symbol as u8;
                position = (position + step) & mask;
            }
        }

        let mut next_state_number = *freq;
        let mut decode = vec![DecodeEntry::default(); TABLE_SIZE];
        let mut encode: [Vec<EncodeInterval>; 256] = std::array::from_fn(|_| Vec::new());

        for state_index in 0..TABLE_SIZE {
            let symbol = table_symbol[state_index] as usize;
            let n = next_state_number[symbol];
            next_state_number[symbol] += 1;

            let nb_bits = TABLE_LOG - highbit(n);
            let new_state_base = ((n as u64) << nb_bits) - TABLE_SIZE as u64;

            decode[state_index] = DecodeEntry {
                symbol: symbol as u8,
                nb_bits: nb_bits as u8,
                new_state_base: new_state_base as u16,
            };

            encode[symbol].push(EncodeInterval {
                base: new_state_base as u16,
                nb_bits: nb_bits as u8,
                table_index: state_index as u16,
            });
        }

        for intervals in encode.iter_mut() {
            intervals.sort_unstable_by_key(|interval| interval.base);
        }

        Self { decode, encode }
    }

    fn find_interval(&self, symbol: u8, state: u16) -> &EncodeInterval {
        let intervals = &self.encode[symbol as usize];
        debug_assert!(!intervals.is_empty(), "symbol {} has zero probability in this table", symbol);

        // Intervals partition [0, TABLE_SIZE) exactly, so a binary search on
        // the interval start is enough to find the (unique) containing one.
        let partition = intervals.partition_point(|interval| interval.base <= state);
        &intervals[partition - 1]
    }
}

/// Encodes `bytes` against `tables`, returning the initial decode state and
/// the packed bitstream. Symbols are processed in reverse so that the
/// resulting bitstream can be read forward, in original order, by
/// [`decode_symbols`].
pub fn encode_symbols(bytes: &[u8], tables: &Tables) -> (u16, Vec<u8>) {
    let mut chunks: Vec<(u32, u32)> = Vec::with_capacity(bytes.len());
    let mut state: u16 = 0;

    for &byte in bytes.iter().rev() {
        let interval = tables.find_interval(byte, state);
        let extra = (state - interval.base) as u32;
        chunks.push((extra, interval.nb_bits as u32));
        state = interval.table_index;
    }

    let initial_state = state;

    let mut writer = BitWriter::with_capacity(bytes.len());
    for &(value, bits) in chunks.iter().rev() {
        writer.push(value, bits);
    }

    (initial_state, writer.finish())
}

/// Inverse of [`encode_symbols`].
pub fn decode_symbols(packed_bits: &[u8], tables: &Tables, initial_state: u16, count: usize) -> Result<Vec<u8>> {
    if initial_state as usize >= TABLE_SIZE {
        return Err(Error::malformed("tANS initial state is out of range"));
    }

    let mut reader = BitReader::new(packed_bits);
    let mut state = initial_state as usize;
    let mut out = Vec::with_capacity(count);

    for _ in 0..count {
        let entry = tables.decode[state];
        out.push(entry.symbol);

        let extra = reader.pull(entry.nb_bits as u32)?;
        state = entry.new_state_base as usize + extra as usize;
    }

    Ok(out)
}
