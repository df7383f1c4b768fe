//! A from-scratch tANS (table-based Asymmetric Numeral System) byte coder,
//! kept behind this narrow `encode`/`decode` boundary so the rest of the
//! codec never has to know how the entropy stage works internally.
//!
//! Every blob starts with a one-byte mode tag: `0` means the payload
//! follows verbatim (the raw-mode escape for incompressible or tiny
//! inputs), `1` means it is a tANS-coded block with an embedded frequency
//! table. `encode` always tries both and keeps whichever is smaller, which
//! subsumes both the "histogram too flat" and "payload too small" cases
//! that would otherwise need separate raw-mode triggers.

mod table;

use crate::error::{Error, Result};
use crate::io::Data;
use table::Tables;

const MODE_RAW: u8 = 0;
const MODE_CODED: u8 = 1;

/// Compresses `bytes`, choosing the raw-mode escape automatically when it
/// beats the tANS-coded form.
pub fn encode(bytes: &[u8]) -> Vec<u8> {
    let coded = try_encode_coded(bytes);

    match coded {
        Some(coded) if coded.len() < bytes.len() + 1 => coded,
        _ => {
            let mut raw = Vec::with_capacity(bytes.len() + 1);
            raw.push(MODE_RAW);
            raw.extend_from_slice(bytes);
            raw
        }
    }
}

/// Decompresses a blob produced by [`encode`]. `original_len` is the number
/// of bytes the caller expects back (the tile knows this from its own
/// geometry) and is used both to size the output and to validate the coded
/// stream actually produced that many symbols.
pub fn decode(blob: &[u8], original_len: usize) -> Result<Vec<u8>> {
    let mode = *blob.first().ok_or_else(|| Error::malformed("empty FSE blob"))?;
    let body = &blob[1..];

    match mode {
        MODE_RAW => {
            if body.len() != original_len {
                return Err(Error::malformed("raw-mode FSE blob has the wrong length"));
            }
            Ok(body.to_vec())
        }
        MODE_CODED => decode_coded(body, original_len),
        other => Err(Error::malformed(format!("unknown FSE blob mode tag {}", other))),
    }
}

fn try_encode_coded(bytes: &[u8]) -> Option<Vec<u8>> {
    if bytes.is_empty() {
        return None;
    }

    let counts = table::count_bytes(bytes);
    let total = bytes.len() as u64;
    let freq = table::normalize(&counts, total);
    let tables = Tables::build(&freq);

    let (initial_state, bitstream) = table::encode_symbols(bytes, &tables);

    let distinct: Vec<(u8, u32)> = freq.iter().enumerate()
        .filter(|&(_, &count)| count > 0)
        .map(|(symbol, &count)| (symbol as u8, count))
        .collect();

    let mut blob = Vec::with_capacity(1 + 4 + distinct.len() * 3 + bitstream.len());
    blob.push(MODE_CODED);
    initial_state.write(&mut blob).ok()?;
    (distinct.len() as u16).write(&mut blob).ok()?;

    for &(symbol, count) in &distinct {
        symbol.write(&mut blob).ok()?;
        debug_assert!(count <= u16::MAX as u32, "a single symbol cannot own the whole 12-bit table twice over");
        (count as u16).write(&mut blob).ok()?;
    }

    blob.extend_from_slice(&bitstream);
    Some(blob)
}

fn decode_coded(body: &[u8], original_len: usize) -> Result<Vec<u8>> {
    let mut cursor = body;
    let initial_state = u16::read(&mut cursor)?;
    let distinct_count = u16::read(&mut cursor)? as usize;

    let mut freq = [0u32; 256];
    for _ in 0..distinct_count {
        let symbol = u8::read(&mut cursor)?;
        let count = u16::read(&mut cursor)?;
        freq[symbol as usize] = count as u32;
    }

    let total: u32 = freq.iter().sum();
    if total as usize != table::TABLE_SIZE {
        return Err(Error::malformed("FSE frequency table does not sum to the normalized table size"));
    }

    let tables = Tables::build(&freq);
    table::decode_symbols(cursor, &tables, initial_state, original_len)
}
