//! Compact 2-bit sequence storage.
//!
//! [`PackedSequence`] stores four bases per byte. Symbols outside the alphabet
//! (`N`, IUPAC codes, gaps, anything else) occupy a zero slot in the packed
//! array and are recorded in a position-sorted exception table, so decoding
//! reproduces the normalized sequence exactly while storage stays proportional
//! to the number of bases rather than the raw text size.

use serde::{Deserialize, Serialize};

use crate::core::alphabet::{decode_base, encode_base, normalize_symbol};

const BASES_PER_BYTE: usize = 4;

/// A case-normalized sequence packed at 2 bits per base.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackedSequence {
    len: usize,
    packed: Vec<u8>,
    /// `(position, symbol)` for every non-ACGT symbol, sorted by position
    exceptions: Vec<(usize, u8)>,
}

impl PackedSequence {
    /// Create an empty sequence
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pack a raw byte sequence, upper-casing every symbol.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut seq = Self::new();
        seq.extend_from_slice(bytes);
        seq.shrink_to_fit();
        seq
    }

    /// Append raw symbols. Used by the parser one line at a time so a record
    /// never needs to exist as text in memory.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.packed
            .reserve((self.len + bytes.len()).div_ceil(BASES_PER_BYTE) - self.packed.len());
        for &raw in bytes {
            self.push(raw);
        }
    }

    fn push(&mut self, raw: u8) {
        let symbol = normalize_symbol(raw);
        let slot = self.len % BASES_PER_BYTE;
        if slot == 0 {
            self.packed.push(0);
        }
        match encode_base(symbol) {
            Some(code) => {
                if let Some(last) = self.packed.last_mut() {
                    *last |= code << (2 * slot);
                }
            }
            None => self.exceptions.push((self.len, symbol)),
        }
        self.len += 1;
    }

    /// Release spare capacity once a record is complete
    pub fn shrink_to_fit(&mut self) {
        self.packed.shrink_to_fit();
        self.exceptions.shrink_to_fit();
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of ambiguous symbols in the whole sequence
    pub fn ambiguous_count(&self) -> usize {
        self.exceptions.len()
    }

    /// Number of ambiguous symbols in `[start, end)`
    pub fn ambiguous_in(&self, start: usize, end: usize) -> usize {
        let lo = self.exceptions.partition_point(|&(pos, _)| pos < start);
        let hi = self.exceptions.partition_point(|&(pos, _)| pos < end);
        hi - lo
    }

    /// Approximate heap footprint in bytes
    pub fn heap_bytes(&self) -> usize {
        self.packed.capacity() + self.exceptions.capacity() * std::mem::size_of::<(usize, u8)>()
    }

    #[inline]
    fn packed_code(&self, pos: usize) -> u8 {
        (self.packed[pos / BASES_PER_BYTE] >> (2 * (pos % BASES_PER_BYTE))) & 0b11
    }

    /// Symbol at `pos`, or `None` past the end
    pub fn symbol_at(&self, pos: usize) -> Option<u8> {
        if pos >= self.len {
            return None;
        }
        match self.exceptions.binary_search_by_key(&pos, |&(p, _)| p) {
            Ok(i) => Some(self.exceptions[i].1),
            Err(_) => Some(decode_base(self.packed_code(pos))),
        }
    }

    /// Decode the full normalized sequence
    pub fn decode(&self) -> Vec<u8> {
        self.slice(0, self.len)
    }

    /// Decode `len` symbols starting at `start`, clamped to the sequence end.
    pub fn slice(&self, start: usize, len: usize) -> Vec<u8> {
        let start = start.min(self.len);
        let end = start.saturating_add(len).min(self.len);
        let mut out: Vec<u8> = (start..end)
            .map(|pos| decode_base(self.packed_code(pos)))
            .collect();

        let first = self.exceptions.partition_point(|&(pos, _)| pos < start);
        for &(pos, symbol) in self.exceptions[first..].iter().take_while(|&&(pos, _)| pos < end) {
            out[pos - start] = symbol;
        }
        out
    }

    /// Iterate the 2-bit codes of the whole sequence, `None` marking an ambiguous symbol.
    pub fn codes(&self) -> Codes<'_> {
        Codes {
            seq: self,
            pos: 0,
            next_exception: 0,
        }
    }
}

/// Iterator over the codes of a [`PackedSequence`]
pub struct Codes<'a> {
    seq: &'a PackedSequence,
    pos: usize,
    next_exception: usize,
}

impl Iterator for Codes<'_> {
    type Item = Option<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.seq.len {
            return None;
        }
        let pos = self.pos;
        self.pos += 1;

        if let Some(&(ex_pos, _)) = self.seq.exceptions.get(self.next_exception) {
            if ex_pos == pos {
                self.next_exception += 1;
                return Some(None);
            }
        }
        Some(Some(self.seq.packed_code(pos)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.seq.len - self.pos;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Codes<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_normalizes_case() {
        let seq = PackedSequence::from_bytes(b"acgtNNacgTRYk");
        assert_eq!(seq.len(), 13);
        assert_eq!(seq.decode(), b"ACGTNNACGTRYK");
        assert_eq!(seq.ambiguous_count(), 5);
    }

    #[test]
    fn test_packing_density() {
        let seq = PackedSequence::from_bytes(&[b'A'; 1000]);
        assert_eq!(seq.len(), 1000);
        assert!(seq.heap_bytes() <= 250 + 16);
    }

    #[test]
    fn test_incremental_extend_matches_from_bytes() {
        let mut seq = PackedSequence::new();
        seq.extend_from_slice(b"ACG");
        seq.extend_from_slice(b"TnA");
        seq.extend_from_slice(b"");
        seq.extend_from_slice(b"GGC");
        assert_eq!(seq, PackedSequence::from_bytes(b"ACGTNAGGC"));
    }

    #[test]
    fn test_slice_and_symbol_at() {
        let seq = PackedSequence::from_bytes(b"ACGTNACGT");
        assert_eq!(seq.slice(2, 4), b"GTNA");
        assert_eq!(seq.slice(7, 10), b"GT");
        assert_eq!(seq.slice(20, 3), b"");
        assert_eq!(seq.symbol_at(4), Some(b'N'));
        assert_eq!(seq.symbol_at(5), Some(b'A'));
        assert_eq!(seq.symbol_at(9), None);
        assert_eq!(seq.ambiguous_in(0, 4), 0);
        assert_eq!(seq.ambiguous_in(3, 5), 1);
    }

    #[test]
    fn test_codes_marks_ambiguous() {
        let seq = PackedSequence::from_bytes(b"ANCT");
        let codes: Vec<_> = seq.codes().collect();
        assert_eq!(codes, vec![Some(0), None, Some(1), Some(3)]);
        assert_eq!(seq.codes().len(), 4);
    }

    #[test]
    fn test_empty() {
        let seq = PackedSequence::from_bytes(b"");
        assert!(seq.is_empty());
        assert!(seq.decode().is_empty());
        assert_eq!(seq.codes().count(), 0);
    }
}
