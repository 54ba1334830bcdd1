//! Nucleotide alphabet and k-mer index arithmetic.
//!
//! Bases are ordered lexicographically and encoded in 2 bits:
//!
//! | Base | Code |
//! |------|------|
//! | A    | 00   |
//! | C    | 01   |
//! | G    | 10   |
//! | T    | 11   |
//!
//! A k-mer maps to the integer whose base-4 digits are its codes, first base most
//! significant. Sorting k-mers by index therefore sorts them lexicographically, and
//! the complement of a code is `3 - code` (`code ^ 0b11`).
//!
//! Counting can also run over the reduced purine/pyrimidine ([`Alphabet::Ry`])
//! alphabet, where `A`/`G` read as `R = 0` and `C`/`T` as `Y = 1`. That is the
//! low bit of the nucleotide code, and complementing flips it.

use serde::{Deserialize, Serialize};

/// Number of symbols in the alphabet.
pub const ALPHABET_SIZE: usize = 4;

/// Bases in canonical order.
pub const BASES: [u8; ALPHABET_SIZE] = [b'A', b'C', b'G', b'T'];

/// Largest k whose rolling code fits in a `u64` with room to shift.
pub const MAX_SUPPORTED_K: usize = 31;

/// 256-entry lookup: ASCII -> 2-bit code, 0xFF for anything outside `ACGTacgt`.
static CODE_LUT: [u8; 256] = {
    const X: u8 = 0xFF;
    let mut t = [X; 256];
    t[b'A' as usize] = 0;
    t[b'a' as usize] = 0;
    t[b'C' as usize] = 1;
    t[b'c' as usize] = 1;
    t[b'G' as usize] = 2;
    t[b'g' as usize] = 2;
    t[b'T' as usize] = 3;
    t[b't' as usize] = 3;
    t
};

/// Encode a base to its 2-bit code. `None` for ambiguous symbols.
#[inline]
#[must_use]
pub fn encode_base(base: u8) -> Option<u8> {
    let code = CODE_LUT[base as usize];
    (code <= 3).then_some(code)
}

/// Decode a 2-bit code to an upper-case base.
#[inline]
#[must_use]
pub const fn decode_base(code: u8) -> u8 {
    BASES[(code & 0b11) as usize]
}

/// Upper-case a raw symbol. Every stored sequence goes through this.
#[inline]
#[must_use]
pub const fn normalize_symbol(symbol: u8) -> u8 {
    symbol.to_ascii_uppercase()
}

/// Number of distinct k-mers, `4^k`.
#[inline]
#[must_use]
pub const fn kmer_space(k: usize) -> u64 {
    1u64 << (2 * k)
}

/// Mask selecting the low `2k` bits of a rolling code.
#[inline]
#[must_use]
pub const fn kmer_mask(k: usize) -> u64 {
    kmer_space(k) - 1
}

/// Index of a k-mer given as bytes. `None` if it contains an ambiguous symbol
/// or is longer than [`MAX_SUPPORTED_K`].
#[must_use]
pub fn kmer_index(kmer: &[u8]) -> Option<u64> {
    Alphabet::Nucleotide.index(kmer)
}

/// Spell out the k-mer at `index`.
#[must_use]
pub fn kmer_from_index(index: u64, k: usize) -> Vec<u8> {
    (0..k)
        .rev()
        .map(|i| decode_base(((index >> (2 * i)) & 0b11) as u8))
        .collect()
}

/// Reverse complement of a k-mer index.
#[must_use]
pub fn reverse_complement(index: u64, k: usize) -> u64 {
    Alphabet::Nucleotide.reverse_complement(index, k)
}

/// Symbol set k-mers are counted over
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alphabet {
    /// `A < C < G < T`, 2 bits per symbol
    #[default]
    Nucleotide,
    /// Purine (`R`: A, G) `<` pyrimidine (`Y`: C, T), 1 bit per symbol
    Ry,
}

impl Alphabet {
    #[inline]
    #[must_use]
    pub const fn bits(self) -> usize {
        match self {
            Self::Nucleotide => 2,
            Self::Ry => 1,
        }
    }

    /// Number of symbols
    #[inline]
    #[must_use]
    pub const fn size(self) -> usize {
        1 << self.bits()
    }

    /// Number of distinct k-mers, `size^k`
    #[inline]
    #[must_use]
    pub const fn space(self, k: usize) -> u64 {
        1u64 << (self.bits() * k)
    }

    /// Mask selecting the low `bits * k` bits of a rolling code
    #[inline]
    #[must_use]
    pub const fn mask(self, k: usize) -> u64 {
        self.space(k) - 1
    }

    /// Largest k whose dense table stays within `4^MAX_DENSE_NUCLEOTIDE_K` counters
    #[must_use]
    pub const fn max_dense_k(self) -> usize {
        2 * MAX_DENSE_NUCLEOTIDE_K / self.bits()
    }

    /// Map a 2-bit nucleotide code into this alphabet
    #[inline]
    #[must_use]
    pub const fn from_nucleotide(self, code: u8) -> u8 {
        match self {
            Self::Nucleotide => code,
            Self::Ry => code & 1,
        }
    }

    /// Encode a raw symbol. `None` for ambiguous symbols.
    #[inline]
    #[must_use]
    pub fn encode(self, symbol: u8) -> Option<u8> {
        encode_base(symbol).map(|code| self.from_nucleotide(code))
    }

    /// Symbols in canonical order
    #[must_use]
    pub const fn symbols(self) -> &'static [u8] {
        match self {
            Self::Nucleotide => &BASES,
            Self::Ry => b"RY",
        }
    }

    /// Index of a k-mer given as nucleotides. `None` if it contains an ambiguous
    /// symbol or is longer than [`MAX_SUPPORTED_K`].
    #[must_use]
    pub fn index(self, kmer: &[u8]) -> Option<u64> {
        if kmer.is_empty() || kmer.len() > MAX_SUPPORTED_K {
            return None;
        }
        let bits = self.bits();
        kmer.iter().try_fold(0u64, |acc, &b| {
            self.encode(b).map(|code| (acc << bits) | u64::from(code))
        })
    }

    /// Spell out the k-mer at `index` in this alphabet's symbols
    #[must_use]
    pub fn spell(self, index: u64, k: usize) -> Vec<u8> {
        let bits = self.bits();
        let symbols = self.symbols();
        (0..k)
            .rev()
            .map(|i| symbols[((index >> (bits * i)) & self.mask(1)) as usize])
            .collect()
    }

    /// Reverse complement of a k-mer index
    #[must_use]
    pub fn reverse_complement(self, index: u64, k: usize) -> u64 {
        let bits = self.bits();
        let mask = self.mask(1);
        let mut fwd = index;
        let mut rc = 0u64;
        for _ in 0..k {
            rc = (rc << bits) | ((fwd & mask) ^ mask);
            fwd >>= bits;
        }
        rc
    }
}

/// Dense tables are capped at `4^12` counters (128 MiB of `u64`) per table.
pub const MAX_DENSE_NUCLEOTIDE_K: usize = 12;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_base() {
        for (code, &base) in BASES.iter().enumerate() {
            assert_eq!(encode_base(base), Some(code as u8));
            assert_eq!(encode_base(base.to_ascii_lowercase()), Some(code as u8));
            assert_eq!(decode_base(code as u8), base);
        }
        assert_eq!(encode_base(b'N'), None);
        assert_eq!(encode_base(b'U'), None);
        assert_eq!(encode_base(b'-'), None);
    }

    #[test]
    fn test_kmer_index_is_lexicographic() {
        assert_eq!(kmer_index(b"AA"), Some(0));
        assert_eq!(kmer_index(b"AC"), Some(1));
        assert_eq!(kmer_index(b"CA"), Some(4));
        assert_eq!(kmer_index(b"TT"), Some(15));
        assert_eq!(kmer_index(b"acgt"), Some(0b00_01_10_11));
        assert_eq!(kmer_index(b"ANA"), None);
        assert_eq!(kmer_index(b""), None);
    }

    #[test]
    fn test_kmer_from_index() {
        assert_eq!(kmer_from_index(0, 3), b"AAA");
        assert_eq!(kmer_from_index(0b00_01_10_11, 4), b"ACGT");
        assert_eq!(kmer_from_index(kmer_index(b"GATTACA").unwrap(), 7), b"GATTACA");
    }

    #[test]
    fn test_reverse_complement() {
        let k = 4;
        let rc = reverse_complement(kmer_index(b"AACG").unwrap(), k);
        assert_eq!(kmer_from_index(rc, k), b"CGTT");
        // ACGT is its own reverse complement
        let acgt = kmer_index(b"ACGT").unwrap();
        assert_eq!(reverse_complement(acgt, k), acgt);
    }

    #[test]
    fn test_kmer_space() {
        assert_eq!(kmer_space(1), 4);
        assert_eq!(kmer_space(4), 256);
        assert_eq!(kmer_mask(2), 0b1111);
        assert_eq!(kmer_space(MAX_SUPPORTED_K), 1u64 << 62);
    }

    #[test]
    fn test_ry_alphabet() {
        let ry = Alphabet::Ry;
        assert_eq!(ry.encode(b'A'), Some(0));
        assert_eq!(ry.encode(b'g'), Some(0));
        assert_eq!(ry.encode(b'C'), Some(1));
        assert_eq!(ry.encode(b'T'), Some(1));
        assert_eq!(ry.encode(b'N'), None);
        assert_eq!(ry.space(6), 64);
        assert_eq!(ry.index(b"AGCTAG"), Some(0b001100));
        assert_eq!(ry.spell(0b001100, 6), b"RRYYRR");
        assert_eq!(ry.max_dense_k(), 24);
        assert_eq!(Alphabet::Nucleotide.max_dense_k(), 12);
    }

    #[test]
    fn test_ry_reverse_complement() {
        let ry = Alphabet::Ry;
        // RRRYYY reversed is YYYRRR, complemented back to RRRYYY
        assert_eq!(ry.reverse_complement(0b000111, 6), 0b000111);
        assert_eq!(ry.reverse_complement(0b001111, 6), 0b000011);
        assert_eq!(ry.reverse_complement(0b011111, 6), 0b000001);
        let agcttcc = ry.index(b"AGCTTCC").unwrap();
        let rc = ry.index(b"GGAAGCT").unwrap();
        assert_eq!(ry.reverse_complement(agcttcc, 7), rc);
    }
}
