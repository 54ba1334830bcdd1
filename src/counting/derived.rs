//! Tables derived from exact counts.
//!
//! [`CanonicalTable`] folds every k-mer together with its reverse complement,
//! which is how strand-agnostic composition profiles are usually compared. The
//! classes are ordered by their lexicographically smaller member. Over
//! nucleotides that gives `4^k / 2` classes for odd k and `(4^k + 4^(k/2)) / 2`
//! for even k (136 tetranucleotide classes); over the RY alphabet `2^k / 2` and
//! `(2^k + 2^(k/2)) / 2` (36 classes for k = 6, 528 for k = 10).
//!
//! The conditional (Markov) distribution lives on
//! [`KmerTable::conditional`](crate::counting::table::KmerTable::conditional).

use serde::Serialize;

use crate::core::alphabet::Alphabet;
use crate::counting::table::KmerTable;
use crate::counting::CountError;

/// Sorted representatives of the reverse-complement classes for `k`
pub fn canonical_classes(alphabet: Alphabet, k: usize) -> Vec<u64> {
    (0..alphabet.space(k))
        .filter(|&index| index <= alphabet.reverse_complement(index, k))
        .collect()
}

/// Counts per reverse-complement class
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalTable {
    pub k: usize,
    pub alphabet: Alphabet,
    /// Class representatives (smaller member), ascending
    pub representatives: Vec<u64>,
    /// `counts[i]` is the summed count of `representatives[i]` and its reverse complement
    pub counts: Vec<u64>,
}

impl CanonicalTable {
    /// Position of the class holding `index`
    pub fn class_of(&self, index: u64) -> Option<usize> {
        let rep = index.min(self.alphabet.reverse_complement(index, self.k));
        self.representatives.binary_search(&rep).ok()
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Counts normalized to sum to one; all zeros when nothing was counted
    pub fn distribution(&self) -> Vec<f64> {
        let total = self.total();
        self.counts
            .iter()
            .map(|&n| if total == 0 { 0.0 } else { n as f64 / total as f64 })
            .collect()
    }

    /// Quotient profile against the folded table one k shorter.
    ///
    /// Each class frequency is divided by the product of the frequencies of its
    /// two (k-1)-mers (the leading and the trailing one), then the result is
    /// renormalized to sum to one. A class whose sub-words were never seen keeps
    /// its plain frequency. Entries line up with `representatives`.
    ///
    /// # Errors
    ///
    /// Returns `CountError::KMismatch` unless `shorter.k == self.k - 1` and
    /// `CountError::AlphabetMismatch` if the tables use different alphabets.
    pub fn quotient(&self, shorter: &CanonicalTable) -> Result<Vec<f64>, CountError> {
        if shorter.k + 1 != self.k {
            return Err(CountError::KMismatch {
                left: self.k,
                right: shorter.k,
            });
        }
        if shorter.alphabet != self.alphabet {
            return Err(CountError::AlphabetMismatch {
                left: self.alphabet,
                right: shorter.alphabet,
            });
        }

        let sub = shorter.distribution();
        let frequency = |index: u64| shorter.class_of(index).map_or(0.0, |c| sub[c]);
        let bits = self.alphabet.bits();
        let sub_mask = self.alphabet.mask(shorter.k);

        let mut values: Vec<f64> = self
            .representatives
            .iter()
            .zip(self.distribution())
            .map(|(&rep, f)| {
                let denom = frequency(rep >> bits) * frequency(rep & sub_mask);
                if denom > 0.0 {
                    f / denom
                } else {
                    f
                }
            })
            .collect();

        let sum: f64 = values.iter().sum();
        if sum > 0.0 {
            values.iter_mut().for_each(|v| *v /= sum);
        }
        Ok(values)
    }
}

impl KmerTable {
    /// Fold the table by reverse complement. `None` when k is above the
    /// alphabet's [`max_dense_k`](Alphabet::max_dense_k).
    ///
    /// A palindromic k-mer is its own class and is counted once.
    pub fn canonical(&self) -> Option<CanonicalTable> {
        let k = self.k();
        let alphabet = self.alphabet();
        if k > alphabet.max_dense_k() {
            return None;
        }
        let representatives = canonical_classes(alphabet, k);
        let mut table = CanonicalTable {
            k,
            alphabet,
            counts: vec![0; representatives.len()],
            representatives,
        };
        for (index, n) in self.iter_nonzero() {
            if let Some(class) = table.class_of(index) {
                table.counts[class] += n;
            }
        }
        Some(table)
    }
}
