use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::alphabet::Alphabet;
use crate::counting::CountError;

/// Count storage for one k.
///
/// Both variants describe the same logical sequence of `size^k` counters in
/// canonical (lexicographic) k-mer order; the sparse form only stores non-zero
/// entries and is used when a dense vector would be too large.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Counts {
    Dense(Vec<u64>),
    Sparse(BTreeMap<u64, u64>),
}

/// Exact k-mer occurrence counts for one k.
///
/// Two tables are equal when they hold the same counts over the same alphabet
/// and k, whichever storage each uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KmerTable {
    k: usize,
    #[serde(default)]
    alphabet: Alphabet,
    total: u64,
    counts: Counts,
}

impl KmerTable {
    /// Empty dense nucleotide table with `4^k` zeroed counters
    pub fn dense(k: usize) -> Self {
        Self::new(Alphabet::Nucleotide, k, true)
    }

    /// Empty sparse nucleotide table
    pub fn sparse(k: usize) -> Self {
        Self::new(Alphabet::Nucleotide, k, false)
    }

    /// Empty table over `alphabet`. Callers bound `k` for dense tables
    /// (see [`Alphabet::max_dense_k`]).
    pub fn new(alphabet: Alphabet, k: usize, dense: bool) -> Self {
        let counts = if dense {
            Counts::Dense(vec![0; alphabet.space(k) as usize])
        } else {
            Counts::Sparse(BTreeMap::new())
        };
        Self {
            k,
            alphabet,
            total: 0,
            counts,
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn alphabet(&self) -> Alphabet {
        self.alphabet
    }

    /// Logical length, `size^k`
    pub fn len(&self) -> u64 {
        self.alphabet.space(self.k)
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Sum of all counts, i.e. the number of valid windows seen
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn is_dense(&self) -> bool {
        matches!(self.counts, Counts::Dense(_))
    }

    pub fn counts(&self) -> &Counts {
        &self.counts
    }

    /// Count at a canonical index. Indices past `size^k` read as zero.
    pub fn get(&self, index: u64) -> u64 {
        match &self.counts {
            Counts::Dense(v) => usize::try_from(index)
                .ok()
                .and_then(|i| v.get(i))
                .copied()
                .unwrap_or(0),
            Counts::Sparse(m) => m.get(&index).copied().unwrap_or(0),
        }
    }

    /// Count of a k-mer given as text, `None` if it is not a valid k-mer of this length
    pub fn get_kmer(&self, kmer: &[u8]) -> Option<u64> {
        if kmer.len() != self.k {
            return None;
        }
        self.alphabet.index(kmer).map(|index| self.get(index))
    }

    /// Add `n` occurrences of the k-mer at `index`.
    ///
    /// # Errors
    ///
    /// Returns `CountError::IndexOutOfRange` if `index` is not below `size^k`;
    /// the table is left unchanged.
    pub fn add(&mut self, index: u64, n: u64) -> Result<(), CountError> {
        let len = self.len();
        if index >= len {
            return Err(CountError::IndexOutOfRange { index, len });
        }
        if n == 0 {
            return Ok(());
        }
        match &mut self.counts {
            Counts::Dense(v) => v[index as usize] += n,
            Counts::Sparse(m) => *m.entry(index).or_insert(0) += n,
        }
        self.total += n;
        Ok(())
    }

    /// Count one occurrence. `index` comes from a masked rolling code.
    #[inline]
    pub(crate) fn increment(&mut self, index: u64) {
        debug_assert!(index < self.len());
        match &mut self.counts {
            Counts::Dense(v) => v[index as usize] += 1,
            Counts::Sparse(m) => *m.entry(index).or_insert(0) += 1,
        }
        self.total += 1;
    }

    /// Add another table's counts index by index.
    ///
    /// Summation is commutative and associative, so the result does not depend on
    /// the order partial tables are merged in. The representation of `self` is kept.
    ///
    /// # Errors
    ///
    /// Returns `CountError::KMismatch` if the tables are for different k,
    /// `CountError::AlphabetMismatch` if they count different alphabets, and
    /// `CountError::IndexOutOfRange` if `other` holds an impossible index.
    pub fn merge(&mut self, other: &KmerTable) -> Result<(), CountError> {
        if self.k != other.k {
            return Err(CountError::KMismatch {
                left: self.k,
                right: other.k,
            });
        }
        if self.alphabet != other.alphabet {
            return Err(CountError::AlphabetMismatch {
                left: self.alphabet,
                right: other.alphabet,
            });
        }
        if let (Counts::Dense(a), Counts::Dense(b)) = (&mut self.counts, &other.counts) {
            for (x, y) in a.iter_mut().zip(b) {
                *x += y;
            }
            self.total += other.total;
            return Ok(());
        }
        for (index, n) in other.iter_nonzero() {
            self.add(index, n)?;
        }
        Ok(())
    }

    /// Every counter in canonical order, zeros included.
    ///
    /// For a sparse table this still yields `size^k` items; prefer
    /// [`iter_nonzero`](Self::iter_nonzero) for large k.
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        (0..self.len()).map(move |index| self.get(index))
    }

    /// `(index, count)` for every non-zero counter, in canonical order
    pub fn iter_nonzero(&self) -> Box<dyn Iterator<Item = (u64, u64)> + '_> {
        match &self.counts {
            Counts::Dense(v) => Box::new(
                v.iter()
                    .enumerate()
                    .filter(|&(_, &n)| n > 0)
                    .map(|(i, &n)| (i as u64, n)),
            ),
            Counts::Sparse(m) => Box::new(m.iter().filter(|&(_, &n)| n > 0).map(|(&i, &n)| (i, n))),
        }
    }

    /// Counts normalized by the table total. An empty table yields all zeros.
    pub fn distribution(&self) -> Distribution {
        let total = self.total as f64;
        let scale = |n: u64| if self.total == 0 { 0.0 } else { n as f64 / total };
        match &self.counts {
            Counts::Dense(v) => Distribution::Dense(v.iter().map(|&n| scale(n)).collect()),
            Counts::Sparse(m) => {
                Distribution::Sparse(m.iter().map(|(&i, &n)| (i, scale(n))).collect())
            }
        }
    }

    /// Order-(k-1) Markov transition probabilities.
    ///
    /// Entry `i` is `P(last symbol | first k-1 symbols)`: the count of k-mer `i`
    /// divided by the summed counts of the k-mers sharing its first k-1
    /// symbols. Prefixes never observed give zero. For k = 1 this is the plain
    /// symbol composition.
    pub fn conditional(&self) -> Distribution {
        let size = self.alphabet.size();
        let width = size as u64;
        match &self.counts {
            Counts::Dense(v) => Distribution::Dense(
                v.chunks(size)
                    .flat_map(|siblings| {
                        let sum: u64 = siblings.iter().sum();
                        siblings.iter().map(move |&n| {
                            if sum == 0 {
                                0.0
                            } else {
                                n as f64 / sum as f64
                            }
                        })
                    })
                    .collect(),
            ),
            Counts::Sparse(m) => {
                let mut prefix_sums: BTreeMap<u64, u64> = BTreeMap::new();
                for (&i, &n) in m {
                    *prefix_sums.entry(i / width).or_insert(0) += n;
                }
                Distribution::Sparse(
                    m.iter()
                        .filter(|&(_, &n)| n > 0)
                        .map(|(&i, &n)| {
                            let sum = prefix_sums.get(&(i / width)).copied().unwrap_or(0);
                            (i, if sum == 0 { 0.0 } else { n as f64 / sum as f64 })
                        })
                        .collect(),
                )
            }
        }
    }
}

impl PartialEq for KmerTable {
    fn eq(&self, other: &Self) -> bool {
        self.k == other.k
            && self.alphabet == other.alphabet
            && self.total == other.total
            && self.iter_nonzero().eq(other.iter_nonzero())
    }
}

impl Eq for KmerTable {}

/// Probabilities over the `size^k` canonical k-mer indices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Distribution {
    Dense(Vec<f64>),
    Sparse(BTreeMap<u64, f64>),
}

impl Distribution {
    pub fn get(&self, index: u64) -> f64 {
        match self {
            Self::Dense(v) => usize::try_from(index)
                .ok()
                .and_then(|i| v.get(i))
                .copied()
                .unwrap_or(0.0),
            Self::Sparse(m) => m.get(&index).copied().unwrap_or(0.0),
        }
    }

    pub fn sum(&self) -> f64 {
        match self {
            Self::Dense(v) => v.iter().sum(),
            Self::Sparse(m) => m.values().sum(),
        }
    }
}
