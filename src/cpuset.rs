//! Dense integer set of CPU identifiers with range-compact parsing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const BITS: u32 = 64;

/// A hardware thread identifier, as seen by the OS.
pub type Cpu = u32;

/// An unordered set of CPUs, backed by a word-per-64-CPUs bitmap.
///
/// `list()` and `unsorted_list()` differ only in whether the caller is
/// promised an ascending order; both are O(n) in the number of set bits.
#[derive(Clone, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct CpuSet {
    words: Vec<u64>,
}

impl CpuSet {
    pub fn new() -> Self {
        CpuSet { words: Vec::new() }
    }

    pub fn singleton(cpu: Cpu) -> Self {
        let mut set = CpuSet::new();
        set.insert(cpu);
        set
    }

    pub fn from_iter<I: IntoIterator<Item = Cpu>>(iter: I) -> Self {
        let mut set = CpuSet::new();
        for cpu in iter {
            set.insert(cpu);
        }
        set
    }

    fn ensure_word(&mut self, word_idx: usize) {
        if self.words.len() <= word_idx {
            self.words.resize(word_idx + 1, 0);
        }
    }

    pub fn insert(&mut self, cpu: Cpu) {
        let word = (cpu / BITS) as usize;
        let bit = cpu % BITS;
        self.ensure_word(word);
        self.words[word] |= 1u64 << bit;
    }

    pub fn remove(&mut self, cpu: Cpu) {
        let word = (cpu / BITS) as usize;
        if let Some(w) = self.words.get_mut(word) {
            *w &= !(1u64 << (cpu % BITS));
        }
    }

    pub fn contains(&self, cpu: Cpu) -> bool {
        let word = (cpu / BITS) as usize;
        self.words
            .get(word)
            .map(|w| (w >> (cpu % BITS)) & 1 == 1)
            .unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Ascending list of member CPUs.
    pub fn list(&self) -> Vec<Cpu> {
        let mut out = self.unsorted_list();
        out.sort_unstable();
        out
    }

    /// Member CPUs in bitmap-word order. Callers must not depend on any
    /// particular order beyond what `list()` promises.
    pub fn unsorted_list(&self) -> Vec<Cpu> {
        let mut out = Vec::with_capacity(self.len());
        for (word_idx, word) in self.words.iter().enumerate() {
            let mut w = *word;
            while w != 0 {
                let bit = w.trailing_zeros();
                out.push(word_idx as u32 * BITS + bit);
                w &= w - 1;
            }
        }
        out
    }

    fn zip_words<'a>(&'a self, other: &'a CpuSet) -> impl Iterator<Item = (u64, u64)> + 'a {
        let len = self.words.len().max(other.words.len());
        (0..len).map(move |i| {
            (
                self.words.get(i).copied().unwrap_or(0),
                other.words.get(i).copied().unwrap_or(0),
            )
        })
    }

    pub fn union(&self, other: &CpuSet) -> CpuSet {
        CpuSet {
            words: self.zip_words(other).map(|(a, b)| a | b).collect(),
        }
    }

    pub fn intersection(&self, other: &CpuSet) -> CpuSet {
        CpuSet {
            words: self.zip_words(other).map(|(a, b)| a & b).collect(),
        }
    }

    pub fn difference(&self, other: &CpuSet) -> CpuSet {
        CpuSet {
            words: self.zip_words(other).map(|(a, b)| a & !b).collect(),
        }
    }

    pub fn is_subset_of(&self, other: &CpuSet) -> bool {
        self.zip_words(other).all(|(a, b)| a & !b == 0)
    }

    pub fn is_disjoint(&self, other: &CpuSet) -> bool {
        self.zip_words(other).all(|(a, b)| a & b == 0)
    }

    pub fn union_in_place(&mut self, other: &CpuSet) {
        *self = self.union(other);
    }
}

impl fmt::Debug for CpuSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CpuSet({})", self)
    }
}

/// Formats as ascending range-compact notation, e.g. `0-3,8,10-11`.
impl fmt::Display for CpuSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cpus = self.list();
        if cpus.is_empty() {
            return Ok(());
        }
        let mut ranges: Vec<(Cpu, Cpu)> = Vec::new();
        for cpu in cpus {
            match ranges.last_mut() {
                Some((_, end)) if *end + 1 == cpu => *end = cpu,
                _ => ranges.push((cpu, cpu)),
            }
        }
        let rendered: Vec<String> = ranges
            .into_iter()
            .map(|(start, end)| {
                if start == end {
                    start.to_string()
                } else {
                    format!("{}-{}", start, end)
                }
            })
            .collect();
        write!(f, "{}", rendered.join(","))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid CPU set notation: {0}")]
pub struct ParseCpuSetError(String);

impl FromStr for CpuSet {
    type Err = ParseCpuSetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut set = CpuSet::new();
        let s = s.trim();
        if s.is_empty() {
            return Ok(set);
        }
        for part in s.split(',') {
            let part = part.trim();
            if let Some((start, end)) = part.split_once('-') {
                let start: Cpu = start
                    .trim()
                    .parse()
                    .map_err(|_| ParseCpuSetError(s.to_string()))?;
                let end: Cpu = end
                    .trim()
                    .parse()
                    .map_err(|_| ParseCpuSetError(s.to_string()))?;
                if start > end {
                    return Err(ParseCpuSetError(s.to_string()));
                }
                for cpu in start..=end {
                    set.insert(cpu);
                }
            } else {
                let cpu: Cpu = part.parse().map_err(|_| ParseCpuSetError(s.to_string()))?;
                set.insert(cpu);
            }
        }
        Ok(set)
    }
}

impl FromIterator<Cpu> for CpuSet {
    fn from_iter<I: IntoIterator<Item = Cpu>>(iter: I) -> Self {
        CpuSet::from_iter(iter)
    }
}
