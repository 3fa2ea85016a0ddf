//! Count aggregation.
//!
//! `CountTable` is a commutative monoid under `merge`, so partial tables
//! (combiners) can be merged in any grouping and order and still equal a
//! single pass over every emission (reducer).

use std::io::{self, Write};

use hashbrown::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountTable {
    counts: HashMap<String, u64>,
}

impl CountTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, label: &str, count: u64) {
        if let Some(total) = self.counts.get_mut(label) {
            *total += count;
        } else {
            self.counts.insert(label.to_string(), count);
        }
    }

    /// Fold another partial table into this one
    pub fn merge(self, other: CountTable) -> CountTable {
        // Iterate the smaller side
        let (mut into, from) = if self.counts.len() >= other.counts.len() {
            (self, other)
        } else {
            (other, self)
        };
        for (label, count) in from.counts {
            *into.counts.entry(label).or_insert(0) += count;
        }
        into
    }

    pub fn get(&self, label: &str) -> u64 {
        self.counts.get(label).copied().unwrap_or(0)
    }

    /// Number of distinct labels
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Entries sorted by label
    pub fn sorted(&self) -> Vec<(&str, u64)> {
        let mut entries: Vec<(&str, u64)> = self
            .counts
            .iter()
            .map(|(label, count)| (label.as_str(), *count))
            .collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        entries
    }

    /// Write one `label<separator>count` line per label, sorted by label
    pub fn write_to<W: Write>(&self, mut out: W, separator: &str) -> io::Result<()> {
        for (label, count) in self.sorted() {
            writeln!(out, "{}{}{}", label, separator, count)?;
        }
        out.flush()
    }
}

impl<S: AsRef<str>> FromIterator<(S, u64)> for CountTable {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        let mut table = CountTable::new();
        table.extend(iter);
        table
    }
}

impl<S: AsRef<str>> Extend<(S, u64)> for CountTable {
    fn extend<I: IntoIterator<Item = (S, u64)>>(&mut self, iter: I) {
        for (label, count) in iter {
            self.add(label.as_ref(), count);
        }
    }
}
