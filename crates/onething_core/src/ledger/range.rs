//! Borrowed, restartable date-range views over the ledger.

use crate::model::commitment::CommitmentEntry;
use chrono::NaiveDate;
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::iter::FusedIterator;

/// Inclusive `[from, to]` view over ledger entries, ordered by date ascending.
///
/// The view is `Copy`; every call to `iter()` starts a fresh pass.
#[derive(Debug, Clone, Copy)]
pub struct LedgerRange<'a> {
    entries: &'a BTreeMap<NaiveDate, CommitmentEntry>,
    from: NaiveDate,
    to: NaiveDate,
}

impl<'a> LedgerRange<'a> {
    pub(crate) fn new(
        entries: &'a BTreeMap<NaiveDate, CommitmentEntry>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Self {
        Self { entries, from, to }
    }

    pub fn from(&self) -> NaiveDate {
        self.from
    }

    pub fn to(&self) -> NaiveDate {
        self.to
    }

    /// Starts a new pass over the entries in range.
    pub fn iter(&self) -> RangeIter<'a> {
        // BTreeMap::range panics on inverted bounds.
        let inner = (self.from <= self.to).then(|| self.entries.range(self.from..=self.to));
        RangeIter { inner }
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

impl<'a> IntoIterator for LedgerRange<'a> {
    type Item = &'a CommitmentEntry;
    type IntoIter = RangeIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a> IntoIterator for &LedgerRange<'a> {
    type Item = &'a CommitmentEntry;
    type IntoIter = RangeIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator produced by `LedgerRange::iter`.
#[derive(Debug, Clone)]
pub struct RangeIter<'a> {
    inner: Option<btree_map::Range<'a, NaiveDate, CommitmentEntry>>,
}

impl<'a> Iterator for RangeIter<'a> {
    type Item = &'a CommitmentEntry;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.as_mut()?.next().map(|(_, entry)| entry)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner
            .as_ref()
            .map_or((0, Some(0)), |inner| inner.size_hint())
    }
}

impl DoubleEndedIterator for RangeIter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.as_mut()?.next_back().map(|(_, entry)| entry)
    }
}

impl FusedIterator for RangeIter<'_> {}
