//! Disjoint half-open interval map over `i32` genomic coordinates with non-negative integer
//! weights. See `SPEC_FULL.md` §4.1. Ported from the split/merge/locate semantics of the
//! reference `imap.cc` (boost `interval_map`) onto a `BTreeMap` keyed by interval start.

use std::collections::BTreeMap;
use std::ops::Range;

use crate::errors::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    end: i32,
    weight: u32,
}

/// A mapping from disjoint `[l, r)` intervals to non-negative integer weights.
///
/// Adjacent entries with equal weight are never required to be coalesced, but every query
/// behaves as though they were (invariant 1, `SPEC_FULL.md` §8).
#[derive(Debug, Clone, Default)]
pub struct IntervalMap {
    // keyed by interval start; each entry's `end` is strictly greater than its key.
    entries: BTreeMap<i32, Entry>,
}

/// A stable handle to one entry of an `IntervalMap`, returned by the locate/boundary queries.
pub type Cursor = i32;

impl IntervalMap {
    pub fn new() -> Self {
        IntervalMap {
            entries: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Ordered iterator over `(range, weight)` entries.
    pub fn iter(&self) -> impl Iterator<Item = (Range<i32>, u32)> + '_ {
        self.entries.iter().map(|(&l, e)| (l..e.end, e.weight))
    }

    /// Additive merge: `[l, r)` contributes `+w` to every position it covers.
    pub fn add(&mut self, l: i32, r: i32, w: u32) -> Result<()> {
        self.merge(l, r, w as i64)
    }

    /// Subtractive merge: `[l, r)` removes `w` from every position it covers. Weights may
    /// saturate at zero rather than go negative; zero-weight entries may be pruned or retained.
    pub fn subtract(&mut self, l: i32, r: i32, w: u32) -> Result<()> {
        self.merge(l, r, -(w as i64))
    }

    fn merge(&mut self, l: i32, r: i32, delta: i64) -> Result<()> {
        if l >= r {
            return Err(Error::InvalidInterval { l, r });
        }
        self.split_at(l);
        self.split_at(r);

        // collect the starts of every entry fully inside [l, r) ...
        let covered: Vec<i32> = self
            .entries
            .range(l..r)
            .map(|(&start, _)| start)
            .collect();

        let mut cursor = l;
        for start in covered {
            let entry = self.entries.get(&start).copied().unwrap();
            if cursor < start {
                // gap with implicit weight 0: only meaningful for additive merges.
                if delta > 0 {
                    self.entries.insert(
                        cursor,
                        Entry {
                            end: start,
                            weight: delta as u32,
                        },
                    );
                }
            }
            let new_weight = (entry.weight as i64 + delta).max(0) as u32;
            self.entries.insert(
                start,
                Entry {
                    end: entry.end,
                    weight: new_weight,
                },
            );
            cursor = entry.end;
        }
        if cursor < r && delta > 0 {
            self.entries.insert(
                cursor,
                Entry {
                    end: r,
                    weight: delta as u32,
                },
            );
        }
        Ok(())
    }

    /// If some entry `[a, b)` with `a < p < b` exists, split it into `[a, p)` and `[p, b)` of the
    /// same weight. No-op if `p` lies on an existing boundary or outside every entry.
    pub fn split_at(&mut self, p: i32) {
        let found = self
            .entries
            .range(..p)
            .next_back()
            .filter(|(&start, e)| start < p && e.end > p)
            .map(|(&start, e)| (start, *e));

        if let Some((start, entry)) = found {
            self.entries.insert(
                start,
                Entry {
                    end: p,
                    weight: entry.weight,
                },
            );
            self.entries.insert(
                p,
                Entry {
                    end: entry.end,
                    weight: entry.weight,
                },
            );
        }
    }

    /// Weight of the entry containing `p`, or `0` if none.
    pub fn coverage_at(&self, p: i32) -> u32 {
        self.entries
            .range(..=p)
            .next_back()
            .filter(|(_, e)| e.end > p)
            .map(|(_, e)| e.weight)
            .unwrap_or(0)
    }

    /// First entry whose lower bound is `>= x`.
    pub fn locate_right(&self, x: i32) -> Option<Cursor> {
        self.entries.range(x..).next().map(|(&start, _)| start)
    }

    /// Last entry whose upper bound is `<= x`.
    pub fn locate_left(&self, x: i32) -> Option<Cursor> {
        // walk backward from the entry nearest x until one actually ends at or before x; a
        // single `next_back` is not enough since the nearest entry may straddle x.
        self.entries
            .range(..x)
            .rev()
            .find(|(_, e)| e.end <= x)
            .map(|(&start, _)| start)
    }

    /// Returns cursors bracketing every entry fully contained in `[x, y)`. Both are `None` if no
    /// such entry exists.
    pub fn boundary(&self, x: i32, y: i32) -> (Option<Cursor>, Option<Cursor>) {
        let lit = self
            .locate_right(x)
            .filter(|&start| self.entries[&start].end <= y);
        let rit = self
            .locate_left(y)
            .filter(|&start| start >= x);
        match (lit, rit) {
            (Some(l), Some(r)) => (Some(l), Some(r)),
            _ => (None, None),
        }
    }

    /// Total weighted length of entries from `lit` through `rit` inclusive.
    pub fn coverage_sum(&self, lit: Option<Cursor>, rit: Option<Cursor>) -> i64 {
        let (lit, rit) = match (lit, rit) {
            (Some(l), Some(r)) => (l, r),
            _ => return 0,
        };
        self.entries
            .range(lit..=rit)
            .map(|(&start, e)| ((e.end - start) as i64) * (e.weight as i64))
            .sum()
    }

    pub fn entry_at(&self, cursor: Cursor) -> Option<(Range<i32>, u32)> {
        self.entries.get(&cursor).map(|e| (cursor..e.end, e.weight))
    }

    /// Length-weighted mean and sample standard deviation of the weight over `[l, r)`, used to
    /// derive a partial exon's `ave`/`dev` (`SPEC_FULL.md` §3). Positions in `[l, r)` with no
    /// entry at all contribute weight `0`.
    pub fn stats(&self, l: i32, r: i32) -> (f64, f64) {
        if l >= r {
            return (0.0, 0.0);
        }
        let total_len = (r - l) as f64;
        let mut segments: Vec<(i32, u32)> = Vec::new(); // (length, weight)
        let mut cursor = l;
        for (&start, e) in self.entries.range(l..r) {
            if cursor < start {
                segments.push((start - cursor, 0));
            }
            let seg_end = e.end.min(r);
            segments.push((seg_end - start, e.weight));
            cursor = seg_end;
        }
        if cursor < r {
            segments.push((r - cursor, 0));
        }

        let mean = segments
            .iter()
            .map(|&(len, w)| len as f64 * w as f64)
            .sum::<f64>()
            / total_len;

        if total_len <= 1.0 {
            return (mean, 0.0);
        }
        let variance = segments
            .iter()
            .map(|&(len, w)| len as f64 * (w as f64 - mean).powi(2))
            .sum::<f64>()
            / (total_len - 1.0);
        (mean, variance.max(0.0).sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s1_interval_map_edits() {
        let mut m = IntervalMap::new();
        m.add(1, 3, 3).unwrap();
        m.add(1, 2, 1).unwrap();
        m.add(2, 5, 2).unwrap();
        m.add(6, 7, 3).unwrap();
        m.split_at(4);

        let entries: Vec<_> = m.iter().collect();
        assert_eq!(
            entries,
            vec![
                (1..2, 4),
                (2..3, 5),
                (3..4, 2),
                (4..5, 2),
                (6..7, 3),
            ]
        );
        assert_eq!(m.coverage_at(5), 0);

        let (lit, rit) = m.boundary(0, 8);
        assert_eq!(lit, Some(1));
        assert_eq!(rit, Some(6));

        let (all_lit, all_rit) = (m.locate_right(0), m.locate_left(100));
        assert_eq!(m.coverage_sum(all_lit, all_rit), 16);
    }

    #[test]
    fn add_then_subtract_is_idempotent() {
        let mut m = IntervalMap::new();
        m.add(10, 20, 5).unwrap();
        let before: Vec<_> = m.iter().collect();
        m.add(10, 20, 5).unwrap();
        m.subtract(10, 20, 5).unwrap();
        let after: Vec<_> = m.iter().filter(|(_, w)| *w > 0).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn locate_left_skips_a_straddling_neighbour() {
        let mut m = IntervalMap::new();
        m.add(0, 2, 1).unwrap();
        m.add(2, 4, 1).unwrap();
        m.add(4, 10, 1).unwrap();
        // the entry nearest x=5 is [4,10), which straddles x; locate_left must keep walking
        // back to [2,4), whose upper bound (4) is <= 5.
        assert_eq!(m.locate_left(5), Some(2));
    }

    #[test]
    fn invalid_interval_is_rejected() {
        let mut m = IntervalMap::new();
        assert_eq!(m.add(5, 5, 1), Err(Error::InvalidInterval { l: 5, r: 5 }));
        assert_eq!(m.add(5, 2, 1), Err(Error::InvalidInterval { l: 5, r: 2 }));
    }

    #[test]
    fn split_at_is_idempotent_and_commutes() {
        let mut m = IntervalMap::new();
        m.add(0, 100, 1).unwrap();
        m.split_at(30);
        m.split_at(30);
        m.split_at(70);
        let a: Vec<_> = m.iter().collect();

        let mut m2 = IntervalMap::new();
        m2.add(0, 100, 1).unwrap();
        m2.split_at(70);
        m2.split_at(30);
        let b: Vec<_> = m2.iter().collect();

        assert_eq!(a, b);
        assert_eq!(a, vec![(0..30, 1), (30..70, 1), (70..100, 1)]);
    }

    #[test]
    fn coverage_at_tracks_overlapping_adds() {
        let mut m = IntervalMap::new();
        for start in [1000, 1050, 1100, 1150, 1200] {
            m.add(start, start + 100, 1).unwrap();
        }
        assert_eq!(m.coverage_at(1200), 5);
        assert_eq!(m.coverage_at(999), 0);
        assert_eq!(m.coverage_at(1300), 0);
    }
}
