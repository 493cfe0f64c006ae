//! Best-effort mapping from a content conflict to lines of a live document.
//!
//! Positional: commit texts are compared index by index, and each divergence
//! point is looked up in the document near the same index. Line numbers are a
//! hint for highlighting, not a merge result.

use std::collections::BTreeSet;

use tracing::debug;

use crate::models::{Evidence, LineLocation, LineRange};

/// Default number of lines searched on each side of a divergence point.
pub const DEFAULT_SEARCH_WINDOW: usize = 5;

#[derive(Debug, Clone, Copy)]
pub struct LineConflictLocator {
    search_window: usize,
}

impl Default for LineConflictLocator {
    fn default() -> Self {
        Self::new(DEFAULT_SEARCH_WINDOW)
    }
}

/// One index where base, current and target all disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DivergencePoint<'a> {
    pub index: usize,
    pub current: Option<&'a str>,
    pub target: Option<&'a str>,
}

impl LineConflictLocator {
    pub fn new(search_window: usize) -> Self {
        Self { search_window }
    }

    pub fn search_window(&self) -> usize {
        self.search_window
    }

    /// Indexes where the three versions are pairwise distinct. A line past
    /// the end of a version is `None`, which differs from every text line.
    pub fn divergence_points<'a>(
        base: &'a str,
        current: &'a str,
        target: &'a str,
    ) -> Vec<DivergencePoint<'a>> {
        let base: Vec<&str> = base.lines().collect();
        let current: Vec<&str> = current.lines().collect();
        let target: Vec<&str> = target.lines().collect();
        let len = base.len().max(current.len()).max(target.len());

        (0..len)
            .filter_map(|i| {
                let b = base.get(i).copied();
                let c = current.get(i).copied();
                let t = target.get(i).copied();
                (b != c && b != t && c != t).then_some(DivergencePoint {
                    index: i,
                    current: c,
                    target: t,
                })
            })
            .collect()
    }

    /// Locate the conflict described by `evidence` in `document`.
    pub fn locate(&self, evidence: &Evidence, document: &str) -> LineLocation {
        let doc: Vec<&str> = document.lines().collect();
        let points = Self::divergence_points(
            &evidence.base_text,
            &evidence.current_text,
            &evidence.target_text,
        );

        let mut matched = BTreeSet::new();
        for point in &points {
            if let Some(line) = self.find_near(&doc, point) {
                matched.insert(line);
            }
        }

        debug!(
            divergences = points.len(),
            matched = matched.len(),
            "located conflict lines"
        );
        if matched.is_empty() {
            return LineLocation::WholeDocument {
                line_count: doc.len(),
            };
        }
        LineLocation::Lines {
            ranges: coalesce(matched),
        }
    }

    /// Nearest document line within the window whose trimmed text equals the
    /// trimmed current or target line. Ties go to the earlier line.
    fn find_near(&self, doc: &[&str], point: &DivergencePoint<'_>) -> Option<usize> {
        let wanted: Vec<&str> = [point.current, point.target]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        if wanted.is_empty() {
            return None;
        }

        let is_match = |i: usize| {
            doc.get(i)
                .map(|l| l.trim())
                .is_some_and(|l| !l.is_empty() && wanted.contains(&l))
        };

        (0..=self.search_window).find_map(|offset| {
            let before = point.index.checked_sub(offset).filter(|&i| is_match(i));
            let after = (offset > 0)
                .then(|| point.index + offset)
                .filter(|&i| is_match(i));
            before.or(after)
        })
    }
}

/// Sorted, deduplicated line indexes folded into inclusive ranges.
fn coalesce(lines: BTreeSet<usize>) -> Vec<LineRange> {
    let mut ranges: Vec<LineRange> = Vec::new();
    for line in lines {
        match ranges.last_mut() {
            Some(last) if last.end + 1 == line => last.end = line,
            _ => ranges.push(LineRange {
                start: line,
                end: line,
            }),
        }
    }
    ranges
}
