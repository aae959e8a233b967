//! Cut pools for the localized variants.
//!
//! The committee holds the cuts currently backing master rows, seeded with
//! the first-stage linear constraints. Cuts that go inactive are evicted to
//! the `inactive` pool (and their master rows deleted by the caller), but
//! never below the baseline of seeded rows plus one slot per θ. Inactive
//! cuts that later become violated queue up for re-insertion, most violated
//! first.

use crate::cut::Cut;
use crate::ids::RowId;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

/// A committee member and the master row backing it. Seeded first-stage
/// mirrors carry no row id; their master rows are permanent.
#[derive(Debug, Clone)]
pub struct CommitteeEntry {
    pub cut: Arc<Cut>,
    pub row: Option<RowId>,
}

#[derive(Debug)]
struct ViolatingEntry {
    /// Violation magnitude (−gap); larger pops first.
    violation: f64,
    cut: Arc<Cut>,
}

impl PartialEq for ViolatingEntry {
    fn eq(&self, other: &Self) -> bool {
        self.violation == other.violation
    }
}

impl Eq for ViolatingEntry {}

impl PartialOrd for ViolatingEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ViolatingEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.violation
            .partial_cmp(&other.violation)
            .unwrap_or(Ordering::Equal)
    }
}

/// Committee / inactive / violating pools.
#[derive(Debug, Default)]
pub struct CutPools {
    committee: Vec<CommitteeEntry>,
    inactive: Vec<Arc<Cut>>,
    violating: BinaryHeap<ViolatingEntry>,
    baseline: usize,
}

impl CutPools {
    /// Seed the committee with the first-stage linear mirrors. The baseline
    /// is the seeded count plus one entry per θ slot.
    pub fn new(linear_cuts: Vec<Cut>, num_slots: usize) -> Self {
        let committee: Vec<CommitteeEntry> = linear_cuts
            .into_iter()
            .map(|cut| CommitteeEntry {
                cut: Arc::new(cut),
                row: None,
            })
            .collect();
        let baseline = committee.len() + num_slots;
        Self {
            committee,
            inactive: Vec::new(),
            violating: BinaryHeap::new(),
            baseline,
        }
    }

    /// Add a cut backed by a master row.
    pub fn insert(&mut self, cut: Arc<Cut>, row: RowId) {
        self.committee.push(CommitteeEntry {
            cut,
            row: Some(row),
        });
    }

    /// Evict committee entries that are neither active at `(x, θs)` nor part
    /// of the baseline. Scans by ascending index and stops once the
    /// committee is down to the baseline; evicted cuts move to `inactive`.
    /// Returns the master rows to delete.
    pub fn remove_inactive(&mut self, x: &[f64], thetas: &[f64], tau: f64) -> Vec<RowId> {
        let mut budget = self.committee.len().saturating_sub(self.baseline);
        if budget == 0 {
            return Vec::new();
        }

        let mut removed_rows = Vec::new();
        let mut kept = Vec::with_capacity(self.committee.len());
        for entry in self.committee.drain(..) {
            let evictable =
                budget > 0 && entry.row.is_some() && !entry.cut.active(x, thetas, tau);
            if evictable {
                budget -= 1;
                removed_rows.push(entry.row.expect("evictable entries carry a row"));
                self.inactive.push(entry.cut);
            } else {
                kept.push(entry);
            }
        }
        self.committee = kept;

        if !removed_rows.is_empty() {
            tracing::debug!(
                component = "committee",
                operation = "remove_inactive",
                status = "success",
                evicted = removed_rows.len(),
                committee = self.committee.len(),
                inactive = self.inactive.len(),
                "Evicted inactive cuts"
            );
        }
        removed_rows
    }

    /// Move violated inactive cuts into the priority queue, keyed by
    /// violation magnitude. Returns how many were queued.
    pub fn queue_violated(&mut self, x: &[f64], thetas: &[f64], tau: f64) -> usize {
        let mut queued = 0;
        let mut remaining = Vec::with_capacity(self.inactive.len());
        for cut in self.inactive.drain(..) {
            let gap = cut.gap(x, thetas);
            // An unpopulated θ reads as a +∞ gap; that is "not yet
            // comparable", not a violation worth re-inserting.
            if gap.is_finite() && cut.violated(x, thetas, tau) {
                self.violating.push(ViolatingEntry {
                    violation: -gap,
                    cut,
                });
                queued += 1;
            } else {
                remaining.push(cut);
            }
        }
        self.inactive = remaining;
        queued
    }

    /// Drain the violating queue, most violated first, for re-insertion.
    pub fn drain_violating(&mut self) -> Vec<Arc<Cut>> {
        let mut cuts = Vec::with_capacity(self.violating.len());
        while let Some(entry) = self.violating.pop() {
            cuts.push(entry.cut);
        }
        cuts
    }

    pub fn committee_len(&self) -> usize {
        self.committee.len()
    }

    pub fn inactive_len(&self) -> usize {
        self.inactive.len()
    }

    pub fn violating_len(&self) -> usize {
        self.violating.len()
    }

    pub fn baseline(&self) -> usize {
        self.baseline
    }
}
