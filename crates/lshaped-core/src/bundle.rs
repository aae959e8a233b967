//! Aggregation of optimality cuts into θ slots.
//!
//! Subproblem `i` maps statically to slot `⌊i/B⌋`, so bundles always hold
//! disjoint subproblems and the slot layout is identical no matter in which
//! order cuts arrive. The aggregate sums member coefficients and constants
//! and carries the slot index as its id.
//!
//! Non-optimality cuts bypass bundling and poison their slot: an aggregate
//! missing a member is no lower bound on the slot's recourse sum, so a
//! poisoned bundle never emits.

use crate::cut::{Cut, Hyperplane, SparseVec};
use std::collections::BTreeMap;

/// Static subproblem → slot mapping.
#[derive(Debug, Clone, Copy)]
pub struct Bundler {
    bundle_size: usize,
    num_subproblems: usize,
}

impl Bundler {
    /// Build a mapping for `num_subproblems` with requested bundle size `B`.
    /// `B` is clamped to `[1, num_subproblems]`.
    pub fn new(bundle_size: usize, num_subproblems: usize) -> Self {
        let bundle_size = bundle_size.max(1).min(num_subproblems.max(1));
        Self {
            bundle_size,
            num_subproblems,
        }
    }

    pub fn bundle_size(&self) -> usize {
        self.bundle_size
    }

    /// Number of θ slots (= number of bundles).
    pub fn num_slots(&self) -> usize {
        self.num_subproblems.div_ceil(self.bundle_size)
    }

    /// Slot owning a subproblem.
    pub fn slot_of(&self, subproblem: usize) -> usize {
        subproblem / self.bundle_size
    }

    /// Number of subproblems mapped to a slot (the last slot may be short).
    pub fn slot_size(&self, slot: usize) -> usize {
        let start = slot * self.bundle_size;
        let end = (start + self.bundle_size).min(self.num_subproblems);
        end.saturating_sub(start)
    }
}

/// A partially accumulated aggregate for one slot.
#[derive(Debug, Clone)]
pub struct CutBundle {
    /// Slot index; becomes the aggregate's id.
    pub slot: usize,
    /// Members expected before the aggregate is complete.
    pub expected: usize,
    /// Members received so far.
    pub count: usize,
    /// Running sum of member constants.
    pub q: f64,
    /// Running sum of member recourse values at the generating point.
    pub value: f64,
    /// A member came back as something other than an optimality cut.
    pub poisoned: bool,
    terms: BTreeMap<u32, f64>,
}

impl CutBundle {
    fn new(slot: usize, expected: usize) -> Self {
        Self {
            slot,
            expected,
            count: 0,
            q: 0.0,
            value: 0.0,
            poisoned: false,
            terms: BTreeMap::new(),
        }
    }

    fn push(&mut self, cut: &Hyperplane, value: f64) {
        for (&index, &coeff) in cut.terms.indices().iter().zip(cut.terms.values()) {
            *self.terms.entry(index).or_insert(0.0) += coeff;
        }
        self.q += cut.q;
        self.value += value;
        self.count += 1;
    }

    fn is_complete(&self) -> bool {
        !self.poisoned && self.count == self.expected
    }

    fn emit(&mut self) -> Cut {
        let terms = SparseVec::from_entries(std::mem::take(&mut self.terms));
        tracing::trace!(
            component = "bundle",
            operation = "emit",
            status = "success",
            slot = self.slot,
            members = self.count,
            q = self.q,
            "Emitting aggregated optimality cut"
        );
        Cut::Optimality(Hyperplane::new(terms, self.q, self.slot))
    }
}

/// Per-pass accumulator: one bundle per slot.
///
/// The serial engine builds one per iteration; the distributed coordinator
/// builds one per timestamp.
#[derive(Debug, Clone)]
pub struct BundleAccumulator {
    bundler: Bundler,
    slots: Vec<CutBundle>,
}

impl BundleAccumulator {
    pub fn new(bundler: Bundler) -> Self {
        let slots = (0..bundler.num_slots())
            .map(|slot| CutBundle::new(slot, bundler.slot_size(slot)))
            .collect();
        Self { bundler, slots }
    }

    /// Feed one subproblem result. Returns the cut to hand to the master, if
    /// any: non-optimality cuts pass through untouched (and poison their
    /// slot), optimality cuts come back as the slot aggregate once the slot
    /// is complete.
    pub fn push(&mut self, subproblem: usize, cut: Cut, value: f64) -> Option<Cut> {
        let slot = self.bundler.slot_of(subproblem);
        match cut {
            Cut::Optimality(h) => {
                let bundle = &mut self.slots[slot];
                bundle.push(&h, value);
                if bundle.is_complete() {
                    Some(bundle.emit())
                } else {
                    None
                }
            }
            other => {
                self.slots[slot].poisoned = true;
                Some(other)
            }
        }
    }

    /// Emit the remaining non-empty partial aggregates whose slot was not
    /// poisoned (running q still finite).
    pub fn finish(mut self) -> Vec<Cut> {
        let mut cuts = Vec::new();
        for bundle in &mut self.slots {
            if !bundle.poisoned && bundle.count > 0 && bundle.count < bundle.expected {
                cuts.push(bundle.emit());
            }
        }
        cuts
    }

    /// Aggregate recourse value collected for a slot so far.
    pub fn slot_value(&self, slot: usize) -> f64 {
        self.slots[slot].value
    }
}
