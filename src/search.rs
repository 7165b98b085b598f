// SPDX-License-Identifier: Apache-2.0

//! Search strategies over probe values: fixed sample lists, verified sample
//! lists, and the monotonic doubling-then-bisection binary search.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::value::{NumericDomain, Scalar};

/// One staged probe value together with the aggregated outcome of probing
/// it. A value only counts as accepted when every test case accepted it.
#[derive(Clone, Copy, Debug)]
pub struct SearchTarget {
    pub value: Scalar,
    pub eval_success: bool,
}

impl SearchTarget {
    pub fn new(value: Scalar) -> SearchTarget {
        SearchTarget { value, eval_success: true }
    }

    pub fn update(&mut self, success: bool) {
        self.eval_success &= success;
    }
}

/// Walks a fixed list of targets front to back.
#[derive(Clone, Debug)]
pub struct SampleSearch {
    targets: Vec<Scalar>,
    cursor: usize,
}

impl SampleSearch {
    pub fn new(targets: Vec<Scalar>) -> SampleSearch {
        SampleSearch { targets, cursor: 0 }
    }

    /// At most `max_samples` targets drawn randomly from `targets`. A
    /// negative cap is corrected to zero.
    pub fn random<R: Rng>(targets: &[Scalar], max_samples: isize, rng: &mut R) -> SampleSearch {
        let max_samples = if max_samples < 0 {
            log::error!("negative sample cap {} corrected to 0", max_samples);
            0
        } else {
            max_samples as usize
        };
        let picked: Vec<Scalar> =
            targets.choose_multiple(rng, max_samples.min(targets.len())).copied().collect();
        SampleSearch::new(picked)
    }

    /// Like `random`, but the smallest and largest of `targets` are always
    /// included.
    pub fn min_max<R: Rng>(targets: &[Scalar], max_samples: isize, rng: &mut R) -> SampleSearch {
        let min = targets.iter().min().copied();
        let max = targets.iter().max().copied();
        let mut search = SampleSearch::random(targets, max_samples, rng);
        for bound in [min, max].into_iter().flatten() {
            if !search.targets.contains(&bound) {
                search.targets.push(bound);
            }
        }
        search
    }

    pub fn targets(&self) -> &[Scalar] {
        &self.targets
    }

    pub fn has_next_target(&self) -> bool {
        self.cursor < self.targets.len()
    }

    pub fn next_search_target(&mut self) -> Option<Scalar> {
        let target = self.targets.get(self.cursor).copied();
        if target.is_some() {
            self.cursor += 1;
        }
        target
    }
}

/// A sample search that remembers, per target, whether probing it succeeded.
#[derive(Clone, Debug)]
pub struct VerifySampleSearch {
    inner: SampleSearch,
    sample_results: BTreeMap<Scalar, bool>,
}

impl VerifySampleSearch {
    pub fn new(targets: Vec<Scalar>) -> VerifySampleSearch {
        VerifySampleSearch { inner: SampleSearch::new(targets), sample_results: BTreeMap::new() }
    }

    pub fn has_next_target(&self) -> bool {
        self.inner.has_next_target()
    }

    pub fn next_search_target(&mut self) -> Option<Scalar> {
        self.inner.next_search_target()
    }

    /// Record the outcome of the most recently issued target.
    pub fn update_search(&mut self, success: bool) {
        assert!(self.inner.cursor > 0, "no target issued yet");
        let value = self.inner.targets[self.inner.cursor - 1];
        let entry = self.sample_results.entry(value).or_insert(true);
        *entry &= success;
    }

    pub fn has_failed_targets(&self) -> bool {
        self.sample_results.values().any(|ok| !ok)
    }

    pub fn sample_results(&self) -> &BTreeMap<Scalar, bool> {
        &self.sample_results
    }
}

/// Monotonic bound search: doubles an accepted candidate until rejection,
/// then bisects. `final_bound` converges to the largest accepted value
/// (assuming acceptance is downward closed).
///
/// Restartable with `initialise`, which the bounded priors use after a
/// failed verification.
#[derive(Clone, Debug)]
pub struct BinarySearch {
    domain: NumericDomain,
    pub max_bound: Scalar,
    pub initial_min_bound: Scalar,
    pub final_bound: Option<Scalar>,
    pub invalid: bool,
    left: Scalar,
    right: Scalar,
    center: Option<Scalar>,
    target: Option<SearchTarget>,
    search_done: bool,
}

impl BinarySearch {
    pub fn new(
        domain: NumericDomain,
        max_bound: Scalar,
        min_bound: Scalar,
        start_bound: Scalar,
    ) -> BinarySearch {
        let mut search = BinarySearch {
            domain,
            max_bound,
            initial_min_bound: min_bound,
            final_bound: None,
            invalid: false,
            left: min_bound,
            right: start_bound,
            center: None,
            target: None,
            search_done: false,
        };
        search.initialise(max_bound, min_bound, start_bound);
        search
    }

    /// Reset the search to a fresh `[min_bound, max_bound]` interval with
    /// the first candidate at `start_bound`.
    pub fn initialise(&mut self, max_bound: Scalar, min_bound: Scalar, start_bound: Scalar) {
        self.invalid = max_bound < start_bound
            || min_bound > start_bound
            || min_bound > max_bound
            || min_bound == start_bound;
        if self.invalid {
            log::warn!(
                "invalid binary search bounds: min {} start {} max {}",
                min_bound,
                start_bound,
                max_bound
            );
        }
        self.max_bound = max_bound;
        self.initial_min_bound = min_bound;
        self.final_bound = if self.invalid { None } else { Some(min_bound) };
        self.left = min_bound;
        self.right = start_bound;
        self.center = None;
        self.target = None;
        self.search_done = false;
    }

    pub fn domain(&self) -> NumericDomain {
        self.domain
    }

    pub fn split_interval(&self, left: Scalar, right: Scalar) -> Scalar {
        self.domain.split_interval(left, right)
    }

    fn double_clamped(&self, value: Scalar) -> Scalar {
        match (value, self.max_bound) {
            (Scalar::Int(v), Scalar::Int(max)) => Scalar::Int(v.saturating_mul(2).min(max)),
            (Scalar::Real(v), Scalar::Real(max)) => Scalar::Real((v * 2.0).min(max)),
            _ => panic!("mixed-domain binary search bounds"),
        }
    }

    fn select_next_value(&mut self) {
        if self.search_done {
            return;
        }
        let target = match self.target {
            None => {
                // First candidate is the start bound.
                self.target = Some(SearchTarget::new(self.right));
                return;
            }
            Some(t) => t,
        };
        if target.eval_success {
            if self.center.is_none() {
                // Still in the doubling phase.
                if target.value == self.max_bound {
                    self.final_bound = Some(self.max_bound);
                    self.search_done = true;
                    return;
                }
                self.left = self.right;
                self.right = self.double_clamped(self.right);
                self.target = Some(SearchTarget::new(self.right));
            } else {
                self.left = self.center.take().unwrap_or(self.left);
                let center = self.domain.split_interval(self.left, self.right);
                self.center = Some(center);
                self.target = Some(SearchTarget::new(center));
            }
        } else {
            if let Some(center) = self.center {
                self.right = center;
            }
            let center = self.domain.split_interval(self.left, self.right);
            self.center = Some(center);
            self.target = Some(SearchTarget::new(center));
        }
        if let Some(center) = self.center {
            if self.domain.compare_bounds(self.left, center) {
                self.final_bound = Some(self.left);
                self.search_done = true;
            }
        }
    }

    /// Advance, then report whether a target is available. Returns false
    /// once converged or when the bounds were invalid.
    pub fn has_next_target(&mut self) -> bool {
        self.select_next_value();
        !self.invalid && !self.search_done
    }

    pub fn next_search_target(&self) -> Scalar {
        self.target.as_ref().map(|t| t.value).unwrap_or_else(|| panic!("no staged target"))
    }

    pub fn update_search(&mut self, success: bool) {
        match self.target.as_mut() {
            Some(t) => t.update(success),
            None => panic!("update without staged target"),
        }
    }
}
