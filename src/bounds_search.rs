// SPDX-License-Identifier: Apache-2.0

//! Two-sided interval search: grow an accepted seed interval outward with
//! bisection against the enclosing bounds, then verify the interior with
//! random samples, restarting from the verification history when a sample
//! fails.

use std::collections::BTreeMap;

use rand_pcg::Pcg64Mcg;

use crate::search::{SampleSearch, SearchTarget};
use crate::value::{NumericDomain, Scalar};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundsState {
    SearchUpper,
    SearchLower,
    InitVerification,
    VerifyBounds,
    EvalVerification,
    Done,
}

/// Diff between two scalars, wide enough to span the full i64 range.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
enum Span {
    Int(i128),
    Real(f64),
}

fn span_between(a: Scalar, b: Scalar) -> Span {
    match (a, b) {
        (Scalar::Int(a), Scalar::Int(b)) => Span::Int((b as i128 - a as i128).abs()),
        _ => Span::Real((b.as_f64() - a.as_f64()).abs()),
    }
}

/// From a history of tested values, pick the widest contiguous run of
/// accepted values as the seed interval, and the nearest failing neighbours
/// (or the initial limits) as the enclosing search bounds.
///
/// Returns `(lower, upper, min_bound, max_bound)`, or `None` when no
/// accepted run exists.
pub fn find_initial_bounds(
    tests: &BTreeMap<Scalar, bool>,
    initial_min: Scalar,
    initial_max: Scalar,
) -> Option<(Scalar, Scalar, Scalar, Scalar)> {
    let keys: Vec<Scalar> = tests.keys().copied().collect();
    let ok = |i: usize| tests[&keys[i]];
    let n = keys.len();
    if n == 0 {
        return None;
    }
    if n == 1 {
        return if ok(0) {
            Some((keys[0], keys[0], initial_min, initial_max))
        } else {
            None
        };
    }
    let mut li = 0usize;
    let mut ui = 0usize;
    let mut best: Option<(usize, usize, Span)> = None;
    while ui < n && li < n - 1 {
        // A run can start at an accepted first value or just after a
        // rejected one.
        let lower_ok = (ok(li) && li == 0) || (!ok(li) && ok(li + 1));
        if !lower_ok {
            li += 1;
            ui = li;
            continue;
        }
        // A run ends at an accepted last value or just before a rejected
        // one.
        let upper_ok = ok(ui) && (ui == n - 1 || !ok(ui + 1));
        if !upper_ok {
            ui += 1;
            continue;
        }
        let upper_edge = if ui < n - 1 { keys[ui + 1] } else { keys[ui] };
        let width = span_between(keys[li], upper_edge);
        if best.map_or(true, |(_, _, w)| w < width) {
            let lower_idx = if li == 0 && ok(0) { 0 } else { li + 1 };
            best = Some((lower_idx, ui, width));
        }
        ui += 1;
        li = ui;
    }
    let (li, ui, _) = best?;
    let min_bound = if li > 0 { keys[li - 1] } else { initial_min };
    let max_bound = if ui < n - 1 { keys[ui + 1] } else { initial_max };
    Some((keys[li], keys[ui], min_bound, max_bound))
}

/// State machine searching for the widest accepted interval `[lower, upper]`
/// inside `[min_bound, max_bound]`.
#[derive(Clone, Debug)]
pub struct BinaryBoundsSearch {
    domain: NumericDomain,
    pub min_bound: Scalar,
    pub max_bound: Scalar,
    pub lower: Option<Scalar>,
    pub upper: Option<Scalar>,
    pub invalid: bool,
    pub state: BoundsState,
    target: Option<SearchTarget>,
    left: Option<Scalar>,
    right: Scalar,
    center: Option<Scalar>,
    verify_search: Option<SampleSearch>,
    verify_history: Option<BTreeMap<Scalar, bool>>,
    skip_lower: bool,
    skip_upper: bool,
    rng: Pcg64Mcg,
}

impl BinaryBoundsSearch {
    /// Start from an explicit accepted interval.
    pub fn from_bounds(
        domain: NumericDomain,
        min_bound: Scalar,
        max_bound: Scalar,
        lower: Scalar,
        upper: Scalar,
        rng: Pcg64Mcg,
    ) -> BinaryBoundsSearch {
        let invalid = lower > upper;
        if invalid {
            log::warn!("invalid bounds search seed [{},{}]", lower, upper);
        }
        BinaryBoundsSearch {
            domain,
            min_bound,
            max_bound,
            lower: (!invalid).then_some(lower),
            upper: (!invalid).then_some(upper),
            invalid,
            state: BoundsState::SearchUpper,
            target: None,
            left: (!invalid).then_some(upper),
            right: max_bound,
            center: None,
            verify_search: None,
            verify_history: None,
            skip_lower: false,
            skip_upper: false,
            rng,
        }
    }

    /// Start from a history of already-tested values; invalid when the
    /// history holds no accepted value.
    pub fn from_history(
        domain: NumericDomain,
        min_bound: Scalar,
        max_bound: Scalar,
        history: &BTreeMap<Scalar, bool>,
        rng: Pcg64Mcg,
    ) -> BinaryBoundsSearch {
        match find_initial_bounds(history, min_bound, max_bound) {
            Some((lower, upper, min_bound, max_bound)) => {
                BinaryBoundsSearch::from_bounds(domain, min_bound, max_bound, lower, upper, rng)
            }
            None => {
                log::warn!("no accepted seed value in history; bounds search invalid");
                let mut s = BinaryBoundsSearch::from_bounds(
                    domain,
                    min_bound,
                    max_bound,
                    min_bound,
                    max_bound,
                    rng,
                );
                s.invalid = true;
                s.lower = None;
                s.upper = None;
                s.left = None;
                s
            }
        }
    }

    fn lower_val(&self) -> Scalar {
        match self.lower {
            Some(v) => v,
            None => panic!("lower bound missing while search active"),
        }
    }

    fn upper_val(&self) -> Scalar {
        match self.upper {
            Some(v) => v,
            None => panic!("upper bound missing while search active"),
        }
    }

    fn left_val(&self) -> Scalar {
        match self.left {
            Some(v) => v,
            None => panic!("search cursor missing while search active"),
        }
    }

    fn begin_lower_search(&mut self) {
        self.right = self.lower_val();
        self.left = Some(self.min_bound);
        self.center = None;
        self.target = None;
        self.state = BoundsState::SearchLower;
    }

    /// Push the upper bound toward `max_bound`. The first candidate is
    /// `max_bound` itself; acceptance moves the accepted edge up, rejection
    /// bisects down.
    fn handle_search_upper(&mut self) {
        let target = match self.target {
            None => {
                self.target = Some(SearchTarget::new(self.right));
                return;
            }
            Some(t) => t,
        };
        if target.eval_success {
            if self.center.is_none() {
                // The whole remaining headroom is accepted.
                self.upper = Some(self.right);
                self.begin_lower_search();
                return;
            }
            self.left = self.center;
        } else if let Some(center) = self.center {
            self.right = center;
        }
        let center = self.domain.split_interval(self.left_val(), self.right);
        self.center = Some(center);
        self.target = Some(SearchTarget::new(center));
        if self.domain.compare_bounds(self.left_val(), center) {
            self.upper = self.left;
            self.begin_lower_search();
        }
    }

    /// Mirror of the upper search, pushing the lower bound toward
    /// `min_bound`.
    fn handle_search_lower(&mut self) {
        let target = match self.target {
            None => {
                self.target = Some(SearchTarget::new(self.left_val()));
                return;
            }
            Some(t) => t,
        };
        if target.eval_success {
            if self.center.is_none() {
                self.lower = self.left;
                self.state = BoundsState::InitVerification;
                self.target = None;
                return;
            }
            self.right = self.center.take().unwrap_or(self.right);
        } else if let Some(center) = self.center {
            self.left = Some(center);
        }
        let center = self.domain.split_interval(self.left_val(), self.right);
        self.center = Some(center);
        self.target = Some(SearchTarget::new(center));
        if self.domain.compare_bounds(self.left_val(), center) {
            self.lower = Some(self.right);
            self.state = BoundsState::InitVerification;
            self.target = None;
        }
    }

    fn initialise_verification(&mut self) {
        self.target = None;
        let targets = self.domain.range_verification_targets(
            self.lower_val(),
            self.upper_val(),
            &mut self.rng,
        );
        match targets {
            Some(targets) if !targets.is_empty() => {
                log::debug!(
                    "verifying interval [{},{}] with {} samples",
                    self.lower_val(),
                    self.upper_val(),
                    targets.len()
                );
                self.verify_search = Some(SampleSearch::new(targets));
                self.verify_history = Some(BTreeMap::new());
                self.state = BoundsState::VerifyBounds;
            }
            _ => {
                self.state = BoundsState::Done;
            }
        }
    }

    fn handle_verify_bounds(&mut self) {
        if let (Some(target), Some(history)) = (self.target, self.verify_history.as_mut()) {
            let entry = history.entry(target.value).or_insert(true);
            *entry &= target.eval_success;
        }
        let search = match self.verify_search.as_mut() {
            Some(s) => s,
            None => panic!("verification not initialised"),
        };
        match search.next_search_target() {
            Some(value) => self.target = Some(SearchTarget::new(value)),
            None => {
                self.target = None;
                self.state = BoundsState::EvalVerification;
            }
        }
    }

    fn evaluate_verification(&mut self) {
        let mut history = match self.verify_history.take() {
            Some(h) => h,
            None => panic!("verification not initialised"),
        };
        self.verify_search = None;
        if history.values().all(|ok| *ok) {
            self.state = BoundsState::Done;
            return;
        }
        // Some interior sample failed: rebuild the seed interval from the
        // verification history (the discovered bounds count as accepted)
        // and search again.
        history.insert(self.lower_val(), true);
        history.insert(self.upper_val(), true);
        let prev_lower = self.lower;
        let prev_upper = self.upper;
        match find_initial_bounds(&history, self.min_bound, self.max_bound) {
            Some((lower, upper, min_bound, max_bound)) => {
                self.lower = Some(lower);
                self.upper = Some(upper);
                self.min_bound = min_bound;
                self.max_bound = max_bound;
                self.invalid = false;
            }
            None => {
                self.lower = None;
                self.upper = None;
                self.invalid = true;
            }
        }
        self.target = None;
        self.left = self.upper;
        self.right = self.max_bound;
        self.center = None;
        self.state = BoundsState::SearchUpper;
        // A bound the restart left unchanged needs no second search pass.
        self.skip_lower = prev_lower == self.lower;
        self.skip_upper = prev_upper == self.upper;
    }

    pub fn has_next_target(&mut self) -> bool {
        if self.invalid {
            return false;
        }
        loop {
            match self.state {
                BoundsState::SearchUpper => {
                    if self.skip_upper {
                        self.begin_lower_search();
                    } else {
                        self.handle_search_upper();
                    }
                }
                BoundsState::SearchLower => {
                    if self.skip_lower {
                        self.target = None;
                        self.state = BoundsState::InitVerification;
                    } else {
                        self.handle_search_lower();
                    }
                }
                BoundsState::InitVerification => self.initialise_verification(),
                BoundsState::VerifyBounds => self.handle_verify_bounds(),
                BoundsState::EvalVerification => self.evaluate_verification(),
                BoundsState::Done => break,
            }
            if self.invalid || self.target.is_some() {
                break;
            }
        }
        !self.invalid && self.state != BoundsState::Done
    }

    pub fn next_search_target(&self) -> Scalar {
        match self.target.as_ref() {
            Some(t) => t.value,
            None => panic!("no staged target"),
        }
    }

    pub fn update_search(&mut self, success: bool) {
        match self.target.as_mut() {
            Some(t) => t.update(success),
            None => panic!("update without staged target"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;

    fn history(entries: &[(i64, bool)]) -> BTreeMap<Scalar, bool> {
        entries.iter().map(|(v, ok)| (Scalar::Int(*v), *ok)).collect()
    }

    fn seed(entries: &[(i64, bool)]) -> Option<(i64, i64, i64, i64)> {
        find_initial_bounds(&history(entries), Scalar::Int(-500), Scalar::Int(500)).map(
            |(l, u, mn, mx)| (l.as_int(), u.as_int(), mn.as_int(), mx.as_int()),
        )
    }

    #[test]
    fn initial_bounds_pick_widest_run() {
        assert_eq!(
            seed(&[(-5, false), (4, true), (9, true), (20, false)]),
            Some((4, 9, -5, 20))
        );
        assert_eq!(seed(&[(-5, true)]), Some((-5, -5, -500, 500)));
        assert_eq!(seed(&[(-5, false)]), None);
        assert_eq!(seed(&[]), None);
        assert_eq!(
            seed(&[(1, true), (2, true), (3, true)]),
            Some((1, 3, -500, 500))
        );
        // Two runs: [0,1] bounded by 5, and [10,40] bounded above by the
        // initial limit; the wider one wins.
        assert_eq!(
            seed(&[(0, true), (1, true), (5, false), (10, true), (40, true)]),
            Some((10, 40, 5, 500))
        );
        // Leading rejected value tightens the lower search bound.
        assert_eq!(
            seed(&[(-9, false), (-2, true), (3, true)]),
            Some((-2, 3, -9, 500))
        );
    }

    fn run_to_completion(
        search: &mut BinaryBoundsSearch,
        accept: impl Fn(i64) -> bool,
    ) -> (Option<i64>, Option<i64>) {
        let mut steps = 0;
        while search.has_next_target() {
            let v = search.next_search_target().as_int();
            search.update_search(accept(v));
            steps += 1;
            assert!(steps < 10_000, "search failed to converge");
        }
        (
            search.lower.map(Scalar::as_int),
            search.upper.map(Scalar::as_int),
        )
    }

    #[test]
    fn converges_to_contiguous_interval() {
        let rng = Pcg64Mcg::seed_from_u64(11);
        let mut search = BinaryBoundsSearch::from_history(
            NumericDomain::Integer,
            Scalar::Int(i32::MIN as i64),
            Scalar::Int(i32::MAX as i64),
            &history(&[(5, true), (9, true)]),
            rng,
        );
        let (lower, upper) = run_to_completion(&mut search, |v| (-50..=2000).contains(&v));
        assert_eq!((lower, upper), (Some(-50), Some(2000)));
        assert_eq!(search.state, BoundsState::Done);
        assert!(!search.invalid);
    }

    #[test]
    fn verification_restart_excludes_interior_hole() {
        // Acceptance region [4,14] plus a decoy island [19,24]. The upper
        // bisection can land on the island, so the first converged interval
        // may span the rejected gap [15,18]; interior verification then
        // forces a restart that settles on the solid run.
        let rng = Pcg64Mcg::seed_from_u64(11);
        let accept = |v: i64| (4..=14).contains(&v) || (19..=24).contains(&v);
        let mut search = BinaryBoundsSearch::from_history(
            NumericDomain::Integer,
            Scalar::Int(i32::MIN as i64),
            Scalar::Int(i32::MAX as i64),
            &history(&[(5, true), (9, true)]),
            rng,
        );
        let (lower, upper) = run_to_completion(&mut search, accept);
        let (lower, upper) = (lower.unwrap(), upper.unwrap());
        assert_eq!(search.state, BoundsState::Done);
        assert!(lower <= 5 && upper >= 9, "seed run lost: [{},{}]", lower, upper);
        for v in lower..=upper {
            assert!(accept(v), "final interval [{},{}] contains rejected {}", lower, upper, v);
        }
    }

    #[test]
    fn empty_history_is_invalid() {
        let rng = Pcg64Mcg::seed_from_u64(3);
        let mut search = BinaryBoundsSearch::from_history(
            NumericDomain::Integer,
            Scalar::Int(-10),
            Scalar::Int(10),
            &history(&[(0, false)]),
            rng,
        );
        assert!(search.invalid);
        assert!(!search.has_next_target());
        assert_eq!(search.lower, None);
        assert_eq!(search.upper, None);
    }
}
