// SPDX-License-Identifier: Apache-2.0

//! Sampling priors: observe original values (null), replay them everywhere
//! (broadcast), try both truth values (boolean), and test whether the whole
//! numeric domain is acceptable (all-integers / all-reals).

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::Rng;

use crate::function::Function;
use crate::paths::Path;
use crate::priors::{Prior, PriorCore, PriorResult};
use crate::probes::{Probe, ProbeResult};
use crate::rand_utils::{unique_random_integers, unique_random_reals};
use crate::search::SampleSearch;
use crate::types::TypeDesc;
use crate::value::{int_limits, real_limits, NumericDomain, Scalar, ALL_PRIOR_SAMPLES, REAL_TOLERANCE};

/// Shared engine of the sampling priors: walk a target list with static
/// probes, remember per-value outcomes, and fail as soon as any probe
/// fails. `min_values_checked` lets a prior keep sampling past the first
/// failure so follow-up priors get a usable history.
#[derive(Clone, Debug)]
struct SampleCore {
    core: PriorCore,
    search: SampleSearch,
    probed_values: BTreeMap<Scalar, bool>,
    curr_value: Option<Scalar>,
    all_probes_valid: bool,
    min_values_checked: usize,
    values_checked: usize,
}

impl SampleCore {
    fn new(
        function: Arc<Function>,
        path: Path,
        search: SampleSearch,
        initial_probes: BTreeMap<Scalar, bool>,
        min_values_checked: usize,
    ) -> SampleCore {
        SampleCore {
            core: PriorCore::new(function, path),
            search,
            probed_values: initial_probes,
            curr_value: None,
            all_probes_valid: true,
            min_values_checked,
            values_checked: 0,
        }
    }

    fn is_done(&self) -> bool {
        !self.search.has_next_target()
            || (self.is_invalid() && self.values_checked >= self.min_values_checked)
    }

    fn is_invalid(&self) -> bool {
        !self.all_probes_valid
    }

    fn select_next_probe(&mut self, id: &'static str) -> Probe {
        let value = match self.search.next_search_target() {
            Some(v) => v,
            None => panic!("no search target available"),
        };
        self.curr_value = Some(value);
        Probe::static_value(self.core.function.clone(), self.core.path.clone(), id, value)
    }

    fn update(&mut self, result: &ProbeResult) {
        self.core.record(result);
        let value = match self.curr_value {
            Some(v) => v,
            None => panic!("update without selected probe"),
        };
        let success = result.is_exec_success();
        // A value replayed across several test cases must succeed for all
        // of them.
        match self.probed_values.get_mut(&value) {
            Some(prev) => *prev &= success,
            None => {
                self.probed_values.insert(value, success);
                self.values_checked += 1;
            }
        }
        if !success {
            self.all_probes_valid = false;
        }
    }

    fn values_string(&self) -> String {
        self.probed_values
            .iter()
            .map(|(n, s)| format!("{},{}", n, s))
            .collect::<Vec<_>>()
            .join("#")
    }

    fn prior_result(&self, id: &'static str) -> Option<PriorResult> {
        if self.is_done() {
            Some(PriorResult {
                prior_id: id,
                success: self.all_probes_valid,
                result_data: self.values_string(),
            })
        } else {
            None
        }
    }
}

/// Runs the unmodified function once and records the values observed at the
/// path, plus whether the call mutated them.
#[derive(Clone, Debug)]
pub struct NullPrior {
    core: PriorCore,
    /// Observed values and how often each appeared.
    pub probed_values: BTreeMap<Scalar, u64>,
    /// Whether the call changed the value at the path. `None` for result
    /// paths, where the notion does not apply.
    pub mutated_during_call: Option<bool>,
    executed: bool,
    invalid: bool,
}

impl NullPrior {
    pub const ID: &'static str = "Null Prior";

    pub fn new(function: Arc<Function>, path: Path) -> NullPrior {
        let mutated_during_call = if path.is_result() { None } else { Some(false) };
        NullPrior {
            core: PriorCore::new(function, path),
            probed_values: BTreeMap::new(),
            mutated_during_call,
            executed: false,
            invalid: false,
        }
    }

    fn save_probed_values(&mut self, result: &ProbeResult) {
        for entry in &result.exec_log {
            // Overflowed floats log as 'inf'; f32 payloads hidden in i32
            // slots can log as 'nan'. Neither is a usable sample.
            if entry.after == "inf" || entry.after.contains("nan") {
                continue;
            }
            let parsed = match self.core.path.domain() {
                NumericDomain::Integer => entry.after.parse::<i64>().map(Scalar::Int).ok(),
                NumericDomain::Real => entry.after.parse::<f64>().map(Scalar::Real).ok(),
            };
            let value = match parsed {
                Some(v) => v,
                None => {
                    log::warn!(
                        "unparseable probed value '{}' at {} {}",
                        entry.after,
                        self.core.function,
                        self.core.path
                    );
                    continue;
                }
            };
            *self.probed_values.entry(value).or_insert(0) += entry.freq;
            if let Some(mutated) = self.mutated_during_call.as_mut() {
                *mutated |= entry.before != entry.after;
            }
        }
    }
}

impl Prior for NullPrior {
    fn id(&self) -> &'static str {
        NullPrior::ID
    }

    fn is_done(&mut self) -> bool {
        self.executed
    }

    fn is_invalid(&self) -> bool {
        self.invalid
    }

    fn select_next_probe(&mut self) -> Probe {
        self.executed = true;
        Probe::null(self.core.function.clone(), self.core.path.clone(), self.id())
    }

    fn update(&mut self, result: &ProbeResult) {
        self.core.record(result);
        if result.is_exec_success() && !result.exec_log.is_empty() {
            self.save_probed_values(result);
            if self.probed_values.is_empty() {
                log::warn!(
                    "no usable null probe values for {} {} {:?}",
                    self.core.function,
                    self.core.path,
                    result.test_case
                );
                self.invalid = true;
            }
        } else {
            // The unmodified function can fail here for bad pointer inputs,
            // tight timeouts, or when the path saw no value at all (e.g.
            // a null pointer argument).
            log::warn!(
                "null probe execution failed for {} {} {:?}",
                self.core.function,
                self.core.path,
                result.test_case
            );
            self.invalid = true;
        }
    }

    fn prior_result(&mut self) -> Option<PriorResult> {
        if !self.executed {
            return None;
        }
        let values = self
            .probed_values
            .iter()
            .map(|(n, f)| format!("{},{}", n, f))
            .collect::<Vec<_>>()
            .join("#");
        let mutated = match self.mutated_during_call {
            None => "None".to_string(),
            Some(m) => m.to_string(),
        };
        Some(PriorResult {
            prior_id: self.id(),
            success: !self.invalid,
            result_data: format!("MUTATED:{}#DATA:{}", mutated, values),
        })
    }

    fn probe_log(&self) -> Vec<&ProbeResult> {
        self.core.probe_log.iter().collect()
    }
}

/// Replays a sample of the observed original values as static probes to
/// decide whether follow-up priors may ignore the original value.
#[derive(Clone, Debug)]
pub struct BroadcastPrior {
    inner: SampleCore,
}

impl BroadcastPrior {
    pub const ID: &'static str = "Broadcast Prior";

    pub fn new(function: Arc<Function>, path: Path, search: SampleSearch) -> BroadcastPrior {
        log::info!("broadcast prior created with probe targets {:?}", search.targets());
        BroadcastPrior { inner: SampleCore::new(function, path, search, BTreeMap::new(), 0) }
    }
}

impl Prior for BroadcastPrior {
    fn id(&self) -> &'static str {
        BroadcastPrior::ID
    }

    fn is_done(&mut self) -> bool {
        // A single observed value was already used by every execution of
        // the function; re-broadcasting it proves nothing.
        self.inner.search.targets().len() == 1 || self.inner.is_done()
    }

    fn is_invalid(&self) -> bool {
        self.inner.is_invalid()
    }

    fn select_next_probe(&mut self) -> Probe {
        self.inner.select_next_probe(BroadcastPrior::ID)
    }

    fn update(&mut self, result: &ProbeResult) {
        self.inner.update(result);
    }

    fn prior_result(&mut self) -> Option<PriorResult> {
        if self.is_done() {
            Some(PriorResult {
                prior_id: BroadcastPrior::ID,
                success: self.inner.all_probes_valid,
                result_data: self.inner.values_string(),
            })
        } else {
            None
        }
    }

    fn probe_log(&self) -> Vec<&ProbeResult> {
        self.inner.core.probe_log.iter().collect()
    }
}

/// Tries both truth values of a 1-bit path.
#[derive(Clone, Debug)]
pub struct BooleanPrior {
    core: PriorCore,
    search: SampleSearch,
    pub probed_values: BTreeMap<Scalar, bool>,
    curr_value: Option<Scalar>,
}

impl BooleanPrior {
    pub const ID: &'static str = "Boolean Prior";

    pub fn new(function: Arc<Function>, path: Path) -> BooleanPrior {
        let targets = vec![Scalar::Int(0), Scalar::Int(1)];
        log::debug!("boolean prior created with probe targets {:?}", targets);
        BooleanPrior {
            core: PriorCore::new(function, path),
            search: SampleSearch::new(targets),
            probed_values: BTreeMap::new(),
            curr_value: None,
        }
    }
}

impl Prior for BooleanPrior {
    fn id(&self) -> &'static str {
        BooleanPrior::ID
    }

    fn is_done(&mut self) -> bool {
        !self.search.has_next_target()
    }

    /// Invalid only once both truth values were tested and both failed.
    fn is_invalid(&self) -> bool {
        self.probed_values.len() >= 2 && self.probed_values.values().all(|ok| !ok)
    }

    fn select_next_probe(&mut self) -> Probe {
        let value = match self.search.next_search_target() {
            Some(v) => v,
            None => panic!("no search target available"),
        };
        self.curr_value = Some(value);
        Probe::static_value(self.core.function.clone(), self.core.path.clone(), self.id(), value)
    }

    fn update(&mut self, result: &ProbeResult) {
        self.core.record(result);
        let value = match self.curr_value {
            Some(v) => v,
            None => panic!("update without selected probe"),
        };
        let entry = self.probed_values.entry(value).or_insert(true);
        *entry &= result.is_exec_success();
    }

    fn prior_result(&mut self) -> Option<PriorResult> {
        if self.search.has_next_target() {
            return None;
        }
        let values = self
            .probed_values
            .iter()
            .map(|(n, s)| format!("{},{}", n, s))
            .collect::<Vec<_>>()
            .join("#");
        let all_valid = self.probed_values.values().all(|ok| *ok);
        Some(PriorResult { prior_id: self.id(), success: all_valid, result_data: values })
    }

    fn probe_log(&self) -> Vec<&ProbeResult> {
        self.core.probe_log.iter().collect()
    }
}

/// Assumes the path tolerates the entire numeric domain of its leaf type
/// and tests that assumption on random samples plus boundary values.
#[derive(Clone, Debug)]
pub struct AllValuesPrior {
    inner: SampleCore,
    domain: NumericDomain,
}

impl AllValuesPrior {
    pub const INTEGERS_ID: &'static str = "All Integers Prior";
    pub const REALS_ID: &'static str = "All Reals Prior";

    /// Integer domain `[-2^(bits-1), 2^(bits-1) - 1]`.
    pub fn integers<R: Rng>(
        function: Arc<Function>,
        path: Path,
        initial_probes: &[Scalar],
        rng: &mut R,
    ) -> AllValuesPrior {
        // Values already observed are assumed to work.
        let probed_values: BTreeMap<Scalar, bool> =
            initial_probes.iter().map(|v| (*v, true)).collect();

        let (min_int, max_int) = int_limits(path.leaf_bits());
        let mut prelim = unique_random_integers(min_int, max_int, ALL_PRIOR_SAMPLES, false, rng);
        for n in [min_int, max_int, 0, -1, 1] {
            if !prelim.contains(&n) {
                prelim.push(n);
            }
        }
        let mut targets: Vec<Scalar> = prelim
            .into_iter()
            .map(Scalar::Int)
            .filter(|t| !probed_values.contains_key(t))
            .collect();

        // With fewer than two seed values, probe the immediate neighbours
        // first and insist they get checked, so a follow-up range search
        // starts from a usable history.
        let mut min_values_checked = 0;
        if initial_probes.len() < 2 {
            for num in initial_probes {
                let n = num.as_int();
                targets.insert(0, Scalar::Int(n.saturating_add(1)));
                targets.insert(0, Scalar::Int(n.saturating_sub(1)));
                min_values_checked += 2;
            }
        }

        log::debug!("all integers prior created with probe targets {:?}", targets);
        AllValuesPrior {
            inner: SampleCore::new(
                function,
                path,
                SampleSearch::new(targets),
                probed_values,
                min_values_checked,
            ),
            domain: NumericDomain::Integer,
        }
    }

    /// Real domain `[-max_pos, max_pos]` of the leaf's width.
    pub fn reals<R: Rng>(
        function: Arc<Function>,
        path: Path,
        initial_probes: &[Scalar],
        rng: &mut R,
    ) -> AllValuesPrior {
        let probed_values: BTreeMap<Scalar, bool> =
            initial_probes.iter().map(|v| (*v, true)).collect();

        let (min_pos, max_pos) = real_limits(path.leaf_bits());
        let max_neg = -max_pos;
        let min_neg = -min_pos;

        let mut prelim = if (max_pos - max_neg).is_infinite() {
            // The full span overflows; sample a max-width window below the
            // upper limit instead.
            unique_random_reals(max_pos - f64::MAX, max_pos, ALL_PRIOR_SAMPLES, rng)
        } else {
            unique_random_reals(max_neg, max_pos, ALL_PRIOR_SAMPLES, rng)
        };
        for n in [max_neg, -1.0, min_neg, 0.0, min_pos, 1.0, max_pos] {
            if !prelim.contains(&n) {
                prelim.push(n);
            }
        }
        let mut targets: Vec<Scalar> = prelim
            .into_iter()
            .map(Scalar::Real)
            .filter(|t| !probed_values.contains_key(t))
            .collect();

        let mut min_values_checked = 0;
        if initial_probes.len() < 2 {
            for num in initial_probes {
                let n = num.as_real();
                targets.insert(0, Scalar::Real(n + REAL_TOLERANCE * 10.0));
                targets.insert(0, Scalar::Real(n - REAL_TOLERANCE * 10.0));
                min_values_checked += 2;
            }
        }

        log::debug!("all reals prior created with probe targets {:?}", targets);
        AllValuesPrior {
            inner: SampleCore::new(
                function,
                path,
                SampleSearch::new(targets),
                probed_values,
                min_values_checked,
            ),
            domain: NumericDomain::Real,
        }
    }

    pub fn domain(&self) -> NumericDomain {
        self.domain
    }

    /// Full probe history, seeds included: input to a follow-up range
    /// search.
    pub fn probed_values(&self) -> &BTreeMap<Scalar, bool> {
        &self.inner.probed_values
    }
}

impl Prior for AllValuesPrior {
    fn id(&self) -> &'static str {
        match self.domain {
            NumericDomain::Integer => AllValuesPrior::INTEGERS_ID,
            NumericDomain::Real => AllValuesPrior::REALS_ID,
        }
    }

    fn is_done(&mut self) -> bool {
        self.inner.is_done()
    }

    fn is_invalid(&self) -> bool {
        self.inner.is_invalid()
    }

    fn select_next_probe(&mut self) -> Probe {
        self.inner.select_next_probe(self.id())
    }

    fn update(&mut self, result: &ProbeResult) {
        self.inner.update(result);
    }

    fn prior_result(&mut self) -> Option<PriorResult> {
        self.inner.prior_result(self.id())
    }

    fn probe_log(&self) -> Vec<&ProbeResult> {
        self.inner.core.probe_log.iter().collect()
    }
}

pub(crate) fn leaf_is_bool(path: &Path) -> bool {
    matches!(path.leaf_type(), TypeDesc::Int { bits: 1 })
}
