// SPDX-License-Identifier: Apache-2.0

//! The composite prior: a decision tree over the concrete priors. It always
//! starts by observing original values (null), then walks to cheaper or more
//! precise assumptions depending on what each stage concluded.
//!
//! ```text
//! Null -- immutable argument -> Done
//!      -- 1-bit leaf -> Boolean -> Done
//!      -> Broadcast -- fail -> Offset -> Scale -> Done
//!                   -- ok ---> AllValues -- ok -> Done
//!                                        -- fail -> Range -> Offset -> Scale -> Done
//! ```

use std::sync::Arc;

use rand::Rng;
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;

use crate::function::Function;
use crate::paths::Path;
use crate::priors::sample::leaf_is_bool;
use crate::priors::{
    AllValuesPrior, BooleanPrior, BoundedKind, BoundedPrior, BroadcastPrior, NullPrior, Prior,
    PriorResult, RangePrior,
};
use crate::probes::{Probe, ProbeResult};
use crate::search::SampleSearch;
use crate::value::{NumericDomain, Scalar, MAX_BROADCAST_SAMPLES};

/// Which stage of the decision tree is currently evaluating.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PriorState {
    Null,
    Boolean,
    Broadcast,
    AllIntegers,
    AllReals,
    IntegerRange,
    RealRange,
    Offset,
    Scale,
    Done,
}

/// A concrete prior the composite has activated.
#[derive(Clone, Debug)]
enum ActivePrior {
    Null(NullPrior),
    Boolean(BooleanPrior),
    Broadcast(BroadcastPrior),
    All(AllValuesPrior),
    Range(RangePrior),
    Bounded(BoundedPrior),
}

impl ActivePrior {
    fn as_prior(&self) -> &dyn Prior {
        match self {
            ActivePrior::Null(p) => p,
            ActivePrior::Boolean(p) => p,
            ActivePrior::Broadcast(p) => p,
            ActivePrior::All(p) => p,
            ActivePrior::Range(p) => p,
            ActivePrior::Bounded(p) => p,
        }
    }

    fn as_prior_mut(&mut self) -> &mut dyn Prior {
        match self {
            ActivePrior::Null(p) => p,
            ActivePrior::Boolean(p) => p,
            ActivePrior::Broadcast(p) => p,
            ActivePrior::All(p) => p,
            ActivePrior::Range(p) => p,
            ActivePrior::Bounded(p) => p,
        }
    }
}

/// Drives the concrete priors for one path, selecting the next one whenever
/// the current one concludes.
#[derive(Clone, Debug)]
pub struct CompositePrior {
    function: Arc<Function>,
    path: Path,
    /// Skip value search for argument paths the call never writes to.
    skip_immutables: bool,
    pub state: PriorState,
    priors: Vec<ActivePrior>,
    rng: Pcg64Mcg,
}

/// The standard prior tree for a path, with all randomness derived from
/// `seed`.
pub fn build_priors(
    function: Arc<Function>,
    path: Path,
    skip_immutables: bool,
    seed: u64,
) -> CompositePrior {
    CompositePrior::new(function, path, skip_immutables, seed)
}

impl CompositePrior {
    pub const ID: &'static str = "Composite Prior";

    pub fn new(
        function: Arc<Function>,
        path: Path,
        skip_immutables: bool,
        seed: u64,
    ) -> CompositePrior {
        let null = NullPrior::new(function.clone(), path.clone());
        CompositePrior {
            function,
            path,
            skip_immutables,
            state: PriorState::Null,
            priors: vec![ActivePrior::Null(null)],
            rng: Pcg64Mcg::seed_from_u64(seed),
        }
    }

    /// Results of every concrete prior evaluated so far.
    pub fn sub_results(&mut self) -> Vec<PriorResult> {
        self.priors.iter_mut().filter_map(|p| p.as_prior_mut().prior_result()).collect()
    }

    fn current_mut(&mut self) -> &mut dyn Prior {
        match self.priors.last_mut() {
            Some(p) => p.as_prior_mut(),
            None => panic!("composite prior has no active prior"),
        }
    }

    fn sub_rng(&mut self) -> Pcg64Mcg {
        Pcg64Mcg::seed_from_u64(self.rng.gen())
    }

    fn push_bounded(&mut self, kind: BoundedKind) {
        let rng = self.sub_rng();
        let prior = BoundedPrior::new(self.function.clone(), self.path.clone(), kind, rng);
        self.priors.push(ActivePrior::Bounded(prior));
    }

    fn select_next_prior(&mut self) {
        match self.state {
            PriorState::Null => {
                let (mutated, observed) = match self.priors.first() {
                    Some(ActivePrior::Null(p)) => (
                        p.mutated_during_call,
                        p.probed_values.keys().copied().collect::<Vec<Scalar>>(),
                    ),
                    _ => panic!("expected null prior active"),
                };
                if self.skip_immutables
                    && !self.path.is_result()
                    && mutated == Some(false)
                {
                    log::info!(
                        "{} {} unchanged during call; skipping value search",
                        self.function,
                        self.path
                    );
                    self.state = PriorState::Done;
                } else if leaf_is_bool(&self.path) {
                    let prior = BooleanPrior::new(self.function.clone(), self.path.clone());
                    self.priors.push(ActivePrior::Boolean(prior));
                    self.state = PriorState::Boolean;
                } else {
                    let search =
                        SampleSearch::min_max(&observed, MAX_BROADCAST_SAMPLES, &mut self.rng);
                    let prior =
                        BroadcastPrior::new(self.function.clone(), self.path.clone(), search);
                    self.priors.push(ActivePrior::Broadcast(prior));
                    self.state = PriorState::Broadcast;
                }
            }
            PriorState::Boolean => self.state = PriorState::Done,
            PriorState::Broadcast => {
                let broadcast_ok = match self.priors.last_mut() {
                    Some(ActivePrior::Broadcast(p)) => {
                        p.prior_result().map(|r| r.success).unwrap_or(false)
                    }
                    _ => panic!("expected broadcast prior active"),
                };
                if broadcast_ok {
                    // The path ignores its original value; maybe it accepts
                    // anything at all.
                    let observed = match self.priors.first() {
                        Some(ActivePrior::Null(p)) => {
                            p.probed_values.keys().copied().collect::<Vec<Scalar>>()
                        }
                        _ => panic!("expected null prior first"),
                    };
                    let (prior, state) = match self.path.domain() {
                        NumericDomain::Integer => (
                            AllValuesPrior::integers(
                                self.function.clone(),
                                self.path.clone(),
                                &observed,
                                &mut self.rng,
                            ),
                            PriorState::AllIntegers,
                        ),
                        NumericDomain::Real => (
                            AllValuesPrior::reals(
                                self.function.clone(),
                                self.path.clone(),
                                &observed,
                                &mut self.rng,
                            ),
                            PriorState::AllReals,
                        ),
                    };
                    self.priors.push(ActivePrior::All(prior));
                    self.state = state;
                } else {
                    // The original value matters; search around it instead.
                    self.push_bounded(BoundedKind::Offset);
                    self.state = PriorState::Offset;
                }
            }
            PriorState::AllIntegers | PriorState::AllReals => {
                let (all_ok, history) = match self.priors.last_mut() {
                    Some(ActivePrior::All(p)) => (
                        p.prior_result().map(|r| r.success).unwrap_or(false),
                        p.probed_values().clone(),
                    ),
                    _ => panic!("expected all-values prior active"),
                };
                if all_ok {
                    self.state = PriorState::Done;
                } else {
                    let rng = self.sub_rng();
                    let (prior, state) = match self.path.domain() {
                        NumericDomain::Integer => (
                            RangePrior::integer(
                                self.function.clone(),
                                self.path.clone(),
                                &history,
                                rng,
                            ),
                            PriorState::IntegerRange,
                        ),
                        NumericDomain::Real => (
                            RangePrior::real(
                                self.function.clone(),
                                self.path.clone(),
                                &history,
                                rng,
                            ),
                            PriorState::RealRange,
                        ),
                    };
                    self.priors.push(ActivePrior::Range(prior));
                    self.state = state;
                }
            }
            PriorState::IntegerRange | PriorState::RealRange => {
                self.push_bounded(BoundedKind::Offset);
                self.state = PriorState::Offset;
            }
            PriorState::Offset => {
                self.push_bounded(BoundedKind::Scale);
                self.state = PriorState::Scale;
            }
            PriorState::Scale => self.state = PriorState::Done,
            PriorState::Done => {}
        }
    }
}

impl Prior for CompositePrior {
    fn id(&self) -> &'static str {
        CompositePrior::ID
    }

    fn is_done(&mut self) -> bool {
        // A failed null probe means the oracle cannot even observe the
        // path; nothing further can run.
        if self.state == PriorState::Null && self.current_mut().is_invalid() {
            return true;
        }
        while self.state != PriorState::Done && self.current_mut().is_done() {
            self.select_next_prior();
        }
        self.state == PriorState::Done
    }

    fn is_invalid(&self) -> bool {
        match self.priors.first() {
            Some(p) => p.as_prior().is_invalid(),
            None => false,
        }
    }

    fn select_next_probe(&mut self) -> Probe {
        self.current_mut().select_next_probe()
    }

    fn update(&mut self, result: &ProbeResult) {
        self.current_mut().update(result);
    }

    fn prior_result(&mut self) -> Option<PriorResult> {
        if !self.is_done() {
            return None;
        }
        // The null prior only observes; success means any later prior found
        // an exploitable value range.
        let success = self
            .priors
            .iter_mut()
            .skip(1)
            .filter_map(|p| p.as_prior_mut().prior_result())
            .any(|r| r.success);
        let ids: Vec<&str> = self.priors.iter().map(|p| p.as_prior().id()).collect();
        Some(PriorResult {
            prior_id: CompositePrior::ID,
            success,
            result_data: ids.join("#"),
        })
    }

    fn probe_log(&self) -> Vec<&ProbeResult> {
        self.priors.iter().flat_map(|p| p.as_prior().probe_log()).collect()
    }
}
