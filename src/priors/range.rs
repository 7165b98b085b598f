// SPDX-License-Identifier: Apache-2.0

//! Range priors: assume an uninterrupted acceptable interval exists and
//! search out its bounds. The interval is verified by sampling, so isolated
//! failing values inside it can go undetected.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand_pcg::Pcg64Mcg;

use crate::bounds_search::BinaryBoundsSearch;
use crate::function::Function;
use crate::paths::Path;
use crate::priors::{Prior, PriorCore, PriorResult};
use crate::probes::{Probe, ProbeResult};
use crate::value::{int_limits, isclose, real_limits, round_for_report, NumericDomain, Scalar};

#[derive(Clone, Debug)]
pub struct RangePrior {
    core: PriorCore,
    domain: NumericDomain,
    pub search: BinaryBoundsSearch,
}

impl RangePrior {
    pub const INTEGER_ID: &'static str = "Integer Range Prior";
    pub const REAL_ID: &'static str = "Real Range Prior";

    /// Integer interval search over the leaf type's full value range.
    pub fn integer(
        function: Arc<Function>,
        path: Path,
        initial_probes: &BTreeMap<Scalar, bool>,
        rng: Pcg64Mcg,
    ) -> RangePrior {
        let (min_int, max_int) = int_limits(path.leaf_bits());
        let search = BinaryBoundsSearch::from_history(
            NumericDomain::Integer,
            Scalar::Int(min_int),
            Scalar::Int(max_int),
            initial_probes,
            rng,
        );
        log::debug!(
            "integer range prior created with bounds [{:?},{:?}]",
            search.lower,
            search.upper
        );
        RangePrior { core: PriorCore::new(function, path), domain: NumericDomain::Integer, search }
    }

    /// Real interval search over `[-max_pos, max_pos]` of the leaf's width.
    pub fn real(
        function: Arc<Function>,
        path: Path,
        initial_probes: &BTreeMap<Scalar, bool>,
        rng: Pcg64Mcg,
    ) -> RangePrior {
        let (_, max_pos) = real_limits(path.leaf_bits());
        let search = BinaryBoundsSearch::from_history(
            NumericDomain::Real,
            Scalar::Real(-max_pos),
            Scalar::Real(max_pos),
            initial_probes,
            rng,
        );
        log::debug!(
            "real range prior created with bounds [{:?},{:?}]",
            search.lower,
            search.upper
        );
        RangePrior { core: PriorCore::new(function, path), domain: NumericDomain::Real, search }
    }

    pub fn domain(&self) -> NumericDomain {
        self.domain
    }

    fn fmt_bound(bound: Option<Scalar>) -> String {
        match bound {
            Some(v) => v.to_string(),
            None => "None".to_string(),
        }
    }
}

impl Prior for RangePrior {
    fn id(&self) -> &'static str {
        match self.domain {
            NumericDomain::Integer => RangePrior::INTEGER_ID,
            NumericDomain::Real => RangePrior::REAL_ID,
        }
    }

    fn is_done(&mut self) -> bool {
        self.is_invalid() || !self.search.has_next_target()
    }

    fn is_invalid(&self) -> bool {
        self.search.invalid
    }

    fn select_next_probe(&mut self) -> Probe {
        let value = self.search.next_search_target();
        Probe::static_value(self.core.function.clone(), self.core.path.clone(), self.id(), value)
    }

    fn update(&mut self, result: &ProbeResult) {
        self.core.record(result);
        self.search.update_search(result.is_exec_success());
    }

    fn prior_result(&mut self) -> Option<PriorResult> {
        if !self.is_done() {
            return None;
        }
        match self.domain {
            NumericDomain::Integer => {
                // A single value does not count as a range.
                let success = !self.is_invalid()
                    && !self.search.has_next_target()
                    && self.search.lower != self.search.upper;
                let result_data = format!(
                    "{},{}",
                    RangePrior::fmt_bound(self.search.lower),
                    RangePrior::fmt_bound(self.search.upper)
                );
                Some(PriorResult { prior_id: self.id(), success, result_data })
            }
            NumericDomain::Real => {
                let lower = self.search.lower.map(|v| round_for_report(v.as_real()));
                let upper = self.search.upper.map(|v| round_for_report(v.as_real()));
                let success = !self.is_invalid()
                    && !self.search.has_next_target()
                    && match (lower, upper) {
                        (Some(l), Some(u)) => !isclose(l, u),
                        _ => false,
                    };
                let fmt = |b: Option<f64>| match b {
                    Some(v) => v.to_string(),
                    None => "None".to_string(),
                };
                let result_data = format!("{},{}", fmt(lower), fmt(upper));
                Some(PriorResult { prior_id: self.id(), success, result_data })
            }
        }
    }

    fn probe_log(&self) -> Vec<&ProbeResult> {
        self.core.probe_log.iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probes::ExecStatus;
    use crate::types::TypeDesc;
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;

    fn result_path_function(ty: TypeDesc) -> (Arc<Function>, Path) {
        let f = Arc::new(Function::new("m.cpp", "f", TypeDesc::function(ty, vec![])));
        let path = f.paths().remove(0);
        (f, path)
    }

    fn run(prior: &mut RangePrior, accept: impl Fn(Scalar) -> bool) {
        let mut steps = 0;
        while !prior.is_done() {
            let probe = prior.select_next_probe();
            let value = probe.value().unwrap();
            let result = if accept(value) {
                ProbeResult::success(probe, None, vec![])
            } else {
                ProbeResult::failure(probe, None, ExecStatus::VerifyFail)
            };
            prior.update(&result);
            steps += 1;
            assert!(steps < 10_000, "range search failed to converge");
        }
    }

    #[test]
    fn integer_range_finds_interval() {
        let (f, path) = result_path_function(TypeDesc::int(32));
        let history: BTreeMap<Scalar, bool> =
            [(Scalar::Int(0), true), (Scalar::Int(2), true)].into_iter().collect();
        let mut prior =
            RangePrior::integer(f, path, &history, Pcg64Mcg::seed_from_u64(21));
        run(&mut prior, |v| (-12..=77).contains(&v.as_int()));
        let result = prior.prior_result().unwrap();
        assert!(result.success);
        assert_eq!(result.result_data, "-12,77");
    }

    #[test]
    fn integer_range_single_point_is_not_a_range() {
        let (f, path) = result_path_function(TypeDesc::int(32));
        let history: BTreeMap<Scalar, bool> = [(Scalar::Int(5), true)].into_iter().collect();
        let mut prior =
            RangePrior::integer(f, path, &history, Pcg64Mcg::seed_from_u64(22));
        run(&mut prior, |v| v.as_int() == 5);
        let result = prior.prior_result().unwrap();
        assert!(!result.success);
        assert_eq!(result.result_data, "5,5");
    }

    #[test]
    fn invalid_history_reports_no_bounds() {
        let (f, path) = result_path_function(TypeDesc::int(32));
        let history: BTreeMap<Scalar, bool> = [(Scalar::Int(5), false)].into_iter().collect();
        let mut prior =
            RangePrior::integer(f, path, &history, Pcg64Mcg::seed_from_u64(23));
        assert!(prior.is_done());
        assert!(prior.is_invalid());
        let result = prior.prior_result().unwrap();
        assert!(!result.success);
        assert_eq!(result.result_data, "None,None");
    }

    #[test]
    fn real_range_reports_rounded_bounds() {
        let (f, path) = result_path_function(TypeDesc::real(64));
        let history: BTreeMap<Scalar, bool> = [(Scalar::Real(1.0), true)].into_iter().collect();
        let mut prior = RangePrior::real(f, path, &history, Pcg64Mcg::seed_from_u64(24));
        run(&mut prior, |v| (0.0..=10.0).contains(&v.as_real()));
        let result = prior.prior_result().unwrap();
        assert!(result.success);
        let parts: Vec<f64> =
            result.result_data.split(',').map(|s| s.parse().unwrap()).collect();
        assert!(parts[0] >= -0.05 && parts[0] <= 0.05, "lower {}", parts[0]);
        assert!(parts[1] >= 9.8 && parts[1] <= 10.0, "upper {}", parts[1]);
    }
}
