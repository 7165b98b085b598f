// SPDX-License-Identifier: Apache-2.0

//! The oracle abstraction: something that can evaluate a probe against a
//! test case, and the loop that drives a prior over it.

use crate::priors::{Prior, PriorResult};
use crate::probes::{Probe, ProbeResult};

/// A named workload the instrumented function is exercised with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestCase {
    pub name: String,
}

impl TestCase {
    pub fn new(name: impl Into<String>) -> TestCase {
        TestCase { name: name.into() }
    }
}

/// Evaluates probes. Implementations compile, run and verify the probed
/// program; evaluation is expensive, which is what the priors are built to
/// economize on.
pub trait Oracle {
    fn evaluate(&mut self, probe: &Probe, test_case: &TestCase) -> ProbeResult;
}

/// Drive `prior` to completion against `oracle`, evaluating every probe on
/// every test case, and return its result.
pub fn run_prior<P: Prior + ?Sized, O: Oracle + ?Sized>(
    prior: &mut P,
    oracle: &mut O,
    test_cases: &[TestCase],
) -> Option<PriorResult> {
    assert!(!test_cases.is_empty(), "at least one test case required");
    while !prior.is_done() {
        let probe = prior.select_next_probe();
        log::debug!("evaluating probe: {}", probe);
        for test_case in test_cases {
            let result = oracle.evaluate(&probe, test_case);
            prior.update(&result);
        }
    }
    prior.prior_result()
}
