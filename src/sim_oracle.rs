// SPDX-License-Identifier: Apache-2.0

//! Simulated oracles: judge probes against configured acceptance intervals
//! instead of compiling and running anything. Used by the `augur-sim` binary
//! and the integration tests.

use crate::oracle::{Oracle, TestCase};
use crate::probes::{ExecLogEntry, ExecStatus, Probe, ProbeKind, ProbeResult};
use crate::value::Scalar;

/// An inclusive acceptance interval for one probe kind.
#[derive(Clone, Copy, Debug)]
pub struct IntervalRule {
    pub min: Scalar,
    pub max: Scalar,
}

impl IntervalRule {
    pub fn new(min: Scalar, max: Scalar) -> IntervalRule {
        IntervalRule { min, max }
    }

    pub fn contains(&self, value: Scalar) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Simulates a probed function: null probes report a fixed execution log,
/// perturbing probes pass when their value falls into the rule for their
/// kind. A probe kind without a rule always fails, as if the perturbation
/// broke the program.
#[derive(Clone, Debug, Default)]
pub struct SimOracle {
    pub null_log: Vec<ExecLogEntry>,
    pub null_fails: bool,
    pub static_rule: Option<IntervalRule>,
    pub offset_rule: Option<IntervalRule>,
    pub scale_rule: Option<IntervalRule>,
}

impl SimOracle {
    pub fn new(null_log: Vec<ExecLogEntry>) -> SimOracle {
        SimOracle { null_log, ..SimOracle::default() }
    }

    fn judge(&self, rule: Option<IntervalRule>, value: Scalar) -> bool {
        rule.map(|r| r.contains(value)).unwrap_or(false)
    }
}

impl Oracle for SimOracle {
    fn evaluate(&mut self, probe: &Probe, test_case: &TestCase) -> ProbeResult {
        let test_case = Some(test_case.name.clone());
        let accepted = match probe.kind {
            ProbeKind::Null => {
                return if self.null_fails {
                    ProbeResult::failure(probe.clone(), test_case, ExecStatus::RunFail)
                } else {
                    ProbeResult::success(probe.clone(), test_case, self.null_log.clone())
                };
            }
            ProbeKind::Static(v) => self.judge(self.static_rule, v),
            ProbeKind::Offset(v) => self.judge(self.offset_rule, v),
            ProbeKind::Scale(v) => self.judge(self.scale_rule, v),
        };
        if accepted {
            ProbeResult::success(probe.clone(), test_case, vec![])
        } else {
            ProbeResult::failure(probe.clone(), test_case, ExecStatus::VerifyFail)
        }
    }
}

/// An oracle judging perturbing probes with an arbitrary closure. Handy in
/// tests that need acceptance shapes an interval cannot express.
pub struct PredicateOracle<F> {
    pub null_log: Vec<ExecLogEntry>,
    judge: F,
}

impl<F: FnMut(&Probe) -> bool> PredicateOracle<F> {
    pub fn new(null_log: Vec<ExecLogEntry>, judge: F) -> PredicateOracle<F> {
        PredicateOracle { null_log, judge }
    }
}

impl<F: FnMut(&Probe) -> bool> Oracle for PredicateOracle<F> {
    fn evaluate(&mut self, probe: &Probe, test_case: &TestCase) -> ProbeResult {
        let test_case = Some(test_case.name.clone());
        if probe.kind == ProbeKind::Null {
            return ProbeResult::success(probe.clone(), test_case, self.null_log.clone());
        }
        if (self.judge)(probe) {
            ProbeResult::success(probe.clone(), test_case, vec![])
        } else {
            ProbeResult::failure(probe.clone(), test_case, ExecStatus::VerifyFail)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::Function;
    use crate::types::TypeDesc;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn static_probe(v: i64) -> Probe {
        let f = Arc::new(Function::new(
            "m.cpp",
            "f",
            TypeDesc::function(TypeDesc::int(32), vec![]),
        ));
        let path = f.paths().remove(0);
        Probe::static_value(f, path, "Test Prior", Scalar::Int(v))
    }

    #[test]
    fn interval_rule_is_inclusive() {
        let rule = IntervalRule::new(Scalar::Int(-2), Scalar::Int(7));
        assert!(rule.contains(Scalar::Int(-2)));
        assert!(rule.contains(Scalar::Int(7)));
        assert!(!rule.contains(Scalar::Int(8)));
    }

    #[test]
    fn missing_rule_rejects() {
        let mut oracle = SimOracle::new(vec![]);
        oracle.static_rule = Some(IntervalRule::new(Scalar::Int(0), Scalar::Int(10)));
        let tc = TestCase::new("t");
        assert!(oracle.evaluate(&static_probe(5), &tc).is_exec_success());
        assert!(!oracle.evaluate(&static_probe(11), &tc).is_exec_success());
        oracle.static_rule = None;
        assert!(!oracle.evaluate(&static_probe(5), &tc).is_exec_success());
    }

    #[test]
    fn null_probe_reports_configured_log() {
        let mut oracle = SimOracle::new(vec![ExecLogEntry::new("1", "2", 3)]);
        let f = Arc::new(Function::new(
            "m.cpp",
            "f",
            TypeDesc::function(TypeDesc::int(32), vec![]),
        ));
        let path = f.paths().remove(0);
        let probe = Probe::null(f, path, "Test Prior");
        let result = oracle.evaluate(&probe, &TestCase::new("t"));
        assert!(result.is_exec_success());
        assert_eq!(result.exec_log.len(), 1);
    }
}
