// SPDX-License-Identifier: Apache-2.0

//! Probes (the experiments a prior asks for) and probe results (what the
//! oracle observed when running one).

use std::fmt;
use std::sync::Arc;

use crate::function::Function;
use crate::paths::Path;
use crate::value::Scalar;

/// Outcome of one stage of a probe evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecStatus {
    Success,
    CompileFail,
    RunFail,
    VerifyFail,
    CompileTimeout,
    RunTimeout,
    VerifyTimeout,
    NotEvaluated,
}

impl fmt::Display for ExecStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecStatus::Success => "SUCCESS",
            ExecStatus::CompileFail => "COMPILE_FAIL",
            ExecStatus::RunFail => "RUN_FAIL",
            ExecStatus::VerifyFail => "VERIFY_FAIL",
            ExecStatus::CompileTimeout => "COMPILE_TIMEOUT",
            ExecStatus::RunTimeout => "RUN_TIMEOUT",
            ExecStatus::VerifyTimeout => "VERIFY_TIMEOUT",
            ExecStatus::NotEvaluated => "NOT_EVALUATED",
        };
        write!(f, "{}", s)
    }
}

/// What a probe does to the value at its path.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ProbeKind {
    /// Observe only; log original values without perturbing them.
    Null,
    /// Force the value to a constant.
    Static(Scalar),
    /// Add a constant to the value.
    Offset(Scalar),
    /// Multiply the value by a constant factor.
    Scale(Scalar),
}

#[derive(Clone, Debug)]
pub struct Probe {
    pub function: Arc<Function>,
    pub path: Path,
    /// Identifier of the prior that issued this probe.
    pub prior_id: &'static str,
    pub kind: ProbeKind,
}

impl Probe {
    pub fn null(function: Arc<Function>, path: Path, prior_id: &'static str) -> Probe {
        Probe { function, path, prior_id, kind: ProbeKind::Null }
    }

    pub fn static_value(
        function: Arc<Function>,
        path: Path,
        prior_id: &'static str,
        value: Scalar,
    ) -> Probe {
        Probe { function, path, prior_id, kind: ProbeKind::Static(value) }
    }

    pub fn offset(
        function: Arc<Function>,
        path: Path,
        prior_id: &'static str,
        delta: Scalar,
    ) -> Probe {
        Probe { function, path, prior_id, kind: ProbeKind::Offset(delta) }
    }

    pub fn scale(
        function: Arc<Function>,
        path: Path,
        prior_id: &'static str,
        factor: Scalar,
    ) -> Probe {
        Probe { function, path, prior_id, kind: ProbeKind::Scale(factor) }
    }

    /// The probe's perturbation value, if it has one.
    pub fn value(&self) -> Option<Scalar> {
        match self.kind {
            ProbeKind::Null => None,
            ProbeKind::Static(v) | ProbeKind::Offset(v) | ProbeKind::Scale(v) => Some(v),
        }
    }
}

impl fmt::Display for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} -- {}", self.function, self.path, self.prior_id)?;
        match self.kind {
            ProbeKind::Null => write!(f, " # Null"),
            ProbeKind::Static(v) => write!(f, " # Static {}", v),
            ProbeKind::Offset(v) => write!(f, " # Offset {}", v),
            ProbeKind::Scale(v) => write!(f, " # Scale {}", v),
        }
    }
}

/// One `before -> after` observation of the probed location, with how often
/// it occurred during the run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecLogEntry {
    pub before: String,
    pub after: String,
    pub freq: u64,
}

impl ExecLogEntry {
    pub fn new(before: impl Into<String>, after: impl Into<String>, freq: u64) -> ExecLogEntry {
        ExecLogEntry { before: before.into(), after: after.into(), freq }
    }
}

/// Everything the oracle reports back for one probe evaluation against one
/// test case.
#[derive(Clone, Debug)]
pub struct ProbeResult {
    pub probe: Probe,
    pub test_case: Option<String>,
    pub compile_status: ExecStatus,
    pub run_status: ExecStatus,
    pub verify_status: ExecStatus,
    pub objective: Option<f64>,
    pub exec_log: Vec<ExecLogEntry>,
}

impl ProbeResult {
    pub fn new(probe: Probe, test_case: Option<String>) -> ProbeResult {
        ProbeResult {
            probe,
            test_case,
            compile_status: ExecStatus::NotEvaluated,
            run_status: ExecStatus::NotEvaluated,
            verify_status: ExecStatus::NotEvaluated,
            objective: None,
            exec_log: Vec::new(),
        }
    }

    /// A fully successful evaluation, optionally with observed values.
    pub fn success(probe: Probe, test_case: Option<String>, exec_log: Vec<ExecLogEntry>) -> ProbeResult {
        ProbeResult {
            compile_status: ExecStatus::Success,
            run_status: ExecStatus::Success,
            verify_status: ExecStatus::Success,
            ..ProbeResult::new(probe, test_case)
        }
        .with_exec_log(exec_log)
    }

    /// An evaluation that failed at the given stage.
    pub fn failure(probe: Probe, test_case: Option<String>, at: ExecStatus) -> ProbeResult {
        let mut r = ProbeResult::new(probe, test_case);
        match at {
            ExecStatus::CompileFail | ExecStatus::CompileTimeout => r.compile_status = at,
            ExecStatus::RunFail | ExecStatus::RunTimeout => {
                r.compile_status = ExecStatus::Success;
                r.run_status = at;
            }
            ExecStatus::VerifyFail | ExecStatus::VerifyTimeout => {
                r.compile_status = ExecStatus::Success;
                r.run_status = ExecStatus::Success;
                r.verify_status = at;
            }
            _ => panic!("not a failure status: {}", at),
        }
        r
    }

    pub fn with_exec_log(mut self, exec_log: Vec<ExecLogEntry>) -> ProbeResult {
        self.exec_log = exec_log;
        self
    }

    /// The probe counts as accepted only when compile, run and verify all
    /// succeeded.
    pub fn is_exec_success(&self) -> bool {
        self.compile_status == ExecStatus::Success
            && self.run_status == ExecStatus::Success
            && self.verify_status == ExecStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeDesc;
    use pretty_assertions::assert_eq;

    fn probe() -> Probe {
        let f = Arc::new(Function::new(
            "m.cpp",
            "f",
            TypeDesc::function(TypeDesc::int(32), vec![]),
        ));
        let path = f.paths().remove(0);
        Probe::static_value(f, path, "Test Prior", Scalar::Int(7))
    }

    #[test]
    fn success_requires_all_stages() {
        let ok = ProbeResult::success(probe(), None, vec![]);
        assert!(ok.is_exec_success());
        let fail = ProbeResult::failure(probe(), None, ExecStatus::RunTimeout);
        assert!(!fail.is_exec_success());
        assert_eq!(fail.compile_status, ExecStatus::Success);
        assert_eq!(fail.run_status, ExecStatus::RunTimeout);
        assert_eq!(fail.verify_status, ExecStatus::NotEvaluated);
    }

    #[test]
    fn probe_display_names_kind() {
        assert_eq!(probe().to_string(), "f Z.T-i32 -- Test Prior # Static 7");
    }
}
