// SPDX-License-Identifier: Apache-2.0

//! End-to-end runs of the prior tree against simulated oracles.

use std::sync::Arc;

use pretty_assertions::assert_eq;

use augur::function::Function;
use augur::oracle::{run_prior, TestCase};
use augur::paths::Path;
use augur::priors::{build_priors, Prior};
use augur::probes::ExecLogEntry;
use augur::sim_oracle::{IntervalRule, SimOracle};
use augur::types::TypeDesc;
use augur::value::Scalar;

fn result_path(ret: TypeDesc) -> (Arc<Function>, Path) {
    let f = Arc::new(Function::new("m.cpp", "f", TypeDesc::function(ret, vec![])));
    let path = f.paths().remove(0);
    (f, path)
}

fn log(entries: &[(&str, &str, u64)]) -> Vec<ExecLogEntry> {
    entries.iter().map(|(b, a, f)| ExecLogEntry::new(*b, *a, *f)).collect()
}

fn int_rule(min: i64, max: i64) -> Option<IntervalRule> {
    Some(IntervalRule::new(Scalar::Int(min), Scalar::Int(max)))
}

#[test]
fn value_sensitive_result_gets_offset_and_scale_windows() {
    let (f, path) = result_path(TypeDesc::int(32));
    // The observed values 4 and 60 do not both broadcast (only [0, 50] is
    // accepted), so the search stays relative to the original value.
    let mut oracle = SimOracle::new(log(&[("0", "4", 2), ("0", "60", 1)]));
    oracle.static_rule = int_rule(0, 50);
    oracle.offset_rule = int_rule(-8, 8);
    oracle.scale_rule = int_rule(1, 3);

    let mut prior = build_priors(f, path, false, 101);
    let cases = [TestCase::new("t0")];
    let result = run_prior(&mut prior, &mut oracle, &cases).unwrap();

    assert!(result.success);
    assert_eq!(
        result.result_data,
        "Null Prior#Broadcast Prior#Integer Offset Prior#Integer Scale Prior"
    );
    let subs = prior.sub_results();
    let offset = subs.iter().find(|r| r.prior_id == "Integer Offset Prior").unwrap();
    assert!(offset.success);
    assert_eq!(offset.result_data, "8,8");
    let scale = subs.iter().find(|r| r.prior_id == "Integer Scale Prior").unwrap();
    assert!(scale.success);
    // Factors in [1, 3] leave room above the original value but none below.
    assert_eq!(scale.result_data, "0,2");
}

#[test]
fn unconstrained_real_result_accepts_all_values() {
    let (f, path) = result_path(TypeDesc::real(64));
    let mut oracle = SimOracle::new(log(&[("1.5", "2.5", 3)]));
    oracle.static_rule =
        Some(IntervalRule::new(Scalar::Real(-f64::MAX), Scalar::Real(f64::MAX)));

    let mut prior = build_priors(f, path, false, 102);
    let cases = [TestCase::new("t0")];
    let result = run_prior(&mut prior, &mut oracle, &cases).unwrap();

    assert!(result.success);
    assert_eq!(result.result_data, "Null Prior#Broadcast Prior#All Reals Prior");
    assert!(prior.sub_results().iter().all(|r| r.success));
}

#[test]
fn boolean_result_tries_both_truth_values() {
    let (f, path) = result_path(TypeDesc::int(1));
    let mut oracle = SimOracle::new(log(&[("0", "1", 4)]));
    oracle.static_rule = int_rule(0, 1);

    let mut prior = build_priors(f, path, false, 103);
    let cases = [TestCase::new("t0")];
    let result = run_prior(&mut prior, &mut oracle, &cases).unwrap();

    assert!(result.success);
    assert_eq!(result.result_data, "Null Prior#Boolean Prior");
}

#[test]
fn failing_null_probe_concludes_without_value_search() {
    let (f, path) = result_path(TypeDesc::int(32));
    let mut oracle = SimOracle::new(vec![]);
    oracle.null_fails = true;

    let mut prior = build_priors(f, path, false, 104);
    let cases = [TestCase::new("t0")];
    let result = run_prior(&mut prior, &mut oracle, &cases).unwrap();

    assert!(!result.success);
    assert_eq!(result.result_data, "Null Prior");
    assert_eq!(prior.probe_log().len(), 1);
}

#[test]
fn probes_fan_out_over_test_cases() {
    let (f, path) = result_path(TypeDesc::int(1));
    let mut oracle = SimOracle::new(log(&[("0", "0", 1)]));
    oracle.static_rule = int_rule(0, 1);

    let mut prior = build_priors(f, path, false, 105);
    let cases = [TestCase::new("t0"), TestCase::new("t1"), TestCase::new("t2")];
    run_prior(&mut prior, &mut oracle, &cases).unwrap();

    // One null probe and two boolean probes, each run on three test cases.
    assert_eq!(prior.probe_log().len(), 9);
}