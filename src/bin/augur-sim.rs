// SPDX-License-Identifier: Apache-2.0

//! Runs the prior tree against a simulated oracle described by a scenario
//! file, printing one JSON line per concluded prior. Useful for exercising
//! the search machinery without a real compile-run-verify pipeline.
//!
//! Scenario format:
//!
//! ```json
//! {
//!   "function": {"module": "m.cpp", "name": "f", "return": "i32", "args": ["f64*"]},
//!   "path_index": 0,
//!   "null_log": [["0", "4", 2], ["0", "20", 1]],
//!   "rules": {"static": [-10, 50], "offset": [-3, 5], "scale": [0, 2]}
//! }
//! ```
//!
//! Omitting `path_index` runs every probeable path of the function. Rules
//! are inclusive acceptance intervals per probe kind; a probe kind without
//! a rule always fails.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Deserialize;

use augur::function::Function;
use augur::oracle::{run_prior, TestCase};
use augur::paths::Path;
use augur::priors::{build_priors, Prior};
use augur::probes::ExecLogEntry;
use augur::sim_oracle::{IntervalRule, SimOracle};
use augur::types::TypeDesc;
use augur::value::{NumericDomain, Scalar};

#[derive(Parser, Debug)]
#[command(name = "augur-sim", about = "Run the prior tree against a simulated oracle")]
struct Args {
    /// Scenario JSON file.
    scenario: PathBuf,

    /// Seed for all randomness in the searches.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Skip value search for argument paths the call never writes to.
    #[arg(long)]
    skip_immutables: bool,
}

#[derive(Deserialize, Debug)]
struct FunctionSpec {
    module: String,
    name: String,
    #[serde(rename = "return")]
    ret: String,
    #[serde(default)]
    args: Vec<String>,
}

#[derive(Deserialize, Debug, Default)]
struct Rules {
    #[serde(rename = "static")]
    static_rule: Option<(f64, f64)>,
    offset: Option<(f64, f64)>,
    scale: Option<(f64, f64)>,
}

#[derive(Deserialize, Debug)]
struct Scenario {
    function: FunctionSpec,
    path_index: Option<usize>,
    #[serde(default)]
    null_log: Vec<(String, String, u64)>,
    #[serde(default)]
    null_fails: bool,
    #[serde(default)]
    rules: Rules,
    #[serde(default)]
    test_cases: Vec<String>,
}

fn parse_type(token: &str) -> Result<TypeDesc> {
    let token = token.trim();
    if let Some(pointee) = token.strip_suffix('*') {
        return Ok(TypeDesc::Pointer(Box::new(parse_type(pointee)?)));
    }
    match token {
        "void" => Ok(TypeDesc::Void),
        "f32" => Ok(TypeDesc::real(32)),
        "f64" => Ok(TypeDesc::real(64)),
        "i1" => Ok(TypeDesc::int(1)),
        "i8" => Ok(TypeDesc::int(8)),
        "i16" => Ok(TypeDesc::int(16)),
        "i32" => Ok(TypeDesc::int(32)),
        "i64" => Ok(TypeDesc::int(64)),
        _ => bail!("unsupported type token '{}'", token),
    }
}

fn interval_rule(rule: Option<(f64, f64)>, domain: NumericDomain) -> Option<IntervalRule> {
    rule.map(|(min, max)| match domain {
        NumericDomain::Integer => {
            IntervalRule::new(Scalar::Int(min as i64), Scalar::Int(max as i64))
        }
        NumericDomain::Real => IntervalRule::new(Scalar::Real(min), Scalar::Real(max)),
    })
}

fn oracle_for_path(scenario: &Scenario, path: &Path) -> SimOracle {
    let domain = path.domain();
    let null_log = scenario
        .null_log
        .iter()
        .map(|(before, after, freq)| ExecLogEntry::new(before.clone(), after.clone(), *freq))
        .collect();
    SimOracle {
        null_log,
        null_fails: scenario.null_fails,
        static_rule: interval_rule(scenario.rules.static_rule, domain),
        offset_rule: interval_rule(scenario.rules.offset, domain),
        scale_rule: interval_rule(scenario.rules.scale, domain),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let text = fs::read_to_string(&args.scenario)
        .with_context(|| format!("reading scenario {}", args.scenario.display()))?;
    let scenario: Scenario =
        serde_json::from_str(&text).context("parsing scenario JSON")?;

    let ret = parse_type(&scenario.function.ret)?;
    let fn_args = scenario
        .function
        .args
        .iter()
        .map(|t| parse_type(t))
        .collect::<Result<Vec<_>>>()?;
    let function = Arc::new(Function::new(
        scenario.function.module.clone(),
        scenario.function.name.clone(),
        TypeDesc::function(ret, fn_args),
    ));

    let mut paths = function.paths();
    if paths.is_empty() {
        bail!("function {} has no probeable paths", function);
    }
    if let Some(index) = scenario.path_index {
        if index >= paths.len() {
            bail!("path index {} out of range; function has {} paths", index, paths.len());
        }
        paths = vec![paths.swap_remove(index)];
    }

    let test_cases: Vec<TestCase> = if scenario.test_cases.is_empty() {
        vec![TestCase::new("default")]
    } else {
        scenario.test_cases.iter().map(|name| TestCase::new(name.as_str())).collect()
    };

    for path in paths {
        log::info!("running priors for {} {}", function, path);
        let mut oracle = oracle_for_path(&scenario, &path);
        let mut prior =
            build_priors(function.clone(), path.clone(), args.skip_immutables, args.seed);
        let result = run_prior(&mut prior, &mut oracle, &test_cases);
        for sub in prior.sub_results() {
            println!(
                "{}",
                serde_json::json!({
                    "path": path.to_string(),
                    "prior": sub.prior_id,
                    "success": sub.success,
                    "data": sub.result_data,
                })
            );
        }
        match result {
            Some(r) => println!(
                "{}",
                serde_json::json!({
                    "path": path.to_string(),
                    "prior": r.prior_id,
                    "success": r.success,
                    "data": r.result_data,
                    "probes": prior.probe_log().len(),
                })
            ),
            None => log::warn!("priors for {} {} produced no result", function, path),
        }
    }
    Ok(())
}
