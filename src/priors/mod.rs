// SPDX-License-Identifier: Apache-2.0

//! Priors: assumptions about which values a probe path tolerates, each
//! driving its own search over the oracle.

use std::sync::Arc;

use crate::function::Function;
use crate::paths::Path;
use crate::probes::{Probe, ProbeResult};

mod bounded;
mod composite;
mod range;
mod sample;

pub use bounded::{BoundedKind, BoundedPrior, BoundedState};
pub use composite::{build_priors, CompositePrior, PriorState};
pub use range::RangePrior;
pub use sample::{AllValuesPrior, BooleanPrior, BroadcastPrior, NullPrior};

/// Outcome of a fully evaluated prior.
///
/// `result_data` is a compact wire string whose shape depends on the prior
/// (`value,success` pairs joined with `#`, `lower,upper` bounds, or joined
/// sub-prior ids). Values render with Rust's default formatting: whole reals
/// print without a trailing `.0` (`5`, not `5.0`) and booleans lowercase
/// (`true`/`false`). Consumers parsing the data should accept both
/// renderings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PriorResult {
    pub prior_id: &'static str,
    pub success: bool,
    pub result_data: String,
}

/// A prior evaluates a value-range assumption probe by probe: callers loop
/// `is_done` / `select_next_probe` / `update` and read off `prior_result`.
pub trait Prior {
    fn id(&self) -> &'static str;

    /// Whether evaluation has finished. Must be consulted before
    /// `select_next_probe`; priors advance their search here.
    fn is_done(&mut self) -> bool;

    fn is_invalid(&self) -> bool;

    /// The next probe to evaluate. Only valid after `is_done` returned
    /// false.
    fn select_next_probe(&mut self) -> Probe;

    /// Feed back the oracle's result for the most recent probe.
    fn update(&mut self, result: &ProbeResult);

    /// The conclusive result, or `None` while evaluation is still under
    /// way.
    fn prior_result(&mut self) -> Option<PriorResult>;

    /// All probe results observed so far.
    fn probe_log(&self) -> Vec<&ProbeResult>;
}

/// Shared state every concrete prior carries.
#[derive(Clone, Debug)]
pub(crate) struct PriorCore {
    pub function: Arc<Function>,
    pub path: Path,
    pub probe_log: Vec<ProbeResult>,
}

impl PriorCore {
    pub fn new(function: Arc<Function>, path: Path) -> PriorCore {
        PriorCore { function, path, probe_log: Vec::new() }
    }

    pub fn record(&mut self, result: &ProbeResult) {
        self.probe_log.push(result.clone());
    }
}
