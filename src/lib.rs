// SPDX-License-Identifier: Apache-2.0

//! Empirical value-range discovery for instrumented functions.
//!
//! For each probeable access path of a function (its result, pointed-to
//! arguments, struct fields, sub-words of wide integers), a tree of priors
//! proposes perturbations -- static values, offsets, scale factors -- and an
//! [`oracle::Oracle`] evaluates each one by compiling, running and verifying
//! the probed program. The priors conclude with the value ranges the path
//! empirically tolerates.
//!
//! The typical entry point is [`priors::build_priors`] for a path of a
//! [`function::Function`], driven to completion with [`oracle::run_prior`].

pub mod bounds_search;
pub mod function;
pub mod oracle;
pub mod paths;
pub mod priors;
pub mod probes;
pub mod rand_utils;
pub mod search;
pub mod sim_oracle;
pub mod types;
pub mod value;
