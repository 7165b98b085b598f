// SPDX-License-Identifier: Apache-2.0

//! Unique random sampling helpers used to seed priors and verification
//! searches.

use std::collections::BTreeSet;

use rand::Rng;

const MAX_SAMPLE_TRIES: usize = 100;

/// Draw `num` unique integers from `[start, end]` (both ends shifted inward
/// by one when `open_interval` is set). The interval must be large enough to
/// hold `num` unique values.
///
/// Results come back sorted. When the interval holds exactly one more value
/// than requested, all of its values are returned.
pub fn unique_random_integers<R: Rng>(
    start: i64,
    end: i64,
    num: usize,
    open_interval: bool,
    rng: &mut R,
) -> Vec<i64> {
    let (start, end) = if open_interval {
        (start + 1, end - 1)
    } else {
        (start, end)
    };
    assert!(start <= end, "empty sampling interval [{},{}]", start, end);
    let span = end as i128 - start as i128 + 1;
    assert!(
        span >= num as i128,
        "interval [{},{}] cannot hold {} unique values",
        start,
        end,
        num
    );
    if num == 0 {
        return Vec::new();
    }
    if start == end {
        return vec![start];
    }
    if span == num as i128 + 1 {
        return (start..=end).collect();
    }
    let mut picked: BTreeSet<i64> = BTreeSet::new();
    for _ in 0..MAX_SAMPLE_TRIES {
        for _ in picked.len()..num {
            picked.insert(rng.gen_range(start..=end));
        }
        if picked.len() == num {
            break;
        }
    }
    picked.into_iter().collect()
}

/// Draw `num` unique reals uniformly from `[start, end)`. A degenerate
/// interval yields the single point.
pub fn unique_random_reals<R: Rng>(start: f64, end: f64, num: usize, rng: &mut R) -> Vec<f64> {
    assert!(start <= end, "empty sampling interval [{},{})", start, end);
    if num == 0 {
        return Vec::new();
    }
    if start == end {
        return vec![start];
    }
    let mut picked: BTreeSet<u64> = BTreeSet::new();
    for _ in 0..MAX_SAMPLE_TRIES {
        for _ in picked.len()..num {
            picked.insert(rng.gen_range(start..end).to_bits());
        }
        if picked.len() == num {
            break;
        }
    }
    picked.into_iter().map(f64::from_bits).collect()
}
