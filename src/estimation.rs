// MIT License
//
// Copyright (c) 2026 Raja Lehtihet & Wael El Oraiby
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.
//
//! Estimates computed from populated sketches.
//!
//! [`estimate_cardinality_liquid_legions`] inverts the expected number of
//! active registers of a Liquid Legions sketch (exponentially distributed
//! index) to recover the number of distinct items inserted.
//! [`value_histogram`] counts registers per value of one column, the usual
//! first step of a frequency estimate.

use std::collections::BTreeMap;

use tracing::debug;

use crate::SketchError;
use crate::any_sketch::{AnySketch, Register};

/// Euler–Mascheroni constant.
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;
const E1_EPSILON: f64 = 1e-16;
const E1_MAX_ITERATIONS: usize = 200;
/// Doubling steps before the search gives up on reaching the target.
const MAX_DOUBLINGS: u32 = 63;

/// Estimates the number of distinct items in a Liquid Legions sketch.
///
/// `decay_rate` is the rate of the exponential index distribution,
/// `num_registers` its number of values, and `active_registers` the number
/// of populated registers. The result is the smallest cardinality whose
/// expected active register count exceeds `active_registers`, so an empty
/// sketch estimates `1`.
///
/// # Errors
/// Returns [`SketchError::InvalidParameter`] unless `decay_rate > 1`,
/// `num_registers > 0` and `active_registers < num_registers`, or when no
/// representable cardinality reaches `active_registers`.
///
/// # Example
/// ```rust
/// use anysketch::estimation::estimate_cardinality_liquid_legions;
///
/// assert_eq!(estimate_cardinality_liquid_legions(10.0, 100_000, 0).unwrap(), 1);
/// let estimate = estimate_cardinality_liquid_legions(10.0, 100_000, 50_000).unwrap();
/// assert!(estimate > 50_000);
/// ```
pub fn estimate_cardinality_liquid_legions(
    decay_rate: f64,
    num_registers: u64,
    active_registers: u64,
) -> Result<u64, SketchError> {
    if !(decay_rate.is_finite() && decay_rate > 1.0) {
        return Err(SketchError::InvalidParameter(
            "decay_rate must be finite and greater than 1",
        ));
    }
    if num_registers == 0 {
        return Err(SketchError::InvalidParameter(
            "num_registers must be greater than zero",
        ));
    }
    if active_registers >= num_registers {
        return Err(SketchError::InvalidParameter(
            "active_registers must be less than num_registers",
        ));
    }

    let estimate = invert_monotonic(
        |cardinality| expected_active_registers(decay_rate, num_registers, cardinality),
        active_registers,
    )?;
    debug!(
        decay_rate,
        num_registers, active_registers, estimate, "Estimated Liquid Legions cardinality."
    );
    Ok(estimate)
}

/// Expected number of populated registers after inserting `cardinality`
/// distinct items, truncated toward zero.
fn expected_active_registers(decay_rate: f64, num_registers: u64, cardinality: u64) -> u64 {
    if cardinality == 0 {
        return 0;
    }
    let exp_rate = decay_rate.exp();
    let t = cardinality as f64 / num_registers as f64;
    let low = exponential_integral(decay_rate * t / (exp_rate - 1.0));
    let high = exponential_integral(decay_rate * exp_rate * t / (exp_rate - 1.0));
    let expected = (1.0 - (low - high) / decay_rate) * num_registers as f64;
    expected.max(0.0) as u64
}

/// Exponential integral `E1(x)` for `x > 0`.
///
/// Power series below 1, Lentz continued fraction above.
fn exponential_integral(x: f64) -> f64 {
    if x <= 1.0 {
        let mut sum = 0.0;
        let mut term = 1.0;
        for k in 1..=E1_MAX_ITERATIONS {
            let k = k as f64;
            term *= -x / k;
            let delta = term / k;
            sum += delta;
            if delta.abs() < sum.abs() * E1_EPSILON {
                break;
            }
        }
        -EULER_GAMMA - x.ln() - sum
    } else {
        let tiny = f64::MIN_POSITIVE / E1_EPSILON;
        let mut b = x + 1.0;
        let mut c = 1.0 / tiny;
        let mut d = 1.0 / b;
        let mut h = d;
        for i in 1..=E1_MAX_ITERATIONS {
            let i = i as f64;
            let a = -i * i;
            b += 2.0;
            d = 1.0 / (a * d + b);
            c = b + a / c;
            let delta = c * d;
            h *= delta;
            if (delta - 1.0).abs() < E1_EPSILON {
                break;
            }
        }
        h * (-x).exp()
    }
}

/// Inverts a non-decreasing `function` with `function(0) <= target`.
///
/// Doubles an upper bound until it reaches `target`, then binary searches
/// within it.
fn invert_monotonic(function: impl Fn(u64) -> u64, target: u64) -> Result<u64, SketchError> {
    let mut left = 0_u64;
    let mut right = 1_u64;
    let mut doublings = 0;
    while function(right) < target {
        if doublings == MAX_DOUBLINGS {
            return Err(SketchError::InvalidParameter(
                "active_registers is not reachable by any cardinality",
            ));
        }
        left = right;
        right *= 2;
        doublings += 1;
    }

    let midpoint = |left: u64, right: u64| ((u128::from(left) + u128::from(right)) / 2) as u64;
    let mut mid = midpoint(left, right);
    while right > left {
        if function(mid) > target {
            right = mid.saturating_sub(1);
        } else {
            left = mid + 1;
        }
        mid = midpoint(left, right);
    }
    Ok(mid)
}

/// Counts the registers passing `filter` per value of column `value_name`.
///
/// # Errors
/// Returns [`SketchError::UnknownValue`] when the sketch has no value
/// function named `value_name`.
pub fn value_histogram<F>(
    sketch: &AnySketch,
    value_name: &str,
    filter: F,
) -> Result<BTreeMap<i64, u64>, SketchError>
where
    F: Fn(&Register<'_>) -> bool,
{
    let column = sketch
        .value_index(value_name)
        .ok_or_else(|| SketchError::UnknownValue(value_name.to_string()))?;

    let mut histogram = BTreeMap::new();
    for register in sketch.iter().filter(|register| filter(register)) {
        *histogram.entry(register.values[column]).or_insert(0) += 1;
    }
    Ok(histogram)
}
