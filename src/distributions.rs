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
//! Distributions: deterministic mappings from an item (and its metadata) to
//! an integer in a closed range `[min_value, max_value]`.
//!
//! Every distribution except [`Distribution::oracle`] and
//! [`Distribution::constant`] derives its value from the item's fingerprint,
//! interpreted as an unsigned 64-bit integer. Parameters are validated when
//! the distribution is built, never at insert time.

use crate::fingerprinters::SharedFingerprinter;
use crate::{ItemMetadata, SketchError};

/// Largest range a geometric distribution supports: 64 trailing-zero
/// counts plus the all-zero fingerprint.
pub const MAX_GEOMETRIC_SIZE: u128 = 65;

#[derive(Debug, Clone)]
enum DistributionKind {
    Constant,
    Uniform(SharedFingerprinter),
    Exponential {
        fingerprinter: SharedFingerprinter,
        rate: f64,
        exp_rate: f64,
        size: u64,
    },
    Geometric(SharedFingerprinter),
    Oracle {
        key: String,
    },
}

/// A bounded, deterministic mapping from items to integers.
///
/// # Example
/// ```rust
/// use std::sync::Arc;
///
/// use anysketch::ItemMetadata;
/// use anysketch::distributions::Distribution;
/// use anysketch::fingerprinters::SaltedFingerprinter;
///
/// let distribution =
///     Distribution::uniform(Arc::new(SaltedFingerprinter::farm("Index")), 0, 99).unwrap();
/// let value = distribution.apply("user-1", &ItemMetadata::new()).unwrap();
/// assert!((0..=99).contains(&value));
/// ```
#[derive(Debug, Clone)]
pub struct Distribution {
    min_value: i64,
    max_value: i64,
    kind: DistributionKind,
}

impl Distribution {
    /// Creates a distribution that always returns `value`.
    pub fn constant(value: i64) -> Self {
        Self {
            min_value: value,
            max_value: value,
            kind: DistributionKind::Constant,
        }
    }

    /// Creates a uniform distribution over `[min_value, max_value]`.
    ///
    /// The value is `fingerprint mod size + min_value` with an unsigned
    /// remainder.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidParameter`] when `min_value > max_value`.
    pub fn uniform(
        fingerprinter: SharedFingerprinter,
        min_value: i64,
        max_value: i64,
    ) -> Result<Self, SketchError> {
        Self::with_range(min_value, max_value, DistributionKind::Uniform(fingerprinter))
    }

    /// Creates an exponential distribution over `[0, size - 1]`.
    ///
    /// With `u = fingerprint / u64::MAX`, the value is
    /// `floor((1 - ln(e^rate + u * (1 - e^rate)) / rate) * size)`.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidParameter`] when `rate` is not a positive
    /// finite number with finite `e^rate`, or when `size` is zero or does not
    /// fit a signed 64-bit range.
    pub fn exponential(
        fingerprinter: SharedFingerprinter,
        rate: f64,
        size: u64,
    ) -> Result<Self, SketchError> {
        let exp_rate = rate.exp();
        if !rate.is_finite() || rate <= 0.0 || !exp_rate.is_finite() {
            return Err(SketchError::InvalidParameter(
                "exponential rate must be positive and e^rate must be finite",
            ));
        }
        if size == 0 {
            return Err(SketchError::InvalidParameter(
                "exponential size must be greater than zero",
            ));
        }
        let max_value = i64::try_from(size - 1).map_err(|_| {
            SketchError::InvalidParameter("exponential size must not exceed 2^63")
        })?;

        Self::with_range(
            0,
            max_value,
            DistributionKind::Exponential {
                fingerprinter,
                rate,
                exp_rate,
                size,
            },
        )
    }

    /// Creates a geometric distribution with success probability 0.5.
    ///
    /// `min_value + k` is returned with probability `0.5^(k + 1)`, except
    /// that `max_value` absorbs the remaining tail mass.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidParameter`] when `min_value > max_value`
    /// or when the range holds more than 65 values.
    pub fn geometric(
        fingerprinter: SharedFingerprinter,
        min_value: i64,
        max_value: i64,
    ) -> Result<Self, SketchError> {
        let distribution =
            Self::with_range(min_value, max_value, DistributionKind::Geometric(fingerprinter))?;
        if distribution.size() > MAX_GEOMETRIC_SIZE {
            return Err(SketchError::InvalidParameter(
                "geometric distribution may span at most 65 values",
            ));
        }
        Ok(distribution)
    }

    /// Creates a distribution that returns `metadata[key]` unchanged.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidParameter`] when `min_value > max_value`.
    pub fn oracle(
        key: impl Into<String>,
        min_value: i64,
        max_value: i64,
    ) -> Result<Self, SketchError> {
        Self::with_range(
            min_value,
            max_value,
            DistributionKind::Oracle { key: key.into() },
        )
    }

    fn with_range(
        min_value: i64,
        max_value: i64,
        kind: DistributionKind,
    ) -> Result<Self, SketchError> {
        if min_value > max_value {
            return Err(SketchError::InvalidParameter(
                "min_value must not exceed max_value",
            ));
        }
        Ok(Self {
            min_value,
            max_value,
            kind,
        })
    }

    /// Returns the smallest value the distribution can return.
    pub fn min_value(&self) -> i64 {
        self.min_value
    }

    /// Returns the largest value the distribution can return.
    pub fn max_value(&self) -> i64 {
        self.max_value
    }

    /// Returns the number of values in `[min_value, max_value]`.
    ///
    /// This is `u128` because a full signed 64-bit range holds `2^64` values.
    pub fn size(&self) -> u128 {
        (i128::from(self.max_value) - i128::from(self.min_value) + 1) as u128
    }

    /// Computes the value of the distribution for `item`.
    ///
    /// # Errors
    /// Oracle distributions return [`SketchError::MissingMetadata`] when their
    /// key is absent and [`SketchError::MetadataOutOfRange`] when the value
    /// lies outside the closed range.
    pub fn apply(&self, item: &str, metadata: &ItemMetadata) -> Result<i64, SketchError> {
        match &self.kind {
            DistributionKind::Constant => Ok(self.min_value),
            DistributionKind::Uniform(fingerprinter)
            | DistributionKind::Geometric(fingerprinter)
            | DistributionKind::Exponential { fingerprinter, .. } => {
                Ok(self.apply_to_fingerprint(fingerprinter.fingerprint(item.as_bytes())))
            }
            DistributionKind::Oracle { key } => {
                let value = *metadata
                    .get(key)
                    .ok_or_else(|| SketchError::MissingMetadata { key: key.clone() })?;
                if value < self.min_value || value > self.max_value {
                    return Err(SketchError::MetadataOutOfRange {
                        key: key.clone(),
                        value,
                        min: self.min_value,
                        max: self.max_value,
                    });
                }
                Ok(value)
            }
        }
    }

    fn apply_to_fingerprint(&self, fingerprint: u64) -> i64 {
        match &self.kind {
            DistributionKind::Uniform(_) => {
                let offset = u128::from(fingerprint) % self.size();
                (i128::from(self.min_value) + offset as i128) as i64
            }
            DistributionKind::Exponential {
                rate,
                exp_rate,
                size,
                ..
            } => {
                // u64::MAX rounds to 2^64 as f64; the SQL side divides by the same constant.
                let u = fingerprint as f64 / u64::MAX as f64;
                let x = 1.0 - (exp_rate + u * (1.0 - exp_rate)).ln() / rate;
                let bucket = (x * *size as f64).floor();
                bucket.clamp(0.0, (*size - 1) as f64) as i64
            }
            DistributionKind::Geometric(_) => {
                let trailing_zeros = i64::from(fingerprint.trailing_zeros());
                trailing_zeros.min(self.size() as i64 - 1) + self.min_value
            }
            DistributionKind::Constant | DistributionKind::Oracle { .. } => self.min_value,
        }
    }
}
