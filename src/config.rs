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
//! Serializable sketch description.
//!
//! A [`SketchConfig`] is the shared input of the in-memory path
//! ([`crate::any_sketch::AnySketch::from_config`]) and the SQL path
//! ([`crate::sketch_sql::for_bigquery`]). Order is significant: it fixes the
//! index linearization order and the column order of both outputs.
//!
//! Fingerprinting distributions built from a config are salted with the
//! name of their spec, which is what the generated SQL hashes as well.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::SketchError;
use crate::aggregators::Aggregator;
use crate::any_sketch::ValueFunction;
use crate::distributions::Distribution;
use crate::fingerprinters::SaltedFingerprinter;

/// Complete description of a sketch.
///
/// # Example
/// ```rust
/// use anysketch::config::{AggregatorType, DistributionSpec, IndexSpec, SketchConfig, ValueSpec};
///
/// let config = SketchConfig {
///     indexes: vec![IndexSpec {
///         name: "Index".into(),
///         distribution: DistributionSpec::Uniform { num_values: 1024 },
///     }],
///     values: vec![ValueSpec {
///         name: "Frequency".into(),
///         aggregator: AggregatorType::Sum,
///         distribution: DistributionSpec::Oracle { key: "frequency".into() },
///     }],
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SketchConfig {
    /// Register index dimensions, linearized in this order.
    #[serde(default)]
    pub indexes: Vec<IndexSpec>,
    /// Register columns, in this order.
    #[serde(default)]
    pub values: Vec<ValueSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Column name, also the fingerprint salt.
    pub name: String,
    /// Distribution producing this index dimension.
    pub distribution: DistributionSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueSpec {
    /// Column name, also the fingerprint salt.
    pub name: String,
    /// How values in this column combine.
    #[serde(default)]
    pub aggregator: AggregatorType,
    /// Distribution producing this column's values.
    pub distribution: DistributionSpec,
}

/// Distribution descriptor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionSpec {
    /// Value of the item metadata entry `key`.
    Oracle { key: String },
    /// Uniform over `[0, num_values - 1]`.
    Uniform { num_values: i64 },
    /// Exponential over `[0, num_values - 1]` with the given rate.
    Exponential { rate: f64, num_values: i64 },
    /// Geometric over `[0, num_values - 1]`.
    Geometric { num_values: i64 },
    /// Always `value`.
    Constant { value: i64 },
    /// Weighted mixture of point masses. Not supported by either sketch path.
    DiracMixture { deltas: Vec<DiracDelta> },
    /// Raw item passthrough. Not supported by either sketch path.
    Verbatim,
    #[default]
    Unspecified,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiracDelta {
    /// Mixture weight.
    pub alpha: f64,
    /// Point the weight sits on.
    pub value: i64,
}

/// Aggregator descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregatorType {
    #[default]
    Unspecified,
    Sum,
    Unique,
}

impl DistributionSpec {
    /// Returns the descriptor's kind, as used in error messages and logs.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Oracle { .. } => "oracle",
            Self::Uniform { .. } => "uniform",
            Self::Exponential { .. } => "exponential",
            Self::Geometric { .. } => "geometric",
            Self::Constant { .. } => "constant",
            Self::DiracMixture { .. } => "dirac_mixture",
            Self::Verbatim => "verbatim",
            Self::Unspecified => "unspecified",
        }
    }

    /// Builds the runtime distribution for the spec called `name`.
    ///
    /// # Errors
    /// Returns [`SketchError::Unsupported`] for mixture, verbatim and
    /// unspecified descriptors, and [`SketchError::InvalidParameter`] for
    /// invalid sizes or rates.
    pub fn to_distribution(&self, name: &str) -> Result<Distribution, SketchError> {
        let salted = || Arc::new(SaltedFingerprinter::farm(name));
        match self {
            Self::Oracle { key } => Distribution::oracle(key.as_str(), i64::MIN, i64::MAX),
            Self::Uniform { num_values } => {
                Distribution::uniform(salted(), 0, positive(*num_values)? - 1)
            }
            Self::Exponential { rate, num_values } => {
                Distribution::exponential(salted(), *rate, positive(*num_values)? as u64)
            }
            Self::Geometric { num_values } => {
                Distribution::geometric(salted(), 0, positive(*num_values)? - 1)
            }
            Self::Constant { value } => Ok(Distribution::constant(*value)),
            Self::DiracMixture { .. } => Err(unsupported("dirac mixture distribution", name)),
            Self::Verbatim => Err(unsupported("verbatim distribution", name)),
            Self::Unspecified => Err(unsupported("unspecified distribution", name)),
        }
    }
}

fn unsupported(what: &'static str, name: &str) -> SketchError {
    SketchError::Unsupported {
        what,
        name: name.to_string(),
    }
}

fn positive(num_values: i64) -> Result<i64, SketchError> {
    if num_values <= 0 {
        return Err(SketchError::InvalidParameter(
            "num_values must be greater than zero",
        ));
    }
    Ok(num_values)
}

impl AggregatorType {
    /// Returns the aggregator for the value spec called `name`.
    ///
    /// # Errors
    /// Returns [`SketchError::Unsupported`] for [`AggregatorType::Unspecified`].
    pub fn to_aggregator(self, name: &str) -> Result<Aggregator, SketchError> {
        match self {
            Self::Sum => Ok(Aggregator::Sum),
            Self::Unique => Ok(Aggregator::Unique),
            Self::Unspecified => Err(unsupported("unspecified aggregator", name)),
        }
    }
}

impl SketchConfig {
    /// Checks that every name and oracle key is a plain identifier and that
    /// names are unique across indexes and values.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidName`] or [`SketchError::DuplicateName`].
    pub fn validate(&self) -> Result<(), SketchError> {
        let specs = self
            .indexes
            .iter()
            .map(|index| (&index.name, &index.distribution))
            .chain(self.values.iter().map(|value| (&value.name, &value.distribution)));

        let mut seen = HashSet::new();
        for (name, distribution) in specs {
            check_identifier(name)?;
            if !seen.insert(name.as_str()) {
                debug!(name = %name, "Rejected sketch config with duplicate name.");
                return Err(SketchError::DuplicateName(name.clone()));
            }
            if let DistributionSpec::Oracle { key } = distribution {
                check_identifier(key)?;
            }
        }
        Ok(())
    }

    /// Builds the index distributions, in order.
    ///
    /// # Errors
    /// See [`DistributionSpec::to_distribution`].
    pub fn index_distributions(&self) -> Result<Vec<Distribution>, SketchError> {
        self.indexes
            .iter()
            .map(|index| index.distribution.to_distribution(&index.name))
            .collect()
    }

    /// Builds the value functions, in order.
    ///
    /// # Errors
    /// See [`DistributionSpec::to_distribution`] and
    /// [`AggregatorType::to_aggregator`].
    pub fn value_functions(&self) -> Result<Vec<ValueFunction>, SketchError> {
        self.values
            .iter()
            .map(|value| {
                Ok(ValueFunction::new(
                    value.name.as_str(),
                    value.aggregator.to_aggregator(&value.name)?,
                    value.distribution.to_distribution(&value.name)?,
                ))
            })
            .collect()
    }
}

/// Accepts `[A-Za-z_][A-Za-z0-9_]*`, which is safe to splice into SQL.
fn check_identifier(name: &str) -> Result<(), SketchError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(SketchError::InvalidName(name.to_string()))
    }
}
