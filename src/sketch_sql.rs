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
//! SQL generation equivalent to in-memory sketching.
//!
//! [`for_bigquery`] turns a [`SketchConfig`] into a query that computes, over
//! a table of impressions, the same registers an
//! [`AnySketch`](crate::any_sketch::AnySketch) built from that config would
//! hold after inserting every impression's `VirtualId`. The in-memory index
//! is linearized while the query keeps one column per index spec.
//!
//! BigQuery has no unsigned 64-bit integers. `FARM_FINGERPRINT` yields the
//! same bits as [`FarmFingerprinter`](crate::fingerprinters::FarmFingerprinter)
//! read as a signed `INT64`, so every expression below reinterprets negative
//! fingerprints as `fingerprint + 2^64` explicitly.

use std::borrow::Cow;

use tracing::{debug, trace};

use crate::SketchError;
use crate::aggregators::UNIQUE_DESTROYED_VALUE;
use crate::config::{AggregatorType, DistributionSpec, SketchConfig};
use crate::fingerprinters::SALT_NAMESPACE;

/// Query skeleton for BigQuery.
///
/// `T1` holds per-impression fingerprints, `T2` per-impression distribution
/// values, and the outer query aggregates `T2` into registers.
pub const BIGQUERY_TEMPLATE: &str = "WITH T1 AS (
  SELECT
$FINGERPRINT_SELECT
  FROM $ORIGINAL_TABLE AS Impressions
),
T2 AS (
  SELECT
$DISTRIBUTION_SELECT
  FROM T1
)
SELECT
$AGGREGATION_SELECT
FROM T2
GROUP BY $GROUP_BY_COLUMNS";

/// `2^64` as a FLOAT64 literal. `u64::MAX as f64` rounds to the same value.
const TWO_TO_64: &str = "18446744073709551616.0";
/// `2^64` as an exact literal, added in BIGNUMERIC so that the unsigned
/// fingerprint is rounded to FLOAT64 once.
const TWO_TO_64_EXACT: &str = "18446744073709551616";

const SIGNED_MIN: i64 = i64::MIN;

/// A query template with `$FINGERPRINT_SELECT`, `$ORIGINAL_TABLE`,
/// `$DISTRIBUTION_SELECT`, `$AGGREGATION_SELECT` and `$GROUP_BY_COLUMNS`
/// placeholders.
///
/// Build it once and pass it to wherever queries are generated.
///
/// # Example
/// ```rust
/// use anysketch::config::{AggregatorType, DistributionSpec, IndexSpec, SketchConfig, ValueSpec};
/// use anysketch::sketch_sql::SqlTemplate;
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
///
/// let template = SqlTemplate::bigquery();
/// let sql = template.render("Impressions2024", &config).unwrap();
/// assert!(sql.ends_with("GROUP BY 1"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlTemplate {
    text: Cow<'static, str>,
}

impl Default for SqlTemplate {
    fn default() -> Self {
        Self::bigquery()
    }
}

impl SqlTemplate {
    /// Returns the BigQuery template.
    pub fn bigquery() -> Self {
        Self {
            text: Cow::Borrowed(BIGQUERY_TEMPLATE),
        }
    }

    /// Creates a template from custom text using the same placeholders.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Cow::Owned(text.into()),
        }
    }

    /// Returns the unrendered template text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Renders the query for `config` over `impression_table`.
    ///
    /// `impression_table` is a table name or parenthesized subquery. It must
    /// have a `VirtualId` column plus one column per oracle key. Output
    /// columns are the index specs, then the value specs, each named after
    /// its spec; the query groups by the index columns positionally.
    ///
    /// # Errors
    /// Returns the same configuration errors as building an in-memory sketch
    /// from `config`, plus [`SketchError::InvalidParameter`] when `config`
    /// has no index spec.
    pub fn render(&self, impression_table: &str, config: &SketchConfig) -> Result<String, SketchError> {
        config.validate()?;
        if config.indexes.is_empty() {
            return Err(SketchError::InvalidParameter(
                "SQL generation requires at least one index spec",
            ));
        }

        let distributions: Vec<(&str, &DistributionSpec)> = config
            .indexes
            .iter()
            .map(|index| (index.name.as_str(), &index.distribution))
            .chain(
                config
                    .values
                    .iter()
                    .map(|value| (value.name.as_str(), &value.distribution)),
            )
            .collect();

        let mut fingerprint_select = Vec::with_capacity(distributions.len());
        let mut distribution_select = Vec::with_capacity(distributions.len());
        for &(name, distribution) in &distributions {
            // Reject exactly what the in-memory path rejects.
            distribution.to_distribution(name)?;
            trace!(name, kind = distribution.kind_name(), "Rendering distribution column.");
            fingerprint_select.push(select_as(&fingerprint_sql(name, distribution), name, 4));
            distribution_select.push(select_as(&distribution_sql(name, distribution)?, name, 4));
        }

        let mut aggregation_select: Vec<String> = config
            .indexes
            .iter()
            .map(|index| format!("  T2.{}", index.name))
            .collect();
        for value in &config.values {
            let aggregate = aggregate_sql(&value.name, value.aggregator)?;
            aggregation_select.push(select_as(&aggregate, &value.name, 2));
        }

        let group_by_columns = (1..=config.indexes.len())
            .map(|position| position.to_string())
            .collect::<Vec<_>>()
            .join(", ");

        debug!(
            table = impression_table,
            indexes = config.indexes.len(),
            values = config.values.len(),
            "Generated sketch SQL."
        );
        Ok(self
            .text
            .replace("$FINGERPRINT_SELECT", &fingerprint_select.join(",\n"))
            .replace("$DISTRIBUTION_SELECT", &distribution_select.join(",\n"))
            .replace("$AGGREGATION_SELECT", &aggregation_select.join(",\n"))
            .replace("$GROUP_BY_COLUMNS", &group_by_columns)
            .replace("$ORIGINAL_TABLE", impression_table.trim()))
    }
}

/// Converts `config` into a BigQuery query using [`BIGQUERY_TEMPLATE`].
///
/// # Errors
/// See [`SqlTemplate::render`].
pub fn for_bigquery(impression_table: &str, config: &SketchConfig) -> Result<String, SketchError> {
    SqlTemplate::bigquery().render(impression_table, config)
}

fn select_as(expression: &str, name: &str, indent: usize) -> String {
    format!("{:indent$}{expression} AS {name}", "")
}

fn fingerprint_sql(name: &str, distribution: &DistributionSpec) -> String {
    match distribution {
        DistributionSpec::Oracle { key } => format!("Impressions.{key}"),
        DistributionSpec::Constant { value } => value.to_string(),
        _ => format!(
            "FARM_FINGERPRINT(CONCAT('{SALT_NAMESPACE}:', CAST(Impressions.VirtualId AS STRING), ':', '{name}'))"
        ),
    }
}

fn distribution_sql(name: &str, distribution: &DistributionSpec) -> Result<String, SketchError> {
    let column = format!("T1.{name}");
    match distribution {
        DistributionSpec::Uniform { num_values } => {
            // For negative fingerprints, (f + 2^64) mod n == (f mod n + 2^64 mod n) mod n.
            // `shifted` lies in (-n, n), so one conditional `+ n` reduces it
            // without leaving INT64 for any n.
            let wrap = two_to_64_mod(*num_values as u64);
            let shifted = format!("MOD({column}, {num_values}) + {wrap}");
            Ok(format!(
                "IF({column} < 0, IF({shifted} < 0, {shifted} + {num_values}, {shifted}), MOD({column}, {num_values}))"
            ))
        }
        DistributionSpec::Exponential { rate, num_values } => {
            let unit = format!(
                "IF({column} < 0, CAST(CAST({column} AS BIGNUMERIC) + {TWO_TO_64_EXACT} AS FLOAT64), CAST({column} AS FLOAT64)) / {TWO_TO_64}"
            );
            Ok(format!(
                "LEAST(GREATEST(CAST(FLOOR((1 - LN(EXP({rate:?}) + {unit} * (1 - EXP({rate:?}))) / {rate:?}) * {num_values}) AS INT64), 0), {max})",
                max = num_values - 1
            ))
        }
        DistributionSpec::Geometric { num_values } => Ok(format!(
            "LEAST(IF({column} = {SIGNED_MIN}, 63, BIT_COUNT(~{column} & ({column} - 1))), {max})",
            max = num_values - 1
        )),
        DistributionSpec::Oracle { .. } | DistributionSpec::Constant { .. } => Ok(column),
        DistributionSpec::DiracMixture { .. }
        | DistributionSpec::Verbatim
        | DistributionSpec::Unspecified => Err(SketchError::Unsupported {
            what: "distribution",
            name: name.to_string(),
        }),
    }
}

fn aggregate_sql(name: &str, aggregator: AggregatorType) -> Result<String, SketchError> {
    match aggregator {
        AggregatorType::Sum => Ok(format!("SUM(T2.{name})")),
        AggregatorType::Unique => Ok(format!(
            "IF(MIN(T2.{name}) = MAX(T2.{name}), ANY_VALUE(T2.{name}), {UNIQUE_DESTROYED_VALUE})"
        )),
        AggregatorType::Unspecified => Err(SketchError::Unsupported {
            what: "unspecified aggregator",
            name: name.to_string(),
        }),
    }
}

fn two_to_64_mod(modulus: u64) -> u64 {
    ((1_u128 << 64) % u128::from(modulus)) as u64
}
