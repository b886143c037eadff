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
//! Generalized register sketches for reach and frequency measurement.
//!
//! An [`any_sketch::AnySketch`] maps every inserted item to a register (via
//! one or more index [`distributions::Distribution`]s) and folds a tuple of
//! per-item values into that register (via [`any_sketch::ValueFunction`]s,
//! each pairing a distribution with an [`aggregators::Aggregator`]). Picking
//! different distributions and aggregators yields Bloom filters,
//! HyperLogLog-style sketches, or Liquid Legions sketches.
//!
//! The crate exposes:
//! - [`fingerprinters`] for deterministic, optionally salted, 64-bit item fingerprints.
//! - [`distributions`] for mapping items to bounded integers.
//! - [`aggregators`] for combining register values.
//! - [`any_sketch`] for the register accumulator itself.
//! - [`config`] for the serializable sketch description.
//! - [`sketch_proto`] for the encoded external representation of a sketch.
//! - [`sketch_sql`] for generating BigQuery SQL equivalent to an in-memory sketch.
//! - [`estimation`] for cardinality and histogram estimates over sketches.

use std::collections::HashMap;

use thiserror::Error;

pub mod aggregators;
pub mod any_sketch;
pub mod config;
pub mod distributions;
pub mod estimation;
pub mod fingerprinters;
pub mod sketch_proto;
pub mod sketch_sql;

/// Named integer features attached to an inserted item.
///
/// Oracle distributions read their value from here. Keys that no
/// distribution references are ignored.
pub type ItemMetadata = HashMap<String, i64>;

/// Broad classification of a [`SketchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The sketch description is invalid. Raised while building components.
    Config,
    /// Item metadata did not satisfy an oracle distribution. Raised per insert.
    Metadata,
    /// The caller passed malformed input. Raised per call.
    Contract,
}

/// Errors returned by sketch constructors, inserts, merges and SQL generation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SketchError {
    /// Returned when a constructor receives an invalid argument.
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),
    /// Returned for distribution or aggregator kinds that cannot be built.
    #[error("unsupported {what} for '{name}'")]
    Unsupported { what: &'static str, name: String },
    /// Returned when the index distributions address more than 2^64 registers.
    #[error("index space of the sketch exceeds 2^64 registers")]
    IndexSpaceOverflow,
    /// Returned when a spec name or oracle key is not a plain identifier.
    #[error("'{0}' is not a valid identifier")]
    InvalidName(String),
    /// Returned when two specs share a name.
    #[error("name '{0}' is used more than once")]
    DuplicateName(String),
    /// Returned when an oracle distribution finds no value for its key.
    #[error("item metadata is missing key '{key}'")]
    MissingMetadata { key: String },
    /// Returned when an oracle value falls outside the distribution range.
    #[error("item metadata value for '{key}' ({value}) is out of closed range [{min}, {max}]")]
    MetadataOutOfRange {
        key: String,
        value: i64,
        min: i64,
        max: i64,
    },
    /// Returned when a value tuple does not match the register width.
    #[error("expected {expected} register values, got {actual}")]
    ValueCountMismatch { expected: usize, actual: usize },
    /// Returned when a register index lies outside the sketch's index space.
    #[error("register index {0} is outside the index space of the sketch")]
    RegisterIndexOutOfRange(u64),
    /// Returned when a sketch has no value function with the requested name.
    #[error("sketch has no value named '{0}'")]
    UnknownValue(String),
    /// Returned when combining two sketches that are not shape-compatible.
    #[error("incompatible sketches: {0}")]
    IncompatibleSketches(&'static str),
}

impl SketchError {
    /// Returns the kind of failure this error represents.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidParameter(_)
            | Self::Unsupported { .. }
            | Self::IndexSpaceOverflow
            | Self::InvalidName(_)
            | Self::DuplicateName(_) => ErrorKind::Config,
            Self::MissingMetadata { .. } | Self::MetadataOutOfRange { .. } => ErrorKind::Metadata,
            Self::ValueCountMismatch { .. }
            | Self::RegisterIndexOutOfRange(_)
            | Self::UnknownValue(_)
            | Self::IncompatibleSketches(_) => ErrorKind::Contract,
        }
    }
}
