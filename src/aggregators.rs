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
//! Aggregators: commutative, associative combiners of register values.
//!
//! Each aggregator also defines how a value is stored in the encoded sketch
//! representation. Decoding always inverts encoding.

use serde::{Deserialize, Serialize};

/// Value a [`Aggregator::Unique`] column takes once it has seen two
/// different inputs. Further aggregation never leaves this state.
pub const UNIQUE_DESTROYED_VALUE: i64 = -1;

/// Rule for folding a new value into an existing register column.
///
/// # Example
/// ```rust
/// use anysketch::aggregators::{Aggregator, UNIQUE_DESTROYED_VALUE};
///
/// assert_eq!(Aggregator::Sum.aggregate(2, 3), 5);
/// assert_eq!(Aggregator::Unique.aggregate(4, 4), 4);
/// assert_eq!(Aggregator::Unique.aggregate(4, 5), UNIQUE_DESTROYED_VALUE);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregator {
    /// Adds values, wrapping on overflow.
    Sum,
    /// Keeps a value while every input agrees, otherwise
    /// [`UNIQUE_DESTROYED_VALUE`].
    ///
    /// Encoded values are shifted up by one so the destroyed sentinel is
    /// stored as zero and every stored value is non-negative.
    Unique,
}

impl Aggregator {
    /// Combines two values.
    pub fn aggregate(self, left: i64, right: i64) -> i64 {
        match self {
            Self::Sum => left.wrapping_add(right),
            Self::Unique => {
                if left == right {
                    left
                } else {
                    UNIQUE_DESTROYED_VALUE
                }
            }
        }
    }

    /// Converts a value into how it is stored in an encoded sketch.
    pub fn encode_to_proto_value(self, value: i64) -> i64 {
        match self {
            Self::Sum => value,
            Self::Unique => value.wrapping_add(1),
        }
    }

    /// Converts an encoded value back for use in an in-memory sketch.
    pub fn decode_from_proto_value(self, proto_value: i64) -> i64 {
        match self {
            Self::Sum => proto_value,
            Self::Unique => proto_value.wrapping_sub(1),
        }
    }
}
