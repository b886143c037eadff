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
//! The generalized register sketch.
//!
//! An [`AnySketch`] holds a sparse table of registers keyed by a linearized
//! index. Every register stores one value per [`ValueFunction`]. Inserting
//! an item either seeds its register with the item's values or folds them
//! into the existing ones through each column's [`Aggregator`]. Merging
//! replays another sketch's registers through the same aggregate-or-seed
//! step, so merges are commutative and associative whenever the aggregators
//! are.

use std::collections::HashMap;
use std::collections::hash_map;

use tracing::{debug, trace};

use crate::aggregators::Aggregator;
use crate::config::SketchConfig;
use crate::distributions::Distribution;
use crate::{ItemMetadata, SketchError};

/// Number of registers addressable with a `u64` index.
const MAX_INDEX_SPACE: u128 = 1 << 64;

/// One column of a register: where its values come from and how they combine.
#[derive(Debug, Clone)]
pub struct ValueFunction {
    name: String,
    aggregator: Aggregator,
    distribution: Distribution,
}

impl ValueFunction {
    /// Creates a value function named `name`.
    pub fn new(name: impl Into<String>, aggregator: Aggregator, distribution: Distribution) -> Self {
        Self {
            name: name.into(),
            aggregator,
            distribution,
        }
    }

    /// Returns the column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns how values in this column combine.
    pub fn aggregator(&self) -> Aggregator {
        self.aggregator
    }

    /// Returns the distribution producing this column's values.
    pub fn distribution(&self) -> &Distribution {
        &self.distribution
    }
}

/// A populated register, borrowed from its sketch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Register<'a> {
    /// Linearized register index.
    pub index: u64,
    /// One value per value function, in configuration order.
    pub values: &'a [i64],
}

/// Sparse register sketch generalizing Bloom filters, HyperLogLogs and
/// Liquid Legions.
///
/// # Example
/// ```rust
/// use std::sync::Arc;
///
/// use anysketch::ItemMetadata;
/// use anysketch::aggregators::Aggregator;
/// use anysketch::any_sketch::{AnySketch, ValueFunction};
/// use anysketch::distributions::Distribution;
/// use anysketch::fingerprinters::SaltedFingerprinter;
///
/// let index = Distribution::uniform(Arc::new(SaltedFingerprinter::farm("Index")), 0, 1023).unwrap();
/// let count = ValueFunction::new("Count", Aggregator::Sum, Distribution::constant(1));
/// let mut sketch = AnySketch::new(vec![index], vec![count]).unwrap();
///
/// for user in ["alice", "bob", "alice"] {
///     sketch.insert(user, &ItemMetadata::new()).unwrap();
/// }
///
/// let total: i64 = sketch.iter().map(|register| register.values[0]).sum();
/// assert_eq!(total, 3);
/// ```
#[derive(Debug, Clone)]
pub struct AnySketch {
    indexes: Vec<Distribution>,
    values: Vec<ValueFunction>,
    index_space: u128,
    registers: HashMap<u64, Vec<i64>>,
}

impl AnySketch {
    /// Creates an empty sketch.
    ///
    /// Index distributions are linearized in the given order; value
    /// functions define the register columns in the given order.
    ///
    /// # Errors
    /// Returns [`SketchError::IndexSpaceOverflow`] when the product of the
    /// index distribution sizes exceeds `2^64`.
    pub fn new(indexes: Vec<Distribution>, values: Vec<ValueFunction>) -> Result<Self, SketchError> {
        let mut index_space: u128 = 1;
        for distribution in &indexes {
            index_space = index_space
                .checked_mul(distribution.size())
                .filter(|space| *space <= MAX_INDEX_SPACE)
                .ok_or(SketchError::IndexSpaceOverflow)?;
        }

        debug!(
            index_distributions = indexes.len(),
            value_functions = values.len(),
            index_space = %index_space,
            "Created sketch."
        );
        Ok(Self {
            indexes,
            values,
            index_space,
            registers: HashMap::new(),
        })
    }

    /// Creates an empty sketch described by `config`.
    ///
    /// # Errors
    /// Returns a configuration error when `config` is invalid or uses
    /// unsupported distributions or aggregators.
    pub fn from_config(config: &SketchConfig) -> Result<Self, SketchError> {
        config.validate()?;
        Self::new(config.index_distributions()?, config.value_functions()?)
    }

    /// Returns the index distributions, in linearization order.
    pub fn index_distributions(&self) -> &[Distribution] {
        &self.indexes
    }

    /// Returns the value functions, in column order.
    pub fn value_functions(&self) -> &[ValueFunction] {
        &self.values
    }

    /// Returns the position of the value function called `name`.
    pub fn value_index(&self, name: &str) -> Option<usize> {
        self.values.iter().position(|value| value.name() == name)
    }

    /// Returns the number of values held by every register.
    pub fn register_size(&self) -> usize {
        self.values.len()
    }

    /// Returns the number of distinct register indexes (at most `2^64`).
    pub fn index_space(&self) -> u128 {
        self.index_space
    }

    /// Returns the number of populated registers.
    pub fn len(&self) -> usize {
        self.registers.len()
    }

    /// Returns `true` if no register has been populated.
    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    /// Returns the values of the register at `index`, if populated.
    pub fn get(&self, index: u64) -> Option<&[i64]> {
        self.registers.get(&index).map(Vec::as_slice)
    }

    /// Computes the linearized register index of an item.
    ///
    /// Parts are combined in mixed radix: for each index distribution in
    /// order, `index = index * size + (part - min_value)`.
    ///
    /// # Errors
    /// Propagates oracle metadata errors.
    pub fn register_index(&self, item: &str, metadata: &ItemMetadata) -> Result<u64, SketchError> {
        let mut index: u128 = 0;
        for distribution in &self.indexes {
            let part = distribution.apply(item, metadata)?;
            let offset = (i128::from(part) - i128::from(distribution.min_value())) as u128;
            index = index * distribution.size() + offset;
        }
        // Bounded by the index space, which was checked against 2^64 at construction.
        Ok(index as u64)
    }

    /// Adds `item` to the sketch.
    ///
    /// Metadata may hold keys no distribution uses; they are ignored.
    ///
    /// # Errors
    /// Returns a metadata error when an oracle distribution cannot be
    /// satisfied. The sketch is left untouched in that case.
    pub fn insert(&mut self, item: &str, metadata: &ItemMetadata) -> Result<(), SketchError> {
        let index = self.register_index(item, metadata)?;
        let values = self
            .values
            .iter()
            .map(|value| value.distribution().apply(item, metadata))
            .collect::<Result<Vec<_>, _>>()?;
        self.aggregate_into_register(index, &values)
    }

    /// Folds `values` into the register at `index`, seeding it if empty.
    ///
    /// # Errors
    /// Returns [`SketchError::ValueCountMismatch`] when `values` does not have
    /// one entry per value function, and
    /// [`SketchError::RegisterIndexOutOfRange`] when `index` is outside the
    /// index space.
    pub fn aggregate_into_register(&mut self, index: u64, values: &[i64]) -> Result<(), SketchError> {
        if values.len() != self.register_size() {
            return Err(SketchError::ValueCountMismatch {
                expected: self.register_size(),
                actual: values.len(),
            });
        }
        if u128::from(index) >= self.index_space {
            return Err(SketchError::RegisterIndexOutOfRange(index));
        }

        match self.registers.entry(index) {
            hash_map::Entry::Vacant(entry) => {
                entry.insert(values.to_vec());
            }
            hash_map::Entry::Occupied(mut entry) => {
                for ((current, value), function) in
                    entry.get_mut().iter_mut().zip(values).zip(&self.values)
                {
                    *current = function.aggregator().aggregate(*current, *value);
                }
            }
        }
        Ok(())
    }

    /// Merges `other` into this sketch.
    ///
    /// The result equals sketching the union of both input streams.
    ///
    /// # Errors
    /// Returns [`SketchError::IncompatibleSketches`] when the sketches differ
    /// in register width or index space.
    pub fn merge(&mut self, other: &AnySketch) -> Result<(), SketchError> {
        if self.register_size() != other.register_size() {
            return Err(SketchError::IncompatibleSketches(
                "register widths must match for merge",
            ));
        }
        if self.index_space != other.index_space {
            return Err(SketchError::IncompatibleSketches(
                "index spaces must match for merge",
            ));
        }

        trace!(
            registers = self.len(),
            incoming = other.len(),
            "Merging sketch."
        );
        for register in other {
            self.aggregate_into_register(register.index, register.values)?;
        }
        Ok(())
    }

    /// Merges every sketch in `others` into this one, in order.
    ///
    /// # Errors
    /// Stops at the first incompatible sketch; earlier merges are kept.
    pub fn merge_all<'a, I>(&mut self, others: I) -> Result<(), SketchError>
    where
        I: IntoIterator<Item = &'a AnySketch>,
    {
        for other in others {
            self.merge(other)?;
        }
        Ok(())
    }

    /// Iterates over populated registers in unspecified order.
    pub fn iter(&self) -> Registers<'_> {
        Registers {
            inner: self.registers.iter(),
        }
    }
}

/// Iterator over the registers of an [`AnySketch`].
#[derive(Debug, Clone)]
pub struct Registers<'a> {
    inner: hash_map::Iter<'a, u64, Vec<i64>>,
}

impl<'a> Iterator for Registers<'a> {
    type Item = Register<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(index, values)| Register {
            index: *index,
            values: values.as_slice(),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Registers<'_> {}

impl<'a> IntoIterator for &'a AnySketch {
    type Item = Register<'a>;
    type IntoIter = Registers<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::Arc;

    use proptest::prelude::*;

    use super::{AnySketch, ValueFunction};
    use crate::aggregators::{Aggregator, UNIQUE_DESTROYED_VALUE};
    use crate::distributions::Distribution;
    use crate::fingerprinters::SaltedFingerprinter;
    use crate::{ErrorKind, ItemMetadata, SketchError};

    fn metadata(entries: &[(&str, i64)]) -> ItemMetadata {
        entries
            .iter()
            .map(|(key, value)| (key.to_string(), *value))
            .collect()
    }

    fn registers(sketch: &AnySketch) -> BTreeMap<u64, Vec<i64>> {
        sketch
            .iter()
            .map(|register| (register.index, register.values.to_vec()))
            .collect()
    }

    /// Index read from metadata key "index" in [0, 9]; columns "count" (sum
    /// of "count") and "tag" (unique over "tag").
    fn oracle_sketch() -> AnySketch {
        AnySketch::new(
            vec![Distribution::oracle("index", 0, 9).unwrap()],
            vec![
                ValueFunction::new(
                    "count",
                    Aggregator::Sum,
                    Distribution::oracle("count", i64::MIN, i64::MAX).unwrap(),
                ),
                ValueFunction::new(
                    "tag",
                    Aggregator::Unique,
                    Distribution::oracle("tag", 0, 100).unwrap(),
                ),
            ],
        )
        .unwrap()
    }

    fn insert(sketch: &mut AnySketch, index: i64, count: i64, tag: i64) {
        sketch
            .insert(
                "irrelevant",
                &metadata(&[("index", index), ("count", count), ("tag", tag)]),
            )
            .unwrap();
    }

    #[test]
    fn new_sketch_is_empty() {
        let sketch = oracle_sketch();
        assert!(sketch.is_empty());
        assert_eq!(sketch.len(), 0);
        assert_eq!(sketch.iter().next(), None);
        assert_eq!(sketch.register_size(), 2);
        assert_eq!(sketch.index_space(), 10);
    }

    #[test]
    fn first_insert_seeds_register() {
        let mut sketch = oracle_sketch();
        insert(&mut sketch, 3, 10, 7);
        assert_eq!(registers(&sketch), BTreeMap::from([(3, vec![10, 7])]));
    }

    #[test]
    fn later_inserts_aggregate_per_column() {
        let mut sketch = oracle_sketch();
        insert(&mut sketch, 3, 10, 7);
        insert(&mut sketch, 3, 5, 7);
        insert(&mut sketch, 4, 1, 2);
        assert_eq!(
            registers(&sketch),
            BTreeMap::from([(3, vec![15, 7]), (4, vec![1, 2])])
        );

        insert(&mut sketch, 3, 1, 8);
        assert_eq!(sketch.get(3), Some(&[16, UNIQUE_DESTROYED_VALUE][..]));
    }

    #[test]
    fn failed_insert_leaves_sketch_untouched() {
        let mut sketch = oracle_sketch();
        insert(&mut sketch, 3, 10, 7);

        let missing_tag = sketch
            .insert("irrelevant", &metadata(&[("index", 3), ("count", 5)]))
            .unwrap_err();
        assert_eq!(missing_tag, SketchError::MissingMetadata { key: "tag".into() });

        let tag_out_of_range = sketch
            .insert(
                "irrelevant",
                &metadata(&[("index", 3), ("count", 5), ("tag", 101)]),
            )
            .unwrap_err();
        assert_eq!(tag_out_of_range.kind(), ErrorKind::Metadata);

        assert_eq!(registers(&sketch), BTreeMap::from([(3, vec![10, 7])]));
    }

    #[test]
    fn merge_aggregates_overlapping_registers_once() {
        let mut sketch = oracle_sketch();
        let mut other = oracle_sketch();
        insert(&mut sketch, 1, 100, 1);
        insert(&mut other, 0, 2_000, 2);
        insert(&mut other, 1, 20, 1);

        sketch.merge(&other).unwrap();
        assert_eq!(
            registers(&sketch),
            BTreeMap::from([(0, vec![2_000, 2]), (1, vec![120, 1])])
        );
    }

    #[test]
    fn merge_all_merges_every_sketch() {
        let mut sketch = oracle_sketch();
        insert(&mut sketch, 1, 100, 1);

        let mut second = oracle_sketch();
        insert(&mut second, 0, 2_000, 2);
        let mut third = oracle_sketch();
        insert(&mut third, 0, 1, 3);

        sketch.merge_all([&second, &third]).unwrap();
        assert_eq!(
            registers(&sketch),
            BTreeMap::from([(0, vec![2_001, UNIQUE_DESTROYED_VALUE]), (1, vec![100, 1])])
        );
    }

    #[test]
    fn merge_rejects_different_shapes() {
        let mut sketch = oracle_sketch();
        let narrower = AnySketch::new(vec![Distribution::oracle("index", 0, 9).unwrap()], vec![])
            .unwrap();
        let wider_index = AnySketch::new(
            vec![Distribution::oracle("index", 0, 10).unwrap()],
            oracle_sketch().value_functions().to_vec(),
        )
        .unwrap();

        assert_eq!(sketch.merge(&narrower).unwrap_err().kind(), ErrorKind::Contract);
        assert_eq!(sketch.merge(&wider_index).unwrap_err().kind(), ErrorKind::Contract);
    }

    #[test]
    fn aggregate_into_register_checks_arguments() {
        let mut sketch = oracle_sketch();
        assert_eq!(
            sketch.aggregate_into_register(0, &[1]).unwrap_err(),
            SketchError::ValueCountMismatch { expected: 2, actual: 1 }
        );
        assert_eq!(
            sketch.aggregate_into_register(10, &[1, 1]).unwrap_err(),
            SketchError::RegisterIndexOutOfRange(10)
        );
        sketch.aggregate_into_register(9, &[1, 1]).unwrap();
        assert_eq!(sketch.get(9), Some(&[1, 1][..]));
    }

    #[test]
    fn value_index_finds_columns_by_name() {
        let sketch = oracle_sketch();
        assert_eq!(sketch.value_index("count"), Some(0));
        assert_eq!(sketch.value_index("tag"), Some(1));
        assert_eq!(sketch.value_index("missing"), None);
    }

    #[test]
    fn two_index_distributions_fill_the_cross_product() {
        let part = |salt: &str| {
            Distribution::uniform(Arc::new(SaltedFingerprinter::farm(salt)), 0, 2).unwrap()
        };
        let mut sketch = AnySketch::new(
            vec![part("Row"), part("Column")],
            vec![ValueFunction::new("count", Aggregator::Sum, Distribution::constant(1))],
        )
        .unwrap();

        for item in 0..10_000 {
            sketch.insert(&item.to_string(), &ItemMetadata::new()).unwrap();
        }

        let indexes: BTreeSet<u64> = sketch.iter().map(|register| register.index).collect();
        assert_eq!(indexes, (0..9).collect());
        let total: i64 = sketch.iter().map(|register| register.values[0]).sum();
        assert_eq!(total, 10_000);
    }

    #[test]
    fn linearization_is_mixed_radix_in_config_order() {
        let mut sketch = AnySketch::new(
            vec![
                Distribution::oracle("major", 1, 3).unwrap(),
                Distribution::oracle("minor", -2, 2).unwrap(),
            ],
            vec![],
        )
        .unwrap();
        assert_eq!(sketch.index_space(), 15);

        // (2 - 1) * 5 + (1 - -2) = 8
        let item = metadata(&[("major", 2), ("minor", 1)]);
        assert_eq!(sketch.register_index("x", &item).unwrap(), 8);
        sketch.insert("x", &item).unwrap();
        assert_eq!(sketch.get(8), Some(&[] as &[i64]));
    }

    #[test]
    fn full_signed_range_index_fits() {
        let mut sketch =
            AnySketch::new(vec![Distribution::oracle("id", i64::MIN, i64::MAX).unwrap()], vec![])
                .unwrap();
        assert_eq!(sketch.index_space(), 1 << 64);
        sketch.insert("x", &metadata(&[("id", i64::MAX)])).unwrap();
        assert_eq!(sketch.iter().next().unwrap().index, u64::MAX);
    }

    #[test]
    fn oversized_index_space_is_rejected() {
        let full = || Distribution::oracle("id", i64::MIN, i64::MAX).unwrap();
        assert_eq!(
            AnySketch::new(vec![full(), Distribution::constant(0), full()], vec![]).unwrap_err(),
            SketchError::IndexSpaceOverflow
        );
        let half = || Distribution::oracle("id", 0, u32::MAX as i64).unwrap();
        assert!(AnySketch::new(vec![half(), half()], vec![]).is_ok());
        let bit = Distribution::oracle("id", 0, 1).unwrap();
        assert!(AnySketch::new(vec![half(), half(), bit], vec![]).is_err());
    }

    #[test]
    fn sketch_without_indexes_has_one_register() {
        let mut sketch = AnySketch::new(
            vec![],
            vec![ValueFunction::new("n", Aggregator::Sum, Distribution::constant(1))],
        )
        .unwrap();
        assert_eq!(sketch.index_space(), 1);
        sketch.insert("a", &ItemMetadata::new()).unwrap();
        sketch.insert("b", &ItemMetadata::new()).unwrap();
        assert_eq!(sketch.get(0), Some(&[2_i64][..]));
    }

    fn sketch_of(items: &[(i64, i64, i64)]) -> AnySketch {
        let mut sketch = oracle_sketch();
        for (index, count, tag) in items {
            insert(&mut sketch, *index, *count, *tag);
        }
        sketch
    }

    fn items() -> impl Strategy<Value = Vec<(i64, i64, i64)>> {
        prop::collection::vec((0_i64..10, -50_i64..50, 0_i64..3), 0..40)
    }

    proptest! {
        #[test]
        fn merge_is_associative(a in items(), b in items(), c in items()) {
            let mut left = sketch_of(&a);
            left.merge(&sketch_of(&b)).unwrap();
            left.merge(&sketch_of(&c)).unwrap();

            let mut tail = sketch_of(&b);
            tail.merge(&sketch_of(&c)).unwrap();
            let mut right = sketch_of(&a);
            right.merge(&tail).unwrap();

            prop_assert_eq!(registers(&left), registers(&right));
        }

        #[test]
        fn merge_equals_sketching_the_union(a in items(), b in items()) {
            let mut merged = sketch_of(&a);
            merged.merge(&sketch_of(&b)).unwrap();

            let union: Vec<_> = a.iter().chain(&b).copied().collect();
            prop_assert_eq!(registers(&merged), registers(&sketch_of(&union)));
        }
    }
}
