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
//! Encoded external representation of a sketch.
//!
//! A [`Sketch`] carries the config it was built from plus its registers,
//! with every column passed through its aggregator's
//! [`encode_to_proto_value`](crate::aggregators::Aggregator::encode_to_proto_value).
//! Turning it into bytes, and encrypting those bytes, happens outside this
//! crate; the types derive `serde` traits for that boundary.

use serde::{Deserialize, Serialize};

use crate::SketchError;
use crate::any_sketch::{AnySketch, ValueFunction};
use crate::config::SketchConfig;

/// Sketch in its stored form.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Sketch {
    /// Description the registers were built from.
    pub config: SketchConfig,
    /// Populated registers, sorted by index.
    #[serde(default)]
    pub registers: Vec<SketchRegister>,
}

/// One stored register; `values` are encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SketchRegister {
    /// Linearized register index.
    pub index: u64,
    /// Encoded values, one per value spec.
    pub values: Vec<i64>,
}

impl Sketch {
    /// Encodes `sketch`, attaching `config`.
    ///
    /// Registers are emitted in ascending index order so that equal sketches
    /// encode identically.
    pub fn from_any_sketch(sketch: &AnySketch, config: SketchConfig) -> Self {
        let functions = sketch.value_functions();
        let mut registers: Vec<SketchRegister> = sketch
            .iter()
            .map(|register| SketchRegister {
                index: register.index,
                values: encode_values(functions, register.values),
            })
            .collect();
        registers.sort_unstable_by_key(|register| register.index);

        Self { config, registers }
    }

    /// Builds an in-memory sketch from the embedded config and decodes the
    /// registers into it.
    ///
    /// # Errors
    /// Returns a configuration error for an invalid config, and
    /// [`SketchError::ValueCountMismatch`] or
    /// [`SketchError::RegisterIndexOutOfRange`] for malformed registers.
    pub fn to_any_sketch(&self) -> Result<AnySketch, SketchError> {
        let mut sketch = AnySketch::from_config(&self.config)?;
        self.decode_into(&mut sketch)?;
        Ok(sketch)
    }

    /// Decodes the registers and aggregates them into `target`.
    ///
    /// Every register is checked before any is aggregated, so `target` is
    /// left untouched on error.
    ///
    /// # Errors
    /// Returns [`SketchError::ValueCountMismatch`] when a register's width
    /// differs from `target`'s, and [`SketchError::RegisterIndexOutOfRange`]
    /// for indexes outside `target`'s index space.
    pub fn decode_into(&self, target: &mut AnySketch) -> Result<(), SketchError> {
        for register in &self.registers {
            if register.values.len() != target.register_size() {
                return Err(SketchError::ValueCountMismatch {
                    expected: target.register_size(),
                    actual: register.values.len(),
                });
            }
            if u128::from(register.index) >= target.index_space() {
                return Err(SketchError::RegisterIndexOutOfRange(register.index));
            }
        }

        for register in &self.registers {
            let values = decode_values(target.value_functions(), &register.values);
            target.aggregate_into_register(register.index, &values)?;
        }
        Ok(())
    }
}

fn encode_values(functions: &[ValueFunction], values: &[i64]) -> Vec<i64> {
    functions
        .iter()
        .zip(values)
        .map(|(function, value)| function.aggregator().encode_to_proto_value(*value))
        .collect()
}

fn decode_values(functions: &[ValueFunction], values: &[i64]) -> Vec<i64> {
    functions
        .iter()
        .zip(values)
        .map(|(function, value)| function.aggregator().decode_from_proto_value(*value))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{Sketch, SketchRegister};
    use crate::aggregators::Aggregator;
    use crate::any_sketch::{AnySketch, ValueFunction};
    use crate::config::SketchConfig;
    use crate::distributions::Distribution;
    use crate::fingerprinters::SaltedFingerprinter;
    use crate::{ItemMetadata, SketchError};

    const LIQUID_LEGIONS: &str = include_str!("../testdata/liquid_legions.json");

    fn metadata(entries: &[(&str, i64)]) -> ItemMetadata {
        entries
            .iter()
            .map(|(key, value)| (key.to_string(), *value))
            .collect()
    }

    fn feature_sketch() -> AnySketch {
        AnySketch::new(
            vec![Distribution::oracle("id", 0, 999).unwrap()],
            vec![
                ValueFunction::new(
                    "value_function_1",
                    Aggregator::Sum,
                    Distribution::oracle("feature1", 5, 105).unwrap(),
                ),
                ValueFunction::new(
                    "value_function_2",
                    Aggregator::Unique,
                    Distribution::oracle("feature2", 6, 15).unwrap(),
                ),
            ],
        )
        .unwrap()
    }

    fn insert_people(sketch: &mut AnySketch) {
        for (item, frequency) in [
            ("person one", 1),
            ("persona dos", 2),
            ("personne trois", 3),
            ("qof afar", 4),
        ] {
            sketch.insert(item, &metadata(&[("frequency", frequency)])).unwrap();
        }
    }

    #[test]
    fn empty_sketch_has_no_registers() {
        let sketch = Sketch::from_any_sketch(&feature_sketch(), SketchConfig::default());
        assert_eq!(sketch, Sketch::default());
    }

    #[test]
    fn unique_columns_are_shifted_when_encoded() {
        let mut any_sketch = feature_sketch();
        for (id, feature1, feature2) in [(4, 13, 9), (1, 10, 6), (3, 12, 8), (2, 11, 7)] {
            any_sketch
                .insert(
                    "irrelevant",
                    &metadata(&[("id", id), ("feature1", feature1), ("feature2", feature2)]),
                )
                .unwrap();
        }

        let sketch = Sketch::from_any_sketch(&any_sketch, SketchConfig::default());
        let register = |index, values: [i64; 2]| SketchRegister {
            index,
            values: values.to_vec(),
        };
        assert_eq!(
            sketch.registers,
            vec![
                register(1, [10, 7]),
                register(2, [11, 8]),
                register(3, [12, 9]),
                register(4, [13, 10]),
            ]
        );
    }

    #[test]
    fn destroyed_values_encode_as_zero() {
        let mut any_sketch = feature_sketch();
        any_sketch
            .insert("a", &metadata(&[("id", 1), ("feature1", 5), ("feature2", 6)]))
            .unwrap();
        any_sketch
            .insert("b", &metadata(&[("id", 1), ("feature1", 5), ("feature2", 7)]))
            .unwrap();

        let sketch = Sketch::from_any_sketch(&any_sketch, SketchConfig::default());
        assert_eq!(sketch.registers[0].values, vec![10, 0]);

        let mut decoded = feature_sketch();
        sketch.decode_into(&mut decoded).unwrap();
        assert_eq!(decoded.get(1), Some(&[10, -1][..]));
    }

    #[test]
    fn liquid_legions_round_trip() {
        let config: SketchConfig = serde_json::from_str(LIQUID_LEGIONS).unwrap();

        let mut first = AnySketch::from_config(&config).unwrap();
        insert_people(&mut first);
        let encoded = Sketch::from_any_sketch(&first, config.clone());
        assert_eq!(encoded.registers.len(), first.len());

        let decoded = encoded.to_any_sketch().unwrap();
        assert_eq!(Sketch::from_any_sketch(&decoded, config.clone()), encoded);

        let json = serde_json::to_string(&encoded).unwrap();
        let parsed: Sketch = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, encoded);
    }

    #[test]
    fn config_and_explicit_construction_agree() {
        let config: SketchConfig = serde_json::from_str(LIQUID_LEGIONS).unwrap();
        let mut from_config = AnySketch::from_config(&config).unwrap();
        insert_people(&mut from_config);

        let mut explicit = AnySketch::new(
            vec![
                Distribution::exponential(Arc::new(SaltedFingerprinter::farm("Index")), 23.0, 330_000)
                    .unwrap(),
            ],
            vec![
                ValueFunction::new(
                    "SamplingIndicator",
                    Aggregator::Unique,
                    Distribution::uniform(
                        Arc::new(SaltedFingerprinter::farm("SamplingIndicator")),
                        0,
                        9_999_999,
                    )
                    .unwrap(),
                ),
                ValueFunction::new(
                    "Frequency",
                    Aggregator::Sum,
                    Distribution::oracle("frequency", i64::MIN, i64::MAX).unwrap(),
                ),
            ],
        )
        .unwrap();
        insert_people(&mut explicit);

        assert_eq!(
            Sketch::from_any_sketch(&explicit, config.clone()),
            Sketch::from_any_sketch(&from_config, config)
        );
    }

    #[test]
    fn decoding_aggregates_with_existing_registers() {
        let mut any_sketch = feature_sketch();
        any_sketch
            .insert("a", &metadata(&[("id", 1), ("feature1", 5), ("feature2", 6)]))
            .unwrap();
        let sketch = Sketch::from_any_sketch(&any_sketch, SketchConfig::default());

        sketch.decode_into(&mut any_sketch).unwrap();
        assert_eq!(any_sketch.get(1), Some(&[10, 6][..]));
    }

    #[test]
    fn malformed_registers_are_rejected() {
        let sketch = Sketch {
            config: SketchConfig::default(),
            registers: vec![SketchRegister {
                index: 1,
                values: vec![1],
            }],
        };
        assert_eq!(
            sketch.decode_into(&mut feature_sketch()).unwrap_err(),
            SketchError::ValueCountMismatch {
                expected: 2,
                actual: 1
            }
        );

        let out_of_range = Sketch {
            config: SketchConfig::default(),
            registers: vec![SketchRegister {
                index: 1_000,
                values: vec![1, 1],
            }],
        };
        assert_eq!(
            out_of_range.decode_into(&mut feature_sketch()).unwrap_err(),
            SketchError::RegisterIndexOutOfRange(1_000)
        );
    }

    #[test]
    fn failed_decode_leaves_target_untouched() {
        let mut target = feature_sketch();
        target
            .insert("a", &metadata(&[("id", 1), ("feature1", 5), ("feature2", 6)]))
            .unwrap();

        let register = |index, values: &[i64]| SketchRegister {
            index,
            values: values.to_vec(),
        };
        for registers in [
            vec![register(1, &[5, 7]), register(2, &[7, 7]), register(1_000, &[1, 1])],
            vec![register(1, &[5, 7]), register(2, &[7, 7]), register(3, &[1])],
        ] {
            let sketch = Sketch {
                config: SketchConfig::default(),
                registers,
            };
            assert!(sketch.decode_into(&mut target).is_err());
            assert_eq!(target.len(), 1);
            assert_eq!(target.get(1), Some(&[5, 6][..]));
            assert_eq!(target.get(2), None);
        }
    }
}
