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
use anysketch::any_sketch::AnySketch;
use anysketch::config::SketchConfig;
use anysketch::estimation::{estimate_cardinality_liquid_legions, value_histogram};
use anysketch::sketch_proto::Sketch;
use anysketch::{ItemMetadata, aggregators::UNIQUE_DESTROYED_VALUE};

const CONFIG: &str = include_str!("../testdata/liquid_legions.json");
const DECAY_RATE: f64 = 23.0;
const NUM_REGISTERS: u64 = 330_000;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config: SketchConfig = serde_json::from_str(CONFIG)?;

    // Two publishers with overlapping audiences:
    // left  = users [0, 60_000), each seen once
    // right = users [40_000, 100_000), each seen twice
    let mut left = AnySketch::from_config(&config)?;
    let mut right = AnySketch::from_config(&config)?;
    let once = ItemMetadata::from([("frequency".to_string(), 1)]);
    let twice = ItemMetadata::from([("frequency".to_string(), 2)]);
    for user in 0_u64..60_000 {
        left.insert(&user.to_string(), &once)?;
    }
    for user in 40_000_u64..100_000 {
        right.insert(&user.to_string(), &twice)?;
    }

    // Ship one side through its external representation before merging.
    let encoded = serde_json::to_string(&Sketch::from_any_sketch(&right, config.clone()))?;
    let decoded: Sketch = serde_json::from_str(&encoded)?;
    left.merge(&decoded.to_any_sketch()?)?;

    let reach = estimate_cardinality_liquid_legions(DECAY_RATE, NUM_REGISTERS, left.len() as u64)?;
    println!("Active registers: {}", left.len());
    println!("Estimated reach: {reach} (actual 100000)");

    let sampling_indicator = left
        .value_index("SamplingIndicator")
        .ok_or("missing SamplingIndicator")?;
    let frequencies = value_histogram(&left, "Frequency", |register| {
        register.values[sampling_indicator] != UNIQUE_DESTROYED_VALUE
    })?;
    let sampled: u64 = frequencies.values().sum();
    for (frequency, registers) in &frequencies {
        println!(
            "Frequency {frequency}: {:.3}",
            *registers as f64 / sampled as f64
        );
    }

    Ok(())
}
