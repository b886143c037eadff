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
use anysketch::config::SketchConfig;
use anysketch::sketch_sql::SqlTemplate;

const LIQUID_LEGIONS: &str = include_str!("../testdata/liquid_legions.json");
const GEOMETRIC: &str = include_str!("../testdata/geometric_distribution.json");

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let template = SqlTemplate::bigquery();

    for (name, json) in [("liquid_legions", LIQUID_LEGIONS), ("geometric", GEOMETRIC)] {
        let config: SketchConfig = serde_json::from_str(json)?;
        let sql = template.render("`project.dataset.impressions`", &config)?;
        println!("-- {name}\n{sql};\n");
    }

    Ok(())
}
