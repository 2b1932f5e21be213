//! Hit-file reading.
//!
//! Input files carry one hit per line as whitespace-delimited
//! `channel time_ticks`. The first timestamp seen anchors the time axis at
//! zero and tick counts are divided by 100 to reach the engine's time units.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};

/// Ticks per engine time unit.
const TIME_SCALE: f64 = 100.0;

/// One raw hit from an input file, scaled to engine time units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub time: f64,
    pub chan: i32,
}

/// Read hits from `path`, skipping the first `nskip` and keeping at most
/// `nhits` of the rest. Blank lines are ignored; the skip count applies to
/// hit lines, and the first timestamp is anchored before skipping.
pub fn read_points(path: &Path, nskip: usize, nhits: Option<usize>) -> Result<Vec<Point>> {
    let file =
        File::open(path).with_context(|| format!("opening hit file {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut points = Vec::new();
    let mut first_timestamp: Option<i64> = None;
    let mut seen = 0usize;

    for (lineno, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading {}", path.display()))?;
        let mut fields = line.split_whitespace();
        let (Some(chan), Some(ticks)) = (fields.next(), fields.next()) else {
            continue;
        };
        let chan: i32 = chan
            .parse()
            .with_context(|| format!("bad channel on line {}: {:?}", lineno + 1, line))?;
        let ticks: i64 = ticks
            .parse()
            .with_context(|| format!("bad timestamp on line {}: {:?}", lineno + 1, line))?;

        let first = *first_timestamp.get_or_insert(ticks);
        seen += 1;
        if seen <= nskip {
            continue;
        }
        if let Some(limit) = nhits {
            if points.len() >= limit {
                break;
            }
        }
        points.push(Point {
            time: (ticks - first) as f64 / TIME_SCALE,
            chan,
        });
    }

    Ok(points)
}
