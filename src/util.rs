// SPDX-License-Identifier: GPL-3.0-or-later

use chrono::TimeDelta;
use itertools::Itertools;
use ndarray::ArrayView1;

/// Smallest and largest finite value, or `(NAN, NAN)` if there is none.
pub fn minmax<'a>(values: impl IntoIterator<Item = &'a f32>) -> (f32, f32) {
    values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f32::NAN, f32::NAN), |(min, max), &val| {
            (min.min(val), max.max(val))
        })
}

/// Index of the sample closest to `value`.
pub fn to_index(axis: ArrayView1<f64>, value: f64) -> Option<usize> {
    axis.iter()
        .position_min_by(|a, b| (*a - value).abs().total_cmp(&(*b - value).abs()))
}

/// Converts fractional seconds to a duration, rounded to the microsecond.
pub fn seconds(secs: f64) -> TimeDelta {
    TimeDelta::microseconds((secs * 1e6).round() as i64)
}
