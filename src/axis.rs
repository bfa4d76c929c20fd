// SPDX-License-Identifier: GPL-3.0-or-later

//! Conversion of raw, format-specific time and frequency samples into the canonical axes of a
//! [`Spectrogram`](crate::spectrogram::Spectrogram).
//!
//! Everything in here is a pure transform. File decoding happens in the handlers that call it.

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use itertools::Itertools;
use ndarray::{Array1, Array2, ArrayView1, s};

use crate::{
    error::{Error, Result},
    util::seconds,
};

pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Direction every frequency axis is stored in.
pub const CANONICAL_ORDER: FrequencyOrder = FrequencyOrder::Ascending;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrequencyOrder {
    Ascending,
    Descending,
}

impl FrequencyOrder {
    /// Direction of `freq_axis`, judged by its first and last element.
    ///
    /// Axes with fewer than two channels (or a flat axis) count as canonical.
    pub fn of(freq_axis: ArrayView1<f64>) -> FrequencyOrder {
        match (freq_axis.first(), freq_axis.last()) {
            (Some(first), Some(last)) if first > last => FrequencyOrder::Descending,
            (Some(first), Some(last)) if first < last => FrequencyOrder::Ascending,
            _ => CANONICAL_ORDER,
        }
    }
}

/// Converts a modified Julian day plus milliseconds into that day to a UTC timestamp.
///
/// Fractional day counts are honoured. The result is rounded to the microsecond.
pub fn mjd_to_datetime(day: f64, ms_of_day: f64) -> Result<DateTime<Utc>> {
    let whole_days = day.floor();
    let micros = ((day - whole_days) * SECONDS_PER_DAY * 1e6 + ms_of_day * 1e3).round();
    if !whole_days.is_finite() || !micros.is_finite() {
        return Err(Error::MalformedTimeAxis(format!(
            "non-finite time sample (mjd {day}, {ms_of_day} ms)"
        )));
    }

    NaiveDate::from_ymd_opt(1858, 11, 17)
        .and_then(|epoch| epoch.and_hms_opt(0, 0, 0))
        .zip(TimeDelta::try_days(whole_days as i64))
        .and_then(|(epoch, days)| epoch.checked_add_signed(days))
        .and_then(|t| t.checked_add_signed(TimeDelta::microseconds(micros as i64)))
        .map(|t| t.and_utc())
        .ok_or_else(|| {
            Error::MalformedTimeAxis(format!(
                "time sample out of range (mjd {day}, {ms_of_day} ms)"
            ))
        })
}

/// Pairs a day-count column with a milliseconds-of-day column into absolute timestamps.
pub fn decode_times(days: ArrayView1<f64>, ms_of_day: ArrayView1<f64>) -> Result<Vec<DateTime<Utc>>> {
    if days.len() != ms_of_day.len() {
        return Err(Error::MalformedTimeAxis(format!(
            "{} day samples but {} time-of-day samples",
            days.len(),
            ms_of_day.len()
        )));
    }
    days.iter()
        .zip(ms_of_day.iter())
        .map(|(&day, &ms)| mjd_to_datetime(day, ms))
        .collect()
}

/// Returns `(start, end, elapsed)` where `elapsed[i]` is the number of seconds from
/// `times[0]` to `times[i]`.
pub fn compute_time_axis(
    times: &[DateTime<Utc>],
) -> Result<(DateTime<Utc>, DateTime<Utc>, Array1<f64>)> {
    let (Some(&start), Some(&end)) = (times.first(), times.last()) else {
        return Err(Error::MalformedTimeAxis("no time samples".to_string()));
    };
    if let Some((i, (a, b))) = times
        .iter()
        .tuple_windows()
        .enumerate()
        .find(|(_, (a, b))| b < a)
    {
        return Err(Error::MalformedTimeAxis(format!(
            "sample {} ({b}) precedes sample {i} ({a})",
            i + 1
        )));
    }

    let elapsed = times
        .iter()
        .map(|&t| (t - start).as_seconds_f64())
        .collect::<Array1<f64>>();
    Ok((start, end, elapsed))
}

/// Seconds between the start of the UTC day containing `start` and `start` itself.
pub fn compute_day_offset(start: DateTime<Utc>) -> f64 {
    (start - day_start(start)).as_seconds_f64()
}

/// Midnight of the UTC day containing `t`.
pub fn day_start(t: DateTime<Utc>) -> DateTime<Utc> {
    t.date_naive().and_time(chrono::NaiveTime::MIN).and_utc()
}

/// `start` moved forward by `secs` elapsed seconds.
pub fn offset_time(start: DateTime<Utc>, secs: f64) -> Result<DateTime<Utc>> {
    if !secs.is_finite() {
        return Err(Error::MalformedTimeAxis(format!(
            "non-finite offset {secs} s from {start}"
        )));
    }
    start.checked_add_signed(seconds(secs)).ok_or_else(|| {
        Error::MalformedTimeAxis(format!("{secs} s after {start} is out of range"))
    })
}

/// Puts `freq_axis` into [`CANONICAL_ORDER`], flipping the rows of `data` along with it.
pub fn canonicalize_frequency_order<A: Clone>(
    freq_axis: Array1<f64>,
    data: Array2<A>,
) -> Result<(Array1<f64>, Array2<A>)> {
    if freq_axis.len() != data.nrows() {
        return Err(Error::AxisMismatch {
            axis: "frequency",
            expected: data.nrows(),
            actual: freq_axis.len(),
        });
    }
    if FrequencyOrder::of(freq_axis.view()) == CANONICAL_ORDER {
        return Ok((freq_axis, data));
    }

    log::debug!(
        "Reversing {} frequency channels into {:?} order",
        freq_axis.len(),
        CANONICAL_ORDER
    );
    Ok((
        freq_axis.slice(s![..;-1]).to_owned(),
        data.slice(s![..;-1, ..]).to_owned(),
    ))
}
