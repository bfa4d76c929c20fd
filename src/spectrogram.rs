// SPDX-License-Identifier: GPL-3.0-or-later

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use ndarray::{ArcArray2, Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::Serialize;

use crate::{
    axis::{self, canonicalize_frequency_order},
    error::{Error, Result},
    util::{minmax, to_index},
};

/// Everything needed to build a [`Spectrogram`]. Validated by [`Spectrogram::new`].
#[derive(Debug, Clone)]
pub struct Parts {
    /// Intensities, shape (frequency, time).
    pub data: Array2<f32>,
    /// Seconds since `start`.
    pub time_axis: Array1<f64>,
    pub freq_axis: Array1<f64>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Seconds from the start of `start`'s day to `start`.
    pub t_init: f64,
    pub t_delt: f64,
    pub t_label: String,
    pub f_label: String,
    pub content: String,
    pub instruments: BTreeSet<String>,
}

/// A time-frequency matrix of observed intensities with a linear (elapsed seconds) time axis.
#[derive(Clone, PartialEq)]
pub struct Spectrogram {
    data: ArcArray2<f32>,
    time_axis: Array1<f64>,
    freq_axis: Array1<f64>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    t_init: f64,
    t_delt: f64,
    t_label: String,
    f_label: String,
    content: String,
    instruments: BTreeSet<String>,
}

impl std::fmt::Debug for Spectrogram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Spectrogram")
            .field("shape", &self.shape())
            .field("start", &self.start)
            .field("end", &self.end)
            .field("t_init", &self.t_init)
            .field("t_delt", &self.t_delt)
            .field("content", &self.content)
            .field("instruments", &self.instruments)
            .finish()
    }
}

/// Serialisable overview of a spectrogram.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub content: String,
    pub instruments: BTreeSet<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub t_init: f64,
    pub t_delt: f64,
    pub nfreq: usize,
    pub ntime: usize,
    pub freq_range: (f64, f64),
    pub duration: f64,
    pub intensity_bounds: (f32, f32),
}

impl Spectrogram {
    /// Builds a spectrogram, enforcing the axis invariants.
    ///
    /// The frequency axis is put into canonical order (together with the data rows) if needed.
    pub fn new(parts: Parts) -> Result<Self> {
        let Parts {
            data,
            time_axis,
            freq_axis,
            start,
            end,
            t_init,
            t_delt,
            t_label,
            f_label,
            content,
            instruments,
        } = parts;

        if time_axis.len() != data.ncols() {
            return Err(Error::MalformedTimeAxis(format!(
                "{} time samples for {} data columns",
                time_axis.len(),
                data.ncols()
            )));
        }
        check_time_axis(time_axis.view())?;
        if start > end {
            return Err(Error::MalformedTimeAxis(format!(
                "start {start} is after end {end}"
            )));
        }
        let (freq_axis, data) = canonicalize_frequency_order(freq_axis, data)?;

        Ok(Spectrogram {
            data: data.into_shared(),
            time_axis,
            freq_axis,
            start,
            end,
            t_init,
            t_delt,
            t_label,
            f_label,
            content,
            instruments,
        })
    }

    pub fn into_parts(self) -> Parts {
        Parts {
            data: self.data.into_owned(),
            time_axis: self.time_axis,
            freq_axis: self.freq_axis,
            start: self.start,
            end: self.end,
            t_init: self.t_init,
            t_delt: self.t_delt,
            t_label: self.t_label,
            f_label: self.f_label,
            content: self.content,
            instruments: self.instruments,
        }
    }

    pub fn data(&self) -> ArrayView2<'_, f32> {
        self.data.view()
    }

    pub fn time_axis(&self) -> ArrayView1<'_, f64> {
        self.time_axis.view()
    }

    pub fn freq_axis(&self) -> ArrayView1<'_, f64> {
        self.freq_axis.view()
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn t_init(&self) -> f64 {
        self.t_init
    }

    pub fn t_delt(&self) -> f64 {
        self.t_delt
    }

    pub fn t_label(&self) -> &str {
        &self.t_label
    }

    pub fn f_label(&self) -> &str {
        &self.f_label
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn instruments(&self) -> &BTreeSet<String> {
        &self.instruments
    }

    /// (frequency channels, time samples)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Index of the time sample nearest to `secs` seconds after `start`.
    pub fn time_to_index(&self, secs: f64) -> Option<usize> {
        to_index(self.time_axis.view(), secs)
    }

    /// Index of the frequency channel nearest to `freq`.
    pub fn freq_to_index(&self, freq: f64) -> Option<usize> {
        to_index(self.freq_axis.view(), freq)
    }

    /// Joins spectrograms sharing one frequency axis into a single one along time.
    ///
    /// Pieces are ordered by `start`. Time axes are shifted by each piece's offset from the
    /// earliest start. Metadata is taken from the earliest piece, instruments are merged.
    pub fn join_many(components: &[Spectrogram]) -> Result<Spectrogram> {
        let sorted = components
            .iter()
            .sorted_by_key(|s| s.start)
            .collect_vec();
        let Some(&first) = sorted.first() else {
            return Err(Error::EmptySelection(
                "no spectrograms to join".to_string(),
            ));
        };

        for spectrogram in sorted.iter().skip(1) {
            if spectrogram.freq_axis.len() != first.freq_axis.len() {
                return Err(Error::AxisMismatch {
                    axis: "frequency",
                    expected: first.freq_axis.len(),
                    actual: spectrogram.freq_axis.len(),
                });
            }
            if spectrogram.freq_axis != first.freq_axis {
                return Err(Error::IncompatibleAxes("frequency"));
            }
        }

        let time_axis = sorted
            .iter()
            .flat_map(|s| {
                let offset = (s.start - first.start).as_seconds_f64();
                s.time_axis.iter().map(move |t| t + offset)
            })
            .collect::<Array1<f64>>();
        check_time_axis(time_axis.view()).map_err(|_| {
            Error::MalformedTimeAxis("joined spectrograms overlap in time".to_string())
        })?;

        let data = ndarray::concatenate(
            Axis(1),
            &sorted.iter().map(|s| s.data.view()).collect_vec(),
        )
        .map_err(|e| Error::MalformedTimeAxis(e.to_string()))?;

        log::debug!(
            "Joined {} spectrograms into {} time samples",
            sorted.len(),
            time_axis.len()
        );
        Spectrogram::new(Parts {
            data,
            time_axis,
            freq_axis: first.freq_axis.clone(),
            start: first.start,
            end: sorted.iter().map(|s| s.end).max().unwrap_or(first.end),
            t_init: first.t_init,
            t_delt: first.t_delt,
            t_label: first.t_label.clone(),
            f_label: first.f_label.clone(),
            content: first.content.clone(),
            instruments: sorted
                .iter()
                .flat_map(|s| s.instruments.iter().cloned())
                .collect(),
        })
    }

    /// Samples whose elapsed time lies in `[from, to]`, re-based so the first kept one is at 0.
    pub fn in_interval(&self, from: f64, to: f64) -> Result<Spectrogram> {
        let keep = self
            .time_axis
            .iter()
            .positions(|&t| from <= t && t <= to)
            .collect_vec();
        let (Some(&first), Some(&last)) = (keep.first(), keep.last()) else {
            return Err(Error::EmptySelection(format!(
                "no time samples in [{from}, {to}] s"
            )));
        };

        let offset = self.time_axis[first];
        let start = axis::offset_time(self.start, offset)?;
        let end = axis::offset_time(start, self.time_axis[last] - offset)?;
        Spectrogram::new(Parts {
            data: self.data.select(Axis(1), &keep),
            time_axis: self.time_axis.select(Axis(0), &keep) - offset,
            start,
            end,
            t_init: axis::compute_day_offset(start),
            ..self.clone().into_parts()
        })
    }

    /// Channels whose frequency lies in `[min, max]`.
    pub fn clip_freq(&self, min: f64, max: f64) -> Result<Spectrogram> {
        let keep = self
            .freq_axis
            .iter()
            .positions(|&f| min <= f && f <= max)
            .collect_vec();
        if keep.is_empty() {
            return Err(Error::EmptySelection(format!(
                "no frequency channels in [{min}, {max}]"
            )));
        }

        Spectrogram::new(Parts {
            data: self.data.select(Axis(0), &keep),
            freq_axis: self.freq_axis.select(Axis(0), &keep),
            ..self.clone().into_parts()
        })
    }

    /// Mean intensity of every channel over time.
    pub fn constant_background(&self) -> Array1<f32> {
        self.data
            .mean_axis(Axis(1))
            .unwrap_or_else(|| Array1::zeros(self.data.nrows()))
    }

    /// Copy with the per-channel [constant background](Self::constant_background) removed.
    pub fn subtract_bg(&self) -> Spectrogram {
        let bg = self.constant_background().insert_axis(Axis(1));
        let data = (&self.data - &bg).into_shared();
        Spectrogram {
            data,
            ..self.clone()
        }
    }

    pub fn summary(&self) -> Summary {
        let (nfreq, ntime) = self.shape();
        Summary {
            content: self.content.clone(),
            instruments: self.instruments.clone(),
            start: self.start,
            end: self.end,
            t_init: self.t_init,
            t_delt: self.t_delt,
            nfreq,
            ntime,
            freq_range: (
                self.freq_axis.first().copied().unwrap_or(f64::NAN),
                self.freq_axis.last().copied().unwrap_or(f64::NAN),
            ),
            duration: self.time_axis.last().copied().unwrap_or(0.0),
            intensity_bounds: minmax(self.data.iter()),
        }
    }
}

/// Elapsed-time axes start at 0, never decrease and hold finite samples only.
fn check_time_axis(time_axis: ArrayView1<f64>) -> Result<()> {
    if let Some(i) = time_axis.iter().position(|t| !t.is_finite()) {
        return Err(Error::MalformedTimeAxis(format!(
            "time sample {i} is {}",
            time_axis[i]
        )));
    }
    match time_axis.first() {
        None => return Err(Error::MalformedTimeAxis("no time samples".to_string())),
        Some(&t0) if t0 != 0.0 => {
            return Err(Error::MalformedTimeAxis(format!(
                "time axis starts at {t0} s instead of 0"
            )));
        }
        _ => {}
    }
    match time_axis
        .iter()
        .tuple_windows()
        .position(|(a, b)| !(a <= b))
    {
        Some(i) => Err(Error::MalformedTimeAxis(format!(
            "time axis decreases after sample {i}"
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};
    use ndarray::{arr1, arr2};

    fn parts() -> Parts {
        let start = Utc.with_ymd_and_hms(2020, 6, 26, 0, 0, 10).unwrap();
        Parts {
            data: arr2(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]),
            time_axis: arr1(&[0.0, 1.0, 2.0]),
            freq_axis: arr1(&[1.0, 2.0]),
            start,
            end: start + TimeDelta::seconds(2),
            t_init: 10.0,
            t_delt: 1.0,
            t_label: "Time".to_string(),
            f_label: "Frequency".to_string(),
            content: "test".to_string(),
            instruments: BTreeSet::from(["TEST".to_string()]),
        }
    }

    fn shifted(secs: i64) -> Parts {
        let parts = parts();
        Parts {
            start: parts.start + TimeDelta::seconds(secs),
            end: parts.end + TimeDelta::seconds(secs),
            ..parts
        }
    }

    #[test]
    fn new_checks_axis_lengths() {
        let err = Spectrogram::new(Parts {
            time_axis: arr1(&[0.0, 1.0]),
            ..parts()
        })
        .unwrap_err();
        assert!(matches!(err, Error::MalformedTimeAxis(_)));

        let err = Spectrogram::new(Parts {
            freq_axis: arr1(&[1.0, 2.0, 3.0]),
            ..parts()
        })
        .unwrap_err();
        assert!(matches!(err, Error::AxisMismatch { axis: "frequency", .. }));
    }

    #[test]
    fn new_checks_time_axis_shape() {
        for time_axis in [
            arr1(&[1.0, 2.0, 3.0]),
            arr1(&[0.0, 2.0, 1.0]),
            arr1(&[0.0, f64::NAN, 1.0]),
            arr1(&[0.0, 1.0, f64::INFINITY]),
        ] {
            let err = Spectrogram::new(Parts { time_axis, ..parts() }).unwrap_err();
            assert!(matches!(err, Error::MalformedTimeAxis(_)));
        }
        let p = parts();
        let err = Spectrogram::new(Parts {
            end: p.start - TimeDelta::seconds(1),
            ..p
        })
        .unwrap_err();
        assert!(matches!(err, Error::MalformedTimeAxis(_)));
    }

    #[test]
    fn new_canonicalizes_frequency() {
        let spec = Spectrogram::new(Parts {
            freq_axis: arr1(&[2.0, 1.0]),
            ..parts()
        })
        .unwrap();
        assert_eq!(spec.freq_axis(), arr1(&[1.0, 2.0]));
        assert_eq!(spec.data().row(0), arr1(&[4.0f32, 5.0, 6.0]));
    }

    #[test]
    fn join_orders_by_start() {
        let a = Spectrogram::new(parts()).unwrap();
        let mut b_parts = shifted(3);
        b_parts.instruments = BTreeSet::from(["OTHER".to_string()]);
        let b = Spectrogram::new(b_parts).unwrap();

        let joined = Spectrogram::join_many(&[b, a.clone()]).unwrap();
        assert_eq!(joined.shape(), (2, 6));
        assert_eq!(joined.time_axis(), arr1(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]));
        assert_eq!(joined.start(), a.start());
        assert_eq!(joined.end(), a.start() + TimeDelta::seconds(5));
        assert_eq!(joined.instruments().len(), 2);
        assert_eq!(joined.data().row(1), arr1(&[4.0f32, 5.0, 6.0, 4.0, 5.0, 6.0]));
    }

    #[test]
    fn join_rejects_overlap_and_other_channels() {
        let a = Spectrogram::new(parts()).unwrap();
        let b = Spectrogram::new(shifted(1)).unwrap();
        assert!(matches!(
            Spectrogram::join_many(&[a.clone(), b]),
            Err(Error::MalformedTimeAxis(_))
        ));

        let c = Spectrogram::new(Parts {
            freq_axis: arr1(&[1.0, 3.0]),
            ..shifted(10)
        })
        .unwrap();
        assert!(matches!(
            Spectrogram::join_many(&[a.clone(), c]),
            Err(Error::IncompatibleAxes("frequency"))
        ));
        let d = Spectrogram::new(Parts {
            data: arr2(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]]),
            freq_axis: arr1(&[1.0, 2.0, 3.0]),
            ..shifted(10)
        })
        .unwrap();
        assert!(matches!(
            Spectrogram::join_many(&[a.clone(), d]),
            Err(Error::AxisMismatch { axis: "frequency", expected: 2, actual: 3 })
        ));
        assert!(matches!(
            Spectrogram::join_many(&[]),
            Err(Error::EmptySelection(_))
        ));
    }

    #[test]
    fn interval_rebases_time() {
        let spec = Spectrogram::new(parts()).unwrap();
        let cropped = spec.in_interval(0.5, 2.0).unwrap();
        assert_eq!(cropped.time_axis(), arr1(&[0.0, 1.0]));
        assert_eq!(cropped.start(), spec.start() + TimeDelta::seconds(1));
        assert_eq!(cropped.t_init(), 11.0);
        assert_eq!(cropped.data().column(0), arr1(&[2.0f32, 5.0]));
        assert!(matches!(
            spec.in_interval(5.0, 6.0),
            Err(Error::EmptySelection(_))
        ));
    }

    #[test]
    fn interval_past_representable_time_is_an_error() {
        let spec = Spectrogram::new(Parts {
            time_axis: arr1(&[0.0, 1.0, 1e13]),
            ..parts()
        })
        .unwrap();
        assert!(matches!(
            spec.in_interval(1.0, 2e13),
            Err(Error::MalformedTimeAxis(_))
        ));
        assert!(matches!(
            spec.in_interval(0.0, 2e13),
            Err(Error::MalformedTimeAxis(_))
        ));
    }

    #[test]
    fn clip_and_background() {
        let spec = Spectrogram::new(parts()).unwrap();
        let clipped = spec.clip_freq(1.5, 3.0).unwrap();
        assert_eq!(clipped.freq_axis(), arr1(&[2.0]));
        assert_eq!(clipped.shape(), (1, 3));

        assert_eq!(spec.constant_background(), arr1(&[2.0f32, 5.0]));
        let flat = spec.subtract_bg();
        assert_eq!(flat.data().row(1), arr1(&[-1.0f32, 0.0, 1.0]));
    }

    #[test]
    fn lookups_and_summary() {
        let spec = Spectrogram::new(parts()).unwrap();
        assert_eq!(spec.time_to_index(1.4), Some(1));
        assert_eq!(spec.freq_to_index(10.0), Some(1));

        let summary = spec.summary();
        assert_eq!((summary.nfreq, summary.ntime), (2, 3));
        assert_eq!(summary.freq_range, (1.0, 2.0));
        assert_eq!(summary.intensity_bounds, (1.0, 6.0));
        assert_eq!(summary.duration, 2.0);
    }
}
