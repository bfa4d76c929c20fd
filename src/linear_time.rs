// SPDX-License-Identifier: GPL-3.0-or-later

//! The base constructor registry every spectrogram source builds on.

use std::path::{Path, PathBuf};

use lazy_static::lazy_static;

use crate::{
    axis,
    dispatch::{Call, Registry, Value},
    error::{Error, Result},
    spectrogram::{Parts, Spectrogram},
};

lazy_static! {
    static ref REGISTRY: Registry = base();
}

/// The process-wide base registry.
pub fn registry() -> &'static Registry {
    &REGISTRY
}

/// A fresh base registry holding, in order, the `array`, `glob` and `directory` constructors.
pub fn base() -> Registry {
    let registry = Registry::new("LinearTimeSpectrogram");
    registry
        .register(
            "array",
            "(data: matrix, time_axis: vector, freq_axis: vector; start=time, [end=time, \
             t_init=float, t_delt=float, t_label=text, f_label=text, content=text, \
             instruments=tags])",
            is_array,
            |_, call| from_array(call),
        )
        .register("glob", "(pattern: text)", is_glob, |registry, call| {
            let pattern = call.sole_arg().and_then(Value::as_text).unwrap_or_default();
            from_glob(registry, call, pattern)
        })
        .register("directory", "(dir: path)", is_directory, |registry, call| {
            let dir = call.sole_arg().and_then(Value::as_path).unwrap_or(Path::new(""));
            from_directory(registry, call, dir)
        });
    registry
}

fn is_array(call: &Call) -> bool {
    matches!(
        call.args.as_slice(),
        [Value::Matrix(_), Value::Vector(_), Value::Vector(_)]
    ) && matches!(call.kw("start"), Some(Value::Time(_)))
}

fn is_glob(call: &Call) -> bool {
    call.sole_arg()
        .and_then(Value::as_text)
        .is_some_and(|s| s.contains(['*', '?', '[']) && glob::Pattern::new(s).is_ok())
}

fn is_directory(call: &Call) -> bool {
    call.sole_arg()
        .and_then(Value::as_path)
        .is_some_and(Path::is_dir)
}

/// Builds a spectrogram from in-memory arrays.
///
/// Without an `end` keyword the end is `start` plus the last elapsed time. Without `t_init` it
/// is the day offset of `start`. Without `t_delt` it is the mean sample spacing.
pub fn from_array(call: &Call) -> Result<Spectrogram> {
    let [Value::Matrix(data), Value::Vector(time_axis), Value::Vector(freq_axis)] =
        call.args.as_slice()
    else {
        return Err(Error::UnrecognizedInputShape(call.shape()));
    };
    let Some(start) = call.kw("start").and_then(Value::as_time) else {
        return Err(Error::MalformedTimeAxis("missing `start` keyword".to_string()));
    };

    let (freq_axis, data) = axis::canonicalize_frequency_order(freq_axis.clone(), data.clone())?;
    let last = time_axis.last().copied().unwrap_or(0.0);
    let mean_spacing = match time_axis.len() {
        0 | 1 => 1.0,
        n => last / (n - 1) as f64,
    };
    let end = match call.kw("end").and_then(Value::as_time) {
        Some(end) => end,
        None => axis::offset_time(start, last)?,
    };
    let text = |name: &str, default: &str| {
        call.kw(name)
            .and_then(Value::as_text)
            .unwrap_or(default)
            .to_string()
    };

    Spectrogram::new(Parts {
        data,
        time_axis: time_axis.clone(),
        freq_axis,
        start,
        end,
        t_init: call
            .kw("t_init")
            .and_then(Value::as_f64)
            .unwrap_or_else(|| axis::compute_day_offset(start)),
        t_delt: call
            .kw("t_delt")
            .and_then(Value::as_f64)
            .unwrap_or(mean_spacing),
        t_label: text("t_label", "Time"),
        f_label: text("f_label", "Frequency"),
        content: text("content", ""),
        instruments: call
            .kw("instruments")
            .and_then(Value::as_tags)
            .cloned()
            .unwrap_or_default(),
    })
}

/// Dispatches every file matching `pattern` and joins the results.
pub fn from_glob(registry: &Registry, call: &Call, pattern: &str) -> Result<Spectrogram> {
    let paths = glob::glob(pattern)
        .map_err(|e| Error::decode(pattern, e.to_string()))?
        .filter_map(|entry| match entry {
            Ok(path) if path.is_file() => Some(path),
            Ok(path) => {
                log::warn!("Skipping {}: not a file", path.display());
                None
            }
            Err(e) => {
                log::warn!("Skipping unreadable glob entry: {e}");
                None
            }
        })
        .collect::<Vec<_>>();
    if paths.is_empty() {
        return Err(Error::EmptySelection(format!("no files match {pattern}")));
    }
    read_many(registry, call, paths)
}

/// Dispatches every file in `dir` (sorted by name) and joins the results.
pub fn from_directory(registry: &Registry, call: &Call, dir: &Path) -> Result<Spectrogram> {
    let mut paths = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    paths.retain(|p| p.is_file());
    paths.sort();
    if paths.is_empty() {
        return Err(Error::EmptySelection(format!(
            "no files in {}",
            dir.display()
        )));
    }
    read_many(registry, call, paths)
}

fn read_many(registry: &Registry, call: &Call, paths: Vec<PathBuf>) -> Result<Spectrogram> {
    log::debug!("Reading {} files through {}", paths.len(), registry.name());
    let spectrograms = paths
        .into_iter()
        .map(|path| registry.create(&call.with_args(vec![Value::Path(path)])))
        .collect::<Result<Vec<_>>>()?;
    Spectrogram::join_many(&spectrograms)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::{TimeZone, Utc};
    use ndarray::{arr1, arr2};

    use super::*;

    fn array_call() -> Call {
        Call::new()
            .arg(arr2(&[[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]]))
            .arg(arr1(&[0.0, 2.0, 4.0]))
            .arg(arr1(&[20.0, 10.0]))
            .kwarg("start", Utc.with_ymd_and_hms(2020, 6, 26, 0, 5, 0).unwrap())
    }

    #[test]
    fn array_defaults() {
        let spec = registry().create(&array_call()).unwrap();
        assert_eq!(spec.freq_axis(), arr1(&[10.0, 20.0]));
        assert_eq!(spec.data().row(0), arr1(&[4.0f32, 5.0, 6.0]));
        assert_eq!(spec.t_init(), 300.0);
        assert_eq!(spec.t_delt(), 2.0);
        assert_eq!(spec.end(), spec.start() + chrono::TimeDelta::seconds(4));
        assert!(spec.instruments().is_empty());
    }

    #[test]
    fn array_keywords() {
        let call = array_call()
            .kwarg("t_delt", 1.0)
            .kwarg("content", "synthetic")
            .kwarg("instruments", BTreeSet::from(["SIM".to_string()]));
        let spec = registry().create(&call).unwrap();
        assert_eq!(spec.t_delt(), 1.0);
        assert_eq!(spec.content(), "synthetic");
        assert!(spec.instruments().contains("SIM"));
    }

    #[test]
    fn array_without_start_is_not_an_array_call() {
        let call = Call {
            kwargs: Default::default(),
            ..array_call()
        };
        assert!(registry().matching(&call).is_none());
    }

    #[test]
    fn array_shape_errors_are_tagged() {
        let call = array_call().with_args(vec![
            Value::from(arr2(&[[1.0f32, 2.0]])),
            Value::from(arr1(&[0.0, 1.0])),
            Value::from(arr1(&[1.0, 2.0, 3.0])),
        ]);
        let err = registry().create(&call).unwrap_err();
        assert_eq!(err.handler_path(), vec!["array"]);
        assert!(matches!(err.root(), Error::AxisMismatch { .. }));
    }

    #[test]
    fn unbounded_time_samples_are_malformed() {
        for last in [f64::INFINITY, 1e13] {
            let call = array_call().with_args(vec![
                Value::from(arr2(&[[1.0f32, 2.0]])),
                Value::from(arr1(&[0.0, last])),
                Value::from(arr1(&[1.0])),
            ]);
            let err = registry().create(&call).unwrap_err();
            assert_eq!(err.handler_path(), vec!["array"]);
            assert!(matches!(err.root(), Error::MalformedTimeAxis(_)), "{err}");
        }
    }

    #[test]
    fn glob_and_directory_predicates() {
        let dir = tempfile::tempdir().unwrap();
        assert!(is_directory(&Call::single(dir.path())));
        assert!(!is_directory(&Call::single(dir.path().join("missing"))));
        assert!(is_glob(&Call::single("/data/*.fts")));
        assert!(!is_glob(&Call::single("/data/a.fts")));
        assert!(!is_glob(&Call::single(PathBuf::from("/data/*.fts"))));
    }

    #[test]
    fn empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = registry().create_from(dir.path()).unwrap_err();
        assert_eq!(err.handler_path(), vec!["directory"]);
        assert!(matches!(err.root(), Error::EmptySelection(_)));
    }
}
