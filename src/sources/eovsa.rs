// SPDX-License-Identifier: GPL-3.0-or-later

//! EOVSA total-power spectrogram files.
//!
//! Layout: section 0 holds the (frequency, time) intensity image, section 1 a table with the
//! frequency axis (`sfreq`, listed high to low), section 2 a table with the per-sample modified
//! Julian day (`mjd`) and milliseconds into that day (`time`).

use std::{
    path::Path,
    sync::Arc,
};

use chrono::NaiveDate;
use itertools::Itertools;
use lazy_static::lazy_static;
use regex::Regex;

use super::{SectionReader, Section, field, image};
use crate::{
    axis,
    config::SourceConfig,
    dispatch::{Call, Registry, Value},
    error::Result,
    spectrogram::{Parts, Spectrogram},
};

lazy_static! {
    static ref FILE_DATE: Regex =
        Regex::new(r"^[^_]*_[^_]*_(\d{4})(\d{2})(\d{2})").expect("valid file date regex");
}

#[cfg(feature = "fits")]
lazy_static! {
    static ref REGISTRY: Registry =
        Arc::new(Eovsa::new(Arc::new(super::fits::FitsReader))).registry(crate::linear_time::registry());
}

/// The process-wide EOVSA registry, layered on [`crate::linear_time::registry`] and reading
/// files through cfitsio.
#[cfg(feature = "fits")]
pub fn registry() -> &'static Registry {
    &REGISTRY
}

/// Observation date encoded in an EOVSA file name, e.g. `EOVSA_TPall_20200626.fts`.
pub fn file_date(path: &Path) -> Option<NaiveDate> {
    let name = path.file_name()?.to_str()?;
    let caps = FILE_DATE.captures(name)?;
    NaiveDate::from_ymd_opt(
        caps[1].parse().ok()?,
        caps[2].parse().ok()?,
        caps[3].parse().ok()?,
    )
}

pub struct Eovsa {
    reader: Arc<dyn SectionReader>,
    config: SourceConfig,
}

impl Eovsa {
    pub fn new(reader: Arc<dyn SectionReader>) -> Self {
        Self::with_config(reader, SourceConfig::default())
    }

    pub fn with_config(reader: Arc<dyn SectionReader>, config: SourceConfig) -> Self {
        Self { reader, config }
    }

    /// A single path (or text) argument with one of the configured suffixes.
    pub fn accepts(&self, call: &Call) -> bool {
        call.sole_arg()
            .and_then(Value::as_path)
            .is_some_and(|path| self.config.claims(path))
    }

    /// Reads `path` directly, without going through a registry.
    pub fn read(&self, path: &Path) -> Result<Spectrogram> {
        self.read_with(path, &self.config)
    }

    fn read_with(&self, path: &Path, config: &SourceConfig) -> Result<Spectrogram> {
        let source = path.display().to_string();
        let sections = self.reader.open(path)?;
        log::debug!(
            "Decoded {} sections from {source}: {:?}",
            sections.len(),
            sections.iter().map(Section::kind).collect_vec()
        );
        if let Some(date) = file_date(path) {
            log::trace!("{source} is named for {date}");
        }
        from_sections(&sections, config, &source)
    }

    /// Appends the `eovsa-file` constructor to `registry`.
    pub fn install(self: &Arc<Self>, registry: &Registry) {
        let signature = format!(
            "(path: {})",
            self.config.suffixes.iter().map(|s| format!("*.{s}")).join(" | ")
        );
        let predicate = Arc::clone(self);
        let handler = Arc::clone(self);
        registry.register(
            "eovsa-file",
            signature,
            move |call| predicate.accepts(call),
            move |_, call| {
                let path = call.sole_arg().and_then(Value::as_path).unwrap_or(Path::new(""));
                let config = handler.config.with_overrides(&call.kwargs);
                handler.read_with(path, &config)
            },
        );
    }

    /// A registry derived from `base` with the `eovsa-file` constructor appended.
    pub fn registry(self: &Arc<Self>, base: &Registry) -> Registry {
        let registry = base.derive("EOVSASpectrogram");
        self.install(&registry);
        registry
    }
}

/// Builds a spectrogram from decoded EOVSA sections.
pub fn from_sections(sections: &[Section], config: &SourceConfig, source: &str) -> Result<Spectrogram> {
    let data = image(sections, 0, source)?;
    let freq_axis = field(sections, 1, &config.freq_field, source)?;
    let days = field(sections, 2, &config.day_field, source)?;
    let ms_of_day = field(sections, 2, &config.time_field, source)?;

    let times = axis::decode_times(days.view(), ms_of_day.view())?;
    let (start, end, time_axis) = axis::compute_time_axis(&times)?;
    let (freq_axis, data) = axis::canonicalize_frequency_order(freq_axis.clone(), data.clone())?;
    log::debug!(
        "{source}: {} channels x {} samples from {start} to {end}, nominal cadence {} s",
        freq_axis.len(),
        time_axis.len(),
        config.t_delt
    );

    Spectrogram::new(Parts {
        data,
        time_axis,
        freq_axis,
        start,
        end,
        t_init: axis::compute_day_offset(start),
        t_delt: config.t_delt,
        t_label: config.t_label.clone(),
        f_label: config.f_label.clone(),
        content: config.content.clone(),
        instruments: config.instruments.clone(),
    })
}
