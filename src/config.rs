// SPDX-License-Identifier: GPL-3.0-or-later

use std::{collections::BTreeSet, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    dispatch::Value,
    error::{Error, Result},
};

/// Metadata and field names a file source attaches while building a spectrogram.
///
/// The defaults describe EOVSA total-power files. Keys missing from a JSON config fall back to
/// them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub instruments: BTreeSet<String>,
    /// Nominal seconds between samples. `1.0` marks the cadence as not authoritative.
    pub t_delt: f64,
    pub t_label: String,
    pub f_label: String,
    pub content: String,
    pub freq_field: String,
    pub day_field: String,
    pub time_field: String,
    /// File name extensions (without the dot) the source claims.
    pub suffixes: Vec<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            instruments: BTreeSet::from(["EOVSA".to_string()]),
            t_delt: 1.0,
            t_label: "Time [UT]".to_string(),
            f_label: "Frequency [GHz]".to_string(),
            content: "EOVSA Total Power Spectrogram".to_string(),
            freq_field: "sfreq".to_string(),
            day_field: "mjd".to_string(),
            time_field: "time".to_string(),
            suffixes: vec!["fts".to_string(), "fits".to_string(), "fit".to_string()],
        }
    }
}

impl SourceConfig {
    /// Reads a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| Error::decode(path.display().to_string(), e.to_string()))
    }

    /// True if `path` carries one of the configured suffixes (case-insensitive).
    pub fn claims(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.suffixes.iter().any(|s| s.eq_ignore_ascii_case(ext)))
    }

    /// Copy of this config with per-call keyword overrides applied.
    ///
    /// Recognised keys: `t_label`, `f_label`, `content` (text), `t_delt` (number) and
    /// `instruments` (tags). Values of the wrong shape are ignored.
    pub fn with_overrides<'a>(
        &self,
        kwargs: impl IntoIterator<Item = (&'a String, &'a Value)>,
    ) -> SourceConfig {
        let mut config = self.clone();
        for (key, value) in kwargs {
            match (key.as_str(), value, value.as_f64()) {
                ("t_label", Value::Text(s), _) => config.t_label = s.clone(),
                ("f_label", Value::Text(s), _) => config.f_label = s.clone(),
                ("content", Value::Text(s), _) => config.content = s.clone(),
                ("t_delt", _, Some(t_delt)) => config.t_delt = t_delt,
                ("instruments", Value::Tags(tags), _) => config.instruments = tags.clone(),
                _ => log::trace!("Keyword `{key}` does not override source config"),
            }
        }
        config
    }
}
