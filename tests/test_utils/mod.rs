// SPDX-License-Identifier: GPL-3.0-or-later

#![allow(dead_code)]

use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use ndarray::{Array1, Array2};
use rspectra::{
    Error, Result,
    sources::{Section, SectionReader},
};

/// Serves pre-decoded sections by path and counts how often it was asked.
#[derive(Default)]
pub struct MemoryReader {
    files: Mutex<HashMap<PathBuf, Vec<Section>>>,
    opened: AtomicUsize,
}

impl MemoryReader {
    pub fn insert(&self, path: impl Into<PathBuf>, sections: Vec<Section>) {
        self.files
            .lock()
            .unwrap()
            .insert(path.into(), sections);
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl SectionReader for MemoryReader {
    fn open(&self, path: &Path) -> Result<Vec<Section>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| Error::decode(path.display().to_string(), "no such file"))
    }
}

/// EOVSA-shaped sections: `data[f][t] = 10 * f + t` with the frequency axis listed high to low,
/// one sample per second starting `start_ms` into MJD `day`.
pub fn eovsa_sections(freqs: &[f64], ntime: usize, day: f64, start_ms: f64) -> Vec<Section> {
    let data = Array2::from_shape_fn((freqs.len(), ntime), |(f, t)| (10 * f + t) as f32);
    vec![
        Section::Image(data),
        Section::Table(BTreeMap::from([(
            "sfreq".to_string(),
            Array1::from(freqs.to_vec()),
        )])),
        Section::Table(BTreeMap::from([
            ("mjd".to_string(), Array1::from_elem(ntime, day)),
            (
                "time".to_string(),
                Array1::from_shape_fn(ntime, |t| start_ms + 1000.0 * t as f64),
            ),
        ])),
    ]
}
