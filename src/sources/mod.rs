// SPDX-License-Identifier: GPL-3.0-or-later

//! File sources. Decoding of the container format is left to a [`SectionReader`]; sources turn
//! the decoded sections into spectrograms.

use std::{collections::BTreeMap, path::Path};

use ndarray::{Array1, Array2};

use crate::error::{Error, Result};

pub mod eovsa;
#[cfg(feature = "fits")]
pub mod fits;

/// One decoded section (HDU) of a structured binary file.
#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    /// A section without a data payload.
    Empty,
    Image(Array2<f32>),
    /// Named numeric columns.
    Table(BTreeMap<String, Array1<f64>>),
}

impl Section {
    pub fn data(&self) -> Option<&Array2<f32>> {
        match self {
            Section::Image(data) => Some(data),
            _ => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Array1<f64>> {
        match self {
            Section::Table(columns) => columns.get(name),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Section::Empty => "empty section",
            Section::Image(_) => "image",
            Section::Table(_) => "table",
        }
    }
}

/// The file-parsing collaborator: opens a file and returns its sections in file order.
pub trait SectionReader: Send + Sync {
    fn open(&self, path: &Path) -> Result<Vec<Section>>;
}

/// The image payload of section `index`.
pub fn image<'a>(sections: &'a [Section], index: usize, source: &str) -> Result<&'a Array2<f32>> {
    let section = nth(sections, index, source)?;
    section.data().ok_or_else(|| {
        Error::decode(
            source,
            format!("section {index} is a {}, expected an image", section.kind()),
        )
    })
}

/// Column `name` of the table in section `index`.
pub fn field<'a>(
    sections: &'a [Section],
    index: usize,
    name: &str,
    source: &str,
) -> Result<&'a Array1<f64>> {
    let section = nth(sections, index, source)?;
    section.field(name).ok_or_else(|| {
        Error::decode(
            source,
            format!("section {index} ({}) has no field `{name}`", section.kind()),
        )
    })
}

fn nth<'a>(sections: &'a [Section], index: usize, source: &str) -> Result<&'a Section> {
    sections.get(index).ok_or_else(|| {
        Error::decode(
            source,
            format!("expected at least {} sections, found {}", index + 1, sections.len()),
        )
    })
}

#[cfg(test)]
mod tests {
    use ndarray::arr1;

    use super::*;

    #[test]
    fn missing_pieces_are_decode_errors() {
        let sections = vec![
            Section::Empty,
            Section::Table(BTreeMap::from([("sfreq".to_string(), arr1(&[1.0]))])),
        ];
        assert!(field(&sections, 1, "sfreq", "mem").is_ok());

        for err in [
            image(&sections, 0, "mem").unwrap_err(),
            field(&sections, 1, "mjd", "mem").unwrap_err(),
            field(&sections, 2, "mjd", "mem").unwrap_err(),
        ] {
            assert!(matches!(err, Error::Decode { .. }), "{err}");
        }
        let err = field(&sections, 1, "mjd", "mem").unwrap_err();
        assert!(err.to_string().contains("`mjd`"));
    }
}
