// SPDX-License-Identifier: GPL-3.0-or-later

use std::{collections::BTreeMap, path::Path};

use fitsio::{FitsFile, hdu::HduInfo};
use ndarray::{Array1, Array2};

use super::{Section, SectionReader};
use crate::error::{Error, Result};

/// Reads FITS files through cfitsio.
///
/// Image HDUs must be two-dimensional. Table columns that cfitsio cannot convert to `f64` are
/// left out.
#[derive(Debug, Clone, Copy, Default)]
pub struct FitsReader;

impl SectionReader for FitsReader {
    fn open(&self, path: &Path) -> Result<Vec<Section>> {
        let source = path.display().to_string();
        let decode = |e: fitsio::errors::Error| Error::decode(&source, e.to_string());

        let mut file = FitsFile::open(path).map_err(decode)?;
        let mut sections = Vec::new();
        for index in 0usize.. {
            // cfitsio reports the end of the file as a failure to move to the next HDU
            let Ok(hdu) = file.hdu(index) else {
                break;
            };
            let section = match &hdu.info {
                HduInfo::ImageInfo { shape, .. } if shape.is_empty() => Section::Empty,
                HduInfo::ImageInfo { shape, .. } => {
                    let &[rows, cols] = shape.as_slice() else {
                        return Err(Error::decode(
                            &source,
                            format!("HDU {index} has {} axes, expected 2", shape.len()),
                        ));
                    };
                    let pixels: Vec<f32> = hdu.read_image(&mut file).map_err(decode)?;
                    let data = Array2::from_shape_vec((rows, cols), pixels)
                        .map_err(|e| Error::decode(&source, e.to_string()))?;
                    Section::Image(data)
                }
                HduInfo::TableInfo {
                    column_descriptions,
                    ..
                } => {
                    let mut columns = BTreeMap::new();
                    for column in column_descriptions {
                        match hdu.read_col::<f64>(&mut file, &column.name) {
                            Ok(values) => {
                                columns.insert(column.name.to_lowercase(), Array1::from(values));
                            }
                            Err(e) => log::debug!(
                                "{source}: skipping column `{}` of HDU {index}: {e}",
                                column.name
                            ),
                        }
                    }
                    Section::Table(columns)
                }
                HduInfo::AnyInfo => Section::Empty,
            };
            sections.push(section);
        }

        if sections.is_empty() {
            return Err(Error::decode(source, "no HDUs"));
        }
        Ok(sections)
    }
}
