// SPDX-License-Identifier: GPL-3.0-or-later

pub mod axis;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod linear_time;
pub mod sources;
pub mod spectrogram;
pub mod util;

pub use config::SourceConfig;
pub use dispatch::{Call, Registry, Value};
pub use error::{Error, Result};
pub use spectrogram::{Parts, Spectrogram, Summary};
