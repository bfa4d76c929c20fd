// SPDX-License-Identifier: GPL-3.0-or-later

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Time samples are empty, out of order, or disagree with the data shape.
    #[error("malformed time axis: {0}")]
    MalformedTimeAxis(String),
    /// No registered predicate accepts the call.
    #[error("unrecognized input shape {0}")]
    UnrecognizedInputShape(String),
    /// The file collaborator could not produce the expected sections/fields.
    #[error("failed to decode {source_name}: {reason}")]
    Decode { source_name: String, reason: String },
    #[error("{axis} axis has {actual} samples, data expects {expected}")]
    AxisMismatch {
        axis: &'static str,
        expected: usize,
        actual: usize,
    },
    /// Two axes that must agree element-wise do not.
    #[error("incompatible {0} axes")]
    IncompatibleAxes(&'static str),
    /// A selection (crop, glob, directory listing) produced nothing.
    #[error("empty selection: {0}")]
    EmptySelection(String),
    /// A handler was selected and failed.
    #[error("handler `{handler}` failed: {source}")]
    Handler {
        handler: String,
        #[source]
        source: Box<Error>,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn decode(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Decode {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn tagged(handler: &str, source: Error) -> Self {
        Error::Handler {
            handler: handler.to_string(),
            source: Box::new(source),
        }
    }

    /// The originating error beneath any handler tags.
    pub fn root(&self) -> &Error {
        let mut err = self;
        while let Error::Handler { source, .. } = err {
            err = source;
        }
        err
    }

    /// Names of the handlers the failure passed through, outermost first.
    pub fn handler_path(&self) -> Vec<&str> {
        let mut path = Vec::new();
        let mut err = self;
        while let Error::Handler { handler, source } = err {
            path.push(handler.as_str());
            err = source;
        }
        path
    }
}
