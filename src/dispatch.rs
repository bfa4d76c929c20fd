// SPDX-License-Identifier: GPL-3.0-or-later

//! Predicate-dispatched construction of [`Spectrogram`]s.
//!
//! A [`Registry`] holds an ordered list of [`Entry`]s, each pairing a predicate over a [`Call`]
//! with the handler that builds a spectrogram from it. [`Registry::create`] runs the handler of
//! the first entry whose predicate accepts the call. New input shapes are supported by
//! registering more entries, or by [deriving](Registry::derive) a registry that layers its own
//! entries on top of a base.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    path::{Path, PathBuf},
    sync::{Arc, PoisonError, RwLock},
};

use chrono::{DateTime, Utc};
use itertools::Itertools;
use ndarray::{Array1, Array2};

use crate::{
    error::{Error, Result},
    spectrogram::Spectrogram,
};

/// A single argument passed to [`Registry::create`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
    Path(PathBuf),
    Time(DateTime<Utc>),
    Vector(Array1<f64>),
    Matrix(Array2<f32>),
    Tags(BTreeSet<String>),
}

impl Value {
    /// Short description of the value's type and shape, e.g. `matrix[5x10]`.
    pub fn shape(&self) -> String {
        match self {
            Value::Int(_) => "int".to_string(),
            Value::Float(_) => "float".to_string(),
            Value::Text(_) => "text".to_string(),
            Value::Path(_) => "path".to_string(),
            Value::Time(_) => "time".to_string(),
            Value::Vector(v) => format!("vector[{}]", v.len()),
            Value::Matrix(m) => format!("matrix[{}x{}]", m.nrows(), m.ncols()),
            Value::Tags(t) => format!("tags[{}]", t.len()),
        }
    }

    /// Paths and text both name files.
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Value::Path(p) => Some(p.as_path()),
            Value::Text(s) => Some(Path::new(s.as_str())),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Time(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&Array1<f64>> {
        match self {
            Value::Vector(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_matrix(&self) -> Option<&Array2<f32>> {
        match self {
            Value::Matrix(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_tags(&self) -> Option<&BTreeSet<String>> {
        match self {
            Value::Tags(t) => Some(t),
            _ => None,
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for Value {
            fn from(value: $ty) -> Self {
                Value::$variant(value.into())
            }
        })*
    };
}

value_from!(
    i64 => Int,
    i32 => Int,
    f64 => Float,
    String => Text,
    &str => Text,
    PathBuf => Path,
    &Path => Path,
    DateTime<Utc> => Time,
    Array1<f64> => Vector,
    Array2<f32> => Matrix,
    BTreeSet<String> => Tags,
);

/// Positional and keyword arguments of one [`Registry::create`] call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Call {
    pub args: Vec<Value>,
    pub kwargs: BTreeMap<String, Value>,
}

impl Call {
    pub fn new() -> Self {
        Self::default()
    }

    /// A call with one positional argument.
    pub fn single(value: impl Into<Value>) -> Self {
        Self::new().arg(value)
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(name.into(), value.into());
        self
    }

    /// Same keywords, different positional arguments.
    pub fn with_args(&self, args: Vec<Value>) -> Self {
        Self {
            args,
            kwargs: self.kwargs.clone(),
        }
    }

    pub fn kw(&self, name: &str) -> Option<&Value> {
        self.kwargs.get(name)
    }

    /// The only positional argument, if there is exactly one.
    pub fn sole_arg(&self) -> Option<&Value> {
        match self.args.as_slice() {
            [value] => Some(value),
            _ => None,
        }
    }

    /// e.g. `(matrix[5x10], vector[10], vector[5]; start=time)`
    pub fn shape(&self) -> String {
        let args = self.args.iter().map(Value::shape).join(", ");
        if self.kwargs.is_empty() {
            format!("({args})")
        } else {
            let kwargs = self
                .kwargs
                .iter()
                .map(|(name, value)| format!("{name}={}", value.shape()))
                .join(", ");
            format!("({args}; {kwargs})")
        }
    }
}

type Predicate = dyn Fn(&Call) -> bool + Send + Sync;
type Handler = dyn Fn(&Registry, &Call) -> Result<Spectrogram> + Send + Sync;

/// A registered (predicate, handler, signature) triple.
pub struct Entry {
    name: String,
    signature: String,
    predicate: Box<Predicate>,
    handler: Box<Handler>,
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish()
    }
}

impl Entry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn accepts(&self, call: &Call) -> bool {
        (self.predicate)(call)
    }
}

/// Ordered, append-only set of constructors.
///
/// Lookups work on a snapshot of the entry list. Registration replaces the list with an extended
/// copy, so a scan in progress never observes a partial append.
pub struct Registry {
    name: String,
    entries: RwLock<Arc<Vec<Arc<Entry>>>>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("name", &self.name)
            .field("entries", &self.entries())
            .finish()
    }
}

impl Registry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// A new registry starting with this one's entries, in the same order.
    ///
    /// Later registrations on either registry do not show up in the other.
    pub fn derive(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(self.entries()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends an entry. Entries are never deduplicated; the earliest match wins.
    ///
    /// `predicate` must not panic or have side effects.
    pub fn register<P, H>(
        &self,
        name: impl Into<String>,
        signature: impl Into<String>,
        predicate: P,
        handler: H,
    ) -> &Self
    where
        P: Fn(&Call) -> bool + Send + Sync + 'static,
        H: Fn(&Registry, &Call) -> Result<Spectrogram> + Send + Sync + 'static,
    {
        let entry = Arc::new(Entry {
            name: name.into(),
            signature: signature.into(),
            predicate: Box::new(predicate),
            handler: Box::new(handler),
        });
        log::debug!("Registering `{}` on {}", entry.name, self.name);

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let mut extended = Vec::clone(&entries);
        extended.push(entry);
        *entries = Arc::new(extended);
        self
    }

    /// Snapshot of the current entries in dispatch order.
    pub fn entries(&self) -> Arc<Vec<Arc<Entry>>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// The entry [`create`](Self::create) would run for `call`, without running it.
    pub fn matching(&self, call: &Call) -> Option<Arc<Entry>> {
        self.entries().iter().find(|e| e.accepts(call)).cloned()
    }

    /// Builds a spectrogram with the first entry whose predicate accepts `call`.
    ///
    /// Handler failures are returned tagged with the entry's name.
    pub fn create(&self, call: &Call) -> Result<Spectrogram> {
        let entries = self.entries();
        for entry in entries.iter() {
            let accepted = entry.accepts(call);
            log::trace!("{}: `{}` accepts {}: {accepted}", self.name, entry.name, call.shape());
            if accepted {
                log::debug!("{}: dispatching {} to `{}`", self.name, call.shape(), entry.name);
                return (entry.handler)(self, call).map_err(|e| Error::tagged(&entry.name, e));
            }
        }

        Err(Error::UnrecognizedInputShape(format!(
            "{} for {} (accepted: {})",
            call.shape(),
            self.name,
            entries.iter().map(|e| e.signature.as_str()).join(" | ")
        )))
    }

    /// Shorthand for a call with a single positional argument.
    pub fn create_from(&self, value: impl Into<Value>) -> Result<Spectrogram> {
        self.create(&Call::single(value))
    }

    /// One line per accepted signature, in dispatch order.
    pub fn generate_docs(&self) -> String {
        self.entries()
            .iter()
            .map(|e| format!("{}{}", e.name, e.signature))
            .join("\n")
    }
}
