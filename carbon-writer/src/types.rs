//! Data source type definitions.
//!
//! Every sample handed to the writer names a _type_, such as `if_octets` or `load`, and carries one value per data
//! source declared for that type. The declarations come from one or more "types database" files, where each line
//! describes a single type:
//!
//! ```text
//! # type_name  ds_name:KIND:min:max, ...
//! if_octets    rx:DERIVE:0:U, tx:DERIVE:0:U
//! load         shortterm:GAUGE:0:5000, midterm:GAUGE:0:5000, longterm:GAUGE:0:5000
//! ```
//!
//! The bounds are either decimal numbers or `U`, meaning the data source has no known bound in that direction.
use std::{
    collections::HashMap,
    fmt,
    fs::File,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
    str::FromStr,
};

use thiserror::Error;
use tracing::{debug, warn};

/// Errors that could occur while loading type definitions.
#[derive(Debug, Error)]
pub enum TypesError {
    /// The types database could not be read.
    #[error("failed to read types database '{}': {source}", path.display())]
    Io {
        /// Path of the types database.
        path: PathBuf,

        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Data source kind.
///
/// Determines how raw values for a data source are interpreted. Only counters and derives are eligible for rate
/// differentiation; gauges and absolutes are always passed through as-is.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum DataSourceKind {
    /// A value that can go up and down, reported as-is.
    Gauge,

    /// A monotonically increasing value that wraps at its declared maximum.
    Counter,

    /// A monotonically increasing value, unbounded by convention.
    Derive,

    /// A value that is reset every time it is read.
    Absolute,
}

impl DataSourceKind {
    /// Returns `true` if values of this kind can be differentiated into deltas or rates.
    pub const fn is_differentiable(self) -> bool {
        matches!(self, DataSourceKind::Counter | DataSourceKind::Derive)
    }

    /// Returns the name of this kind as it appears in a types database.
    pub const fn as_str(self) -> &'static str {
        match self {
            DataSourceKind::Gauge => "GAUGE",
            DataSourceKind::Counter => "COUNTER",
            DataSourceKind::Derive => "DERIVE",
            DataSourceKind::Absolute => "ABSOLUTE",
        }
    }
}

impl FromStr for DataSourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [DataSourceKind::Gauge, DataSourceKind::Counter, DataSourceKind::Derive, DataSourceKind::Absolute]
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown data source kind '{s}'"))
    }
}

impl fmt::Display for DataSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lower or upper bound of a data source.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Bound {
    /// A known numeric bound.
    Value(f64),

    /// No known bound.
    ///
    /// Written as `U` in a types database. Any other token that isn't a number is treated the same way.
    Unlimited,
}

impl Bound {
    /// Parses a bound from its textual form.
    ///
    /// Anything that doesn't parse as a number, including `U`, results in [`Bound::Unlimited`].
    pub fn parse(s: &str) -> Bound {
        s.parse::<f64>().map_or(Bound::Unlimited, Bound::Value)
    }

    /// Returns `true` if this bound is unlimited.
    pub const fn is_unlimited(&self) -> bool {
        matches!(self, Bound::Unlimited)
    }

    /// Returns the numeric bound, or zero if the bound is unlimited.
    pub const fn as_f64_or_zero(&self) -> f64 {
        match self {
            Bound::Value(v) => *v,
            Bound::Unlimited => 0.0,
        }
    }
}

/// A single named component of a type.
#[derive(Clone, Debug, PartialEq)]
pub struct DataSource {
    name: String,
    kind: DataSourceKind,
    min: Bound,
    max: Bound,
}

impl DataSource {
    /// Creates a new `DataSource`.
    pub fn new<N>(name: N, kind: DataSourceKind, min: Bound, max: Bound) -> Self
    where
        N: Into<String>,
    {
        DataSource { name: name.into(), kind, min, max }
    }

    /// Parses a `name:KIND:min:max` descriptor.
    ///
    /// The kind is matched case-insensitively. An unrecognized kind is treated as [`DataSourceKind::Gauge`], so its
    /// values are passed through as-is.
    ///
    /// # Errors
    ///
    /// If the descriptor does not consist of exactly four colon-separated parts, an error describing the problem is
    /// returned.
    pub fn parse(descriptor: &str) -> Result<Self, String> {
        let parts = descriptor.split(':').collect::<Vec<_>>();
        let [name, kind, min, max] = parts[..] else {
            return Err(format!("expected 4 fields, found {}", parts.len()));
        };

        let kind = kind.parse::<DataSourceKind>().unwrap_or_else(|reason| {
            warn!(descriptor, %reason, "Unknown data source kind; values will be passed through unchanged.");
            DataSourceKind::Gauge
        });
        Ok(DataSource::new(name, kind, Bound::parse(min), Bound::parse(max)))
    }

    /// Returns the name of the data source.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the kind of the data source.
    pub fn kind(&self) -> DataSourceKind {
        self.kind
    }

    /// Returns the lower bound of the data source.
    pub fn min(&self) -> Bound {
        self.min
    }

    /// Returns the upper bound of the data source.
    pub fn max(&self) -> Bound {
        self.max
    }
}

/// Registry of known types and their data sources.
///
/// The registry is filled once while the writer is being built and is read-only afterwards.
#[derive(Clone, Debug, Default)]
pub struct TypeRegistry {
    types: HashMap<String, Vec<DataSource>>,
}

impl TypeRegistry {
    /// Creates an empty `TypeRegistry`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a type, replacing any previous definition with the same name.
    pub fn insert<N>(&mut self, type_name: N, data_sources: Vec<DataSource>)
    where
        N: Into<String>,
    {
        self.types.insert(type_name.into(), data_sources);
    }

    /// Loads type definitions from a types database file.
    ///
    /// # Errors
    ///
    /// If the file cannot be opened or read, an error is returned. Definitions read before the failure are kept.
    pub fn load_file<P>(&mut self, path: P) -> Result<(), TypesError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let to_error = |source| TypesError::Io { path: path.to_path_buf(), source };

        let file = File::open(path).map_err(to_error)?;
        let loaded = self.load(BufReader::new(file)).map_err(to_error)?;
        debug!(path = %path.display(), types = loaded, "Loaded types database.");

        Ok(())
    }

    /// Loads type definitions from a line-oriented reader.
    ///
    /// Returns the number of type records that were read. Malformed data source descriptors are skipped with a
    /// warning, and the type is registered with whatever descriptors remain.
    ///
    /// # Errors
    ///
    /// If reading from `reader` fails, the error is returned.
    pub fn load<R>(&mut self, reader: R) -> io::Result<usize>
    where
        R: BufRead,
    {
        let mut loaded = 0;
        for line in reader.lines() {
            if self.load_line(&line?) {
                loaded += 1;
            }
        }

        Ok(loaded)
    }

    /// Loads type definitions from a string.
    pub fn load_str(&mut self, definitions: &str) -> usize {
        definitions.lines().filter(|line| self.load_line(line)).count()
    }

    fn load_line(&mut self, line: &str) -> bool {
        let mut fields = line.split_whitespace();
        let (Some(type_name), Some(first)) = (fields.next(), fields.next()) else {
            return false;
        };

        if type_name.starts_with('#') {
            return false;
        }

        let mut data_sources = Vec::new();
        for descriptor in std::iter::once(first).chain(fields) {
            let descriptor = descriptor.trim_end_matches(',');
            match DataSource::parse(descriptor) {
                Ok(ds) => data_sources.push(ds),
                Err(reason) => {
                    warn!(type_name, descriptor, %reason, "Cannot parse data source; skipping.");
                }
            }
        }

        self.insert(type_name, data_sources);
        true
    }

    /// Looks up the data sources for the given type.
    pub fn lookup(&self, type_name: &str) -> Option<&[DataSource]> {
        self.types.get(type_name).map(Vec::as_slice)
    }

    /// Returns the number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if no types are registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
