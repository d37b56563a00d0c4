//! In-memory datasets of named n-dimensional variables.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ndarray::{ArrayD, IxDyn};

use crate::error::{NetCdfError, NetCdfResult};

pub(crate) const LATITUDE_NAMES: &[&str] = &["latitude", "lat"];
pub(crate) const LONGITUDE_NAMES: &[&str] = &["longitude", "lon"];

/// One variable: its dimension names and values as `f64`.
///
/// Scale factors and offsets are already applied and fill values are NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub dims: Vec<String>,
    pub values: ArrayD<f64>,
}

impl Variable {
    pub fn new(dims: Vec<String>, values: ArrayD<f64>) -> Self {
        Self { dims, values }
    }

    /// A 1-D variable along a single dimension.
    pub fn axis(dim: &str, values: Vec<f64>) -> Self {
        let len = values.len();
        Self {
            dims: vec![dim.to_string()],
            values: ArrayD::from_shape_vec(IxDyn(&[len]), values)
                .unwrap_or_else(|_| ArrayD::zeros(IxDyn(&[0]))),
        }
    }

    pub fn shape(&self) -> &[usize] {
        self.values.shape()
    }

    pub fn ndim(&self) -> usize {
        self.values.ndim()
    }
}

/// A file's variables, flattened across groups.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    source: PathBuf,
    variables: BTreeMap<String, Variable>,
}

impl Dataset {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            variables: BTreeMap::new(),
        }
    }

    /// Path the dataset was read from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn insert(&mut self, name: impl Into<String>, variable: Variable) {
        self.variables.insert(name.into(), variable);
    }

    pub fn with_variable(mut self, name: impl Into<String>, variable: Variable) -> Self {
        self.insert(name, variable);
        self
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Look up a variable, failing if absent.
    pub fn require(&self, name: &str) -> NetCdfResult<&Variable> {
        self.variable(name).ok_or_else(|| {
            NetCdfError::MissingData(format!(
                "variable '{}' not in {}",
                name,
                self.source.display()
            ))
        })
    }

    /// The latitude variable, whichever common name it uses.
    pub fn latitude(&self) -> NetCdfResult<&Variable> {
        self.first_of(LATITUDE_NAMES)
    }

    /// The longitude variable, whichever common name it uses.
    pub fn longitude(&self) -> NetCdfResult<&Variable> {
        self.first_of(LONGITUDE_NAMES)
    }

    fn first_of(&self, names: &[&str]) -> NetCdfResult<&Variable> {
        names
            .iter()
            .find_map(|name| self.variable(name))
            .ok_or_else(|| {
                NetCdfError::MissingData(format!(
                    "none of {:?} in {}",
                    names,
                    self.source.display()
                ))
            })
    }

    /// Rename a dimension, and the coordinate variable carrying its name.
    pub fn rename_dimension(&mut self, from: &str, to: &str) {
        for variable in self.variables.values_mut() {
            for dim in variable.dims.iter_mut().filter(|d| d.as_str() == from) {
                *dim = to.to_string();
            }
        }
        if let Some(coordinate) = self.variables.remove(from) {
            self.variables.insert(to.to_string(), coordinate);
        }
    }

    /// Value at `(row, col)` of an index-addressed variable.
    ///
    /// The last two dimensions are rows and columns; any leading dimension
    /// (a singleton time axis) is taken at index 0.
    pub fn value_at(&self, name: &str, row: usize, col: usize) -> NetCdfResult<f64> {
        let variable = self.require(name)?;
        let ndim = variable.ndim();
        if ndim < 2 {
            return Err(NetCdfError::InvalidFormat(format!(
                "variable '{}' has {} dimensions, expected at least 2",
                name, ndim
            )));
        }
        let mut index = vec![0; ndim];
        index[ndim - 2] = row;
        index[ndim - 1] = col;
        lookup(name, variable, &index)
    }

    /// Value of a georeferenced variable at the grid cell nearest to
    /// `(lat, lon)`.
    ///
    /// Dimensions named after the latitude/longitude coordinates are matched
    /// by nearest coordinate value; every other dimension is taken at index
    /// 0. A query longitude in [-180, 0) is wrapped when the grid uses
    /// [0, 360).
    pub fn nearest_value(&self, name: &str, lat: f64, lon: f64) -> NetCdfResult<f64> {
        let variable = self.require(name)?;
        let (lat_name, lat_axis) = self.named_axis(LATITUDE_NAMES)?;
        let (lon_name, lon_axis) = self.named_axis(LONGITUDE_NAMES)?;

        let lon = wrap_longitude(lon_axis, lon);

        let mut index = Vec::with_capacity(variable.ndim());
        for dim in &variable.dims {
            let i = if dim == lat_name {
                nearest_index(lat_axis, lat)
            } else if dim == lon_name {
                nearest_index(lon_axis, lon)
            } else {
                Some(0)
            };
            index.push(i.ok_or_else(|| {
                NetCdfError::InvalidFormat(format!("coordinate '{}' has no valid values", dim))
            })?);
        }
        lookup(name, variable, &index)
    }

    fn named_axis<'a>(&'a self, names: &[&'a str]) -> NetCdfResult<(&'a str, &'a ArrayD<f64>)> {
        for &name in names {
            if let Some(variable) = self.variable(name) {
                if variable.ndim() != 1 {
                    return Err(NetCdfError::InvalidFormat(format!(
                        "coordinate '{}' is not one-dimensional",
                        name
                    )));
                }
                return Ok((name, &variable.values));
            }
        }
        Err(NetCdfError::MissingData(format!(
            "none of {:?} in {}",
            names,
            self.source.display()
        )))
    }
}

fn lookup(name: &str, variable: &Variable, index: &[usize]) -> NetCdfResult<f64> {
    variable
        .values
        .get(IxDyn(index))
        .copied()
        .ok_or_else(|| NetCdfError::IndexOutOfBounds {
            variable: name.to_string(),
            index: index.to_vec(),
            shape: variable.shape().to_vec(),
        })
}

/// Wrap a query longitude into [0, 360) when the axis uses that range.
pub(crate) fn wrap_longitude(axis: &ArrayD<f64>, lon: f64) -> f64 {
    let lon_max = axis.iter().copied().filter(|v| !v.is_nan()).fold(f64::MIN, f64::max);
    if lon_max > 180.0 {
        lon.rem_euclid(360.0)
    } else {
        lon
    }
}

/// Position of the value closest to `target`, ignoring NaN.
pub(crate) fn nearest_index(axis: &ArrayD<f64>, target: f64) -> Option<usize> {
    axis.iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .min_by(|(_, a), (_, b)| {
            (*a - target)
                .abs()
                .partial_cmp(&(*b - target).abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(i, _)| i)
}
