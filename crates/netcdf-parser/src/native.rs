//! Native NetCDF reading using the netcdf library.
//!
//! Numeric variables are read as `f64` with `scale_factor`/`add_offset`
//! applied and `_FillValue` replaced by NaN. Non-numeric variables (strings,
//! compound types) are skipped.
//!
//! A [`Selection`] limits what is read: only the requested variables plus
//! coordinates and quality flags, and for gridded layouts only a few cells
//! around the query point. Global grids such as ETOPO1 hold hundreds of
//! millions of cells and are never read whole.

use std::collections::BTreeSet;
use std::ops::Range;
use std::path::Path;
use std::sync::Once;

use ndarray::{ArrayD, IxDyn};
use netcdf::{Extent, Extents};
use sampler_common::DataLayout;
use tracing::debug;

use crate::dataset::{nearest_index, wrap_longitude, Dataset, Variable, LATITUDE_NAMES, LONGITUDE_NAMES};
use crate::error::{NetCdfError, NetCdfResult};

/// Group holding latitude/longitude in level-2 swath files.
pub const NAVIGATION_GROUP: &str = "navigation_data";

/// Group holding the geophysical products and `l2_flags`.
pub const GEOPHYSICAL_GROUP: &str = "geophysical_data";

/// Variables read whatever the selection: coordinates and quality flags.
const SUPPORT_VARIABLES: &[&str] = &["latitude", "longitude", "lat", "lon", "x", "y", "l2_flags"];

/// Cells kept on each side of the nearest grid cell in a windowed read.
pub const GRID_WINDOW_CELLS: usize = 1;

/// Which parts of a file [`read_dataset`] reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    variables: Option<BTreeSet<String>>,
    near: Option<(f64, f64)>,
}

impl Selection {
    /// Every numeric variable, whole.
    pub fn all() -> Self {
        Self::default()
    }

    /// Only `variables`, plus coordinates and `l2_flags`.
    pub fn variables<S: AsRef<str>>(variables: &[S]) -> Self {
        Self {
            variables: Some(variables.iter().map(|v| v.as_ref().to_string()).collect()),
            near: None,
        }
    }

    /// Read gridded layouts only around `(lat, lon)`.
    ///
    /// Swaths are always read whole; geolocation searches every pixel.
    pub fn near(mut self, lat: f64, lon: f64) -> Self {
        self.near = Some((lat, lon));
        self
    }

    pub fn wants(&self, name: &str) -> bool {
        SUPPORT_VARIABLES.contains(&name)
            || self.variables.as_ref().map_or(true, |v| v.contains(name))
    }
}

/// Silence HDF5's automatic error printing to stderr.
///
/// The HDF5 C library prints verbose error messages to stderr even when errors
/// are handled gracefully by the Rust code (e.g., when checking a corrupt
/// download before falling back to the dummy dataset). This disables that
/// output by calling H5Eset_auto2 with null handlers. Safe to call multiple
/// times; only the first call has an effect.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: H5Eset_auto2 is thread-safe and we're passing null pointers
        // to disable error output, which is a documented valid use.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

/// Read the selected parts of a file into a [`Dataset`] according to its
/// layout.
pub fn read_dataset(path: &Path, layout: DataLayout, selection: &Selection) -> NetCdfResult<Dataset> {
    silence_hdf5_errors();

    if !path.is_file() {
        return Err(NetCdfError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} does not exist", path.display()),
        )));
    }

    let nc_file = netcdf::open(path).map_err(|e| NetCdfError::Open {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut dataset = Dataset::new(path);
    match layout {
        DataLayout::Swath => {
            for group_name in [NAVIGATION_GROUP, GEOPHYSICAL_GROUP] {
                let group = nc_file
                    .group(group_name)
                    .map_err(|e| {
                        NetCdfError::InvalidFormat(format!(
                            "Failed to read group '{}': {}",
                            group_name, e
                        ))
                    })?
                    .ok_or_else(|| NetCdfError::MissingGroup {
                        path: path.to_path_buf(),
                        group: group_name.to_string(),
                    })?;
                read_variables(group.variables(), selection, &mut dataset);
            }
        }
        DataLayout::Grid => {
            read_grid(&nc_file, LATITUDE_NAMES, LONGITUDE_NAMES, selection, &mut dataset)?
        }
        DataLayout::ProjectedGrid => {
            read_grid(&nc_file, &["y"], &["x"], selection, &mut dataset)?;
            dataset.rename_dimension("x", "lon");
            dataset.rename_dimension("y", "lat");
        }
    }

    if dataset.is_empty() {
        return Err(NetCdfError::InvalidFormat(format!(
            "{} has no numeric variables",
            path.display()
        )));
    }

    debug!(
        path = %path.display(),
        variables = dataset.len(),
        windowed = selection.near.is_some(),
        "Loaded dataset"
    );
    Ok(dataset)
}

fn read_variables<'f, I>(variables: I, selection: &Selection, dataset: &mut Dataset)
where
    I: Iterator<Item = netcdf::Variable<'f>>,
{
    for var in variables.filter(|v| selection.wants(&v.name())) {
        match read_variable(&var, None) {
            Ok(variable) => dataset.insert(var.name(), variable),
            Err(e) => debug!(variable = %var.name(), error = %e, "Skipping variable"),
        }
    }
}

/// A 1-D coordinate variable and the dimension it indexes.
struct Axis {
    dim: String,
    values: ArrayD<f64>,
}

fn read_axis(file: &netcdf::File, names: &[&str]) -> NetCdfResult<Axis> {
    let var = names
        .iter()
        .find_map(|name| file.variable(name))
        .ok_or_else(|| NetCdfError::MissingData(format!("none of {:?} present", names)))?;
    let variable = read_variable(&var, None)?;
    if variable.ndim() != 1 {
        return Err(NetCdfError::InvalidFormat(format!(
            "coordinate '{}' is not one-dimensional",
            var.name()
        )));
    }
    Ok(Axis {
        dim: variable.dims[0].clone(),
        values: variable.values,
    })
}

/// Index range of the cells around the one nearest to `target`.
fn window(axis: &Axis, target: f64) -> NetCdfResult<Range<usize>> {
    let i = nearest_index(&axis.values, target).ok_or_else(|| {
        NetCdfError::InvalidFormat(format!("coordinate '{}' has no valid values", axis.dim))
    })?;
    let start = i.saturating_sub(GRID_WINDOW_CELLS);
    let end = (i + GRID_WINDOW_CELLS + 1).min(axis.values.len());
    Ok(start..end)
}

fn read_grid(
    file: &netcdf::File,
    lat_names: &[&str],
    lon_names: &[&str],
    selection: &Selection,
    dataset: &mut Dataset,
) -> NetCdfResult<()> {
    let Some((lat, lon)) = selection.near else {
        read_variables(file.variables(), selection, dataset);
        return Ok(());
    };

    let lat_axis = read_axis(file, lat_names)?;
    let lon_axis = read_axis(file, lon_names)?;
    let lat_window = window(&lat_axis, lat)?;
    let lon_window = window(&lon_axis, wrap_longitude(&lon_axis.values, lon))?;

    for var in file.variables().filter(|v| selection.wants(&v.name())) {
        let ranges: Vec<Range<usize>> = var
            .dimensions()
            .iter()
            .map(|d| {
                let dim = d.name();
                if dim == lat_axis.dim {
                    lat_window.clone()
                } else if dim == lon_axis.dim {
                    lon_window.clone()
                } else {
                    0..d.len().min(1)
                }
            })
            .collect();
        match read_variable(&var, Some(ranges)) {
            Ok(variable) => dataset.insert(var.name(), variable),
            Err(e) => debug!(variable = %var.name(), error = %e, "Skipping variable"),
        }
    }
    Ok(())
}

/// Read a variable, or the hyperslab given by `ranges` (one per dimension).
fn read_variable(var: &netcdf::Variable, ranges: Option<Vec<Range<usize>>>) -> NetCdfResult<Variable> {
    let dims: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();
    let (shape, extents) = match ranges {
        Some(ranges) => (
            ranges.iter().map(|r| r.len()).collect::<Vec<_>>(),
            Extents::Extent(ranges.into_iter().map(Extent::from).collect()),
        ),
        None => (
            var.dimensions().iter().map(|d| d.len()).collect(),
            Extents::All,
        ),
    };

    let mut values = read_as_f64(var, &extents)?;

    let fill = get_f64_attr(var, "_FillValue");
    let scale = get_f64_attr(var, "scale_factor").unwrap_or(1.0);
    let offset = get_f64_attr(var, "add_offset").unwrap_or(0.0);
    for v in values.iter_mut() {
        *v = if fill == Some(*v) {
            f64::NAN
        } else {
            *v * scale + offset
        };
    }

    let values = ArrayD::from_shape_vec(IxDyn(&shape), values).map_err(|e| {
        NetCdfError::InvalidFormat(format!("Shape mismatch for {}: {}", var.name(), e))
    })?;

    Ok(Variable::new(dims, values))
}

/// Read a numeric variable of any primitive type, widening to `f64`.
fn read_as_f64(var: &netcdf::Variable, extents: &Extents) -> NetCdfResult<Vec<f64>> {
    if let Ok(values) = var.get_values::<f64, _>(extents.clone()) {
        return Ok(values);
    }
    macro_rules! try_read {
        ($($t:ty),+) => {
            $(
                if let Ok(values) = var.get_values::<$t, _>(extents.clone()) {
                    return Ok(values.into_iter().map(|v| v as f64).collect());
                }
            )+
        };
    }
    try_read!(f32, i32, i16, i8, u8, u16, u32, i64, u64);
    Err(NetCdfError::InvalidFormat(format!(
        "Variable {} is not numeric",
        var.name()
    )))
}

/// Check if a variable has an attribute with the given name.
/// This avoids HDF5 error spam when checking for optional attributes.
fn has_attr(var: &netcdf::Variable, name: &str) -> bool {
    var.attributes().any(|attr| attr.name() == name)
}

/// Helper to get f64 attribute.
fn get_f64_attr(var: &netcdf::Variable, name: &str) -> Option<f64> {
    if !has_attr(var, name) {
        return None;
    }
    let attr_value = var.attribute_value(name)?.ok()?;
    f64::try_from(attr_value).ok()
}
