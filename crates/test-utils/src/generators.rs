//! Synthetic datasets with predictable, verifiable values.

use ndarray::{ArrayD, IxDyn};
use netcdf_parser::{Dataset, Variable};

const SWATH_DIMS: [&str; 2] = ["number_of_lines", "pixels_per_line"];

fn swath_variable(rows: usize, cols: usize, values: Vec<f64>) -> Variable {
    Variable::new(
        SWATH_DIMS.iter().map(|d| d.to_string()).collect(),
        ArrayD::from_shape_vec(IxDyn(&[rows, cols]), values)
            .expect("values must match rows * cols"),
    )
}

/// Creates a swath dataset on a regular lat/lon lattice.
///
/// Pixel `(row, col)` sits at `(origin_lat + row * step, origin_lon + col * step)`.
/// `chlor_a` holds `row * 1000 + col` so a sampled value identifies its pixel.
/// `l2_flags` is all zero (every pixel valid).
///
/// # Example
///
/// ```
/// use test_utils::swath_dataset;
///
/// let ds = swath_dataset(3, 4, 10.0, 30.0, 0.1);
/// assert_eq!(ds.value_at("chlor_a", 2, 3).unwrap(), 2003.0);
/// ```
pub fn swath_dataset(rows: usize, cols: usize, origin_lat: f64, origin_lon: f64, step: f64) -> Dataset {
    let mut lats = Vec::with_capacity(rows * cols);
    let mut lons = Vec::with_capacity(rows * cols);
    let mut chl = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        for col in 0..cols {
            lats.push(origin_lat + row as f64 * step);
            lons.push(origin_lon + col as f64 * step);
            chl.push((row * 1000 + col) as f64);
        }
    }
    Dataset::new("synthetic_swath.nc")
        .with_variable("latitude", swath_variable(rows, cols, lats))
        .with_variable("longitude", swath_variable(rows, cols, lons))
        .with_variable("chlor_a", swath_variable(rows, cols, chl))
        .with_variable("l2_flags", swath_variable(rows, cols, vec![0.0; rows * cols]))
}

/// Replaces a swath dataset's `l2_flags` with `flag` everywhere except the
/// listed pixels, which are set to 0.
pub fn with_flags(mut dataset: Dataset, flag: f64, valid: &[(usize, usize)]) -> Dataset {
    let shape = dataset
        .variable("l2_flags")
        .map(|v| v.shape().to_vec())
        .expect("dataset must have l2_flags");
    let (rows, cols) = (shape[0], shape[1]);
    let mut flags = vec![flag; rows * cols];
    for &(row, col) in valid {
        flags[row * cols + col] = 0.0;
    }
    dataset.insert("l2_flags", swath_variable(rows, cols, flags));
    dataset
}

/// Creates a gridded dataset with `lat`/`lon` axes and one variable of
/// shape `[time=1, lat, lon]` filled by `f(lat, lon)`.
pub fn grid_dataset<F>(name: &str, lats: &[f64], lons: &[f64], f: F) -> Dataset
where
    F: Fn(f64, f64) -> f64,
{
    let values: Vec<f64> = lats
        .iter()
        .flat_map(|&lat| lons.iter().map(move |&lon| (lat, lon)))
        .map(|(lat, lon)| f(lat, lon))
        .collect();
    let variable = Variable::new(
        vec!["time".into(), "lat".into(), "lon".into()],
        ArrayD::from_shape_vec(IxDyn(&[1, lats.len(), lons.len()]), values)
            .expect("grid shape"),
    );
    Dataset::new("synthetic_grid.nc")
        .with_variable("lat", Variable::axis("lat", lats.to_vec()))
        .with_variable("lon", Variable::axis("lon", lons.to_vec()))
        .with_variable(name, variable)
}

/// Evenly spaced axis values from `start` by `step`.
pub fn axis(start: f64, step: f64, len: usize) -> Vec<f64> {
    (0..len).map(|i| start + i as f64 * step).collect()
}
