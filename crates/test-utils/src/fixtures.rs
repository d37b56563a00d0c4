//! Common test fixtures for sampler tests.

use std::path::{Path, PathBuf};

use netcdf_parser::{Dataset, GEOPHYSICAL_GROUP, NAVIGATION_GROUP};

/// Header of an input table as produced by the field campaign sheets.
pub const INPUT_HEADER: &str = "Time[hhmm],Date[mmddyyyy],Lat.[-90-90 deg.],Long.[0-360.E],Chl-a";

/// The two rows of the deduplication example: same key, different
/// chlorophyll.
pub const DUPLICATE_KEY_ROWS: [&str; 2] = [
    "14:30:00,01/01/2018,13.305,36.427,0.42",
    "14:30:00,01/01/2018,13.305,36.427,0.55",
];

/// Writes an input table with the standard header and the given rows.
pub fn write_input_table(dir: &Path, name: &str, rows: &[String]) -> PathBuf {
    let path = dir.join(name);
    let mut contents = String::from(INPUT_HEADER);
    contents.push('\n');
    for row in rows {
        contents.push_str(row);
        contents.push('\n');
    }
    std::fs::write(&path, contents).expect("Failed to write input table");
    path
}

/// `count` rows with distinct keys, one minute apart on 2018-01-01.
pub fn unique_rows(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            format!(
                "{:02}:{:02}:00,01/01/2018,{:.3},36.427,0.{}",
                (i / 60) % 24,
                i % 60,
                10.0 + (i / 1440) as f64,
                i % 10
            )
        })
        .collect()
}

/// Dataset used as a mission's stand-in when a retrieval fails.
pub fn dummy_dataset(variable: &str) -> Dataset {
    crate::generators::grid_dataset(variable, &[0.0], &[0.0], |_, _| f64::NAN)
}

/// Write a gridded NetCDF file with `lat`/`lon` axes and one 2-D variable.
///
/// `f(lat, lon)` gives the value stored at each grid point.
pub fn write_grid_file<F>(path: &Path, variable: &str, lats: &[f64], lons: &[f64], f: F)
where
    F: Fn(f64, f64) -> f64,
{
    let mut file = netcdf::create(path).expect("Failed to create NetCDF file");
    file.add_dimension("lat", lats.len())
        .expect("Failed to add lat dimension");
    file.add_dimension("lon", lons.len())
        .expect("Failed to add lon dimension");

    let mut lat = file
        .add_variable::<f64>("lat", &["lat"])
        .expect("Failed to add lat variable");
    lat.put_values(lats, ..).expect("Failed to write lat");
    let mut lon = file
        .add_variable::<f64>("lon", &["lon"])
        .expect("Failed to add lon variable");
    lon.put_values(lons, ..).expect("Failed to write lon");

    let values: Vec<f64> = lats
        .iter()
        .flat_map(|&la| lons.iter().map(move |&lo| (la, lo)))
        .map(|(la, lo)| f(la, lo))
        .collect();
    let mut var = file
        .add_variable::<f64>(variable, &["lat", "lon"])
        .expect("Failed to add data variable");
    var.put_values(&values, ..).expect("Failed to write data");
}

/// Write a Level-2 swath file with `navigation_data` and `geophysical_data`
/// groups.
///
/// Lines follow `lats` and pixels follow `lons`, so the swath is a regular
/// mesh. `l2_flags` is written clear everywhere.
pub fn write_swath_file<F>(path: &Path, variable: &str, lats: &[f64], lons: &[f64], f: F)
where
    F: Fn(f64, f64) -> f64,
{
    let dims = ["number_of_lines", "pixels_per_line"];
    let mesh: Vec<(f64, f64)> = lats
        .iter()
        .flat_map(|&la| lons.iter().map(move |&lo| (la, lo)))
        .collect();
    let mut file = netcdf::create(path).expect("Failed to create NetCDF file");

    let mut nav = file
        .add_group(NAVIGATION_GROUP)
        .expect("Failed to add navigation group");
    nav.add_dimension(dims[0], lats.len())
        .expect("Failed to add line dimension");
    nav.add_dimension(dims[1], lons.len())
        .expect("Failed to add pixel dimension");
    let lat_values: Vec<f32> = mesh.iter().map(|&(la, _)| la as f32).collect();
    nav.add_variable::<f32>("latitude", &dims)
        .expect("Failed to add latitude")
        .put_values(&lat_values, ..)
        .expect("Failed to write latitude");
    let lon_values: Vec<f32> = mesh.iter().map(|&(_, lo)| lo as f32).collect();
    nav.add_variable::<f32>("longitude", &dims)
        .expect("Failed to add longitude")
        .put_values(&lon_values, ..)
        .expect("Failed to write longitude");

    let mut geo = file
        .add_group(GEOPHYSICAL_GROUP)
        .expect("Failed to add geophysical group");
    geo.add_dimension(dims[0], lats.len())
        .expect("Failed to add line dimension");
    geo.add_dimension(dims[1], lons.len())
        .expect("Failed to add pixel dimension");
    let values: Vec<f64> = mesh.iter().map(|&(la, lo)| f(la, lo)).collect();
    geo.add_variable::<f64>(variable, &dims)
        .expect("Failed to add data variable")
        .put_values(&values, ..)
        .expect("Failed to write data");
    geo.add_variable::<i32>("l2_flags", &dims)
        .expect("Failed to add l2_flags")
        .put_values(&vec![0i32; mesh.len()], ..)
        .expect("Failed to write l2_flags");
}
