//! Requests to THREDDS NetCDF subsetting services.

use sampler_common::{BoundingBox, LonConvention, QueryPoint, TemporalWindow};

/// Half-width in degrees of the box requested around a point.
pub const SUBSET_HALF_WIDTH: f64 = 1.0;

/// A spatial and temporal subset of a gridded product.
#[derive(Debug, Clone, PartialEq)]
pub struct SubsetRequest {
    pub variables: Vec<String>,
    pub bbox: BoundingBox,
    pub window: TemporalWindow,
}

impl SubsetRequest {
    /// Box of ±1° around the point, covering the whole day.
    pub fn around(variables: &[String], point: &QueryPoint, convention: LonConvention) -> Self {
        let lon = convention.normalize(point.longitude);
        Self {
            variables: variables.to_vec(),
            bbox: BoundingBox::around(lon, point.latitude, SUBSET_HALF_WIDTH),
            window: TemporalWindow::whole_day(point.timestamp),
        }
    }

    /// Query parameters in the order the services document them.
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = self
            .variables
            .iter()
            .map(|v| ("var".to_string(), v.clone()))
            .collect();

        let (time_start, time_end) = self.window.bounds();
        params.extend([
            ("east".to_string(), self.bbox.max_x.to_string()),
            ("west".to_string(), self.bbox.min_x.to_string()),
            ("north".to_string(), self.bbox.max_y.to_string()),
            ("south".to_string(), self.bbox.min_y.to_string()),
            ("horizStride".to_string(), "1".to_string()),
            ("time_start".to_string(), time_start),
            ("time_end".to_string(), time_end),
            ("timeStride".to_string(), "1".to_string()),
        ]);
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn point(lat: f64, lon: f64) -> QueryPoint {
        let ts = NaiveDate::from_ymd_opt(2019, 7, 6)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap();
        QueryPoint::new(ts, lat, lon)
    }

    fn lookup<'a>(params: &'a [(String, String)], key: &str) -> Vec<&'a str> {
        params
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    #[test]
    fn test_params_for_signed_longitudes() {
        let vars = vec!["analysed_sst".to_string()];
        let request = SubsetRequest::around(&vars, &point(36.5, -122.5), LonConvention::Signed);
        let params = request.params();

        assert_eq!(params[0], ("var".to_string(), "analysed_sst".to_string()));
        assert_eq!(lookup(&params, "east"), ["-121.5"]);
        assert_eq!(lookup(&params, "west"), ["-123.5"]);
        assert_eq!(lookup(&params, "north"), ["37.5"]);
        assert_eq!(lookup(&params, "south"), ["35.5"]);
        assert_eq!(lookup(&params, "time_start"), ["2019-07-06T00:00:00Z"]);
        assert_eq!(lookup(&params, "time_end"), ["2019-07-06T23:59:59Z"]);
        assert_eq!(lookup(&params, "horizStride"), ["1"]);
        assert_eq!(lookup(&params, "timeStride"), ["1"]);
    }

    #[test]
    fn test_positive_convention_wraps_longitude() {
        let vars = vec!["sst".to_string()];
        let request = SubsetRequest::around(&vars, &point(10.0, -90.0), LonConvention::Positive);
        let params = request.params();
        assert_eq!(lookup(&params, "east"), ["271"]);
        assert_eq!(lookup(&params, "west"), ["269"]);
    }

    #[test]
    fn test_repeated_var_parameters() {
        let vars = vec!["tau".to_string(), "taux".to_string(), "tauy".to_string()];
        let request = SubsetRequest::around(&vars, &point(0.0, 0.0), LonConvention::Positive);
        assert_eq!(lookup(&request.params(), "var"), ["tau", "taux", "tauy"]);
    }
}
