//! Granule search against the metadata catalog.
//!
//! A search asks for granules intersecting a point within the day of the
//! query timestamp. When nothing matches, the window is widened to the
//! mission's revisit period leading up to the timestamp. Hits are ranked
//! so that granules whose footprint keeps the point well away from the
//! swath edges come first, then by closeness in time.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sampler_common::{BoundingBox, QueryPoint, TemporalWindow};
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::client::ArchiveClient;
use crate::error::{RetrievalError, RetrievalResult};

pub const CMR_GRANULE_URL: &str = "https://cmr.earthdata.nasa.gov/search/granules.umm_json_v1_4";

/// Minimum distance in degrees between the point and every footprint edge
/// for a granule to rank as clear of the edges.
pub const EDGE_PADDING_DEGREES: f64 = 2.5;

/// One catalog query.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogQuery {
    pub short_name: String,
    /// `(lon, lat)` the granule footprint must contain.
    pub point: Option<(f64, f64)>,
    pub window: TemporalWindow,
    pub day_night: Option<String>,
}

impl CatalogQuery {
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = vec![("short_name".to_string(), self.short_name.clone())];
        if let Some((lon, lat)) = self.point {
            params.push(("point".to_string(), format!("{},{}", lon, lat)));
        }
        if let Some(flag) = &self.day_night {
            params.push(("day_night_flag".to_string(), flag.clone()));
        }
        params.push(("temporal".to_string(), self.window.to_query_value()));
        params
    }
}

/// A granule as described by the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct Granule {
    pub url: String,
    pub file_name: String,
    pub begin: NaiveDateTime,
    pub day_night: Option<String>,
    pub footprint: Option<BoundingBox>,
}

/// A granule with the keys it was ranked by.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedGranule {
    pub granule: Granule,
    pub clear_of_edges: bool,
    /// Absolute distance in seconds between the granule start and the query.
    pub temporal_diff: f64,
}

/// Source of granule descriptions.
#[async_trait]
pub trait GranuleCatalog: Send + Sync {
    async fn granules(&self, query: &CatalogQuery) -> RetrievalResult<Vec<Granule>>;
}

/// What to search for on behalf of one mission.
#[derive(Debug, Clone)]
pub struct SearchRequest<'a> {
    pub mission: &'a str,
    pub short_name: &'a str,
    pub revisit_hours: i64,
    pub exclude: &'a [&'a str],
    pub day_night: Option<&'a str>,
}

/// Search, widen once on an empty result, and rank.
///
/// An empty result after widening is [`RetrievalError::NotFound`].
#[instrument(skip(catalog, request), fields(mission = request.mission))]
pub async fn search(
    catalog: &dyn GranuleCatalog,
    request: &SearchRequest<'_>,
    point: &QueryPoint,
) -> RetrievalResult<Vec<RankedGranule>> {
    let mut query = CatalogQuery {
        short_name: request.short_name.to_string(),
        point: Some((point.longitude, point.latitude)),
        window: TemporalWindow::whole_day(point.timestamp),
        day_night: request.day_night.map(str::to_string),
    };

    let mut hits = exclude(catalog.granules(&query).await?, request.exclude);
    if hits.is_empty() {
        query.window = TemporalWindow::trailing(point.timestamp, request.revisit_hours);
        info!(
            window = %query.window,
            "No hits on original query, expanding temporal window"
        );
        hits = exclude(catalog.granules(&query).await?, request.exclude);
    }

    if hits.is_empty() {
        return Err(RetrievalError::NotFound {
            mission: request.mission.to_string(),
            window: query.window.to_string(),
        });
    }

    debug!(hits = hits.len(), "Catalog search returned granules");
    Ok(rank(hits, query.point, point.timestamp))
}

fn exclude(granules: Vec<Granule>, patterns: &[&str]) -> Vec<Granule> {
    granules
        .into_iter()
        .filter(|g| !patterns.iter().any(|p| g.url.contains(p)))
        .collect()
}

/// Order granules best first.
///
/// Clear-of-edges granules precede the rest, then smaller temporal
/// difference wins, then file name. The order is total, so ranking is
/// deterministic and idempotent.
pub fn rank(
    granules: Vec<Granule>,
    point: Option<(f64, f64)>,
    at: NaiveDateTime,
) -> Vec<RankedGranule> {
    let mut ranked: Vec<RankedGranule> = granules
        .into_iter()
        .map(|granule| {
            let clear_of_edges = match (point, &granule.footprint) {
                (None, _) => true,
                (Some((lon, lat)), Some(bbox)) => {
                    bbox.clear_of_edges(lon, lat, EDGE_PADDING_DEGREES)
                }
                (Some(_), None) => false,
            };
            let temporal_diff = (granule.begin - at).num_milliseconds().abs() as f64 / 1000.0;
            RankedGranule {
                granule,
                clear_of_edges,
                temporal_diff,
            }
        })
        .collect();

    ranked.sort_by(compare_ranked);
    ranked
}

fn compare_ranked(a: &RankedGranule, b: &RankedGranule) -> Ordering {
    b.clear_of_edges
        .cmp(&a.clear_of_edges)
        .then_with(|| a.temporal_diff.total_cmp(&b.temporal_diff))
        .then_with(|| a.granule.file_name.cmp(&b.granule.file_name))
}

// ============================================================================
// Catalog response (UMM-JSON)
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct UmmResponse {
    #[serde(default)]
    pub items: Vec<UmmItem>,
}

#[derive(Debug, Deserialize)]
pub struct UmmItem {
    pub umm: Umm,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Umm {
    #[serde(default)]
    pub related_urls: Vec<RelatedUrl>,
    pub temporal_extent: TemporalExtent,
    pub data_granule: Option<DataGranule>,
    pub spatial_extent: Option<SpatialExtent>,
}

#[derive(Debug, Deserialize)]
pub struct RelatedUrl {
    #[serde(rename = "URL")]
    pub url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemporalExtent {
    pub range_date_time: RangeDateTime,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RangeDateTime {
    pub beginning_date_time: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DataGranule {
    pub day_night_flag: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SpatialExtent {
    pub horizontal_spatial_domain: HorizontalSpatialDomain,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HorizontalSpatialDomain {
    pub geometry: Geometry,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Geometry {
    #[serde(default)]
    pub bounding_rectangles: Vec<BoundingRectangle>,
    #[serde(default, rename = "GPolygons")]
    pub g_polygons: Vec<GPolygon>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BoundingRectangle {
    pub west_bounding_coordinate: f64,
    pub east_bounding_coordinate: f64,
    pub north_bounding_coordinate: f64,
    pub south_bounding_coordinate: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GPolygon {
    pub boundary: Boundary,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Boundary {
    pub points: Vec<PolygonPoint>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolygonPoint {
    pub longitude: f64,
    pub latitude: f64,
}

impl Geometry {
    fn footprint(&self) -> Option<BoundingBox> {
        if let Some(rect) = self.bounding_rectangles.first() {
            return Some(BoundingBox::new(
                rect.west_bounding_coordinate,
                rect.south_bounding_coordinate,
                rect.east_bounding_coordinate,
                rect.north_bounding_coordinate,
            ));
        }
        let polygon = self.g_polygons.first()?;
        BoundingBox::from_vertices(
            polygon
                .boundary
                .points
                .iter()
                .map(|p| (p.longitude, p.latitude)),
        )
    }
}

/// Parse a catalog begin time, with or without fractional seconds.
pub fn parse_begin_time(value: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%dT%H:%M:%S%.fZ", "%Y-%m-%dT%H:%M:%SZ", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

/// File name of a granule URL: the part after `getfile/`, or the last
/// path segment.
pub fn granule_file_name(url: &str) -> String {
    match url.split_once("getfile/") {
        Some((_, name)) => name.to_string(),
        None => crate::client::file_name_from_url(url),
    }
}

impl UmmResponse {
    pub fn into_granules(self) -> RetrievalResult<Vec<Granule>> {
        self.items
            .into_iter()
            .map(|item| {
                let umm = item.umm;
                let url = umm
                    .related_urls
                    .into_iter()
                    .next()
                    .map(|u| u.url)
                    .ok_or_else(|| RetrievalError::Catalog("granule without URL".to_string()))?;
                let raw = &umm.temporal_extent.range_date_time.beginning_date_time;
                let begin = parse_begin_time(raw).ok_or_else(|| {
                    RetrievalError::Catalog(format!("unparseable begin time '{}'", raw))
                })?;
                Ok(Granule {
                    file_name: granule_file_name(&url),
                    url,
                    begin,
                    day_night: umm.data_granule.and_then(|d| d.day_night_flag),
                    footprint: umm
                        .spatial_extent
                        .and_then(|s| s.horizontal_spatial_domain.geometry.footprint()),
                })
            })
            .collect()
    }
}

/// The public metadata catalog over HTTP.
pub struct CmrCatalog {
    client: Arc<ArchiveClient>,
    url: String,
}

impl CmrCatalog {
    pub fn new(client: Arc<ArchiveClient>) -> Self {
        Self::with_url(client, CMR_GRANULE_URL)
    }

    pub fn with_url(client: Arc<ArchiveClient>, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl GranuleCatalog for CmrCatalog {
    async fn granules(&self, query: &CatalogQuery) -> RetrievalResult<Vec<Granule>> {
        let response: UmmResponse = self.client.get_json(&self.url, &query.params()).await?;
        response.into_granules()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2019, 7, 6)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_query_params_order() {
        let query = CatalogQuery {
            short_name: "MODISA_L2_OC".to_string(),
            point: Some((-70.5, 42.25)),
            window: TemporalWindow::whole_day(ts(14, 30)),
            day_night: Some("day".to_string()),
        };
        let params = query.params();
        let keys: Vec<&str> = params.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["short_name", "point", "day_night_flag", "temporal"]);
        assert_eq!(params[1].1, "-70.5,42.25");
        assert_eq!(params[3].1, "2019-07-06T00:00:00Z,2019-07-06T23:59:59Z");
    }

    #[test]
    fn test_parse_begin_time_variants() {
        assert_eq!(parse_begin_time("2019-07-06T14:30:00Z"), Some(ts(14, 30)));
        assert_eq!(parse_begin_time("2019-07-06T14:30:00.000Z"), Some(ts(14, 30)));
        assert_eq!(parse_begin_time("yesterday"), None);
    }

    #[test]
    fn test_granule_file_name() {
        assert_eq!(
            granule_file_name("https://oceandata.sci.gsfc.nasa.gov/ob/getfile/A2019187143000.L2_LAC_OC.nc"),
            "A2019187143000.L2_LAC_OC.nc"
        );
        assert_eq!(granule_file_name("https://example.invalid/data/x.nc"), "x.nc");
    }

    #[test]
    fn test_parse_umm_response() {
        let body = r#"{
            "hits": 2,
            "items": [
                {"umm": {
                    "RelatedUrls": [{"URL": "https://oceandata.sci.gsfc.nasa.gov/ob/getfile/A1.L2_LAC_OC.nc"}],
                    "TemporalExtent": {"RangeDateTime": {"BeginningDateTime": "2019-07-06T14:30:00.000Z"}},
                    "DataGranule": {"DayNightFlag": "Day"},
                    "SpatialExtent": {"HorizontalSpatialDomain": {"Geometry": {
                        "BoundingRectangles": [{
                            "WestBoundingCoordinate": -80.0, "EastBoundingCoordinate": -60.0,
                            "NorthBoundingCoordinate": 50.0, "SouthBoundingCoordinate": 35.0
                        }]
                    }}}
                }},
                {"umm": {
                    "RelatedUrls": [{"URL": "https://oceandata.sci.gsfc.nasa.gov/ob/getfile/A2.L2_LAC_OC.nc"}],
                    "TemporalExtent": {"RangeDateTime": {"BeginningDateTime": "2019-07-06T16:05:00Z"}},
                    "SpatialExtent": {"HorizontalSpatialDomain": {"Geometry": {
                        "GPolygons": [{"Boundary": {"Points": [
                            {"Longitude": -75.0, "Latitude": 40.0},
                            {"Longitude": -65.0, "Latitude": 40.0},
                            {"Longitude": -65.0, "Latitude": 45.0},
                            {"Longitude": -75.0, "Latitude": 45.0}
                        ]}}]
                    }}}
                }}
            ]
        }"#;

        let response: UmmResponse = serde_json::from_str(body).unwrap();
        let granules = response.into_granules().unwrap();

        assert_eq!(granules.len(), 2);
        assert_eq!(granules[0].file_name, "A1.L2_LAC_OC.nc");
        assert_eq!(granules[0].day_night.as_deref(), Some("Day"));
        assert_eq!(
            granules[0].footprint,
            Some(BoundingBox::new(-80.0, 35.0, -60.0, 50.0))
        );
        assert_eq!(granules[1].begin, ts(16, 5));
        assert_eq!(
            granules[1].footprint,
            Some(BoundingBox::new(-75.0, 40.0, -65.0, 45.0))
        );
    }

    #[test]
    fn test_granule_without_url_is_malformed() {
        let body = r#"{"items": [{"umm": {
            "RelatedUrls": [],
            "TemporalExtent": {"RangeDateTime": {"BeginningDateTime": "2019-07-06T14:30:00Z"}}
        }}]}"#;
        let response: UmmResponse = serde_json::from_str(body).unwrap();
        assert!(matches!(
            response.into_granules(),
            Err(RetrievalError::Catalog(_))
        ));
    }
}
