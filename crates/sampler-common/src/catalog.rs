//! The fixed mission catalog.
//!
//! Mission names, variables, coverage and archive endpoints are curated
//! domain knowledge. Open-ended coverage runs through the date the
//! registry is built.

use chrono::NaiveDate;

use crate::error::{ConfigError, ConfigResult};
use crate::mission::{
    Archive, DataLayout, DateCoverage, LonConvention, MissionDescriptor, UrlTemplate,
    ValueTransform,
};

type Ymd = (i32, u32, u32);

const MODIS_VARIABLES: &[&str] = &[
    "chlor_a", "ipar", "Kd_490", "par", "pic", "poc", "Rrs_412", "Rrs_443", "Rrs_469",
    "Rrs_488", "Rrs_531", "Rrs_547", "Rrs_555", "Rrs_645", "Rrs_667", "Rrs_678",
];

const CZCS_VARIABLES: &[&str] = &[
    "chlor_a", "Kd_490", "Rrs_443", "Rrs_520", "Rrs_550", "Rrs_670",
];

const GOCI_VARIABLES: &[&str] = &[
    "chlor_a", "Kd_490", "poc", "Rrs_412", "Rrs_443", "Rrs_490", "Rrs_555", "Rrs_660",
    "Rrs_680",
];

const HICO_VARIABLES: &[&str] = &[
    "Kd_490", "pic", "poc", "Rrs_353", "Rsf_358", "Rrs_364", "Rrs_370", "Rrs_375", "Rrs_381",
    "Rrs_387", "Rrs_393", "Rrs_398", "Rrs_404", "Rrs_410", "Rrs_416", "Rrs_421", "Rrs_427",
    "Rrs_433", "Rrs_438", "Rrs_444", "Rrs_450", "Rrs_456", "Rrs_461", "Rrs_467", "Rrs_473",
    "Rrs_479", "Rrs_484", "Rrs_490", "Rrs_496", "Rrs_501", "Rrs_507", "Rrs_513", "Rrs_519",
    "Rrs_524", "Rrs_530", "Rrs_536", "Rrs_542", "Rrs_547", "Rrs_553", "Rrs_559", "Rrs_564",
    "Rrs_570", "Rrs_576", "Rrs_582", "Rrs_587", "Rrs_593", "Rrs_599", "Rrs_605", "Rrs_610",
    "Rrs_616", "Rrs_622", "Rrs_627", "Rrs_633", "Rrs_639", "Rrs_645", "Rrs_650", "Rrs_656",
    "Rrs_662", "Rrs_668", "Rrs_673", "Rrs_679", "Rrs_685", "Rrs_690", "Rrs_696", "Rrs_702",
    "Rrs_708", "Rrs_713", "Rrs_719", "chlor_a",
];

const OCTS_VARIABLES: &[&str] = &[
    "chlor_a", "Kd_490", "par", "pic", "poc", "Rrs_412", "Rrs_443", "Rrs_490", "Rrs_516",
    "Rrs_565", "Rrs_667",
];

const SEAWIFS_VARIABLES: &[&str] = &[
    "chlor_a", "Kd_490", "par", "pic", "poc", "Rrs_412", "Rrs_443", "Rrs_490", "Rrs_555",
    "Rrs_670",
];

const VIIRS_SNPP_VARIABLES: &[&str] = &[
    "chlor_a", "Kd_490", "par", "pic", "poc", "Rrs_410", "Rrs_443", "Rrs_486", "Rrs_551",
    "Rrs_671",
];

const VIIRS_JPSS1_VARIABLES: &[&str] = &[
    "chlor_a", "Kd_490", "par", "pic", "poc", "Rrs_411", "Rrs_445", "Rrs_489", "Rrs_556",
    "Rrs_667",
];

const OCCCI_VARIABLES: &[&str] = &[
    "Rrs_412", "Rrs_443", "Rrs_490", "Rrs_510", "Rrs_560", "Rrs_665", "Rrs_412_rmsd",
    "Rrs_443_rmsd", "Rrs_490_rmsd", "Rrs_510_rmsd", "Rrs_560_rmsd", "Rrs_665_rmsd", "kd_490",
];

/// Merged-LAC products are coarse composites, not single passes.
const MERGED_LAC: &[&str] = &["MLAC"];

/// Near-real-time granules of the operational sensors are superseded by
/// their refined reprocessing.
pub const NEAR_REAL_TIME: &[&str] = &[".NRT."];

/// Retired sensors only have refined granules.
const NO_EXCLUSIONS: &[&str] = &[];

pub const OISST_URL: &str = "https://www.ncei.noaa.gov/thredds/ncss/OisstBase/NetCDF/V2.1/AVHRR/{yyyymm}/oisst-avhrr-v02r01.{yyyymmdd}.nc";
pub const BOSSW_URL: &str =
    "https://www.ncei.noaa.gov/thredds/ncss/uv/daily-strs/{yyyy}/tauxy{yyyymmdd}.nc";
pub const POSST_URL: &str =
    "https://thredds.jpl.nasa.gov/thredds/ncss/OceanTemperature/AVHRR_OI-NCEI-L4-GLOB-v2.1.nc";
pub const OCCCI_URL: &str = "https://rsg.pml.ac.uk/thredds/ncss/CCI_ALL-v5.0-DAILY";

fn date(ymd: Ymd) -> ConfigResult<NaiveDate> {
    NaiveDate::from_ymd_opt(ymd.0, ymd.1, ymd.2).ok_or_else(|| {
        ConfigError::InvalidRegistry(format!("invalid calendar date {:?}", ymd))
    })
}

fn coverage(start: Ymd, end: Option<Ymd>, today: NaiveDate) -> ConfigResult<DateCoverage> {
    Ok(DateCoverage {
        start: date(start)?,
        end: match end {
            Some(end) => date(end)?,
            None => today,
        },
    })
}

fn swath(
    name: &'static str,
    variables: &'static [&'static str],
    coverage: DateCoverage,
    archive: Archive,
    dummy_dataset: &'static str,
) -> MissionDescriptor {
    MissionDescriptor {
        name,
        variables,
        coverage,
        layout: DataLayout::Swath,
        archive,
        transform: None,
        dummy_dataset,
    }
}

fn catalog_search(
    short_name: &'static str,
    revisit_hours: i64,
    exclude: &'static [&'static str],
) -> Archive {
    Archive::MetadataSearch {
        short_name,
        revisit_hours,
        exclude,
    }
}

fn subsetting(url: &'static str, lon_convention: LonConvention) -> Archive {
    Archive::Subsetting {
        url: UrlTemplate(url),
        lon_convention,
    }
}

/// Build every standard mission with open-ended coverage ending at `today`.
pub fn standard_missions(today: NaiveDate) -> ConfigResult<Vec<MissionDescriptor>> {
    let missions = vec![
        swath(
            "MODIS-Aqua",
            MODIS_VARIABLES,
            coverage((2002, 7, 4), None, today)?,
            catalog_search("MODISA_L2_OC", 24, NEAR_REAL_TIME),
            "MODISA.nc",
        ),
        swath(
            "CZCS",
            CZCS_VARIABLES,
            coverage((1978, 10, 30), Some((1986, 6, 22)), today)?,
            catalog_search("CZCS_L2_OC", 24, NO_EXCLUSIONS),
            "CZCS.nc",
        ),
        swath(
            "GOCI",
            GOCI_VARIABLES,
            coverage((2011, 4, 1), None, today)?,
            catalog_search("GOCI_L2_OC", 2, NO_EXCLUSIONS),
            "GOCI.nc",
        ),
        swath(
            "HICO",
            HICO_VARIABLES,
            coverage((2009, 9, 25), Some((2014, 9, 13)), today)?,
            catalog_search("HICO_L2_OC", 24, NO_EXCLUSIONS),
            "HICO.nc",
        ),
        swath(
            "OCTS",
            OCTS_VARIABLES,
            coverage((1996, 11, 1), Some((1997, 6, 30)), today)?,
            Archive::OrbitSearch { exclude: MERGED_LAC },
            "OCTS.nc",
        ),
        swath(
            "SeaWiFS",
            SEAWIFS_VARIABLES,
            coverage((1997, 9, 4), Some((2010, 12, 11)), today)?,
            Archive::OrbitSearch { exclude: MERGED_LAC },
            "SEAWIFS.nc",
        ),
        swath(
            "MODIS-Terra",
            MODIS_VARIABLES,
            coverage((2000, 2, 24), None, today)?,
            catalog_search("MODIST_L2_OC", 24, NEAR_REAL_TIME),
            "MODIST.nc",
        ),
        swath(
            "VIIRS-SNPP",
            VIIRS_SNPP_VARIABLES,
            coverage((2012, 1, 2), None, today)?,
            catalog_search("VIIRSN_L2_OC", 24, NEAR_REAL_TIME),
            "VIIRSSNPP.nc",
        ),
        swath(
            "VIIRS-JPSS1",
            VIIRS_JPSS1_VARIABLES,
            coverage((2017, 11, 29), None, today)?,
            catalog_search("VIIRSJ1_L2_OC", 24, NEAR_REAL_TIME),
            "VIIRSJPSS1.nc",
        ),
        MissionDescriptor {
            name: "OC-CCI",
            variables: OCCCI_VARIABLES,
            coverage: coverage((1997, 9, 4), Some((2020, 12, 31)), today)?,
            layout: DataLayout::Grid,
            archive: subsetting(OCCCI_URL, LonConvention::Signed),
            transform: None,
            dummy_dataset: "OCCCI.nc",
        },
        MissionDescriptor {
            name: "OI-SST",
            variables: &["sst"],
            coverage: coverage((1981, 9, 1), None, today)?,
            layout: DataLayout::Grid,
            archive: subsetting(OISST_URL, LonConvention::Positive),
            transform: None,
            dummy_dataset: "OISST.nc",
        },
        MissionDescriptor {
            name: "BO-SSW",
            variables: &["tau", "taux", "tauy"],
            coverage: coverage((1987, 7, 9), Some((2011, 9, 30)), today)?,
            layout: DataLayout::Grid,
            archive: subsetting(BOSSW_URL, LonConvention::Positive),
            transform: None,
            dummy_dataset: "BOSSW.nc",
        },
        MissionDescriptor {
            name: "PO-SST",
            variables: &["analysed_sst"],
            coverage: coverage((2016, 1, 1), None, today)?,
            layout: DataLayout::Grid,
            archive: subsetting(POSST_URL, LonConvention::Signed),
            transform: Some(ValueTransform::KelvinToCelsius),
            dummy_dataset: "POSST.nc",
        },
        MissionDescriptor {
            name: "ETOPO1-BED",
            variables: &["z"],
            coverage: coverage((1981, 9, 1), None, today)?,
            layout: DataLayout::ProjectedGrid,
            archive: Archive::StaticLocal {
                file_name: "ETOPO1_Bed_g_gmt4.grd",
            },
            transform: None,
            dummy_dataset: "ETOPO1_Bed_g_gmt4.grd",
        },
        MissionDescriptor {
            name: "ETOPO1-ICE",
            variables: &["z"],
            coverage: coverage((1981, 9, 1), None, today)?,
            layout: DataLayout::ProjectedGrid,
            archive: Archive::StaticLocal {
                file_name: "ETOPO1_Ice_g_gmt4.grd",
            },
            transform: None,
            dummy_dataset: "ETOPO1_Ice_g_gmt4.grd",
        },
    ];
    Ok(missions)
}
