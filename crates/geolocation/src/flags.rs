//! Named `l2_flags` bit masks.

use std::str::FromStr;

use sampler_common::ConfigError;
use serde::{Deserialize, Serialize};

/// Quality flag masks; a pixel is invalid when `flags & mask > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FlagMask {
    DefaultProdFail,
    ProdFail,
    Default,
    DefaultLand,
    #[default]
    Land,
}

impl FlagMask {
    pub fn bits(self) -> i64 {
        match self {
            FlagMask::DefaultProdFail => 1_073_742_610,
            FlagMask::ProdFail => 1_073_741_824,
            FlagMask::Default => 786,
            FlagMask::DefaultLand => 784,
            FlagMask::Land => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FlagMask::DefaultProdFail => "default_prodfail",
            FlagMask::ProdFail => "prodfail",
            FlagMask::Default => "default",
            FlagMask::DefaultLand => "default-land",
            FlagMask::Land => "land",
        }
    }

    /// True if a flag value marks the pixel invalid. NaN flags are invalid.
    pub fn rejects(self, flag: f64) -> bool {
        flag.is_nan() || (flag as i64) & self.bits() > 0
    }
}

impl FromStr for FlagMask {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default_prodfail" => Ok(FlagMask::DefaultProdFail),
            "prodfail" => Ok(FlagMask::ProdFail),
            "default" => Ok(FlagMask::Default),
            "default-land" => Ok(FlagMask::DefaultLand),
            "land" => Ok(FlagMask::Land),
            other => Err(ConfigError::UnknownFlagMask(other.to_string())),
        }
    }
}

impl TryFrom<String> for FlagMask {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FlagMask> for String {
    fn from(mask: FlagMask) -> Self {
        mask.name().to_string()
    }
}

impl std::fmt::Display for FlagMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!("land".parse::<FlagMask>().unwrap(), FlagMask::Land);
        assert_eq!("default-land".parse::<FlagMask>().unwrap().bits(), 784);
        assert!(matches!(
            "cloud".parse::<FlagMask>(),
            Err(ConfigError::UnknownFlagMask(_))
        ));
    }

    #[test]
    fn test_rejects() {
        assert!(FlagMask::Land.rejects(2.0));
        assert!(FlagMask::Land.rejects(3.0));
        assert!(!FlagMask::Land.rejects(1.0));
        assert!(!FlagMask::Land.rejects(0.0));
        assert!(FlagMask::ProdFail.rejects(1_073_741_824.0));
        assert!(FlagMask::Land.rejects(f64::NAN));
    }
}
