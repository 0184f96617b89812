use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::{Result, SajuError};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub solar_terms: SolarTermConfig,
    pub strength: StrengthConfig,
    pub useful: UsefulConfig,
    pub fortune: FortuneConfig,
    pub luck: LuckConfig,
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| SajuError::DataLoad {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolarTermConfig {
    /// Directory of `solar_terms_<decade>.json` files. When unset the
    /// built-in ephemeris computes the boundaries.
    pub data_dir: Option<PathBuf>,
    /// Offset of local wall-clock time from UTC for computed boundaries.
    pub utc_offset_minutes: i32,
}

impl Default for SolarTermConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            utc_offset_minutes: 540,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrengthConfig {
    /// Fraction of a branch's contribution removed when it is clashed,
    /// penalised or harmed. Applied once per branch.
    pub relation_discount: f64,
}

impl Default for StrengthConfig {
    fn default() -> Self {
        Self {
            relation_discount: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsefulConfig {
    pub min_confidence: f64,
    /// Share of the eight visible positions one element must hold to
    /// dominate the chart.
    pub dominant_share: f64,
}

impl Default for UsefulConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            dominant_share: 0.6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FortuneConfig {
    pub decade_weight: f64,
    pub year_weight: f64,
    pub month_weight: f64,
    pub day_weight: f64,
}

impl Default for FortuneConfig {
    fn default() -> Self {
        Self {
            decade_weight: 0.4,
            year_weight: 0.3,
            month_weight: 0.2,
            day_weight: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LuckConfig {
    pub year_span: usize,
    pub month_span: usize,
}

impl Default for LuckConfig {
    fn default() -> Self {
        Self {
            year_span: 10,
            month_span: 12,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults_from_empty_toml() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.solar_terms.utc_offset_minutes, 540);
    }

    #[test]
    fn test_partial_override() {
        let config = EngineConfig::from_toml_str(
            r#"
            [solar_terms]
            data_dir = "/var/lib/saju/terms"

            [strength]
            relation_discount = 0.5

            [fortune]
            day_weight = 0.0
            "#,
        )
        .unwrap();
        assert_eq!(
            config.solar_terms.data_dir.as_deref(),
            Some(Path::new("/var/lib/saju/terms"))
        );
        assert_eq!(config.solar_terms.utc_offset_minutes, 540);
        assert_relative_eq!(config.strength.relation_discount, 0.5);
        assert_relative_eq!(config.fortune.decade_weight, 0.4);
        assert_relative_eq!(config.fortune.day_weight, 0.0);
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let err = EngineConfig::from_toml_str("[strength]\nrelation_discount = \"high\"").unwrap_err();
        assert!(matches!(err, SajuError::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"[luck]\nyear_span = 3\n").unwrap();
        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.luck.year_span, 3);
        assert_eq!(config.luck.month_span, 12);
    }
}
