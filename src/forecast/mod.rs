pub mod predictors;
pub mod split;

use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{ForecastConfig, ForecastMode};
use crate::forecast::predictors::{CommandPredictor, DisabledPredictor, HttpPredictor};

pub use split::{forecast_materials, historical_split, industry_average_split};

/// Average storey height used when a building's volume is unknown.
pub const FLOOR_HEIGHT_M: f64 = 2.8;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BuildingUsage {
    #[default]
    Education,
    Office,
    Retail,
    Hospital,
    Residential,
}

impl BuildingUsage {
    pub const ALL: [BuildingUsage; 5] = [
        BuildingUsage::Education,
        BuildingUsage::Office,
        BuildingUsage::Retail,
        BuildingUsage::Hospital,
        BuildingUsage::Residential,
    ];

    /// Numeric code the waste model was trained on.
    pub fn code(self) -> u8 {
        match self {
            Self::Education => 1,
            Self::Office => 2,
            Self::Retail => 3,
            Self::Hospital => 4,
            Self::Residential => 5,
        }
    }

    pub fn as_slug(self) -> &'static str {
        match self {
            Self::Education => "education",
            Self::Office => "office",
            Self::Retail => "retail",
            Self::Hospital => "hospital",
            Self::Residential => "residential",
        }
    }

    /// Unknown usages are treated as education.
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }
}

impl Display for BuildingUsage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_slug())
    }
}

impl FromStr for BuildingUsage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|usage| usage.as_slug() == normalized)
            .ok_or_else(|| anyhow::anyhow!("unknown building usage: {s}"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuildingProfile {
    pub usage: BuildingUsage,
    /// Gross floor area in square metres.
    pub gfa: f64,
    /// Building volume in cubic metres, if known.
    pub volume: Option<f64>,
    pub floors: f64,
}

impl BuildingProfile {
    pub fn effective_volume(&self) -> f64 {
        match self.volume {
            Some(volume) if volume.is_finite() && volume != 0.0 => volume,
            _ => self.floors * self.gfa * FLOOR_HEIGHT_M,
        }
    }
}

/// Estimates the total demolition waste, in tonnes, a building will produce.
#[async_trait]
pub trait WastePredictor: Send + Sync {
    fn name(&self) -> &str;
    async fn predict(&self, profile: &BuildingProfile) -> Result<f64>;
}

pub fn predictor_from_config(config: &ForecastConfig) -> Result<Arc<dyn WastePredictor>> {
    let predictor: Arc<dyn WastePredictor> = match config.mode {
        ForecastMode::Command => Arc::new(CommandPredictor::new(
            config.command.clone(),
            config.script.clone(),
            config.timeout_secs,
        )),
        ForecastMode::Http => Arc::new(HttpPredictor::new(&config.url, config.timeout_secs)?),
        ForecastMode::Disabled => Arc::new(DisabledPredictor),
    };
    Ok(predictor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_codes_follow_model_encoding() {
        let codes: Vec<u8> = BuildingUsage::ALL.iter().map(|u| u.code()).collect();
        assert_eq!(codes, [1, 2, 3, 4, 5]);
        assert_eq!(BuildingUsage::parse_lenient("Hospital"), BuildingUsage::Hospital);
        assert_eq!(BuildingUsage::parse_lenient("warehouse"), BuildingUsage::Education);
    }

    #[test]
    fn volume_defaults_to_floor_height_estimate() {
        let mut profile = BuildingProfile {
            usage: BuildingUsage::Office,
            gfa: 100.0,
            volume: None,
            floors: 2.0,
        };
        assert!((profile.effective_volume() - 560.0).abs() < 1e-9);
        profile.volume = Some(900.0);
        assert_eq!(profile.effective_volume(), 900.0);
        profile.volume = Some(0.0);
        assert!((profile.effective_volume() - 560.0).abs() < 1e-9);
    }

    #[test]
    fn config_selects_predictor() {
        let mut config = ForecastConfig::default();
        assert_eq!(predictor_from_config(&config).unwrap().name(), "command");
        config.mode = ForecastMode::Disabled;
        assert_eq!(predictor_from_config(&config).unwrap().name(), "disabled");
        config.mode = ForecastMode::Http;
        assert!(predictor_from_config(&config).is_err());
        config.url = "http://127.0.0.1:9/predict".to_string();
        assert_eq!(predictor_from_config(&config).unwrap().name(), "http");
    }
}
