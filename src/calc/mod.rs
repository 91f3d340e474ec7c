pub mod composition;
pub mod formulas;
pub mod leaderboard;
pub mod sanitize;

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::project::Project;

pub use leaderboard::{build_leaderboard, LeaderboardEntry};
pub use sanitize::sanitize;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalcError {
    #[error("not a valid material for this project: {0}")]
    InvalidMaterial(String),
    #[error("not a valid calculation category: {0}")]
    InvalidCategory(String),
    #[error("calculation category '{0}' needs a material")]
    MaterialRequired(Category),
}

/// Every named calculation the engine can answer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    TotalWeight,
    RecyclePercentage,
    TotalRecycledMaterial,
    TotalDepositedMaterial,
    PlantCo2Rate,
    FinalProductCo2Rate,
    LandfillDist,
    PlantDist,
    TruckNum,
    LandfillTransportationCo2,
    PlantTransportationCo2,
    ProductionCo2,
    RecyclingCo2,
    Co2Reduction,
    Contribution,
    Co2ReductionRatio,
    TotalCo2Reduction,
    RecyclingTotalCo2Emission,
    TransportationTotalCo2Emission,
    ProductionTotalCo2Emission,
    AverageRecycling,
}

/// A calculation bound either to one material or to the whole project.
#[derive(Clone, Copy)]
pub enum Formula {
    PerMaterial(fn(&Project, &str) -> f64),
    PerProject(fn(&Project) -> f64),
}

impl Category {
    pub const ALL: [Category; 21] = [
        Category::TotalWeight,
        Category::RecyclePercentage,
        Category::TotalRecycledMaterial,
        Category::TotalDepositedMaterial,
        Category::PlantCo2Rate,
        Category::FinalProductCo2Rate,
        Category::LandfillDist,
        Category::PlantDist,
        Category::TruckNum,
        Category::LandfillTransportationCo2,
        Category::PlantTransportationCo2,
        Category::ProductionCo2,
        Category::RecyclingCo2,
        Category::Co2Reduction,
        Category::Contribution,
        Category::Co2ReductionRatio,
        Category::TotalCo2Reduction,
        Category::RecyclingTotalCo2Emission,
        Category::TransportationTotalCo2Emission,
        Category::ProductionTotalCo2Emission,
        Category::AverageRecycling,
    ];

    pub fn as_name(&self) -> &'static str {
        match self {
            Self::TotalWeight => "total weight",
            Self::RecyclePercentage => "recycle percentage",
            Self::TotalRecycledMaterial => "total recycled material",
            Self::TotalDepositedMaterial => "total deposited material",
            Self::PlantCo2Rate => "plant co2 rate",
            Self::FinalProductCo2Rate => "final product co2 rate",
            Self::LandfillDist => "landfill dist",
            Self::PlantDist => "plant dist",
            Self::TruckNum => "truck num",
            Self::LandfillTransportationCo2 => "landfill transportation co2",
            Self::PlantTransportationCo2 => "plant transportation co2",
            Self::ProductionCo2 => "production co2",
            Self::RecyclingCo2 => "recycling co2",
            Self::Co2Reduction => "co2 reduction",
            Self::Contribution => "contribution",
            Self::Co2ReductionRatio => "co2 reduction ratio",
            Self::TotalCo2Reduction => "total co2 reduction",
            Self::RecyclingTotalCo2Emission => "recycling total co2 emission",
            Self::TransportationTotalCo2Emission => "transportation total co2 emission",
            Self::ProductionTotalCo2Emission => "production total co2 emission",
            Self::AverageRecycling => "average recycling",
        }
    }

    pub fn formula(self) -> Formula {
        use crate::calc::formulas as f;
        match self {
            Self::TotalWeight => Formula::PerMaterial(f::total_weight),
            Self::RecyclePercentage => Formula::PerMaterial(f::recycle_percentage),
            Self::TotalRecycledMaterial => Formula::PerMaterial(f::total_recycled_material),
            Self::TotalDepositedMaterial => Formula::PerMaterial(f::total_deposited_material),
            Self::PlantCo2Rate => Formula::PerMaterial(f::plant_co2_rate),
            Self::FinalProductCo2Rate => Formula::PerMaterial(f::final_product_co2_rate),
            Self::LandfillDist => Formula::PerMaterial(f::landfill_dist),
            Self::PlantDist => Formula::PerMaterial(f::plant_dist),
            Self::TruckNum => Formula::PerMaterial(f::truck_num),
            Self::LandfillTransportationCo2 => {
                Formula::PerMaterial(f::landfill_transportation_co2)
            }
            Self::PlantTransportationCo2 => Formula::PerMaterial(f::plant_transportation_co2),
            Self::ProductionCo2 => Formula::PerMaterial(f::production_co2),
            Self::RecyclingCo2 => Formula::PerMaterial(f::recycling_co2),
            Self::Co2Reduction => Formula::PerMaterial(f::co2_reduction),
            Self::Contribution => Formula::PerMaterial(f::contribution),
            Self::Co2ReductionRatio => Formula::PerMaterial(f::co2_reduction_ratio),
            Self::TotalCo2Reduction => Formula::PerProject(f::total_co2_reduction),
            Self::RecyclingTotalCo2Emission => {
                Formula::PerProject(f::recycling_total_co2_emission)
            }
            Self::TransportationTotalCo2Emission => {
                Formula::PerProject(f::transportation_total_co2_emission)
            }
            Self::ProductionTotalCo2Emission => {
                Formula::PerProject(f::production_total_co2_emission)
            }
            Self::AverageRecycling => Formula::PerProject(f::average_recycling),
        }
    }

    pub fn needs_material(self) -> bool {
        matches!(self.formula(), Formula::PerMaterial(_))
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_name())
    }
}

impl FromStr for Category {
    type Err = CalcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s
            .trim()
            .to_ascii_lowercase()
            .replace(['_', '-'], " ");
        let category = match normalized.as_str() {
            // "landfield" is the spelling older clients send
            "landfield transportation co2" => Category::LandfillTransportationCo2,
            "truck" | "truck number" => Category::TruckNum,
            other => Category::ALL
                .into_iter()
                .find(|c| c.as_name() == other)
                .ok_or_else(|| CalcError::InvalidCategory(s.to_string()))?,
        };
        Ok(category)
    }
}

/// Computes one named value for a project, optionally for one material.
///
/// A material that is not part of the project is rejected before any
/// formula runs. The returned value is always finite and rounded to two
/// decimals.
pub fn calculate_value(
    project: &Project,
    category: Category,
    material: Option<&str>,
) -> Result<f64, CalcError> {
    if let Some(material) = material {
        if !project.materials.contains_key(material) {
            return Err(CalcError::InvalidMaterial(material.to_string()));
        }
    }
    let raw = match (category.formula(), material) {
        (Formula::PerMaterial(formula), Some(material)) => formula(project, material),
        (Formula::PerMaterial(_), None) => return Err(CalcError::MaterialRequired(category)),
        (Formula::PerProject(formula), _) => formula(project),
    };
    Ok(sanitize(raw))
}

/// [`calculate_value`] for a category given by name.
pub fn calculate_named(
    project: &Project,
    category: &str,
    material: Option<&str>,
) -> Result<f64, CalcError> {
    calculate_value(project, category.parse()?, material)
}
