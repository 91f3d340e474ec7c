use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::calc::{calculate_value, CalcError, Category};
use crate::project::Project;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Reduction,
    Ratio,
    Contribution,
    Emission,
}

impl ChartKind {
    pub const ALL: [ChartKind; 4] = [
        ChartKind::Reduction,
        ChartKind::Ratio,
        ChartKind::Contribution,
        ChartKind::Emission,
    ];

    pub fn as_slug(self) -> &'static str {
        match self {
            Self::Reduction => "reduction",
            Self::Ratio => "ratio",
            Self::Contribution => "contribution",
            Self::Emission => "emission",
        }
    }
}

impl Display for ChartKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_slug())
    }
}

impl FromStr for ChartKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_slug() == normalized)
            .ok_or_else(|| format!("unknown chart kind: {s}"))
    }
}

/// Material names with one value per material, in the same order.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChartSeries {
    pub materials: Vec<String>,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PieSlice {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ChartPayload {
    Series(ChartSeries),
    Pie(Vec<PieSlice>),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MaterialRow {
    pub material: String,
    pub total_recycled_material: f64,
    pub total_deposited_material: f64,
    pub landfill_transportation_co2: f64,
    pub plant_transportation_co2: f64,
    pub production_co2: f64,
    pub recycling_co2: f64,
    pub co2_reduction: f64,
    pub contribution: f64,
    pub co2_reduction_ratio: f64,
    pub recycle_percentage: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectTotals {
    pub total_co2_reduction: f64,
    pub recycling_total_co2_emission: f64,
    pub transportation_total_co2_emission: f64,
    pub production_total_co2_emission: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TablePayload {
    pub rows: Vec<MaterialRow>,
    pub totals: ProjectTotals,
}

pub fn material_series(project: &Project, category: Category) -> Result<ChartSeries, CalcError> {
    let materials = project.material_names();
    let values = materials
        .iter()
        .map(|material| calculate_value(project, category, Some(material.as_str())))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ChartSeries { materials, values })
}

pub fn reduction_chart(project: &Project) -> Result<ChartSeries, CalcError> {
    material_series(project, Category::Co2Reduction)
}

pub fn ratio_chart(project: &Project) -> Result<ChartSeries, CalcError> {
    material_series(project, Category::Co2ReductionRatio)
}

pub fn contribution_pie(project: &Project) -> Result<Vec<PieSlice>, CalcError> {
    let series = material_series(project, Category::Contribution)?;
    Ok(series
        .materials
        .into_iter()
        .zip(series.values)
        .map(|(label, value)| PieSlice { label, value })
        .collect())
}

pub fn emission_pie(project: &Project) -> Result<Vec<PieSlice>, CalcError> {
    [
        ("Recycling", Category::RecyclingTotalCo2Emission),
        ("Transportation", Category::TransportationTotalCo2Emission),
        ("Production", Category::ProductionTotalCo2Emission),
    ]
    .into_iter()
    .map(|(label, category)| {
        Ok(PieSlice {
            label: label.to_string(),
            value: calculate_value(project, category, None)?,
        })
    })
    .collect()
}

pub fn build_chart(project: &Project, kind: ChartKind) -> Result<ChartPayload, CalcError> {
    Ok(match kind {
        ChartKind::Reduction => ChartPayload::Series(reduction_chart(project)?),
        ChartKind::Ratio => ChartPayload::Series(ratio_chart(project)?),
        ChartKind::Contribution => ChartPayload::Pie(contribution_pie(project)?),
        ChartKind::Emission => ChartPayload::Pie(emission_pie(project)?),
    })
}

pub fn project_totals(project: &Project) -> Result<ProjectTotals, CalcError> {
    Ok(ProjectTotals {
        total_co2_reduction: calculate_value(project, Category::TotalCo2Reduction, None)?,
        recycling_total_co2_emission: calculate_value(
            project,
            Category::RecyclingTotalCo2Emission,
            None,
        )?,
        transportation_total_co2_emission: calculate_value(
            project,
            Category::TransportationTotalCo2Emission,
            None,
        )?,
        production_total_co2_emission: calculate_value(
            project,
            Category::ProductionTotalCo2Emission,
            None,
        )?,
    })
}

pub fn table_payload(project: &Project) -> Result<TablePayload, CalcError> {
    let mut rows = Vec::with_capacity(project.materials.len());
    for material in project.materials.keys() {
        let value = |category| calculate_value(project, category, Some(material.as_str()));
        rows.push(MaterialRow {
            material: material.clone(),
            total_recycled_material: value(Category::TotalRecycledMaterial)?,
            total_deposited_material: value(Category::TotalDepositedMaterial)?,
            landfill_transportation_co2: value(Category::LandfillTransportationCo2)?,
            plant_transportation_co2: value(Category::PlantTransportationCo2)?,
            production_co2: value(Category::ProductionCo2)?,
            recycling_co2: value(Category::RecyclingCo2)?,
            co2_reduction: value(Category::Co2Reduction)?,
            contribution: value(Category::Contribution)?,
            co2_reduction_ratio: value(Category::Co2ReductionRatio)?,
            recycle_percentage: value(Category::RecyclePercentage)?,
        });
    }
    Ok(TablePayload {
        rows,
        totals: project_totals(project)?,
    })
}
