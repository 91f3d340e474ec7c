//! CO2 reduction formulas over a project's material records.
//!
//! Units: masses in tons, distances in km, per-material emissions in kg,
//! reductions and project totals in tons. Accessors return the raw stored
//! value; every derived quantity passes through [`sanitize`] before it is
//! returned, and later formulas build on those sanitized values.

use crate::calc::sanitize::sanitize;
use crate::project::{MaterialRecord, Project};

fn field(project: &Project, material: &str, pick: fn(&MaterialRecord) -> f64) -> f64 {
    project
        .materials
        .get(material)
        .map(pick)
        .unwrap_or(f64::NAN)
}

fn is_concrete(material: &str) -> bool {
    material.to_lowercase() == "concrete"
}

pub fn transport_co2_rate(project: &Project) -> f64 {
    project.transport_co2_rate
}

pub fn total_weight(project: &Project, material: &str) -> f64 {
    field(project, material, |m| m.tonnage)
}

pub fn recycle_percentage(project: &Project, material: &str) -> f64 {
    field(project, material, |m| m.recycled)
}

pub fn truck_num(project: &Project, material: &str) -> f64 {
    field(project, material, |m| m.truck)
}

pub fn plant_co2_rate(project: &Project, material: &str) -> f64 {
    field(project, material, |m| m.plant_co2_rate)
}

pub fn final_product_co2_rate(project: &Project, material: &str) -> f64 {
    field(project, material, |m| m.final_product_co2_rate)
}

pub fn landfill_dist(project: &Project, material: &str) -> f64 {
    field(project, material, |m| m.landfill_dist)
}

pub fn plant_dist(project: &Project, material: &str) -> f64 {
    field(project, material, |m| m.plant_dist)
}

pub fn total_recycled_material(project: &Project, material: &str) -> f64 {
    let sum = total_weight(project, material) * recycle_percentage(project, material);
    sanitize(sum / 100.0)
}

pub fn total_deposited_material(project: &Project, material: &str) -> f64 {
    let sum = (100.0 - recycle_percentage(project, material)) * total_weight(project, material);
    sanitize(sum / 100.0)
}

/// Transport emissions for the share hauled to landfill (kg).
pub fn landfill_transportation_co2(project: &Project, material: &str) -> f64 {
    let weight = total_weight(project, material);
    let mut sum =
        transport_co2_rate(project) * truck_num(project, material) * landfill_dist(project, material);
    if is_concrete(material) {
        sum = sum * total_deposited_material(project, material) / weight;
    } else {
        // the weight ratio keeps a zero tonnage degenerate, as for concrete
        sum = sum * weight / weight;
        sum = sum * (100.0 - recycle_percentage(project, material)) / 100.0;
    }
    sanitize(sum)
}

/// Transport emissions for the share hauled to the recycling plant (kg).
///
/// Concrete is scaled by the recycled mass over the total weight. Every
/// other material is additionally scaled by the recycle percentage.
pub fn plant_transportation_co2(project: &Project, material: &str) -> f64 {
    let weight = total_weight(project, material);
    let mut sum =
        transport_co2_rate(project) * truck_num(project, material) * plant_dist(project, material);
    sum *= total_recycled_material(project, material);
    if is_concrete(material) {
        sum /= weight;
    } else {
        sum = sum / weight * recycle_percentage(project, material);
        sum /= 100.0;
    }
    sanitize(sum)
}

pub fn production_co2(project: &Project, material: &str) -> f64 {
    sanitize(final_product_co2_rate(project, material) * total_recycled_material(project, material))
}

pub fn recycling_co2(project: &Project, material: &str) -> f64 {
    let sum = plant_co2_rate(project, material)
        * total_weight(project, material)
        * recycle_percentage(project, material)
        / 100.0;
    sanitize(sum)
}

/// Net CO2 saved by recycling this material (tons). Negative when the
/// recycling chain emits more than the avoided production.
pub fn co2_reduction(project: &Project, material: &str) -> f64 {
    let emitted = landfill_transportation_co2(project, material)
        + recycling_co2(project, material)
        + plant_transportation_co2(project, material);
    sanitize((production_co2(project, material) - emitted) / 1000.0)
}

/// Share of the project's total reduction contributed by this material (%).
pub fn contribution(project: &Project, material: &str) -> f64 {
    sanitize(co2_reduction(project, material) / total_co2_reduction(project) * 100.0)
}

/// Reduction per ton of material handled.
pub fn co2_reduction_ratio(project: &Project, material: &str) -> f64 {
    sanitize(co2_reduction(project, material) / total_weight(project, material))
}

pub fn total_co2_reduction(project: &Project) -> f64 {
    let sum: f64 = project
        .materials
        .keys()
        .map(|material| co2_reduction(project, material))
        .sum();
    sanitize(sum)
}

pub fn recycling_total_co2_emission(project: &Project) -> f64 {
    let sum: f64 = project
        .materials
        .keys()
        .map(|material| recycling_co2(project, material))
        .sum();
    sanitize(sum / 1000.0)
}

pub fn transportation_total_co2_emission(project: &Project) -> f64 {
    let sum: f64 = project
        .materials
        .keys()
        .map(|material| {
            landfill_transportation_co2(project, material)
                + plant_transportation_co2(project, material)
        })
        .sum();
    sanitize(sum / 1000.0)
}

pub fn production_total_co2_emission(project: &Project) -> f64 {
    let sum: f64 = project
        .materials
        .keys()
        .map(|material| production_co2(project, material))
        .sum();
    sanitize(sum / 1000.0)
}

/// Mean recycle percentage over the materials that carry a usable value.
pub fn average_recycling(project: &Project) -> f64 {
    let values: Vec<f64> = project
        .materials
        .values()
        .map(|m| m.recycled)
        .filter(|v| v.is_finite())
        .collect();
    if values.is_empty() {
        return 0.0;
    }
    sanitize(values.iter().sum::<f64>() / values.len() as f64)
}
