pub mod csv;
pub mod json;
pub mod table;
pub mod xlsx;

use crate::report::{MaterialRow, ProjectTotals};

/// Column headings for per-material rows, shared by every renderer.
pub const MATERIAL_COLUMNS: [&str; 11] = [
    "Material",
    "Total Recycled Material [tons]",
    "Total Deposited Material [tons]",
    "CO2 Emission by Transportation (landfill) [kg]",
    "CO2 Emission by Transportation (recycling) [kg]",
    "CO2 Emission for Production [kg]",
    "CO2 Emission for Recycling [kg]",
    "Reduction in CO2 Emission [ton]",
    "Contribution [%]",
    "Reduction in CO2 Ratio [ton/ton]",
    "Recycle Percentage [%]",
];

pub const TOTALS_COLUMNS: [&str; 5] = [
    "",
    "Total CO2 Reduction [ton]",
    "Recycling CO2 Emission [ton]",
    "Transportation CO2 Emission [ton]",
    "Production CO2 Emission [ton]",
];

pub(crate) fn row_values(row: &MaterialRow) -> [f64; 10] {
    [
        row.total_recycled_material,
        row.total_deposited_material,
        row.landfill_transportation_co2,
        row.plant_transportation_co2,
        row.production_co2,
        row.recycling_co2,
        row.co2_reduction,
        row.contribution,
        row.co2_reduction_ratio,
        row.recycle_percentage,
    ]
}

pub(crate) fn totals_values(totals: &ProjectTotals) -> [f64; 4] {
    [
        totals.total_co2_reduction,
        totals.recycling_total_co2_emission,
        totals.transportation_total_co2_emission,
        totals.production_total_co2_emission,
    ]
}
