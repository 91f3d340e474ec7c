use std::collections::BTreeMap;

use crate::calc::composition::material_composition;
use crate::calc::sanitize;
use crate::project::{MaterialDefaults, MaterialRecord, Project, DEFAULT_MATERIALS};

/// Published share of each material in construction and demolition waste.
const INDUSTRY_AVERAGE: [(&str, f64); 10] = [
    ("Concrete", 0.171),
    ("Mixed Metal Scrap", 0.116),
    ("PVC", 0.039),
    ("Asbestos", 0.008),
    ("Mixed Waste", 0.069),
    ("VENM", 0.227),
    ("Brick", 0.17),
    ("Black Iron", 0.10),
    ("Copper", 0.10),
    ("Asbestos Soil", 0.0),
];

pub fn industry_average_split() -> BTreeMap<String, f64> {
    INDUSTRY_AVERAGE
        .iter()
        .map(|(material, share)| (material.to_string(), *share))
        .collect()
}

/// The composition of a user's past projects, limited to the default
/// materials. Shares of custom materials are dropped, not redistributed.
pub fn historical_split(projects: &[Project]) -> BTreeMap<String, f64> {
    let composition = material_composition(projects);
    DEFAULT_MATERIALS
        .iter()
        .map(|material| {
            let share = composition.get(*material).copied().unwrap_or(0.0);
            (material.to_string(), share)
        })
        .collect()
}

/// Spreads a predicted total over the default materials.
pub fn forecast_materials(
    total_waste: f64,
    split: &BTreeMap<String, f64>,
    defaults: &MaterialDefaults,
) -> BTreeMap<String, MaterialRecord> {
    DEFAULT_MATERIALS
        .iter()
        .map(|material| {
            let share = split.get(*material).copied().unwrap_or(0.0);
            let mut record = defaults.record();
            record.tonnage = sanitize(total_waste * share);
            (material.to_string(), record)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(tonnages: &[(&str, f64)]) -> Project {
        let mut materials = BTreeMap::new();
        for (name, tonnage) in tonnages {
            let mut record = MaterialDefaults::default().record();
            record.tonnage = *tonnage;
            materials.insert(name.to_string(), record);
        }
        Project {
            id: "p".to_string(),
            owner_id: "u".to_string(),
            name: "n".to_string(),
            number: "1".to_string(),
            date: "d".to_string(),
            client_name: "-".to_string(),
            revision_number: "-".to_string(),
            transport_co2_rate: 0.22,
            materials,
        }
    }

    #[test]
    fn industry_split_covers_defaults_and_sums_to_one() {
        let split = industry_average_split();
        assert_eq!(split.len(), DEFAULT_MATERIALS.len());
        for material in DEFAULT_MATERIALS {
            assert!(split.contains_key(material), "{material}");
        }
        let total: f64 = split.values().sum();
        assert!((total - 1.0).abs() < 1e-9, "sum was {total}");
    }

    #[test]
    fn forecast_spreads_total_over_default_materials() {
        let materials = forecast_materials(
            100.0,
            &industry_average_split(),
            &MaterialDefaults::default(),
        );
        assert_eq!(materials.len(), 10);
        assert_eq!(materials["Concrete"].tonnage, 17.1);
        assert_eq!(materials["VENM"].tonnage, 22.7);
        assert_eq!(materials["Asbestos Soil"].tonnage, 0.0);
        assert_eq!(materials["Brick"].recycled, 0.0);
        assert_eq!(materials["Brick"].truck, 10.0);
    }

    #[test]
    fn historical_split_ignores_custom_materials() {
        let projects = vec![project(&[("Concrete", 30.0), ("Timber", 10.0)])];
        let split = historical_split(&projects);
        assert_eq!(split.len(), 10);
        assert!(!split.contains_key("Timber"));
        assert!((split["Concrete"] - 0.75).abs() < 1e-12);
        assert_eq!(split["Brick"], 0.0);
    }

    #[test]
    fn historical_split_without_history_is_all_zero() {
        let split = historical_split(&[]);
        assert!(split.values().all(|share| *share == 0.0));
        let materials = forecast_materials(50.0, &split, &MaterialDefaults::default());
        assert!(materials.values().all(|m| m.tonnage == 0.0));
    }
}
