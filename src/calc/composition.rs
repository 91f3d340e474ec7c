use std::collections::BTreeMap;

use crate::project::Project;

/// Share of each material in a set of projects, by average tonnage.
///
/// A material's average is taken over the projects that list it; the
/// shares are those averages normalised by their sum. Returns an empty map
/// when there is nothing to weigh.
pub fn material_composition(projects: &[Project]) -> BTreeMap<String, f64> {
    let mut tallies: BTreeMap<String, (f64, u32)> = BTreeMap::new();
    for project in projects {
        for (material, record) in &project.materials {
            let tonnage = if record.tonnage.is_finite() {
                record.tonnage
            } else {
                0.0
            };
            let entry = tallies.entry(material.clone()).or_insert((0.0, 0));
            entry.0 += tonnage;
            entry.1 += 1;
        }
    }

    let averages: BTreeMap<String, f64> = tallies
        .into_iter()
        .map(|(material, (sum, count))| (material, sum / f64::from(count)))
        .collect();
    let total: f64 = averages.values().sum();
    if total <= 0.0 || !total.is_finite() {
        return BTreeMap::new();
    }

    averages
        .into_iter()
        .map(|(material, average)| (material, average / total))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::material_composition;
    use crate::project::{MaterialDefaults, Project};

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
    fn averages_per_material_then_normalises() {
        let projects = vec![
            project(&[("Concrete", 60.0), ("Brick", 20.0)]),
            project(&[("Concrete", 100.0)]),
        ];
        let shares = material_composition(&projects);
        // averages: Concrete 80, Brick 20
        assert!((shares["Concrete"] - 0.8).abs() < 1e-12);
        assert!((shares["Brick"] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn empty_or_weightless_input_yields_empty_map() {
        assert!(material_composition(&[]).is_empty());
        assert!(material_composition(&[project(&[("PVC", 0.0)])]).is_empty());
    }
}
