pub mod lenient;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_MATERIALS: [&str; 10] = [
    "Concrete",
    "Brick",
    "Black Iron",
    "PVC",
    "Copper",
    "Mixed Metal Scrap",
    "Asbestos",
    "Asbestos Soil",
    "Mixed Waste",
    "VENM",
];

/// Values used when a project or material field has never been supplied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaterialDefaults {
    #[serde(default = "default_transport_co2_rate")]
    pub transport_co2_rate: f64,
    #[serde(default)]
    pub tonnage: f64,
    #[serde(default)]
    pub recycled: f64,
    #[serde(default = "default_truck")]
    pub truck: f64,
    #[serde(default = "default_plant_co2_rate")]
    pub plant_co2_rate: f64,
    #[serde(default = "default_final_product_co2_rate")]
    pub final_product_co2_rate: f64,
    #[serde(default = "default_landfill_dist")]
    pub landfill_dist: f64,
    #[serde(default = "default_plant_dist")]
    pub plant_dist: f64,
}

impl Default for MaterialDefaults {
    fn default() -> Self {
        Self {
            transport_co2_rate: default_transport_co2_rate(),
            tonnage: 0.0,
            recycled: 0.0,
            truck: default_truck(),
            plant_co2_rate: default_plant_co2_rate(),
            final_product_co2_rate: default_final_product_co2_rate(),
            landfill_dist: default_landfill_dist(),
            plant_dist: default_plant_dist(),
        }
    }
}

impl MaterialDefaults {
    pub fn record(&self) -> MaterialRecord {
        MaterialRecord {
            tonnage: self.tonnage,
            recycled: self.recycled,
            truck: self.truck,
            plant_co2_rate: self.plant_co2_rate,
            final_product_co2_rate: self.final_product_co2_rate,
            landfill_dist: self.landfill_dist,
            plant_dist: self.plant_dist,
        }
    }
}

/// One material's waste data within a project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MaterialRecord {
    #[serde(
        serialize_with = "lenient::serialize_number",
        deserialize_with = "lenient::number"
    )]
    pub tonnage: f64,
    #[serde(
        serialize_with = "lenient::serialize_number",
        deserialize_with = "lenient::number"
    )]
    pub recycled: f64,
    #[serde(
        serialize_with = "lenient::serialize_number",
        deserialize_with = "lenient::number"
    )]
    pub truck: f64,
    #[serde(
        serialize_with = "lenient::serialize_number",
        deserialize_with = "lenient::number"
    )]
    pub plant_co2_rate: f64,
    #[serde(
        serialize_with = "lenient::serialize_number",
        deserialize_with = "lenient::number"
    )]
    pub final_product_co2_rate: f64,
    #[serde(
        serialize_with = "lenient::serialize_number",
        deserialize_with = "lenient::number"
    )]
    pub landfill_dist: f64,
    #[serde(
        serialize_with = "lenient::serialize_number",
        deserialize_with = "lenient::number"
    )]
    pub plant_dist: f64,
}

impl MaterialRecord {
    /// Rejects negative quantities and a recycled share outside 0..=100.
    /// Unreadable (NaN) values are left for the sanitizer.
    pub fn check_ranges(&self, material: &str) -> Result<(), ProjectError> {
        let out_of_range = |field: &'static str| ProjectError::OutOfRange {
            material: material.to_string(),
            field,
        };
        if self.recycled < 0.0 || self.recycled > 100.0 {
            return Err(out_of_range("recycled"));
        }
        let non_negative = [
            ("tonnage", self.tonnage),
            ("truck", self.truck),
            ("plantCo2Rate", self.plant_co2_rate),
            ("finalProductCo2Rate", self.final_product_co2_rate),
            ("landfillDist", self.landfill_dist),
            ("plantDist", self.plant_dist),
        ];
        match non_negative.into_iter().find(|(_, value)| *value < 0.0) {
            Some((field, _)) => Err(out_of_range(field)),
            None => Ok(()),
        }
    }
}

/// Partial update for one material. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MaterialUpdate {
    pub material: String,
    #[serde(default, deserialize_with = "lenient::optional_number")]
    pub tonnage: Option<f64>,
    #[serde(
        default,
        alias = "recycledPercentage",
        deserialize_with = "lenient::optional_number"
    )]
    pub recycled: Option<f64>,
    #[serde(default, deserialize_with = "lenient::optional_number")]
    pub truck: Option<f64>,
    #[serde(default, deserialize_with = "lenient::optional_number")]
    pub plant_co2_rate: Option<f64>,
    #[serde(default, deserialize_with = "lenient::optional_number")]
    pub final_product_co2_rate: Option<f64>,
    #[serde(default, deserialize_with = "lenient::optional_number")]
    pub landfill_dist: Option<f64>,
    #[serde(default, deserialize_with = "lenient::optional_number")]
    pub plant_dist: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub number: String,
    pub date: String,
    #[serde(default = "placeholder")]
    pub client_name: String,
    #[serde(default = "placeholder")]
    pub revision_number: String,
    #[serde(
        default = "default_transport_co2_rate",
        deserialize_with = "lenient::number"
    )]
    pub transport_co2_rate: f64,
    #[serde(default)]
    pub materials: BTreeMap<String, MaterialRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    #[serde(default, alias = "projectName")]
    pub name: String,
    #[serde(default, alias = "projectNumber")]
    pub number: String,
    #[serde(default)]
    pub date: String,
    pub client_name: Option<String>,
    pub revision_number: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetailsUpdate {
    #[serde(alias = "projectName")]
    pub name: Option<String>,
    pub date: Option<String>,
    pub client_name: Option<String>,
    pub revision_number: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_number")]
    pub transport_co2_rate: Option<f64>,
}

/// The descriptive part of a project, without its material data.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetails {
    pub id: String,
    pub name: String,
    pub number: String,
    pub date: String,
    pub client_name: String,
    pub revision_number: String,
    pub transport_co2_rate: f64,
}

#[derive(Debug, Error, PartialEq)]
pub enum ProjectError {
    #[error("project number, project name and date are required fields")]
    MissingDetails,
    #[error("material name cannot be blank")]
    BlankMaterialName,
    #[error("{field} of {material} is out of range")]
    OutOfRange {
        material: String,
        field: &'static str,
    },
}

impl Project {
    pub fn create(
        id: impl Into<String>,
        owner_id: impl Into<String>,
        new: NewProject,
        defaults: &MaterialDefaults,
    ) -> Result<Self, ProjectError> {
        let name = new.name.trim().to_string();
        let number = new.number.trim().to_string();
        let date = new.date.trim().to_string();
        if name.is_empty() || number.is_empty() || date.is_empty() {
            return Err(ProjectError::MissingDetails);
        }
        Ok(Self {
            id: id.into(),
            owner_id: owner_id.into(),
            name,
            number,
            date,
            client_name: non_blank(new.client_name).unwrap_or_else(placeholder),
            revision_number: non_blank(new.revision_number).unwrap_or_else(placeholder),
            transport_co2_rate: defaults.transport_co2_rate,
            materials: BTreeMap::new(),
        })
    }

    pub fn details(&self) -> ProjectDetails {
        ProjectDetails {
            id: self.id.clone(),
            name: self.name.clone(),
            number: self.number.clone(),
            date: self.date.clone(),
            client_name: self.client_name.clone(),
            revision_number: self.revision_number.clone(),
            transport_co2_rate: self.transport_co2_rate,
        }
    }

    pub fn material_names(&self) -> Vec<String> {
        self.materials.keys().cloned().collect()
    }

    pub fn apply_details(&mut self, update: ProjectDetailsUpdate) {
        if let Some(name) = non_blank(update.name) {
            self.name = name;
        }
        if let Some(date) = non_blank(update.date) {
            self.date = date;
        }
        if let Some(client) = non_blank(update.client_name) {
            self.client_name = client;
        }
        if let Some(revision) = non_blank(update.revision_number) {
            self.revision_number = revision;
        }
        if let Some(rate) = update.transport_co2_rate.filter(|r| r.is_finite() && *r != 0.0) {
            self.transport_co2_rate = rate;
        }
    }

    /// Merges each update into the material map: supplied value, else the
    /// stored value, else the default. Materials not mentioned are untouched.
    pub fn upsert_materials(
        &mut self,
        updates: &[MaterialUpdate],
        defaults: &MaterialDefaults,
    ) -> Result<(), ProjectError> {
        if updates.iter().any(|u| u.material.trim().is_empty()) {
            return Err(ProjectError::BlankMaterialName);
        }
        let mut materials = self.materials.clone();
        for update in updates {
            let base = materials
                .get(&update.material)
                .cloned()
                .unwrap_or_else(|| defaults.record());
            let record = MaterialRecord {
                tonnage: update.tonnage.unwrap_or(base.tonnage),
                recycled: update.recycled.unwrap_or(base.recycled),
                truck: update.truck.unwrap_or(base.truck),
                plant_co2_rate: update.plant_co2_rate.unwrap_or(base.plant_co2_rate),
                final_product_co2_rate: update
                    .final_product_co2_rate
                    .unwrap_or(base.final_product_co2_rate),
                landfill_dist: update.landfill_dist.unwrap_or(base.landfill_dist),
                plant_dist: update.plant_dist.unwrap_or(base.plant_dist),
            };
            record.check_ranges(&update.material)?;
            materials.insert(update.material.clone(), record);
        }
        self.materials = materials;
        Ok(())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn placeholder() -> String {
    "-".to_string()
}

fn default_transport_co2_rate() -> f64 {
    0.22
}

fn default_truck() -> f64 {
    10.0
}

fn default_plant_co2_rate() -> f64 {
    500.0
}

fn default_final_product_co2_rate() -> f64 {
    750.0
}

fn default_landfill_dist() -> f64 {
    40.0
}

fn default_plant_dist() -> f64 {
    30.0
}
