pub mod migrations;
pub mod sqlite;

use anyhow::Result;

use crate::project::Project;

pub use sqlite::SqliteStore;

/// Where project records live. The calculation engine only ever reads.
pub trait ProjectRepository {
    fn find_project(&self, id: &str) -> Result<Option<Project>>;
    fn projects_for_owner(&self, owner_id: &str) -> Result<Vec<Project>>;
    fn all_projects(&self) -> Result<Vec<Project>>;
    /// Inserts or replaces the whole record.
    fn save_project(&self, project: &Project) -> Result<()>;
    fn delete_project(&self, id: &str) -> Result<bool>;
    fn project_number_taken(&self, owner_id: &str, number: &str) -> Result<bool>;
}

/// Resolves a user identifier to the name shown on the leaderboard.
pub trait UserDirectory {
    fn display_name(&self, user_id: &str) -> Result<Option<String>>;
}
