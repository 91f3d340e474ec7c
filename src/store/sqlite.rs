use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::accounts::{Permission, User};
use crate::project::Project;
use crate::store::migrations::BASE_MIGRATION;
use crate::store::{ProjectRepository, UserDirectory};

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed opening database: {}", path.display()))?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(BASE_MIGRATION)?;
        Ok(())
    }

    pub fn insert_user(&self, user: &User) -> Result<()> {
        self.conn.execute(
            r#"
INSERT INTO users(id, name, email, password_hash, permission, created_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?6)
"#,
            params![
                user.id,
                user.name,
                user.email,
                user.password_hash,
                user.permission.as_i64(),
                user.created_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    pub fn find_user(&self, id: &str) -> Result<Option<User>> {
        self.query_user("WHERE id = ?1", id)
    }

    /// Names are not unique; the earliest registration wins.
    pub fn find_user_by_name(&self, name: &str) -> Result<Option<User>> {
        self.query_user("WHERE name = ?1 ORDER BY created_at ASC", name)
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.query_user("WHERE email = ?1", email)
    }

    fn query_user(&self, clause: &str, arg: &str) -> Result<Option<User>> {
        let sql = format!(
            "SELECT id, name, email, password_hash, permission, created_at FROM users {clause} LIMIT 1"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let user = stmt.query_row(params![arg], row_to_user).optional()?;
        Ok(user)
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let mut stmt = self.conn.prepare(
            r#"
SELECT id, name, email, password_hash, permission, created_at
FROM users
ORDER BY created_at ASC
"#,
        )?;
        let users = stmt
            .query_map([], row_to_user)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }

    pub fn update_password_hash(&self, user_id: &str, password_hash: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE users SET password_hash = ?1 WHERE id = ?2",
            params![password_hash, user_id],
        )?;
        Ok(())
    }

    pub fn update_email(&self, user_id: &str, email: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE users SET email = ?1 WHERE id = ?2",
            params![email, user_id],
        )?;
        Ok(())
    }

    pub fn update_permission(&self, user_id: &str, permission: Permission) -> Result<()> {
        self.conn.execute(
            "UPDATE users SET permission = ?1 WHERE id = ?2",
            params![permission.as_i64(), user_id],
        )?;
        Ok(())
    }

    /// Removes the user together with their projects and sessions.
    pub fn delete_user(&self, user_id: &str) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM projects WHERE owner_id = ?1", params![user_id])?;
        tx.execute("DELETE FROM sessions WHERE user_id = ?1", params![user_id])?;
        tx.execute("DELETE FROM users WHERE id = ?1", params![user_id])?;
        tx.commit()?;
        Ok(())
    }

    pub fn create_session(&self, user_id: &str) -> Result<String> {
        let token = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO sessions(token, user_id, created_at) VALUES (?1, ?2, ?3)",
            params![token, user_id, Utc::now().to_rfc3339()],
        )?;
        Ok(token)
    }

    pub fn resolve_session(&self, token: &str) -> Result<Option<User>> {
        let user_id: Option<String> = self
            .conn
            .query_row(
                "SELECT user_id FROM sessions WHERE token = ?1",
                params![token],
                |row| row.get(0),
            )
            .optional()?;
        match user_id {
            Some(id) => self.find_user(&id),
            None => Ok(None),
        }
    }

    fn query_projects(&self, sql: &str, args: &[&str]) -> Result<Vec<Project>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(args.iter()), |row| {
                row.get::<_, String>(0)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.iter()
            .map(|json| serde_json::from_str(json).context("corrupt project record"))
            .collect()
    }
}

impl ProjectRepository for SqliteStore {
    fn find_project(&self, id: &str) -> Result<Option<Project>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT project_json FROM projects WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(json) => Ok(Some(
                serde_json::from_str(&json).context("corrupt project record")?,
            )),
            None => Ok(None),
        }
    }

    fn projects_for_owner(&self, owner_id: &str) -> Result<Vec<Project>> {
        self.query_projects(
            "SELECT project_json FROM projects WHERE owner_id = ?1 ORDER BY rowid ASC",
            &[owner_id],
        )
    }

    fn all_projects(&self) -> Result<Vec<Project>> {
        self.query_projects("SELECT project_json FROM projects ORDER BY rowid ASC", &[])
    }

    fn save_project(&self, project: &Project) -> Result<()> {
        self.conn.execute(
            r#"
INSERT INTO projects(id, owner_id, number, project_json, updated_at)
VALUES (?1, ?2, ?3, ?4, ?5)
ON CONFLICT(id) DO UPDATE SET
    owner_id = excluded.owner_id,
    number = excluded.number,
    project_json = excluded.project_json,
    updated_at = excluded.updated_at
"#,
            params![
                project.id,
                project.owner_id,
                project.number,
                serde_json::to_string(project)?,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    fn delete_project(&self, id: &str) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM projects WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    fn project_number_taken(&self, owner_id: &str, number: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM projects WHERE owner_id = ?1 AND number = ?2",
            params![owner_id, number],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

impl UserDirectory for SqliteStore {
    fn display_name(&self, user_id: &str) -> Result<Option<String>> {
        Ok(self.find_user(user_id)?.map(|user| user.name))
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let created_at_raw: String = row.get(5)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        permission: Permission::from_i64(row.get(4)?),
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::SqliteStore;
    use crate::accounts::{Permission, User};
    use crate::calc::formulas::average_recycling;
    use crate::calc::leaderboard::load_leaderboard;
    use crate::project::{MaterialDefaults, MaterialUpdate, NewProject, Project};
    use crate::store::{ProjectRepository, UserDirectory};

    fn user(id: &str, name: &str) -> User {
        User {
            id: id.to_string(),
            name: name.to_string(),
            email: format!("{name}@example.com"),
            password_hash: "hash".to_string(),
            permission: Permission::User,
            created_at: Utc::now(),
        }
    }

    fn project(id: &str, owner: &str, number: &str) -> Project {
        Project::create(
            id,
            owner,
            NewProject {
                name: "Warehouse".to_string(),
                number: number.to_string(),
                date: "2024-03-03".to_string(),
                ..NewProject::default()
            },
            &MaterialDefaults::default(),
        )
        .unwrap()
    }

    #[test]
    fn project_round_trips_through_json_column() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut p = project("p1", "u1", "A-1");
        p.upsert_materials(
            &[MaterialUpdate {
                material: "Concrete".to_string(),
                tonnage: Some(100.0),
                ..MaterialUpdate::default()
            }],
            &MaterialDefaults::default(),
        )
        .unwrap();
        store.save_project(&p).unwrap();

        let loaded = store.find_project("p1").unwrap().expect("project stored");
        assert_eq!(loaded, p);
        assert!(store.find_project("missing").unwrap().is_none());
    }

    #[test]
    fn unreadable_material_values_survive_storage() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut p = project("p1", "u1", "A-1");
        let updates: Vec<MaterialUpdate> = serde_json::from_value(serde_json::json!([
            { "material": "Brick", "tonnage": 10, "recycled": 60 },
            { "material": "PVC", "tonnage": 5, "recycled": "lots" }
        ]))
        .unwrap();
        p.upsert_materials(&updates, &MaterialDefaults::default())
            .unwrap();
        assert_eq!(average_recycling(&p), 60.0);
        store.save_project(&p).unwrap();

        let loaded = store.find_project("p1").unwrap().expect("project stored");
        assert!(loaded.materials["PVC"].recycled.is_nan());
        assert_eq!(loaded.materials["Brick"].recycled, 60.0);
        assert_eq!(average_recycling(&loaded), 60.0);
        assert_eq!(load_leaderboard(&store).unwrap()[0].average_recyc, 60.0);
    }

    #[test]
    fn save_replaces_existing_record() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut p = project("p1", "u1", "A-1");
        store.save_project(&p).unwrap();
        p.name = "Renamed".to_string();
        store.save_project(&p).unwrap();
        assert_eq!(store.all_projects().unwrap().len(), 1);
        assert_eq!(store.find_project("p1").unwrap().unwrap().name, "Renamed");
    }

    #[test]
    fn project_numbers_are_scoped_per_owner() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.save_project(&project("p1", "u1", "A-1")).unwrap();
        assert!(store.project_number_taken("u1", "A-1").unwrap());
        assert!(!store.project_number_taken("u2", "A-1").unwrap());
        assert_eq!(store.projects_for_owner("u1").unwrap().len(), 1);
        assert!(store.projects_for_owner("u2").unwrap().is_empty());
    }

    #[test]
    fn deleting_user_cascades_to_projects_and_sessions() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_user(&user("u1", "alice")).unwrap();
        store.save_project(&project("p1", "u1", "A-1")).unwrap();
        let token = store.create_session("u1").unwrap();
        assert_eq!(
            store.resolve_session(&token).unwrap().map(|u| u.name),
            Some("alice".to_string())
        );

        store.delete_user("u1").unwrap();
        assert!(store.find_user("u1").unwrap().is_none());
        assert!(store.all_projects().unwrap().is_empty());
        assert!(store.resolve_session(&token).unwrap().is_none());
    }

    #[test]
    fn directory_resolves_names() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_user(&user("u1", "alice")).unwrap();
        assert_eq!(
            store.display_name("u1").unwrap(),
            Some("alice".to_string())
        );
        assert_eq!(store.display_name("nobody").unwrap(), None);
    }

    #[test]
    fn delete_project_reports_whether_anything_was_removed() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.save_project(&project("p1", "u1", "A-1")).unwrap();
        assert!(store.delete_project("p1").unwrap());
        assert!(!store.delete_project("p1").unwrap());
    }
}
