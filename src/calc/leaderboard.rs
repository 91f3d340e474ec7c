use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::calc::formulas::{average_recycling, total_co2_reduction};
use crate::calc::sanitize::sanitize;
use crate::project::Project;
use crate::store::{ProjectRepository, UserDirectory};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub total_reduction: f64,
    pub average_recyc: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserTally {
    pub total_reduction: f64,
    pub total_recyc: f64,
    pub project_count: u32,
}

impl UserTally {
    pub fn add_project(&mut self, project: &Project) {
        self.total_reduction += total_co2_reduction(project);
        self.total_recyc += average_recycling(project);
        self.project_count += 1;
    }

    pub fn average_recyc(&self) -> f64 {
        if self.project_count == 0 {
            return 0.0;
        }
        sanitize(self.total_recyc / f64::from(self.project_count))
    }
}

/// Groups per-project reduction and recycling figures by owner.
pub fn tally_projects(projects: &[Project]) -> BTreeMap<String, UserTally> {
    let mut tallies: BTreeMap<String, UserTally> = BTreeMap::new();
    for project in projects {
        tallies
            .entry(project.owner_id.clone())
            .or_default()
            .add_project(project);
    }
    tallies
}

/// Orders entries by total reduction, highest first. Ties keep their order.
pub fn rank_entries(entries: &mut [LeaderboardEntry]) {
    entries.sort_by(|a, b| b.total_reduction.total_cmp(&a.total_reduction));
}

/// Ranks every owner of the given projects. Owners the directory cannot
/// resolve are listed under their identifier. Any lookup failure fails the
/// whole ranking.
pub fn build_leaderboard(
    projects: &[Project],
    users: &dyn UserDirectory,
) -> Result<Vec<LeaderboardEntry>> {
    let tallies = tally_projects(projects);
    let mut entries = Vec::with_capacity(tallies.len());
    for (owner_id, tally) in tallies {
        let display = users.display_name(&owner_id)?.unwrap_or(owner_id);
        entries.push(LeaderboardEntry {
            user_id: display,
            total_reduction: sanitize(tally.total_reduction),
            average_recyc: tally.average_recyc(),
        });
    }
    rank_entries(&mut entries);
    Ok(entries)
}

pub fn load_leaderboard<S>(store: &S) -> Result<Vec<LeaderboardEntry>>
where
    S: ProjectRepository + UserDirectory,
{
    let projects = store.all_projects()?;
    build_leaderboard(&projects, store)
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use anyhow::{anyhow, Result};

    use super::*;
    use crate::project::MaterialRecord;
    use crate::store::UserDirectory;

    struct Names(HashMap<String, String>);

    impl UserDirectory for Names {
        fn display_name(&self, user_id: &str) -> Result<Option<String>> {
            Ok(self.0.get(user_id).cloned())
        }
    }

    struct Unreachable;

    impl UserDirectory for Unreachable {
        fn display_name(&self, _user_id: &str) -> Result<Option<String>> {
            Err(anyhow!("user collection unavailable"))
        }
    }

    fn project(owner: &str, tonnage: f64, recycled: f64) -> Project {
        let mut materials = BTreeMap::new();
        materials.insert(
            "Concrete".to_string(),
            MaterialRecord {
                tonnage,
                recycled,
                truck: 10.0,
                plant_co2_rate: 500.0,
                final_product_co2_rate: 750.0,
                landfill_dist: 40.0,
                plant_dist: 30.0,
            },
        );
        Project {
            id: format!("{owner}-{tonnage}"),
            owner_id: owner.to_string(),
            name: "n".to_string(),
            number: "1".to_string(),
            date: "d".to_string(),
            client_name: "-".to_string(),
            revision_number: "-".to_string(),
            transport_co2_rate: 0.22,
            materials,
        }
    }

    fn names() -> Names {
        Names(HashMap::from([
            ("u1".to_string(), "alice".to_string()),
            ("u2".to_string(), "bob".to_string()),
        ]))
    }

    #[test]
    fn ranks_by_total_reduction_descending() {
        let projects = vec![
            project("u1", 100.0, 50.0),
            project("u2", 100.0, 50.0),
            project("u2", 100.0, 50.0),
        ];
        let board = build_leaderboard(&projects, &names()).unwrap();
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].user_id, "bob");
        assert_eq!(board[0].total_reduction, 24.84);
        assert_eq!(board[1].user_id, "alice");
        assert_eq!(board[1].total_reduction, 12.42);
    }

    #[test]
    fn averages_project_recycling_per_user() {
        let projects = vec![project("u1", 10.0, 40.0), project("u1", 10.0, 80.0)];
        let board = build_leaderboard(&projects, &names()).unwrap();
        assert_eq!(board[0].average_recyc, 60.0);
    }

    #[test]
    fn unknown_user_falls_back_to_identifier() {
        let board = build_leaderboard(&[project("ghost", 1.0, 10.0)], &names()).unwrap();
        assert_eq!(board[0].user_id, "ghost");
    }

    #[test]
    fn lookup_failure_fails_the_whole_ranking() {
        assert!(build_leaderboard(&[project("u1", 1.0, 10.0)], &Unreachable).is_err());
    }

    #[test]
    fn empty_tally_has_zero_average() {
        assert_eq!(UserTally::default().average_recyc(), 0.0);
        assert!(build_leaderboard(&[], &names()).unwrap().is_empty());
    }

    #[test]
    fn ranking_keeps_ties_stable() {
        let mut entries = vec![
            LeaderboardEntry {
                user_id: "a".to_string(),
                total_reduction: 10.0,
                average_recyc: 0.0,
            },
            LeaderboardEntry {
                user_id: "b".to_string(),
                total_reduction: 20.0,
                average_recyc: 0.0,
            },
            LeaderboardEntry {
                user_id: "c".to_string(),
                total_reduction: 10.0,
                average_recyc: 0.0,
            },
        ];
        rank_entries(&mut entries);
        let order: Vec<_> = entries.iter().map(|e| e.user_id.as_str()).collect();
        assert_eq!(order, ["b", "a", "c"]);
    }
}
