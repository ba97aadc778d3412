//! Team and pipe-record directory
//!
//! The persistent side of a pipe: which team it belongs to and which node
//! holds it in memory. The relay reads from here and never writes.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{Error, Result};

/// A tenant owning pipes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    pub id: u64,
    pub name: String,
}

/// Persisted routing metadata for a pipe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipeRecord {
    pub id: String,
    /// Base URL of the node holding the live pipe
    pub url: String,
    pub team_id: u64,
}

/// Team lookup by name
#[async_trait]
pub trait TeamDirectory: Send + Sync {
    /// Find a team. `Ok(None)` means the team does not exist; `Err` means
    /// the backend could not answer.
    async fn find_team(&self, name: &str) -> Result<Option<Team>>;
}

/// Team-scoped pipe-record lookup
#[async_trait]
pub trait PipeDirectory: Send + Sync {
    /// Fetch the record for `pipe_id`. A missing record is an error like any
    /// other backend failure.
    async fn get_pipe(&self, team: &Team, pipe_id: &str) -> Result<PipeRecord>;
}

#[derive(Default)]
struct Tables {
    teams: HashMap<String, Team>,
    pipes: HashMap<(u64, String), PipeRecord>,
    next_team_id: u64,
}

/// In-process directory used by single-binary deployments and tests
#[derive(Default)]
pub struct MemoryDirectory {
    tables: RwLock<Tables>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a directory pre-populated with `teams`
    pub fn with_teams<I, S>(teams: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let directory = Self::new();
        for team in teams {
            directory.add_team(team.as_ref());
        }
        directory
    }

    /// Add a team, returning the existing one if the name is taken
    pub fn add_team(&self, name: &str) -> Team {
        let mut tables = self.tables.write();
        if let Some(team) = tables.teams.get(name) {
            return team.clone();
        }

        tables.next_team_id += 1;
        let team = Team {
            id: tables.next_team_id,
            name: name.to_string(),
        };
        tables.teams.insert(name.to_string(), team.clone());
        team
    }

    /// Record that `pipe_id` of `team_name` lives on the node at `url`
    pub fn put_pipe(&self, team_name: &str, pipe_id: &str, url: &str) -> Result<PipeRecord> {
        let mut tables = self.tables.write();
        let team_id = tables
            .teams
            .get(team_name)
            .map(|team| team.id)
            .ok_or_else(|| Error::TeamNotFound {
                team: team_name.to_string(),
            })?;

        let record = PipeRecord {
            id: pipe_id.to_string(),
            url: url.to_string(),
            team_id,
        };
        tables
            .pipes
            .insert((team_id, pipe_id.to_string()), record.clone());
        Ok(record)
    }

    /// Forget a pipe record; unknown records are ignored
    pub fn remove_pipe(&self, team_name: &str, pipe_id: &str) {
        let mut tables = self.tables.write();
        if let Some(team_id) = tables.teams.get(team_name).map(|team| team.id) {
            tables.pipes.remove(&(team_id, pipe_id.to_string()));
        }
    }

    pub fn team_count(&self) -> usize {
        self.tables.read().teams.len()
    }

    pub fn pipe_count(&self) -> usize {
        self.tables.read().pipes.len()
    }
}

#[async_trait]
impl TeamDirectory for MemoryDirectory {
    async fn find_team(&self, name: &str) -> Result<Option<Team>> {
        Ok(self.tables.read().teams.get(name).cloned())
    }
}

#[async_trait]
impl PipeDirectory for MemoryDirectory {
    async fn get_pipe(&self, team: &Team, pipe_id: &str) -> Result<PipeRecord> {
        self.tables
            .read()
            .pipes
            .get(&(team.id, pipe_id.to_string()))
            .cloned()
            .ok_or_else(|| Error::pipe_record_not_found(&team.name, pipe_id))
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[tokio::test]
    async fn test_find_team() {
        let directory = MemoryDirectory::with_teams(["main", "ci"]);

        let team = directory.find_team("main").await.unwrap().unwrap();
        assert_eq!(team.name, "main");
        assert!(directory.find_team("nope").await.unwrap().is_none());
        assert_eq!(directory.team_count(), 2);
    }

    #[test]
    fn test_add_team_is_idempotent() {
        let directory = MemoryDirectory::new();
        let first = directory.add_team("main");
        let second = directory.add_team("main");

        assert_eq!(first, second);
        assert_eq!(directory.team_count(), 1);
    }

    #[tokio::test]
    async fn test_pipe_records_are_team_scoped() {
        let directory = MemoryDirectory::with_teams(["main", "other"]);
        directory.put_pipe("main", "p1", "http://node-a:8080").unwrap();

        let main = directory.find_team("main").await.unwrap().unwrap();
        let other = directory.find_team("other").await.unwrap().unwrap();

        let record = directory.get_pipe(&main, "p1").await.unwrap();
        assert_eq!(record.url, "http://node-a:8080");
        assert_eq!(record.team_id, main.id);

        let err = directory.get_pipe(&other, "p1").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::PipeRecordNotFound);
    }

    #[test]
    fn test_put_pipe_requires_team() {
        let directory = MemoryDirectory::new();
        let err = directory.put_pipe("ghost", "p1", "http://x").unwrap_err();
        assert_eq!(err.code(), ErrorCode::TeamNotFound);
    }

    #[tokio::test]
    async fn test_remove_pipe() {
        let directory = MemoryDirectory::with_teams(["main"]);
        directory.put_pipe("main", "p1", "http://x").unwrap();
        directory.remove_pipe("main", "p1");
        directory.remove_pipe("main", "p1");
        directory.remove_pipe("ghost", "p1");

        assert_eq!(directory.pipe_count(), 0);
        let main = directory.find_team("main").await.unwrap().unwrap();
        assert!(directory.get_pipe(&main, "p1").await.is_err());
    }
}
