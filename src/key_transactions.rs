//! Key-transaction management.
//!
//! A key transaction is a performance transaction name flagged as
//! high-priority, either by an individual user (the legacy per-user form) or
//! by a team. Writes are idempotent: re-flagging an already flagged
//! transaction is reported as unchanged rather than an error.

use crate::context::{Project, Team, User};
use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyTransactionError {
    #[error("A transaction name is required")]
    MissingTransaction,

    #[error("Team does not have access to project")]
    TeamWithoutAccess,

    /// A concurrent writer created the same rows first. 409-equivalent.
    #[error("Key transaction already exists")]
    Conflict,
}

/// A per-user ("legacy") key transaction flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyTransaction {
    pub organization_id: u64,
    pub owner_id: u64,
    pub project_id: u64,
    pub transaction: String,
}

/// A team-scoped key transaction flag, tied to a project-team link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamKeyTransaction {
    pub organization_id: u64,
    pub project_id: u64,
    pub team_id: u64,
    pub transaction: String,
}

/// Storage for key-transaction flags and project-team access links.
pub trait KeyTransactionStore {
    fn legacy_count(&self, organization_id: u64, owner_id: u64, project_id: u64) -> usize;

    fn is_key(
        &self,
        organization_id: u64,
        owner_id: u64,
        project_id: u64,
        transaction: &str,
    ) -> bool;

    /// Returns false when the flag already exists.
    fn insert_user_key(&mut self, entry: KeyTransaction) -> bool;

    /// Returns true when a flag was actually removed.
    fn remove_user_key(
        &mut self,
        organization_id: u64,
        owner_id: u64,
        project_id: u64,
        transaction: &str,
    ) -> bool;

    /// Ids of teams with access to the project.
    fn teams_with_project_access(&self, organization_id: u64, project_id: u64) -> Vec<u64>;

    /// Flags for one transaction across the given teams, ordered by team id.
    fn team_keys(
        &self,
        organization_id: u64,
        project_id: u64,
        team_ids: &[u64],
        transaction: &str,
    ) -> Vec<TeamKeyTransaction>;

    /// Returns the number of entries actually inserted.
    fn insert_team_keys(&mut self, entries: Vec<TeamKeyTransaction>) -> usize;

    fn remove_team_keys(
        &mut self,
        organization_id: u64,
        project_id: u64,
        team_ids: &[u64],
        transaction: &str,
    ) -> usize;

    /// All flags of the given teams, ordered by (transaction, project id).
    fn team_key_transactions(&self, team_ids: &[u64]) -> Vec<TeamKeyTransaction>;
}

/// Outcome of an idempotent write, mapping to 201 vs. 204.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    Unchanged,
}

/// How many legacy key transactions a user still has for a project. A user
/// with no rows counts as 0, not as an error.
pub fn legacy_key_transaction_count(
    store: &dyn KeyTransactionStore,
    organization_id: u64,
    user: &User,
    project: &Project,
) -> usize {
    store.legacy_count(organization_id, user.id, project.id)
}

pub fn is_key_transaction(
    store: &dyn KeyTransactionStore,
    organization_id: u64,
    user: &User,
    project: &Project,
    transaction: &str,
) -> bool {
    store.is_key(organization_id, user.id, project.id, transaction)
}

pub fn mark_key_transaction(
    store: &mut dyn KeyTransactionStore,
    organization_id: u64,
    user: &User,
    project: &Project,
    transaction: &str,
) -> Result<WriteOutcome, KeyTransactionError> {
    let transaction = require_transaction(transaction)?;
    if store.is_key(organization_id, user.id, project.id, transaction) {
        return Ok(WriteOutcome::Unchanged);
    }
    let inserted = store.insert_user_key(KeyTransaction {
        organization_id,
        owner_id: user.id,
        project_id: project.id,
        transaction: transaction.to_string(),
    });
    // A concurrent writer may have gotten there first; that is still success.
    Ok(if inserted {
        WriteOutcome::Created
    } else {
        WriteOutcome::Unchanged
    })
}

pub fn unmark_key_transaction(
    store: &mut dyn KeyTransactionStore,
    organization_id: u64,
    user: &User,
    project: &Project,
    transaction: &str,
) -> Result<WriteOutcome, KeyTransactionError> {
    let transaction = require_transaction(transaction)?;
    store.remove_user_key(organization_id, user.id, project.id, transaction);
    // Deleting a missing flag is not an error.
    Ok(WriteOutcome::Unchanged)
}

/// Flags for one transaction across the teams the caller can see.
pub fn team_keys_for_transaction(
    store: &dyn KeyTransactionStore,
    organization_id: u64,
    project: &Project,
    teams: &[Team],
    transaction: &str,
) -> Result<Vec<TeamKeyTransaction>, KeyTransactionError> {
    let transaction = require_transaction(transaction)?;
    let team_ids: Vec<u64> = teams.iter().map(|team| team.id).collect();
    Ok(store.team_keys(organization_id, project.id, &team_ids, transaction))
}

pub fn mark_team_key_transaction(
    store: &mut dyn KeyTransactionStore,
    organization_id: u64,
    project: &Project,
    team_ids: &[u64],
    transaction: &str,
) -> Result<WriteOutcome, KeyTransactionError> {
    let transaction = require_transaction(transaction)?;

    let accessible: HashSet<u64> = store
        .teams_with_project_access(organization_id, project.id)
        .into_iter()
        .collect();
    if team_ids.iter().any(|id| !accessible.contains(id)) {
        return Err(KeyTransactionError::TeamWithoutAccess);
    }

    let keyed: HashSet<u64> = store
        .team_keys(organization_id, project.id, team_ids, transaction)
        .into_iter()
        .map(|entry| entry.team_id)
        .collect();
    let unkeyed: Vec<u64> = team_ids
        .iter()
        .copied()
        .filter(|id| !keyed.contains(id))
        .collect();
    if unkeyed.is_empty() {
        return Ok(WriteOutcome::Unchanged);
    }

    let entries: Vec<TeamKeyTransaction> = unkeyed
        .into_iter()
        .map(|team_id| TeamKeyTransaction {
            organization_id,
            project_id: project.id,
            team_id,
            transaction: transaction.to_string(),
        })
        .collect();
    if store.insert_team_keys(entries) == 0 {
        // Every row lost the race to a concurrent writer.
        return Err(KeyTransactionError::Conflict);
    }
    Ok(WriteOutcome::Created)
}

pub fn unmark_team_key_transaction(
    store: &mut dyn KeyTransactionStore,
    organization_id: u64,
    project: &Project,
    team_ids: &[u64],
    transaction: &str,
) -> Result<WriteOutcome, KeyTransactionError> {
    let transaction = require_transaction(transaction)?;
    store.remove_team_keys(organization_id, project.id, team_ids, transaction);
    Ok(WriteOutcome::Unchanged)
}

/// Per-team summary: total flag count across all projects, plus the flagged
/// transactions within the projects visible to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamSummary {
    pub team: String,
    pub count: usize,
    pub keyed: Vec<KeyedTransaction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyedTransaction {
    pub project_id: String,
    pub transaction: String,
}

pub fn team_summaries(
    store: &dyn KeyTransactionStore,
    teams: &[Team],
    visible_projects: &[Project],
) -> Vec<TeamSummary> {
    let visible: HashSet<u64> = visible_projects.iter().map(|project| project.id).collect();
    let team_ids: Vec<u64> = teams.iter().map(|team| team.id).collect();
    let flags = store.team_key_transactions(&team_ids);

    teams
        .iter()
        .map(|team| {
            let mut count = 0;
            let mut keyed = Vec::new();
            for flag in flags.iter().filter(|flag| flag.team_id == team.id) {
                count += 1;
                if visible.contains(&flag.project_id) {
                    keyed.push(KeyedTransaction {
                        project_id: flag.project_id.to_string(),
                        transaction: flag.transaction.clone(),
                    });
                }
            }
            TeamSummary {
                team: team.id.to_string(),
                count,
                keyed,
            }
        })
        .collect()
}

fn require_transaction(transaction: &str) -> Result<&str, KeyTransactionError> {
    let trimmed = transaction.trim();
    if trimmed.is_empty() {
        return Err(KeyTransactionError::MissingTransaction);
    }
    Ok(trimmed)
}

/// Vec-backed store used by tests; doubles as the reference behavior for the
/// trait's ordering contracts.
#[derive(Debug, Clone, Default)]
pub struct InMemoryKeyTransactionStore {
    user_keys: Vec<KeyTransaction>,
    team_keys: Vec<TeamKeyTransaction>,
    /// (organization id, project id, team id) access links.
    project_teams: Vec<(u64, u64, u64)>,
}

impl InMemoryKeyTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn link_project_team(&mut self, organization_id: u64, project_id: u64, team_id: u64) {
        self.project_teams
            .push((organization_id, project_id, team_id));
    }
}

impl KeyTransactionStore for InMemoryKeyTransactionStore {
    fn legacy_count(&self, organization_id: u64, owner_id: u64, project_id: u64) -> usize {
        self.user_keys
            .iter()
            .filter(|entry| {
                entry.organization_id == organization_id
                    && entry.owner_id == owner_id
                    && entry.project_id == project_id
            })
            .count()
    }

    fn is_key(
        &self,
        organization_id: u64,
        owner_id: u64,
        project_id: u64,
        transaction: &str,
    ) -> bool {
        self.user_keys.iter().any(|entry| {
            entry.organization_id == organization_id
                && entry.owner_id == owner_id
                && entry.project_id == project_id
                && entry.transaction == transaction
        })
    }

    fn insert_user_key(&mut self, entry: KeyTransaction) -> bool {
        if self.user_keys.contains(&entry) {
            return false;
        }
        self.user_keys.push(entry);
        true
    }

    fn remove_user_key(
        &mut self,
        organization_id: u64,
        owner_id: u64,
        project_id: u64,
        transaction: &str,
    ) -> bool {
        let before = self.user_keys.len();
        self.user_keys.retain(|entry| {
            !(entry.organization_id == organization_id
                && entry.owner_id == owner_id
                && entry.project_id == project_id
                && entry.transaction == transaction)
        });
        self.user_keys.len() != before
    }

    fn teams_with_project_access(&self, organization_id: u64, project_id: u64) -> Vec<u64> {
        self.project_teams
            .iter()
            .filter(|(org, project, _)| *org == organization_id && *project == project_id)
            .map(|(_, _, team)| *team)
            .collect()
    }

    fn team_keys(
        &self,
        organization_id: u64,
        project_id: u64,
        team_ids: &[u64],
        transaction: &str,
    ) -> Vec<TeamKeyTransaction> {
        let mut keys: Vec<TeamKeyTransaction> = self
            .team_keys
            .iter()
            .filter(|entry| {
                entry.organization_id == organization_id
                    && entry.project_id == project_id
                    && team_ids.contains(&entry.team_id)
                    && entry.transaction == transaction
            })
            .cloned()
            .collect();
        keys.sort_by_key(|entry| entry.team_id);
        keys
    }

    fn insert_team_keys(&mut self, entries: Vec<TeamKeyTransaction>) -> usize {
        let mut inserted = 0;
        for entry in entries {
            if !self.team_keys.contains(&entry) {
                self.team_keys.push(entry);
                inserted += 1;
            }
        }
        inserted
    }

    fn remove_team_keys(
        &mut self,
        organization_id: u64,
        project_id: u64,
        team_ids: &[u64],
        transaction: &str,
    ) -> usize {
        let before = self.team_keys.len();
        self.team_keys.retain(|entry| {
            !(entry.organization_id == organization_id
                && entry.project_id == project_id
                && team_ids.contains(&entry.team_id)
                && entry.transaction == transaction)
        });
        before - self.team_keys.len()
    }

    fn team_key_transactions(&self, team_ids: &[u64]) -> Vec<TeamKeyTransaction> {
        let mut keys: Vec<TeamKeyTransaction> = self
            .team_keys
            .iter()
            .filter(|entry| team_ids.contains(&entry.team_id))
            .cloned()
            .collect();
        keys.sort_by(|a, b| {
            a.transaction
                .cmp(&b.transaction)
                .then_with(|| a.project_id.cmp(&b.project_id))
        });
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(id: u64) -> Project {
        Project {
            id,
            slug: format!("project-{id}"),
            organization_id: 1,
        }
    }

    fn user(id: u64) -> User {
        User {
            id,
            username: format!("user-{id}"),
        }
    }

    #[test]
    fn legacy_count_defaults_to_zero() {
        let store = InMemoryKeyTransactionStore::new();
        assert_eq!(
            legacy_key_transaction_count(&store, 1, &user(1), &project(1)),
            0
        );
    }

    #[test]
    fn marking_is_idempotent() {
        let mut store = InMemoryKeyTransactionStore::new();
        let outcome =
            mark_key_transaction(&mut store, 1, &user(1), &project(1), "/checkout").unwrap();
        assert_eq!(outcome, WriteOutcome::Created);
        assert!(is_key_transaction(&store, 1, &user(1), &project(1), "/checkout"));

        let outcome =
            mark_key_transaction(&mut store, 1, &user(1), &project(1), "/checkout").unwrap();
        assert_eq!(outcome, WriteOutcome::Unchanged);
        assert_eq!(
            legacy_key_transaction_count(&store, 1, &user(1), &project(1)),
            1
        );
    }

    #[test]
    fn unmarking_a_missing_flag_is_not_an_error() {
        let mut store = InMemoryKeyTransactionStore::new();
        let outcome =
            unmark_key_transaction(&mut store, 1, &user(1), &project(1), "/checkout").unwrap();
        assert_eq!(outcome, WriteOutcome::Unchanged);
    }

    #[test]
    fn empty_transaction_name_is_rejected() {
        let mut store = InMemoryKeyTransactionStore::new();
        assert_eq!(
            mark_key_transaction(&mut store, 1, &user(1), &project(1), "  ").unwrap_err(),
            KeyTransactionError::MissingTransaction
        );
    }

    #[test]
    fn team_marking_requires_project_access() {
        let mut store = InMemoryKeyTransactionStore::new();
        store.link_project_team(1, 1, 10);

        assert_eq!(
            mark_team_key_transaction(&mut store, 1, &project(1), &[10, 11], "/checkout")
                .unwrap_err(),
            KeyTransactionError::TeamWithoutAccess
        );

        let outcome =
            mark_team_key_transaction(&mut store, 1, &project(1), &[10], "/checkout").unwrap();
        assert_eq!(outcome, WriteOutcome::Created);
    }

    #[test]
    fn team_marking_skips_already_keyed_teams() {
        let mut store = InMemoryKeyTransactionStore::new();
        store.link_project_team(1, 1, 10);
        store.link_project_team(1, 1, 11);

        mark_team_key_transaction(&mut store, 1, &project(1), &[10], "/checkout").unwrap();
        let outcome =
            mark_team_key_transaction(&mut store, 1, &project(1), &[10, 11], "/checkout").unwrap();
        assert_eq!(outcome, WriteOutcome::Created);

        let outcome =
            mark_team_key_transaction(&mut store, 1, &project(1), &[10, 11], "/checkout").unwrap();
        assert_eq!(outcome, WriteOutcome::Unchanged);

        let teams = [Team {
            id: 10,
            slug: "backend".to_string(),
        }];
        let keys = team_keys_for_transaction(&store, 1, &project(1), &teams, "/checkout").unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].team_id, 10);
    }

    #[test]
    fn team_unmark_removes_all_requested_teams() {
        let mut store = InMemoryKeyTransactionStore::new();
        store.link_project_team(1, 1, 10);
        store.link_project_team(1, 1, 11);
        mark_team_key_transaction(&mut store, 1, &project(1), &[10, 11], "/checkout").unwrap();

        unmark_team_key_transaction(&mut store, 1, &project(1), &[10], "/checkout").unwrap();
        let keys = store.team_keys(1, 1, &[10, 11], "/checkout");
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].team_id, 11);
    }

    #[test]
    fn summaries_count_everything_but_list_only_visible_projects() {
        let mut store = InMemoryKeyTransactionStore::new();
        store.link_project_team(1, 1, 10);
        store.link_project_team(1, 2, 10);
        mark_team_key_transaction(&mut store, 1, &project(1), &[10], "/checkout").unwrap();
        mark_team_key_transaction(&mut store, 1, &project(2), &[10], "/search").unwrap();

        let teams = [Team {
            id: 10,
            slug: "backend".to_string(),
        }];
        let summaries = team_summaries(&store, &teams, &[project(1)]);
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].team, "10");
        assert_eq!(summaries[0].count, 2);
        assert_eq!(
            summaries[0].keyed,
            vec![KeyedTransaction {
                project_id: "1".to_string(),
                transaction: "/checkout".to_string(),
            }]
        );
    }
}
