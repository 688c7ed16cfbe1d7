//! Scope types shared by the query pipeline: the projects, environments and
//! acting user a search runs against, plus the resolved forms that value
//! conversion produces.

use serde::Serialize;

/// A project the search is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: u64,
    pub slug: String,
    pub organization_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    pub id: u64,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: u64,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub id: u64,
    pub name: String,
}

/// A release known to the release history of the searched projects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub version: String,
}

/// An assignable actor: either an individual user or a whole team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorRef {
    User(u64),
    Team(u64),
}

/// Workflow status of an issue, as stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum GroupStatus {
    Unresolved = 0,
    Resolved = 1,
    Ignored = 2,
}

impl GroupStatus {
    /// Query labels accepted for `status:` clauses, paired with the stored
    /// status they map to. `muted` is a legacy spelling of `ignored`.
    pub fn query_choices() -> &'static [(&'static str, GroupStatus)] {
        &[
            ("unresolved", GroupStatus::Unresolved),
            ("resolved", GroupStatus::Resolved),
            ("ignored", GroupStatus::Ignored),
            ("muted", GroupStatus::Ignored),
        ]
    }

    pub fn from_query_label(label: &str) -> Option<GroupStatus> {
        GroupStatus::query_choices()
            .iter()
            .find(|(name, _)| *name == label)
            .map(|(_, status)| *status)
    }

    /// Accepts a value already in stored form, e.g. from an `is:` clause that
    /// was translated before conversion runs.
    pub fn from_stored(value: u8) -> Option<GroupStatus> {
        match value {
            0 => Some(GroupStatus::Unresolved),
            1 => Some(GroupStatus::Resolved),
            2 => Some(GroupStatus::Ignored),
            _ => None,
        }
    }
}

/// A query value after conversion to its stored representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedValue {
    Actor(ActorRef),
    /// Sentinel for `assigned:none` style clauses matching unassigned issues.
    NoActor,
    User(u64),
    Status(GroupStatus),
    Release(String),
}
