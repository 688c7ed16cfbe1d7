//! Grouping-levels overview for one issue.
//!
//! An event carries one fingerprint hash per grouping granularity ("level");
//! the issue itself is keyed by the primary hash. This module computes how
//! many levels exist and which one is currently applied, from a single
//! aggregation over the issue's events.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LevelsError {
    #[error("This issue has no events.")]
    NoEvents,

    #[error(
        "The issue can only contain one fingerprint. It needs to be fully unmerged before grouping levels can be shown."
    )]
    MergedIssues,

    #[error("event store query failed: {0}")]
    Store(String),
}

impl LevelsError {
    /// Domain-state errors surface as 403; store failures as 500.
    pub fn status_code(&self) -> u16 {
        match self {
            LevelsError::NoEvents | LevelsError::MergedIssues => 403,
            LevelsError::Store(_) => 500,
        }
    }
}

/// Hashes of one event: its primary fingerprint plus the per-level
/// hierarchical hashes, ordered coarsest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventHashes {
    pub primary_hash: String,
    pub hierarchical_hashes: Vec<String>,
}

/// Analytical event store, reduced to the one aggregation input this module
/// needs. Implementations map their own failures into [`LevelsError::Store`].
pub trait EventStore {
    fn issue_event_hashes(&self, issue_id: u64) -> Result<Vec<EventHashes>, LevelsError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelsOverview {
    /// 0-indexed level the issue is currently grouped by.
    pub current_level: usize,
    pub only_primary_hash: String,
    pub num_levels: usize,
}

/// Compute the levels overview for one issue.
///
/// `materialized_hashes` are the hashes currently bound to the issue in the
/// relational store. Per event, the current level is the highest 1-based
/// position of a materialized hash within the hierarchical list, or 1 if none
/// is materialized; the overview takes the maximum over events, minus one.
///
/// Fails with [`LevelsError::NoEvents`] when the issue has no events and with
/// [`LevelsError::MergedIssues`] when its events span more than one primary
/// hash, meaning it must be unmerged before levels are meaningful.
pub fn get_levels_overview(
    store: &dyn EventStore,
    issue_id: u64,
    materialized_hashes: &HashSet<String>,
) -> Result<LevelsOverview, LevelsError> {
    let events = store.issue_event_hashes(issue_id)?;

    let mut groups: HashMap<String, (usize, usize)> = HashMap::new();
    for event in events {
        let find_hash = event
            .hierarchical_hashes
            .iter()
            .enumerate()
            .filter(|(_, hash)| materialized_hashes.contains(*hash))
            .map(|(index, _)| index + 1)
            .max()
            .unwrap_or(1);

        let entry = groups.entry(event.primary_hash).or_insert((0, 0));
        entry.0 = entry.0.max(event.hierarchical_hashes.len());
        entry.1 = entry.1.max(find_hash);
    }

    if groups.is_empty() {
        return Err(LevelsError::NoEvents);
    }
    if groups.len() > 1 {
        return Err(LevelsError::MergedIssues);
    }

    let (primary_hash, (num_levels, current)) = groups
        .into_iter()
        .next()
        .ok_or(LevelsError::NoEvents)?;

    Ok(LevelsOverview {
        // Clamp in case a materialized hash sits past the shortest event's
        // hierarchy.
        current_level: (current - 1).min(num_levels.saturating_sub(1)),
        only_primary_hash: primary_hash,
        num_levels,
    })
}

/// One grouping level as returned to clients. Ids are array indices in the
/// underlying store but must be treated as opaque strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Level {
    pub id: String,
    #[serde(rename = "isCurrent", skip_serializing_if = "std::ops::Not::not")]
    pub is_current: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelsResponse {
    pub levels: Vec<Level>,
}

/// List the available levels in order, marking the currently applied one.
pub fn list_levels(
    store: &dyn EventStore,
    issue_id: u64,
    materialized_hashes: &HashSet<String>,
) -> Result<LevelsResponse, LevelsError> {
    let overview = get_levels_overview(store, issue_id, materialized_hashes)?;

    let levels = (0..overview.num_levels)
        .map(|index| Level {
            id: index.to_string(),
            is_current: index == overview.current_level,
        })
        .collect();

    Ok(LevelsResponse { levels })
}
