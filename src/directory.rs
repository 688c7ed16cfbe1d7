//! Lookup interface for the identity and release stores.
//!
//! Converters resolve one token at a time through these methods. The batch
//! variants default to a loop so an implementation backed by a real store can
//! batch later without changing the pipeline's contract.

use crate::context::{Environment, Project, Release, Team, User};

pub trait Directory {
    /// Look a user up by username.
    fn find_user(&self, username: &str) -> Option<User>;

    /// Look a team up by slug, restricted to teams with access to any of the
    /// given projects.
    fn find_team(&self, slug: &str, projects: &[Project]) -> Option<Team>;

    /// The most recent release for the given projects and environments.
    fn latest_release(&self, projects: &[Project], environments: &[Environment])
    -> Option<Release>;

    fn find_users(&self, usernames: &[String]) -> Vec<Option<User>> {
        usernames
            .iter()
            .map(|username| self.find_user(username))
            .collect()
    }
}

/// Vec-backed directory used by tests and the diagnostic CLI.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    users: Vec<User>,
    teams: Vec<Team>,
    /// (team id, project id) access links.
    team_projects: Vec<(u64, u64)>,
    /// Releases ordered oldest to newest.
    releases: Vec<Release>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&mut self, id: u64, username: &str) {
        self.users.push(User {
            id,
            username: username.to_string(),
        });
    }

    pub fn add_team(&mut self, id: u64, slug: &str, project_ids: &[u64]) {
        self.teams.push(Team {
            id,
            slug: slug.to_string(),
        });
        for project_id in project_ids {
            self.team_projects.push((id, *project_id));
        }
    }

    pub fn add_release(&mut self, version: &str) {
        self.releases.push(Release {
            version: version.to_string(),
        });
    }

    /// Small fixture used by the CLI's `--convert` mode.
    pub fn sample() -> Self {
        let mut directory = InMemoryDirectory::new();
        directory.add_user(1, "alice");
        directory.add_user(2, "bob");
        directory.add_team(10, "backend", &[1]);
        directory.add_release("1.0.0");
        directory.add_release("1.1.0");
        directory
    }
}

impl Directory for InMemoryDirectory {
    fn find_user(&self, username: &str) -> Option<User> {
        self.users
            .iter()
            .find(|user| user.username == username)
            .cloned()
    }

    fn find_team(&self, slug: &str, projects: &[Project]) -> Option<Team> {
        self.teams
            .iter()
            .find(|team| {
                team.slug == slug
                    && self.team_projects.iter().any(|(team_id, project_id)| {
                        *team_id == team.id && projects.iter().any(|p| p.id == *project_id)
                    })
            })
            .cloned()
    }

    fn latest_release(
        &self,
        _projects: &[Project],
        _environments: &[Environment],
    ) -> Option<Release> {
        self.releases.last().cloned()
    }
}
