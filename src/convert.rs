//! Value conversion for parsed issue-search filters.
//!
//! Takes the clause sequence from [`crate::query`] and rewrites the values of
//! registered keys into their stored representation: actor references, user
//! ids, release versions, status enums. Keys without a registered converter
//! pass through untouched. Read-only; conversion issues lookups but never
//! writes.

use crate::context::{ActorRef, Environment, GroupStatus, Project, ResolvedValue, User};
use crate::directory::Directory;
use crate::query::{Operator, QueryClause, QueryError, SearchFilter, SearchValue};
use std::collections::HashMap;
use std::sync::LazyLock;

/// Scope a conversion runs against.
pub struct ConversionContext<'a> {
    pub projects: &'a [Project],
    pub user: &'a User,
    pub environments: &'a [Environment],
    pub directory: &'a dyn Directory,
}

type ConverterFn =
    fn(&[String], &ConversionContext<'_>) -> Result<Vec<ResolvedValue>, QueryError>;

/// Converter registry keyed by canonical search key. Built once; keys not
/// present here are passed through conversion unchanged.
static VALUE_CONVERTERS: LazyLock<HashMap<&'static str, ConverterFn>> = LazyLock::new(|| {
    let mut converters: HashMap<&'static str, ConverterFn> = HashMap::new();
    converters.insert("assigned_to", convert_actor_or_none);
    converters.insert("assigned_or_suggested", convert_actor_or_none);
    converters.insert("bookmarked_by", convert_user);
    converters.insert("subscribed_by", convert_user);
    converters.insert("first_release", convert_release);
    converters.insert("release", convert_release);
    converters.insert("status", convert_status);
    converters
});

/// Convert the values of a filter sequence, returning a new sequence.
///
/// Clause order is preserved. Equality operators on converted filters are
/// rewritten to list membership since converters always return a list.
/// Aggregate filters are invalid outside discover search and are rejected
/// here.
pub fn convert_query_values(
    clauses: Vec<QueryClause>,
    ctx: &ConversionContext<'_>,
) -> Result<Vec<QueryClause>, QueryError> {
    clauses
        .into_iter()
        .map(|clause| convert_clause(clause, ctx))
        .collect()
}

fn convert_clause(
    clause: QueryClause,
    ctx: &ConversionContext<'_>,
) -> Result<QueryClause, QueryError> {
    match clause {
        QueryClause::Aggregate(aggregate) => Err(QueryError::AggregateNotSupported(
            aggregate.key.name().to_string(),
        )),
        QueryClause::Filter(filter) => {
            let Some(converter) = VALUE_CONVERTERS.get(filter.key.name()) else {
                return Ok(QueryClause::Filter(filter));
            };
            let converted = converter(&filter.value.raw_values(), ctx)?;
            let operator = match filter.operator {
                Operator::Eq | Operator::In => Operator::In,
                Operator::NotEq | Operator::NotIn => Operator::NotIn,
                other => other,
            };
            Ok(QueryClause::Filter(
                filter.replaced(operator, SearchValue::Resolved(converted)),
            ))
        }
    }
}

// The actor and user converters make one lookup per token. Token lists are
// short in practice; the Directory trait leaves room to batch.

fn convert_actor_or_none(
    values: &[String],
    ctx: &ConversionContext<'_>,
) -> Result<Vec<ResolvedValue>, QueryError> {
    values
        .iter()
        .map(|token| parse_actor_or_none(token, ctx))
        .collect()
}

fn parse_actor_or_none(
    token: &str,
    ctx: &ConversionContext<'_>,
) -> Result<ResolvedValue, QueryError> {
    if token == "none" {
        return Ok(ResolvedValue::NoActor);
    }
    if token == "me" {
        return Ok(ResolvedValue::Actor(ActorRef::User(ctx.user.id)));
    }
    if let Some(slug) = token.strip_prefix('#') {
        return ctx
            .directory
            .find_team(slug, ctx.projects)
            .map(|team| ResolvedValue::Actor(ActorRef::Team(team.id)))
            .ok_or_else(|| QueryError::UnresolvedActor(token.to_string()));
    }
    ctx.directory
        .find_user(token)
        .map(|user| ResolvedValue::Actor(ActorRef::User(user.id)))
        .ok_or_else(|| QueryError::UnresolvedActor(token.to_string()))
}

fn convert_user(
    values: &[String],
    ctx: &ConversionContext<'_>,
) -> Result<Vec<ResolvedValue>, QueryError> {
    Ok(values
        .iter()
        .map(|token| {
            if token == "me" {
                return ResolvedValue::User(ctx.user.id);
            }
            // An unknown username resolves to user id 0 so the clause matches
            // nothing instead of failing the whole query.
            match ctx.directory.find_user(token) {
                Some(user) => ResolvedValue::User(user.id),
                None => ResolvedValue::User(0),
            }
        })
        .collect())
}

fn convert_release(
    values: &[String],
    ctx: &ConversionContext<'_>,
) -> Result<Vec<ResolvedValue>, QueryError> {
    values
        .iter()
        .map(|token| {
            if token == "latest" {
                ctx.directory
                    .latest_release(ctx.projects, ctx.environments)
                    .map(|release| ResolvedValue::Release(release.version))
                    .ok_or(QueryError::NoLatestRelease)
            } else {
                Ok(ResolvedValue::Release(token.clone()))
            }
        })
        .collect()
}

fn convert_status(
    values: &[String],
    _ctx: &ConversionContext<'_>,
) -> Result<Vec<ResolvedValue>, QueryError> {
    values
        .iter()
        .map(|token| {
            GroupStatus::from_query_label(token)
                .or_else(|| token.parse::<u8>().ok().and_then(GroupStatus::from_stored))
                .map(ResolvedValue::Status)
                .ok_or_else(|| QueryError::InvalidStatus(token.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::InMemoryDirectory;
    use crate::query::parse_issue_query;

    fn fixture() -> (InMemoryDirectory, Vec<Project>, User) {
        let mut directory = InMemoryDirectory::new();
        directory.add_user(1, "alice");
        directory.add_user(2, "bob");
        directory.add_team(10, "backend", &[1]);
        directory.add_release("1.0.0");
        directory.add_release("1.1.0");
        let projects = vec![Project {
            id: 1,
            slug: "backend-api".to_string(),
            organization_id: 1,
        }];
        let user = User {
            id: 2,
            username: "bob".to_string(),
        };
        (directory, projects, user)
    }

    fn convert(query: &str) -> Result<Vec<QueryClause>, QueryError> {
        let (directory, projects, user) = fixture();
        let ctx = ConversionContext {
            projects: &projects,
            user: &user,
            environments: &[],
            directory: &directory,
        };
        convert_query_values(parse_issue_query(query).unwrap(), &ctx)
    }

    fn single(query: &str) -> SearchFilter {
        let clauses = convert(query).unwrap();
        assert_eq!(clauses.len(), 1);
        match clauses.into_iter().next().unwrap() {
            QueryClause::Filter(filter) => filter,
            other => panic!("expected filter, got {other:?}"),
        }
    }

    #[test]
    fn status_values_map_to_enum() {
        let filter = single("status:unresolved");
        assert_eq!(filter.operator, Operator::In);
        assert_eq!(
            filter.value,
            SearchValue::Resolved(vec![ResolvedValue::Status(GroupStatus::Unresolved)])
        );
    }

    #[test]
    fn bad_status_value_is_named_in_error() {
        let err = convert("status:bogus-value").unwrap_err();
        assert_eq!(err, QueryError::InvalidStatus("bogus-value".to_string()));
        assert!(err.to_string().contains("bogus-value"));
    }

    #[test]
    fn equality_operators_become_membership() {
        assert_eq!(single("status:resolved").operator, Operator::In);
        assert_eq!(single("!status:resolved").operator, Operator::NotIn);
        assert_eq!(
            single("status:[resolved, ignored]").operator,
            Operator::In
        );
    }

    #[test]
    fn unregistered_keys_pass_through_unchanged() {
        let filter = single("server:web-1");
        assert_eq!(filter.operator, Operator::Eq);
        assert_eq!(filter.value, SearchValue::Text("web-1".to_string()));
    }

    #[test]
    fn aggregates_are_rejected() {
        let err = convert("count():>10").unwrap_err();
        assert_eq!(
            err,
            QueryError::AggregateNotSupported("count()".to_string())
        );
        assert!(err.to_string().contains("not supported in issue searches"));
    }

    #[test]
    fn assigned_resolves_actors_none_and_me() {
        let filter = single("assigned:[alice, #backend, none, me]");
        assert_eq!(
            filter.value,
            SearchValue::Resolved(vec![
                ResolvedValue::Actor(ActorRef::User(1)),
                ResolvedValue::Actor(ActorRef::Team(10)),
                ResolvedValue::NoActor,
                ResolvedValue::Actor(ActorRef::User(2)),
            ])
        );
    }

    #[test]
    fn unknown_actor_fails() {
        assert_eq!(
            convert("assigned:ghost").unwrap_err(),
            QueryError::UnresolvedActor("ghost".to_string())
        );
        assert_eq!(
            convert("assigned:#no-such-team").unwrap_err(),
            QueryError::UnresolvedActor("#no-such-team".to_string())
        );
    }

    #[test]
    fn unknown_user_becomes_sentinel() {
        let filter = single("bookmarks:ghost");
        assert_eq!(
            filter.value,
            SearchValue::Resolved(vec![ResolvedValue::User(0)])
        );
    }

    #[test]
    fn release_latest_resolves_newest_version() {
        let filter = single("release:latest");
        assert_eq!(
            filter.value,
            SearchValue::Resolved(vec![ResolvedValue::Release("1.1.0".to_string())])
        );

        let filter = single("first_release:2.0.0");
        assert_eq!(
            filter.value,
            SearchValue::Resolved(vec![ResolvedValue::Release("2.0.0".to_string())])
        );
    }

    #[test]
    fn latest_without_releases_fails() {
        let directory = InMemoryDirectory::new();
        let user = User {
            id: 1,
            username: "alice".to_string(),
        };
        let ctx = ConversionContext {
            projects: &[],
            user: &user,
            environments: &[],
            directory: &directory,
        };
        let err =
            convert_query_values(parse_issue_query("release:latest").unwrap(), &ctx).unwrap_err();
        assert_eq!(err, QueryError::NoLatestRelease);
    }

    #[test]
    fn conversion_preserves_clause_order() {
        let clauses = convert("is:unresolved release:1.0 server:web-1").unwrap();
        let keys: Vec<&str> = clauses.iter().map(|c| c.key_name()).collect();
        assert_eq!(keys, vec!["status", "release", "server"]);
    }
}
