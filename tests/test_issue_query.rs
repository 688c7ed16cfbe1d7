use issue_search::{
    ActorRef, ConversionContext, GroupStatus, InMemoryDirectory, Operator, Project, QueryClause,
    QueryError, ResolvedValue, SearchValue, User, convert_query_values, parse_issue_query,
};

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

fn parse_and_convert(query: &str) -> Result<Vec<QueryClause>, QueryError> {
    let (directory, projects, user) = fixture();
    let ctx = ConversionContext {
        projects: &projects,
        user: &user,
        environments: &[],
        directory: &directory,
    };
    convert_query_values(parse_issue_query(query)?, &ctx)
}

fn filters(clauses: Vec<QueryClause>) -> Vec<issue_search::SearchFilter> {
    clauses
        .into_iter()
        .map(|clause| match clause {
            QueryClause::Filter(filter) => filter,
            other => panic!("expected filter, got {other:?}"),
        })
        .collect()
}

#[test]
fn full_query_round_trip() {
    let clauses =
        parse_and_convert("is:unresolved assigned:me release:latest timesSeen:>5 db timeout")
            .unwrap();
    let filters = filters(clauses);
    assert_eq!(filters.len(), 6);

    assert_eq!(filters[0].key.name(), "status");
    assert_eq!(filters[0].operator, Operator::In);
    assert_eq!(
        filters[0].value,
        SearchValue::Resolved(vec![ResolvedValue::Status(GroupStatus::Unresolved)])
    );

    assert_eq!(filters[1].key.name(), "assigned_to");
    assert_eq!(
        filters[1].value,
        SearchValue::Resolved(vec![ResolvedValue::Actor(ActorRef::User(2))])
    );

    assert_eq!(filters[2].key.name(), "release");
    assert_eq!(
        filters[2].value,
        SearchValue::Resolved(vec![ResolvedValue::Release("1.1.0".to_string())])
    );

    assert_eq!(filters[3].key.name(), "times_seen");
    assert_eq!(filters[3].operator, Operator::Gt);
    assert_eq!(filters[3].value, SearchValue::Number(5));

    assert_eq!(filters[4].key.name(), "message");
    assert_eq!(filters[4].value, SearchValue::Text("db".to_string()));
    assert_eq!(filters[5].value, SearchValue::Text("timeout".to_string()));
}

#[test]
fn parsing_the_same_query_twice_is_identical() {
    let query = "is:unresolved !assigned:alice release:[1.0.0, 1.1.0]";
    assert_eq!(
        parse_and_convert(query).unwrap(),
        parse_and_convert(query).unwrap()
    );
}

#[test]
fn boolean_queries_fail_regardless_of_position() {
    for query in [
        "OR",
        "is:unresolved OR is:ignored",
        "release:1.0 AND assigned:alice",
        "a AND b OR c",
    ] {
        assert_eq!(
            parse_issue_query(query).unwrap_err(),
            QueryError::UnsupportedOperator,
            "query {query:?}"
        );
    }
}

#[test]
fn invalid_status_surfaces_the_bad_value() {
    let err = parse_and_convert("status:bogus-value").unwrap_err();
    assert_eq!(err.to_string(), "invalid status value of 'bogus-value'");
    assert_eq!(err.status_code(), 400);
}

#[test]
fn aggregate_clauses_are_invalid_for_issue_search() {
    let err = parse_and_convert("p95(duration):>200 is:unresolved").unwrap_err();
    assert_eq!(
        err,
        QueryError::AggregateNotSupported("p95(duration)".to_string())
    );
}

#[test]
fn parse_errors_carry_token_and_column() {
    let err = parse_issue_query("is:unresolved message:\"oops").unwrap_err();
    let QueryError::Syntax { token, column } = &err else {
        panic!("expected syntax error, got {err:?}");
    };
    assert_eq!(token, "\"oops");
    assert_eq!(*column, 23);
}

#[test]
fn negated_assignment_uses_not_in() {
    let filters = filters(parse_and_convert("!assigned:alice").unwrap());
    assert_eq!(filters[0].operator, Operator::NotIn);
    assert_eq!(
        filters[0].value,
        SearchValue::Resolved(vec![ResolvedValue::Actor(ActorRef::User(1))])
    );
}
