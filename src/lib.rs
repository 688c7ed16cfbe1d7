pub mod cli;
pub mod context;
pub mod convert;
pub mod directory;
pub mod key_transactions;
pub mod levels;
pub mod query;

pub use cli::{Cli, Commands, cli_parse};
pub use context::{
    ActorRef, Environment, GroupStatus, Project, Release, ResolvedValue, Team, User,
};
pub use convert::{ConversionContext, convert_query_values};
pub use directory::{Directory, InMemoryDirectory};
pub use levels::{LevelsError, LevelsOverview, get_levels_overview, list_levels};
pub use query::{
    AggregateFilter, Operator, QueryClause, QueryError, SearchFilter, SearchKey, SearchValue,
    parse_issue_query,
};

fn format_clauses_text(clauses: &[QueryClause]) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    for clause in clauses {
        match clause {
            QueryClause::Filter(filter) => {
                let _ = writeln!(
                    out,
                    "{} {} {}",
                    filter.key.name(),
                    filter.operator,
                    filter.value.raw_value()
                );
            }
            QueryClause::Aggregate(aggregate) => {
                let _ = writeln!(
                    out,
                    "{} {} {}  (aggregate)",
                    aggregate.key.name(),
                    aggregate.operator,
                    aggregate.value.raw_value()
                );
            }
        }
    }
    out
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = cli_parse();

    match &cli.command {
        Commands::Parse {
            query,
            json,
            convert,
        } => {
            let mut clauses = parse_issue_query(query)?;

            if *convert {
                let directory = InMemoryDirectory::sample();
                let projects = vec![Project {
                    id: 1,
                    slug: "sample".to_string(),
                    organization_id: 1,
                }];
                let user = User {
                    id: 1,
                    username: "alice".to_string(),
                };
                let ctx = ConversionContext {
                    projects: &projects,
                    user: &user,
                    environments: &[],
                    directory: &directory,
                };
                clauses = convert_query_values(clauses, &ctx)?;
            }

            if *json {
                println!("{}", serde_json::to_string_pretty(&clauses)?);
            } else {
                print!("{}", format_clauses_text(&clauses));
            }
        }
    }

    Ok(())
}
