//! Issue-search query parsing
//!
//! Turns a free-text search query into an ordered sequence of typed filter
//! clauses, ready for value conversion and translation into a storage-layer
//! predicate.
//!
//! # Syntax
//!
//! ```text
//! key:value            Match a field against a value
//! key:"some value"     Quoted values may contain spaces
//! !key:value           Negate a clause
//! key:[a, b]           Match any of several values (IN)
//! timesSeen:>100       Range operators on numeric and date keys
//! age:-24h             Relative dates (s, m, h, d, w)
//! is:unresolved        Pseudo-key resolved through a fixed translation table
//! bare text            Becomes a `message` filter
//! ```
//!
//! Boolean combinators (`AND`/`OR`) are recognized by the grammar but not
//! supported for issue search; clauses always combine as an implicit
//! conjunction.

pub mod error;
pub mod filter;
pub mod parser;
pub mod visitor;

pub use error::QueryError;
pub use filter::{AggregateFilter, Operator, QueryClause, SearchFilter, SearchKey, SearchValue};
pub use visitor::parse_issue_query;
