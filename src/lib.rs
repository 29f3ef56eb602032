//! Execution engine for a federated GraphQL gateway.
//!
//! The gateway accepts a query against a merged schema, plans it into a tree
//! of per-service steps (out of scope here), and hands the plan to this
//! crate. [`execution::QueryExecution`] dispatches every step concurrently
//! through an injected [`http_client::GraphqlClient`], chaining child steps
//! behind the boundary identifiers their parents produce.
//! [`response::merge_and_format`] then splices the partial results into a
//! single tree, enforces the merged schema's nullability rules, and emits
//! the response body in the order the original selection set asked for.

pub mod error;
pub mod execution;
pub mod graphql;
pub mod http_client;
pub(crate) mod json_ext;
pub mod query_planner;
pub mod response;
pub mod spec;

pub use crate::error::FetchError;
pub use crate::execution::CancellationToken;
pub use crate::execution::QueryExecution;
pub use crate::graphql::Error;
pub use crate::graphql::Request;
pub use crate::graphql::Response;
pub use crate::http_client::GraphqlClient;
pub use crate::http_client::HttpGraphqlClient;
pub use crate::query_planner::BoundaryQueries;
pub use crate::query_planner::BoundaryQuery;
pub use crate::query_planner::ExecutionResult;
pub use crate::query_planner::QueryPlan;
pub use crate::query_planner::QueryPlanStep;
pub use crate::query_planner::INTERNAL_SERVICE_NAME;
pub use crate::response::merge_and_format;
pub use crate::spec::operation_selection_set;
pub use crate::spec::Schema;
pub use crate::spec::Selection;
