//! Query plan inputs and per-step outputs.
//!
//! The planner (out of scope for this crate) produces a [`QueryPlan`]: an
//! ordered list of root steps, each a tree of child steps joined to their
//! parents through boundary identifiers.

use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::Value;

use crate::graphql::Error;
use crate::spec::Selection;

/// Pseudo-service identity used by the planner for steps the engine
/// synthesizes without a network round-trip.
pub const INTERNAL_SERVICE_NAME: &str = "__internal";

/// A query plan: the ordered root steps of one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPlan {
    pub root_steps: Vec<QueryPlanStep>,
}

/// One step of a query plan, addressed to a single service.
///
/// Root steps have `parent_type` `"Query"` or `"Mutation"` and an empty
/// `insertion_point`; child steps are boundary lookups on `parent_type`,
/// spliced into the accumulated result at `insertion_point`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPlanStep {
    pub service_url: String,
    pub service_name: String,
    pub parent_type: String,
    pub selection_set: Vec<Selection>,
    #[serde(default)]
    pub insertion_point: Vec<String>,
    #[serde(default)]
    pub children: Vec<QueryPlanStep>,
}

/// The downstream query used to fetch additional fields of an entity
/// identified by a sibling service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundaryQuery {
    /// The downstream field name.
    pub query: String,

    /// Whether the field takes a list of ids and returns a parallel list,
    /// rather than a single id.
    pub is_array: bool,
}

/// Boundary queries indexed by `(service_url, parent_type)`.
#[derive(Debug, Clone, Default)]
pub struct BoundaryQueries(HashMap<(String, String), BoundaryQuery>);

impl BoundaryQueries {
    pub fn insert(
        &mut self,
        service_url: impl Into<String>,
        parent_type: impl Into<String>,
        query: BoundaryQuery,
    ) {
        self.0
            .insert((service_url.into(), parent_type.into()), query);
    }

    pub(crate) fn query(&self, service_url: &str, parent_type: &str) -> Option<&BoundaryQuery> {
        self.0
            .get(&(service_url.to_string(), parent_type.to_string()))
    }
}

/// The outcome of one executed plan step.
///
/// `data` is an object for root steps and an array of entity objects for
/// child steps; errors are already enriched with the step's context.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub service_url: String,
    pub service_name: String,
    pub insertion_point: Vec<String>,
    pub data: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<Error>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_queries_are_keyed_by_service_and_type() {
        let mut map = BoundaryQueries::default();
        map.insert(
            "http://owners",
            "Owner",
            BoundaryQuery {
                query: "getOwners".to_string(),
                is_array: true,
            },
        );

        assert_eq!(
            map.query("http://owners", "Owner"),
            Some(&BoundaryQuery {
                query: "getOwners".to_string(),
                is_array: true,
            })
        );
        assert_eq!(map.query("http://owners", "Gizmo"), None);
        assert_eq!(map.query("http://gizmos", "Owner"), None);
    }
}
