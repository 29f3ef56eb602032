//! Plan execution: one task per non-internal step, chained parent to child,
//! aggregated over a single results channel.

mod boundary;
mod internal;

use std::sync::Arc;

use serde_json_bytes::Value;
use tokio::sync::mpsc;
use tokio::sync::mpsc::UnboundedSender;
/// Cancellation signal for [`QueryExecution::execute`], re-exported for
/// callers.
pub use tokio_util::sync::CancellationToken;

pub(crate) use boundary::boundary_record_id;
use boundary::boundary_field_results;
use boundary::build_boundary_query_documents;
use boundary::extract_boundary_ids;
use internal::execute_internal_step;

use crate::error::FetchError;
use crate::graphql;
use crate::graphql::Request;
use crate::http_client::GraphqlClient;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::json_ext::PathElement;
use crate::query_planner::ExecutionResult;
use crate::query_planner::QueryPlan;
use crate::query_planner::QueryPlanStep;
use crate::query_planner::BoundaryQueries;
use crate::query_planner::INTERNAL_SERVICE_NAME;
use crate::spec::render_selection_set;

const DEFAULT_BOUNDARY_BATCH_SIZE: usize = 50;

/// Executes query plans against downstream services.
pub struct QueryExecution<C> {
    /// Declared ceiling on in-flight downstream requests for one plan.
    ///
    /// Declared but not yet enforced: dispatch currently runs unthrottled.
    pub max_requests: Option<usize>,
    inner: Arc<Inner<C>>,
}

struct Inner<C> {
    client: Arc<C>,
    boundary_queries: BoundaryQueries,
    batch_size: usize,
}

#[buildstructor::buildstructor]
impl<C> QueryExecution<C>
where
    C: GraphqlClient + 'static,
{
    /// Returns a builder for a [`QueryExecution`].
    ///
    /// `client` and `boundary_queries` are required; `batch_size` defaults
    /// to 50 ids per single-id boundary document.
    #[builder(visibility = "pub")]
    fn new(
        client: Arc<C>,
        boundary_queries: BoundaryQueries,
        batch_size: Option<usize>,
        max_requests: Option<usize>,
    ) -> Self {
        QueryExecution {
            max_requests,
            inner: Arc::new(Inner {
                client,
                boundary_queries,
                batch_size: batch_size.unwrap_or(DEFAULT_BOUNDARY_BATCH_SIZE),
            }),
        }
    }

    /// Execute every step of `plan` and return the accumulated results,
    /// plus any errors the scheduler assembled on its own.
    ///
    /// Root steps run concurrently; children are launched once their
    /// parent's data is available. A parent's result is always emitted
    /// before its children's, and the first result is always a root
    /// result, but sibling order is unspecified.
    pub async fn execute(
        &self,
        token: CancellationToken,
        plan: &QueryPlan,
    ) -> (Vec<ExecutionResult>, Vec<graphql::Error>) {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let mut results = Vec::new();

        for step in &plan.root_steps {
            if step.service_url == INTERNAL_SERVICE_NAME {
                match execute_internal_step(step) {
                    Ok(result) => results.push(result),
                    Err(err) => {
                        return (Vec::new(), vec![err.to_graphql_error(None)]);
                    }
                }
                continue;
            }

            let inner = self.inner.clone();
            let step = step.clone();
            let sender = sender.clone();
            let token = token.clone();
            tokio::spawn(async move { inner.execute_root_step(token, step, sender).await });
        }
        drop(sender);

        while let Some(result) = receiver.recv().await {
            results.push(result);
        }

        (results, Vec::new())
    }
}

impl<C> Inner<C>
where
    C: GraphqlClient + 'static,
{
    async fn execute_root_step(
        self: Arc<Self>,
        token: CancellationToken,
        step: QueryPlanStep,
        sender: UnboundedSender<ExecutionResult>,
    ) {
        let document = match step.parent_type.as_str() {
            "Query" => format!("query {}", render_selection_set(&step.selection_set)),
            "Mutation" => format!("mutation {}", render_selection_set(&step.selection_set)),
            _ => {
                let error = FetchError::InvalidRootStepKind {
                    parent_type: step.parent_type.clone(),
                };
                let _ = sender.send(step_error_result(&step, error));
                return;
            }
        };

        let (data, errors) = self.dispatch(&token, &step, document).await;
        self.emit_and_spawn_children(token, step, data, errors, sender, false);
    }

    async fn execute_child_step(
        self: Arc<Self>,
        token: CancellationToken,
        step: QueryPlanStep,
        boundary_ids: Vec<String>,
        sender: UnboundedSender<ExecutionResult>,
    ) {
        let Some(boundary_query) = self
            .boundary_queries
            .query(&step.service_url, &step.parent_type)
        else {
            let error = FetchError::MissingBoundaryQuery {
                service: step.service_name.clone(),
                parent_type: step.parent_type.clone(),
            };
            let _ = sender.send(step_error_result(&step, error));
            return;
        };

        let documents =
            build_boundary_query_documents(&step, &boundary_ids, boundary_query, self.batch_size);
        let document_count = documents.len();

        let mut merged = Object::default();
        let mut errors = Vec::new();
        for document in documents {
            let (data, document_errors) = self.dispatch(&token, &step, document).await;
            errors.extend(document_errors);
            if let Value::Object(object) = data {
                for (key, value) in object {
                    merged.insert(key, value);
                }
            }
        }

        let data = if merged.is_empty() && !errors.is_empty() {
            // every document failed; there is nothing to normalize
            Value::Null
        } else {
            match boundary_field_results(merged, boundary_query.is_array, document_count) {
                Ok(entities) => Value::Array(entities),
                Err(err) => {
                    errors.push(enrich_error(err.to_graphql_error(None), &step));
                    Value::Null
                }
            }
        };

        self.emit_and_spawn_children(token, step, data, errors, sender, true);
    }

    /// Emit the step's result, then launch its children against the data
    /// that was just produced. Emission strictly precedes the spawns so a
    /// parent's result is drained before any of its children's.
    fn emit_and_spawn_children(
        self: Arc<Self>,
        token: CancellationToken,
        step: QueryPlanStep,
        data: Value,
        errors: Vec<graphql::Error>,
        sender: UnboundedSender<ExecutionResult>,
        relative_insertion_point: bool,
    ) {
        let mut launches = Vec::new();
        for child in &step.children {
            // for grandchildren the leading segment addresses the collection
            // the child data was already joined under
            let insertion_point = if relative_insertion_point && !child.insertion_point.is_empty() {
                &child.insertion_point[1..]
            } else {
                &child.insertion_point[..]
            };
            match extract_boundary_ids(&data, insertion_point) {
                Ok(Some(ids)) if !ids.is_empty() => launches.push((child.clone(), ids)),
                Ok(_) => {
                    tracing::debug!(
                        service = child.service_name.as_str(),
                        "skipping child step without boundary data"
                    );
                }
                Err(err) => {
                    let _ = sender.send(step_error_result(child, err));
                }
            }
        }

        let _ = sender.send(ExecutionResult {
            service_url: step.service_url,
            service_name: step.service_name,
            insertion_point: step.insertion_point,
            data,
            errors,
        });

        for (child, ids) in launches {
            let inner = self.clone();
            let token = token.clone();
            let sender = sender.clone();
            tokio::spawn(
                async move { inner.execute_child_step(token, child, ids, sender).await },
            );
        }
    }

    async fn dispatch(
        &self,
        token: &CancellationToken,
        step: &QueryPlanStep,
        document: String,
    ) -> (Value, Vec<graphql::Error>) {
        tracing::trace!(
            service = step.service_name.as_str(),
            document = document.as_str(),
            "dispatching step document"
        );
        let request = Request::builder().query(document).build();

        let response = tokio::select! {
            biased;
            _ = token.cancelled() => Err(FetchError::SubrequestCancelled {
                service: step.service_name.clone(),
            }),
            response = self.client.request(&step.service_url, request) => response,
        };

        match response {
            Ok(response) => {
                let errors = response
                    .errors
                    .into_iter()
                    .map(|error| enrich_error(error, step))
                    .collect();
                (response.data.unwrap_or_default(), errors)
            }
            Err(err) => {
                tracing::error!(
                    service = step.service_name.as_str(),
                    error = err.to_string().as_str(),
                    "step dispatch failed"
                );
                (Value::Null, vec![enrich_error(err.to_graphql_error(None), step)])
            }
        }
    }
}

fn step_error_result(step: &QueryPlanStep, error: FetchError) -> ExecutionResult {
    ExecutionResult {
        service_url: step.service_url.clone(),
        service_name: step.service_name.clone(),
        insertion_point: step.insertion_point.clone(),
        data: Value::Null,
        errors: vec![enrich_error(error.to_graphql_error(None), step)],
    }
}

/// Re-base the error's path to the caller's view and record which step
/// produced it.
fn enrich_error(mut error: graphql::Error, step: &QueryPlanStep) -> graphql::Error {
    if !step.insertion_point.is_empty() {
        let prefix = Path(
            step.insertion_point
                .iter()
                .map(|segment| PathElement::Key(segment.clone()))
                .collect(),
        );
        error.path = Some(match error.path.take() {
            Some(path) => prefix.join(path),
            None => prefix,
        });
    }
    error
        .extensions
        .entry("selectionSet")
        .or_insert_with(|| render_selection_set(&step.selection_set).into());
    error
        .extensions
        .entry("serviceName")
        .or_insert_with(|| step.service_name.as_str().into());
    error
        .extensions
        .entry("serviceUrl")
        .or_insert_with(|| step.service_url.as_str().into());
    error
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use bytes::Bytes;
    use serde_json_bytes::json;

    use super::*;
    use crate::graphql::Response;
    use crate::http_client::MockGraphqlClient;
    use crate::query_planner::BoundaryQuery;
    use crate::spec::operation_selection_set;
    use crate::spec::Schema;

    fn movie_schema() -> Schema {
        Schema::parse(
            r#"
            type Movie {
                id: ID!
                title: String
                release: Int
            }

            type Query {
                movie: Movie!
            }
            "#,
        )
        .unwrap()
    }

    /// The sub-selection of the single root field of `source`.
    fn child_selection_set(schema: &Schema, source: &str) -> Vec<crate::spec::Selection> {
        match &operation_selection_set(schema, source, None).unwrap()[0] {
            crate::spec::Selection::Field {
                selection_set: Some(sub),
                ..
            } => sub.clone(),
            other => panic!("expected a field with a sub-selection, got {other:?}"),
        }
    }

    fn mock(
        mocks: &mut HashMap<(String, String), Response>,
        service_url: &str,
        document: &str,
        body: &'static str,
    ) {
        mocks.insert(
            (service_url.to_string(), document.to_string()),
            Response::from_bytes(Bytes::from_static(body.as_bytes())).unwrap(),
        );
    }

    fn execution(mocks: HashMap<(String, String), Response>, boundary_queries: BoundaryQueries) -> QueryExecution<MockGraphqlClient> {
        QueryExecution::builder()
            .client(Arc::new(MockGraphqlClient::new(mocks)))
            .boundary_queries(boundary_queries)
            .build()
    }

    #[tokio::test]
    async fn parent_result_is_emitted_before_its_children() {
        let schema = movie_schema();
        let mut mocks = HashMap::new();
        mock(
            &mut mocks,
            "http://movies",
            "query { movie { _id: id title } }",
            r#"{"data":{"movie":{"_id":"1","title":"Test title"}}}"#,
        );
        mock(
            &mut mocks,
            "http://releases",
            r#"{ _0: movie(id: "1") { _id: id release } }"#,
            r#"{"data":{"_0":{"_id":"1","release":2007}}}"#,
        );

        let mut boundary_queries = BoundaryQueries::default();
        boundary_queries.insert(
            "http://releases",
            "Movie",
            BoundaryQuery {
                query: "movie".to_string(),
                is_array: false,
            },
        );

        let plan = QueryPlan {
            root_steps: vec![QueryPlanStep {
                service_url: "http://movies".to_string(),
                service_name: "movies".to_string(),
                parent_type: "Query".to_string(),
                selection_set: operation_selection_set(
                    &schema,
                    "{ movie { _id: id title } }",
                    None,
                )
                .unwrap(),
                insertion_point: Vec::new(),
                children: vec![QueryPlanStep {
                    service_url: "http://releases".to_string(),
                    service_name: "releases".to_string(),
                    parent_type: "Movie".to_string(),
                    selection_set: child_selection_set(&schema, "{ movie { _id: id release } }"),
                    insertion_point: vec!["movie".to_string()],
                    children: Vec::new(),
                }],
            }],
        };

        let execution = execution(mocks, boundary_queries);
        let (results, request_errors) = execution
            .execute(CancellationToken::new(), &plan)
            .await;

        assert!(request_errors.is_empty());
        assert_eq!(results.len(), 2);
        for result in &results {
            assert!(result.errors.is_empty(), "unexpected errors: {:?}", result.errors);
        }
        assert!(results[0].insertion_point.is_empty());
        assert_eq!(
            results[0].data,
            json!({"movie": {"_id": "1", "title": "Test title"}})
        );
        assert_eq!(results[1].insertion_point, vec!["movie".to_string()]);
        assert_eq!(results[1].data, json!([{"_id": "1", "release": 2007}]));
    }

    #[tokio::test]
    async fn dispatch_failures_are_attached_to_the_step_result() {
        let schema = movie_schema();
        let plan = QueryPlan {
            root_steps: vec![QueryPlanStep {
                service_url: "http://unreachable".to_string(),
                service_name: "movies".to_string(),
                parent_type: "Query".to_string(),
                selection_set: operation_selection_set(&schema, "{ movie { _id: id } }", None)
                    .unwrap(),
                insertion_point: Vec::new(),
                children: Vec::new(),
            }],
        };

        let execution = execution(HashMap::new(), BoundaryQueries::default());
        let (results, _) = execution.execute(CancellationToken::new(), &plan).await;

        assert_eq!(results.len(), 1);
        assert!(results[0].data.is_null());
        assert_eq!(results[0].errors.len(), 1);
        let error = &results[0].errors[0];
        assert_eq!(
            error.extensions.get("code").and_then(|v| v.as_str()),
            Some("SUBREQUEST_HTTP_ERROR")
        );
        assert_eq!(
            error.extensions.get("serviceName").and_then(|v| v.as_str()),
            Some("movies")
        );
        assert_eq!(
            error.extensions.get("serviceUrl").and_then(|v| v.as_str()),
            Some("http://unreachable")
        );
        assert_eq!(
            error
                .extensions
                .get("selectionSet")
                .and_then(|v| v.as_str()),
            Some("{ movie { _id: id } }")
        );
    }

    #[tokio::test]
    async fn cancellation_aborts_dispatch_without_deadlocking() {
        let schema = movie_schema();
        let plan = QueryPlan {
            root_steps: vec![QueryPlanStep {
                service_url: "http://movies".to_string(),
                service_name: "movies".to_string(),
                parent_type: "Query".to_string(),
                selection_set: operation_selection_set(&schema, "{ movie { _id: id } }", None)
                    .unwrap(),
                insertion_point: Vec::new(),
                children: Vec::new(),
            }],
        };

        let token = CancellationToken::new();
        token.cancel();

        let execution = execution(HashMap::new(), BoundaryQueries::default());
        let (results, _) = execution.execute(token, &plan).await;

        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].errors[0]
                .extensions
                .get("code")
                .and_then(|v| v.as_str()),
            Some("SUBREQUEST_CANCELLED")
        );
    }

    #[tokio::test]
    async fn root_step_on_an_unexpected_type_is_reported_not_fatal() {
        let plan = QueryPlan {
            root_steps: vec![QueryPlanStep {
                service_url: "http://movies".to_string(),
                service_name: "movies".to_string(),
                parent_type: "Subscription".to_string(),
                selection_set: Vec::new(),
                insertion_point: Vec::new(),
                children: Vec::new(),
            }],
        };

        let execution = execution(HashMap::new(), BoundaryQueries::default());
        let (results, _) = execution.execute(CancellationToken::new(), &plan).await;

        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].errors[0]
                .extensions
                .get("code")
                .and_then(|v| v.as_str()),
            Some("INVALID_ROOT_STEP_KIND")
        );
    }
}
