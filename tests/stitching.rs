//! End-to-end scenarios: execute a plan against mock services and assemble
//! the response.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use stitcher::graphql::Response;
use stitcher::http_client::MockGraphqlClient;
use stitcher::merge_and_format;
use stitcher::operation_selection_set;
use stitcher::BoundaryQueries;
use stitcher::BoundaryQuery;
use stitcher::CancellationToken;
use stitcher::QueryExecution;
use stitcher::QueryPlan;
use stitcher::QueryPlanStep;
use stitcher::Schema;
use stitcher::Selection;

struct Fixture {
    schema: Schema,
    mocks: HashMap<(String, String), Response>,
    boundary_queries: BoundaryQueries,
}

impl Fixture {
    fn new(sdl: &str) -> Self {
        Self {
            schema: Schema::parse(sdl).unwrap(),
            mocks: HashMap::new(),
            boundary_queries: BoundaryQueries::default(),
        }
    }

    fn mock(mut self, service_url: &str, document: &str, body: &'static str) -> Self {
        self.mocks.insert(
            (service_url.to_string(), document.to_string()),
            Response::from_bytes(Bytes::from_static(body.as_bytes())).unwrap(),
        );
        self
    }

    fn boundary(mut self, service_url: &str, parent_type: &str, query: &str, is_array: bool) -> Self {
        self.boundary_queries.insert(
            service_url,
            parent_type,
            BoundaryQuery {
                query: query.to_string(),
                is_array,
            },
        );
        self
    }

    fn selection_set(&self, query: &str) -> Vec<Selection> {
        operation_selection_set(&self.schema, query, None).unwrap()
    }

    /// The sub-selection of the single root field of `query`, used to build
    /// boundary step selections.
    fn child_selection_set(&self, query: &str) -> Vec<Selection> {
        match &self.selection_set(query)[0] {
            Selection::Field {
                selection_set: Some(sub),
                ..
            } => sub.clone(),
            other => panic!("expected a field with a sub-selection, got {other:?}"),
        }
    }

    /// Execute the plan and assemble the body for `query`, asserting no
    /// errors were produced anywhere.
    async fn check_success(self, plan: QueryPlan, query: &str, expected_body: &str) {
        let selection_set = self.selection_set(query);
        let execution: QueryExecution<MockGraphqlClient> = QueryExecution::builder()
            .client(Arc::new(MockGraphqlClient::new(self.mocks)))
            .boundary_queries(self.boundary_queries)
            .build();

        let (results, request_errors) = execution
            .execute(CancellationToken::new(), &plan)
            .await;
        assert!(
            request_errors.is_empty(),
            "unexpected request errors: {request_errors:?}"
        );
        for result in &results {
            assert!(
                result.errors.is_empty(),
                "unexpected step errors: {:?}",
                result.errors
            );
        }

        let (body, response_errors) = merge_and_format(&self.schema, &selection_set, results);
        assert!(
            response_errors.is_empty(),
            "unexpected response errors: {response_errors:?}"
        );
        assert_eq!(String::from_utf8(body).unwrap(), expected_body);
    }
}

fn step(
    service_url: &str,
    parent_type: &str,
    selection_set: Vec<Selection>,
    insertion_point: &[&str],
    children: Vec<QueryPlanStep>,
) -> QueryPlanStep {
    QueryPlanStep {
        service_url: service_url.to_string(),
        service_name: service_url.trim_start_matches("http://").to_string(),
        parent_type: parent_type.to_string(),
        selection_set,
        insertion_point: insertion_point.iter().map(|s| s.to_string()).collect(),
        children,
    }
}

#[tokio::test]
async fn single_service_query() {
    let fixture = Fixture::new(
        r#"
        type Movie {
            id: ID!
            title: String
        }

        type Query {
            movie: Movie!
        }
        "#,
    )
    .mock(
        "http://movies",
        "query { movie { id title } }",
        r#"{"data":{"movie":{"id":"1","title":"Test title"}}}"#,
    );

    let plan = QueryPlan {
        root_steps: vec![step(
            "http://movies",
            "Query",
            fixture.selection_set("{ movie { id title } }"),
            &[],
            Vec::new(),
        )],
    };

    fixture
        .check_success(
            plan,
            "{ movie { id title } }",
            r#"{"data":{"movie":{"id":"1","title":"Test title"}}}"#,
        )
        .await;
}

#[tokio::test]
async fn two_services_joined_through_a_single_id_boundary() {
    let fixture = Fixture::new(
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
    .mock(
        "http://titles",
        "query { movie { id title } }",
        r#"{"data":{"movie":{"id":"1","title":"Test title"}}}"#,
    )
    .mock(
        "http://releases",
        r#"{ _0: movie(id: "1") { _id: id release } }"#,
        r#"{"data":{"_0":{"_id":"1","release":2007}}}"#,
    )
    .boundary("http://releases", "Movie", "movie", false);

    let plan = QueryPlan {
        root_steps: vec![step(
            "http://titles",
            "Query",
            fixture.selection_set("{ movie { id title } }"),
            &[],
            vec![step(
                "http://releases",
                "Movie",
                fixture.child_selection_set("{ movie { _id: id release } }"),
                &["movie"],
                Vec::new(),
            )],
        )],
    };

    fixture
        .check_success(
            plan,
            "{ movie { id title release } }",
            r#"{"data":{"movie":{"id":"1","title":"Test title","release":2007}}}"#,
        )
        .await;
}

#[tokio::test]
async fn array_boundary_with_a_second_level_of_children() {
    let fixture = Fixture::new(
        r#"
        type Movie {
            id: ID!
            title: String
            compTitles: [Movie!]
        }

        type Query {
            randomMovie: Movie!
        }
        "#,
    )
    .mock(
        "http://movies",
        "query { randomMovie { id title } }",
        r#"{"data":{"randomMovie":{"id":"1","title":"Movie 1"}}}"#,
    )
    .mock(
        "http://movies",
        r#"{ _result: movies(ids: ["2", "3", "4"]) { _id: id title } }"#,
        r#"{"data":{"_result":[{"_id":"2","title":"Movie 2"},{"_id":"3","title":"Movie 3"},{"_id":"4","title":"Movie 4"}]}}"#,
    )
    .mock(
        "http://comp-titles",
        r#"{ _result: movies(ids: ["1"]) { _id: id compTitles { id } } }"#,
        r#"{"data":{"_result":[{"_id":"1","compTitles":[{"id":"2"},{"id":"3"},{"id":"4"}]}]}}"#,
    )
    .boundary("http://movies", "Movie", "movies", true)
    .boundary("http://comp-titles", "Movie", "movies", true);

    let plan = QueryPlan {
        root_steps: vec![step(
            "http://movies",
            "Query",
            fixture.selection_set("{ randomMovie { id title } }"),
            &[],
            vec![step(
                "http://comp-titles",
                "Movie",
                fixture.child_selection_set("{ randomMovie { _id: id compTitles { id } } }"),
                &["randomMovie"],
                vec![step(
                    "http://movies",
                    "Movie",
                    fixture.child_selection_set("{ randomMovie { _id: id title } }"),
                    &["randomMovie", "compTitles"],
                    Vec::new(),
                )],
            )],
        )],
    };

    fixture
        .check_success(
            plan,
            "{ randomMovie { id title compTitles { id title } } }",
            r#"{"data":{"randomMovie":{"id":"1","title":"Movie 1","compTitles":[{"id":"2","title":"Movie 2"},{"id":"3","title":"Movie 3"},{"id":"4","title":"Movie 4"}]}}}"#,
        )
        .await;
}

#[tokio::test]
async fn null_root_collection_skips_the_child_step() {
    // the child service has no mocks at all: a dispatch against it would
    // surface as a step error and fail the assertions
    let fixture = Fixture::new(
        r#"
        type Movie {
            id: ID!
            title: String
        }

        type Query {
            movies: [Movie!]
        }
        "#,
    )
    .mock(
        "http://movies",
        "query { movies { id } }",
        r#"{"data":{"movies":null}}"#,
    )
    .boundary("http://titles", "Movie", "movie", false);

    let plan = QueryPlan {
        root_steps: vec![step(
            "http://movies",
            "Query",
            fixture.selection_set("{ movies { id } }"),
            &[],
            vec![step(
                "http://titles",
                "Movie",
                fixture.child_selection_set("{ movies { _id: id title } }"),
                &["movies"],
                Vec::new(),
            )],
        )],
    };

    fixture
        .check_success(
            plan,
            "{ movies { id title } }",
            r#"{"data":{"movies":null}}"#,
        )
        .await;
}
