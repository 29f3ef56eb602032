//! Response assembly: merge the drained results, enforce nullability, and
//! serialize the body.

mod bubble;
mod format;
mod merge;

use serde_json_bytes::Value;

use bubble::bubble_up_null_values_in_place;
use format::format_response_body;
use merge::merge_execution_results;

use crate::error::FetchError;
use crate::graphql::Error;
use crate::query_planner::ExecutionResult;
use crate::spec::Schema;
use crate::spec::Selection;

/// Assemble the final response from the executed plan's results.
///
/// Runs merger → null bubbler → formatter. Per-step errors accumulate and
/// whatever partial data survived bubbling is still returned; a fatal engine
/// error short-circuits to `{"data":null}` carrying that error alone.
pub fn merge_and_format(
    schema: &Schema,
    selection_set: &[Selection],
    results: Vec<ExecutionResult>,
) -> (Vec<u8>, Vec<Error>) {
    let mut errors: Vec<Error> = results
        .iter()
        .flat_map(|result| result.errors.iter().cloned())
        .collect();

    match assemble(schema, selection_set, results, &mut errors) {
        Ok(body) => (body, errors),
        Err(fatal) => {
            tracing::error!(error = fatal.to_string().as_str(), "response assembly failed");
            let error = fatal.to_graphql_error(None);
            let body = fatal_body(&error);
            (body, vec![error])
        }
    }
}

fn assemble(
    schema: &Schema,
    selection_set: &[Selection],
    results: Vec<ExecutionResult>,
    errors: &mut Vec<Error>,
) -> Result<Vec<u8>, FetchError> {
    let mut data = merge_execution_results(results)?;

    let (bubble_errors, root_field) =
        bubble_up_null_values_in_place(schema, selection_set, &mut data)?;
    errors.extend(bubble_errors);
    if let Some(field) = root_field {
        errors.push(
            Error::builder()
                .message(format!(
                    "got a null response for non-nullable field {field:?}"
                ))
                .build(),
        );
        data = Value::Null;
    }

    format_response_body(schema, selection_set, &data, errors)
}

fn fatal_body(error: &Error) -> Vec<u8> {
    let mut out = b"{\"data\":null,\"errors\":".to_vec();
    match serde_json::to_vec(&[error]) {
        Ok(errors) => out.extend_from_slice(&errors),
        Err(_) => out.extend_from_slice(br#"[{"message":"internal error"}]"#),
    }
    out.push(b'}');
    out
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;
    use crate::spec::operation_selection_set;

    fn result(insertion_point: &[&str], data: Value) -> ExecutionResult {
        ExecutionResult {
            service_url: "http://service".to_string(),
            service_name: "service".to_string(),
            insertion_point: insertion_point.iter().map(|s| s.to_string()).collect(),
            data,
            errors: Vec::new(),
        }
    }

    #[test]
    fn merges_bubbles_and_formats_in_one_pass() {
        let schema = Schema::parse(
            r#"
            type Gizmo {
                id: ID!
                color: String!
                owner: Owner
            }

            type Owner {
                id: ID!
                name: String!
            }

            type Query {
                gizmos: [Gizmo!]
            }
            "#,
        )
        .unwrap();
        let selection_set =
            operation_selection_set(&schema, "{ gizmos { id color owner { name } } }", None)
                .unwrap();

        let (body, errors) = merge_and_format(
            &schema,
            &selection_set,
            vec![
                result(
                    &[],
                    json!({
                        "gizmos": [
                            { "id": "1", "color": "RED", "owner": { "_id": "4" } },
                        ],
                    }),
                ),
                result(
                    &["gizmos", "owner"],
                    json!([{ "_id": "4", "name": "Owner A" }]),
                ),
            ],
        );

        assert!(errors.is_empty());
        assert_eq!(
            String::from_utf8(body).unwrap(),
            r#"{"data":{"gizmos":[{"id":"1","color":"RED","owner":{"name":"Owner A"}}]}}"#
        );
    }

    #[test]
    fn a_root_bubble_discards_the_data() {
        let schema = Schema::parse(
            r#"
            type Gizmo {
                id: ID!
                color: String!
            }

            type Query {
                gizmos: [Gizmo!]!
            }
            "#,
        )
        .unwrap();
        let selection_set =
            operation_selection_set(&schema, "{ gizmos { id color } }", None).unwrap();

        let (body, errors) = merge_and_format(
            &schema,
            &selection_set,
            vec![result(
                &[],
                json!({ "gizmos": [{ "id": "1", "color": null }] }),
            )],
        );

        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].message, "field failed to resolve");
        assert_eq!(
            errors[1].message,
            r#"got a null response for non-nullable field "gizmos""#
        );
        assert!(String::from_utf8(body).unwrap().starts_with(r#"{"data":null,"errors":"#));
    }

    #[test]
    fn a_fatal_merge_error_returns_that_error_alone() {
        let schema = Schema::parse("type Query { x: Int }").unwrap();
        let selection_set = operation_selection_set(&schema, "{ x }", None).unwrap();

        let (body, errors) = merge_and_format(&schema, &selection_set, Vec::new());

        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].extensions.get("code").and_then(|v| v.as_str()),
            Some("MERGE_SHAPE")
        );
        assert!(String::from_utf8(body).unwrap().starts_with(r#"{"data":null"#));
    }
}
