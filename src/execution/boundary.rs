//! Boundary plumbing: collecting the identifiers a child step must look up,
//! building the documents that fetch them, and flattening what comes back.

use serde_json_bytes::Value;

use crate::error::FetchError;
use crate::json_ext::value_kind;
use crate::json_ext::Object;
use crate::query_planner::QueryPlanStep;
use crate::query_planner::BoundaryQuery;
use crate::spec::render_selection_set;

/// The key a parent record stores its boundary identifier under. `_id` is
/// preferred, `id` accepted, on both sides of a join.
pub(crate) fn boundary_record_id(record: &Object) -> Option<&str> {
    record
        .get("_id")
        .and_then(Value::as_str)
        .or_else(|| record.get("id").and_then(Value::as_str))
}

/// Collect the boundary identifiers found in `data` at `insertion_point`, in
/// depth-first order.
///
/// Returns `Ok(None)` when a null is encountered anywhere along the walk:
/// the parent collection was absent, and the child step must be skipped
/// entirely. Order preservation is a contract: array-boundary responses are
/// aligned by position.
pub(crate) fn extract_boundary_ids(
    data: &Value,
    insertion_point: &[String],
) -> Result<Option<Vec<String>>, FetchError> {
    let mut ids = Vec::new();
    if collect_boundary_ids(data, insertion_point, &mut ids)? {
        Ok(Some(ids))
    } else {
        Ok(None)
    }
}

fn collect_boundary_ids(
    data: &Value,
    insertion_point: &[String],
    ids: &mut Vec<String>,
) -> Result<bool, FetchError> {
    match data {
        Value::Null => Ok(false),
        Value::Object(object) => match insertion_point.split_first() {
            Some((segment, rest)) => match object.get(segment.as_str()) {
                None | Some(Value::Null) => Ok(false),
                Some(value) => collect_boundary_ids(value, rest, ids),
            },
            None => match boundary_record_id(object) {
                Some(id) => {
                    ids.push(id.to_owned());
                    Ok(true)
                }
                None => Err(FetchError::BoundaryMissingIdentifier),
            },
        },
        Value::Array(elements) => {
            let mut complete = true;
            for element in elements {
                complete &= collect_boundary_ids(element, insertion_point, ids)?;
            }
            Ok(complete)
        }
        other => Err(FetchError::BoundaryTypeMismatch {
            found: value_kind(other).to_string(),
        }),
    }
}

fn node_alias(index: usize) -> String {
    format!("_{index}")
}

/// Build the documents fetching `ids` through `boundary_query`.
///
/// Array boundaries produce exactly one document with the fixed `_result`
/// alias. Single-id boundaries produce `ceil(ids / batch_size)` documents
/// whose `_N` aliases count up globally across batches, so responses can be
/// reassembled in id order.
pub(crate) fn build_boundary_query_documents(
    step: &QueryPlanStep,
    ids: &[String],
    boundary_query: &BoundaryQuery,
    batch_size: usize,
) -> Vec<String> {
    let selection_set = render_selection_set(&step.selection_set);

    if boundary_query.is_array {
        let ids_literal = ids
            .iter()
            .map(|id| format!("{id:?}"))
            .collect::<Vec<_>>()
            .join(", ");
        return vec![format!(
            "{{ _result: {}(ids: [{}]) {} }}",
            boundary_query.query, ids_literal, selection_set
        )];
    }

    let batch_size = batch_size.max(1);
    let mut documents = Vec::with_capacity(ids.len().div_ceil(batch_size));
    let mut selection_index = 0;
    for batch in ids.chunks(batch_size) {
        let mut selections = Vec::with_capacity(batch.len());
        for id in batch {
            selections.push(format!(
                "{}: {}(id: {:?}) {}",
                node_alias(selection_index),
                boundary_query.query,
                id,
                selection_set
            ));
            selection_index += 1;
        }
        documents.push(format!("{{ {} }}", selections.join(" ")));
    }
    documents
}

/// Flatten the merged top-level keys of a child step's responses into one
/// entity list, whatever the boundary shape was.
pub(crate) fn boundary_field_results(
    mut data: Object,
    is_array: bool,
    document_count: usize,
) -> Result<Vec<Value>, FetchError> {
    if is_array {
        if document_count != 1 {
            return Err(FetchError::BoundaryDocumentCount {
                count: document_count,
            });
        }
        return match data.remove("_result") {
            Some(Value::Array(entities)) => Ok(entities),
            Some(other) => Err(FetchError::BoundaryResponseShape {
                reason: format!("expected '_result' to be an array, found {}", value_kind(&other)),
            }),
            None => Err(FetchError::BoundaryResponseShape {
                reason: "missing '_result' in array boundary response".to_string(),
            }),
        };
    }

    let total = data.len();
    let mut entities = Vec::with_capacity(total);
    for index in 0..total {
        let alias = node_alias(index);
        match data.remove(alias.as_str()) {
            Some(entity) => entities.push(entity),
            None => {
                return Err(FetchError::BoundaryResponseShape {
                    reason: format!("missing key '{alias}' in boundary response"),
                })
            }
        }
    }
    Ok(entities)
}
