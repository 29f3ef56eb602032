//! Splicing per-step results into one response tree.

use serde_json_bytes::Value;

use crate::error::FetchError;
use crate::execution::boundary_record_id;
use crate::json_ext::value_kind;
use crate::json_ext::Object;
use crate::query_planner::ExecutionResult;

/// Merge every step's partial result into a single tree.
///
/// The first result seeds the tree (it is a root result, its insertion point
/// empty); each subsequent result is spliced in at its insertion point.
/// Results whose data is null carried only errors and are skipped.
pub(crate) fn merge_execution_results(
    results: Vec<ExecutionResult>,
) -> Result<Value, FetchError> {
    let mut results = results.into_iter();
    let first = results.next().ok_or_else(|| FetchError::MergeShape {
        reason: "nothing to merge".to_string(),
    })?;

    let mut data = first.data;
    for result in results {
        if result.data.is_null() {
            continue;
        }
        merge_result(&mut data, &result.data, &result.insertion_point)?;
    }
    Ok(data)
}

fn merge_result(
    dst: &mut Value,
    src: &Value,
    insertion_point: &[String],
) -> Result<(), FetchError> {
    match insertion_point.split_first() {
        // root-to-root merges copy keys across
        None => match (dst, src) {
            (Value::Object(dst), Value::Object(src)) => {
                for (key, value) in src {
                    dst.insert(key.clone(), value.clone());
                }
                Ok(())
            }
            (dst, _) => Err(FetchError::MergeShape {
                reason: format!("top-level merge into {}", value_kind(dst)),
            }),
        },
        // the last remaining segment is the join segment
        Some((join_segment, rest)) if rest.is_empty() => splice_at(dst, src, join_segment),
        // descent: objects step into the segment, arrays broadcast
        Some((segment, rest)) => match dst {
            Value::Null => Ok(()),
            Value::Object(object) => match object.get_mut(segment.as_str()) {
                Some(Value::Null) => Ok(()),
                Some(value) => merge_result(value, src, rest),
                None => Err(FetchError::MergeShape {
                    reason: format!("missing key '{segment}' while descending"),
                }),
            },
            Value::Array(elements) => {
                for element in elements {
                    merge_result(element, src, insertion_point)?;
                }
                Ok(())
            }
            other => Err(FetchError::MergeShape {
                reason: format!("cannot descend into {} at '{segment}'", value_kind(other)),
            }),
        },
    }
}

fn splice_at(dst: &mut Value, src: &Value, join_segment: &str) -> Result<(), FetchError> {
    match dst {
        Value::Null => Ok(()),
        Value::Object(record) => match record.get_mut(join_segment) {
            None | Some(Value::Null) => Ok(()),
            Some(target) => splice_entities(target, src),
        },
        Value::Array(records) => {
            for record in records {
                splice_at(record, src, join_segment)?;
            }
            Ok(())
        }
        other => Err(FetchError::MergeShape {
            reason: format!("cannot splice into {} at '{join_segment}'", value_kind(other)),
        }),
    }
}

fn splice_entities(target: &mut Value, src: &Value) -> Result<(), FetchError> {
    let entities = match src {
        Value::Array(entities) => entities,
        other => {
            return Err(FetchError::MergeShape {
                reason: format!(
                    "child result must be an array of entities, found {}",
                    value_kind(other)
                ),
            })
        }
    };

    match target {
        Value::Null => Ok(()),
        Value::Object(record) => copy_matching_entity(record, entities),
        Value::Array(items) => {
            for item in items {
                splice_entities(item, src)?;
            }
            Ok(())
        }
        other => Err(FetchError::MergeShape {
            reason: format!("child splice destination is {}", value_kind(other)),
        }),
    }
}

/// Copy the fields of the entity matching the record's boundary identifier,
/// leaving the identifier keys alone so whichever form the record already
/// used survives.
fn copy_matching_entity(record: &mut Object, entities: &[Value]) -> Result<(), FetchError> {
    let record_id = match boundary_record_id(record) {
        Some(id) => id.to_owned(),
        None => {
            return Err(FetchError::MergeShape {
                reason: "parent record carries no boundary identifier".to_string(),
            })
        }
    };

    for entity in entities {
        let Value::Object(entity) = entity else {
            continue;
        };
        if boundary_record_id(entity) == Some(record_id.as_str()) {
            for (key, value) in entity {
                if key.as_str() == "_id" || key.as_str() == "id" {
                    continue;
                }
                record.insert(key.clone(), value.clone());
            }
            break;
        }
    }
    Ok(())
}
