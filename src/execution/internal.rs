//! Steps the engine answers itself: `__typename` synthesis for namespace
//! wrappers, which need no network round-trip.

use serde_json_bytes::Value;

use crate::error::FetchError;
use crate::json_ext::Object;
use crate::query_planner::ExecutionResult;
use crate::query_planner::QueryPlanStep;
use crate::query_planner::INTERNAL_SERVICE_NAME;
use crate::spec::Selection;
use crate::spec::TYPENAME;

/// Synthesize the result of a plan step addressed to the internal service.
pub(crate) fn execute_internal_step(step: &QueryPlanStep) -> Result<ExecutionResult, FetchError> {
    let data = build_typename_response(&step.selection_set, &step.parent_type)?;
    Ok(ExecutionResult {
        service_url: INTERNAL_SERVICE_NAME.to_string(),
        service_name: INTERNAL_SERVICE_NAME.to_string(),
        insertion_point: Vec::new(),
        data: Value::Object(data),
        errors: Vec::new(),
    })
}

/// Walk the selection set, emitting the parent type's name for every
/// `__typename` leaf and recursing into namespace fields.
fn build_typename_response(
    selection_set: &[Selection],
    parent_type: &str,
) -> Result<Object, FetchError> {
    let mut result = Object::with_capacity(selection_set.len());
    for selection in selection_set {
        match selection {
            Selection::Field {
                name,
                alias,
                selection_set,
                field_type,
            } => {
                let response_key = alias.as_ref().unwrap_or(name);
                match selection_set {
                    Some(sub_selections) => {
                        let nested =
                            build_typename_response(sub_selections, field_type.inner_named_type())?;
                        result.insert(response_key.clone(), Value::Object(nested));
                    }
                    None => {
                        if name.as_str() != TYPENAME {
                            return Err(FetchError::SyntheticStepShape {
                                reason: format!(
                                    "expected '__typename', found field '{}'",
                                    name.as_str()
                                ),
                            });
                        }
                        result.insert(response_key.clone(), parent_type.into());
                    }
                }
            }
            Selection::InlineFragment { selection_set, .. }
            | Selection::FragmentSpread { selection_set, .. } => {
                let nested = build_typename_response(selection_set, parent_type)?;
                for (key, value) in nested {
                    result.insert(key, value);
                }
            }
        }
    }
    Ok(result)
}
