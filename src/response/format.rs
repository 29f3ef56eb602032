//! Response serialization.
//!
//! The merged tree's own key order is irrelevant: fields are emitted in the
//! order the original selection set requested them, and fragment bodies are
//! spliced inline when their type condition matches the runtime
//! `__typename`.

use serde::Serialize;
use serde_json_bytes::Value;

use crate::error::FetchError;
use crate::graphql::Error;
use crate::json_ext::Object;
use crate::spec::Schema;
use crate::spec::Selection;
use crate::spec::TYPENAME;

/// Serialize the merged, nullability-corrected tree to the response body.
pub(crate) fn format_response_body(
    schema: &Schema,
    selection_set: &[Selection],
    data: &Value,
    errors: &[Error],
) -> Result<Vec<u8>, FetchError> {
    let mut out = Vec::with_capacity(256);
    out.extend_from_slice(b"{\"data\":");
    write_data(schema, selection_set, data, &mut out)?;
    if !errors.is_empty() {
        out.extend_from_slice(b",\"errors\":");
        out.extend_from_slice(&to_json(&errors)?);
    }
    out.push(b'}');
    Ok(out)
}

fn write_data(
    schema: &Schema,
    selection_set: &[Selection],
    value: &Value,
    out: &mut Vec<u8>,
) -> Result<(), FetchError> {
    match value {
        Value::Object(object) => {
            out.push(b'{');
            let mut first = true;
            write_object_selections(schema, selection_set, object, out, &mut first)?;
            out.push(b'}');
            Ok(())
        }
        Value::Array(elements) => {
            out.push(b'[');
            for (index, element) in elements.iter().enumerate() {
                if index > 0 {
                    out.push(b',');
                }
                write_data(schema, selection_set, element, out)?;
            }
            out.push(b']');
            Ok(())
        }
        leaf => {
            out.extend_from_slice(&to_json(leaf)?);
            Ok(())
        }
    }
}

fn write_object_selections(
    schema: &Schema,
    selection_set: &[Selection],
    object: &Object,
    out: &mut Vec<u8>,
    first: &mut bool,
) -> Result<(), FetchError> {
    for selection in selection_set {
        match selection {
            Selection::Field {
                name,
                alias,
                selection_set,
                field_type,
            } => {
                let response_key = alias.as_ref().unwrap_or(name);
                if !*first {
                    out.push(b',');
                }
                *first = false;
                out.extend_from_slice(&to_json(&response_key.as_str())?);
                out.push(b':');

                match object.get(response_key.as_str()) {
                    None => {
                        // bubbling already replaced missing non-null fields
                        if field_type.is_non_null() {
                            return Err(FetchError::FormatMissingField {
                                field: response_key.as_str().to_string(),
                            });
                        }
                        out.extend_from_slice(b"null");
                    }
                    Some(value) => match selection_set {
                        Some(sub_selections) if !value.is_null() => {
                            write_data(schema, sub_selections, value, out)?;
                        }
                        _ => out.extend_from_slice(&to_json(value)?),
                    },
                }
            }
            Selection::InlineFragment {
                type_condition,
                selection_set,
            }
            | Selection::FragmentSpread {
                type_condition,
                selection_set,
                ..
            } => {
                if type_condition_matches(schema, object, type_condition) {
                    write_object_selections(schema, selection_set, object, out, first)?;
                }
            }
        }
    }
    Ok(())
}

/// An absent `__typename` counts as a match: top-level objects never carry
/// one, and the merged schema validated the shape upstream.
fn type_condition_matches(schema: &Schema, object: &Object, type_condition: &str) -> bool {
    match object.get(TYPENAME).and_then(Value::as_str) {
        Some(typename) => typename == type_condition || schema.is_subtype(type_condition, typename),
        None => true,
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>, FetchError> {
    serde_json::to_vec(value).map_err(|err| FetchError::MalformedResponse {
        reason: err.to_string(),
    })
}
