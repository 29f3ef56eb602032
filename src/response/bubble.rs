//! Null bubbling.
//!
//! Enforces the GraphQL nullability contract on the merged tree: a null in a
//! non-nullable position propagates to the nearest nullable ancestor, and an
//! error is recorded at the offending field's path. If the null reaches the
//! root, the whole response data must be discarded.
//! See <https://spec.graphql.org/June2018/#sec-Errors-and-Non-Nullability>.

use serde_json_bytes::Value;

use crate::error::FetchError;
use crate::graphql::Error;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::json_ext::PathElement;
use crate::spec::FieldType;
use crate::spec::Schema;
use crate::spec::Selection;
use crate::spec::TYPENAME;

/// Rewrite `data` in place, returning the errors produced and, when the null
/// escaped through the root, the alias of the root field it escaped from.
pub(crate) fn bubble_up_null_values_in_place(
    schema: &Schema,
    selection_set: &[Selection],
    data: &mut Value,
) -> Result<(Vec<Error>, Option<String>), FetchError> {
    let mut errors = Vec::new();
    let mut path = Path::empty();
    let mut root_field = None;
    let bubbled = bubble_value(
        schema,
        None,
        selection_set,
        data,
        &mut path,
        &mut errors,
        &mut root_field,
        true,
    )?;
    Ok((errors, if bubbled { root_field } else { None }))
}

#[allow(clippy::too_many_arguments)]
fn bubble_value(
    schema: &Schema,
    current_type: Option<&FieldType>,
    selection_set: &[Selection],
    value: &mut Value,
    path: &mut Path,
    errors: &mut Vec<Error>,
    root_field: &mut Option<String>,
    at_root: bool,
) -> Result<bool, FetchError> {
    match value {
        Value::Object(object) => bubble_object(
            schema,
            selection_set,
            object,
            path,
            errors,
            root_field,
            at_root,
        ),
        Value::Array(elements) => {
            let element_type = current_type.and_then(FieldType::list_element);
            let mut bubble_up = false;
            for (index, element) in elements.iter_mut().enumerate() {
                path.push(PathElement::Index(index));
                let element_bubbled = if element.is_null() {
                    if element_type.as_ref().is_some_and(FieldType::is_non_null) {
                        errors.push(field_error(path));
                        true
                    } else {
                        false
                    }
                } else {
                    bubble_value(
                        schema,
                        element_type.as_ref(),
                        selection_set,
                        element,
                        path,
                        errors,
                        root_field,
                        false,
                    )?
                };
                path.pop();

                if element_bubbled {
                    match &element_type {
                        Some(ty) if ty.is_non_null() => bubble_up = true,
                        _ => *element = Value::Null,
                    }
                }
            }
            Ok(bubble_up)
        }
        // scalars have nothing left to check; shape validation happened upstream
        _ => Ok(false),
    }
}

#[allow(clippy::too_many_arguments)]
fn bubble_object(
    schema: &Schema,
    selection_set: &[Selection],
    object: &mut Object,
    path: &mut Path,
    errors: &mut Vec<Error>,
    root_field: &mut Option<String>,
    at_root: bool,
) -> Result<bool, FetchError> {
    let mut bubble_up = false;
    for selection in selection_set {
        match selection {
            Selection::Field {
                name,
                alias,
                selection_set,
                field_type,
            } => {
                let response_key = alias.as_ref().unwrap_or(name);
                match object.get_mut(response_key.as_str()) {
                    None | Some(Value::Null) => {
                        if field_type.is_non_null() {
                            path.push(PathElement::Key(response_key.as_str().to_string()));
                            errors.push(field_error(path));
                            path.pop();
                            bubble_up = true;
                            if at_root {
                                *root_field = Some(response_key.as_str().to_string());
                            }
                        }
                    }
                    Some(field_value) => {
                        let Some(sub_selections) = selection_set else {
                            continue;
                        };
                        path.push(PathElement::Key(response_key.as_str().to_string()));
                        let lower = bubble_value(
                            schema,
                            Some(field_type),
                            sub_selections,
                            field_value,
                            path,
                            errors,
                            root_field,
                            false,
                        )?;
                        path.pop();
                        if lower {
                            if field_type.is_non_null() {
                                bubble_up = true;
                                if at_root {
                                    *root_field = Some(response_key.as_str().to_string());
                                }
                            } else {
                                *field_value = Value::Null;
                            }
                        }
                    }
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
                let typename = object
                    .get(TYPENAME)
                    .and_then(Value::as_str)
                    .map(|typename| typename.to_owned())
                    .ok_or(FetchError::MissingTypename)?;
                if typename != *type_condition && !schema.is_subtype(type_condition, &typename) {
                    continue;
                }
                // fragments do not change the type context; their bubble
                // propagates transparently
                bubble_up |= bubble_object(
                    schema,
                    selection_set,
                    object,
                    path,
                    errors,
                    root_field,
                    at_root,
                )?;
            }
        }
    }
    Ok(bubble_up)
}

fn field_error(path: &Path) -> Error {
    Error::builder()
        .message("field failed to resolve")
        .path(path.clone())
        .build()
}
