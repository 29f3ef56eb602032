//! Merged-schema and selection-set handling.

mod field_type;
mod schema;
mod selection;

use apollo_compiler::ExecutableDocument;

pub use field_type::FieldType;
pub use schema::Schema;
pub(crate) use selection::render_selection_set;
pub use selection::Selection;

use crate::error::SpecError;

pub(crate) const TYPENAME: &str = "__typename";

/// Parse an operation document against the merged schema and return the
/// selection tree of the requested operation.
///
/// This is the bridge between a textual query and the abstract selection
/// trees the engine consumes; the planner uses it for plan steps and callers
/// use it to obtain the root selection passed to
/// [`merge_and_format`](crate::response::merge_and_format).
pub fn operation_selection_set(
    schema: &Schema,
    source: &str,
    operation_name: Option<&str>,
) -> Result<Vec<Selection>, SpecError> {
    let document =
        ExecutableDocument::parse_and_validate(&schema.definitions, source, "query.graphql")
            .map_err(|invalid| SpecError::ParsingError(invalid.errors.to_string()))?;

    let operation = match operation_name {
        Some(name) => document
            .operations
            .named
            .iter()
            .find(|(operation, _)| operation.as_str() == name)
            .map(|(_, operation)| operation)
            .ok_or_else(|| SpecError::UnknownOperation(name.to_string()))?,
        None => document
            .operations
            .anonymous
            .as_ref()
            .or_else(|| document.operations.named.values().next())
            .ok_or_else(|| SpecError::UnknownOperation(String::new()))?,
    };

    operation
        .selection_set
        .selections
        .iter()
        .map(|selection| Selection::from_executable(selection, &document))
        .collect()
}
