//! The merged GraphQL schema.

use apollo_compiler::validation::Valid;

use crate::error::SchemaError;

/// The merged schema the gateway serves.
///
/// Read-only for the engine: it only consults type relationships and field
/// nullability that the schema merger baked in.
#[derive(Debug)]
pub struct Schema {
    pub(crate) definitions: Valid<apollo_compiler::Schema>,
}

impl Schema {
    /// Parse and validate an SDL string.
    pub fn parse(sdl: &str) -> Result<Self, SchemaError> {
        let definitions = apollo_compiler::Schema::parse_and_validate(sdl, "schema.graphql")
            .map_err(|invalid| SchemaError::Parse(invalid.errors.to_string()))?;

        Ok(Schema { definitions })
    }

    /// Whether `maybe_subtype` is a member of the abstract type
    /// `abstract_type` (an object implementing an interface, or a union
    /// member). Schema metadata, not language polymorphism.
    pub(crate) fn is_subtype(&self, abstract_type: &str, maybe_subtype: &str) -> bool {
        self.definitions.is_subtype(abstract_type, maybe_subtype)
    }
}
