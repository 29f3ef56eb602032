use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map as JsonMap;
use serde_json_bytes::Value;

use crate::json_ext::Object;

/// A GraphQL request as sent to a downstream service.
///
/// Serializes to the standard GraphQL-over-HTTP POST body.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// The GraphQL operation document.
    pub query: String,

    /// The (optional) GraphQL operation name.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub operation_name: Option<String>,

    /// The (optional) GraphQL variables in the form of a JSON object.
    #[serde(skip_serializing_if = "Object::is_empty", default)]
    pub variables: Object,

    /// The (optional) GraphQL `extensions` of a GraphQL request.
    #[serde(skip_serializing_if = "Object::is_empty", default)]
    pub extensions: Object,
}

#[buildstructor::buildstructor]
impl Request {
    /// Returns a builder that builds a GraphQL [`Request`] from its components.
    ///
    /// Builder methods:
    ///
    /// * `.query(impl Into<`[`String`]`>)`
    ///   Required.
    ///   Sets [`Request::query`].
    ///
    /// * `.operation_name(impl Into<`[`String`]`>)`
    ///   Optional.
    ///   Sets [`Request::operation_name`].
    ///
    /// * `.variables(impl Into<`[`serde_json_bytes::Map`]`<`[`ByteString`]`, `[`Value`]`>>)`
    ///   Optional.
    ///   Sets the entire `variables` map, which defaults to empty.
    ///
    /// * `.extensions(impl Into<`[`serde_json_bytes::Map`]`<`[`ByteString`]`, `[`Value`]`>>)`
    ///   Optional.
    ///   Sets the entire `extensions` map, which defaults to empty.
    ///
    /// * `.build()`
    ///   Finishes the builder and returns a GraphQL [`Request`].
    #[builder(visibility = "pub")]
    fn new(
        query: String,
        operation_name: Option<String>,
        variables: JsonMap<ByteString, Value>,
        extensions: JsonMap<ByteString, Value>,
    ) -> Self {
        Self {
            query,
            operation_name,
            variables,
            extensions,
        }
    }
}
