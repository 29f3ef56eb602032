use bytes::Bytes;
use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map as JsonMap;
use serde_json_bytes::Value;

use crate::graphql::Error;
use crate::json_ext::ensure_object;
use crate::json_ext::extract_key_value_from_object;
use crate::json_ext::Object;

/// The deserialization of a downstream response failed.
#[derive(thiserror::Error, Debug, Eq, PartialEq)]
#[error("GraphQL response was malformed: {reason}")]
pub struct MalformedResponseError {
    /// The reason the deserialization failed.
    pub reason: String,
}

/// A GraphQL response as returned by a downstream service.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// The response data.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<Value>,

    /// The optional GraphQL errors encountered.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<Error>,

    /// The optional GraphQL extensions.
    #[serde(skip_serializing_if = "Object::is_empty", default)]
    pub extensions: Object,
}

#[buildstructor::buildstructor]
impl Response {
    /// Returns a builder that builds a GraphQL [`Response`] from its components.
    #[builder(visibility = "pub")]
    fn new(
        data: Option<Value>,
        errors: Vec<Error>,
        extensions: JsonMap<ByteString, Value>,
    ) -> Self {
        Self {
            data,
            errors,
            extensions,
        }
    }

    /// Create a [`Response`] from the supplied [`Bytes`].
    ///
    /// This will return an error if the input is invalid.
    pub fn from_bytes(b: Bytes) -> Result<Response, MalformedResponseError> {
        let value = Value::from_bytes(b).map_err(|error| MalformedResponseError {
            reason: error.to_string(),
        })?;
        Response::from_value(value)
    }

    /// Create a [`Response`] from the supplied [`Value`].
    pub fn from_value(value: Value) -> Result<Response, MalformedResponseError> {
        let mut object = ensure_object!(value).map_err(|error| MalformedResponseError {
            reason: error.to_string(),
        })?;
        let data = object.remove("data");
        let errors = extract_key_value_from_object!(object, "errors", Value::Array(v) => v)
            .map_err(|err| MalformedResponseError {
                reason: err.to_string(),
            })?
            .into_iter()
            .flatten()
            .map(Error::from_value)
            .collect::<Result<Vec<Error>, MalformedResponseError>>()?;
        let extensions =
            extract_key_value_from_object!(object, "extensions", Value::Object(o) => o)
                .map_err(|err| MalformedResponseError {
                    reason: err.to_string(),
                })?
                .unwrap_or_default();

        // GraphQL spec says:
        // If the data entry in the response is not present, the errors entry in the response must not be empty.
        // It must contain at least one error. The errors it contains should indicate why no data was able to be returned.
        if data.is_none() && errors.is_empty() {
            return Err(MalformedResponseError {
                reason: "graphql response without data must contain at least one error".to_string(),
            });
        }

        Ok(Response {
            data,
            errors,
            extensions,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;

    #[test]
    fn response_from_bytes() {
        let response = Response::from_bytes(Bytes::from_static(
            br#"{"data":{"gizmos":[{"id":"1"}]}}"#,
        ))
        .unwrap();
        assert_eq!(response.data, Some(json!({"gizmos": [{"id": "1"}]})));
        assert!(response.errors.is_empty());
    }

    #[test]
    fn response_with_errors() {
        let response = Response::from_value(json!({
            "data": null,
            "errors": [{ "message": "boom", "path": ["gizmos"] }],
        }))
        .unwrap();
        assert_eq!(response.data, Some(Value::Null));
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].message, "boom");
    }

    #[test]
    fn response_without_data_needs_errors() {
        let result = Response::from_value(json!({ "extensions": {} }));
        assert!(result.is_err());
    }
}
