//! Engine errors.

use displaydoc::Display;
use serde::Serialize;
use thiserror::Error;

use crate::graphql;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::json_ext::Value;

/// Error types for execution.
///
/// Note that these are not returned to the client directly, but are instead
/// converted to JSON for [`graphql::Error`].
#[derive(Error, Display, Debug, Clone, Serialize, Eq, PartialEq)]
#[serde(untagged)]
#[ignore_extra_doc_attributes]
#[non_exhaustive]
pub enum FetchError {
    /// HTTP fetch failed from '{service}': {reason}
    ///
    /// note that this relates to a transport error and not a GraphQL error
    SubrequestHttpError {
        /// The service that failed.
        service: String,

        /// The reason the fetch failed.
        reason: String,
    },

    /// service '{service}' response was malformed: {reason}
    SubrequestMalformedResponse {
        /// The service that responded with the malformed response.
        service: String,

        /// The reason the deserialization failed.
        reason: String,
    },

    /// fetch from '{service}' was cancelled
    SubrequestCancelled {
        /// The service the cancelled fetch was addressed to.
        service: String,
    },

    /// root step on type '{parent_type}' is neither a query nor a mutation
    InvalidRootStepKind { parent_type: String },

    /// no boundary query is registered for type '{parent_type}' on service '{service}'
    MissingBoundaryQuery {
        service: String,
        parent_type: String,
    },

    /// expected an object or an array while collecting boundary ids, found {found}
    BoundaryTypeMismatch { found: String },

    /// boundary record carries neither '_id' nor 'id'
    BoundaryMissingIdentifier,

    /// boundary response was malformed: {reason}
    BoundaryResponseShape { reason: String },

    /// array boundary step must produce exactly one document, got {count}
    BoundaryDocumentCount { count: usize },

    /// invalid value shape while merging results: {reason}
    MergeShape { reason: String },

    /// a fragment was applied to a value without a string '__typename'
    MissingTypename,

    /// synthetic step must select nothing but '__typename' fields: {reason}
    SyntheticStepShape { reason: String },

    /// no value for non-nullable field '{field}' in the assembled response
    FormatMissingField { field: String },

    /// response body could not be serialized: {reason}
    MalformedResponse { reason: String },
}

impl FetchError {
    /// Convert the fetch error to a GraphQL error.
    pub fn to_graphql_error(&self, path: Option<Path>) -> graphql::Error {
        let mut extensions = match serde_json_bytes::to_value(self) {
            Ok(Value::Object(extensions)) => extensions,
            _ => Object::default(),
        };
        extensions
            .entry("code")
            .or_insert_with(|| self.extension_code().into());

        graphql::Error {
            message: self.to_string(),
            locations: Default::default(),
            path,
            extensions,
        }
    }

    pub(crate) fn extension_code(&self) -> &'static str {
        match self {
            FetchError::SubrequestHttpError { .. } => "SUBREQUEST_HTTP_ERROR",
            FetchError::SubrequestMalformedResponse { .. } => "SUBREQUEST_MALFORMED_RESPONSE",
            FetchError::SubrequestCancelled { .. } => "SUBREQUEST_CANCELLED",
            FetchError::InvalidRootStepKind { .. } => "INVALID_ROOT_STEP_KIND",
            FetchError::MissingBoundaryQuery { .. } => "MISSING_BOUNDARY_QUERY",
            FetchError::BoundaryTypeMismatch { .. } => "BOUNDARY_TYPE_MISMATCH",
            FetchError::BoundaryMissingIdentifier => "BOUNDARY_MISSING_IDENTIFIER",
            FetchError::BoundaryResponseShape { .. } => "BOUNDARY_RESPONSE_SHAPE",
            FetchError::BoundaryDocumentCount { .. } => "BOUNDARY_DOCUMENT_COUNT",
            FetchError::MergeShape { .. } => "MERGE_SHAPE",
            FetchError::MissingTypename => "MISSING_TYPENAME",
            FetchError::SyntheticStepShape { .. } => "SYNTHETIC_STEP_SHAPE",
            FetchError::FormatMissingField { .. } => "FORMAT_MISSING_FIELD",
            FetchError::MalformedResponse { .. } => "MALFORMED_RESPONSE",
        }
    }
}

/// Error types for schema loading.
#[derive(Error, Display, Debug)]
#[non_exhaustive]
pub enum SchemaError {
    /// could not parse schema: {0}
    Parse(String),
}

/// Error types for operation document handling.
#[derive(Error, Display, Debug, Clone, Eq, PartialEq)]
#[non_exhaustive]
pub enum SpecError {
    /// could not parse the operation document: {0}
    ParsingError(String),

    /// no operation named '{0}' in the document
    UnknownOperation(String),

    /// fragment '{0}' is not defined in the document
    UnknownFragment(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_to_graphql_error_carries_context() {
        let error = FetchError::SubrequestHttpError {
            service: "gizmos".to_string(),
            reason: "connection refused".to_string(),
        }
        .to_graphql_error(None);

        assert_eq!(
            error.message,
            "HTTP fetch failed from 'gizmos': connection refused"
        );
        assert_eq!(
            error.extensions.get("code").and_then(|v| v.as_str()),
            Some("SUBREQUEST_HTTP_ERROR")
        );
        assert_eq!(
            error.extensions.get("service").and_then(|v| v.as_str()),
            Some("gizmos")
        );
    }

    #[test]
    fn unit_variant_still_gets_a_code() {
        let error = FetchError::BoundaryMissingIdentifier.to_graphql_error(None);
        assert_eq!(
            error.extensions.get("code").and_then(|v| v.as_str()),
            Some("BOUNDARY_MISSING_IDENTIFIER")
        );
    }
}
