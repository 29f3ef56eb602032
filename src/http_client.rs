//! The injectable downstream client.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::graphql::Request;
use crate::graphql::Response;

/// A client able to send a GraphQL document to a downstream service.
///
/// The engine owns document construction and response interpretation; the
/// client owns the transport. Implementations are expected to honor the
/// caller's cancellation by resolving promptly once their I/O is aborted.
#[async_trait]
pub trait GraphqlClient: Send + Sync {
    /// POST `request` to `service_url` and return the parsed response.
    async fn request(&self, service_url: &str, request: Request) -> Result<Response, FetchError>;
}

/// A [`GraphqlClient`] over HTTP.
#[derive(Clone, Debug, Default)]
pub struct HttpGraphqlClient {
    http_client: reqwest::Client,
}

impl HttpGraphqlClient {
    /// Construct a client with a default connection pool.
    pub fn new() -> Self {
        Self {
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl GraphqlClient for HttpGraphqlClient {
    async fn request(&self, service_url: &str, request: Request) -> Result<Response, FetchError> {
        let response = self
            .http_client
            .post(service_url)
            .json(&request)
            .send()
            .await
            .map_err(|err| {
                tracing::error!(fetch_error = err.to_string().as_str());

                FetchError::SubrequestHttpError {
                    service: service_url.to_owned(),
                    reason: err.to_string(),
                }
            })?;

        let body = response.bytes().await.map_err(|err| {
            tracing::error!(fetch_error = err.to_string().as_str());

            FetchError::SubrequestHttpError {
                service: service_url.to_owned(),
                reason: err.to_string(),
            }
        })?;

        Response::from_bytes(body).map_err(|err| FetchError::SubrequestMalformedResponse {
            service: service_url.to_owned(),
            reason: err.to_string(),
        })
    }
}

/// A [`GraphqlClient`] test double serving canned responses, keyed by
/// `(service_url, document)`.
///
/// Unknown documents resolve to a transport error naming the document, so a
/// test immediately shows which dispatch it did not expect.
#[derive(Clone, Default)]
pub struct MockGraphqlClient {
    mocks: Arc<HashMap<(String, String), Response>>,
}

impl MockGraphqlClient {
    pub fn new(mocks: HashMap<(String, String), Response>) -> Self {
        Self {
            mocks: Arc::new(mocks),
        }
    }
}

#[async_trait]
impl GraphqlClient for MockGraphqlClient {
    async fn request(&self, service_url: &str, request: Request) -> Result<Response, FetchError> {
        match self
            .mocks
            .get(&(service_url.to_string(), request.query.clone()))
        {
            Some(response) => Ok(response.clone()),
            None => Err(FetchError::SubrequestHttpError {
                service: service_url.to_owned(),
                reason: format!("no mock registered for document {:?}", request.query),
            }),
        }
    }
}
