//! HTTP client with request and response interceptors.
//!
//! This module defines two structs, [`Client`] and [`ClientBuilder`].
//! `Client` sends requests through its [`Interceptors`] and the underlying
//! `reqwest` client. `ClientBuilder` exposes a finer level of granularity for
//! building a `Client`.
#![allow(clippy::module_name_repetitions)]
use std::sync::Arc;
use std::time::Duration;

use http::header::{self, HeaderMap, HeaderValue};
use reqwest::{Method, Request, RequestBuilder, Response};
use typed_builder::TypedBuilder;
use url::Url;

use crate::interceptor::{Exchange, Interceptors};
use crate::{ErrorKind, Result};

/// Default number of redirects before a request is deemed as failed, 5.
pub const DEFAULT_MAX_REDIRECTS: usize = 5;
/// Default user agent, `inflight-<PKG_VERSION>`.
pub const DEFAULT_USER_AGENT: &str = concat!("inflight/", env!("CARGO_PKG_VERSION"));

/// Builder for [`Client`].
#[derive(TypedBuilder, Debug, Clone)]
#[builder(field_defaults(default, setter(into)))]
#[builder(builder_method(doc = "
Create a builder for building `ClientBuilder`.

On the builder call, call methods with same name as its fields to set their values.

Finally, call `.build()` to create the instance of `ClientBuilder`.
"))]
pub struct ClientBuilder {
    /// User-agent used for requests.
    #[builder(default = String::from(DEFAULT_USER_AGENT))]
    user_agent: String,

    /// Headers added to every request.
    custom_headers: HeaderMap,

    /// Maximum number of redirects per request before returning an error.
    #[builder(default = DEFAULT_MAX_REDIRECTS)]
    max_redirects: usize,

    /// Response timeout per request. No timeout if `None`.
    timeout: Option<Duration>,

    /// Treat responses outside of the 2xx range as errors.
    ///
    /// Such responses then take the failure branch of the response
    /// interceptors, just like network errors.
    #[builder(default = true)]
    error_for_status: bool,

    /// Interceptor registry to use. Clients built from the same registry
    /// share their interceptors.
    #[builder(default = Arc::new(Interceptors::default()))]
    interceptors: Arc<Interceptors>,
}

impl Default for ClientBuilder {
    #[inline]
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ClientBuilder {
    /// Instantiates a [`Client`].
    ///
    /// # Errors
    ///
    /// Returns an `Err` if:
    /// - The user agent contains characters other than ASCII 32-127.
    /// - The reqwest client cannot be instantiated. This occurs if a TLS
    ///   backend cannot be initialized or the resolver fails to load the system
    ///   configuration. See [here].
    ///
    /// [here]: https://docs.rs/reqwest/latest/reqwest/struct.ClientBuilder.html#errors
    pub fn client(self) -> Result<Client> {
        let Self {
            user_agent,
            custom_headers: mut headers,
            max_redirects,
            timeout,
            error_for_status,
            interceptors,
        } = self;

        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_str(&user_agent)
                .map_err(|e| ErrorKind::Configuration(format!("invalid user agent: {e}")))?,
        );

        let builder = reqwest::ClientBuilder::new()
            .gzip(true)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(max_redirects));

        let reqwest_client = (match timeout {
            Some(t) => builder.timeout(t),
            None => builder,
        })
        .build()
        .map_err(ErrorKind::BuildClient)?;

        Ok(Client {
            reqwest_client,
            interceptors,
            error_for_status,
        })
    }
}

/// Sends requests through its interceptors and the transport.
///
/// Cloning a `Client` is cheap; clones share the connection pool and the
/// interceptor registry.
#[derive(Debug, Clone)]
pub struct Client {
    /// Underlying `reqwest` client instance that handles the HTTP requests.
    reqwest_client: reqwest::Client,
    /// Hooks run around every request.
    interceptors: Arc<Interceptors>,
    /// Turn non-2xx responses into [`ErrorKind::RejectedStatusCode`].
    error_for_status: bool,
}

impl Client {
    /// The interceptor registry of this client
    #[must_use]
    pub fn interceptors(&self) -> &Interceptors {
        &self.interceptors
    }

    /// Start building a request. Send it with [`Client::execute`] once built,
    /// so it goes through the interceptors.
    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.reqwest_client.request(method, url)
    }

    /// Send a `GET` request to `url`
    ///
    /// # Errors
    ///
    /// Returns an `Err` if `url` cannot be parsed, or for the same reasons as
    /// [`Client::execute`].
    pub async fn get(&self, url: &str) -> Result<Response> {
        let url = Url::parse(url)?;
        self.execute(Request::new(Method::GET, url)).await
    }

    /// Send `request` through the request interceptors, the transport and the
    /// response interceptors, in that order.
    ///
    /// The interceptors registered at the time of the call are used for the
    /// whole exchange. Every exchange reaches the response interceptors:
    /// a request interceptor failing is reported to their failure branch.
    ///
    /// The response body is read in full before the response interceptors
    /// run, so they observe the end of the transfer and not just its headers.
    ///
    /// # Errors
    ///
    /// Returns an `Err` if
    /// - a request interceptor rejects the request.
    /// - the transport fails, see [`ErrorKind::NetworkRequest`].
    /// - the response status is not in the 2xx range and the client was built
    ///   with `error_for_status`.
    /// - a response interceptor turns the outcome into an error.
    pub async fn execute(&self, request: Request) -> Result<Response> {
        let mut exchange = Exchange::new(request.method().clone(), request.url().clone());
        let request_chain = self.interceptors.request_chain();
        let response_chain = self.interceptors.response_chain();

        let outcome = match request_chain.traverse(request, &mut exchange).await {
            Ok(request) => self.dispatch(request).await,
            Err(e) => Err(e),
        };

        response_chain.traverse(outcome, &mut exchange).await
    }

    async fn dispatch(&self, request: Request) -> Result<Response> {
        let response = self
            .reqwest_client
            .execute(request)
            .await
            .map_err(ErrorKind::NetworkRequest)?;

        let status = response.status();
        if self.error_for_status && !status.is_success() {
            return Err(ErrorKind::RejectedStatusCode {
                status,
                url: response.url().clone(),
            });
        }
        buffer_body(response).await
    }
}

/// Read the whole body of `response`, so the exchange only completes once
/// nothing is left on the wire.
///
/// The returned response keeps the status, headers and URL of the original.
async fn buffer_body(response: Response) -> Result<Response> {
    let response: http::Response<reqwest::Body> = response.into();
    let (parts, body) = response.into_parts();
    let body = Response::from(http::Response::new(body))
        .bytes()
        .await
        .map_err(ErrorKind::NetworkRequest)?;
    Ok(Response::from(http::Response::from_parts(parts, body)))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use http::StatusCode;
    use pretty_assertions::assert_eq;
    use test_utils::mock_server;

    use super::*;
    use crate::interceptor::{RequestInterceptor, ResponseInterceptor};

    #[derive(Debug, Default)]
    struct Outcomes(Mutex<Vec<String>>);

    #[async_trait]
    impl ResponseInterceptor for Arc<Outcomes> {
        async fn on_response(&self, response: Response, _: &mut Exchange) -> Result<Response> {
            self.0.lock().unwrap().push(response.status().to_string());
            Ok(response)
        }

        async fn on_error(&self, error: ErrorKind, exchange: &mut Exchange) -> ErrorKind {
            self.0
                .lock()
                .unwrap()
                .push(format!("error {} {}", exchange.method(), exchange.url().path()));
            error
        }
    }

    #[derive(Debug)]
    struct Refuse;

    #[async_trait]
    impl RequestInterceptor for Refuse {
        async fn on_request(&self, _: Request, _: &mut Exchange) -> Result<Request> {
            Err(ErrorKind::Configuration("refused".into()))
        }
    }

    #[tokio::test]
    async fn test_get_success() {
        let mock_server = mock_server!(StatusCode::OK);
        let client = ClientBuilder::default().client().unwrap();

        let response = client.get(&mock_server.uri()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_rejected_status_code() {
        let mock_server = mock_server!(StatusCode::INTERNAL_SERVER_ERROR);
        let client = ClientBuilder::default().client().unwrap();

        let error = client.get(&mock_server.uri()).await.unwrap_err();
        assert_eq!(error.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[tokio::test]
    async fn test_status_passed_through_without_error_for_status() {
        let mock_server = mock_server!(StatusCode::INTERNAL_SERVER_ERROR);
        let client = ClientBuilder::builder()
            .error_for_status(false)
            .build()
            .client()
            .unwrap();

        let response = client.get(&mock_server.uri()).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_user_agent_is_sent() {
        let mock_server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::header("user-agent", "agent-007"))
            .respond_with(wiremock::ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;
        let client = ClientBuilder::builder()
            .user_agent("agent-007")
            .build()
            .client()
            .unwrap();

        let response = client.get(&mock_server.uri()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_invalid_user_agent() {
        let result = ClientBuilder::builder()
            .user_agent("new\nline")
            .build()
            .client();
        assert!(matches!(result, Err(ErrorKind::Configuration(_))));
    }

    #[tokio::test]
    async fn test_response_interceptor_sees_both_branches() {
        let ok = mock_server!(StatusCode::OK);
        let failing = mock_server!(StatusCode::NOT_FOUND);
        let client = ClientBuilder::default().client().unwrap();
        let outcomes = Arc::new(Outcomes::default());
        client.interceptors().use_response(Arc::clone(&outcomes));

        client.get(&ok.uri()).await.unwrap();
        client.get(&format!("{}/missing", failing.uri())).await.unwrap_err();

        assert_eq!(
            *outcomes.0.lock().unwrap(),
            vec!["200 OK".to_string(), "error GET /missing".to_string()]
        );
    }

    #[tokio::test]
    async fn test_request_interceptor_error_reaches_failure_branch() {
        let mock_server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;
        let client = ClientBuilder::default().client().unwrap();
        let outcomes = Arc::new(Outcomes::default());
        client.interceptors().use_request(Refuse);
        client.interceptors().use_response(Arc::clone(&outcomes));

        let error = client.get(&mock_server.uri()).await.unwrap_err();
        assert!(matches!(error, ErrorKind::Configuration(_)));
        assert_eq!(*outcomes.0.lock().unwrap(), vec!["error GET /".to_string()]);
    }

    #[tokio::test]
    async fn test_buffered_response_keeps_url_headers_and_body() {
        let mock_server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::path("/greeting"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .insert_header("x-greeting", "polite")
                    .set_body_string("hello"),
            )
            .mount(&mock_server)
            .await;
        let client = ClientBuilder::default().client().unwrap();
        let url = format!("{}/greeting", mock_server.uri());

        let response = client.get(&url).await.unwrap();
        assert_eq!(response.url().as_str(), url);
        assert_eq!(response.headers()["x-greeting"], "polite");
        assert_eq!(response.text().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_network_error() {
        let client = ClientBuilder::default().client().unwrap();
        let error = client.get(&test_utils::closed_port_url()).await.unwrap_err();
        assert!(matches!(error, ErrorKind::NetworkRequest(_)));
    }

    #[tokio::test]
    async fn test_clones_share_interceptors() {
        let client = ClientBuilder::default().client().unwrap();
        let clone = client.clone();
        let id = clone.interceptors().use_request(Refuse);

        assert_eq!(client.interceptors().request_len(), 1);
        assert!(client.interceptors().eject_request(id));
        assert_eq!(clone.interceptors().request_len(), 0);
    }
}
