//! Upstream HTTP plumbing shared by the job-server and hosted-build clients.
//!
//! [`HttpClient`] owns a normalized base URL, optional credentials and a
//! transport; it turns [`Request`]s into decoded JSON or typed [`Error`]s.

pub(crate) mod diagnostics;
pub(crate) mod endpoint;
#[cfg(feature = "metrics")]
pub(crate) mod metrics;
pub mod request;
pub mod transport;

pub use request::{Request, Response};
pub use transport::{AsyncTransport, DynAsyncTransport, ReqwestAsync, TransportRequest};

use crate::{Auth, BodySnippetConfig, Error, HttpError};
use http::HeaderMap;
use serde::de::DeserializeOwned;
use std::{sync::Arc, time::Duration};
use tracing::{Instrument, field};
use url::Url;

use self::{
    diagnostics::{body_snippet, extract_message, redact_text},
    endpoint::{endpoint_url, normalize_base_url, sanitize_url_for_error},
};

const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Per-client transport settings, passed explicitly to every client constructor.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
    /// Accept invalid TLS certificates (**dangerous**).
    pub insecure: bool,
    /// Ignore system proxy environment variables.
    pub no_proxy: bool,
    /// Log request URLs and response bodies at `debug` level.
    pub debug: bool,
    pub body_snippet: BodySnippetConfig,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            insecure: false,
            no_proxy: false,
            debug: false,
            body_snippet: BodySnippetConfig::default(),
        }
    }
}

/// Configures and constructs [`HttpClient`].
pub struct HttpClientBuilder {
    base_url: Url,
    auth: Option<Auth>,
    default_headers: HeaderMap,
    options: ClientOptions,
    transport: Option<DynAsyncTransport>,
}

impl HttpClientBuilder {
    fn try_new(base: &str) -> Result<Self, Error> {
        Ok(Self {
            base_url: normalize_base_url(base)?,
            auth: None,
            default_headers: HeaderMap::new(),
            options: ClientOptions::default(),
            transport: None,
        })
    }

    pub fn auth(mut self, auth: Option<Auth>) -> Self {
        self.auth = auth;
        self
    }

    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Add a default header applied to every request.
    pub fn default_header(
        mut self,
        name: http::header::HeaderName,
        value: http::HeaderValue,
    ) -> Self {
        self.default_headers.insert(name, value);
        self
    }

    /// Replace the default `reqwest` transport.
    pub fn transport(mut self, transport: DynAsyncTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Result<HttpClient, Error> {
        let transport: DynAsyncTransport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestAsync::try_new(
                self.options.insecure,
                &self.options.user_agent,
                self.options.timeout,
                self.options.connect_timeout,
                self.options.no_proxy,
            )?),
        };

        Ok(HttpClient {
            inner: Arc::new(Inner {
                base: self.base_url,
                auth: self.auth,
                default_headers: self.default_headers,
                options: self.options,
                transport,
            }),
        })
    }
}

#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<Inner>,
}

struct Inner {
    base: Url,
    auth: Option<Auth>,
    default_headers: HeaderMap,
    options: ClientOptions,
    transport: DynAsyncTransport,
}

impl HttpClient {
    pub fn builder(base: impl AsRef<str>) -> Result<HttpClientBuilder, Error> {
        HttpClientBuilder::try_new(base.as_ref())
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base
    }

    pub async fn send_json<T: DeserializeOwned>(&self, req: Request) -> Result<T, Error> {
        let resp = self.execute_request(&req).await?;
        resp.json().map_err(|source| {
            let path = endpoint_url(&self.inner.base, req.segments.iter().map(String::as_str))
                .map(|url| url.path().to_owned())
                .unwrap_or_default();
            Error::Decode {
                status: resp.status,
                method: req.method,
                path: path.into_boxed_str(),
                body_snippet: body_snippet(
                    &resp.body,
                    self.inner.options.body_snippet,
                    self.inner.auth.as_ref(),
                ),
                source: Box::new(source),
            }
        })
    }

    pub async fn execute_request(&self, req: &Request) -> Result<Response, Error> {
        #[cfg(feature = "metrics")]
        let _inflight = metrics::InFlightGuard::new();

        let url = endpoint_url(&self.inner.base, req.segments.iter().map(String::as_str))?;
        let host = self.inner.base.host_str().unwrap_or_default().to_owned();

        let mut headers = self.inner.default_headers.clone();
        if let Some(auth) = &self.inner.auth {
            auth.apply(&mut headers)?;
        }

        let span = tracing::info_span!(
            "upstream.request",
            http.method = %req.method,
            http.host = %host,
            http.path = %url.path(),
            http.status = field::Empty,
            latency_ms = field::Empty,
            error_kind = field::Empty,
        );

        if self.inner.options.debug {
            tracing::debug!(parent: &span, url = %url, query = ?req.query, "sending upstream request");
        }

        let start = std::time::Instant::now();
        let result = self
            .inner
            .transport
            .send(TransportRequest {
                method: req.method.clone(),
                url: url.clone(),
                headers,
                query: req.query.clone(),
                timeout: self.inner.options.timeout,
            })
            .instrument(span.clone())
            .await;
        span.record(
            "latency_ms",
            u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        );

        let resp = match result {
            Ok(resp) => resp,
            Err(err) => {
                span.record("error_kind", field::debug(err.kind()));
                #[cfg(feature = "metrics")]
                metrics::record_outcome(&host, None, start.elapsed(), Some(err.kind()));
                return Err(err);
            }
        };

        span.record("http.status", u64::from(resp.status.as_u16()));
        if self.inner.options.debug {
            let snippet = body_snippet(
                &resp.body,
                self.inner.options.body_snippet,
                self.inner.auth.as_ref(),
            );
            tracing::debug!(
                parent: &span,
                status = resp.status.as_u16(),
                body = snippet.as_deref().unwrap_or_default(),
                "received upstream response"
            );
        }

        if resp.status.is_success() {
            #[cfg(feature = "metrics")]
            metrics::record_outcome(&host, Some(resp.status), start.elapsed(), None);
            return Ok(Response {
                status: resp.status,
                headers: resp.headers,
                body: resp.body,
            });
        }

        let message = extract_message(&resp.body)
            .map(|msg| redact_text(msg.into(), self.inner.auth.as_ref()).into_boxed_str());
        let err = Error::from_http(HttpError {
            status: resp.status,
            method: req.method.clone(),
            url: Box::new(sanitize_url_for_error(&url)),
            message,
            body_snippet: body_snippet(
                &resp.body,
                self.inner.options.body_snippet,
                self.inner.auth.as_ref(),
            ),
        });
        span.record("error_kind", field::debug(err.kind()));
        #[cfg(feature = "metrics")]
        metrics::record_outcome(&host, Some(resp.status), start.elapsed(), Some(err.kind()));

        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use async_trait::async_trait;
    use http::{HeaderValue, StatusCode, header::AUTHORIZATION};
    use std::sync::Mutex;
    use transport::TransportResponse;

    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<TransportRequest>>,
        status: Option<StatusCode>,
        body: &'static str,
    }

    #[async_trait]
    impl AsyncTransport for Recording {
        async fn send(&self, req: TransportRequest) -> Result<TransportResponse, Error> {
            self.seen.lock().unwrap().push(req);
            Ok(TransportResponse {
                status: self.status.unwrap_or(StatusCode::OK),
                headers: HeaderMap::new(),
                body: self.body.as_bytes().to_vec(),
            })
        }
    }

    fn client(transport: Arc<Recording>, auth: Option<Auth>) -> HttpClient {
        HttpClient::builder("https://ci.example.com/base")
            .unwrap()
            .auth(auth)
            .default_header(
                http::header::HeaderName::from_static("x-board"),
                HeaderValue::from_static("1"),
            )
            .transport(transport)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn request_carries_base_path_query_and_headers() {
        let transport = Arc::new(Recording {
            body: r#"{"busyExecutors": 4}"#,
            ..Recording::default()
        });
        let client = client(Arc::clone(&transport), Some(Auth::token("abc")));

        let value: serde_json::Value = client
            .send_json(Request::get(["computer", "api", "json"]).query_pair("tree", "busyExecutors"))
            .await
            .unwrap();

        assert_eq!(value["busyExecutors"], 4);
        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].url.as_str(), "https://ci.example.com/base/computer/api/json");
        assert_eq!(seen[0].query, [("tree".to_owned(), "busyExecutors".to_owned())]);
        assert_eq!(seen[0].headers["x-board"], "1");
        assert_eq!(seen[0].headers[AUTHORIZATION], "token abc");
        assert!(seen[0].headers[AUTHORIZATION].is_sensitive());
    }

    #[tokio::test]
    async fn error_body_is_redacted() {
        let transport = Arc::new(Recording {
            status: Some(StatusCode::INTERNAL_SERVER_ERROR),
            body: r#"{"message": "bad token abc"}"#,
            ..Recording::default()
        });
        let client = client(transport, Some(Auth::token("abc")));

        let err = client
            .send_json::<serde_json::Value>(Request::get(["queue", "api", "json"]))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Remote);
        let Error::Remote(remote) = &err else {
            panic!("expected remote error, got {err:?}");
        };
        assert_eq!(remote.message.as_deref(), Some("bad token <redacted>"));
        assert!(!remote.body_snippet.as_deref().unwrap_or_default().contains("abc"));
    }
}
