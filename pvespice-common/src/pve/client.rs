use crate::error::Error;
use crate::pve::models::{AuthTicket, Envelope};
use crate::pve::tls::TlsPolicy;
use crate::settings::VmId;
use anyhow::{anyhow, Context, Result};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{CONTENT_TYPE, COOKIE};
use hyper::{Method, Request};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::future::Future;
use tracing::{debug, info, warn};

/// Name of the cookie carrying the session ticket
pub const AUTH_COOKIE: &str = "PVEAuthCookie";

/// Header carrying the anti-forgery token
pub const CSRF_HEADER: &str = "CSRFPreventionToken";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

type HttpsClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

/// Authenticated calls scoped to a single VM.
///
/// `path` is relative to `/nodes/{node}/qemu/{vmid}`, e.g. `/status/current`.
/// The raw response body is returned whatever the HTTP status.
pub trait VmApi {
    fn call(
        &self,
        method: Method,
        path: &str,
        form: &[(&str, &str)],
    ) -> impl Future<Output = Result<Bytes>>;
}

/// Base URL of the management API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoint {
    base_url: String,
}

impl ApiEndpoint {
    /// Port the management API listens on
    pub const DEFAULT_PORT: u16 = 8006;

    /// `https://{host}:{port}/api2/json`
    pub fn https(host: &str, port: u16) -> Self {
        let host = if host.contains(':') && !host.starts_with('[') {
            format!("[{host}]")
        } else {
            host.to_string()
        };
        Self {
            base_url: format!("https://{host}:{port}/api2/json"),
        }
    }

    /// Use an explicit base URL such as `http://127.0.0.1:8006/api2/json`
    pub fn from_base_url(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Login material plus the two tokens issued by a successful login
#[derive(Clone)]
pub struct SessionCredentials {
    pub host: String,
    pub username: String,
    secret: String,
    ticket: String,
    csrf_token: String,
}

impl std::fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}

impl SessionCredentials {
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            secret: secret.into(),
            ticket: String::new(),
            csrf_token: String::new(),
        }
    }

    /// Both issued tokens are present
    pub fn is_authenticated(&self) -> bool {
        !self.ticket.is_empty() && !self.csrf_token.is_empty()
    }
}

/// HTTPS client for the cluster management API
pub struct PveClient {
    endpoint: ApiEndpoint,
    credentials: SessionCredentials,
    node: String,
    vmid: VmId,
    client: HttpsClient,
}

impl PveClient {
    /// Create a client for one VM on one node. No request is made yet.
    pub fn new(
        endpoint: ApiEndpoint,
        credentials: SessionCredentials,
        node: impl Into<String>,
        vmid: VmId,
        tls: &TlsPolicy,
    ) -> crate::Result<Self> {
        let tls_config = tls.client_config().map_err(Error::Tls)?;
        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http()
            .enable_http1()
            .build();
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Self {
            endpoint,
            credentials,
            node: node.into(),
            vmid,
            client,
        })
    }

    /// Exchange username and secret for a ticket and anti-forgery token.
    ///
    /// Succeeds only when the response carries both tokens; they are stored
    /// on the session credentials for every later call.
    #[tracing::instrument(
        name = "pve.authenticate",
        skip(self),
        fields(host = %self.credentials.host, username = %self.credentials.username)
    )]
    pub async fn authenticate(&mut self) -> crate::Result<()> {
        let form = encode_form(&[
            ("username", self.credentials.username.as_str()),
            ("password", self.credentials.secret.as_str()),
        ]);

        let request = Request::builder()
            .method(Method::POST)
            .uri(self.endpoint.url("/access/ticket"))
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(Full::new(Bytes::from(form)))
            .context("Failed to build request")
            .map_err(Error::AuthTransport)?;

        let body = self.send(request).await.map_err(Error::AuthTransport)?;

        let envelope: Envelope<AuthTicket> = serde_json::from_slice(&body)
            .map_err(|e| Error::Auth(format!("malformed response: {e}")))?;
        let data = envelope
            .data
            .ok_or_else(|| Error::Auth("credentials rejected".to_string()))?;

        let ticket = non_empty(data.ticket)
            .ok_or_else(|| Error::Auth("response missing ticket".to_string()))?;
        let csrf_token = non_empty(data.csrf_prevention_token)
            .ok_or_else(|| Error::Auth(format!("response missing {CSRF_HEADER}")))?;

        self.credentials.ticket = ticket;
        self.credentials.csrf_token = csrf_token;

        info!("Authenticated");
        Ok(())
    }

    /// Path of this VM's API subtree plus `path`
    fn vm_path(&self, path: &str) -> String {
        format!("/nodes/{}/qemu/{}{}", self.node, self.vmid, path)
    }

    async fn send(&self, request: Request<Full<Bytes>>) -> Result<Bytes> {
        let response = self
            .client
            .request(request)
            .await
            .context("Failed to send request")?;

        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .context("Failed to read response body")?
            .to_bytes();

        if status.is_success() {
            debug!(%status, bytes = body.len(), "API response");
        } else {
            warn!(%status, "API returned non-success status");
        }

        Ok(body)
    }
}

impl VmApi for PveClient {
    #[tracing::instrument(name = "pve.call", skip(self, form), fields(method = %method, path = %path))]
    async fn call(&self, method: Method, path: &str, form: &[(&str, &str)]) -> Result<Bytes> {
        if !self.credentials.is_authenticated() {
            return Err(anyhow!("Session is not authenticated"));
        }

        let mut builder = Request::builder()
            .method(method)
            .uri(self.endpoint.url(&self.vm_path(path)))
            .header(CSRF_HEADER, self.credentials.csrf_token.as_str())
            .header(COOKIE, format!("{AUTH_COOKIE}={}", self.credentials.ticket));

        let body = if form.is_empty() {
            Bytes::new()
        } else {
            builder = builder.header(CONTENT_TYPE, FORM_CONTENT_TYPE);
            Bytes::from(encode_form(form))
        };

        let request = builder
            .body(Full::new(body))
            .context("Failed to build request")?;

        self.send(request).await
    }
}

fn encode_form(pairs: &[(&str, &str)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.iter().copied())
        .finish()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
