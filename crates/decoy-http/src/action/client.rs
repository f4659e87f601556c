//! Outbound HTTP client used by forward actions and webhooks.
//!
//! [`HttpClient`] is the seam the dispatcher depends on; [`HyperHttpClient`] is
//! the pooled production implementation on hyper-util with rustls.

use crate::config::ClientConfig;
use crate::model::{HttpRequest, HttpResponse, Scheme, SocketAddress};
use crate::server::convert::{cookie_header, response_from_hyper};
use crate::server::headers::{is_hop_by_hop, HeaderBuilderExt};
use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{CONTENT_LENGTH, COOKIE, HOST};
use hyper::Request;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("no target host: request has no socket address and no Host header")]
    NoTarget,
    #[error("invalid request to {target}: {message}")]
    InvalidRequest { target: String, message: String },
    #[error("request to {target} failed: {message}")]
    Connect { target: String, message: String },
    #[error("request to {target} timed out after {timeout:?}")]
    Timeout { target: String, timeout: Duration },
    #[error("failed to read response from {target}: {message}")]
    Body { target: String, message: String },
    #[error("failed to load TLS roots: {0}")]
    Tls(String),
}

/// Sends a model request and returns the model response.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Send `request` to `target`, or to the request's own socket address or
    /// `Host` header when `target` is `None`.
    async fn send(
        &self,
        request: HttpRequest,
        target: Option<SocketAddress>,
    ) -> Result<HttpResponse, ClientError>;
}

/// Destination for `request`: explicit target, socket address, then `Host` header.
pub fn resolve_target(
    request: &HttpRequest,
    target: Option<SocketAddress>,
) -> Result<SocketAddress, ClientError> {
    if let Some(target) = target.or_else(|| request.socket_address.clone()) {
        return Ok(target);
    }
    let host = request.get_first_header(HOST.as_str()).ok_or(ClientError::NoTarget)?;
    let scheme = if request.secure.unwrap_or(false) {
        Scheme::Https
    } else {
        Scheme::Http
    };
    let default_port = if scheme == Scheme::Https { 443 } else { 80 };
    let address = match host.rsplit_once(':') {
        Some((name, port)) => match port.parse::<u16>() {
            Ok(port) => SocketAddress::new(name, port, scheme),
            Err(_) => SocketAddress::new(host, default_port, scheme),
        },
        None => SocketAddress::new(host, default_port, scheme),
    };
    Ok(address)
}

type PooledClient = Client<hyper_rustls::HttpsConnector<HttpConnector>, Full<Bytes>>;

pub struct HyperHttpClient {
    client: PooledClient,
    request_timeout: Duration,
}

impl HyperHttpClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let mut http_connector = HttpConnector::new();
        http_connector.set_connect_timeout(Some(Duration::from_millis(config.connect_timeout_ms)));
        http_connector.enforce_http(false);

        let https_connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_provider_and_native_roots(rustls::crypto::ring::default_provider())
            .map_err(|e| ClientError::Tls(e.to_string()))?
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector);

        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(config.max_idle_per_host)
            .build(https_connector);

        info!(
            "Outbound client configured: connect_timeout={}ms, request_timeout={}ms, max_idle={}",
            config.connect_timeout_ms, config.request_timeout_ms, config.max_idle_per_host
        );

        Ok(Self {
            client,
            request_timeout: Duration::from_millis(config.request_timeout_ms),
        })
    }

    fn build_request(
        request: &HttpRequest,
        target: &SocketAddress,
    ) -> Result<Request<Full<Bytes>>, ClientError> {
        let uri = format!(
            "{}://{}:{}{}",
            target.scheme.as_str(),
            target.host,
            target.port,
            request.path_and_query()
        );
        let mut builder = Request::builder().method(request.method_str()).uri(&uri);

        let mut has_cookie_header = false;
        for entry in request.headers.entries() {
            let name = entry.name.as_str();
            if is_hop_by_hop(name)
                || name.eq_ignore_ascii_case(HOST.as_str())
                || name.eq_ignore_ascii_case(CONTENT_LENGTH.as_str())
            {
                continue;
            }
            has_cookie_header |= name.eq_ignore_ascii_case(COOKIE.as_str());
            for value in &entry.values {
                builder = builder.try_header(name, value.as_str());
            }
        }
        if !has_cookie_header {
            if let Some(cookies) = cookie_header(&request.cookies) {
                builder = builder.try_header(COOKIE.as_str(), &cookies);
            }
        }
        let default_port = match target.scheme {
            Scheme::Http => 80,
            Scheme::Https => 443,
        };
        let host = if target.port == default_port {
            target.host.clone()
        } else {
            format!("{}:{}", target.host, target.port)
        };
        builder = builder.try_header(HOST.as_str(), &host);

        let body = request
            .body
            .as_ref()
            .map(|b| Bytes::from(b.raw_bytes()))
            .unwrap_or_default();
        builder
            .body(Full::new(body))
            .map_err(|e| ClientError::InvalidRequest {
                target: uri,
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl HttpClient for HyperHttpClient {
    async fn send(
        &self,
        request: HttpRequest,
        target: Option<SocketAddress>,
    ) -> Result<HttpResponse, ClientError> {
        let target = resolve_target(&request, target)?;
        let outbound = Self::build_request(&request, &target)?;
        let target_name = target.to_string();
        debug!("Sending {} to {}", request, target_name);

        let response = tokio::time::timeout(self.request_timeout, self.client.request(outbound))
            .await
            .map_err(|_| ClientError::Timeout {
                target: target_name.clone(),
                timeout: self.request_timeout,
            })?
            .map_err(|e| ClientError::Connect {
                target: target_name.clone(),
                message: e.to_string(),
            })?;

        let (parts, body) = response.into_parts();
        let bytes = body
            .collect()
            .await
            .map_err(|e| ClientError::Body {
                target: target_name.clone(),
                message: e.to_string(),
            })?
            .to_bytes();
        debug!("Received {} from {}", parts.status, target_name);
        Ok(response_from_hyper(&parts, &bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Body;

    #[test]
    fn test_resolve_target_order() {
        let explicit = SocketAddress::new("explicit", 9000, Scheme::Http);
        let request = HttpRequest::new()
            .with_header("Host", ["from-header:8081"])
            .with_socket_address(SocketAddress::new("from-socket", 8080, Scheme::Http));

        assert_eq!(
            resolve_target(&request, Some(explicit.clone())).unwrap(),
            explicit
        );
        assert_eq!(resolve_target(&request, None).unwrap().host, "from-socket");

        let header_only = HttpRequest::new().with_header("Host", ["from-header:8081"]);
        let resolved = resolve_target(&header_only, None).unwrap();
        assert_eq!((resolved.host.as_str(), resolved.port), ("from-header", 8081));

        let secure = HttpRequest::new().with_header("Host", ["secure"]).with_secure(true);
        let resolved = resolve_target(&secure, None).unwrap();
        assert_eq!((resolved.port, resolved.scheme), (443, Scheme::Https));

        assert!(matches!(
            resolve_target(&HttpRequest::new(), None),
            Err(ClientError::NoTarget)
        ));
    }

    #[test]
    fn test_build_request() {
        let request = HttpRequest::new()
            .with_method("POST")
            .with_path("/orders")
            .with_query_parameter("page", ["2"])
            .with_header("Connection", ["keep-alive"])
            .with_header("Host", ["original"])
            .with_header("X-Trace", ["t1"])
            .with_cookie("session", "abc")
            .with_body(Body::string("payload"));
        let target = SocketAddress::new("upstream", 8080, Scheme::Http);

        let outbound = HyperHttpClient::build_request(&request, &target).unwrap();
        assert_eq!(outbound.uri(), "http://upstream:8080/orders?page=2");
        assert_eq!(outbound.method(), "POST");
        assert_eq!(outbound.headers()["host"], "upstream:8080");
        assert_eq!(outbound.headers()["cookie"], "session=abc");
        assert_eq!(outbound.headers()["x-trace"], "t1");
        assert!(outbound.headers().get("connection").is_none());
    }
}
