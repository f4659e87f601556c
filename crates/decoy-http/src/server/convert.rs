//! Conversion between hyper messages and model requests and responses.

use super::headers::is_hop_by_hop;
use crate::model::{
    parse_form_parameters, Body, HttpRequest, HttpResponse, KeysAndValues, KeysToMultiValues,
    NottableString, Scheme, SocketAddress,
};
use hyper::header::{CONNECTION, CONTENT_TYPE, COOKIE, HOST, SET_COOKIE};
use hyper::http::{request, response};
use hyper::{HeaderMap, Version};
use std::net::SocketAddr;

/// Build a model request from a received hyper request.
pub fn request_from_hyper(
    parts: &request::Parts,
    body: &[u8],
    secure: bool,
    local_addr: SocketAddr,
) -> HttpRequest {
    let content_type = header_str(&parts.headers, CONTENT_TYPE.as_str());
    let mut request = HttpRequest::new()
        .with_method(NottableString::string(parts.method.as_str()))
        .with_path(NottableString::string(parts.uri.path()))
        .with_keep_alive(is_keep_alive(parts.version, &parts.headers))
        .with_secure(secure);
    request.query_string_parameters = parts
        .uri
        .query()
        .map(parse_form_parameters)
        .unwrap_or_default();
    request.headers = headers_from_hyper(&parts.headers, false);
    request.cookies = cookies_from_headers(&parts.headers);
    request.body = Body::from_incoming(body, content_type.as_deref());
    request.socket_address = Some(socket_address(&parts.headers, secure, local_addr));
    request
}

/// Build a model response from an upstream hyper response.
pub fn response_from_hyper(parts: &response::Parts, body: &[u8]) -> HttpResponse {
    let content_type = header_str(&parts.headers, CONTENT_TYPE.as_str());
    let mut response = HttpResponse::new().with_status_code(parts.status.as_u16());
    if let Some(reason) = parts.status.canonical_reason() {
        response = response.with_reason_phrase(reason);
    }
    response.headers = headers_from_hyper(&parts.headers, true);
    response.cookies = set_cookies_from_headers(&parts.headers);
    response.body = Body::from_incoming(body, content_type.as_deref());
    response
}

/// Copy headers into a model map, optionally dropping hop-by-hop headers.
pub fn headers_from_hyper(headers: &HeaderMap, skip_hop_by_hop: bool) -> KeysToMultiValues {
    let mut map = KeysToMultiValues::new();
    for (name, value) in headers {
        if skip_hop_by_hop && is_hop_by_hop(name.as_str()) {
            continue;
        }
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        map.add_values(
            NottableString::string(name.as_str()),
            vec![NottableString::string(value)],
        );
    }
    map
}

/// Parse `name=value; name2=value2` pairs.
pub fn parse_cookie_header(header: &str) -> Vec<(String, String)> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            let name = name.trim();
            let value = value.trim().trim_matches('"');
            (!name.is_empty()).then(|| (name.to_string(), value.to_string()))
        })
        .collect()
}

/// Render model cookies as a `Cookie` header value.
pub fn cookie_header(cookies: &KeysAndValues) -> Option<String> {
    if cookies.is_empty() {
        return None;
    }
    let pairs: Vec<String> = cookies
        .entries()
        .iter()
        .map(|c| format!("{}={}", c.name.as_str(), c.value.as_str()))
        .collect();
    Some(pairs.join("; "))
}

fn cookies_from_headers(headers: &HeaderMap) -> KeysAndValues {
    let mut cookies = KeysAndValues::new();
    for value in headers.get_all(COOKIE) {
        let Ok(value) = value.to_str() else { continue };
        for (name, value) in parse_cookie_header(value) {
            cookies.put(NottableString::string(name), NottableString::string(value));
        }
    }
    cookies
}

fn set_cookies_from_headers(headers: &HeaderMap) -> KeysAndValues {
    let mut cookies = KeysAndValues::new();
    for value in headers.get_all(SET_COOKIE) {
        let Ok(value) = value.to_str() else { continue };
        let first = value.split(';').next().unwrap_or_default();
        if let Some((name, value)) = parse_cookie_header(first).into_iter().next() {
            cookies.put(NottableString::string(name), NottableString::string(value));
        }
    }
    cookies
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// HTTP/1.1 keeps the connection open unless told otherwise; HTTP/1.0 only on request.
fn is_keep_alive(version: Version, headers: &HeaderMap) -> bool {
    let connection = headers
        .get(CONNECTION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_ascii_lowercase);
    match connection.as_deref() {
        Some(c) if c.contains("close") => false,
        Some(c) if c.contains("keep-alive") => true,
        _ => version >= Version::HTTP_11,
    }
}

fn socket_address(headers: &HeaderMap, secure: bool, local_addr: SocketAddr) -> SocketAddress {
    let scheme = if secure { Scheme::Https } else { Scheme::Http };
    let default_port = if secure { 443 } else { 80 };
    let host = headers.get(HOST).and_then(|v| v.to_str().ok());
    match host {
        Some(host) => {
            let split = match host.strip_prefix('[') {
                Some(v6) => v6.split_once("]:"),
                None => host.rsplit_once(':'),
            };
            match split.and_then(|(name, port)| Some((name, port.parse::<u16>().ok()?))) {
                Some((name, port)) => SocketAddress::new(name, port, scheme),
                None => SocketAddress::new(host.trim_matches(&['[', ']'][..]), default_port, scheme),
            }
        }
        None => SocketAddress::new(local_addr.ip().to_string(), local_addr.port(), scheme),
    }
}
