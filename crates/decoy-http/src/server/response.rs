//! Writing model responses as hyper responses.
//!
//! Connection options shape how the body is framed and which connection
//! headers are sent.

use super::headers::{HeaderBuilderExt, VALUE_CLOSE, VALUE_KEEP_ALIVE};
use crate::model::{ConnectionOptions, HttpResponse};
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::Frame;
use hyper::header::{CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, SET_COOKIE};
use hyper::{Response, StatusCode};
use std::convert::Infallible;
use std::time::Duration;

pub type ResponseBody = BoxBody<Bytes, Infallible>;

/// A response ready for hyper, plus what to do with the connection afterwards.
pub struct ShapedResponse {
    pub response: Response<ResponseBody>,
    /// Close the connection this long after the response has been written.
    pub close_after: Option<Duration>,
}

pub fn full(body: impl Into<Bytes>) -> ResponseBody {
    Full::new(body.into()).boxed()
}

/// Body of unknown length, emitted in frames of at most `chunk_size` bytes.
fn streamed(body: Bytes, chunk_size: usize) -> ResponseBody {
    let chunk_size = chunk_size.max(1);
    let frames: Vec<Result<Frame<Bytes>, Infallible>> = (0..body.len())
        .step_by(chunk_size)
        .map(|start| {
            let end = start.saturating_add(chunk_size).min(body.len());
            Ok(Frame::data(body.slice(start..end)))
        })
        .collect();
    StreamBody::new(futures::stream::iter(frames)).boxed()
}

/// Build the hyper response for `response` to a request with `request_keep_alive`.
pub fn shape(response: &HttpResponse, request_keep_alive: bool) -> ShapedResponse {
    let options = response.connection_options.clone().unwrap_or_default();
    let status = StatusCode::from_u16(response.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = Response::builder().status(status);

    let mut has_content_type = false;
    for entry in response.headers.entries() {
        let name = entry.name.as_str();
        if name.eq_ignore_ascii_case(CONTENT_LENGTH.as_str())
            || name.eq_ignore_ascii_case(CONNECTION.as_str())
        {
            continue;
        }
        has_content_type |= name.eq_ignore_ascii_case(CONTENT_TYPE.as_str());
        for value in &entry.values {
            builder = builder.try_header(name, value.as_str());
        }
    }
    for cookie in response.cookies.entries() {
        let prefix = format!("{}=", cookie.name.as_str());
        let already_set = response
            .headers
            .get_values(SET_COOKIE.as_str())
            .iter()
            .any(|v| v.starts_with(&prefix));
        if !already_set {
            builder = builder.try_header(
                SET_COOKIE.as_str(),
                &format!("{}{}", prefix, cookie.value.as_str()),
            );
        }
    }

    let body = response.body.as_ref().map(|b| b.raw_bytes()).unwrap_or_default();
    if !has_content_type {
        if let Some(content_type) = response.body.as_ref().and_then(|b| b.default_content_type()) {
            builder = builder.try_header(CONTENT_TYPE.as_str(), &content_type.to_string());
        }
    }

    if let Some(value) = connection_header(&options, request_keep_alive) {
        builder = builder.header(CONNECTION, value.clone());
    }

    let body = Bytes::from(body);
    let body = match (
        options.content_length_header_override,
        options.suppress_content_length_header.unwrap_or(false),
        options.chunk_size.filter(|size| *size > 0),
    ) {
        (Some(length), _, chunk_size) => {
            builder = builder.header(CONTENT_LENGTH, length);
            let declared = usize::try_from(length).unwrap_or(usize::MAX);
            let body = body.slice(..declared.min(body.len()));
            streamed(body, chunk_size.unwrap_or(usize::MAX))
        }
        (None, true, chunk_size) => streamed(body, chunk_size.unwrap_or(usize::MAX)),
        (None, false, Some(chunk_size)) => streamed(body, chunk_size),
        (None, false, None) => full(body),
    };

    let mut response_out = builder
        .body(body)
        .unwrap_or_else(|_| Response::new(full(Bytes::new())));
    if let Some(reason) = &response.reason_phrase {
        if status.canonical_reason() != Some(reason.as_str()) {
            if let Ok(phrase) = hyper::ext::ReasonPhrase::try_from(reason.clone().into_bytes()) {
                response_out.extensions_mut().insert(phrase);
            }
        }
    }

    let close_after = options
        .close_socket
        .unwrap_or(false)
        .then(|| {
            options
                .close_socket_delay
                .map(|d| d.as_duration())
                .unwrap_or_default()
        });

    ShapedResponse {
        response: response_out,
        close_after,
    }
}

fn connection_header(
    options: &ConnectionOptions,
    request_keep_alive: bool,
) -> Option<&'static hyper::header::HeaderValue> {
    if options.suppress_connection_header.unwrap_or(false) {
        return None;
    }
    let keep_alive = options.keep_alive_override.unwrap_or(request_keep_alive);
    Some(if keep_alive { &VALUE_KEEP_ALIVE } else { &VALUE_CLOSE })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Body, Delay};

    async fn collect(response: Response<ResponseBody>) -> (hyper::http::response::Parts, Vec<Bytes>) {
        let (parts, mut body) = response.into_parts();
        let mut frames = Vec::new();
        while let Some(frame) = body.frame().await {
            if let Ok(data) = frame.unwrap().into_data() {
                frames.push(data);
            }
        }
        (parts, frames)
    }

    #[tokio::test]
    async fn test_plain_response() {
        let response = HttpResponse::new()
            .with_status_code(201)
            .with_header("X-Id", ["1"])
            .with_cookie("session", "abc")
            .with_body(Body::json(r#"{"id": 1}"#));
        let shaped = shape(&response, true);
        assert!(shaped.close_after.is_none());

        let (parts, frames) = collect(shaped.response).await;
        assert_eq!(parts.status, 201);
        assert_eq!(parts.headers["x-id"], "1");
        assert_eq!(parts.headers["set-cookie"], "session=abc");
        assert_eq!(parts.headers["content-type"], "application/json");
        assert_eq!(parts.headers["connection"], "keep-alive");
        assert_eq!(frames.concat(), br#"{"id": 1}"#);
    }

    #[tokio::test]
    async fn test_chunked_frames() {
        let response = HttpResponse::new()
            .with_body(Body::string("abcdefg"))
            .with_connection_options(ConnectionOptions {
                chunk_size: Some(3),
                ..Default::default()
            });
        let (parts, frames) = collect(shape(&response, true).response).await;
        assert!(parts.headers.get("content-length").is_none());
        assert_eq!(frames, vec!["abc", "def", "g"]);
    }

    #[tokio::test]
    async fn test_content_length_override_and_connection() {
        let response = HttpResponse::new()
            .with_body(Body::string("abcdef"))
            .with_connection_options(ConnectionOptions {
                content_length_header_override: Some(3),
                keep_alive_override: Some(false),
                close_socket: Some(true),
                close_socket_delay: Some(Delay::milliseconds(50)),
                ..Default::default()
            });
        let shaped = shape(&response, true);
        assert_eq!(shaped.close_after, Some(Duration::from_millis(50)));

        let (parts, frames) = collect(shaped.response).await;
        assert_eq!(parts.headers["content-length"], "3");
        assert_eq!(parts.headers["connection"], "close");
        assert_eq!(frames.concat(), b"abc");
    }

    #[tokio::test]
    async fn test_suppressed_connection_header_and_reason() {
        let response = HttpResponse::new()
            .with_status_code(418)
            .with_reason_phrase("Short And Stout")
            .with_connection_options(ConnectionOptions {
                suppress_connection_header: Some(true),
                ..Default::default()
            });
        let (parts, _) = collect(shape(&response, false).response).await;
        assert!(parts.headers.get("connection").is_none());
        assert_eq!(
            parts
                .extensions
                .get::<hyper::ext::ReasonPhrase>()
                .map(|r| r.as_bytes().to_vec()),
            Some(b"Short And Stout".to_vec())
        );
    }
}
