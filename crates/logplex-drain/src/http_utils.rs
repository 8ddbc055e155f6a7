// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    header,
    http::{self, HeaderMap, HeaderValue},
    Response, StatusCode,
};
use tracing::{debug, error, warn};

pub type HttpResponse = Response<Full<Bytes>>;

/// Does two things:
/// 1. Logs the given message: debug for success codes, warn for client errors,
///    error for everything else.
/// 2. Returns the message as a plain-text body with the given status code.
pub fn log_and_create_http_response(message: &str, status: StatusCode) -> http::Result<HttpResponse> {
    if status.is_success() {
        debug!("{message}");
    } else if status.is_client_error() {
        warn!("{message}");
    } else {
        error!("{message}");
    }
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"))
        .body(Full::new(Bytes::from(message.to_string())))
}

/// A response with no body, e.g. `204 No Content` or `404 Not Found`.
pub fn empty_response(status: StatusCode) -> http::Result<HttpResponse> {
    Response::builder()
        .status(status)
        .body(Full::new(Bytes::new()))
}

/// Takes a request's header map, and verifies that the "content-length" and/or "Transfer-Encoding" header
/// is present, valid, and less than the given max_content_length.
///
/// Will return None if no issues are found. Otherwise logs (with the given prefix) and
/// returns an HTTP Response with the appropriate error status code.
pub fn verify_request_content_length(
    header_map: &HeaderMap,
    max_content_length: usize,
    error_message_prefix: &str,
) -> Option<http::Result<HttpResponse>> {
    let Some(content_length_header) = header_map.get(header::CONTENT_LENGTH) else {
        if let Some(transfer_encoding_header) = header_map.get(header::TRANSFER_ENCODING) {
            debug!("Transfer-Encoding header is present: {transfer_encoding_header:?}");
            return None;
        }
        return Some(log_and_create_http_response(
            &format!("{error_message_prefix}: Missing Content-Length and Transfer-Encoding header"),
            StatusCode::LENGTH_REQUIRED,
        ));
    };
    let content_length = content_length_header
        .to_str()
        .ok()
        .and_then(|value| value.parse::<usize>().ok());
    match content_length {
        None => Some(log_and_create_http_response(
            &format!("{error_message_prefix}: Invalid Content-Length header"),
            StatusCode::BAD_REQUEST,
        )),
        Some(length) if length > max_content_length => Some(log_and_create_http_response(
            &format!("{error_message_prefix}: Payload too large"),
            StatusCode::PAYLOAD_TOO_LARGE,
        )),
        Some(_) => None,
    }
}

/// Reads a header as a string, ignoring values that are not visible ASCII.
pub fn header_str<'a>(header_map: &'a HeaderMap, name: &str) -> Option<&'a str> {
    header_map.get(name).and_then(|value| value.to_str().ok())
}
