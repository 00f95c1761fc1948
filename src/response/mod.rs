//! Response capture and its translation back into a response event.

pub mod stream;
pub mod writer;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::StatusCode;

use crate::config::ContainerConfig;
use crate::models::{EventShape, GatewayProxyResponse, LoadBalancerProxyResponse, ResponseEvent};
use crate::multimap::MultiValueMap;

pub use stream::StreamingBody;
pub use writer::{BodySink, BufferedBody, ResponseHead, ResponseWriter};

/// Builds the response event for a buffered body.
///
/// The body is base64-encoded when the head says binary or the bytes are not
/// valid UTF-8.
#[must_use]
pub fn to_event(
    head: &ResponseHead,
    body: &[u8],
    shape: EventShape,
    config: &ContainerConfig,
) -> ResponseEvent {
    let (body, is_base64_encoded) = if head.is_binary(config) {
        (STANDARD.encode(body), true)
    } else {
        match std::str::from_utf8(body) {
            Ok(text) => (text.to_string(), false),
            Err(_) => (STANDARD.encode(body), true),
        }
    };

    let mut event = head_event(head.status, head.wire_headers(), is_base64_encoded, shape);
    match event {
        ResponseEvent::Gateway(ref mut response) => response.body = Some(body),
        ResponseEvent::LoadBalancer(ref mut response) => response.body = Some(body),
    }
    event
}

/// A response event without a body, in the header convention of `shape`.
pub(crate) fn head_event(
    status: u16,
    headers: MultiValueMap,
    is_base64_encoded: bool,
    shape: EventShape,
) -> ResponseEvent {
    match shape {
        EventShape::Gateway => ResponseEvent::Gateway(GatewayProxyResponse {
            status_code: status,
            multi_value_headers: headers,
            is_base64_encoded,
            body: None,
        }),
        EventShape::LoadBalancer { multi_value } => {
            let (headers, multi_value_headers) = if multi_value {
                (None, Some(headers))
            } else {
                (Some(headers.to_flat()), None)
            };
            ResponseEvent::LoadBalancer(LoadBalancerProxyResponse {
                status_code: status,
                status_description: status_description(status),
                headers,
                multi_value_headers,
                is_base64_encoded,
                body: None,
            })
        }
    }
}

/// `"200 OK"` style status line used by load balancer responses.
#[must_use]
pub fn status_description(status: u16) -> String {
    let reason = StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("Unknown");
    format!("{status} {reason}")
}
