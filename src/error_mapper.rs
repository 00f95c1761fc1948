//! Maps recoverable failures to well-formed error responses.
//!
//! The invoker must always receive a payload in its own schema, so every
//! failure the container can recover from ends up here.

use http::StatusCode;
use lambda_runtime::tracing::{error, warn};
use serde_json::json;

use crate::models::{EventShape, HandlerError, MalformedEvent, ResponseEvent};
use crate::multimap::MultiValueMap;
use crate::response::head_event;

/// Builds an error response with a JSON `{"message": ...}` body.
#[must_use]
pub fn error_response(status: StatusCode, shape: EventShape) -> ResponseEvent {
    let mut headers = MultiValueMap::headers();
    headers.add("Content-Type", "application/json");
    let message = status.canonical_reason().unwrap_or("Error");
    let body = json!({ "message": message }).to_string();

    let mut event = head_event(status.as_u16(), headers, false, shape);
    match event {
        ResponseEvent::Gateway(ref mut response) => response.body = Some(body),
        ResponseEvent::LoadBalancer(ref mut response) => response.body = Some(body),
    }
    event
}

/// A payload that could not be decoded becomes a 404 in the best-guess shape.
#[must_use]
pub fn malformed_event(err: &MalformedEvent) -> ResponseEvent {
    warn!(error = %err, shape = err.shape.name(), "Rejecting malformed event");
    error_response(StatusCode::NOT_FOUND, err.shape)
}

/// Unroutable requests become 404s; handler failures become 500s. Failure
/// detail is logged and kept out of the body.
#[must_use]
pub fn handler_error(err: &HandlerError, shape: EventShape) -> ResponseEvent {
    match err {
        HandlerError::Unroutable { method, path } => {
            warn!(method = %method, path = %path, "No route matched request");
            error_response(StatusCode::NOT_FOUND, shape)
        }
        HandlerError::Failed(e) => {
            // Use {:#} to get the full error chain with causes
            error!(error = %format!("{e:#}"), "Request handler failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, shape)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_unroutable_is_404() {
        let event = handler_error(&HandlerError::unroutable("GET", "/"), EventShape::Gateway);
        assert_eq!(event.status_code(), 404);
        assert_eq!(event.header_values("content-type"), ["application/json"]);
        assert_eq!(event.body(), Some(r#"{"message":"Not Found"}"#));
    }

    #[test]
    fn test_failure_is_500_without_detail() {
        let err = HandlerError::Failed(anyhow!("database password is hunter2"));
        let event = handler_error(&err, EventShape::LoadBalancer { multi_value: false });
        assert_eq!(event.status_code(), 500);
        assert!(!event.body().unwrap_or_default().contains("hunter2"));
        match event {
            ResponseEvent::LoadBalancer(response) => {
                assert_eq!(response.status_description, "500 Internal Server Error");
                assert!(response.headers.is_some());
            }
            ResponseEvent::Gateway(_) => unreachable!("shape must match"),
        }
    }

    #[test]
    fn test_malformed_event_keeps_shape() {
        let err = MalformedEvent::new("bad", EventShape::LoadBalancer { multi_value: true });
        let event = malformed_event(&err);
        assert_eq!(event.status_code(), 404);
        assert!(matches!(
            event,
            ResponseEvent::LoadBalancer(ref r) if r.multi_value_headers.is_some()
        ));
    }
}
