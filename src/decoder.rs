//! Decoding of raw invocation payloads into [`InvocationEvent`]s.
//!
//! Neither invoker tags its events, so the shape is recovered structurally
//! in [`classify`] and nowhere else.

use lambda_runtime::tracing::debug;
use serde_json::Value;

use crate::models::{EventShape, InvocationEvent, MalformedEvent};

/// Works out which proxy integration produced `payload`.
///
/// Returns `None` when the payload is not a proxy event at all: it must be an
/// object with a string `httpMethod`. Load balancer events are the only ones
/// carrying `requestContext.elb`.
#[must_use]
pub fn classify(payload: &Value) -> Option<EventShape> {
    let object = payload.as_object()?;
    object.get("httpMethod")?.as_str()?;

    let has_elb = object
        .get("requestContext")
        .and_then(|ctx| ctx.get("elb"))
        .is_some_and(Value::is_object);

    if has_elb {
        let multi_value = object
            .get("multiValueHeaders")
            .is_some_and(|headers| !headers.is_null());
        Some(EventShape::LoadBalancer { multi_value })
    } else {
        Some(EventShape::Gateway)
    }
}

/// Decodes raw invocation bytes.
///
/// # Errors
///
/// Returns a [`MalformedEvent`] when the bytes are not JSON or do not look
/// like either proxy event.
pub fn decode(raw: &[u8]) -> Result<InvocationEvent, MalformedEvent> {
    let payload: Value = serde_json::from_slice(raw)
        .map_err(|e| MalformedEvent::new(format!("invalid JSON: {e}"), EventShape::Gateway))?;
    decode_value(payload)
}

/// Decodes an already parsed payload.
///
/// # Errors
///
/// Returns a [`MalformedEvent`] when the payload does not look like either
/// proxy event or a known field has the wrong type.
pub fn decode_value(payload: Value) -> Result<InvocationEvent, MalformedEvent> {
    let Some(shape) = classify(&payload) else {
        return Err(MalformedEvent::new(
            "payload is not a proxy event (missing httpMethod)",
            EventShape::Gateway,
        ));
    };
    debug!(shape = shape.name(), "Classified invocation event");

    let event = match shape {
        EventShape::Gateway => serde_json::from_value(payload).map(InvocationEvent::Gateway),
        EventShape::LoadBalancer { .. } => {
            serde_json::from_value(payload).map(InvocationEvent::LoadBalancer)
        }
    };
    event.map_err(|e| MalformedEvent::new(format!("invalid {} event: {e}", shape.name()), shape))
}
