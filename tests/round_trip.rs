// Request translation and response shaping through the whole container
#![allow(clippy::unwrap_used, clippy::panic)]

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use lambda_proxy_container::{
    ContainerConfig, ContainerHandler, EventShape, HandlerError, InvocationEvent, ProxyRequest,
    ResponseEvent, ResponseWriter,
};
use lambda_runtime::Context;
use serde_json::{Value, json};

type Handler = fn(&mut ProxyRequest, &mut ResponseWriter<'_>) -> Result<(), HandlerError>;

/// Reports what it received through response headers and echoes the body.
fn inspect(
    request: &mut ProxyRequest,
    response: &mut ResponseWriter<'_>,
) -> Result<(), HandlerError> {
    response.set_status(201);
    response.add_header("X-Method", request.method().as_str());
    response.add_header("X-Path", request.path());
    for value in request.headers_all("x-multi") {
        response.add_header("X-Seen", value.as_str());
    }
    for value in request.query_all("tag") {
        response.add_header("X-Tag", value.as_str());
    }
    if let Some(session) = request.cookie("session") {
        response.add_header("X-Session", session);
    }
    if let Some(content_type) = request.content_type() {
        response.set_content_type(content_type);
    }
    let body = request.body_bytes().map_err(|e| HandlerError::Failed(e.into()))?;
    response
        .write_body(&body)
        .map_err(|e| HandlerError::Failed(e.into()))
}

fn container(config: ContainerConfig) -> ContainerHandler<Handler> {
    ContainerHandler::with_config(config, || Ok(inspect as Handler))
}

fn decode(payload: Value) -> InvocationEvent {
    lambda_proxy_container::decoder::decode_value(payload).unwrap()
}

fn gateway_post() -> Value {
    json!({
        "resource": "/{proxy+}",
        "path": "/api/items",
        "httpMethod": "POST",
        "headers": { "Content-Type": "application/json", "X-Multi": "b" },
        "multiValueHeaders": {
            "Content-Type": ["application/json"],
            "X-Multi": ["a", "b"],
            "Cookie": ["session=abc123; theme=dark"]
        },
        "queryStringParameters": { "tag": "y" },
        "multiValueQueryStringParameters": { "tag": ["x", "y"] },
        "requestContext": { "stage": "prod", "requestId": "req-1" },
        "body": "{\"name\":\"widget\"}",
        "isBase64Encoded": false
    })
}

fn load_balancer_post(multi_value: bool) -> Value {
    let mut event = json!({
        "requestContext": { "elb": { "targetGroupArn": "arn:tg" } },
        "httpMethod": "POST",
        "path": "/api/items",
        "queryStringParameters": { "tag": "a%20b" },
        "headers": {
            "content-type": "application/octet-stream",
            "x-multi": "a",
            "cookie": "session=abc123"
        },
        "body": STANDARD.encode([0u8, 159, 146, 150, 255]),
        "isBase64Encoded": true
    });
    if multi_value {
        event["multiValueHeaders"] = json!({
            "content-type": ["application/octet-stream"],
            "x-multi": ["a", "b"],
            "cookie": ["session=abc123"]
        });
        event["multiValueQueryStringParameters"] = json!({ "tag": ["a%20b", "c+d"] });
    }
    event
}

#[test]
fn test_gateway_round_trip() {
    let container = container(ContainerConfig::default());
    let response = container.proxy(decode(gateway_post()), &Context::default()).unwrap();

    let ResponseEvent::Gateway(ref gateway) = response else {
        panic!("gateway request must produce a gateway response");
    };
    assert_eq!(gateway.status_code, 201);
    assert!(!gateway.is_base64_encoded);
    assert_eq!(response.body(), Some(r#"{"name":"widget"}"#));
    assert_eq!(response.header_values("x-method"), ["POST"]);
    assert_eq!(response.header_values("x-path"), ["/api/items"]);
    assert_eq!(response.header_values("x-seen"), ["a", "b"]);
    assert_eq!(response.header_values("x-tag"), ["x", "y"]);
    assert_eq!(response.header_values("x-session"), ["abc123"]);
    assert_eq!(response.header_values("content-type"), ["application/json"]);
}

#[test]
fn test_base_path_is_stripped() {
    let config = ContainerConfig::default().with_service_base_path("/api");
    let container = container(config);
    let response = container.proxy(decode(gateway_post()), &Context::default()).unwrap();
    assert_eq!(response.header_values("x-path"), ["/items"]);
}

#[test]
fn test_load_balancer_binary_round_trip_flat() {
    let container = container(ContainerConfig::default());
    let event = decode(load_balancer_post(false));
    assert_eq!(event.shape(), EventShape::LoadBalancer { multi_value: false });

    let response = container.proxy(event, &Context::default()).unwrap();
    let ResponseEvent::LoadBalancer(ref alb) = response else {
        panic!("load balancer request must produce a load balancer response");
    };
    assert_eq!(alb.status_description, "201 Created");
    assert!(alb.multi_value_headers.is_none());
    assert!(alb.is_base64_encoded);
    assert_eq!(
        STANDARD.decode(alb.body.as_deref().unwrap()).unwrap(),
        [0u8, 159, 146, 150, 255]
    );
    assert_eq!(response.header_values("x-tag"), ["a b"]);
    assert_eq!(response.header_values("x-seen"), ["a"]);
}

#[test]
fn test_load_balancer_multi_value_round_trip() {
    let container = container(ContainerConfig::default());
    let response = container
        .proxy(decode(load_balancer_post(true)), &Context::default())
        .unwrap();

    let ResponseEvent::LoadBalancer(ref alb) = response else {
        panic!("load balancer request must produce a load balancer response");
    };
    assert!(alb.headers.is_none());
    assert_eq!(response.header_values("x-seen"), ["a", "b"]);
    assert_eq!(response.header_values("x-tag"), ["a b", "c d"]);
    assert_eq!(response.header_values("x-session"), ["abc123"]);
}

#[test]
fn test_stream_binary_body_is_base64() {
    let container = container(ContainerConfig::default());
    let input = serde_json::to_vec(&load_balancer_post(false)).unwrap();
    let mut output = Vec::new();
    container
        .proxy_stream(input.as_slice(), &mut output, &Context::default())
        .unwrap();

    let response: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(response["statusCode"], 201);
    assert_eq!(response["isBase64Encoded"], true);
    assert_eq!(
        STANDARD.decode(response["body"].as_str().unwrap()).unwrap(),
        [0u8, 159, 146, 150, 255]
    );
}

#[test]
fn test_response_shape_follows_request_shape() {
    let container = container(ContainerConfig::default());
    for (payload, expected) in [
        (gateway_post(), EventShape::Gateway),
        (load_balancer_post(false), EventShape::LoadBalancer { multi_value: false }),
        (load_balancer_post(true), EventShape::LoadBalancer { multi_value: true }),
    ] {
        let raw = serde_json::to_vec(&payload).unwrap();
        let response: Value =
            serde_json::from_slice(&container.proxy_raw(&raw, &Context::default()).unwrap())
                .unwrap();
        match expected {
            EventShape::Gateway => {
                assert!(response.get("statusDescription").is_none());
                assert!(response["multiValueHeaders"].is_object());
            }
            EventShape::LoadBalancer { multi_value } => {
                assert!(response["statusDescription"].is_string());
                assert_eq!(response.get("multiValueHeaders").is_some(), multi_value);
                assert_eq!(response.get("headers").is_some(), !multi_value);
            }
        }
    }
}

#[test]
fn test_stream_untextual_body_matches_buffered() {
    let gzip = [0x1fu8, 0x8b, 0x08, 0x00, 0xff];
    let mut event = gateway_post();
    event["headers"] = json!({ "Content-Type": "application/gzip" });
    event["multiValueHeaders"] = json!({ "Content-Type": ["application/gzip"] });
    event["body"] = json!(STANDARD.encode(gzip));
    event["isBase64Encoded"] = json!(true);
    let raw = serde_json::to_vec(&event).unwrap();
    let container = container(ContainerConfig::default());

    let mut streamed = Vec::new();
    container
        .proxy_stream(raw.as_slice(), &mut streamed, &Context::default())
        .unwrap();
    let streamed: Value = serde_json::from_slice(&streamed).unwrap();
    let buffered: Value =
        serde_json::from_slice(&container.proxy_raw(&raw, &Context::default()).unwrap()).unwrap();

    for response in [&streamed, &buffered] {
        assert_eq!(response["isBase64Encoded"], true);
        assert_eq!(
            STANDARD.decode(response["body"].as_str().unwrap()).unwrap(),
            gzip
        );
    }
    assert_eq!(streamed, buffered);
}
