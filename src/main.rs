use lambda_proxy_container::{
    ContainerConfig, ContainerHandler, Cookie, InitFailurePolicy, Router,
};
use lambda_runtime::{Error, LambdaEvent, service_fn};
use serde_json::Value;
use std::sync::Arc;

const COOKIE_DOMAIN: &str = "mydomain.com";

fn routes() -> Router {
    Router::new()
        .get("/hello", |_, res| {
            res.set_status(200);
            res.add_header("X-Custom-Header", "My Header Value");
            Ok("Hello World".to_string())
        })
        .get("/cookie", |_, res| {
            res.add_cookie(
                Cookie::new("MyCookie", "CookieValue")
                    .with_domain(COOKIE_DOMAIN)
                    .with_path("/"),
            );
            Ok("Hello World".to_string())
        })
        .get("/multi-cookie", |_, res| {
            for (name, value) in [("MyCookie", "CookieValue"), ("MyCookie2", "CookieValue2")] {
                res.add_cookie(Cookie::new(name, value).with_domain(COOKIE_DOMAIN).with_path("/"));
            }
            Ok("Hello World".to_string())
        })
        .post("/echo", |req, res| {
            if let Some(content_type) = req.content_type().map(String::from) {
                res.set_content_type(content_type);
            }
            let body = req.body_bytes()?;
            res.write_body(&body)?;
            Ok(String::new())
        })
}

fn config_from_env() -> ContainerConfig {
    let mut config = ContainerConfig::default();
    if let Ok(base_path) = std::env::var("SERVICE_BASE_PATH") {
        config = config.with_service_base_path(&base_path);
    }
    if let Some(policy) = std::env::var("INIT_FAILURE_POLICY")
        .ok()
        .as_deref()
        .and_then(InitFailurePolicy::parse)
    {
        config = config.with_init_failure_policy(policy);
    }
    config
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Use Lambda runtime's built-in tracing subscriber for CloudWatch Logs
    lambda_runtime::tracing::init_default_subscriber();

    let container = Arc::new(ContainerHandler::with_config(config_from_env(), || {
        Ok(routes())
    }));

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let container = Arc::clone(&container);
        async move { container.handle(event) }
    }))
    .await
}
