// Handler lifecycle tests: one-time initialization, concurrency and
// initialization failure policies
#![allow(clippy::unwrap_used, clippy::panic)]

use futures::future::join_all;
use lambda_proxy_container::{
    ContainerConfig, ContainerError, ContainerHandler, ContainerState, InitFailurePolicy, Router,
};
use lambda_runtime::Context;
use mockall::automock;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[automock]
trait HandlerFactory {
    fn build(&self) -> anyhow::Result<Router>;
}

fn routes() -> Router {
    Router::new().get("/hello", |_, _| Ok("Hello World".to_string()))
}

fn hello_event() -> Vec<u8> {
    serde_json::to_vec(&json!({
        "path": "/hello",
        "httpMethod": "GET",
        "requestContext": { "stage": "prod" }
    }))
    .unwrap()
}

fn status_of(output: &[u8]) -> u64 {
    let response: Value = serde_json::from_slice(output).unwrap();
    response["statusCode"].as_u64().unwrap()
}

fn container_from(
    factory: MockHandlerFactory,
    policy: InitFailurePolicy,
) -> ContainerHandler<Router> {
    let factory = Arc::new(factory);
    let config = ContainerConfig::default().with_init_failure_policy(policy);
    ContainerHandler::with_config(config, move || factory.build())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_cold_start_initializes_once() {
    let mut factory = MockHandlerFactory::new();
    factory.expect_build().times(1).returning(|| {
        // Hold the initializer long enough for every invocation to race it.
        std::thread::sleep(Duration::from_millis(50));
        Ok(routes())
    });
    let container = Arc::new(container_from(factory, InitFailurePolicy::Sticky));

    let tasks = (0..16).map(|_| {
        let container = Arc::clone(&container);
        tokio::task::spawn_blocking(move || {
            let output = container
                .proxy_raw(&hello_event(), &Context::default())
                .unwrap();
            let handler = container.state().get().unwrap();
            (status_of(&output), handler)
        })
    });
    let results = join_all(tasks).await;

    assert_eq!(container.state().initializations(), 1);
    let first = container.state().get().unwrap();
    for result in results {
        let (status, handler) = result.unwrap();
        assert_eq!(status, 200);
        assert!(Arc::ptr_eq(&first, &handler));
    }
}

#[tokio::test]
async fn test_initialized_handler_is_reused() {
    let mut factory = MockHandlerFactory::new();
    factory.expect_build().times(1).returning(|| Ok(routes()));
    let container = container_from(factory, InitFailurePolicy::Sticky);

    for _ in 0..3 {
        let output = container.proxy_raw(&hello_event(), &Context::default()).unwrap();
        assert_eq!(status_of(&output), 200);
    }
    tokio_test::assert_ok!(container.initialize());
    assert!(container.state().is_initialized());
    assert_eq!(container.state().initializations(), 1);
}

#[tokio::test]
async fn test_malformed_event_still_initializes() {
    let mut factory = MockHandlerFactory::new();
    factory.expect_build().times(1).returning(|| Ok(routes()));
    let container = container_from(factory, InitFailurePolicy::Sticky);

    let output = container.proxy_raw(b"[]", &Context::default()).unwrap();
    assert_eq!(status_of(&output), 404);
    assert!(container.state().is_initialized());
}

#[tokio::test]
async fn test_sticky_failure_fails_fast() {
    let mut factory = MockHandlerFactory::new();
    factory
        .expect_build()
        .times(1)
        .returning(|| Err(anyhow::anyhow!("config file missing")));
    let container = container_from(factory, InitFailurePolicy::Sticky);

    for _ in 0..3 {
        let err = container
            .proxy_raw(&hello_event(), &Context::default())
            .unwrap_err();
        assert!(matches!(
            err,
            ContainerError::Initialization(ref message) if message.contains("config file missing")
        ));
    }
    assert_eq!(container.state().initializations(), 1);
    assert!(!container.state().is_initialized());
}

#[tokio::test]
async fn test_retry_policy_reruns_initializer() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    let config = ContainerConfig::default().with_init_failure_policy(InitFailurePolicy::Retry);
    let container = ContainerHandler::with_config(config, move || {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            anyhow::bail!("dependency not ready");
        }
        Ok(routes())
    });

    let err = container
        .proxy_raw(&hello_event(), &Context::default())
        .unwrap_err();
    assert_eq!(err.error_type(), "InitializationFailure");

    let output = container.proxy_raw(&hello_event(), &Context::default()).unwrap();
    assert_eq!(status_of(&output), 200);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(container.state().initializations(), 2);
}

#[tokio::test]
async fn test_initializer_panic_is_initialization_failure() {
    let container: ContainerHandler<Router> =
        ContainerHandler::new(|| panic!("bad static configuration"));

    let err = container.initialize().unwrap_err();
    assert!(err.to_string().contains("bad static configuration"));
    // Sticky by default: the initializer is not run again.
    tokio_test::assert_err!(container.initialize());
    assert_eq!(container.state().initializations(), 1);
}

#[tokio::test]
async fn test_shared_state_across_containers() {
    let state = Arc::new(ContainerState::new());
    let built = Arc::new(AtomicUsize::new(0));

    let containers: Vec<_> = (0..2)
        .map(|_| {
            let built = Arc::clone(&built);
            ContainerHandler::new(move || {
                built.fetch_add(1, Ordering::SeqCst);
                Ok(routes())
            })
            .with_state(Arc::clone(&state))
        })
        .collect();

    for container in &containers {
        let output = container.proxy_raw(&hello_event(), &Context::default()).unwrap();
        assert_eq!(status_of(&output), 200);
    }
    assert_eq!(built.load(Ordering::SeqCst), 1);
    assert_eq!(state.initializations(), 1);
}
