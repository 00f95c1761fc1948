//! Minimal method + path router.
//!
//! Stands in for the embedded web framework in the demo function and the
//! tests. Routes match exactly; a route returns the body text to send.

use http::Method;
use lambda_runtime::tracing::debug;

use crate::handler::RequestHandler;
use crate::models::HandlerError;
use crate::request::ProxyRequest;
use crate::response::ResponseWriter;

/// A route body: fills in the response and returns the text to append.
pub trait RouteFn:
    Fn(&mut ProxyRequest, &mut ResponseWriter<'_>) -> anyhow::Result<String>
    + Send
    + Sync
    + 'static
{
}

impl<F> RouteFn for F where
    F: Fn(&mut ProxyRequest, &mut ResponseWriter<'_>) -> anyhow::Result<String>
        + Send
        + Sync
        + 'static
{
}

type Route = Box<dyn RouteFn>;

#[derive(Default)]
pub struct Router {
    routes: Vec<(Method, String, Route)>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes.len())
            .finish_non_exhaustive()
    }
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a route. The returned string is appended to the body.
    #[must_use]
    pub fn route<F>(mut self, method: Method, path: impl Into<String>, route: F) -> Self
    where
        F: RouteFn,
    {
        self.routes.push((method, path.into(), Box::new(route)));
        self
    }

    #[must_use]
    pub fn get<F>(self, path: impl Into<String>, route: F) -> Self
    where
        F: RouteFn,
    {
        self.route(Method::GET, path, route)
    }

    #[must_use]
    pub fn post<F>(self, path: impl Into<String>, route: F) -> Self
    where
        F: RouteFn,
    {
        self.route(Method::POST, path, route)
    }

    #[must_use]
    pub fn put<F>(self, path: impl Into<String>, route: F) -> Self
    where
        F: RouteFn,
    {
        self.route(Method::PUT, path, route)
    }

    #[must_use]
    pub fn delete<F>(self, path: impl Into<String>, route: F) -> Self
    where
        F: RouteFn,
    {
        self.route(Method::DELETE, path, route)
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl RequestHandler for Router {
    fn handle(
        &self,
        request: &mut ProxyRequest,
        response: &mut ResponseWriter<'_>,
    ) -> Result<(), HandlerError> {
        let Some((_, _, route)) = self
            .routes
            .iter()
            .find(|(method, path, _)| method == request.method() && path == request.path())
        else {
            return Err(HandlerError::unroutable(
                request.method().as_str(),
                request.path(),
            ));
        };
        debug!(method = %request.method(), path = %request.path(), "Matched route");

        let body = route(request, response)?;
        response
            .write_text(&body)
            .map_err(|e| HandlerError::Failed(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContainerConfig;
    use crate::decoder::decode_value;
    use crate::response::BufferedBody;
    use lambda_runtime::Context;
    use serde_json::json;

    fn request(method: &str, path: &str) -> ProxyRequest {
        let event = decode_value(json!({"httpMethod": method, "path": path})).unwrap();
        ProxyRequest::from_event(event, &Context::default(), &ContainerConfig::default()).unwrap()
    }

    fn router() -> Router {
        Router::new()
            .get("/hello", |_, _| Ok("Hello World".to_string()))
            .post("/hello", |_, res| {
                res.set_status(201);
                Ok(String::new())
            })
    }

    #[test]
    fn test_matches_method_and_path() {
        let config = ContainerConfig::default();
        let mut body = BufferedBody::default();
        let mut writer = ResponseWriter::new(&mut body, &config);

        router()
            .handle(&mut request("GET", "/hello"), &mut writer)
            .unwrap();
        assert_eq!(writer.into_head().status, 200);
        assert_eq!(body.bytes(), b"Hello World");
    }

    #[test]
    fn test_method_selects_route() {
        let config = ContainerConfig::default();
        let mut body = BufferedBody::default();
        let mut writer = ResponseWriter::new(&mut body, &config);

        router()
            .handle(&mut request("POST", "/hello"), &mut writer)
            .unwrap();
        assert_eq!(writer.into_head().status, 201);
        assert!(body.bytes().is_empty());
    }

    #[test]
    fn test_unmatched_is_unroutable() {
        let config = ContainerConfig::default();
        let mut body = BufferedBody::default();
        let mut writer = ResponseWriter::new(&mut body, &config);

        let err = router()
            .handle(&mut request("GET", "/missing"), &mut writer)
            .unwrap_err();
        assert!(matches!(err, HandlerError::Unroutable { ref path, .. } if path == "/missing"));
        assert_eq!(router().len(), 2);
    }

    #[test]
    fn test_every_method_helper_registers() {
        let router = Router::new()
            .put("/item", |_, _| Ok("put".to_string()))
            .delete("/item", |_, _| Ok("delete".to_string()))
            .route(Method::PATCH, "/item", |req, _| Ok(req.method().to_string()));
        assert_eq!(router.len(), 3);

        let config = ContainerConfig::default();
        let mut body = BufferedBody::default();
        let mut writer = ResponseWriter::new(&mut body, &config);
        router
            .handle(&mut request("PATCH", "/item"), &mut writer)
            .unwrap();
        assert_eq!(body.bytes(), b"PATCH");
    }
}
