//! Source-independent request handed to the downstream handler.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::Method;
use lambda_runtime::Context;
use serde_json::{Map, Value};
use std::io::{self, Cursor, Read};

use crate::config::ContainerConfig;
use crate::cookie::{Cookie, parse_cookie_header};
use crate::models::{
    EventShape, GatewayProxyEvent, InvocationEvent, LoadBalancerProxyEvent, MalformedEvent,
};
use crate::multimap::{FlatMap, MultiValueMap};

/// Path used when the event carries no path.
pub const ROOT_PATH: &str = "/";

/// Caller identity as reported by the invoker. Opaque to the container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecurityContext {
    pub principal_id: Option<String>,
    /// Authorizer claims (Cognito user pools) or authorizer context values.
    pub claims: Map<String, Value>,
    pub source_ip: Option<String>,
    pub user_agent: Option<String>,
}

impl SecurityContext {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.principal_id.is_some() || !self.claims.is_empty()
    }

    #[must_use]
    pub fn claim(&self, name: &str) -> Option<&str> {
        self.claims.get(name).and_then(Value::as_str)
    }
}

/// One HTTP request, owned by a single invocation.
#[derive(Debug)]
pub struct ProxyRequest {
    method: Method,
    path: String,
    query: MultiValueMap,
    headers: MultiValueMap,
    cookies: Vec<Cookie>,
    body: Cursor<Vec<u8>>,
    security: SecurityContext,
    shape: EventShape,
    stage: Option<String>,
    resource: Option<String>,
    request_id: Option<String>,
    target_group_arn: Option<String>,
    path_parameters: FlatMap,
    stage_variables: FlatMap,
    context: Context,
}

impl ProxyRequest {
    /// Builds a request from a decoded event.
    ///
    /// # Errors
    ///
    /// Returns a [`MalformedEvent`] when the method is not a valid HTTP
    /// method or a body flagged as base64 does not decode.
    pub fn from_event(
        event: InvocationEvent,
        context: &Context,
        config: &ContainerConfig,
    ) -> Result<Self, MalformedEvent> {
        let shape = event.shape();
        let mut request = match event {
            InvocationEvent::Gateway(event) => Self::from_gateway(event, shape)?,
            InvocationEvent::LoadBalancer(event) => Self::from_load_balancer(event, shape)?,
        };
        request.path = normalize_path(request.path, config);
        request.cookies = request
            .headers
            .get_all("cookie")
            .iter()
            .flat_map(|value| parse_cookie_header(value))
            .collect();
        request.context = context.clone();
        Ok(request)
    }

    fn from_gateway(event: GatewayProxyEvent, shape: EventShape) -> Result<Self, MalformedEvent> {
        let method = parse_method(&event.http_method, shape)?;
        let body = decode_body(event.body, event.is_base64_encoded, shape)?;
        let headers = fold(event.multi_value_headers, event.headers.as_ref()).into_headers();
        let query = fold(
            event.multi_value_query_string_parameters,
            event.query_string_parameters.as_ref(),
        );

        let ctx = event.request_context.unwrap_or_default();
        let identity = ctx.identity.unwrap_or_default();
        let authorizer = ctx.authorizer.unwrap_or_default();
        let principal_id = authorizer
            .get("principalId")
            .and_then(Value::as_str)
            .map(String::from);
        let claims = if let Some(Value::Object(claims)) = authorizer.get("claims") {
            claims.clone()
        } else {
            authorizer
                .iter()
                .filter(|(k, _)| k.as_str() != "principalId")
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        };

        Ok(Self {
            method,
            path: event.path.unwrap_or_default(),
            query,
            headers,
            cookies: Vec::new(),
            body: Cursor::new(body),
            security: SecurityContext {
                principal_id,
                claims,
                source_ip: identity.source_ip,
                user_agent: identity.user_agent,
            },
            shape,
            stage: ctx.stage,
            resource: event.resource.or(ctx.resource_path),
            request_id: ctx.request_id,
            target_group_arn: None,
            path_parameters: event.path_parameters.unwrap_or_default(),
            stage_variables: event.stage_variables.unwrap_or_default(),
            context: Context::default(),
        })
    }

    fn from_load_balancer(
        event: LoadBalancerProxyEvent,
        shape: EventShape,
    ) -> Result<Self, MalformedEvent> {
        let method = parse_method(&event.http_method, shape)?;
        let body = decode_body(event.body, event.is_base64_encoded, shape)?;
        let headers = fold(event.multi_value_headers, event.headers.as_ref()).into_headers();
        // Load balancers pass query values through exactly as the client sent them.
        let query = fold(
            event.multi_value_query_string_parameters,
            event.query_string_parameters.as_ref(),
        )
        .pairs()
        .map(|(k, v)| (url_decode(k), url_decode(v)))
        .collect();

        let source_ip = headers
            .first("x-forwarded-for")
            .and_then(|chain| chain.split(',').next())
            .map(|ip| ip.trim().to_string());
        let user_agent = headers.first("user-agent").map(String::from);

        Ok(Self {
            method,
            path: event.path.unwrap_or_default(),
            query,
            headers,
            cookies: Vec::new(),
            body: Cursor::new(body),
            security: SecurityContext {
                source_ip,
                user_agent,
                ..SecurityContext::default()
            },
            shape,
            stage: None,
            resource: None,
            request_id: None,
            target_group_arn: event.request_context.elb.target_group_arn,
            path_parameters: FlatMap::default(),
            stage_variables: FlatMap::default(),
            context: Context::default(),
        })
    }

    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Request path, never empty.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub const fn shape(&self) -> EventShape {
        self.shape
    }

    #[must_use]
    pub const fn headers(&self) -> &MultiValueMap {
        &self.headers
    }

    /// First value of a header, case-insensitive.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.first(name)
    }

    #[must_use]
    pub fn headers_all(&self, name: &str) -> &[String] {
        self.headers.get_all(name)
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    #[must_use]
    pub const fn query_params(&self) -> &MultiValueMap {
        &self.query
    }

    #[must_use]
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.first(name)
    }

    #[must_use]
    pub fn query_all(&self, name: &str) -> &[String] {
        self.query.get_all(name)
    }

    /// Query parameters re-encoded as `a=1&a=2&b=3`, or `None` when empty.
    #[must_use]
    pub fn query_string(&self) -> Option<String> {
        if self.query.is_empty() {
            return None;
        }
        let encoded: Vec<String> = self
            .query
            .pairs()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect();
        Some(encoded.join("&"))
    }

    #[must_use]
    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    /// Value of the first cookie called `name`.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.value.as_str())
    }

    #[must_use]
    pub const fn security_context(&self) -> &SecurityContext {
        &self.security
    }

    #[must_use]
    pub fn source_ip(&self) -> Option<&str> {
        self.security.source_ip.as_deref()
    }

    #[must_use]
    pub fn stage(&self) -> Option<&str> {
        self.stage.as_deref()
    }

    #[must_use]
    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    /// Gateway request id, falling back to the Lambda request id.
    #[must_use]
    pub fn request_id(&self) -> &str {
        self.request_id
            .as_deref()
            .unwrap_or(self.context.request_id.as_str())
    }

    #[must_use]
    pub fn target_group_arn(&self) -> Option<&str> {
        self.target_group_arn.as_deref()
    }

    #[must_use]
    pub const fn path_parameters(&self) -> &FlatMap {
        &self.path_parameters
    }

    #[must_use]
    pub const fn stage_variables(&self) -> &FlatMap {
        &self.stage_variables
    }

    /// Execution context of the invocation.
    #[must_use]
    pub const fn lambda_context(&self) -> &Context {
        &self.context
    }

    /// Reads whatever is left of the body.
    ///
    /// # Errors
    ///
    /// Never fails for in-memory bodies; the signature follows [`Read`].
    pub fn body_bytes(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.body.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Reads whatever is left of the body as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::InvalidData`] when the body is not UTF-8.
    pub fn body_text(&mut self) -> io::Result<String> {
        let mut text = String::new();
        self.body.read_to_string(&mut text)?;
        Ok(text)
    }
}

impl Read for ProxyRequest {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.body.read(buf)
    }
}

fn parse_method(method: &str, shape: EventShape) -> Result<Method, MalformedEvent> {
    Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| MalformedEvent::new(format!("invalid httpMethod {method:?}"), shape))
}

fn decode_body(
    body: Option<String>,
    is_base64_encoded: bool,
    shape: EventShape,
) -> Result<Vec<u8>, MalformedEvent> {
    match body {
        None => Ok(Vec::new()),
        Some(body) if is_base64_encoded => STANDARD
            .decode(body.trim())
            .map_err(|e| MalformedEvent::new(format!("invalid base64 body: {e}"), shape)),
        Some(body) => Ok(body.into_bytes()),
    }
}

/// Multi-valued fields win over flat ones when the event carries both.
fn fold(multi: Option<MultiValueMap>, flat: Option<&FlatMap>) -> MultiValueMap {
    match (multi, flat) {
        (Some(multi), _) => multi,
        (None, Some(flat)) => MultiValueMap::from_flat(flat),
        (None, None) => MultiValueMap::new(),
    }
}

fn url_decode(value: &str) -> String {
    let spaced = value.replace('+', " ");
    urlencoding::decode(&spaced).map_or_else(|_| value.to_string(), |decoded| decoded.into_owned())
}

fn normalize_path(path: String, config: &ContainerConfig) -> String {
    if path.is_empty() {
        return ROOT_PATH.to_string();
    }
    if let (true, Some(base)) = (config.strip_base_path, config.service_base_path.as_deref())
        && let Some(rest) = path.strip_prefix(base)
        && (rest.is_empty() || rest.starts_with('/'))
    {
        return if rest.is_empty() {
            ROOT_PATH.to_string()
        } else {
            rest.to_string()
        };
    }
    path
}
