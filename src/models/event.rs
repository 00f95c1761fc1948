//! Invocation event models for the two supported proxy integrations.
//!
//! Every field is optional or defaulted: the invokers omit or null fields
//! freely, and unknown fields are ignored.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::multimap::{FlatMap, MultiValueMap};

/// Which proxy integration produced an event, and therefore which response
/// schema the invoker accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventShape {
    /// REST API gateway proxy integration.
    Gateway,
    /// Load balancer target group. `multi_value` is set when the target
    /// group has multi-value headers enabled, which the request reveals by
    /// carrying `multiValueHeaders`.
    LoadBalancer { multi_value: bool },
}

impl EventShape {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Gateway => "gateway",
            Self::LoadBalancer { .. } => "load_balancer",
        }
    }
}

/// Gateway proxy request event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayProxyEvent {
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    pub http_method: String,
    #[serde(default)]
    pub headers: Option<FlatMap>,
    #[serde(default)]
    pub multi_value_headers: Option<MultiValueMap>,
    #[serde(default)]
    pub query_string_parameters: Option<FlatMap>,
    #[serde(default)]
    pub multi_value_query_string_parameters: Option<MultiValueMap>,
    #[serde(default)]
    pub path_parameters: Option<FlatMap>,
    #[serde(default)]
    pub stage_variables: Option<FlatMap>,
    #[serde(default)]
    pub request_context: Option<GatewayRequestContext>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub is_base64_encoded: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayRequestContext {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub api_id: Option<String>,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub resource_path: Option<String>,
    #[serde(default)]
    pub http_method: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub request_time_epoch: Option<i64>,
    #[serde(default)]
    pub identity: Option<GatewayIdentity>,
    /// Authorizer output. Cognito authorizers nest a `claims` object; custom
    /// authorizers put their context keys at the top level next to
    /// `principalId`.
    #[serde(default)]
    pub authorizer: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayIdentity {
    #[serde(default)]
    pub source_ip: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub user_arn: Option<String>,
    #[serde(default)]
    pub cognito_identity_id: Option<String>,
    #[serde(default)]
    pub cognito_identity_pool_id: Option<String>,
}

/// Load balancer target group request event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerProxyEvent {
    #[serde(default)]
    pub path: Option<String>,
    pub http_method: String,
    #[serde(default)]
    pub headers: Option<FlatMap>,
    #[serde(default)]
    pub multi_value_headers: Option<MultiValueMap>,
    #[serde(default)]
    pub query_string_parameters: Option<FlatMap>,
    #[serde(default)]
    pub multi_value_query_string_parameters: Option<MultiValueMap>,
    pub request_context: LoadBalancerRequestContext,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub is_base64_encoded: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerRequestContext {
    pub elb: LoadBalancerTarget,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerTarget {
    #[serde(default)]
    pub target_group_arn: Option<String>,
}

/// A decoded invocation event. Exactly one variant per event.
#[derive(Debug, Clone)]
pub enum InvocationEvent {
    Gateway(GatewayProxyEvent),
    LoadBalancer(LoadBalancerProxyEvent),
}

impl InvocationEvent {
    /// The response schema the invoker of this event expects.
    #[must_use]
    pub const fn shape(&self) -> EventShape {
        match self {
            Self::Gateway(_) => EventShape::Gateway,
            Self::LoadBalancer(event) => EventShape::LoadBalancer {
                multi_value: event.multi_value_headers.is_some(),
            },
        }
    }

    #[must_use]
    pub fn http_method(&self) -> &str {
        match self {
            Self::Gateway(event) => &event.http_method,
            Self::LoadBalancer(event) => &event.http_method,
        }
    }

    #[must_use]
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Gateway(event) => event.path.as_deref(),
            Self::LoadBalancer(event) => event.path.as_deref(),
        }
    }
}

/// Invokers send `null` for an unset flag as often as they omit it.
fn null_as_false<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or_default())
}
