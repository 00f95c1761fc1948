//! Response payloads returned to the invoker.
//!
//! The gateway reads `multiValueHeaders`. The load balancer rejects a
//! response whose header field does not match the target group's
//! multi-value setting, so it gets either `multiValueHeaders` or `headers`.

use serde::{Deserialize, Serialize};

use crate::multimap::{FlatMap, MultiValueMap};

/// Gateway proxy response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayProxyResponse {
    pub status_code: u16,
    #[serde(default)]
    pub multi_value_headers: MultiValueMap,
    #[serde(default)]
    pub is_base64_encoded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Load balancer target group response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerProxyResponse {
    pub status_code: u16,
    #[serde(default)]
    pub status_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<FlatMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_value_headers: Option<MultiValueMap>,
    #[serde(default)]
    pub is_base64_encoded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// A response in the schema of the event that triggered it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResponseEvent {
    Gateway(GatewayProxyResponse),
    LoadBalancer(LoadBalancerProxyResponse),
}

impl ResponseEvent {
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Gateway(response) => response.status_code,
            Self::LoadBalancer(response) => response.status_code,
        }
    }

    #[must_use]
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Gateway(response) => response.body.as_deref(),
            Self::LoadBalancer(response) => response.body.as_deref(),
        }
    }

    #[must_use]
    pub const fn is_base64_encoded(&self) -> bool {
        match self {
            Self::Gateway(response) => response.is_base64_encoded,
            Self::LoadBalancer(response) => response.is_base64_encoded,
        }
    }

    /// Every value of `name`, regardless of which header field carries it.
    /// Flat headers yield their single (possibly comma-joined) value.
    #[must_use]
    pub fn header_values(&self, name: &str) -> Vec<String> {
        let multi = match self {
            Self::Gateway(response) => Some(&response.multi_value_headers),
            Self::LoadBalancer(response) => response.multi_value_headers.as_ref(),
        };
        if let Some(headers) = multi {
            let headers = headers.clone().into_headers();
            return headers.get_all(name).to_vec();
        }
        match self {
            Self::LoadBalancer(LoadBalancerProxyResponse {
                headers: Some(flat),
                ..
            }) => flat
                .iter()
                .filter(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.to_string())
                .collect(),
            _ => Vec::new(),
        }
    }
}
