//! Container configuration.

/// What happens after the downstream handler fails to initialize.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InitFailurePolicy {
    /// The first failure is recorded and every later invocation fails fast
    /// with it. The initializer never runs again in this process.
    #[default]
    Sticky,
    /// The next invocation runs the initializer again.
    Retry,
}

impl InitFailurePolicy {
    /// Parses `sticky` or `retry`, case-insensitively.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sticky" => Some(Self::Sticky),
            "retry" => Some(Self::Retry),
            _ => None,
        }
    }
}

/// Settings shared by every invocation of a container.
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    pub init_failure_policy: InitFailurePolicy,
    /// Strip `service_base_path` from incoming paths before dispatch.
    pub strip_base_path: bool,
    pub service_base_path: Option<String>,
    /// Response content types always sent base64-encoded.
    pub binary_content_types: Vec<String>,
    /// Applied to non-empty responses that set no `Content-Type`.
    pub default_content_type: String,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            init_failure_policy: InitFailurePolicy::default(),
            strip_base_path: false,
            service_base_path: None,
            binary_content_types: [
                "application/octet-stream",
                "application/pdf",
                "application/zip",
                "image/*",
                "audio/*",
                "video/*",
                "font/*",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            default_content_type: "text/html; charset=utf-8".to_string(),
        }
    }
}

impl ContainerConfig {
    #[must_use]
    pub const fn with_init_failure_policy(mut self, policy: InitFailurePolicy) -> Self {
        self.init_failure_policy = policy;
        self
    }

    /// Enables base path stripping. The path is normalized to start with `/`
    /// and not end with one.
    #[must_use]
    pub fn with_service_base_path(mut self, base_path: &str) -> Self {
        let trimmed = base_path.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            self.strip_base_path = false;
            self.service_base_path = None;
        } else {
            let normalized = if trimmed.starts_with('/') {
                trimmed.to_string()
            } else {
                format!("/{trimmed}")
            };
            self.strip_base_path = true;
            self.service_base_path = Some(normalized);
        }
        self
    }

    #[must_use]
    pub fn add_binary_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.binary_content_types.push(content_type.into());
        self
    }

    /// Whether a response with `content_type` must be base64-encoded.
    /// Parameters such as `charset` are ignored; `type/*` entries match any
    /// subtype.
    #[must_use]
    pub fn is_binary_content_type(&self, content_type: &str) -> bool {
        let mime = essence(content_type);
        if mime.is_empty() {
            return false;
        }
        self.binary_content_types.iter().any(|candidate| {
            let candidate = candidate.to_ascii_lowercase();
            candidate.strip_suffix("/*").map_or_else(
                || candidate == mime,
                |top| mime.split_once('/').is_some_and(|(t, _)| t == top),
            )
        })
    }
}

/// Whether a response body of `content_type` is text that can travel as a
/// JSON string. Everything else is sent base64-encoded.
#[must_use]
pub fn is_text_content_type(content_type: &str) -> bool {
    let mime = essence(content_type);
    mime.starts_with("text/")
        || mime.contains("json")
        || mime.contains("xml")
        || mime.contains("javascript")
        || mime == "application/x-www-form-urlencoded"
}

/// Lowercased `type/subtype` without parameters.
fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
