//! Configuration for the mock middleware.
//!
//! Defines global settings and declarative mocks loaded from YAML.

use crate::fixture::FixtureHandler;
use crate::method::HttpMethod;
use crate::mock::Mock;
use crate::response::VALID_STATUS;
use crate::template::TemplateEngine;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Declarative mock configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct MockConfig {
    /// Mock definitions, in match order
    #[serde(default)]
    pub mocks: Vec<MockDefinition>,

    /// Global settings
    #[serde(default)]
    pub settings: MockSettings,
}

impl MockConfig {
    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (i, mock) in self.mocks.iter().enumerate() {
            mock.validate()
                .map_err(|e| anyhow::anyhow!("Mock {} ({} {}): {}", i, mock.method, mock.path, e))?;
        }
        Ok(())
    }

    /// Turn every definition into a [`Mock`]. Templates share one engine.
    pub fn into_mocks(self) -> Vec<Mock> {
        let engine = Arc::new(TemplateEngine::new());
        let default_content_type = self.settings.default_content_type;
        self.mocks
            .into_iter()
            .map(|definition| {
                let method = definition.method;
                let path = definition.path.clone();
                let handler =
                    FixtureHandler::new(definition, Arc::clone(&engine), &default_content_type);
                Mock::new(method, path, handler)
            })
            .collect()
    }
}

/// A single declarative mock.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MockDefinition {
    /// Endpoint template, e.g. `/pet/{petId}`
    pub path: String,

    /// HTTP verb (case-insensitive)
    pub method: HttpMethod,

    /// Optional description
    #[serde(default)]
    pub name: Option<String>,

    /// Response to return
    #[serde(default)]
    pub response: ResponseDefinition,

    /// Latency simulation
    #[serde(default)]
    pub delay: Option<DelayConfig>,

    /// Failure simulation
    #[serde(default)]
    pub fault: Option<FaultConfig>,
}

impl MockDefinition {
    /// Validate the mock definition.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.path.starts_with('/') {
            anyhow::bail!("Endpoint template must start with '/'");
        }
        self.response.validate()?;
        if let Some(delay) = &self.delay {
            delay.validate()?;
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

/// Response definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResponseDefinition {
    /// HTTP status code
    #[serde(default = "default_status")]
    pub status: u16,

    /// Response headers
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Response body
    #[serde(default)]
    pub body: Option<ResponseBody>,

    /// Whether the body is a Handlebars template
    #[serde(default)]
    pub template: bool,
}

fn default_status() -> u16 {
    200
}

impl Default for ResponseDefinition {
    fn default() -> Self {
        Self {
            status: default_status(),
            headers: HashMap::new(),
            body: None,
            template: false,
        }
    }
}

impl ResponseDefinition {
    /// Validate the response definition.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !VALID_STATUS.contains(&self.status) {
            anyhow::bail!("Invalid status code: {}", self.status);
        }
        for (name, value) in &self.headers {
            http::HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| anyhow::anyhow!("Invalid header name {:?}: {}", name, e))?;
            http::HeaderValue::from_str(value)
                .map_err(|e| anyhow::anyhow!("Invalid value for header {:?}: {}", name, e))?;
        }
        if let Some(body @ ResponseBody::Base64 { .. }) = &self.body {
            body.to_bytes()?;
        }
        Ok(())
    }

    /// Content type from the headers, falling back to the body's own type.
    pub fn content_type<'a>(&'a self, default: &'a str) -> &'a str {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
            .map(|(_, v)| v.as_str())
            .or_else(|| self.body.as_ref().map(ResponseBody::content_type))
            .unwrap_or(default)
    }
}

/// Response body configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseBody {
    /// Plain text body
    Text { content: String },
    /// JSON body
    Json { content: serde_json::Value },
    /// Base64 encoded binary
    Base64 { content: String },
}

impl ResponseBody {
    /// Get the body content as bytes.
    pub fn to_bytes(&self) -> anyhow::Result<Vec<u8>> {
        match self {
            ResponseBody::Text { content } => Ok(content.as_bytes().to_vec()),
            ResponseBody::Json { content } => Ok(serde_json::to_vec(content)?),
            ResponseBody::Base64 { content } => {
                use base64::Engine;
                base64::engine::general_purpose::STANDARD
                    .decode(content)
                    .map_err(|e| anyhow::anyhow!("Invalid base64: {}", e))
            }
        }
    }

    /// Get content type for this body.
    pub fn content_type(&self) -> &'static str {
        match self {
            ResponseBody::Text { .. } => "text/plain",
            ResponseBody::Json { .. } => "application/json",
            ResponseBody::Base64 { .. } => "application/octet-stream",
        }
    }
}

/// Delay/latency simulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DelayConfig {
    /// Fixed delay in milliseconds
    #[serde(default)]
    pub fixed_ms: u64,

    /// Minimum delay for random range (ms)
    #[serde(default)]
    pub min_ms: u64,

    /// Maximum delay for random range (ms)
    #[serde(default)]
    pub max_ms: u64,
}

impl DelayConfig {
    /// Calculate the actual delay to apply.
    pub fn calculate(&self) -> u64 {
        if self.fixed_ms > 0 {
            return self.fixed_ms;
        }
        if self.max_ms > self.min_ms {
            use rand::Rng;
            let mut rng = rand::thread_rng();
            return rng.gen_range(self.min_ms..=self.max_ms);
        }
        self.min_ms
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_ms != 0 && self.max_ms < self.min_ms {
            anyhow::bail!("max_ms ({}) is below min_ms ({})", self.max_ms, self.min_ms);
        }
        Ok(())
    }
}

/// Fault injection. A fault makes the handler fail, which surfaces to the
/// caller exactly like a failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FaultConfig {
    /// Fail immediately
    Error {
        #[serde(default)]
        message: Option<String>,
    },
    /// Wait, then fail
    Timeout {
        /// Time to wait before failing, in milliseconds
        duration_ms: u64,
    },
}

/// Global settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MockSettings {
    /// Log requests answered by a mock
    #[serde(default = "default_true")]
    pub log_matches: bool,

    /// Log requests passed through
    #[serde(default = "default_true")]
    pub log_unmatched: bool,

    /// Content type for declarative responses that set none
    #[serde(default = "default_content_type")]
    pub default_content_type: String,
}

impl Default for MockSettings {
    fn default() -> Self {
        Self {
            log_matches: true,
            log_unmatched: true,
            default_content_type: default_content_type(),
        }
    }
}

fn default_content_type() -> String {
    "application/json".to_string()
}
