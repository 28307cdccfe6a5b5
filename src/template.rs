//! Template engine for dynamic responses.
//!
//! Uses Handlebars for template rendering with request context.

use crate::context::{MockRequest, Params};
use handlebars::{
    handlebars_helper, Context, Handlebars, Helper, HelperResult, Output, RenderContext,
    RenderError,
};
use rand::Rng;
use serde::Serialize;
use serde_json::{Map, Value};

/// Template engine for rendering dynamic responses.
pub struct TemplateEngine {
    handlebars: Handlebars<'static>,
}

/// Context for template rendering.
#[derive(Debug, Default, Serialize)]
pub struct TemplateContext {
    /// Path parameters supplied by the caller
    pub path: Map<String, Value>,
    /// Query parameters
    pub query: Map<String, Value>,
    /// Header parameters
    pub headers: Map<String, Value>,
    /// Request method, lower-case
    pub method: String,
    /// Endpoint template, e.g. `/pet/{petId}`
    pub schema_path: String,
    /// Request body as JSON (if parseable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json: Option<Value>,
}

impl TemplateContext {
    /// Capture what a template may reference from an intercepted request.
    pub fn new(request: &MockRequest, params: &Params) -> Self {
        Self {
            path: params.path.clone(),
            query: params.query.clone(),
            headers: params.header.clone(),
            method: request.method().as_str().to_ascii_lowercase(),
            schema_path: request.schema_path().to_string(),
            json: serde_json::from_slice(request.body()).ok(),
        }
    }
}

impl TemplateEngine {
    /// Create a new template engine.
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();

        handlebars.register_helper("uuid", Box::new(uuid));
        handlebars.register_helper("now", Box::new(now));
        handlebars.register_helper("random", Box::new(random));
        handlebars.register_helper("default", Box::new(default_value));
        handlebars.register_helper("upper", Box::new(upper));
        handlebars.register_helper("lower", Box::new(lower));

        // Bodies are JSON or plain text, never HTML
        handlebars.register_escape_fn(handlebars::no_escape);

        Self { handlebars }
    }

    /// Render a template string.
    pub fn render(
        &self,
        template: &str,
        ctx: &TemplateContext,
    ) -> Result<String, RenderError> {
        self.handlebars.render_template(template, ctx)
    }

    /// Render template syntax found in the string leaves of a JSON value.
    pub fn render_json(
        &self,
        value: &Value,
        ctx: &TemplateContext,
    ) -> Result<Value, RenderError> {
        match value {
            Value::String(s) if s.contains("{{") => Ok(Value::String(self.render(s, ctx)?)),
            Value::Array(arr) => arr
                .iter()
                .map(|v| self.render_json(v, ctx))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(obj) => {
                let mut rendered = Map::new();
                for (k, v) in obj {
                    rendered.insert(k.clone(), self.render_json(v, ctx)?);
                }
                Ok(Value::Object(rendered))
            }
            _ => Ok(value.clone()),
        }
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

handlebars_helper!(upper: |s: str| s.to_uppercase());
handlebars_helper!(lower: |s: str| s.to_lowercase());
handlebars_helper!(random: |min: i64, max: i64| rand::thread_rng().gen_range(min..=max.max(min)));
handlebars_helper!(default_value: |value: Json, fallback: Json| match value {
    Value::Null => fallback.clone(),
    Value::String(s) if s.is_empty() => fallback.clone(),
    other => other.clone(),
});

/// Random version 4 UUID.
fn uuid(
    _: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let mut bytes: [u8; 16] = rand::random();
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    out.write(&format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    ))?;
    Ok(())
}

/// Current UTC time, optionally with a chrono format string.
fn now(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let format = h
        .param(0)
        .and_then(|v| v.value().as_str())
        .unwrap_or("%Y-%m-%dT%H:%M:%S%.3fZ");
    out.write(&chrono::Utc::now().format(format).to_string())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use serde_json::json;

    fn request_context(body: &'static [u8], params: Params) -> TemplateContext {
        let request = http::Request::builder()
            .method("POST")
            .uri("https://example.com/pet/7")
            .body(Bytes::from_static(body))
            .unwrap();
        TemplateContext::new(&MockRequest::new(request, "/pet/{petId}"), &params)
    }

    #[test]
    fn test_path_params() {
        let engine = TemplateEngine::new();
        let ctx = request_context(b"", Params::new().with_path("petId", 7));

        let result = engine
            .render("Pet {{path.petId}} via {{method}} {{schema_path}}", &ctx)
            .unwrap();
        assert_eq!(result, "Pet 7 via post /pet/{petId}");
    }

    #[test]
    fn test_query_and_headers() {
        let engine = TemplateEngine::new();
        let params = Params::new()
            .with_query("status", "sold")
            .with_header("api_key", "secret");
        let ctx = request_context(b"", params);

        let result = engine.render("{{query.status}}/{{headers.api_key}}", &ctx).unwrap();
        assert_eq!(result, "sold/secret");
    }

    #[test]
    fn test_request_body() {
        let engine = TemplateEngine::new();
        let ctx = request_context(br#"{"name":"Rex"}"#, Params::new());

        assert_eq!(engine.render("Name: {{json.name}}", &ctx).unwrap(), "Name: Rex");
        assert!(request_context(b"plain", Params::new()).json.is_none());
    }

    #[test]
    fn test_uuid_helper() {
        let engine = TemplateEngine::new();
        let result = engine.render("{{uuid}}", &TemplateContext::default()).unwrap();

        assert_eq!(result.len(), 36);
        assert_eq!(result.chars().nth(8), Some('-'));
        assert_eq!(result.chars().nth(14), Some('4'));
    }

    #[test]
    fn test_now_helper() {
        let engine = TemplateEngine::new();
        let result = engine.render("{{now \"%Y\"}}", &TemplateContext::default()).unwrap();
        assert_eq!(result.len(), 4);
        assert!(result.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_random_helper() {
        let engine = TemplateEngine::new();
        let result = engine.render("{{random 5 9}}", &TemplateContext::default()).unwrap();
        let value: i64 = result.parse().unwrap();
        assert!((5..=9).contains(&value));
    }

    #[test]
    fn test_default_helper() {
        let engine = TemplateEngine::new();
        let ctx = request_context(b"", Params::new().with_query("limit", "20"));

        let result = engine
            .render("{{default query.missing \"10\"}}-{{default query.limit \"10\"}}", &ctx)
            .unwrap();
        assert_eq!(result, "10-20");
    }

    #[test]
    fn test_upper_lower_helpers() {
        let engine = TemplateEngine::new();
        let ctx = request_context(b"", Params::new().with_path("name", "Fluffy"));

        let result = engine.render("{{upper path.name}} {{lower path.name}}", &ctx).unwrap();
        assert_eq!(result, "FLUFFY fluffy");
    }

    #[test]
    fn test_render_json() {
        let engine = TemplateEngine::new();
        let ctx = request_context(b"", Params::new().with_path("petId", 3));

        let template = json!({
            "id": "{{path.petId}}",
            "name": "Pet {{path.petId}}",
            "tags": [{"name": "{{upper method}}"}],
            "photoUrls": [],
            "static": "no template"
        });
        let result = engine.render_json(&template, &ctx).unwrap();

        assert_eq!(result["id"], "3");
        assert_eq!(result["name"], "Pet 3");
        assert_eq!(result["tags"][0]["name"], "POST");
        assert_eq!(result["photoUrls"], json!([]));
        assert_eq!(result["static"], "no template");
    }
}
