//! Handler behind declarative (YAML) mocks.

use crate::config::{FaultConfig, MockDefinition, ResponseBody};
use crate::context::{HandlerContext, MockRequest};
use crate::error::{BoxError, Error};
use crate::mock::Handler;
use crate::response::Response;
use crate::template::{TemplateContext, TemplateEngine};
use async_trait::async_trait;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Failure injected by a mock's `fault` setting.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct InjectedFault {
    pub message: String,
}

/// Answers with the response described by a [`MockDefinition`].
pub struct FixtureHandler {
    definition: MockDefinition,
    engine: Arc<TemplateEngine>,
    content_type: String,
}

impl FixtureHandler {
    pub fn new(
        definition: MockDefinition,
        engine: Arc<TemplateEngine>,
        default_content_type: &str,
    ) -> Self {
        let content_type = definition
            .response
            .content_type(default_content_type)
            .to_string();
        Self {
            definition,
            engine,
            content_type,
        }
    }

    fn render_body(
        &self,
        request: &MockRequest,
        ctx: &HandlerContext,
    ) -> Result<Bytes, BoxError> {
        let response = &self.definition.response;
        let Some(body) = &response.body else {
            return Ok(Bytes::new());
        };

        if !response.template {
            return Ok(Bytes::from(body.to_bytes()?));
        }

        let template_ctx = TemplateContext::new(request, ctx.params());
        let rendered = match body {
            ResponseBody::Text { content } => self
                .engine
                .render(content, &template_ctx)
                .map_err(Error::from)?
                .into_bytes(),
            ResponseBody::Json { content } => {
                let value = self
                    .engine
                    .render_json(content, &template_ctx)
                    .map_err(Error::from)?;
                serde_json::to_vec(&value)?
            }
            ResponseBody::Base64 { .. } => body.to_bytes()?,
        };
        Ok(Bytes::from(rendered))
    }
}

#[async_trait]
impl Handler for FixtureHandler {
    async fn handle(
        &self,
        request: MockRequest,
        ctx: HandlerContext,
    ) -> Result<Response, BoxError> {
        let definition = &self.definition;

        if let Some(delay) = &definition.delay {
            let delay_ms = delay.calculate();
            if delay_ms > 0 {
                debug!(path = %definition.path, delay_ms, "Applying delay");
                ctx.delay(delay_ms).await;
            }
        }

        match &definition.fault {
            Some(FaultConfig::Error { message }) => {
                return Err(Box::new(InjectedFault {
                    message: message
                        .clone()
                        .unwrap_or_else(|| format!("injected failure for {}", definition.path)),
                }));
            }
            Some(FaultConfig::Timeout { duration_ms }) => {
                debug!(path = %definition.path, duration_ms, "Simulating timeout");
                ctx.delay(*duration_ms).await;
                return Err(Box::new(InjectedFault {
                    message: format!("timed out after {}ms", duration_ms),
                }));
            }
            None => {}
        }

        let body = self.render_body(&request, &ctx)?;
        let mut builder = http::Response::builder()
            .status(definition.response.status)
            .header(CONTENT_TYPE, &self.content_type);
        for (name, value) in &definition.response.headers {
            if !name.eq_ignore_ascii_case("content-type") {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }

        Ok(builder.body(body).map_err(Error::from)?)
    }
}
