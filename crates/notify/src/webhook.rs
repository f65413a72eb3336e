//! HTTP webhook notifier.
//!
//! Delivers breach notifications as JSON POSTs to a configured endpoint,
//! with optional custom headers and an optional body template.

use std::collections::HashMap;
use std::sync::Arc;

use crate::templating::TemplateRenderer;
use crate::traits::{BreachNotification, Notifier, NotifyError};

/// Delivers breaches as JSON over HTTP to a configured endpoint.
///
/// Environment variable references (`${VAR_NAME}`) in the URL and header
/// values are resolved at construction time. When a body template is set,
/// the rendered template is sent; otherwise the notification is serialized
/// as JSON directly.
#[derive(Debug)]
pub struct WebhookNotifier {
    url: String,
    headers: HashMap<String, String>,
    body_template: Option<String>,
    renderer: Arc<TemplateRenderer>,
    client: reqwest::Client,
}

impl WebhookNotifier {
    /// Create a new webhook notifier.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Config`] when a referenced env var is missing
    /// or the body template has syntax errors.
    pub fn new(
        url: String,
        headers: HashMap<String, String>,
        body_template: Option<String>,
        renderer: Arc<TemplateRenderer>,
    ) -> Result<Self, NotifyError> {
        let resolved_url = resolve_env_vars(&url)?;

        let mut resolved_headers = HashMap::with_capacity(headers.len());
        for (key, value) in &headers {
            resolved_headers.insert(key.clone(), resolve_env_vars(value)?);
        }

        if let Some(ref tmpl) = body_template {
            renderer
                .validate(tmpl)
                .map_err(|e| NotifyError::Config(format!("invalid body template: {e}")))?;
        }

        Ok(Self {
            url: resolved_url,
            headers: resolved_headers,
            body_template,
            renderer,
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, breach: &BreachNotification) -> Result<(), NotifyError> {
        let body = match &self.body_template {
            Some(tmpl) => self.renderer.render(tmpl, breach)?,
            None => serde_json::to_string(breach)
                .map_err(|e| NotifyError::Config(format!("failed to serialize breach: {e}")))?,
        };

        let mut request = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        for (key, value) in &self.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(
                url = %self.url,
                %status,
                body = %body_text,
                "breach webhook returned non-2xx status"
            );
            return Err(NotifyError::Config(format!(
                "webhook returned {status}: {body_text}"
            )));
        }

        tracing::debug!(
            url = %self.url,
            entity_id = %breach.entity_id,
            target_key = %breach.target_key,
            "breach webhook delivered"
        );

        Ok(())
    }

    fn channel_name(&self) -> &str {
        "webhook"
    }
}

/// Resolve `${VAR_NAME}` patterns in a string using `std::env::var`.
///
/// Returns an error if a referenced variable is not set.
fn resolve_env_vars(input: &str) -> Result<String, NotifyError> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                var_name.push(c);
            }
            if !closed {
                return Err(NotifyError::Config(format!(
                    "unclosed env var reference in: {input}"
                )));
            }
            let value = std::env::var(&var_name)
                .map_err(|_| NotifyError::Config(format!("env var not found: {var_name}")))?;
            result.push_str(&value);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer() -> Arc<TemplateRenderer> {
        Arc::new(TemplateRenderer::new())
    }

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("CW_WEBHOOK_TEST_HOST", "example.com");
        let result = resolve_env_vars("https://${CW_WEBHOOK_TEST_HOST}/hook").unwrap();
        assert_eq!(result, "https://example.com/hook");
        std::env::remove_var("CW_WEBHOOK_TEST_HOST");
    }

    #[test]
    fn resolve_env_vars_missing() {
        let result = resolve_env_vars("https://${ABSOLUTELY_NOT_SET_12345}/hook");
        match result.unwrap_err() {
            NotifyError::Config(msg) => assert!(msg.contains("ABSOLUTELY_NOT_SET_12345")),
            other => panic!("expected Config error, got: {other:?}"),
        }
    }

    #[test]
    fn resolve_env_vars_unclosed() {
        let result = resolve_env_vars("https://${UNCLOSED/hook");
        match result.unwrap_err() {
            NotifyError::Config(msg) => assert!(msg.contains("unclosed")),
            other => panic!("expected Config error, got: {other:?}"),
        }
    }

    #[test]
    fn resolve_env_vars_no_vars() {
        let result = resolve_env_vars("https://plain.example.com/hook").unwrap();
        assert_eq!(result, "https://plain.example.com/hook");
    }

    #[test]
    fn headers_resolve_env_vars() {
        std::env::set_var("CW_API_KEY", "secret-key-123");
        let headers = HashMap::from([
            ("X-Api-Key".to_string(), "${CW_API_KEY}".to_string()),
            ("X-Static".to_string(), "fixed-value".to_string()),
        ]);
        let notifier =
            WebhookNotifier::new("https://example.com".into(), headers, None, renderer()).unwrap();
        assert_eq!(notifier.headers["X-Api-Key"], "secret-key-123");
        assert_eq!(notifier.headers["X-Static"], "fixed-value");
        std::env::remove_var("CW_API_KEY");
    }

    #[test]
    fn invalid_body_template_rejected_at_construction() {
        let result = WebhookNotifier::new(
            "https://example.com".into(),
            HashMap::new(),
            Some("{{ unclosed".into()),
            renderer(),
        );
        match result.unwrap_err() {
            NotifyError::Config(msg) => assert!(msg.contains("invalid body template")),
            other => panic!("expected Config error, got: {other:?}"),
        }
    }

    #[test]
    fn channel_name_is_webhook() {
        let notifier = WebhookNotifier::new(
            "https://example.com".into(),
            HashMap::new(),
            None,
            renderer(),
        )
        .unwrap();
        assert_eq!(notifier.channel_name(), "webhook");
    }
}
