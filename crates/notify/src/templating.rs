//! Minijinja template rendering for notification bodies.
//!
//! Templates are arbitrary strings (not pre-registered), so a fresh
//! [`minijinja::Environment`] is created per render call. The breach
//! payload is exposed directly as the template context.

use crate::traits::{BreachNotification, NotifyError};

/// Renders notification templates using minijinja.
#[derive(Debug)]
pub struct TemplateRenderer {
    _private: (),
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Build a configured minijinja environment with custom filters and globals.
    fn build_env() -> minijinja::Environment<'static> {
        let mut env = minijinja::Environment::new();
        env.add_filter("duration", duration_filter);
        env.add_function("env", env_function);
        env
    }

    /// Render a template string with a breach as context.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Template`] if the template is invalid or
    /// rendering fails.
    pub fn render(
        &self,
        template_str: &str,
        breach: &BreachNotification,
    ) -> Result<String, NotifyError> {
        let env = Self::build_env();
        env.render_str(template_str, breach)
            .map_err(|e| NotifyError::Template(e.to_string()))
    }

    /// Validate that a template string parses without errors. Does not
    /// evaluate the template.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Template`] if the template has syntax errors.
    pub fn validate(&self, template_str: &str) -> Result<(), NotifyError> {
        let env = Self::build_env();
        env.template_from_str(template_str)
            .map_err(|e| NotifyError::Template(e.to_string()))?;
        Ok(())
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Custom filter: render a millisecond duration as a compact human string
/// (`14400000` → `"4h"`, `5400000` → `"1h 30m"`).
fn duration_filter(ms: i64) -> String {
    format_duration_ms(ms)
}

fn format_duration_ms(ms: i64) -> String {
    let total_secs = ms.max(0) / 1000;
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3_600;
    let minutes = (total_secs % 3_600) / 60;

    match (days, hours, minutes) {
        (0, 0, m) => format!("{}m", m),
        (0, h, 0) => format!("{}h", h),
        (0, h, m) => format!("{}h {}m", h, m),
        (d, 0, _) => format!("{}d", d),
        (d, h, _) => format!("{}d {}h", d, h),
    }
}

/// Global function: read an environment variable by name. Missing
/// variables render as an empty string (with a warning logged).
fn env_function(name: String) -> String {
    match std::env::var(&name) {
        Ok(val) => val,
        Err(_) => {
            tracing::warn!(var = %name, "environment variable not found, rendering empty string");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_breach() -> BreachNotification {
        BreachNotification {
            entity_id: "C-1042".to_string(),
            target_key: "respond".to_string(),
            goal_ms: 14_400_000,
            breached_at: chrono::Utc.with_ymd_and_hms(2026, 2, 16, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn render_basic_template() {
        let renderer = TemplateRenderer::new();
        let template = "SLA '{{ target_key }}' breached for {{ entity_id }}";
        let result = renderer.render(template, &sample_breach()).unwrap();
        assert_eq!(result, "SLA 'respond' breached for C-1042");
    }

    #[test]
    fn render_duration_filter() {
        let renderer = TemplateRenderer::new();
        let template = "goal was {{ goal_ms | duration }}";
        let result = renderer.render(template, &sample_breach()).unwrap();
        assert_eq!(result, "goal was 4h");
    }

    #[test]
    fn format_duration_scales() {
        assert_eq!(format_duration_ms(0), "0m");
        assert_eq!(format_duration_ms(90_000), "1m");
        assert_eq!(format_duration_ms(5_400_000), "1h 30m");
        assert_eq!(format_duration_ms(14_400_000), "4h");
        assert_eq!(format_duration_ms(432_000_000), "5d");
        assert_eq!(format_duration_ms(450_000_000), "5d 5h");
        assert_eq!(format_duration_ms(-1), "0m");
    }

    #[test]
    fn render_env_function() {
        std::env::set_var("CASEWATCH_NOTIFY_TEST_VAR", "oncall");
        let renderer = TemplateRenderer::new();
        let result = renderer
            .render("to {{ env('CASEWATCH_NOTIFY_TEST_VAR') }}", &sample_breach())
            .unwrap();
        assert_eq!(result, "to oncall");
        std::env::remove_var("CASEWATCH_NOTIFY_TEST_VAR");
    }

    #[test]
    fn render_env_missing_returns_empty() {
        let renderer = TemplateRenderer::new();
        let result = renderer
            .render("[{{ env('DEFINITELY_NOT_SET_XYZ') }}]", &sample_breach())
            .unwrap();
        assert_eq!(result, "[]");
    }

    #[test]
    fn invalid_template_produces_error() {
        let renderer = TemplateRenderer::new();
        let result = renderer.render("{{ unclosed", &sample_breach());
        match result.unwrap_err() {
            NotifyError::Template(msg) => assert!(!msg.is_empty()),
            other => panic!("expected Template error, got: {:?}", other),
        }
    }

    #[test]
    fn validate_checks_syntax_only() {
        let renderer = TemplateRenderer::new();
        assert!(renderer.validate("Hello {{ target_key }}").is_ok());
        assert!(renderer.validate("{{ unclosed").is_err());
    }
}
