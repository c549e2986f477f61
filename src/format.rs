//! Rendering of failures for humans and machines
//!
//! Every style includes the user-facing message, the error code and the
//! registry's recovery suggestions. Verbose mode adds the developer message,
//! the failure context, the cause chain and the sanitized error context.

use crate::context::ErrorContext;
use crate::taxonomy::{ErrorCodeRegistry, ErrorSeverity, Failure};

use crossterm::style::{StyledContent, Stylize};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt::{self, Write as _};
use std::str::FromStr;
use std::sync::Arc;

/// Output style
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatStyle {
    /// Terminal output, optionally colored
    #[default]
    Console,
    Json,
    Html,
    Markdown,
    Plain,
}

impl FormatStyle {
    pub const ALL: [FormatStyle; 5] = [
        FormatStyle::Console,
        FormatStyle::Json,
        FormatStyle::Html,
        FormatStyle::Markdown,
        FormatStyle::Plain,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FormatStyle::Console => "console",
            FormatStyle::Json => "json",
            FormatStyle::Html => "html",
            FormatStyle::Markdown => "markdown",
            FormatStyle::Plain => "plain",
        }
    }
}

impl fmt::Display for FormatStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormatStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "console" | "terminal" => Ok(FormatStyle::Console),
            "json" => Ok(FormatStyle::Json),
            "html" => Ok(FormatStyle::Html),
            "markdown" | "md" => Ok(FormatStyle::Markdown),
            "plain" | "text" => Ok(FormatStyle::Plain),
            other => Err(format!("unknown error format '{other}'")),
        }
    }
}

/// Formatter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatConfig {
    /// Style used by the handler when emitting
    pub style: FormatStyle,
    /// Include context, cause chain and metadata
    pub verbose: bool,
    /// ANSI colors in console output
    pub color: bool,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            style: FormatStyle::Console,
            verbose: false,
            color: true,
        }
    }
}

/// Renders a failure in a given style.
pub trait ErrorFormatter: Send + Sync {
    fn format(&self, failure: &Failure, context: Option<&ErrorContext>, style: FormatStyle)
        -> String;
}

/// The built-in formatter.
#[derive(Debug, Clone, Default)]
pub struct DefaultFormatter {
    config: FormatConfig,
    registry: Option<Arc<ErrorCodeRegistry>>,
}

impl DefaultFormatter {
    pub fn new(config: FormatConfig) -> Self {
        Self {
            config,
            registry: None,
        }
    }

    /// Look suggestions up in `registry` instead of the global one.
    pub fn with_registry(mut self, registry: Arc<ErrorCodeRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn config(&self) -> &FormatConfig {
        &self.config
    }

    fn suggestions(&self, failure: &Failure) -> Vec<String> {
        match &self.registry {
            Some(registry) => failure.recovery_suggestions_in(registry),
            None => failure.recovery_suggestions(),
        }
    }

    fn render_console(&self, failure: &Failure, context: Option<&ErrorContext>) -> String {
        let color = self.config.color;
        let paint = |text: String, styler: fn(String) -> StyledContent<String>| {
            if color {
                styler(text).to_string()
            } else {
                text
            }
        };

        let mut out = String::new();
        let headline = format!(
            "✖ [{}] {}",
            failure.severity().as_str().to_uppercase(),
            failure.user_message()
        );
        let severity_styler: fn(String) -> StyledContent<String> = match failure.severity() {
            ErrorSeverity::Critical | ErrorSeverity::High => |s| s.red().bold(),
            ErrorSeverity::Medium => |s| s.yellow().bold(),
            ErrorSeverity::Low => |s| s.cyan().bold(),
        };
        let _ = writeln!(out, "{}", paint(headline, severity_styler));
        let _ = writeln!(out, "  Code: {}", paint(failure.code().to_string(), |s| s.dim()));

        let suggestions = self.suggestions(failure);
        if !suggestions.is_empty() {
            let _ = writeln!(out, "  {}", paint("Suggestions:".to_string(), |s| s.bold()));
            for suggestion in &suggestions {
                let _ = writeln!(out, "    • {suggestion}");
            }
        }

        if self.config.verbose {
            let _ = writeln!(out, "  Details: {}", failure.message());
            for (key, value) in failure.context() {
                let _ = writeln!(out, "    {key}: {}", compact(value));
            }
            let causes = failure.to_record().causes;
            if !causes.is_empty() {
                let _ = writeln!(out, "  {}", paint("Caused by:".to_string(), |s| s.bold()));
                for cause in causes {
                    let code = cause.code.map(|c| format!("[{c}] ")).unwrap_or_default();
                    let _ = writeln!(out, "    ← {code}{}", cause.message);
                }
            }
            let _ = writeln!(
                out,
                "  {}",
                paint(metadata_line(failure, context), |s| s.dim())
            );
        }

        out.trim_end().to_string()
    }

    fn render_json(&self, failure: &Failure, context: Option<&ErrorContext>) -> String {
        let suggestions = self.suggestions(failure);
        let value = if self.config.verbose {
            json!({
                "error": failure.to_record(),
                "suggestions": suggestions,
                "context": context.map(ErrorContext::to_value),
            })
        } else {
            json!({
                "error": {
                    "id": failure.id(),
                    "code": failure.code(),
                    "category": failure.category(),
                    "severity": failure.severity(),
                    "user_message": failure.user_message(),
                    "retryable": failure.is_retryable(),
                },
                "suggestions": suggestions,
            })
        };
        serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
    }

    fn render_html(&self, failure: &Failure, context: Option<&ErrorContext>) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "<div class=\"aicli-error severity-{}\">",
            failure.severity().as_str()
        );
        let _ = writeln!(
            out,
            "  <p class=\"message\">{}</p>",
            escape_html(failure.user_message())
        );
        let _ = writeln!(
            out,
            "  <p class=\"code\"><code>{}</code></p>",
            escape_html(failure.code())
        );

        let suggestions = self.suggestions(failure);
        if !suggestions.is_empty() {
            let _ = writeln!(out, "  <ul class=\"suggestions\">");
            for suggestion in &suggestions {
                let _ = writeln!(out, "    <li>{}</li>", escape_html(suggestion));
            }
            let _ = writeln!(out, "  </ul>");
        }

        if self.config.verbose {
            let _ = writeln!(
                out,
                "  <p class=\"details\">{}</p>",
                escape_html(failure.message())
            );
            if !failure.context().is_empty() {
                let _ = writeln!(out, "  <dl class=\"context\">");
                for (key, value) in failure.context() {
                    let _ = writeln!(
                        out,
                        "    <dt>{}</dt><dd>{}</dd>",
                        escape_html(key),
                        escape_html(&compact(value))
                    );
                }
                let _ = writeln!(out, "  </dl>");
            }
            let causes = failure.to_record().causes;
            if !causes.is_empty() {
                let _ = writeln!(out, "  <ol class=\"causes\">");
                for cause in causes {
                    let _ = writeln!(out, "    <li>{}</li>", escape_html(&cause.message));
                }
                let _ = writeln!(out, "  </ol>");
            }
            let _ = writeln!(
                out,
                "  <p class=\"metadata\">{}</p>",
                escape_html(&metadata_line(failure, context))
            );
        }

        out.push_str("</div>");
        out
    }

    fn render_markdown(&self, failure: &Failure, context: Option<&ErrorContext>) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "### Error: {}", failure.user_message());
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "**Code:** `{}` | **Severity:** {}",
            failure.code(),
            failure.severity()
        );

        let suggestions = self.suggestions(failure);
        if !suggestions.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "**Suggestions:**");
            for suggestion in &suggestions {
                let _ = writeln!(out, "- {suggestion}");
            }
        }

        if self.config.verbose {
            let _ = writeln!(out);
            let _ = writeln!(out, "**Details:** {}", failure.message());
            if !failure.context().is_empty() {
                let body = serde_json::to_string_pretty(failure.context()).unwrap_or_default();
                let _ = writeln!(out);
                let _ = writeln!(out, "```json\n{body}\n```");
            }
            let causes = failure.to_record().causes;
            if !causes.is_empty() {
                let _ = writeln!(out);
                let _ = writeln!(out, "**Caused by:**");
                for cause in causes {
                    let _ = writeln!(out, "1. {}", cause.message);
                }
            }
            let _ = writeln!(out);
            let _ = writeln!(out, "_{}_", metadata_line(failure, context));
        }

        out.trim_end().to_string()
    }

    fn render_plain(&self, failure: &Failure, context: Option<&ErrorContext>) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Error [{}]: {}", failure.code(), failure.user_message());

        let suggestions = self.suggestions(failure);
        if !suggestions.is_empty() {
            let _ = writeln!(out, "Suggestions:");
            for suggestion in &suggestions {
                let _ = writeln!(out, "  - {suggestion}");
            }
        }

        if self.config.verbose {
            let _ = writeln!(out, "Details: {}", failure.message());
            for (key, value) in failure.context() {
                let _ = writeln!(out, "  {key}: {}", compact(value));
            }
            for cause in failure.to_record().causes {
                let _ = writeln!(out, "Caused by: {}", cause.message);
            }
            let _ = writeln!(out, "{}", metadata_line(failure, context));
        }

        out.trim_end().to_string()
    }
}

impl ErrorFormatter for DefaultFormatter {
    fn format(
        &self,
        failure: &Failure,
        context: Option<&ErrorContext>,
        style: FormatStyle,
    ) -> String {
        match style {
            FormatStyle::Console => self.render_console(failure, context),
            FormatStyle::Json => self.render_json(failure, context),
            FormatStyle::Html => self.render_html(failure, context),
            FormatStyle::Markdown => self.render_markdown(failure, context),
            FormatStyle::Plain => self.render_plain(failure, context),
        }
    }
}

fn metadata_line(failure: &Failure, context: Option<&ErrorContext>) -> String {
    let mut line = format!(
        "id={} category={} at={}",
        failure.id(),
        failure.category(),
        failure.timestamp().to_rfc3339()
    );
    if let Some(context) = context {
        let _ = write!(
            line,
            " correlation_id={} context_id={}",
            context.correlation_id, context.id
        );
    }
    line
}

/// Strings without quotes, everything else as compact JSON.
fn compact(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
