//! Chat-text rendering for tooltalk.
//!
//! Every reply the agent sends is produced here, one pure method per
//! result kind. The formatter never talks to a session or a transport;
//! it takes typed outcomes and turns them into markdown-flavored chat
//! text. Output size is bounded: nested payloads are abbreviated past a
//! depth limit and raw schema dumps are cut at a fixed length.

use serde_json::{json, Map, Value};
use tooltalk_core::{ConnectOutcome, StatusReport, ToolDescriptor, ToolSchema};
use tooltalk_schema::{normalize, PropertySpec};

/// Raw schema dumps longer than this many characters are cut short.
const RAW_SCHEMA_LIMIT: usize = 2000;

/// Renders tool results, schemas and error conditions as chat text.
#[derive(Debug, Clone)]
pub struct Formatter {
    max_depth: usize,
    indent: usize,
}

impl Default for Formatter {
    fn default() -> Self {
        Self {
            max_depth: 3,
            indent: 2,
        }
    }
}

impl Formatter {
    /// Formatter with the default depth (3) and indent (2) limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Formatter with explicit rendering limits.
    pub fn with_limits(max_depth: usize, indent: usize) -> Self {
        Self { max_depth, indent }
    }

    // ---------------------------------------------------------- sessions

    /// A successful connect, with a pointer at the tool list.
    pub fn connect_success(&self, outcome: &ConnectOutcome) -> String {
        format!(
            "✅ Connected to MCP server at {}\n\nFound {} available tools. Use `list` to see them.",
            outcome.url, outcome.tool_count
        )
    }

    /// A failed connect attempt.
    pub fn connect_failure(&self, message: &str) -> String {
        format!("❌ {message}")
    }

    /// A successful disconnect from `url`.
    pub fn disconnect_success(&self, url: &str) -> String {
        format!("✅ Disconnected from MCP server at {url}")
    }

    /// A failed disconnect attempt.
    pub fn disconnect_failure(&self, message: &str) -> String {
        format!("❌ {message}")
    }

    /// Connection status, connected or not.
    pub fn status(&self, report: &StatusReport) -> String {
        if !report.connected {
            return "📡 Status: Not connected".to_string();
        }
        let mut message = format!(
            "📡 Status: Connected to {}\nAvailable tools: {}",
            report.url.as_deref().unwrap_or("unknown"),
            report.tool_count
        );
        if report.has_token {
            message.push_str("\nAuthentication: Using token");
        } else {
            message.push_str("\nAuthentication: None");
        }
        message
    }

    // ------------------------------------------------------------- tools

    /// The tool list with a one-line argument summary per tool.
    pub fn tool_list(&self, tools: &[ToolDescriptor]) -> String {
        if tools.is_empty() {
            return "No tools available. Make sure you're connected to an MCP server."
                .to_string();
        }

        let mut out = format!("📋 Available Tools ({}):\n\n", tools.len());
        for tool in tools {
            let description = if tool.description.is_empty() {
                "No description available"
            } else {
                &tool.description
            };
            out.push_str(&format!("**{}**\n{description}\n\n", tool.name));

            let schema = normalize(&tool.schema);
            if schema.properties.is_empty() {
                continue;
            }
            out.push_str("Arguments:\n");
            for (name, value) in &schema.properties {
                let prop = PropertySpec::from_value(value);
                let marker = if schema.is_required(name) { "*" } else { "" };
                out.push_str(&format!("- `{name}`{marker}: {}", prop.type_or_any()));
                if let Some(desc) = prop.description.as_deref().filter(|d| !d.is_empty()) {
                    out.push_str(&format!(" - {desc}"));
                }
                out.push('\n');
            }
            out.push('\n');
        }

        out.push_str("Use `call [tool_name] {\"arg\": \"value\"}` to call a tool.\n");
        out.push_str("Or use the shorthand syntax: `shorthand [tool_name] arg=\"value\"`");
        out
    }

    /// A successful tool call, payload fenced and depth-bounded.
    pub fn tool_call_result(&self, result: &Value) -> String {
        let body = match result {
            Value::Object(_) | Value::Array(_) => self.render_value(result),
            Value::Null => "No result returned".to_string(),
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        format!("✅ Tool call successful:\n\n```\n{body}\n```")
    }

    // ------------------------------------------------------------ errors

    /// A generic error line.
    pub fn error(&self, message: &str) -> String {
        format!("❌ Error: {message}")
    }

    /// A command the grammar did not recognize.
    pub fn unknown_command(&self, command: &str) -> String {
        format!("❓ Unknown command: `{command}`\n\nUse `help` to see available commands.")
    }

    /// A session-requiring command issued with no session.
    pub fn not_connected(&self) -> String {
        "❌ Not connected to an MCP server.\n\nUse `connect [url]` to connect to a server."
            .to_string()
    }

    /// A validation failure: the missing parameters, annotated from the
    /// schema, plus an example call covering every required parameter.
    pub fn parameter_validation_error(
        &self,
        tool: &str,
        missing: &[String],
        schema: &ToolSchema,
    ) -> String {
        let mut out = format!(
            "❌ Parameter validation error for tool '{tool}':\nMissing required parameters: {}\n\n",
            missing.join(", ")
        );

        if schema.properties.is_empty() {
            return out;
        }

        out.push_str("Missing parameters:\n");
        for name in missing {
            let prop = schema
                .properties
                .get(name)
                .map(PropertySpec::from_value)
                .unwrap_or_default();
            out.push_str(&format!("- `{name}`: {}", prop.type_or_any()));
            if let Some(desc) = prop.description.as_deref().filter(|d| !d.is_empty()) {
                out.push_str(&format!(" - {desc}"));
            }
            out.push('\n');
        }

        let mut example = Map::new();
        for name in &schema.required {
            if let Some(value) = schema.properties.get(name) {
                let prop = PropertySpec::from_value(value);
                example.insert(name.clone(), example_value(name, &prop));
            }
        }
        out.push_str(&format!(
            "\nExample usage:\n```\ncall {tool} {}\n```",
            pretty(&Value::Object(example))
        ));
        out
    }

    // ------------------------------------------------------------ schema

    /// The full schema of one tool: annotated parameter list, a
    /// synthesized example call, then the raw schema (size-capped).
    pub fn schema_result(&self, tool: &str, schema: &ToolSchema) -> String {
        if schema.is_empty() {
            return format!("❌ No schema available for tool '{tool}'");
        }

        let mut out = format!("📝 Schema for tool '{tool}':\n\n");
        if let Some(title) = schema.title() {
            out.push_str(&format!("**Title**: {title}\n\n"));
        }
        if let Some(description) = schema.description() {
            out.push_str(&format!("**Description**: {description}\n\n"));
        }

        if schema.properties.is_empty() {
            out.push_str("**No parameters defined in schema**\n\n");
        } else {
            self.push_parameter_section(&mut out, schema);
        }

        out.push_str("**Example Usage**:\n\n");
        let example = synthesize_example(schema);
        out.push_str(&format!(
            "```\n# Natural language command:\nschema {tool}\n\n# Structured command:\n!schema {tool}\n\n# Tool call example:\ncall {tool} {}\n```\n\n",
            pretty(&Value::Object(example))
        ));

        out.push_str("**Raw Schema**:\n\n");
        match serde_json::to_string_pretty(schema) {
            Ok(raw) => {
                let capped = if raw.chars().count() > RAW_SCHEMA_LIMIT {
                    let head: String = raw.chars().take(RAW_SCHEMA_LIMIT).collect();
                    format!("{head}\n... (truncated)")
                } else {
                    raw
                };
                out.push_str(&format!("```json\n{capped}\n```"));
            }
            Err(err) => out.push_str(&format!("```\nError formatting schema: {err}\n```")),
        }
        out
    }

    fn push_parameter_section(&self, out: &mut String, schema: &ToolSchema) {
        let required_count = schema
            .properties
            .keys()
            .filter(|name| schema.is_required(name))
            .count();
        let optional_count = schema.properties.len() - required_count;
        out.push_str(&format!(
            "**Parameters** ({required_count} required, {optional_count} optional):\n\n"
        ));

        let mut entries: Vec<(&String, &Value)> = schema.properties.iter().collect();
        entries.sort_by(|(a, _), (b, _)| {
            let (ra, rb) = (schema.is_required(a), schema.is_required(b));
            rb.cmp(&ra).then_with(|| a.cmp(b))
        });

        for (name, value) in entries {
            if !value.is_object() {
                continue;
            }
            let prop = PropertySpec::from_value(value);
            let marker = if schema.is_required(name) {
                " (required)"
            } else {
                " (optional)"
            };
            out.push_str(&format!("- **`{name}`**{marker}: `{}`\n", prop.type_or_any()));
            if let Some(desc) = prop.description.as_deref().filter(|d| !d.is_empty()) {
                out.push_str(&format!("  {desc}\n"));
            }
            let constraints = constraint_lines(&prop);
            if !constraints.is_empty() {
                out.push_str(&format!("  {}\n", constraints.join("\n  ")));
            }
            out.push('\n');
        }
    }

    // ----------------------------------------------------- raw structure

    /// Render a JSON value with indentation, abbreviating non-empty
    /// containers nested at or beyond the depth limit as `{...}`/`[...]`.
    pub fn render_value(&self, value: &Value) -> String {
        self.render_at(value, 0)
    }

    fn render_at(&self, value: &Value, depth: usize) -> String {
        if depth >= self.max_depth {
            match value {
                Value::Object(map) if !map.is_empty() => return "{...}".to_string(),
                Value::Array(items) if !items.is_empty() => return "[...]".to_string(),
                _ => {}
            }
        }

        match value {
            Value::Object(map) if map.is_empty() => "{}".to_string(),
            Value::Object(map) => {
                let indent = " ".repeat(self.indent * depth);
                let inner = " ".repeat(self.indent * (depth + 1));
                let parts: Vec<String> = map
                    .iter()
                    .map(|(key, val)| {
                        format!("{inner}\"{key}\": {}", self.render_at(val, depth + 1))
                    })
                    .collect();
                format!("{{\n{}\n{indent}}}", parts.join(",\n"))
            }
            Value::Array(items) if items.is_empty() => "[]".to_string(),
            Value::Array(items) => {
                let indent = " ".repeat(self.indent * depth);
                let inner = " ".repeat(self.indent * (depth + 1));
                let parts: Vec<String> = items
                    .iter()
                    .map(|item| format!("{inner}{}", self.render_at(item, depth + 1)))
                    .collect();
                format!("[\n{}\n{indent}]", parts.join(",\n"))
            }
            Value::String(text) => format!("\"{text}\""),
            Value::Null => "null".to_string(),
            other => other.to_string(),
        }
    }
}

/// Constraint annotations for one parameter, in listing order.
fn constraint_lines(prop: &PropertySpec) -> Vec<String> {
    let mut lines = Vec::new();

    if !prop.choices.is_empty() {
        if prop.choices.len() <= 5 {
            let values: Vec<String> = prop
                .choices
                .iter()
                .map(|choice| format!("`{}`", value_literal(choice)))
                .collect();
            lines.push(format!("Allowed values: {}", values.join(", ")));
        } else {
            lines.push(format!("Allowed values: {} options", prop.choices.len()));
        }
    }

    match &prop.default {
        Some(Value::Null) => lines.push("Default: `null`".to_string()),
        Some(Value::String(text)) => lines.push(format!("Default: `\"{text}\"`")),
        Some(other) => lines.push(format!("Default: `{other}`")),
        None => {}
    }

    match prop.type_or_any() {
        "number" | "integer" => {
            if let Some(minimum) = &prop.minimum {
                lines.push(format!("Minimum: `{minimum}`"));
            }
            if let Some(maximum) = &prop.maximum {
                lines.push(format!("Maximum: `{maximum}`"));
            }
        }
        "string" => {
            if let Some(min) = prop.min_length {
                lines.push(format!("Minimum length: `{min}`"));
            }
            if let Some(max) = prop.max_length {
                lines.push(format!("Maximum length: `{max}`"));
            }
            if let Some(format) = &prop.format {
                lines.push(format!("Format: `{format}`"));
            }
            if let Some(pattern) = &prop.pattern {
                lines.push(format!("Pattern: `{pattern}`"));
            }
        }
        "array" => {
            if let Some(min) = prop.min_items {
                lines.push(format!("Minimum items: `{min}`"));
            }
            if let Some(max) = prop.max_items {
                lines.push(format!("Maximum items: `{max}`"));
            }
            if prop.unique_items {
                lines.push("Items must be unique".to_string());
            }
        }
        _ => {}
    }

    lines
}

/// Example call arguments: every required parameter, plus up to three
/// optional parameters that declare defaults.
fn synthesize_example(schema: &ToolSchema) -> Map<String, Value> {
    let mut example = Map::new();
    for name in &schema.required {
        if let Some(value) = schema.properties.get(name) {
            let prop = PropertySpec::from_value(value);
            example.insert(name.clone(), example_value(name, &prop));
        }
    }

    let mut padded = 0;
    for (name, value) in &schema.properties {
        if padded >= 3 {
            break;
        }
        if schema.is_required(name) {
            continue;
        }
        if let Some(default) = value.get("default") {
            example.insert(name.clone(), default.clone());
            padded += 1;
        }
    }
    example
}

/// Pick an example value: explicit `example`, else `default`, else the
/// first `enum` value, else a type-appropriate placeholder. String
/// placeholders honor the declared `format`.
fn example_value(name: &str, prop: &PropertySpec) -> Value {
    if let Some(example) = &prop.example {
        return example.clone();
    }
    if let Some(default) = &prop.default {
        return default.clone();
    }
    if let Some(first) = prop.choices.first() {
        return first.clone();
    }

    match prop.type_or_any() {
        "string" => Value::String(match prop.format.as_deref() {
            Some("date") => "2023-01-01".to_string(),
            Some("date-time") => "2023-01-01T12:00:00Z".to_string(),
            Some("email") => "user@example.com".to_string(),
            Some("uri") => "https://example.com".to_string(),
            Some(other) => format!("example_{other}"),
            None => format!("example_{name}"),
        }),
        "number" => json!(42.0),
        "integer" => json!(42),
        "boolean" => Value::Bool(true),
        "array" => match item_type(prop) {
            Some("string") => json!(["example"]),
            Some("number") => json!([42.0]),
            Some("integer") => json!([42]),
            Some("boolean") => json!([true]),
            _ => json!([]),
        },
        "object" => json!({}),
        _ => Value::Null,
    }
}

fn item_type(prop: &PropertySpec) -> Option<&str> {
    prop.items
        .as_ref()
        .and_then(|items| items.get("type"))
        .and_then(Value::as_str)
}

/// How a value reads inside backticks: strings bare, the rest as JSON.
fn value_literal(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}
