//! The session manager owns the transport and the single live [`Session`],
//! and runs the validation and default auto-fill pipeline around tool calls.

use crate::session::Session;
use chrono::Utc;
use serde_json::Value;
use tooltalk_core::{
    CallArgs, ConnectOutcome, StatusReport, ToolDescriptor, ToolSchema, TooltalkError,
    TooltalkResult,
};
use tooltalk_mcp::ToolTransport;
use tooltalk_schema::{normalize, optional_defaults, required_params, validate_structure};
use tracing::{debug, info, warn};

/// Connection lifecycle and tool-call orchestration over one transport.
///
/// At most one session is live at a time; connecting while connected tears
/// the old session down first. All methods that talk to the server take
/// `&mut self` — each chat command runs to completion before the next.
pub struct SessionManager {
    transport: Box<dyn ToolTransport>,
    session: Option<Session>,
}

impl SessionManager {
    /// Build a manager around a transport. No connection is attempted.
    pub fn new(transport: Box<dyn ToolTransport>) -> Self {
        Self {
            transport,
            session: None,
        }
    }

    /// Connect to an MCP server, replacing any live session.
    ///
    /// An explicit `token` wins over `token_env_var`; naming an environment
    /// variable that is absent or empty fails before any I/O happens. On
    /// failure the manager is left disconnected.
    pub async fn connect(
        &mut self,
        url: &str,
        token: Option<&str>,
        token_env_var: Option<&str>,
    ) -> TooltalkResult<ConnectOutcome> {
        let token = resolve_token(token, token_env_var)?;

        if let Some(previous) = self.session.take() {
            info!(url = %previous.url, "Tearing down live session before reconnecting");
            if let Err(e) = self.transport.disconnect().await {
                warn!(url = %previous.url, error = %e, "Teardown of previous session failed");
            }
        }

        let tools = self
            .transport
            .connect(url, token.as_deref())
            .await
            .map_err(|e| {
                let cause = match e {
                    TooltalkError::Transport(message) => message,
                    other => other.to_string(),
                };
                TooltalkError::Connection(format!(
                    "Failed to connect to MCP server at {url}: {cause}"
                ))
            })?;

        let outcome = ConnectOutcome {
            url: url.to_string(),
            tool_count: tools.len(),
        };
        self.session = Some(Session::new(url, token, tools));
        info!(url = %url, tools = outcome.tool_count, "Session established");
        Ok(outcome)
    }

    /// Disconnect the live session and return the url it pointed at.
    pub async fn disconnect(&mut self) -> TooltalkResult<String> {
        let session = self.session.take().ok_or(TooltalkError::NotConnected)?;
        self.transport.disconnect().await?;
        let uptime = Utc::now() - session.connected_at;
        info!(
            url = %session.url,
            uptime_secs = uptime.num_seconds(),
            "Disconnected from MCP server"
        );
        Ok(session.url)
    }

    /// Connection state for the status command. Never fails.
    pub fn status(&self) -> StatusReport {
        match &self.session {
            Some(session) => StatusReport {
                connected: true,
                url: Some(session.url.clone()),
                tool_count: session.tools.len(),
                has_token: session.has_token(),
            },
            None => StatusReport::disconnected(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// The tool listing cached when the session was established (and
    /// refreshed by `schema`/`call_tool`).
    pub fn tools(&self) -> &[ToolDescriptor] {
        self.session
            .as_ref()
            .map_or(&[], |session| session.tools.as_slice())
    }

    /// Normalized schema for one tool, freshly listed from the server.
    /// Updates the tool cache as a side effect.
    pub async fn schema(&mut self, tool: &str) -> TooltalkResult<ToolSchema> {
        let descriptor = self.refresh_and_find(tool).await?;
        Ok(normalize(&descriptor.schema))
    }

    /// Call a tool: validate required parameters, fill optional defaults,
    /// invoke, and hand back the raw result payload.
    ///
    /// A schema that fails the structural check never blocks the call; the
    /// user's arguments are forwarded unchanged. Missing required
    /// parameters abort before any network call, carrying the normalized
    /// schema so the error can be rendered with descriptions and an
    /// example.
    pub async fn call_tool(&mut self, tool: &str, args: CallArgs) -> TooltalkResult<Value> {
        let prepared = {
            let descriptor = self.refresh_and_find(tool).await?;
            prepare_arguments(tool, &descriptor.schema, args)?
        };

        debug!(tool = %tool, params = prepared.len(), "Invoking tool");
        self.transport
            .call_tool(tool, prepared)
            .await
            .map_err(|e| TooltalkError::ToolInvocation {
                tool: tool.to_string(),
                message: match e {
                    TooltalkError::Transport(message) => message,
                    other => other.to_string(),
                },
            })
    }

    async fn refresh_and_find(&mut self, tool: &str) -> TooltalkResult<&ToolDescriptor> {
        let Some(session) = self.session.as_mut() else {
            return Err(TooltalkError::NotConnected);
        };
        session.tools = self.transport.list_tools().await?;
        session
            .tools
            .iter()
            .find(|descriptor| descriptor.name == tool)
            .ok_or_else(|| TooltalkError::ToolNotFound(tool.to_string()))
    }
}

fn resolve_token(
    token: Option<&str>,
    token_env_var: Option<&str>,
) -> TooltalkResult<Option<String>> {
    if let Some(token) = token {
        return Ok(Some(token.to_string()));
    }
    match token_env_var {
        Some(name) => match std::env::var(name) {
            Ok(value) if !value.is_empty() => Ok(Some(value)),
            _ => Err(TooltalkError::Connection(format!(
                "Environment variable {name} not found or empty"
            ))),
        },
        None => Ok(None),
    }
}

/// Validate `args` against the tool's raw schema and fill optional
/// defaults, never overriding a value the user supplied.
fn prepare_arguments(tool: &str, raw_schema: &Value, args: CallArgs) -> TooltalkResult<CallArgs> {
    if !validate_structure(raw_schema) {
        warn!(tool = %tool, "Malformed tool schema, skipping validation");
        return Ok(args);
    }
    let schema = normalize(raw_schema);

    let missing: Vec<String> = required_params(&schema)
        .iter()
        .filter(|name| !args.contains_key(name.as_str()))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(TooltalkError::MissingParameters {
            tool: tool.to_string(),
            missing,
            schema,
        });
    }

    let mut args = args;
    let mut filled = 0;
    for (name, value) in optional_defaults(&schema) {
        if !args.contains_key(&name) {
            args.insert(name, value);
            filled += 1;
        }
    }
    if filled > 0 {
        debug!(tool = %tool, filled, "Filled optional parameters from schema defaults");
    }
    Ok(args)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(pairs: &[(&str, Value)]) -> CallArgs {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), value.clone()))
            .collect()
    }

    // --- resolve_token ---

    #[test]
    fn test_explicit_token_wins_over_env_var() {
        std::env::set_var("TOOLTALK_TEST_TOKEN_LOSER", "from-env");
        let token = resolve_token(Some("explicit"), Some("TOOLTALK_TEST_TOKEN_LOSER")).unwrap();
        assert_eq!(token.as_deref(), Some("explicit"));
    }

    #[test]
    fn test_token_resolved_from_env_var() {
        std::env::set_var("TOOLTALK_TEST_TOKEN_SET", "from-env");
        let token = resolve_token(None, Some("TOOLTALK_TEST_TOKEN_SET")).unwrap();
        assert_eq!(token.as_deref(), Some("from-env"));
    }

    #[test]
    fn test_missing_env_var_is_a_connection_error() {
        let err = resolve_token(None, Some("TOOLTALK_TEST_TOKEN_NEVER_SET")).unwrap_err();
        match err {
            TooltalkError::Connection(message) => {
                assert_eq!(
                    message,
                    "Environment variable TOOLTALK_TEST_TOKEN_NEVER_SET not found or empty"
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_env_var_is_a_connection_error() {
        std::env::set_var("TOOLTALK_TEST_TOKEN_EMPTY", "");
        assert!(resolve_token(None, Some("TOOLTALK_TEST_TOKEN_EMPTY")).is_err());
    }

    #[test]
    fn test_no_token_sources_yields_none() {
        assert_eq!(resolve_token(None, None).unwrap(), None);
    }

    // --- prepare_arguments ---

    fn weather_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "city": { "type": "string" },
                "units": { "type": "string", "default": "celsius" },
                "days": { "type": "integer" }
            },
            "required": ["city"]
        })
    }

    #[test]
    fn test_missing_required_parameters_abort() {
        let err = prepare_arguments("get_weather", &weather_schema(), CallArgs::new()).unwrap_err();
        match err {
            TooltalkError::MissingParameters {
                tool,
                missing,
                schema,
            } => {
                assert_eq!(tool, "get_weather");
                assert_eq!(missing, vec!["city".to_string()]);
                assert!(schema.properties.contains_key("units"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_only_absent_required_parameters_are_named() {
        let schema = json!({
            "properties": {
                "a": { "type": "integer" },
                "b": { "type": "integer" }
            },
            "required": ["a", "b"]
        });
        let err = prepare_arguments("pair", &schema, args(&[("a", json!(1))])).unwrap_err();
        match err {
            TooltalkError::MissingParameters { missing, .. } => {
                assert_eq!(missing, vec!["b".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_defaults_fill_only_absent_optionals() {
        let prepared = prepare_arguments(
            "get_weather",
            &weather_schema(),
            args(&[("city", json!("Lisbon"))]),
        )
        .unwrap();
        assert_eq!(prepared["city"], json!("Lisbon"));
        assert_eq!(prepared["units"], json!("celsius"));
        assert!(!prepared.contains_key("days"));
    }

    #[test]
    fn test_user_value_is_never_overridden_by_a_default() {
        let prepared = prepare_arguments(
            "get_weather",
            &weather_schema(),
            args(&[("city", json!("Lisbon")), ("units", json!("fahrenheit"))]),
        )
        .unwrap();
        assert_eq!(prepared["units"], json!("fahrenheit"));
    }

    #[test]
    fn test_required_parameter_defaults_are_not_invented() {
        let schema = json!({
            "properties": {
                "city": { "type": "string", "default": "Lisbon" }
            },
            "required": ["city"]
        });
        let err = prepare_arguments("get_weather", &schema, CallArgs::new()).unwrap_err();
        assert!(matches!(err, TooltalkError::MissingParameters { .. }));
    }

    #[test]
    fn test_malformed_schema_forwards_arguments_unchanged() {
        let user_args = args(&[("anything", json!(1))]);
        for raw in [
            json!(["not", "a", "schema"]),
            json!({"properties": "oops"}),
            json!({"properties": {}, "required": "oops"}),
        ] {
            let prepared = prepare_arguments("broken", &raw, user_args.clone()).unwrap();
            assert_eq!(prepared, user_args);
        }
    }

    #[test]
    fn test_empty_args_pass_when_nothing_is_required() {
        let schema = json!({"properties": {"verbose": {"type": "boolean"}}});
        let prepared = prepare_arguments("noop", &schema, CallArgs::new()).unwrap();
        assert!(prepared.is_empty());
    }
}
