//! End-to-end chat flows over a scripted in-memory transport: the full
//! connect / list / status / call / shorthand / disconnect conversation,
//! plus the error replies a user actually sees.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tooltalk_agent::ChatAgent;
use tooltalk_command::{CommandParser, PhraseRecognizer};
use tooltalk_core::{CallArgs, ToolDescriptor, TooltalkError, TooltalkResult};
use tooltalk_format::Formatter;
use tooltalk_mcp::ToolTransport;
use tooltalk_session::SessionManager;

/// Everything the transport was asked to do, shared with the test body.
#[derive(Default)]
struct Recorder {
    connects: Vec<(String, Option<String>)>,
    disconnects: usize,
    calls: Vec<(String, CallArgs)>,
}

struct MockTransport {
    tools: Vec<ToolDescriptor>,
    recorder: Arc<Mutex<Recorder>>,
    call_error: Option<String>,
}

impl MockTransport {
    fn new(tools: Vec<ToolDescriptor>) -> Self {
        Self {
            tools,
            recorder: Arc::default(),
            call_error: None,
        }
    }

    fn recorder(&self) -> Arc<Mutex<Recorder>> {
        Arc::clone(&self.recorder)
    }
}

#[async_trait]
impl ToolTransport for MockTransport {
    async fn connect(
        &mut self,
        url: &str,
        token: Option<&str>,
    ) -> TooltalkResult<Vec<ToolDescriptor>> {
        self.recorder
            .lock()
            .unwrap()
            .connects
            .push((url.to_string(), token.map(str::to_string)));
        Ok(self.tools.clone())
    }

    async fn disconnect(&mut self) -> TooltalkResult<()> {
        self.recorder.lock().unwrap().disconnects += 1;
        Ok(())
    }

    async fn list_tools(&mut self) -> TooltalkResult<Vec<ToolDescriptor>> {
        Ok(self.tools.clone())
    }

    async fn call_tool(&mut self, name: &str, arguments: CallArgs) -> TooltalkResult<Value> {
        if let Some(message) = &self.call_error {
            return Err(TooltalkError::Transport(message.clone()));
        }
        self.recorder
            .lock()
            .unwrap()
            .calls
            .push((name.to_string(), arguments));
        Ok(json!({
            "content": [{"type": "text", "text": format!("{name} ok")}],
            "isError": false
        }))
    }
}

fn tool(name: &str, schema: Value) -> ToolDescriptor {
    serde_json::from_value(json!({
        "name": name,
        "description": format!("{name} tool"),
        "inputSchema": schema
    }))
    .unwrap()
}

fn weather_tools() -> Vec<ToolDescriptor> {
    vec![
        tool(
            "get_weather",
            json!({
                "type": "object",
                "properties": {
                    "city": { "type": "string", "description": "City name" },
                    "units": { "type": "string", "default": "celsius" }
                },
                "required": ["city"]
            }),
        ),
        tool("echo", json!({ "type": "object", "properties": {} })),
    ]
}

fn agent_with(transport: MockTransport) -> ChatAgent {
    ChatAgent::new(
        CommandParser::new(),
        PhraseRecognizer::new(),
        SessionManager::new(Box::new(transport)),
        Formatter::new(),
    )
}

fn agent() -> (ChatAgent, Arc<Mutex<Recorder>>) {
    let transport = MockTransport::new(weather_tools());
    let recorder = transport.recorder();
    (agent_with(transport), recorder)
}

async fn connected_agent() -> (ChatAgent, Arc<Mutex<Recorder>>) {
    let (mut agent, recorder) = agent();
    agent
        .process_message("!connect http://localhost:9000/mcp", None)
        .await;
    (agent, recorder)
}

// --- Full conversation ---

#[tokio::test]
async fn test_full_chat_session() {
    let (mut agent, recorder) = agent();

    let reply = agent
        .process_message("!connect http://localhost:9000/mcp", None)
        .await;
    assert_eq!(
        reply,
        "✅ Connected to MCP server at http://localhost:9000/mcp\n\n\
         Found 2 available tools. Use `list` to see them."
    );

    let listing = agent.process_message("!list", None).await;
    assert!(listing.starts_with("📋 Available Tools (2):"));
    assert!(listing.contains("**get_weather**"));
    assert!(listing.contains("**echo**"));
    assert!(listing.contains("- `city`*: string - City name"));

    let status = agent.process_message("!status", None).await;
    assert_eq!(
        status,
        "📡 Status: Connected to http://localhost:9000/mcp\n\
         Available tools: 2\n\
         Authentication: None"
    );

    let call = agent
        .process_message(r#"!call get_weather {"city": "Lisbon"}"#, None)
        .await;
    assert!(call.starts_with("✅ Tool call successful:"));
    assert!(call.contains("get_weather ok"));

    let shorthand = agent
        .process_message("!shorthand get_weather city=Lisbon units=fahrenheit", None)
        .await;
    assert!(shorthand.starts_with("✅ Tool call successful:"));

    let goodbye = agent.process_message("!disconnect", None).await;
    assert_eq!(
        goodbye,
        "✅ Disconnected from MCP server at http://localhost:9000/mcp"
    );

    let recorder = recorder.lock().unwrap();
    assert_eq!(recorder.connects.len(), 1);
    assert_eq!(recorder.disconnects, 1);
    assert_eq!(recorder.calls.len(), 2);
    assert_eq!(recorder.calls[0].0, "get_weather");
    assert_eq!(recorder.calls[1].1["city"], json!("Lisbon"));
    assert_eq!(recorder.calls[1].1["units"], json!("fahrenheit"));
}

#[tokio::test]
async fn test_defaults_are_filled_before_the_call() {
    let (mut agent, recorder) = connected_agent().await;

    agent
        .process_message(r#"!call get_weather {"city": "Osaka"}"#, None)
        .await;

    let recorder = recorder.lock().unwrap();
    assert_eq!(recorder.calls[0].1["units"], json!("celsius"));
}

// --- Not connected ---

#[tokio::test]
async fn test_session_commands_require_a_connection() {
    let (mut agent, recorder) = agent();
    let expected =
        "❌ Not connected to an MCP server.\n\nUse `connect [url]` to connect to a server.";

    for command in [
        "!list",
        "!disconnect",
        r#"!call get_weather {"city": "Lisbon"}"#,
        "!schema get_weather",
    ] {
        assert_eq!(agent.process_message(command, None).await, expected);
    }

    assert_eq!(
        agent.process_message("!status", None).await,
        "📡 Status: Not connected"
    );
    assert!(recorder.lock().unwrap().calls.is_empty());
}

// --- Error replies ---

#[tokio::test]
async fn test_unknown_command_is_echoed_back() {
    let (mut agent, _) = agent();

    assert_eq!(
        agent.process_message("!frobnicate now", None).await,
        "❓ Unknown command: `!frobnicate now`\n\nUse `help` to see available commands."
    );
}

#[tokio::test]
async fn test_broken_json_arguments_are_reported() {
    let (mut agent, _) = connected_agent().await;

    assert_eq!(
        agent.process_message("!call echo {bad}", None).await,
        "❌ Error: Invalid JSON arguments"
    );
}

#[tokio::test]
async fn test_missing_parameter_reply_includes_an_example() {
    let (mut agent, recorder) = connected_agent().await;

    let reply = agent.process_message("!call get_weather {}", None).await;

    assert!(reply.contains("Parameter validation error for tool 'get_weather'"));
    assert!(reply.contains("Missing required parameters: city"));
    assert!(reply.contains("Example usage"));
    assert!(reply.contains(r#""city""#));
    assert!(recorder.lock().unwrap().calls.is_empty());
}

#[tokio::test]
async fn test_unknown_tool_is_reported_by_name() {
    let (mut agent, _) = connected_agent().await;

    assert_eq!(
        agent.process_message("!call teleport {}", None).await,
        "❌ Error: Tool 'teleport' not found"
    );
}

#[tokio::test]
async fn test_failed_invocation_names_the_tool() {
    let mut transport = MockTransport::new(weather_tools());
    transport.call_error = Some("boom".to_string());
    let mut agent = agent_with(transport);
    agent
        .process_message("!connect http://localhost:9000/mcp", None)
        .await;

    assert_eq!(
        agent
            .process_message(r#"!call get_weather {"city": "Lisbon"}"#, None)
            .await,
        "❌ Error: Error calling tool get_weather: boom"
    );
}

// --- Schema and help ---

#[tokio::test]
async fn test_schema_command_renders_the_tool_schema() {
    let (mut agent, _) = connected_agent().await;

    let reply = agent.process_message("!schema get_weather", None).await;
    assert!(reply.starts_with("📝 Schema for tool 'get_weather':"));
    assert!(reply.contains("`city`"));
    assert!(reply.contains("Raw Schema"));
}

#[tokio::test]
async fn test_help_lists_commands_and_topics() {
    let (mut agent, _) = agent();

    let general = agent.process_message("!help", None).await;
    assert!(general.contains("MCP Client Agent Commands"));
    assert!(general.contains("connect"));
    assert!(general.contains("shorthand"));

    let topic = agent.process_message("!help connect", None).await;
    assert!(topic.contains("--token-env-var"));
}

// --- Plain chat ---

#[tokio::test]
async fn test_non_command_text_gets_the_introduction() {
    let (mut agent, _) = agent();

    let reply = agent.process_message("hello there", None).await;
    assert!(reply.starts_with("I'm an MCP Client Agent"));
    assert!(reply.contains("`help`"));
}

#[tokio::test]
async fn test_recognized_phrase_matches_the_structured_command() {
    let (mut agent, _) = connected_agent().await;

    let phrased = agent.process_chat("list tools", None).await;
    let structured = agent.process_message("!list", None).await;
    assert_eq!(phrased, structured);
}

#[tokio::test]
async fn test_structured_commands_pass_through_chat() {
    let (mut agent, _) = connected_agent().await;

    assert!(agent
        .process_chat("!status", None)
        .await
        .starts_with("📡 Status: Connected"));
}

#[tokio::test]
async fn test_unrecognized_chat_suggests_example_phrases() {
    let (mut agent, _) = agent();

    let reply = agent.process_chat("what's the weather like", None).await;
    assert!(reply.starts_with("I didn't understand that command."));
    assert!(reply.contains("- list tools"));
    assert!(reply.contains("- disconnect"));
}

#[tokio::test]
async fn test_welcome_enumerates_example_phrases() {
    let (agent, _) = agent();

    let welcome = agent.welcome();
    assert!(welcome.starts_with("Welcome to the MCP Client Agent!"));
    assert!(welcome.contains("- status"));
}
