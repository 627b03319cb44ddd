//! The `tooltalk` binary: interactive chat console and scripted message
//! runner over an MCP HTTP transport.

use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tooltalk_agent::{ChatAgent, ChatChannel, ConsoleChannel};
use tooltalk_command::{CommandParser, PhraseRecognizer};
use tooltalk_format::Formatter;
use tooltalk_mcp::HttpTransport;
use tooltalk_session::SessionManager;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tooltalk", about = "Chat front-end for MCP tool servers", version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "tooltalk.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    Chat {
        /// MCP server URL to connect to on startup (overrides config)
        #[arg(long)]
        url: Option<String>,
        /// Bearer token for the server (overrides config)
        #[arg(long)]
        token: Option<String>,
        /// Environment variable to read the bearer token from (overrides config)
        #[arg(long)]
        token_env: Option<String>,
    },
    /// Process messages in order and print each reply
    Exec {
        /// Messages to process, structured commands or plain phrases
        #[arg(required = true)]
        messages: Vec<String>,
    },
}

#[derive(Deserialize, Default)]
struct TooltalkConfig {
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    log: LogConfig,
}

#[derive(Deserialize, Default)]
struct ServerConfig {
    url: Option<String>,
    token: Option<String>,
    token_env: Option<String>,
}

impl ServerConfig {
    /// Flag values win over file values, field by field.
    fn merged(
        self,
        url: Option<String>,
        token: Option<String>,
        token_env: Option<String>,
    ) -> Self {
        Self {
            url: url.or(self.url),
            token: token.or(self.token),
            token_env: token_env.or(self.token_env),
        }
    }
}

#[derive(Deserialize)]
struct LogConfig {
    #[serde(default = "default_filter")]
    filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

fn default_filter() -> String {
    "info".to_string()
}

/// A missing config file falls back to defaults; an unreadable or
/// unparseable one is an error.
async fn load_config(path: &Path) -> anyhow::Result<TooltalkConfig> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(TooltalkConfig::default());
        }
        Err(e) => {
            return Err(anyhow::anyhow!(
                "Failed to read config file '{}': {e}",
                path.display()
            ));
        }
    };
    toml::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {e}", path.display()))
}

fn build_agent() -> ChatAgent {
    ChatAgent::new(
        CommandParser::new(),
        PhraseRecognizer::new(),
        SessionManager::new(Box::new(HttpTransport::new())),
        Formatter::new(),
    )
}

async fn run_chat(server: ServerConfig) -> anyhow::Result<()> {
    let mut agent = build_agent();
    let mut channel = ConsoleChannel::new();

    if let Some(url) = server.url.as_deref() {
        info!(url, "Connecting to configured MCP server");
        let reply = agent
            .connect(url, server.token.as_deref(), server.token_env.as_deref())
            .await;
        channel.send(&reply).await?;
    }

    tooltalk_agent::run(&mut agent, &mut channel).await?;
    Ok(())
}

async fn run_exec(messages: Vec<String>) -> anyhow::Result<()> {
    let mut agent = build_agent();
    for message in &messages {
        let reply = agent.process_chat(message, None).await;
        println!("{reply}\n");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config).await?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log.filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Chat {
            url,
            token,
            token_env,
        } => run_chat(config.server.merged(url, token, token_env)).await,
        Commands::Exec { messages } => run_exec(messages).await,
    }
}
