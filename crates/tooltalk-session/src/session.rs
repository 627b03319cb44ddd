use chrono::{DateTime, Utc};
use tooltalk_core::ToolDescriptor;

/// One live server connection and the tool listing it came with.
#[derive(Debug, Clone)]
pub struct Session {
    pub url: String,
    pub token: Option<String>,
    pub tools: Vec<ToolDescriptor>,
    pub connected_at: DateTime<Utc>,
}

impl Session {
    pub fn new(url: impl Into<String>, token: Option<String>, tools: Vec<ToolDescriptor>) -> Self {
        Self {
            url: url.into(),
            token,
            tools,
            connected_at: Utc::now(),
        }
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }
}
