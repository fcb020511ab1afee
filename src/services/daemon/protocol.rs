//! Wire Protocol
//!
//! One JSON object per line in each direction. Requests select a command
//! with `cmd`; responses always carry `ok`, plus `error` on failure or
//! command-specific fields on success.

use limpha_core::AffectState;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_SEARCH_LIMIT: usize = 10;
pub const DEFAULT_RECENT_LIMIT: usize = 10;
pub const DEFAULT_STATE_LIMIT: usize = 5;
pub const DEFAULT_CANDIDATES_LIMIT: usize = 20;
pub const DEFAULT_QUEUE_LIMIT: usize = 10;
pub const DEFAULT_PROMOTE_LIMIT: usize = 20;

fn default_search_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}

fn default_recent_limit() -> usize {
    DEFAULT_RECENT_LIMIT
}

fn default_state_limit() -> usize {
    DEFAULT_STATE_LIMIT
}

fn default_candidates_limit() -> usize {
    DEFAULT_CANDIDATES_LIMIT
}

fn default_queue_limit() -> usize {
    DEFAULT_QUEUE_LIMIT
}

fn default_promote_limit() -> usize {
    DEFAULT_PROMOTE_LIMIT
}

/// A decoded client request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Request {
    Store {
        #[serde(default)]
        prompt: String,
        #[serde(default)]
        response: String,
        #[serde(default)]
        state: Option<AffectState>,
    },
    Search {
        #[serde(default)]
        query: String,
        #[serde(default = "default_search_limit")]
        limit: usize,
    },
    Recent {
        #[serde(default = "default_recent_limit")]
        limit: usize,
        /// Restrict to the daemon's own session
        #[serde(default)]
        session_only: bool,
    },
    Recall {
        id: i64,
    },
    SearchState {
        #[serde(default)]
        state: AffectState,
        #[serde(default = "default_state_limit")]
        limit: usize,
        #[serde(default)]
        min_quality: f64,
    },
    Candidates {
        #[serde(default = "default_candidates_limit")]
        limit: usize,
    },
    Graduate {
        id: i64,
        /// Artifact location; written by the daemon when omitted
        #[serde(default)]
        shard_path: Option<String>,
        #[serde(default)]
        reason: String,
        #[serde(default)]
        priority: f64,
    },
    Queue {
        #[serde(default = "default_queue_limit")]
        limit: usize,
    },
    MarkTrained {
        id: i64,
        #[serde(default)]
        loss: Option<f64>,
    },
    Promote {
        #[serde(default = "default_promote_limit")]
        limit: usize,
    },
    Forget {
        id: i64,
    },
    Stats,
    Shutdown,
    Ping,
}

impl Request {
    /// Every command name accepted on the wire
    pub const COMMANDS: &'static [&'static str] = &[
        "store",
        "search",
        "recent",
        "recall",
        "search_state",
        "candidates",
        "graduate",
        "queue",
        "mark_trained",
        "promote",
        "forget",
        "stats",
        "shutdown",
        "ping",
    ];

    /// Wire name of this request's command
    pub fn command(&self) -> &'static str {
        match self {
            Request::Store { .. } => "store",
            Request::Search { .. } => "search",
            Request::Recent { .. } => "recent",
            Request::Recall { .. } => "recall",
            Request::SearchState { .. } => "search_state",
            Request::Candidates { .. } => "candidates",
            Request::Graduate { .. } => "graduate",
            Request::Queue { .. } => "queue",
            Request::MarkTrained { .. } => "mark_trained",
            Request::Promote { .. } => "promote",
            Request::Forget { .. } => "forget",
            Request::Stats => "stats",
            Request::Shutdown => "shutdown",
            Request::Ping => "ping",
        }
    }
}

/// Decode one request line.
///
/// The error string is sent to the client verbatim.
pub fn decode_request(line: &str) -> Result<Request, String> {
    let value: Value =
        serde_json::from_str(line).map_err(|e| format!("invalid JSON: {}", e))?;

    let cmd = match value.get("cmd") {
        Some(Value::String(cmd)) => cmd.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    if !Request::COMMANDS.contains(&cmd.as_str()) {
        return Err(format!("unknown command: {}", cmd));
    }

    serde_json::from_value(value).map_err(|e| format!("invalid {} request: {}", cmd, e))
}

/// A response line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl Response {
    /// Successful response with no payload
    pub fn ok() -> Self {
        Self {
            ok: true,
            error: None,
            body: Map::new(),
        }
    }

    /// Failed response
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(message.into()),
            body: Map::new(),
        }
    }

    /// Add one payload field
    pub fn with(mut self, key: &str, value: impl Serialize) -> serde_json::Result<Self> {
        self.body.insert(key.to_string(), serde_json::to_value(value)?);
        Ok(self)
    }

    /// Merge every field of a serializable struct into the payload
    pub fn flatten(mut self, value: impl Serialize) -> serde_json::Result<Self> {
        match serde_json::to_value(value)? {
            Value::Object(fields) => self.body.extend(fields),
            other => {
                self.body.insert("value".to_string(), other);
            }
        }
        Ok(self)
    }

    /// Payload field by name
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    /// Serialize as a single newline-terminated line
    pub fn to_line(&self) -> String {
        let mut line = serde_json::to_string(self)
            .unwrap_or_else(|e| format!(r#"{{"ok":false,"error":"encode failed: {}"}}"#, e));
        line.push('\n');
        line
    }
}
