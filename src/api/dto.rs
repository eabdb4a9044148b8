//--------------------------------------------------------------------------------------------------
// STRUCTS
//--------------------------------------------------------------------------------------------------
// | Name                 | Description                                    | Key Methods         |
// |----------------------|------------------------------------------------|---------------------|
// | WsCommand            | Command frame received on a streaming socket   |                     |
// | WsResponse           | Reply frame for a command                      | success, error      |
// | RpcRequest           | JSON-RPC request body                          | first_param         |
// | RpcResponse          | JSON-RPC response body                         | success, error      |
// | ConnectionResponse   | Admin view of one connection's filters         | from_connection     |
//--------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::models::requests::FilterRequest;
use crate::domain::models::types::{BookSpec, StreamKind, SubscriptionKind};
use crate::domain::services::subscriptions::{Connection, SubscriptionError};

/// Command frame: `{"id": ..., "command": "subscribe", "streams": [...], ...}`.
#[derive(Debug, Clone, Deserialize)]
pub struct WsCommand {
    /// Echoed back in the response, any JSON value
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(flatten)]
    pub filter: FilterRequest,
}

/// Reply to a command frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub status: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<Value>,
}

impl WsResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            id,
            status: "success".to_string(),
            kind: "response".to_string(),
            result: Some(result),
            error: None,
            error_message: None,
            request: None,
        }
    }

    /// Error reply echoing the offending request.
    pub fn error(id: Option<Value>, token: &str, message: impl Into<String>, request: Value) -> Self {
        Self {
            id,
            status: "error".to_string(),
            kind: "response".to_string(),
            result: None,
            error: Some(token.to_string()),
            error_message: Some(message.into()),
            request: Some(request),
        }
    }

    pub fn from_subscription_error(id: Option<Value>, err: &SubscriptionError, request: Value) -> Self {
        Self::error(id, err.token(), err.to_string(), request)
    }
}

/// JSON-RPC request: `{"method": "...", "params": [{...}]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub method: String,
    #[serde(default)]
    pub params: Vec<Value>,
}

impl RpcRequest {
    /// The parameter object, or an empty object when none was sent.
    pub fn first_param(&self) -> Value {
        self.params
            .first()
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()))
    }
}

/// JSON-RPC response: every outcome is wrapped in `result`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub result: Value,
}

impl RpcResponse {
    pub fn success(mut result: Map<String, Value>) -> Self {
        result.insert("status".to_string(), Value::from("success"));
        Self {
            result: Value::Object(result),
        }
    }

    pub fn error(token: &str, message: impl Into<String>, request: Value) -> Self {
        let mut result = Map::new();
        result.insert("status".to_string(), Value::from("error"));
        result.insert("error".to_string(), Value::from(token));
        result.insert("error_message".to_string(), Value::from(message.into()));
        result.insert("request".to_string(), request);
        Self {
            result: Value::Object(result),
        }
    }
}

/// Admin view of one connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionResponse {
    pub id: String,
    pub connected_at: DateTime<Utc>,
    pub streams: Vec<StreamKind>,
    pub accounts: Vec<String>,
    pub accounts_proposed: Vec<String>,
    pub books: Vec<BookSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub delivered_events: u64,
    pub dropped_events: u64,
    pub queue_capacity: usize,
}

impl From<&Connection> for ConnectionResponse {
    fn from(connection: &Connection) -> Self {
        let filters = connection.subscriptions();
        let streams = filters
            .kinds()
            .into_iter()
            .filter_map(|kind| match kind {
                SubscriptionKind::Stream(stream) => Some(stream),
                _ => None,
            })
            .collect();
        let sorted = |set: Option<&std::collections::HashSet<String>>| {
            let mut accounts: Vec<String> = set.into_iter().flatten().cloned().collect();
            accounts.sort();
            accounts
        };

        Self {
            id: connection.id().to_string(),
            connected_at: connection.connected_at(),
            streams,
            accounts: sorted(filters.accounts()),
            accounts_proposed: sorted(filters.accounts_proposed()),
            books: filters.books().to_vec(),
            url: filters.url_callback().map(|callback| callback.url.clone()),
            delivered_events: connection.delivered_events(),
            dropped_events: connection.dropped_events(),
            queue_capacity: connection.queue_capacity(),
        }
    }
}
