//! Wire envelopes and call options.
//!
//! Outbound: `{requestId, method, data, query, action}`.
//! Inbound: the same identity fields plus an HTTP-like `status`.

use crate::domain::correlation::RequestId;
use crate::domain::error::MuxError;
use crate::domain::verb::Verb;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Envelope sent to the peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope {
    pub request_id: RequestId,
    pub method: Verb,
    pub data: Value,
    pub query: Value,
    pub action: String,
}

impl RequestEnvelope {
    /// Build the outbound envelope, defaulting `data`/`query` to `{}`.
    ///
    /// Both must be JSON objects when supplied.
    pub fn build(request_id: RequestId, options: &RequestOptions) -> Result<Self, MuxError> {
        Ok(Self {
            request_id,
            method: options.method,
            data: object_or_empty("data", options.data.as_ref())?,
            query: object_or_empty("query", options.query.as_ref())?,
            action: options.action.clone(),
        })
    }
}

fn object_or_empty(field: &'static str, value: Option<&Value>) -> Result<Value, MuxError> {
    match value {
        None => Ok(Value::Object(Map::new())),
        Some(v @ Value::Object(_)) => Ok(v.clone()),
        Some(_) => Err(MuxError::InvalidPayload { field }),
    }
}

/// Envelope received from the peer: a response or a push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub method: Verb,
    pub action: String,
    pub request_id: RequestId,
    pub status: i64,
    #[serde(default)]
    pub data: Value,
}

impl ResponseEnvelope {
    /// Status in [200, 300).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Decode `data` into `T`, keeping the identity fields.
    pub fn decode<T: DeserializeOwned>(self) -> Result<Response<T>, MuxError> {
        let data = serde_json::from_value(self.data).map_err(|source| MuxError::Decode {
            request_id: self.request_id.clone(),
            source,
        })?;
        Ok(Response {
            method: self.method,
            action: self.action,
            request_id: self.request_id,
            status: self.status,
            data,
        })
    }
}

/// Inbound envelope with a typed payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Response<T> {
    pub method: Verb,
    pub action: String,
    pub request_id: RequestId,
    pub status: i64,
    pub data: T,
}

/// Options for a single exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
    pub method: Verb,
    pub action: String,
    pub data: Option<Value>,
    pub query: Option<Value>,
}

impl RequestOptions {
    pub fn new(method: Verb, action: impl Into<String>) -> Self {
        Self {
            method,
            action: action.into(),
            data: None,
            query: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_query(mut self, query: Value) -> Self {
        self.query = Some(query);
        self
    }
}

/// Options without a verb, for subscriptions and the verb helpers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActionOptions {
    pub action: String,
    pub data: Option<Value>,
    pub query: Option<Value>,
}

impl ActionOptions {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            data: None,
            query: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_query(mut self, query: Value) -> Self {
        self.query = Some(query);
        self
    }

    /// Fix the verb.
    pub fn with_method(self, method: Verb) -> RequestOptions {
        RequestOptions {
            method,
            action: self.action,
            data: self.data,
            query: self.query,
        }
    }
}
