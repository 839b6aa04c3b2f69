//! Exchange verbs.
//!
//! Five request-style verbs expect exactly one response per request id.
//! `SUBSCRIPTION` is stream-style: zero or more pushes, no terminal response.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operation kind carried in every envelope's `method` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Subscription,
}

impl Verb {
    /// All request-style verbs, in declaration order.
    pub const REQUEST_STYLE: [Verb; 5] = [
        Verb::Get,
        Verb::Post,
        Verb::Put,
        Verb::Patch,
        Verb::Delete,
    ];

    /// True for `SUBSCRIPTION`.
    pub fn is_subscription(&self) -> bool {
        matches!(self, Verb::Subscription)
    }

    /// True for GET/POST/PUT/PATCH/DELETE.
    pub fn is_request_style(&self) -> bool {
        !self.is_subscription()
    }

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Patch => "PATCH",
            Verb::Delete => "DELETE",
            Verb::Subscription => "SUBSCRIPTION",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
