//! Request record handed over by the load-generation agent
//!
//! One `RequestRecord` is produced per sampled HTTP request. The merge-rule
//! engine receives each record exactly once, may rewrite its `name`, and
//! either passes it onward to aggregation or signals that it be discarded.

use serde::{Deserialize, Serialize};

/// One captured sample of a single HTTP request's identity and timing data
///
/// All attributes are populated by the upstream collector before the record
/// reaches the engine. `name` is the only attribute the engine rewrites.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRecord {
    /// Request name; rewritten in place by matching merge rules
    pub name: String,
    /// Full request URL
    #[serde(default)]
    pub url: String,
    /// Response content type (e.g. `text/html`)
    #[serde(default)]
    pub content_type: String,
    /// HTTP method (e.g. `GET`)
    #[serde(default)]
    pub http_method: String,
    /// HTTP response status code
    #[serde(default)]
    pub status_code: u16,
    /// Name of the transaction the request ran in
    #[serde(default)]
    pub transaction_name: String,
    /// Name of the load agent that issued the request
    #[serde(default)]
    pub agent_name: String,
    /// Total response time in milliseconds
    #[serde(default)]
    pub response_time_millis: u64,
}

impl RequestRecord {
    /// Create a record with the given name and all other attributes empty
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}
