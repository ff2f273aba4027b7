//! New Relic ingestion payloads
//!
//! Both the Metric API and the Log API take a JSON array of envelopes, each
//! carrying `common.attributes` shared by every entry in it.

use std::collections::BTreeMap;

use serde::Serialize;

/// Attribute map shared by every entry of an envelope
pub type Attributes = BTreeMap<String, String>;

#[derive(Debug, Serialize)]
pub struct Common<'a> {
    pub attributes: &'a Attributes,
}

/// `[{ "common": {...}, "metrics": [...] }]`
#[derive(Debug, Serialize)]
pub struct MetricEnvelope<'a, P: Serialize> {
    pub common: Common<'a>,
    pub metrics: &'a [P],
}

/// `[{ "common": {...}, "logs": [...] }]`
#[derive(Debug, Serialize)]
pub struct LogEnvelope<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub common: Option<Common<'a>>,
    pub logs: &'a [NewRelicLog],
}

/// One log line as the Log API expects it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewRelicLog {
    pub message: String,
    /// Milliseconds since Unix epoch
    pub timestamp: i64,
    pub attributes: Attributes,
}
