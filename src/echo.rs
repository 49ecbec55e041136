//! Echo sinks.
//!
//! When echo is enabled for a (client, mock) pair, a copy of every matched
//! request is handed to an [`EchoSink`] alongside the normal response.

use crate::state::ClientId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;

/// Incoming request as seen by the engine.
#[derive(Debug, Clone, Default)]
pub struct IncomingRequest {
    pub method: String,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Vec<u8>>,
}

impl IncomingRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Copy of an echoed request.
#[derive(Debug, Clone, Serialize)]
pub struct EchoRecord {
    pub client: ClientId,
    pub mock: String,
    pub method: String,
    pub url: String,
    pub headers: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl EchoRecord {
    pub fn new(client: &ClientId, mock: &str, request: &IncomingRequest) -> Self {
        Self {
            client: client.clone(),
            mock: mock.to_string(),
            method: request.method.clone(),
            url: request.url.clone(),
            headers: request.headers.clone(),
            body: request
                .body
                .as_deref()
                .map(|b| String::from_utf8_lossy(b).into_owned()),
            received_at: Utc::now(),
        }
    }
}

/// Observation sink for echoed requests.
#[async_trait]
pub trait EchoSink: Send + Sync {
    async fn echo(&self, record: EchoRecord);
}

/// Logs echoed requests through `tracing`.
#[derive(Debug, Default)]
pub struct TracingEchoSink;

#[async_trait]
impl EchoSink for TracingEchoSink {
    async fn echo(&self, record: EchoRecord) {
        info!(
            client = %record.client,
            mock = %record.mock,
            method = %record.method,
            url = %record.url,
            headers = ?record.headers,
            body = record.body.as_deref().unwrap_or(""),
            "Echo request"
        );
    }
}

/// Collects echoed requests in memory.
#[derive(Debug, Default)]
pub struct MemoryEchoSink {
    records: Mutex<Vec<EchoRecord>>,
}

impl MemoryEchoSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the records received so far.
    pub fn records(&self) -> Vec<EchoRecord> {
        self.records.lock().clone()
    }

    /// Remove and return all records.
    pub fn drain(&self) -> Vec<EchoRecord> {
        std::mem::take(&mut *self.records.lock())
    }
}

#[async_trait]
impl EchoSink for MemoryEchoSink {
    async fn echo(&self, record: EchoRecord) {
        self.records.lock().push(record);
    }
}
