//! Collector trait and its HTTP implementation.
//!
//! The [`Collector`] trait is the single ingestion contract the tracking loop
//! depends on. [`HttpCollector`] speaks to the REST collector via `reqwest`
//! and also exposes the history/latest queries that monitoring screens use.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};

use super::error::CollectorError;
use crate::position::LocationFix;

const MAX_ERROR_BODY_CHARS: usize = 200;

/// One fix, attributed to a user and a device, ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationReport {
    pub device_id: String,
    pub user_id: String,
    pub fix: LocationFix,
    pub timestamp: DateTime<Utc>,
}

impl LocationReport {
    pub fn payload(&self) -> IngestPayload {
        IngestPayload {
            latitude: self.fix.latitude,
            longitude: self.fix.longitude,
            speed: self.fix.speed_kmh,
            user_id: self.user_id.clone(),
            device_id: self.device_id.clone(),
        }
    }
}

/// Body accepted by the ingestion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IngestPayload {
    pub latitude: f64,
    pub longitude: f64,
    pub speed: u32,
    pub user_id: String,
    pub device_id: String,
}

/// A stored fix as returned by the collector.
///
/// Only the fields this crate reads are modelled; everything else is ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocationRecord {
    pub id: Option<serde_json::Value>,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: Option<f64>,
    pub user_id: Option<String>,
    pub device_id: Option<String>,
    pub timestamp: Option<String>,
}

impl LocationRecord {
    /// Server-assigned timestamp, when present and parseable.
    pub fn server_time(&self) -> Option<DateTime<Utc>> {
        let raw = self.timestamp.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    }

    fn from_payload(payload: &IngestPayload) -> Self {
        Self {
            id: None,
            latitude: payload.latitude,
            longitude: payload.longitude,
            speed: Some(f64::from(payload.speed)),
            user_id: Some(payload.user_id.clone()),
            device_id: Some(payload.device_id.clone()),
            timestamp: None,
        }
    }
}

/// Ingestion contract used by the sampling loop.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Send one report. Non-2xx responses are errors.
    async fn submit(&self, report: &LocationReport) -> Result<LocationRecord, CollectorError>;
}

pub struct HttpCollector {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpCollector {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CollectorError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CollectorError::ClientBuild(e.to_string()))?;
        Self::with_client(base_url, http)
    }

    /// Use a preconfigured client (proxy, TLS roots, timeouts).
    pub fn with_client(base_url: &str, http: reqwest::Client) -> Result<Self, CollectorError> {
        let base_url =
            Url::parse(base_url).map_err(|e| CollectorError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(CollectorError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self { http, base_url })
    }

    /// Full fix history for a user. A 404 or empty list means "no data yet".
    pub async fn history_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<LocationRecord>, CollectorError> {
        let url = self.endpoint(&["locations", "user", user_id]);
        let response = self.http.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let bytes = ensure_success(response).await?.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| CollectorError::JsonError(e.to_string()))
    }

    /// Most recent fix for a user, if any.
    pub async fn latest_for_user(
        &self,
        user_id: &str,
    ) -> Result<Option<LocationRecord>, CollectorError> {
        let url = self.endpoint(&["locations", "user", user_id, "latest"]);
        let response = self.http.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let bytes = ensure_success(response).await?.bytes().await?;
        parse_latest(&bytes)
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // `new` rejects cannot-be-a-base URLs, so this always succeeds.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

#[async_trait]
impl Collector for HttpCollector {
    async fn submit(&self, report: &LocationReport) -> Result<LocationRecord, CollectorError> {
        let payload = report.payload();
        let response = self
            .http
            .post(self.endpoint(&["locations"]))
            .json(&payload)
            .send()
            .await?;

        let bytes = ensure_success(response).await?.bytes().await?;
        match serde_json::from_slice::<LocationRecord>(&bytes) {
            Ok(record) => Ok(record),
            Err(err) => {
                log::debug!("Collector accepted report but body was unreadable: {err}");
                Ok(LocationRecord::from_payload(&payload))
            }
        }
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, CollectorError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(CollectorError::Rejected {
        status: status.as_u16(),
        body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
    })
}

/// The latest endpoint answers with a single record, `null`, or a list.
fn parse_latest(bytes: &[u8]) -> Result<Option<LocationRecord>, CollectorError> {
    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| CollectorError::JsonError(e.to_string()))?;

    let record = match value {
        serde_json::Value::Null => return Ok(None),
        serde_json::Value::Array(mut items) => {
            if items.is_empty() {
                return Ok(None);
            }
            items.swap_remove(0)
        }
        other => other,
    };

    serde_json::from_value(record)
        .map(Some)
        .map_err(|e| CollectorError::JsonError(e.to_string()))
}
