//! Rekor HTTP client.
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | POST | `/api/v1/index/retrieve` | Entry UUIDs whose subject hash matches |
//! | POST | `/api/v1/log/entries/retrieve` | Entry bodies for those UUIDs |
//! | GET | `/api/v1/log` | Log info (health check) |
//!
//! Entry bodies are base64 JSON whose layout depends on the entry kind. The
//! signing certificate is looked up in the places `hashedrekord`, `intoto`
//! (0.0.1 and 0.0.2) and `dsse` put it. The predicate type comes from the
//! stored attestation, when the log kept one. Entries that fail to decode
//! are skipped rather than failing the lookup.

use std::collections::HashMap;

use async_trait::async_trait;
use base64::Engine;
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;
use warden_core::ImageDigest;

use crate::config::{ConfigError, RekorConfig};
use crate::error::TransparencyLogError;
use crate::fulcio;
use crate::log::{LogEntry, TransparencyLog};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEntry {
    body: String,
    integrated_time: i64,
    log_index: i64,
    #[serde(default)]
    attestation: Option<RawAttestation>,
}

#[derive(Debug, Deserialize)]
struct RawAttestation {
    #[serde(default)]
    data: Option<String>,
}

/// HTTP client for a Rekor instance.
#[derive(Debug, Clone)]
pub struct RekorClient {
    http: reqwest::Client,
    config: RekorConfig,
}

impl RekorClient {
    pub fn new(config: RekorConfig) -> Result<Self, TransparencyLogError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| TransparencyLogError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &RekorConfig {
        &self.config
    }

    /// Whether the log answers `GET /api/v1/log`.
    pub async fn health_check(&self) -> Result<(), TransparencyLogError> {
        let endpoint = "GET /api/v1/log";
        let resp = self
            .http
            .get(self.url("api/v1/log")?)
            .send()
            .await
            .map_err(|e| TransparencyLogError::Http {
                endpoint: endpoint.into(),
                source: e,
            })?;
        if !resp.status().is_success() {
            return Err(TransparencyLogError::Unavailable(format!(
                "{endpoint} returned status {}",
                resp.status().as_u16()
            )));
        }
        Ok(())
    }

    fn url(&self, path: &str) -> Result<url::Url, TransparencyLogError> {
        self.config
            .base_url
            .join(path)
            .map_err(|e| ConfigError::InvalidUrl("base_url".into(), e.to_string()).into())
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        path: &str,
        body: &Value,
    ) -> Result<T, TransparencyLogError> {
        let resp = self
            .http
            .post(self.url(path)?)
            .json(body)
            .send()
            .await
            .map_err(|e| TransparencyLogError::Http {
                endpoint: endpoint.into(),
                source: e,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransparencyLogError::UnexpectedStatus {
                endpoint: endpoint.into(),
                status: status.as_u16(),
                body,
            });
        }

        resp.json().await.map_err(|e| TransparencyLogError::Decode {
            endpoint: endpoint.into(),
            reason: e.to_string(),
        })
    }

    async fn search_index(&self, digest: &ImageDigest) -> Result<Vec<String>, TransparencyLogError> {
        self.post_json(
            "POST /api/v1/index/retrieve",
            "api/v1/index/retrieve",
            &serde_json::json!({ "hash": digest.as_str() }),
        )
        .await
    }

    async fn retrieve_entries(
        &self,
        uuids: &[String],
    ) -> Result<Vec<LogEntry>, TransparencyLogError> {
        let endpoint = "POST /api/v1/log/entries/retrieve";
        let pages: Vec<HashMap<String, RawEntry>> = self
            .post_json(
                endpoint,
                "api/v1/log/entries/retrieve",
                &serde_json::json!({ "entryUUIDs": uuids }),
            )
            .await?;

        let mut entries = Vec::new();
        for page in pages {
            for (uuid, raw) in page {
                match decode_entry(uuid, raw, endpoint) {
                    Ok(entry) => entries.push(entry),
                    Err(e) => tracing::debug!(error = %e, "skipping undecodable rekor entry"),
                }
            }
        }
        entries.sort_by_key(|e| e.log_index);
        Ok(entries)
    }
}

#[async_trait]
impl TransparencyLog for RekorClient {
    async fn entries_for_digest(
        &self,
        digest: &ImageDigest,
    ) -> Result<Vec<LogEntry>, TransparencyLogError> {
        let mut uuids = self.search_index(digest).await?;
        tracing::debug!(digest = %digest, count = uuids.len(), "rekor index search");
        if uuids.is_empty() {
            return Ok(Vec::new());
        }
        uuids.truncate(self.config.max_entries);
        self.retrieve_entries(&uuids).await
    }
}

fn decode_entry(uuid: String, raw: RawEntry, endpoint: &str) -> Result<LogEntry, TransparencyLogError> {
    let decode_err = |reason: String| TransparencyLogError::Decode {
        endpoint: endpoint.to_string(),
        reason: format!("entry {uuid}: {reason}"),
    };

    let body_bytes = base64::engine::general_purpose::STANDARD
        .decode(raw.body.as_bytes())
        .map_err(|e| decode_err(format!("invalid base64 body: {e}")))?;
    let body: Value = serde_json::from_slice(&body_bytes)
        .map_err(|e| decode_err(format!("invalid JSON body: {e}")))?;

    let integrated_time = Utc
        .timestamp_opt(raw.integrated_time, 0)
        .single()
        .ok_or_else(|| decode_err(format!("invalid integratedTime {}", raw.integrated_time)))?;

    let issuer = certificate_candidates(&body)
        .into_iter()
        .find_map(|pem| fulcio::issuer_from_pem(&pem));
    let attestation_type = raw
        .attestation
        .and_then(|a| a.data)
        .and_then(|data| predicate_type(&data));

    Ok(LogEntry {
        uuid,
        log_index: raw.log_index,
        integrated_time,
        issuer,
        attestation_type,
    })
}

/// PEM strings found at the certificate locations of the known entry kinds.
fn certificate_candidates(body: &Value) -> Vec<String> {
    let spec = &body["spec"];
    let mut encoded: Vec<&str> = Vec::new();

    // hashedrekord
    if let Some(s) = spec["signature"]["publicKey"]["content"].as_str() {
        encoded.push(s);
    }
    // intoto 0.0.1
    if let Some(s) = spec["publicKey"].as_str() {
        encoded.push(s);
    }
    // intoto 0.0.2
    if let Some(sigs) = spec["content"]["envelope"]["signatures"].as_array() {
        encoded.extend(sigs.iter().filter_map(|s| s["publicKey"].as_str()));
    }
    // dsse
    if let Some(sigs) = spec["signatures"].as_array() {
        encoded.extend(sigs.iter().filter_map(|s| s["verifier"].as_str()));
    }

    encoded
        .into_iter()
        .filter_map(|s| base64::engine::general_purpose::STANDARD.decode(s).ok())
        .filter_map(|bytes| String::from_utf8(bytes).ok())
        .filter(|pem| pem.contains("BEGIN CERTIFICATE"))
        .collect()
}

fn predicate_type(data_b64: &str) -> Option<String> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data_b64)
        .ok()?;
    let statement: Value = serde_json::from_slice(&bytes).ok()?;
    statement["predicateType"].as_str().map(str::to_string)
}
