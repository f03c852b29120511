//! IP reputation enrichment
//!
//! Looks up the most frequently observed source IPs against the AbuseIPDB
//! check endpoint and collects the results into a single document. Lookups
//! run one at a time in rank order; an IP whose lookup fails is left out of
//! the document and logged.

use crate::config::ReputationConfig;
use crate::models::ReputationEntry;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default AbuseIPDB check endpoint
pub const DEFAULT_ENDPOINT: &str = "https://api.abuseipdb.com/api/v2/check";

/// Errors that can occur during reputation lookups
#[derive(Error, Debug)]
pub enum ReputationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Reputation service returned {0}")]
    Status(StatusCode),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Body of a successful check response; only `data` is kept
#[derive(Debug, Deserialize)]
struct CheckResponse {
    data: Value,
}

/// Reputation results for a run, in the rank order they were requested
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReputationDocument {
    entries: Vec<ReputationEntry>,
}

impl ReputationDocument {
    pub fn entries(&self) -> &[ReputationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the document as a pretty-printed JSON array
    pub fn write_to_file(&self, path: &Path) -> Result<(), ReputationError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}

/// Client for the reputation service
pub struct ReputationClient {
    client: Client,
    endpoint: String,
    api_key: String,
    max_age_days: u32,
}

impl ReputationClient {
    /// Create a client from configuration and a resolved API key
    pub fn new(config: &ReputationConfig, api_key: String) -> Result<Self, ReputationError> {
        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(ReputationClient {
            client: builder.build()?,
            endpoint: config.endpoint.clone(),
            api_key,
            max_age_days: config.max_age_days,
        })
    }

    /// Fetch the reputation summary for one IP
    pub async fn check(&self, ip: &str) -> Result<Value, ReputationError> {
        let max_age = self.max_age_days.to_string();

        let response = self
            .client
            .get(&self.endpoint)
            .header("Accept", "application/json")
            .header("Key", &self.api_key)
            .query(&[("ipAddress", ip), ("maxAgeInDays", max_age.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ReputationError::Status(response.status()));
        }

        let body: CheckResponse = response.json().await?;
        Ok(body.data)
    }

    /// Look up each ranked `(ip, count)` pair and collect the successes
    pub async fn enrich(&self, ranked_ips: &[(String, u64)]) -> ReputationDocument {
        let mut entries = Vec::with_capacity(ranked_ips.len());

        for (rank, (ip, count)) in ranked_ips.iter().enumerate() {
            log::debug!("Checking reputation of {} (rank {}, seen {} times)", ip, rank + 1, count);

            match self.check(ip).await {
                Ok(summary) => entries.push(ReputationEntry {
                    ip: ip.clone(),
                    observation_count: *count,
                    reputation_summary: summary,
                }),
                Err(e) => log::warn!("Dropping {} from reputation results: {}", ip, e),
            }
        }

        log::info!(
            "Reputation lookups complete: {} of {} succeeded",
            entries.len(),
            ranked_ips.len()
        );

        ReputationDocument { entries }
    }
}
