//! Tor exit-node classification
//!
//! The Tor Project's CollecTor service publishes exit lists as timestamped
//! snapshots under a directory listing. `ExitNodeClassifier` resolves the
//! newest on-the-hour snapshot, extracts every `ExitAddress` from it and then
//! answers membership queries from memory for the rest of its lifetime.
//!
//! Fetching fails open: if the listing or snapshot can't be retrieved, the
//! classifier settles on an empty set and reports every IP as a non-exit.

use crate::config::TorConfig;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

/// CollecTor directory holding recent exit-list snapshots
pub const DEFAULT_DIRECTORY_URL: &str = "https://collector.torproject.org/recent/exit-lists/";

/// Errors that can occur while fetching or reporting exit lists
#[derive(Error, Debug)]
pub enum TorError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned {status}")]
    Status { url: String, status: StatusCode },

    #[error("No exit-list snapshot ending in {suffix:?} in directory listing")]
    NoSnapshot { suffix: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

fn exit_address_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"ExitAddress (\d+\.\d+\.\d+\.\d+)").expect("exit address pattern is valid")
    })
}

fn anchor_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)<a\s[^>]*?href\s*=\s*["']([^"']*)["']"#).expect("anchor pattern is valid")
    })
}

/// Set of IPv4 addresses currently acting as Tor exits
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExitNodeSet {
    addresses: HashSet<String>,
}

impl ExitNodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract every address following `ExitAddress ` in a snapshot
    pub fn from_snapshot_text(text: &str) -> Self {
        let addresses = exit_address_pattern()
            .captures_iter(text)
            .map(|cap| cap[1].to_string())
            .collect();
        ExitNodeSet { addresses }
    }

    pub fn contains(&self, ip: &str) -> bool {
        self.addresses.contains(ip)
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ExitNodeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        ExitNodeSet {
            addresses: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Pick the lexicographically greatest link target ending in `suffix`
pub fn parse_directory_listing(html: &str, suffix: &str) -> Option<String> {
    anchor_pattern()
        .captures_iter(html)
        .map(|cap| cap[1].to_string())
        .filter(|href| href.ends_with(suffix))
        .max()
}

/// Resolve a listing entry against the directory URL
fn snapshot_url(directory_url: &str, entry: &str) -> String {
    if entry.starts_with("http://") || entry.starts_with("https://") {
        entry.to_string()
    } else if directory_url.ends_with('/') {
        format!("{}{}", directory_url, entry)
    } else {
        format!("{}/{}", directory_url, entry)
    }
}

/// Exit-list lifecycle within one classifier
#[derive(Debug)]
enum FetchState {
    Uninitialized,
    Fetching,
    Ready(ExitNodeSet),
}

/// One row of a batch check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitNodeCheck {
    #[serde(rename = "IP")]
    pub ip: String,
    #[serde(rename = "IsExitNode")]
    pub is_exit_node: bool,
}

/// Lazily fetched, cached Tor exit-node membership
pub struct ExitNodeClassifier {
    client: Client,
    directory_url: String,
    snapshot_suffix: String,
    snapshot_timeout: Duration,
    state: FetchState,
}

impl ExitNodeClassifier {
    /// Create a classifier; nothing is fetched until the first query
    pub fn new(config: &TorConfig) -> Result<Self, TorError> {
        Ok(ExitNodeClassifier {
            client: Client::builder().build()?,
            directory_url: config.directory_url.clone(),
            snapshot_suffix: config.snapshot_suffix.clone(),
            snapshot_timeout: Duration::from_secs(config.timeout_secs),
            state: FetchState::Uninitialized,
        })
    }

    /// Create a classifier that already holds `exit_nodes` and never fetches
    pub fn with_exit_nodes(config: &TorConfig, exit_nodes: ExitNodeSet) -> Result<Self, TorError> {
        let mut classifier = Self::new(config)?;
        classifier.state = FetchState::Ready(exit_nodes);
        Ok(classifier)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, FetchState::Ready(_))
    }

    /// The cached exit-node set, fetching it on first use
    pub async fn exit_nodes(&mut self) -> &ExitNodeSet {
        if !self.is_ready() {
            self.state = FetchState::Fetching;
            let nodes = match self.fetch().await {
                Ok(nodes) => {
                    log::info!("Loaded {} Tor exit nodes", nodes.len());
                    nodes
                }
                Err(e) => {
                    log::error!("Error fetching Tor exit list: {}", e);
                    ExitNodeSet::new()
                }
            };
            self.state = FetchState::Ready(nodes);
        }

        match &self.state {
            FetchState::Ready(nodes) => nodes,
            FetchState::Uninitialized | FetchState::Fetching => empty_set(),
        }
    }

    /// Whether `ip` is a current Tor exit node
    pub async fn is_exit_node(&mut self, ip: &str) -> bool {
        self.exit_nodes().await.contains(ip)
    }

    /// Classify each address independently against a single fetch
    pub async fn check_batch<I>(&mut self, ips: I) -> Vec<ExitNodeCheck>
    where
        I: IntoIterator<Item = String>,
    {
        let nodes = self.exit_nodes().await;
        ips.into_iter()
            .map(|ip| {
                let is_exit_node = nodes.contains(&ip);
                ExitNodeCheck { ip, is_exit_node }
            })
            .collect()
    }

    async fn fetch(&self) -> Result<ExitNodeSet, TorError> {
        log::debug!("Fetching exit-list directory {}", self.directory_url);
        let listing = self.get_text(&self.directory_url, None).await?;

        let latest = parse_directory_listing(&listing, &self.snapshot_suffix).ok_or_else(|| {
            TorError::NoSnapshot {
                suffix: self.snapshot_suffix.clone(),
            }
        })?;

        let url = snapshot_url(&self.directory_url, &latest);
        log::info!("Fetching Tor exit list snapshot {}", url);
        let snapshot = self.get_text(&url, Some(self.snapshot_timeout)).await?;

        Ok(ExitNodeSet::from_snapshot_text(&snapshot))
    }

    async fn get_text(&self, url: &str, timeout: Option<Duration>) -> Result<String, TorError> {
        let mut request = self.client.get(url);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(TorError::Status {
                url: url.to_string(),
                status: response.status(),
            });
        }

        Ok(response.text().await?)
    }
}

fn empty_set() -> &'static ExitNodeSet {
    static EMPTY: OnceLock<ExitNodeSet> = OnceLock::new();
    EMPTY.get_or_init(ExitNodeSet::new)
}

/// Read a newline-delimited IP list, trimming whitespace and skipping blank lines
pub fn read_ip_list(path: &Path) -> Result<Vec<String>, TorError> {
    let contents = fs::read_to_string(path)?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

/// First of `results.csv`, `results1.csv`, `results2.csv`, ... that doesn't exist yet
pub fn next_available_path(base: &Path) -> PathBuf {
    if !base.exists() {
        return base.to_path_buf();
    }

    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = base.extension().map(|e| e.to_string_lossy().into_owned());

    (1u32..)
        .map(|n| {
            let name = match &extension {
                Some(ext) => format!("{}{}.{}", stem, n, ext),
                None => format!("{}{}", stem, n),
            };
            base.with_file_name(name)
        })
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| base.to_path_buf())
}

/// Write batch results as a CSV table with columns `IP,IsExitNode`
pub fn write_results_csv(path: &Path, checks: &[ExitNodeCheck]) -> Result<(), TorError> {
    let mut writer = csv::Writer::from_path(path)?;
    if checks.is_empty() {
        writer.write_record(["IP", "IsExitNode"])?;
    }
    for check in checks {
        writer.serialize(check)?;
    }
    writer.flush()?;
    Ok(())
}
