use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An action name with its occurrence count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionCount {
    pub action: String,
    pub count: u64,
}

impl ActionCount {
    pub fn new(action: impl Into<String>, count: u64) -> Self {
        ActionCount {
            action: action.into(),
            count,
        }
    }
}

/// Findings for one analyzed log file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReport {
    pub file_name: String,
    pub record_count: u64,
    pub created_buckets: Vec<String>,
    pub created_instances: Vec<String>,
    pub suspicious_user_agents: Vec<String>,
    /// Most frequent actions, highest count first
    pub top_actions: Vec<ActionCount>,
    /// Every action performed by the root principal, in first-seen order
    pub root_actions: Vec<ActionCount>,
    pub analyzed_at: DateTime<Utc>,
}

/// Reputation lookup result for one observed IP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReputationEntry {
    #[serde(rename = "IP Address")]
    pub ip: String,
    #[serde(rename = "Count Seen")]
    pub observation_count: u64,
    /// Opaque `data` payload returned by the reputation service
    #[serde(rename = "IP Reputation Summary")]
    pub reputation_summary: Value,
}
