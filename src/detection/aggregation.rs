//! Running aggregates kept while classifying audit records
//!
//! `AggregationState` lives for exactly one log file. `IpCounter` spans a
//! whole run and is threaded through every file by the caller.

use std::collections::{BTreeSet, HashMap};

use chrono::Utc;

use crate::models::{ActionCount, FileReport};

/// Number of actions listed in a file report's ranking
pub const TOP_ACTIONS: usize = 5;

/// Occurrence counter that remembers first-seen order
///
/// Ranking sorts by count descending and falls back to first-seen order,
/// so the same input always produces the same ranking.
#[derive(Debug, Clone, Default)]
pub struct Counter {
    entries: Vec<(String, u64)>,
    index: HashMap<String, usize>,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one occurrence of `key`
    pub fn increment(&mut self, key: &str) {
        self.add(key, 1);
    }

    /// Count `n` occurrences of `key`
    pub fn add(&mut self, key: &str, n: u64) {
        match self.index.get(key) {
            Some(&pos) => self.entries[pos].1 += n,
            None => {
                self.index.insert(key.to_string(), self.entries.len());
                self.entries.push((key.to_string(), n));
            }
        }
    }

    pub fn get(&self, key: &str) -> u64 {
        self.index
            .get(key)
            .map(|&pos| self.entries[pos].1)
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all counts
    pub fn total(&self) -> u64 {
        self.entries.iter().map(|(_, count)| count).sum()
    }

    /// Entries in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(key, count)| (key.as_str(), *count))
    }

    /// The `n` highest counts, ties broken by first-seen order
    pub fn most_common(&self, n: usize) -> Vec<(String, u64)> {
        let mut ranked = self.entries.clone();
        // sort_by is stable, so equal counts keep insertion order
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(n);
        ranked
    }
}

/// Source IP occurrences across every file of a run
#[derive(Debug, Clone, Default)]
pub struct IpCounter {
    counts: Counter,
}

impl IpCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one sighting of `ip`
    pub fn record(&mut self, ip: &str) {
        self.counts.increment(ip);
    }

    /// Fold another counter into this one
    pub fn merge(&mut self, other: &IpCounter) {
        for (ip, count) in other.counts.iter() {
            self.counts.add(ip, count);
        }
    }

    pub fn count(&self, ip: &str) -> u64 {
        self.counts.get(ip)
    }

    /// Number of distinct addresses seen
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.counts.total()
    }

    /// Top `n` addresses by sighting count
    pub fn most_common(&self, n: usize) -> Vec<(String, u64)> {
        self.counts.most_common(n)
    }
}

/// Per-file accumulators filled in by the classifier
#[derive(Debug, Clone, Default)]
pub struct AggregationState {
    pub(crate) created_buckets: BTreeSet<String>,
    pub(crate) created_instances: BTreeSet<String>,
    pub(crate) suspicious_user_agents: BTreeSet<String>,
    pub(crate) action_counts: Counter,
    pub(crate) root_action_counts: Counter,
    pub(crate) record_count: u64,
}

impl AggregationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created_buckets(&self) -> &BTreeSet<String> {
        &self.created_buckets
    }

    pub fn created_instances(&self) -> &BTreeSet<String> {
        &self.created_instances
    }

    pub fn suspicious_user_agents(&self) -> &BTreeSet<String> {
        &self.suspicious_user_agents
    }

    pub fn action_counts(&self) -> &Counter {
        &self.action_counts
    }

    pub fn root_action_counts(&self) -> &Counter {
        &self.root_action_counts
    }

    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// Finalize the state into a report for `file_name`
    pub fn into_report(self, file_name: &str) -> FileReport {
        let top_actions = self
            .action_counts
            .most_common(TOP_ACTIONS)
            .into_iter()
            .map(|(action, count)| ActionCount::new(action, count))
            .collect();

        let root_actions = self
            .root_action_counts
            .iter()
            .map(|(action, count)| ActionCount::new(action, count))
            .collect();

        FileReport {
            file_name: file_name.to_string(),
            record_count: self.record_count,
            created_buckets: self.created_buckets.into_iter().collect(),
            created_instances: self.created_instances.into_iter().collect(),
            suspicious_user_agents: self.suspicious_user_agents.into_iter().collect(),
            top_actions,
            root_actions,
            analyzed_at: Utc::now(),
        }
    }
}
