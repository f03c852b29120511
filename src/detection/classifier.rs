//! Audit event classification
//!
//! Folds one `LogRecord` into the per-file aggregates and the run-wide IP
//! counter. No I/O happens here.

use crate::detection::aggregation::{AggregationState, IpCounter};
use crate::models::LogRecord;

pub const CREATE_BUCKET: &str = "CreateBucket";
pub const RUN_INSTANCES: &str = "RunInstances";

/// Substring marking a user agent as coming from an offensive toolkit
pub const SUSPICIOUS_AGENT_MARKER: &str = "kali";

/// Classify a single record
pub fn classify(record: &LogRecord, state: &mut AggregationState, ips: &mut IpCounter) {
    state.record_count += 1;

    if let Some(ip) = record.source_ip() {
        ips.record(ip);
    }

    let action = record.action();
    state.action_counts.increment(action);

    if record.is_root() {
        state.root_action_counts.increment(action);

        if !record.failed() {
            match action {
                CREATE_BUCKET => {
                    if let Some(bucket) = record.bucket_name() {
                        state.created_buckets.insert(bucket.to_string());
                    }
                }
                RUN_INSTANCES => {
                    for instance_id in record.instance_ids() {
                        state.created_instances.insert(instance_id.to_string());
                    }
                }
                _ => {}
            }
        }
    }

    let user_agent = record.user_agent_lower();
    if user_agent.contains(SUSPICIOUS_AGENT_MARKER) {
        log::debug!(
            "Suspicious user agent on {} from {:?}: {}",
            action,
            record.source_ip(),
            user_agent
        );
        state.suspicious_user_agents.insert(user_agent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn record(value: Value) -> LogRecord {
        serde_json::from_value(value).unwrap()
    }

    fn classify_all(records: &[LogRecord]) -> (AggregationState, IpCounter) {
        let mut state = AggregationState::new();
        let mut ips = IpCounter::new();
        for rec in records {
            classify(rec, &mut state, &mut ips);
        }
        (state, ips)
    }

    #[test]
    fn test_three_record_scenario() {
        let records = vec![
            record(json!({
                "eventName": "CreateBucket",
                "userIdentity": {"type": "Root"},
                "requestParameters": {"bucketName": "evidence"}
            })),
            record(json!({
                "eventName": "CreateBucket",
                "userIdentity": {"type": "Root"},
                "errorCode": "AccessDenied",
                "requestParameters": {"bucketName": "denied-bucket"}
            })),
            record(json!({
                "eventName": "RunInstances",
                "userIdentity": {"type": "IAMUser"},
                "responseElements": {"instancesSet": {"items": [{"instanceId": "i-123"}]}}
            })),
        ];

        let (state, _) = classify_all(&records);

        assert_eq!(state.created_buckets().iter().collect::<Vec<_>>(), vec!["evidence"]);
        assert!(state.created_instances().is_empty());
        assert_eq!(state.root_action_counts().get("CreateBucket"), 2);
        assert_eq!(state.root_action_counts().len(), 1);
        assert_eq!(state.action_counts().get("CreateBucket"), 2);
        assert_eq!(state.action_counts().get("RunInstances"), 1);
        assert_eq!(state.action_counts().len(), 2);
        assert_eq!(state.record_count(), 3);
    }

    #[test]
    fn test_non_root_never_counts_as_root() {
        let records: Vec<LogRecord> = ["AssumedRole", "IAMUser", "AWSService", "FederatedUser"]
            .iter()
            .map(|kind| {
                record(json!({
                    "eventName": "CreateBucket",
                    "userIdentity": {"type": kind},
                    "requestParameters": {"bucketName": "b"}
                }))
            })
            .collect();

        let (state, _) = classify_all(&records);

        assert!(state.root_action_counts().is_empty());
        assert!(state.created_buckets().is_empty());
        assert_eq!(state.action_counts().get("CreateBucket"), 4);
    }

    #[test]
    fn test_root_run_instances_collects_ids() {
        let rec = record(json!({
            "eventName": "RunInstances",
            "userIdentity": {"type": "Root"},
            "responseElements": {"instancesSet": {"items": [
                {"instanceId": "i-0a"},
                {"instanceId": "i-0b"},
                {"instanceId": "i-0a"}
            ]}}
        }));
        let failed = record(json!({
            "eventName": "RunInstances",
            "userIdentity": {"type": "Root"},
            "errorCode": "Client.UnauthorizedOperation",
            "responseElements": {"instancesSet": {"items": [{"instanceId": "i-0c"}]}}
        }));

        let (state, _) = classify_all(&[rec, failed]);

        assert_eq!(
            state.created_instances().iter().collect::<Vec<_>>(),
            vec!["i-0a", "i-0b"]
        );
        assert_eq!(state.root_action_counts().get("RunInstances"), 2);
    }

    #[test]
    fn test_action_counts_include_failures_and_missing_names() {
        let records = vec![
            record(json!({"eventName": "GetObject"})),
            record(json!({"eventName": "GetObject", "errorCode": "NoSuchKey"})),
            record(json!({"userAgent": "aws-cli/1.16"})),
        ];

        let (state, _) = classify_all(&records);

        assert_eq!(state.action_counts().get("GetObject"), 2);
        assert_eq!(state.action_counts().get(""), 1);
        assert_eq!(state.action_counts().total(), 3);
    }

    #[test]
    fn test_suspicious_user_agent_is_lowercased() {
        let records = vec![
            record(json!({"eventName": "ListBuckets", "userAgent": "aws-cli/1.16.89 Python/3.6.8 Linux/4.19.0-KALI1-amd64"})),
            record(json!({"eventName": "ListBuckets", "userAgent": "aws-cli/1.16.89 Python/3.6.8 Linux/4.19.0-kali1-amd64"})),
            record(json!({"eventName": "ListBuckets", "userAgent": "Boto3/1.9.80"})),
        ];

        let (state, _) = classify_all(&records);

        assert_eq!(
            state.suspicious_user_agents().iter().collect::<Vec<_>>(),
            vec!["aws-cli/1.16.89 python/3.6.8 linux/4.19.0-kali1-amd64"]
        );
    }

    #[test]
    fn test_source_ips_counted_once_per_record() {
        let records = vec![
            record(json!({"eventName": "A", "sourceIPAddress": "1.1.1.1"})),
            record(json!({"eventName": "B", "sourceIPAddress": "1.1.1.1"})),
            record(json!({"eventName": "C", "sourceIPAddress": ""})),
            record(json!({"eventName": "D"})),
            record(json!({"eventName": "E", "sourceIPAddress": "s3.amazonaws.com"})),
        ];

        let (_, ips) = classify_all(&records);

        assert_eq!(ips.count("1.1.1.1"), 2);
        assert_eq!(ips.count("s3.amazonaws.com"), 1);
        assert_eq!(ips.total(), 3);
    }

    #[test]
    fn test_ip_counter_spans_files() {
        let mut ips = IpCounter::new();

        let mut first = AggregationState::new();
        classify(&record(json!({"sourceIPAddress": "1.1.1.1"})), &mut first, &mut ips);
        classify(&record(json!({"sourceIPAddress": "2.2.2.2"})), &mut first, &mut ips);

        let mut second = AggregationState::new();
        classify(&record(json!({"sourceIPAddress": "1.1.1.1"})), &mut second, &mut ips);

        assert_eq!(ips.count("1.1.1.1"), 2);
        assert_eq!(ips.count("2.2.2.2"), 1);
        assert_eq!(second.record_count(), 1);
    }
}
