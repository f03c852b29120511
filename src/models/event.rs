use serde::Deserialize;
use serde_json::Value;

/// Identity type CloudTrail assigns to the account root principal
pub const ROOT_IDENTITY_TYPE: &str = "Root";

/// A single CloudTrail audit event
///
/// Only the fields the classifier looks at are decoded; everything else in
/// the record is ignored. The nested structures stay as raw JSON and are
/// read through the accessor methods below, each of which resolves a missing
/// or mistyped step to `None` instead of failing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    #[serde(rename = "sourceIPAddress")]
    pub source_ip_address: Option<String>,
    pub user_identity: Option<Value>,
    pub event_name: Option<String>,
    pub user_agent: Option<String>,
    pub error_code: Option<String>,
    pub request_parameters: Option<Value>,
    pub response_elements: Option<Value>,
    pub event_time: Option<String>,
    pub event_source: Option<String>,
    pub aws_region: Option<String>,
}

impl LogRecord {
    /// Source IP, if present and non-empty
    pub fn source_ip(&self) -> Option<&str> {
        self.source_ip_address
            .as_deref()
            .filter(|ip| !ip.is_empty())
    }

    /// API action name; a missing name is reported as the empty string
    pub fn action(&self) -> &str {
        self.event_name.as_deref().unwrap_or("")
    }

    /// `userIdentity.type`
    pub fn identity_type(&self) -> Option<&str> {
        self.user_identity.as_ref()?.get("type")?.as_str()
    }

    pub fn is_root(&self) -> bool {
        self.identity_type() == Some(ROOT_IDENTITY_TYPE)
    }

    /// True when the record carries an `errorCode`, i.e. the call was rejected
    pub fn failed(&self) -> bool {
        self.error_code.is_some()
    }

    /// `requestParameters.bucketName`
    pub fn bucket_name(&self) -> Option<&str> {
        self.request_parameters
            .as_ref()?
            .get("bucketName")?
            .as_str()
            .filter(|name| !name.is_empty())
    }

    /// Every `instanceId` under `responseElements.instancesSet.items`
    pub fn instance_ids(&self) -> impl Iterator<Item = &str> {
        self.response_elements
            .as_ref()
            .and_then(|elements| elements.get("instancesSet"))
            .and_then(|set| set.get("items"))
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|item| item.get("instanceId").and_then(Value::as_str))
            .filter(|id| !id.is_empty())
    }

    /// User agent folded to lower case, empty when absent
    pub fn user_agent_lower(&self) -> String {
        self.user_agent
            .as_deref()
            .unwrap_or("")
            .to_lowercase()
    }
}
