use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AppError;

/// Current schema version written into request metadata.
pub const METADATA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BrokerCategory {
    PeopleSearch,
    CreditReporting,
    Marketing,
    BackgroundCheck,
    SocialMedia,
    Advertising,
    RiskManagement,
    Insurance,
    Financial,
    PersonalData,
    Other,
}

impl BrokerCategory {
    pub const ALL: [BrokerCategory; 11] = [
        Self::PeopleSearch,
        Self::CreditReporting,
        Self::Marketing,
        Self::BackgroundCheck,
        Self::SocialMedia,
        Self::Advertising,
        Self::RiskManagement,
        Self::Insurance,
        Self::Financial,
        Self::PersonalData,
        Self::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PeopleSearch => "people-search",
            Self::CreditReporting => "credit-reporting",
            Self::Marketing => "marketing",
            Self::BackgroundCheck => "background-check",
            Self::SocialMedia => "social-media",
            Self::Advertising => "advertising",
            Self::RiskManagement => "risk-management",
            Self::Insurance => "insurance",
            Self::Financial => "financial",
            Self::PersonalData => "personal-data",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptOutMethod {
    Form,
    Email,
    Api,
    Manual,
}

impl OptOutMethod {
    pub const ALL: [OptOutMethod; 4] = [Self::Form, Self::Email, Self::Api, Self::Manual];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Form => "form",
            Self::Email => "email",
            Self::Api => "api",
            Self::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Self::Easy, Self::Medium, Self::Hard];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

/// Nominal lifecycle of a removal request: pending → sent → responded → completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Sent,
    Responded,
    Completed,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 4] = [
        Self::Pending,
        Self::Sent,
        Self::Responded,
        Self::Completed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Responded => "responded",
            Self::Completed => "completed",
        }
    }

    /// Whether moving from `self` to `next` follows the nominal path.
    /// Updates are not rejected when this is false; callers log the regression.
    pub fn is_forward_to(self, next: RequestStatus) -> bool {
        next >= self
    }
}

macro_rules! str_enum_impls {
    ($($ty:ident => $label:literal),* $(,)?) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }

            impl FromStr for $ty {
                type Err = AppError;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    let needle = s.trim().to_ascii_lowercase();
                    Self::ALL
                        .iter()
                        .copied()
                        .find(|v| v.as_str() == needle)
                        .ok_or_else(|| AppError::Validation(format!("unknown {}: '{s}'", $label)))
                }
            }
        )*
    };
}

str_enum_impls! {
    BrokerCategory => "broker category",
    OptOutMethod => "opt-out method",
    Difficulty => "difficulty",
    RequestStatus => "request status",
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Broker {
    pub id: String,
    pub name: String,
    pub opt_out_url: Option<String>,
    pub category: BrokerCategory,
    pub opt_out_method: OptOutMethod,
    #[serde(default)]
    pub data_types: BTreeSet<String>,
    pub difficulty: Difficulty,
    pub response_time: Option<String>,
    #[serde(default)]
    pub regions: Vec<String>,
    #[serde(default)]
    pub laws: Vec<String>,
    #[serde(default)]
    pub premium: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for adding a broker to the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBroker {
    pub name: String,
    pub opt_out_url: Option<String>,
    pub category: BrokerCategory,
    pub opt_out_method: OptOutMethod,
    #[serde(default)]
    pub data_types: BTreeSet<String>,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub response_time: Option<String>,
    #[serde(default)]
    pub regions: Vec<String>,
    #[serde(default)]
    pub laws: Vec<String>,
    #[serde(default)]
    pub premium: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovalRequest {
    pub id: String,
    /// Denormalized; the broker may since have been deleted.
    pub broker_name: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub email: String,
    pub response: Option<String>,
    #[serde(default)]
    pub metadata: RequestMetadata,
}

#[derive(Debug, Clone)]
pub struct NewRequest {
    pub broker_name: String,
    pub email: String,
    pub status: RequestStatus,
    pub response: Option<String>,
    pub metadata: RequestMetadata,
}

impl NewRequest {
    pub fn pending(broker_name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            broker_name: broker_name.into(),
            email: email.into(),
            status: RequestStatus::Pending,
            response: None,
            metadata: RequestMetadata::default(),
        }
    }
}

/// Partial update applied to a request as one unit. `metadata` is merged into
/// the stored metadata rather than replacing it.
#[derive(Debug, Clone, Default)]
pub struct RequestUpdate {
    pub status: Option<RequestStatus>,
    pub response: Option<String>,
    pub metadata: Option<RequestMetadata>,
}

/// Typed request metadata. Keys this version does not know about are kept in
/// `extra` and written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMetadata {
    #[serde(default = "default_metadata_version")]
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opt_out_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broker_category: Option<BrokerCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_fields: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<RemovalProgress>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Serialized names of the typed metadata fields.
const KNOWN_KEYS: &[&str] = &[
    "version",
    "optOutUrl",
    "brokerCategory",
    "processedAt",
    "screenshot",
    "attempts",
    "lastError",
    "formFields",
    "progress",
];

fn default_metadata_version() -> u32 {
    METADATA_VERSION
}

impl Default for RequestMetadata {
    fn default() -> Self {
        Self {
            version: METADATA_VERSION,
            opt_out_url: None,
            broker_category: None,
            processed_at: None,
            screenshot: None,
            attempts: None,
            last_error: None,
            form_fields: None,
            progress: None,
            extra: Map::new(),
        }
    }
}

impl RequestMetadata {
    /// Parse a stored metadata blob. Malformed JSON is logged and replaced by
    /// empty metadata.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return Self::default();
        };
        let fields = match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(fields)) => fields,
            Ok(other) => {
                tracing::warn!("Ignoring request metadata that is not an object: {other}");
                return Self::default();
            }
            Err(e) => {
                tracing::warn!("Ignoring unparseable request metadata: {e}");
                return Self::default();
            }
        };
        Self::from_fields(fields)
    }

    /// A known key with a value of the wrong type is kept verbatim in `extra`
    /// instead of invalidating the whole record. A bad `version` is dropped.
    fn from_fields(mut fields: Map<String, Value>) -> Self {
        let mut stray = Map::new();
        for key in KNOWN_KEYS {
            let Some(value) = fields.get(*key) else {
                continue;
            };
            let single = Value::Object(Map::from_iter([(key.to_string(), value.clone())]));
            if serde_json::from_value::<Self>(single).is_ok() {
                continue;
            }
            if let Some(bad) = fields.remove(*key) {
                tracing::warn!("Request metadata field {key} has an unexpected type: {bad}");
                if *key != "version" {
                    stray.insert(key.to_string(), bad);
                }
            }
        }

        match serde_json::from_value::<Self>(Value::Object(fields)) {
            Ok(mut meta) => {
                meta.extra.extend(stray);
                meta
            }
            Err(e) => {
                tracing::warn!("Ignoring unreadable request metadata: {e}");
                Self::default()
            }
        }
    }

    /// Raw copies of malformed known keys give way once the typed field is set,
    /// so a key is never written twice.
    fn drop_shadowed_extras(&mut self) {
        let typed = [
            ("optOutUrl", self.opt_out_url.is_some()),
            ("brokerCategory", self.broker_category.is_some()),
            ("processedAt", self.processed_at.is_some()),
            ("screenshot", self.screenshot.is_some()),
            ("attempts", self.attempts.is_some()),
            ("lastError", self.last_error.is_some()),
            ("formFields", self.form_fields.is_some()),
            ("progress", self.progress.is_some()),
        ];
        for (key, set) in typed {
            if set {
                self.extra.remove(key);
            }
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Overlay every field `patch` sets; fields it leaves unset keep their value.
    pub fn merge(&mut self, patch: RequestMetadata) {
        self.version = self.version.max(patch.version);
        if patch.opt_out_url.is_some() {
            self.opt_out_url = patch.opt_out_url;
        }
        if patch.broker_category.is_some() {
            self.broker_category = patch.broker_category;
        }
        if patch.processed_at.is_some() {
            self.processed_at = patch.processed_at;
        }
        if patch.screenshot.is_some() {
            self.screenshot = patch.screenshot;
        }
        if patch.attempts.is_some() {
            self.attempts = patch.attempts;
        }
        if patch.last_error.is_some() {
            self.last_error = patch.last_error;
        }
        if patch.form_fields.is_some() {
            self.form_fields = patch.form_fields;
        }
        if patch.progress.is_some() {
            self.progress = patch.progress;
        }
        self.extra.extend(patch.extra);
        self.drop_shadowed_extras();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
    RequestCreation,
    Validation,
    BrokerCommunication,
    Confirmation,
}

impl StepId {
    pub const ORDER: [StepId; 4] = [
        Self::RequestCreation,
        Self::Validation,
        Self::BrokerCommunication,
        Self::Confirmation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::RequestCreation => "request_creation",
            Self::Validation => "validation",
            Self::BrokerCommunication => "broker_communication",
            Self::Confirmation => "confirmation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl StepStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressStep {
    pub id: StepId,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovalProgress {
    pub steps: Vec<ProgressStep>,
    pub overall_status: StepStatus,
    pub last_updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_completion: Option<DateTime<Utc>>,
}

impl RemovalProgress {
    pub fn step(&self, id: StepId) -> Option<&ProgressStep> {
        self.steps.iter().find(|s| s.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_parsing() {
        assert_eq!(
            "people-search".parse::<BrokerCategory>().unwrap(),
            BrokerCategory::PeopleSearch
        );
        assert_eq!(" Sent ".parse::<RequestStatus>().unwrap(), RequestStatus::Sent);
        assert!(matches!(
            "archived".parse::<RequestStatus>(),
            Err(AppError::Validation(_))
        ));
        for c in BrokerCategory::ALL {
            assert_eq!(c.to_string().parse::<BrokerCategory>().unwrap(), c);
        }
    }

    #[test]
    fn test_forward_transitions() {
        assert!(RequestStatus::Pending.is_forward_to(RequestStatus::Sent));
        assert!(RequestStatus::Sent.is_forward_to(RequestStatus::Sent));
        assert!(!RequestStatus::Completed.is_forward_to(RequestStatus::Pending));
    }

    #[test]
    fn test_metadata_keeps_unknown_keys() {
        let raw = r#"{"optOutUrl":"https://www.spokeo.com/optout","theme":"dark","nested":{"a":1}}"#;
        let meta = RequestMetadata::parse(Some(raw));
        assert_eq!(meta.version, METADATA_VERSION);
        assert_eq!(meta.opt_out_url.as_deref(), Some("https://www.spokeo.com/optout"));
        assert_eq!(meta.extra.get("theme"), Some(&Value::from("dark")));

        let back: Value = serde_json::from_str(&meta.to_json().unwrap()).unwrap();
        assert_eq!(back["nested"]["a"], 1);
        assert_eq!(back["optOutUrl"], "https://www.spokeo.com/optout");
    }

    #[test]
    fn test_metadata_parse_failure_is_empty() {
        assert_eq!(
            RequestMetadata::parse(Some("{not json")),
            RequestMetadata::default()
        );
        assert_eq!(RequestMetadata::parse(None), RequestMetadata::default());
        assert_eq!(RequestMetadata::parse(Some("  ")), RequestMetadata::default());
    }

    #[test]
    fn test_metadata_with_mistyped_field_keeps_the_rest() {
        let raw = r#"{"optOutUrl":"https://www.spokeo.com/optout","attempts":"3","version":"x","note":"keep"}"#;
        let meta = RequestMetadata::parse(Some(raw));
        assert_eq!(meta.opt_out_url.as_deref(), Some("https://www.spokeo.com/optout"));
        assert_eq!(meta.attempts, None);
        assert_eq!(meta.version, METADATA_VERSION);
        assert_eq!(meta.extra.get("attempts"), Some(&Value::from("3")));
        assert_eq!(meta.extra.get("note"), Some(&Value::from("keep")));
        assert!(!meta.extra.contains_key("version"));

        let back: Value = serde_json::from_str(&meta.to_json().unwrap()).unwrap();
        assert_eq!(back["attempts"], "3");
        assert_eq!(back["optOutUrl"], "https://www.spokeo.com/optout");
    }

    #[test]
    fn test_metadata_that_is_not_an_object_is_empty() {
        assert_eq!(RequestMetadata::parse(Some("[1,2]")), RequestMetadata::default());
        assert_eq!(RequestMetadata::parse(Some("42")), RequestMetadata::default());
    }

    #[test]
    fn test_merge_replaces_raw_copy_of_typed_field() {
        let mut stored = RequestMetadata::parse(Some(r#"{"attempts":"3"}"#));
        stored.merge(RequestMetadata {
            attempts: Some(1),
            ..Default::default()
        });
        assert_eq!(stored.attempts, Some(1));
        assert!(stored.extra.is_empty());
        let back: Value = serde_json::from_str(&stored.to_json().unwrap()).unwrap();
        assert_eq!(back["attempts"], 1);
    }

    #[test]
    fn test_metadata_merge_only_overwrites_set_fields() {
        let mut stored = RequestMetadata {
            opt_out_url: Some("https://www.whitepages.com/suppression-requests".into()),
            attempts: Some(1),
            ..Default::default()
        };
        stored.extra.insert("note".into(), Value::from("keep me"));

        let mut patch = RequestMetadata {
            attempts: Some(2),
            screenshot: Some("img".into()),
            ..Default::default()
        };
        patch.extra.insert("source".into(), Value::from("bulk"));
        stored.merge(patch);

        assert_eq!(
            stored.opt_out_url.as_deref(),
            Some("https://www.whitepages.com/suppression-requests")
        );
        assert_eq!(stored.attempts, Some(2));
        assert_eq!(stored.screenshot.as_deref(), Some("img"));
        assert_eq!(stored.extra.len(), 2);
    }
}
