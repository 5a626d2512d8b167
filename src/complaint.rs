// src/complaint.rs
//! Complaint records, intake payloads, patches and the fixed set of storage partitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_RESOLVED: &str = "resolved";

pub const DEFAULT_CATEGORY: &str = "General";
pub const DEFAULT_PRIORITY: &str = "Medium";
pub const DEFAULT_USER_TYPE: &str = "Student";

/// Storage partition a complaint lives in. Closed set, known at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Domain {
    Education,
    Healthcare,
    Business,
    #[default]
    Default,
}

impl Domain {
    /// Partition iteration order used by unscoped listings.
    pub const ALL: [Domain; 4] = [
        Domain::Education,
        Domain::Healthcare,
        Domain::Business,
        Domain::Default,
    ];

    /// Case-insensitive lookup; anything unrecognised lands in `Default`.
    pub fn resolve(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("education") => Domain::Education,
            Some("healthcare") => Domain::Healthcare,
            Some("business") => Domain::Business,
            _ => Domain::Default,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Domain::Education => "education",
            Domain::Healthcare => "healthcare",
            Domain::Business => "business",
            Domain::Default => "default",
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            Domain::Education => "education_complaints.json",
            Domain::Healthcare => "healthcare_complaints.json",
            Domain::Business => "business_complaints.json",
            Domain::Default => "other_complaints.json",
        }
    }
}

impl From<String> for Domain {
    fn from(raw: String) -> Self {
        Domain::resolve(Some(&raw))
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw classifier output kept next to the (possibly edited) routing fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiAnalysis {
    #[serde(rename = "type")]
    pub complaint_type: String,
    pub confidence: f64,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub analyzed_at: DateTime<Utc>,
}

/// A stored complaint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Complaint {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub contact_info: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default, rename = "type")]
    pub complaint_type: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub user_type: String,
    #[serde(default)]
    pub domain: Domain,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_analysis: Option<AiAnalysis>,
}

fn default_status() -> String {
    STATUS_PENDING.to_string()
}

/// Stored timestamps are RFC 3339. Records written before offsets were
/// recorded carry a naive `YYYY-MM-DDTHH:MM:SS[.ffffff]`, which is UTC.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{de::Error as _, Deserialize, Deserializer};

    pub fn parse(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
        match DateTime::parse_from_rfc3339(raw) {
            Ok(dt) => Ok(dt.with_timezone(&Utc)),
            Err(_) => raw.parse::<NaiveDateTime>().map(|n| n.and_utc()),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).map_err(|e| D::Error::custom(format!("invalid timestamp `{raw}`: {e}")))
    }
}

/// Everything a store needs to persist a new complaint. `id` and `createdAt`
/// are not representable here; the store assigns them.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplaintDraft {
    pub title: String,
    pub description: String,
    pub contact_info: String,
    pub category: String,
    pub priority: String,
    pub complaint_type: String,
    pub department: String,
    pub user_type: String,
    pub domain: Domain,
    pub status: Option<String>,
    pub confidence: f64,
    pub ai_analysis: Option<AiAnalysis>,
}

impl ComplaintDraft {
    pub fn into_complaint(self, id: String, created_at: DateTime<Utc>) -> Complaint {
        Complaint {
            id,
            title: self.title,
            description: self.description,
            contact_info: self.contact_info,
            category: self.category,
            priority: self.priority,
            complaint_type: self.complaint_type,
            department: self.department,
            user_type: self.user_type,
            domain: self.domain,
            status: self
                .status
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(default_status),
            created_at,
            confidence: self.confidence,
            ai_analysis: self.ai_analysis,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
}

/// Body of `POST /api/complaints` as it arrives on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintPayload {
    pub title: Option<String>,
    pub description: Option<String>,
    pub contact_info: Option<String>,
    pub category: Option<String>,
    pub department: Option<String>,
    pub priority: Option<String>,
    pub user_type: Option<String>,
    pub domain: Option<String>,
}

/// A payload whose required fields are known to be present and non-empty.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplaintSubmission {
    pub title: String,
    pub description: String,
    pub contact_info: String,
    pub category: Option<String>,
    pub department: Option<String>,
    pub priority: Option<String>,
    pub user_type: Option<String>,
    pub domain: Domain,
}

impl ComplaintSubmission {
    /// Text handed to the classifiers.
    pub fn analysis_text(&self) -> String {
        format!("{}. {}", self.title, self.description)
    }
}

impl ComplaintPayload {
    pub fn validate(self) -> Result<ComplaintSubmission, ValidationError> {
        let mut missing = Vec::new();
        let title = required(self.title, "title", &mut missing);
        let description = required(self.description, "description", &mut missing);
        let contact_info = required(self.contact_info, "contactInfo", &mut missing);
        if !missing.is_empty() {
            return Err(ValidationError::MissingFields(missing));
        }

        Ok(ComplaintSubmission {
            title,
            description,
            contact_info,
            category: optional(self.category),
            department: optional(self.department),
            priority: optional(self.priority),
            user_type: optional(self.user_type),
            domain: Domain::resolve(self.domain.as_deref()),
        })
    }
}

fn required(v: Option<String>, name: &'static str, missing: &mut Vec<&'static str>) -> String {
    match v {
        Some(s) if !s.trim().is_empty() => s,
        _ => {
            missing.push(name);
            String::new()
        }
    }
}

fn optional(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

/// Body of `PATCH /api/complaints/{id}`. Only these fields are mutable;
/// `id`, `createdAt`, `domain` and `aiAnalysis` are silently dropped by serde.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub contact_info: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
    #[serde(rename = "type")]
    pub complaint_type: Option<String>,
    pub department: Option<String>,
    pub user_type: Option<String>,
    pub status: Option<String>,
}

impl ComplaintPatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (name, v) in [
            ("title", &self.title),
            ("description", &self.description),
            ("contactInfo", &self.contact_info),
            ("status", &self.status),
        ] {
            if v.as_deref().is_some_and(|s| s.trim().is_empty()) {
                return Err(ValidationError::EmptyField(name));
            }
        }
        Ok(())
    }

    pub fn apply(self, c: &mut Complaint) {
        let fields = [
            (self.title, &mut c.title),
            (self.description, &mut c.description),
            (self.contact_info, &mut c.contact_info),
            (self.category, &mut c.category),
            (self.priority, &mut c.priority),
            (self.complaint_type, &mut c.complaint_type),
            (self.department, &mut c.department),
            (self.user_type, &mut c.user_type),
            (self.status, &mut c.status),
        ];
        for (new, slot) in fields {
            if let Some(v) = new {
                *slot = v;
            }
        }
    }
}
