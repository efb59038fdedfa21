//! Versioned system settings with an append-only audit trail.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default retry budget before a video goes to the dead-letter set.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default multipart part size (10 MiB).
pub const DEFAULT_PART_SIZE: u64 = 10 * 1024 * 1024;

/// Default presigned part-URL lifetime.
pub const DEFAULT_PRESIGN_TTL_SECS: u64 = 3600;

/// Well-known setting coordinates the pipeline reads.
pub mod keys {
    pub const PIPELINE: &str = "pipeline";
    pub const MAX_RETRIES: &str = "max_retries";
    pub const UPLOAD: &str = "upload";
    pub const PART_SIZE: &str = "part_size";
}

/// A typed configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Json(serde_json::Value),
}

impl SettingValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SettingValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SettingValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

/// One `(category, key)` row.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SystemSetting {
    pub id: Uuid,
    pub category: String,
    pub key: String,
    pub value: SettingValue,
    /// Bumped on every upsert
    pub version: i32,
    pub updated_at: DateTime<Utc>,
}

/// Append-only record of a settings change, written in the same transaction
/// as the upsert.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SettingAuditRecord {
    pub id: Uuid,
    /// Actor identity (user id or service name)
    pub who: String,
    pub category: String,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<SettingValue>,
    pub new: SettingValue,
    pub when: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_accessors() {
        assert_eq!(SettingValue::Int(3).as_i64(), Some(3));
        assert_eq!(SettingValue::Bool(true).as_bool(), Some(true));
        assert_eq!(SettingValue::Text("x".into()).as_text(), Some("x"));
        assert_eq!(SettingValue::Bool(true).as_i64(), None);
    }

    #[test]
    fn test_value_serialization_is_tagged() {
        let json = serde_json::to_value(SettingValue::Int(3)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "int", "value": 3}));
    }
}
