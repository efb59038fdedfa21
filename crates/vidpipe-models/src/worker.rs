//! Worker presence records, published as heartbeats to the KV bus.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// What a worker processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkerType {
    Transcode,
    Subtitle,
}

impl WorkerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerType::Transcode => "transcode",
            WorkerType::Subtitle => "subtitle",
        }
    }
}

impl fmt::Display for WorkerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Self-reported worker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    #[default]
    Idle,
    Busy,
    Draining,
}

impl WorkerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerStatus::Idle => "idle",
            WorkerStatus::Busy => "busy",
            WorkerStatus::Draining => "draining",
        }
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifetime counters a worker reports with each heartbeat.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct WorkerStats {
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_secs: Option<u64>,
}

/// Disk headroom on the worker host.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct DiskInfo {
    pub total_bytes: u64,
    pub free_bytes: u64,
}

/// One heartbeat snapshot. Authoritative lifetime is the KV TTL; absence
/// means offline.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerPresence {
    pub worker_id: String,
    pub worker_type: WorkerType,
    pub hostname: String,
    pub status: WorkerStatus,
    /// Idempotency keys of jobs currently held by this worker
    #[serde(default)]
    pub current_jobs: Vec<String>,
    #[serde(default)]
    pub stats: WorkerStats,
    /// Opaque worker configuration, surfaced to operators as-is
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default)]
    pub disk: DiskInfo,
    pub last_seen: DateTime<Utc>,
}

/// Aggregate view returned alongside the online worker list.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct WorkerSummary {
    pub by_type: HashMap<String, u32>,
    pub by_status: HashMap<String, u32>,
    pub total_jobs: u32,
}

impl WorkerSummary {
    /// Fold a set of presence records into the aggregate.
    pub fn from_workers(workers: &[WorkerPresence]) -> Self {
        let mut summary = Self::default();
        for w in workers {
            *summary.by_type.entry(w.worker_type.to_string()).or_insert(0) += 1;
            *summary.by_status.entry(w.status.to_string()).or_insert(0) += 1;
            summary.total_jobs += w.current_jobs.len() as u32;
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn presence(id: &str, ty: WorkerType, status: WorkerStatus, jobs: usize) -> WorkerPresence {
        WorkerPresence {
            worker_id: id.into(),
            worker_type: ty,
            hostname: "host-1".into(),
            status,
            current_jobs: (0..jobs).map(|i| format!("job-{}", i)).collect(),
            stats: WorkerStats::default(),
            config: serde_json::Value::Null,
            disk: DiskInfo::default(),
            last_seen: Utc::now(),
        }
    }

    #[test]
    fn test_summary_counts() {
        let workers = vec![
            presence("w1", WorkerType::Transcode, WorkerStatus::Busy, 2),
            presence("w2", WorkerType::Transcode, WorkerStatus::Idle, 0),
            presence("w3", WorkerType::Subtitle, WorkerStatus::Busy, 1),
        ];
        let summary = WorkerSummary::from_workers(&workers);
        assert_eq!(summary.by_type["transcode"], 2);
        assert_eq!(summary.by_type["subtitle"], 1);
        assert_eq!(summary.by_status["busy"], 2);
        assert_eq!(summary.total_jobs, 3);
    }
}
