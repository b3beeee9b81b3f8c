use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Coarse freshness hint controlling the `verify_after` schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityClass {
    Static,
    High,
    Medium,
    Low,
}

impl Default for VolatilityClass {
    fn default() -> Self {
        VolatilityClass::Low
    }
}

impl VolatilityClass {
    /// The `_compute_verify_after` delta table: `static` never expires,
    /// the others get 7/30/365 days respectively.
    pub fn verify_after_from(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            VolatilityClass::Static => None,
            VolatilityClass::High => Some(now + Duration::days(7)),
            VolatilityClass::Medium => Some(now + Duration::days(30)),
            VolatilityClass::Low => Some(now + Duration::days(365)),
        }
    }
}

impl fmt::Display for VolatilityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VolatilityClass::Static => "static",
            VolatilityClass::High => "high",
            VolatilityClass::Medium => "medium",
            VolatilityClass::Low => "low",
        };
        f.write_str(s)
    }
}

impl FromStr for VolatilityClass {
    type Err = ();

    /// Unrecognized input normalizes to `low`, mirroring the segmenter's
    /// "normalize volatility_class to one of the four legal values" step.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "static" => VolatilityClass::Static,
            "high" => VolatilityClass::High,
            "medium" => VolatilityClass::Medium,
            _ => VolatilityClass::Low,
        })
    }
}

/// Directed, typed relationship between two Memories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Supersedes,
    RelatesTo,
    DependsOn,
    SequenceNext,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Relation::Supersedes => "supersedes",
            Relation::RelatesTo => "relates_to",
            Relation::DependsOn => "depends_on",
            Relation::SequenceNext => "sequence_next",
        };
        f.write_str(s)
    }
}

impl FromStr for Relation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "supersedes" => Ok(Relation::Supersedes),
            "relates_to" => Ok(Relation::RelatesTo),
            "depends_on" => Ok(Relation::DependsOn),
            "sequence_next" => Ok(Relation::SequenceNext),
            other => Err(format!("unknown relation: {other}")),
        }
    }
}

/// The unit of durable knowledge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: Uuid,
    pub content: String,
    #[serde(skip)]
    pub embedding: Vec<f32>,
    pub category_path: String,
    pub supersedes_id: Option<Uuid>,
    pub archived_at: Option<DateTime<Utc>>,
    pub verify_after: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

impl Memory {
    pub fn is_active(&self) -> bool {
        self.supersedes_id.is_none() && self.archived_at.is_none()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.verify_after.map(|v| v < now).unwrap_or(false)
    }

    pub fn volatility_class(&self) -> VolatilityClass {
        self.metadata
            .get("volatility_class")
            .and_then(|v| v.as_str())
            .and_then(|s| VolatilityClass::from_str(s).ok())
            .unwrap_or_default()
    }

    pub fn ttl_days(&self) -> Option<i64> {
        self.metadata.get("ttl_days").and_then(|v| v.as_i64())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Complete,
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Complete => "complete",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "complete" => Ok(JobStatus::Complete),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// Row in the ingestion staging table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionJob {
    pub job_id: Uuid,
    pub raw_text: String,
    pub ttl_days: Option<i64>,
    pub status: JobStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Ephemeral key/value entry in the context store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextEntry {
    pub key: String,
    pub value: String,
    pub scope: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Single cached row of the last LLM-generated user-briefing prose.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimerCache {
    pub cache_key: String,
    pub summary: String,
    pub updated_at: DateTime<Utc>,
}

/// One section returned by the segmenter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub content: String,
    pub category_path: String,
    pub tags: Vec<String>,
    pub volatility_class: VolatilityClass,
}

/// Outcome of arbitrating a candidate section against its nearest neighbour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArbitrationResolution {
    Supersedes,
    Merges,
}

impl FromStr for ArbitrationResolution {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "merges" => Ok(ArbitrationResolution::Merges),
            _ => Ok(ArbitrationResolution::Supersedes),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArbitrationOutcome {
    pub resolution: ArbitrationResolution,
    pub updated_text: String,
}
