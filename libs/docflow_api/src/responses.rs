use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::kind::JobKind;
use crate::status::JobStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResponse {
    pub success: bool,
    pub job_id: String,
    pub status: JobStatus,
    pub download_url: Option<String>,
    pub result_data: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryItem {
    pub job_id: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub input_name: Option<String>,
    pub output_name: Option<String>,
    pub output_size: Option<i64>,
    pub download_url: Option<String>,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    pub processing_time_ms: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryPage {
    pub items: Vec<HistoryItem>,
    pub total: i64,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityInfo {
    pub kind: JobKind,
    pub accepted_formats: Vec<&'static str>,
    pub max_file_size_mb_default: u32,
    pub notes: &'static str,
}
