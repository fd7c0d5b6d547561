use serde::{Deserialize, Serialize};

/// Per-kind operation parameters, parsed from multipart form fields.
/// Kept as a tagged union rather than an untyped map so that each
/// operation's required fields are enforced by the type system once the
/// handler has pulled them out of the form; the database still stores the
/// serialized variant as a JSON blob in `jobs.parameters`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobParameters {
    Compress { quality: u8 },
    Merge,
    Split { pages: String },
    Rotate { angle: u16 },
    Crop { x: f32, y: f32, width: f32, height: f32 },
    Watermark { text: String },
    Redact { pages: String },
    Sign { text: String },
    Protect { password: String },
    Unlock { password: String },
    Compare,
    Ocr { language: Option<String> },
    Repair,
    Convert,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HistoryQuery {
    pub status: Option<String>,
    pub kind: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}
