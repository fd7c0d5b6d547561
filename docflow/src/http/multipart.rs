//! Multipart body parsing shared by every `/pdf/*` handler. axum's
//! `Multipart` extractor streams fields one at a time; there is no
//! precedent for this in the grounding repo (it has no multipart surface
//! at all), so this follows plain idiomatic axum usage, buffering each
//! part fully since every processor needs the whole file in memory or on
//! disk before it can run.

use std::collections::HashMap;

use axum::extract::Multipart;

use crate::error::ApiError;

/// One uploaded file part: its field name (`file`, `files[]`, `file1`, ...),
/// the client-supplied filename, and its bytes.
pub struct UploadedPart {
    pub field_name: String,
    pub filename: String,
    pub bytes: Vec<u8>,
}

pub struct ParsedMultipart {
    pub files: Vec<UploadedPart>,
    pub fields: HashMap<String, String>,
}

impl ParsedMultipart {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|s| s.as_str())
    }

    pub fn required_field(&self, name: &str) -> Result<&str, ApiError> {
        self.field(name)
            .ok_or_else(|| ApiError::invalid_input(format!("missing required field '{name}'")))
    }

    pub fn files_named(&self, name: &str) -> Vec<&UploadedPart> {
        self.files.iter().filter(|p| p.field_name == name).collect()
    }
}

/// Drains every part of a multipart body into memory. File parts (those
/// carrying a filename) are kept in upload order; everything else is
/// treated as a plain form field.
pub async fn parse(mut multipart: Multipart) -> Result<ParsedMultipart, ApiError> {
    let mut files = Vec::new();
    let mut fields = HashMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::invalid_input(format!("malformed multipart body: {e}")))?
    {
        let field_name = field.name().unwrap_or("").to_string();
        let filename = field.file_name().map(|s| s.to_string());

        match filename {
            Some(filename) => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::invalid_input(format!("failed to read upload: {e}")))?
                    .to_vec();
                files.push(UploadedPart {
                    field_name,
                    filename,
                    bytes,
                });
            }
            None => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::invalid_input(format!("failed to read form field: {e}")))?;
                fields.insert(field_name, text);
            }
        }
    }

    Ok(ParsedMultipart { files, fields })
}
