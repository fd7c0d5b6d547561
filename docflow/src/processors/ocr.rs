//! OCR processor: shells out to `tesseract`, producing a searchable PDF
//! with an invisible text layer over the original page images.

use std::time::Duration;

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use tokio::process::Command;

use docflow_api::requests::JobParameters;

use super::subprocess::{require_success, run_with_deadline};
use super::{Processor, ProcessorResult};
use crate::config::ServiceConfig;
use crate::error::ApiError;

pub struct OcrProcessor {
    deadline: Duration,
}

impl OcrProcessor {
    pub fn new(config: &ServiceConfig) -> Self {
        OcrProcessor {
            deadline: config.pdf_processing_timeout,
        }
    }
}

#[async_trait]
impl Processor for OcrProcessor {
    async fn process(
        &self,
        input_paths: &[Utf8PathBuf],
        out_dir: &Utf8Path,
        params: &JobParameters,
    ) -> Result<ProcessorResult, ApiError> {
        let language = match params {
            JobParameters::Ocr { language } => language.clone(),
            _ => return Err(ApiError::invalid_input("expected ocr parameters")),
        };
        let input = match input_paths {
            [p] => p,
            _ => return Err(ApiError::invalid_input("ocr accepts exactly one file")),
        };

        let stem = input.file_stem().unwrap_or("output");
        let out_basename = out_dir.join(stem);

        let mut cmd = Command::new("tesseract");
        cmd.arg(input.as_std_path())
            .arg(out_basename.as_std_path())
            .arg("-l")
            .arg(language.as_deref().unwrap_or("eng"))
            .arg("pdf")
            .kill_on_drop(true);

        let output = run_with_deadline(cmd, self.deadline).await?;
        require_success(output, "tesseract")?;

        let out_path = out_dir.join(format!("{stem}.pdf"));
        if !out_path.exists() {
            return Err(ApiError::subprocess_failed(
                "tesseract exited successfully but produced no output PDF",
            ));
        }

        Ok(ProcessorResult::single(
            out_path,
            serde_json::json!({ "language": language.unwrap_or_else(|| "eng".to_string()) }),
        ))
    }
}
