//! PDF repair: shells out to `qpdf --recover` to rebuild a malformed PDF's
//! cross-reference table.

use std::time::Duration;

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use tokio::process::Command;

use docflow_api::requests::JobParameters;

use super::subprocess::{require_success, run_with_deadline};
use super::{Processor, ProcessorResult};
use crate::config::ServiceConfig;
use crate::error::ApiError;

pub struct RepairProcessor {
    deadline: Duration,
}

impl RepairProcessor {
    pub fn new(config: &ServiceConfig) -> Self {
        RepairProcessor {
            deadline: config.pdf_processing_timeout,
        }
    }
}

#[async_trait]
impl Processor for RepairProcessor {
    async fn process(
        &self,
        input_paths: &[Utf8PathBuf],
        out_dir: &Utf8Path,
        _params: &JobParameters,
    ) -> Result<ProcessorResult, ApiError> {
        let input = match input_paths {
            [p] => p,
            _ => return Err(ApiError::invalid_input("repair accepts exactly one file")),
        };
        let out_path = out_dir.join("repaired.pdf");

        let mut cmd = Command::new("qpdf");
        cmd.arg("--recover")
            .arg(input.as_std_path())
            .arg(out_path.as_std_path())
            .kill_on_drop(true);

        let output = run_with_deadline(cmd, self.deadline).await?;
        require_success(output, "qpdf")?;

        if !out_path.exists() {
            return Err(ApiError::subprocess_failed(
                "qpdf exited successfully but produced no output PDF",
            ));
        }

        Ok(ProcessorResult::single(out_path, serde_json::json!({})))
    }
}
