//! Office/HTML/image conversion processors. Each converter writes into
//! `out_dir` and is located afterward by extension rule (same basename,
//! new extension).

use std::time::Duration;

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use tokio::process::Command;

use docflow_api::requests::JobParameters;
use docflow_api::JobKind;

use super::subprocess::{require_success, run_with_deadline};
use super::{Processor, ProcessorResult};
use crate::config::ServiceConfig;
use crate::error::ApiError;

/// One external converter invocation per kind. All of the `convert_*`
/// kinds share the same contract: one input file in, one output file out,
/// located by the extension the target format implies.
pub struct ConvertProcessor {
    kind: JobKind,
    deadline: Duration,
}

impl ConvertProcessor {
    pub fn with_config(kind: JobKind, config: &ServiceConfig) -> Self {
        ConvertProcessor {
            kind,
            deadline: config.pdf_processing_timeout,
        }
    }

    fn target_extension(&self) -> &'static str {
        match self.kind {
            JobKind::ConvertWordToPdf
            | JobKind::ConvertExcelToPdf
            | JobKind::ConvertPptToPdf
            | JobKind::ConvertHtmlToPdf
            | JobKind::ConvertJpgToPdf => "pdf",
            JobKind::ConvertPdfToWord => "docx",
            JobKind::ConvertPdfToExcel => "xlsx",
            JobKind::ConvertPdfToPpt => "pptx",
            JobKind::ConvertPdfToJpg => "jpg",
            JobKind::ConvertPdfToPdfa => "pdf",
            _ => "bin",
        }
    }

    fn build_command(&self, input: &Utf8Path, out_dir: &Utf8Path) -> Command {
        let mut cmd = match self.kind {
            JobKind::ConvertWordToPdf
            | JobKind::ConvertExcelToPdf
            | JobKind::ConvertPptToPdf
            | JobKind::ConvertPdfToWord
            | JobKind::ConvertPdfToExcel
            | JobKind::ConvertPdfToPpt => {
                let mut c = Command::new("libreoffice");
                c.arg("--headless")
                    .arg("--convert-to")
                    .arg(self.target_extension())
                    .arg("--outdir")
                    .arg(out_dir.as_std_path())
                    .arg(input.as_std_path());
                c
            }
            JobKind::ConvertHtmlToPdf => {
                let mut c = Command::new("wkhtmltopdf");
                c.arg(input.as_std_path())
                    .arg(out_dir.join(format!("{}.pdf", input.file_stem().unwrap_or("output"))).as_std_path());
                c
            }
            JobKind::ConvertJpgToPdf => {
                let mut c = Command::new("img2pdf");
                c.arg(input.as_std_path())
                    .arg("-o")
                    .arg(out_dir.join(format!("{}.pdf", input.file_stem().unwrap_or("output"))).as_std_path());
                c
            }
            JobKind::ConvertPdfToJpg => {
                let mut c = Command::new("pdftoppm");
                c.arg("-jpeg")
                    .arg(input.as_std_path())
                    .arg(out_dir.join(input.file_stem().unwrap_or("output")).as_std_path());
                c
            }
            JobKind::ConvertPdfToPdfa => {
                let mut c = Command::new("gs");
                c.arg("-dPDFA")
                    .arg("-dBATCH")
                    .arg("-dNOPAUSE")
                    .arg("-sDEVICE=pdfwrite")
                    .arg(format!(
                        "-sOutputFile={}",
                        out_dir.join(format!("{}.pdf", input.file_stem().unwrap_or("output")))
                    ))
                    .arg(input.as_std_path());
                c
            }
            _ => Command::new("true"),
        };
        cmd.kill_on_drop(true);
        cmd
    }

    fn expected_output(&self, input: &Utf8Path, out_dir: &Utf8Path) -> Utf8PathBuf {
        let stem = input.file_stem().unwrap_or("output");
        out_dir.join(format!("{stem}.{}", self.target_extension()))
    }
}

#[async_trait]
impl Processor for ConvertProcessor {
    async fn process(
        &self,
        input_paths: &[Utf8PathBuf],
        out_dir: &Utf8Path,
        _params: &JobParameters,
    ) -> Result<ProcessorResult, ApiError> {
        let input = match input_paths {
            [p] => p,
            _ => return Err(ApiError::invalid_input("convert accepts exactly one file")),
        };

        let cmd = self.build_command(input, out_dir);
        let output = run_with_deadline(cmd, self.deadline).await?;
        require_success(output, "converter")?;

        let out_path = self.expected_output(input, out_dir);
        if !out_path.exists() {
            return Err(ApiError::subprocess_failed(
                "converter exited successfully but did not produce the expected output file",
            ));
        }

        Ok(ProcessorResult::single(
            out_path,
            serde_json::json!({ "kind": self.kind.as_str() }),
        ))
    }
}
