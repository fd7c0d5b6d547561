//! The processor contract: one implementation per job kind, dispatched
//! through a registry built at startup. Mirrors the grounding repo's
//! registry-of-trait-object pattern for background loop kinds in
//! `pageserver/src/tenant/tasks.rs`'s `BackgroundLoopKind`.

pub mod convert;
pub mod ocr;
pub mod page_spec;
pub mod pdf_ops;
pub mod repair;
pub mod subprocess;

use std::collections::HashMap;

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use serde_json::Value;

use docflow_api::requests::JobParameters;
use docflow_api::JobKind;

use crate::config::ServiceConfig;
use crate::error::ApiError;

pub struct ProcessorResult {
    pub artifacts: Vec<Utf8PathBuf>,
    pub metadata: Value,
}

impl ProcessorResult {
    pub fn single(artifact: Utf8PathBuf, metadata: Value) -> Self {
        ProcessorResult {
            artifacts: vec![artifact],
            metadata,
        }
    }
}

/// A single operation kind's implementation: either an in-process
/// transform over a PDF library, or a supervised subprocess. Either way
/// this runs on a dedicated worker thread, never inline on the request
/// task.
#[async_trait]
pub trait Processor: Send + Sync {
    async fn process(
        &self,
        input_paths: &[Utf8PathBuf],
        out_dir: &Utf8Path,
        params: &JobParameters,
    ) -> Result<ProcessorResult, ApiError>;
}

pub type Registry = HashMap<JobKind, Box<dyn Processor>>;

/// Builds the full registry of 23 operation kinds. In-process kinds use
/// `lopdf` directly; subprocess kinds shell out under the worker's deadline.
pub fn build_registry(config: &ServiceConfig) -> Registry {
    let mut registry: Registry = HashMap::new();

    registry.insert(JobKind::Compress, Box::new(pdf_ops::CompressProcessor));
    registry.insert(JobKind::Merge, Box::new(pdf_ops::MergeProcessor));
    registry.insert(JobKind::Split, Box::new(pdf_ops::SplitProcessor));
    registry.insert(JobKind::Rotate, Box::new(pdf_ops::RotateProcessor));
    registry.insert(JobKind::Crop, Box::new(pdf_ops::CropProcessor));
    registry.insert(JobKind::Watermark, Box::new(pdf_ops::WatermarkProcessor));
    registry.insert(JobKind::Redact, Box::new(pdf_ops::RedactProcessor));
    registry.insert(JobKind::Sign, Box::new(pdf_ops::SignProcessor));
    registry.insert(JobKind::Protect, Box::new(pdf_ops::ProtectProcessor));
    registry.insert(JobKind::Unlock, Box::new(pdf_ops::UnlockProcessor));
    registry.insert(JobKind::Compare, Box::new(pdf_ops::CompareProcessor));

    registry.insert(JobKind::Ocr, Box::new(ocr::OcrProcessor::new(config)));
    registry.insert(JobKind::Repair, Box::new(repair::RepairProcessor::new(config)));

    for kind in [
        JobKind::ConvertWordToPdf,
        JobKind::ConvertExcelToPdf,
        JobKind::ConvertPptToPdf,
        JobKind::ConvertHtmlToPdf,
        JobKind::ConvertJpgToPdf,
        JobKind::ConvertPdfToWord,
        JobKind::ConvertPdfToExcel,
        JobKind::ConvertPdfToPpt,
        JobKind::ConvertPdfToJpg,
        JobKind::ConvertPdfToPdfa,
    ] {
        registry.insert(kind, Box::new(convert::ConvertProcessor::with_config(kind, config)));
    }

    registry
}
