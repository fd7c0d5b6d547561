use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Every operation this service exposes. Stored as the stable string value
/// given by [`JobKind::as_str`], never as a numeric discriminant, so the
/// `jobs.kind` column stays readable and migrations never renumber it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum JobKind {
    Compress,
    Merge,
    Split,
    Rotate,
    Crop,
    Watermark,
    Redact,
    Sign,
    Protect,
    Unlock,
    Compare,
    Ocr,
    Repair,
    ConvertWordToPdf,
    ConvertExcelToPdf,
    ConvertPptToPdf,
    ConvertHtmlToPdf,
    ConvertJpgToPdf,
    ConvertPdfToWord,
    ConvertPdfToExcel,
    ConvertPdfToPpt,
    ConvertPdfToJpg,
    ConvertPdfToPdfa,
}

impl JobKind {
    pub const ALL: &'static [JobKind] = &[
        JobKind::Compress,
        JobKind::Merge,
        JobKind::Split,
        JobKind::Rotate,
        JobKind::Crop,
        JobKind::Watermark,
        JobKind::Redact,
        JobKind::Sign,
        JobKind::Protect,
        JobKind::Unlock,
        JobKind::Compare,
        JobKind::Ocr,
        JobKind::Repair,
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
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Compress => "compress",
            JobKind::Merge => "merge",
            JobKind::Split => "split",
            JobKind::Rotate => "rotate",
            JobKind::Crop => "crop",
            JobKind::Watermark => "watermark",
            JobKind::Redact => "redact",
            JobKind::Sign => "sign",
            JobKind::Protect => "protect",
            JobKind::Unlock => "unlock",
            JobKind::Compare => "compare",
            JobKind::Ocr => "ocr",
            JobKind::Repair => "repair",
            JobKind::ConvertWordToPdf => "convert_word_to_pdf",
            JobKind::ConvertExcelToPdf => "convert_excel_to_pdf",
            JobKind::ConvertPptToPdf => "convert_ppt_to_pdf",
            JobKind::ConvertHtmlToPdf => "convert_html_to_pdf",
            JobKind::ConvertJpgToPdf => "convert_jpg_to_pdf",
            JobKind::ConvertPdfToWord => "convert_pdf_to_word",
            JobKind::ConvertPdfToExcel => "convert_pdf_to_excel",
            JobKind::ConvertPdfToPpt => "convert_pdf_to_ppt",
            JobKind::ConvertPdfToJpg => "convert_pdf_to_jpg",
            JobKind::ConvertPdfToPdfa => "convert_pdf_to_pdfa",
        }
    }

    /// Subprocess-backed kinds spawn an external converter; everything else
    /// runs in-process against a dedicated worker thread.
    pub fn is_subprocess(&self) -> bool {
        matches!(
            self,
            JobKind::ConvertWordToPdf
                | JobKind::ConvertExcelToPdf
                | JobKind::ConvertPptToPdf
                | JobKind::ConvertHtmlToPdf
                | JobKind::ConvertJpgToPdf
                | JobKind::ConvertPdfToWord
                | JobKind::ConvertPdfToExcel
                | JobKind::ConvertPdfToPpt
                | JobKind::ConvertPdfToJpg
                | JobKind::ConvertPdfToPdfa
                | JobKind::Ocr
                | JobKind::Repair
        )
    }

    /// Comparison jobs produce no downloadable artifact, only `result_data`.
    pub fn produces_artifact(&self) -> bool {
        !matches!(self, JobKind::Compare)
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown job kind: {0}")]
pub struct UnknownJobKind(pub String);

impl FromStr for JobKind {
    type Err = UnknownJobKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobKind::ALL
            .iter()
            .find(|k| k.as_str() == s)
            .copied()
            .ok_or_else(|| UnknownJobKind(s.to_string()))
    }
}

impl TryFrom<String> for JobKind {
    type Error = UnknownJobKind;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<JobKind> for String {
    fn from(k: JobKind) -> Self {
        k.as_str().to_string()
    }
}
