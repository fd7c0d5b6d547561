//! The `/pdf/*` surface: one POST handler per operation kind plus a
//! static capability descriptor, following the uniform request contract
//! (multipart file(s) + operation fields in, `JobResponse` out).

use axum::extract::{Path, State};
use axum::Json;

use docflow_api::requests::JobParameters;
use docflow_api::responses::{CapabilityInfo, JobResponse};
use docflow_api::JobKind;

use crate::auth::extractor::AuthenticatedTenant;
use crate::error::ApiError;
use crate::http::multipart::{parse, ParsedMultipart, UploadedPart};
use crate::http::state::AppState;
use crate::jobs;
use crate::scheduler::JobTicket;
use crate::tenant::quota;

/// Maps a URL path segment (e.g. `compress`, `split`) to its [`JobKind`],
/// excluding the `convert_*` family which is routed separately under
/// `/pdf/convert/:format`.
fn op_to_kind(op: &str) -> Result<JobKind, ApiError> {
    let kind: JobKind = op
        .parse()
        .map_err(|_| ApiError::not_found(format!("unknown operation '{op}'")))?;
    if matches!(
        kind,
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
    ) {
        return Err(ApiError::not_found(format!("unknown operation '{op}'")));
    }
    Ok(kind)
}

/// Maps a `/pdf/convert/:format` path segment (e.g. `word-to-pdf`) to its
/// `JobKind::Convert*` variant.
fn format_to_kind(format: &str) -> Result<JobKind, ApiError> {
    let snake = format.replace('-', "_");
    format!("convert_{snake}")
        .parse()
        .map_err(|_| ApiError::not_found(format!("unknown conversion format '{format}'")))
}

/// `POST /pdf/:op`
pub async fn run_operation(
    State(app): State<AppState>,
    AuthenticatedTenant(tenant): AuthenticatedTenant,
    Path(op): Path<String>,
    multipart: axum::extract::Multipart,
) -> Result<Json<JobResponse>, ApiError> {
    let kind = op_to_kind(&op)?;
    run(app, tenant, kind, multipart).await
}

/// `POST /pdf/convert/:format`
pub async fn run_convert(
    State(app): State<AppState>,
    AuthenticatedTenant(tenant): AuthenticatedTenant,
    Path(format): Path<String>,
    multipart: axum::extract::Multipart,
) -> Result<Json<JobResponse>, ApiError> {
    let kind = format_to_kind(&format)?;
    run(app, tenant, kind, multipart).await
}

async fn run(
    app: AppState,
    tenant: crate::tenant::Tenant,
    kind: JobKind,
    multipart: axum::extract::Multipart,
) -> Result<Json<JobResponse>, ApiError> {
    let parsed = parse(multipart).await?;
    let parts = select_input_parts(kind, &parsed)?;
    let params = build_params(kind, &parsed)?;

    // Quota admission runs against sizes already buffered in memory by the
    // multipart parser, before a single byte is written to storage — a
    // rejected request must never persist anything.
    let primary_size: u64 = parts.iter().map(|p| p.bytes.len() as u64).sum();
    let requires_verified = kind.produces_artifact();

    let pool = app.pool.clone();
    let tenant_id = tenant.id;
    let tenant_snapshot = crate::db::with_conn(&pool, move |conn| {
        quota::check_admission(conn, tenant_id, requires_verified, Some(primary_size))
    })
    .await?;

    let mut saved_uploads = Vec::with_capacity(parts.len());
    for part in &parts {
        let saved = app
            .storage
            .save_upload(&part.bytes, tenant_id, None, &part.filename)
            .await?;
        saved_uploads.push(saved);
    }

    let input_paths: Vec<_> = saved_uploads.iter().map(|u| u.path.clone()).collect();
    let input_name = parts.first().map(|p| p.filename.clone());
    let input_path = saved_uploads.first().map(|u| u.path.to_string());
    let input_size = saved_uploads.first().map(|u| u.size as i64);

    let params_json = serde_json::to_value(&params)
        .map_err(|e| ApiError::internal(format!("serialize job parameters: {e}")))?;

    let pool = app.pool.clone();
    let job = crate::db::with_conn(&pool, move |conn| {
        jobs::create(conn, tenant_id, kind, input_path, input_name, input_size, params_json)
    })
    .await?;

    let ticket = JobTicket {
        job_id: job.id,
        tenant_id,
        kind,
        input_paths,
        params,
        max_files_per_period: tenant_snapshot.plan.max_files_per_period,
    };
    app.scheduler.submit(ticket).await?;

    Ok(Json(JobResponse {
        success: true,
        job_id: job.id.to_string(),
        status: job.status,
        download_url: None,
        result_data: None,
    }))
}

/// Selects and validates the input file parts this kind requires, entirely
/// from the multipart parser's in-memory buffers. Performs no storage I/O,
/// so it can run ahead of quota admission without persisting anything a
/// rejected request would have to have written back out.
fn select_input_parts<'a>(
    kind: JobKind,
    parsed: &'a ParsedMultipart,
) -> Result<Vec<&'a UploadedPart>, ApiError> {
    let field_names: &[&str] = match kind {
        JobKind::Merge => &["files[]"],
        JobKind::Compare => &["file1", "file2"],
        _ => &["file"],
    };

    let mut parts = Vec::new();
    for name in field_names {
        parts.extend(parsed.files_named(name));
    }

    match kind {
        JobKind::Merge => {
            if parts.len() < 2 || parts.len() > 20 {
                return Err(ApiError::invalid_input("merge requires between 2 and 20 files"));
            }
        }
        JobKind::Compare => {
            if parts.len() != 2 {
                return Err(ApiError::invalid_input("compare requires exactly two files"));
            }
        }
        _ => {
            if parts.is_empty() {
                return Err(ApiError::invalid_input("missing required file part"));
            }
        }
    }

    Ok(parts)
}

fn build_params(kind: JobKind, parsed: &ParsedMultipart) -> Result<JobParameters, ApiError> {
    Ok(match kind {
        JobKind::Compress => {
            let quality: u8 = parsed
                .required_field("quality")?
                .parse()
                .map_err(|_| ApiError::invalid_input("quality must be an integer"))?;
            if quality == 0 || quality > 100 {
                return Err(ApiError::invalid_input("quality must be between 1 and 100"));
            }
            JobParameters::Compress { quality }
        }
        JobKind::Merge => JobParameters::Merge,
        JobKind::Split => JobParameters::Split {
            pages: parsed.required_field("pages")?.to_string(),
        },
        JobKind::Rotate => {
            let angle: u16 = parsed
                .required_field("angle")?
                .parse()
                .map_err(|_| ApiError::invalid_angle("angle must be an integer"))?;
            if !matches!(angle, 90 | 180 | 270) {
                return Err(ApiError::invalid_angle("angle must be one of 90, 180, 270"));
            }
            JobParameters::Rotate { angle }
        }
        JobKind::Crop => JobParameters::Crop {
            x: parse_f32(parsed, "x")?,
            y: parse_f32(parsed, "y")?,
            width: parse_f32(parsed, "width")?,
            height: parse_f32(parsed, "height")?,
        },
        JobKind::Watermark => {
            let text = parsed.required_field("text")?.to_string();
            if text.is_empty() || text.chars().count() > 100 {
                return Err(ApiError::invalid_input("text must be 1-100 characters"));
            }
            JobParameters::Watermark { text }
        }
        JobKind::Redact => JobParameters::Redact {
            pages: parsed.required_field("pages")?.to_string(),
        },
        JobKind::Sign => JobParameters::Sign {
            text: parsed.required_field("text")?.to_string(),
        },
        JobKind::Protect => {
            let password = parsed.required_field("password")?.to_string();
            if password.len() < 4 || password.len() > 50 {
                return Err(ApiError::invalid_password("password must be 4-50 characters"));
            }
            JobParameters::Protect { password }
        }
        JobKind::Unlock => JobParameters::Unlock {
            password: parsed.required_field("password")?.to_string(),
        },
        JobKind::Compare => JobParameters::Compare,
        JobKind::Ocr => JobParameters::Ocr {
            language: parsed.field("language").map(|s| s.to_string()),
        },
        JobKind::Repair => JobParameters::Repair,
        _ => JobParameters::Convert,
    })
}

fn parse_f32(parsed: &ParsedMultipart, name: &str) -> Result<f32, ApiError> {
    parsed
        .required_field(name)?
        .parse()
        .map_err(|_| ApiError::invalid_input(format!("'{name}' must be a number")))
}

/// `GET /pdf/:op/info` and `GET /pdf/convert/:format/info`
pub async fn operation_info(Path(op): Path<String>) -> Result<Json<CapabilityInfo>, ApiError> {
    let kind = op_to_kind(&op).or_else(|_| format_to_kind(&op))?;
    Ok(Json(capability_of(kind)))
}

fn capability_of(kind: JobKind) -> CapabilityInfo {
    let (accepted_formats, notes): (Vec<&'static str>, &'static str) = match kind {
        JobKind::Compress => (vec!["pdf"], "quality 1-100, higher is less compression"),
        JobKind::Merge => (vec!["pdf"], "2-20 files, merged in upload order"),
        JobKind::Split => (vec!["pdf"], "pages spec: comma-separated integers or ranges"),
        JobKind::Rotate => (vec!["pdf"], "angle must be 90, 180, or 270"),
        JobKind::Crop => (vec!["pdf"], "x, y, width, height in PDF points"),
        JobKind::Watermark => (vec!["pdf"], "text overlay, 1-100 characters"),
        JobKind::Redact => (vec!["pdf"], "pages spec selects pages to redact"),
        JobKind::Sign => (vec!["pdf"], "text signature overlay"),
        JobKind::Protect => (vec!["pdf"], "password 4-50 characters"),
        JobKind::Unlock => (vec!["pdf"], "removes password protection"),
        JobKind::Compare => (vec!["pdf"], "two files in, metadata only, no artifact"),
        JobKind::Ocr => (vec!["pdf"], "optional language hint, default eng"),
        JobKind::Repair => (vec!["pdf"], "best-effort structural repair"),
        JobKind::ConvertWordToPdf => (vec!["doc", "docx"], "requires libreoffice"),
        JobKind::ConvertExcelToPdf => (vec!["xls", "xlsx"], "requires libreoffice"),
        JobKind::ConvertPptToPdf => (vec!["ppt", "pptx"], "requires libreoffice"),
        JobKind::ConvertHtmlToPdf => (vec!["html", "htm"], "requires a headless renderer"),
        JobKind::ConvertJpgToPdf => (vec!["jpg", "jpeg", "png"], "one image per page"),
        JobKind::ConvertPdfToWord => (vec!["pdf"], "requires libreoffice"),
        JobKind::ConvertPdfToExcel => (vec!["pdf"], "requires libreoffice"),
        JobKind::ConvertPdfToPpt => (vec!["pdf"], "requires libreoffice"),
        JobKind::ConvertPdfToJpg => (vec!["pdf"], "renders one image per page"),
        JobKind::ConvertPdfToPdfa => (vec!["pdf"], "PDF/A archival conversion"),
    };
    CapabilityInfo {
        kind,
        accepted_formats,
        max_file_size_mb_default: crate::config::defaults::DEFAULT_MAX_FILE_SIZE_MB as u32,
        notes,
    }
}
