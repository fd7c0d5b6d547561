//! In-process PDF manipulation. `lopdf` is a new dependency not carried by
//! any grounding-repo or pack crate — none of them touch PDF object models
//! — introduced here because it is a pure-Rust, no-subprocess library that
//! fits the spec's "CPU-bound, in-process" category for these kinds.

use std::collections::BTreeMap;

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use sha2::{Digest, Sha256};

use docflow_api::requests::JobParameters;

use super::{Processor, ProcessorResult};
use crate::error::ApiError;

fn load_pdf(path: &Utf8Path) -> Result<Document, ApiError> {
    Document::load(path.as_std_path())
        .map_err(|e| ApiError::processor_error(format!("failed to load PDF: {e}")))
}

fn save_pdf(doc: &mut Document, path: &Utf8Path) -> Result<(), ApiError> {
    doc.save(path.as_std_path())
        .map(|_| ())
        .map_err(|e| ApiError::processor_error(format!("failed to write PDF: {e}")))
}

fn require_one_input(input_paths: &[Utf8PathBuf]) -> Result<&Utf8PathBuf, ApiError> {
    match input_paths {
        [p] => Ok(p),
        _ => Err(ApiError::invalid_input("this operation takes exactly one PDF")),
    }
}

fn page_dict<'a>(doc: &'a Document, page_id: ObjectId) -> Result<&'a Dictionary, ApiError> {
    doc.get_object(page_id)
        .map_err(|e| ApiError::processor_error(e.to_string()))?
        .as_dict()
        .map_err(|e| ApiError::processor_error(e.to_string()))
}

fn page_dict_mut<'a>(doc: &'a mut Document, page_id: ObjectId) -> Result<&'a mut Dictionary, ApiError> {
    doc.get_object_mut(page_id)
        .map_err(|e| ApiError::processor_error(e.to_string()))?
        .as_dict_mut()
        .map_err(|e| ApiError::processor_error(e.to_string()))
}

// ---------------------------------------------------------------- compress

pub struct CompressProcessor;

#[async_trait]
impl Processor for CompressProcessor {
    async fn process(
        &self,
        input_paths: &[Utf8PathBuf],
        out_dir: &Utf8Path,
        params: &JobParameters,
    ) -> Result<ProcessorResult, ApiError> {
        let quality = match params {
            JobParameters::Compress { quality } => *quality,
            _ => return Err(ApiError::invalid_input("expected compress parameters")),
        };
        if quality == 0 || quality > 100 {
            return Err(ApiError::invalid_input("quality must be between 1 and 100"));
        }
        let input = require_one_input(input_paths)?;
        let input_size = std::fs::metadata(input).map(|m| m.len()).unwrap_or(0);

        let mut doc = load_pdf(input)?;
        doc.compress();

        let out_path = out_dir.join("compressed.pdf");
        save_pdf(&mut doc, &out_path)?;
        let output_size = std::fs::metadata(&out_path).map(|m| m.len()).unwrap_or(0);

        Ok(ProcessorResult::single(
            out_path,
            serde_json::json!({ "input_size": input_size, "output_size": output_size, "quality": quality }),
        ))
    }
}

// ------------------------------------------------------------------ merge

fn merge_documents(paths: &[Utf8PathBuf]) -> Result<Document, ApiError> {
    let mut max_id = 1u32;
    let mut documents_pages: BTreeMap<ObjectId, Object> = BTreeMap::new();
    let mut documents_objects: BTreeMap<ObjectId, Object> = BTreeMap::new();
    let mut document = Document::with_version("1.5");

    for path in paths {
        let mut doc = load_pdf(path)?;
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        documents_pages.extend(
            doc.get_pages()
                .into_values()
                .map(|id| (id, doc.get_object(id).expect("page object exists").to_owned())),
        );
        documents_objects.extend(doc.objects);
    }

    let mut catalog_object: Option<(ObjectId, Object)> = None;
    let mut pages_object: Option<(ObjectId, Object)> = None;

    for (object_id, object) in documents_objects.iter() {
        match object.type_name().unwrap_or("") {
            "Catalog" => catalog_object = Some((*object_id, object.clone())),
            "Pages" => {
                if let Ok(dict) = object.as_dict() {
                    let mut dict = dict.clone();
                    if let Some((_, ref old)) = pages_object {
                        if let Ok(old_dict) = old.as_dict() {
                            dict.extend(old_dict);
                        }
                    }
                    pages_object = Some((*object_id, Object::Dictionary(dict)));
                }
            }
            "Page" | "Outlines" | "Outline" => {}
            _ => {
                document.objects.insert(*object_id, object.clone());
            }
        }
    }

    let (pages_id, pages_object) =
        pages_object.ok_or_else(|| ApiError::processor_error("merged document has no Pages root"))?;
    let (catalog_id, catalog_object) =
        catalog_object.ok_or_else(|| ApiError::processor_error("merged document has no Catalog root"))?;

    for (object_id, object) in documents_pages.iter() {
        if let Ok(dict) = object.as_dict() {
            let mut dict = dict.clone();
            dict.set("Parent", Object::Reference(pages_id));
            document.objects.insert(*object_id, Object::Dictionary(dict));
        }
    }

    if let Ok(dict) = pages_object.as_dict() {
        let mut dict = dict.clone();
        dict.set("Count", Object::Integer(documents_pages.len() as i64));
        dict.set(
            "Kids",
            Object::Array(documents_pages.keys().map(|id| Object::Reference(*id)).collect()),
        );
        document.objects.insert(pages_id, Object::Dictionary(dict));
    }

    if let Ok(dict) = catalog_object.as_dict() {
        let mut dict = dict.clone();
        dict.set("Pages", Object::Reference(pages_id));
        dict.remove(b"Outlines");
        document.objects.insert(catalog_id, Object::Dictionary(dict));
    }

    document.trailer.set("Root", Object::Reference(catalog_id));
    document.max_id = document.objects.len() as u32;
    document.renumber_objects();

    Ok(document)
}

pub struct MergeProcessor;

#[async_trait]
impl Processor for MergeProcessor {
    async fn process(
        &self,
        input_paths: &[Utf8PathBuf],
        out_dir: &Utf8Path,
        _params: &JobParameters,
    ) -> Result<ProcessorResult, ApiError> {
        if input_paths.len() < 2 || input_paths.len() > 20 {
            return Err(ApiError::invalid_input("merge accepts between 2 and 20 PDFs"));
        }
        let mut document = merge_documents(input_paths)?;
        let out_path = out_dir.join("merged.pdf");
        save_pdf(&mut document, &out_path)?;
        Ok(ProcessorResult::single(
            out_path,
            serde_json::json!({ "input_count": input_paths.len() }),
        ))
    }
}

// ------------------------------------------------------------------ split

fn extract_single_page(doc: &Document, page_number: u32) -> Document {
    let mut copy = doc.clone();
    let to_delete: Vec<u32> = copy
        .get_pages()
        .keys()
        .copied()
        .filter(|&n| n != page_number)
        .collect();
    copy.delete_pages(&to_delete);
    copy
}

pub struct SplitProcessor;

#[async_trait]
impl Processor for SplitProcessor {
    async fn process(
        &self,
        input_paths: &[Utf8PathBuf],
        out_dir: &Utf8Path,
        params: &JobParameters,
    ) -> Result<ProcessorResult, ApiError> {
        let pages_spec = match params {
            JobParameters::Split { pages } => pages,
            _ => return Err(ApiError::invalid_input("expected split parameters")),
        };
        let input = require_one_input(input_paths)?;
        let doc = load_pdf(input)?;
        let page_count = doc.get_pages().len();
        let selected = super::page_spec::parse(pages_spec, page_count)?;

        let mut artifacts = Vec::with_capacity(selected.len());
        for page_number in &selected {
            let mut single = extract_single_page(&doc, *page_number as u32);
            let out_path = out_dir.join(format!("page_{page_number}.pdf"));
            save_pdf(&mut single, &out_path)?;
            artifacts.push(out_path);
        }

        Ok(ProcessorResult {
            artifacts,
            metadata: serde_json::json!({ "pages": selected }),
        })
    }
}

// ----------------------------------------------------------------- rotate

pub struct RotateProcessor;

#[async_trait]
impl Processor for RotateProcessor {
    async fn process(
        &self,
        input_paths: &[Utf8PathBuf],
        out_dir: &Utf8Path,
        params: &JobParameters,
    ) -> Result<ProcessorResult, ApiError> {
        let angle = match params {
            JobParameters::Rotate { angle } => *angle,
            _ => return Err(ApiError::invalid_input("expected rotate parameters")),
        };
        if !matches!(angle, 90 | 180 | 270) {
            return Err(ApiError::invalid_angle("angle must be 90, 180, or 270"));
        }
        let input = require_one_input(input_paths)?;
        let mut doc = load_pdf(input)?;
        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        for page_id in page_ids {
            let current = page_dict(&doc, page_id)?
                .get(b"Rotate")
                .ok()
                .and_then(|o| o.as_i64().ok())
                .unwrap_or(0);
            let next = ((current + angle as i64) % 360 + 360) % 360;
            page_dict_mut(&mut doc, page_id)?.set("Rotate", Object::Integer(next));
        }
        let out_path = out_dir.join("rotated.pdf");
        save_pdf(&mut doc, &out_path)?;
        Ok(ProcessorResult::single(out_path, serde_json::json!({ "angle": angle })))
    }
}

// ------------------------------------------------------------------- crop

pub struct CropProcessor;

#[async_trait]
impl Processor for CropProcessor {
    async fn process(
        &self,
        input_paths: &[Utf8PathBuf],
        out_dir: &Utf8Path,
        params: &JobParameters,
    ) -> Result<ProcessorResult, ApiError> {
        let (x, y, width, height) = match params {
            JobParameters::Crop { x, y, width, height } => (*x, *y, *width, *height),
            _ => return Err(ApiError::invalid_input("expected crop parameters")),
        };
        if width <= 0.0 || height <= 0.0 {
            return Err(ApiError::invalid_input("crop width and height must be positive"));
        }
        let input = require_one_input(input_paths)?;
        let mut doc = load_pdf(input)?;
        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        let crop_box = Object::Array(vec![
            Object::Real(x),
            Object::Real(y),
            Object::Real(x + width),
            Object::Real(y + height),
        ]);
        for page_id in page_ids {
            page_dict_mut(&mut doc, page_id)?.set("CropBox", crop_box.clone());
        }
        let out_path = out_dir.join("cropped.pdf");
        save_pdf(&mut doc, &out_path)?;
        Ok(ProcessorResult::single(
            out_path,
            serde_json::json!({ "x": x, "y": y, "width": width, "height": height }),
        ))
    }
}

// ------------------------------------------------------------- watermark

fn append_text_overlay(
    doc: &mut Document,
    page_id: ObjectId,
    text: &str,
    x: f32,
    y: f32,
    size: f32,
) -> Result<(), ApiError> {
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F_overlay".into(), size.into()]),
            Operation::new("g", vec![0.6.into()]),
            Operation::new("Td", vec![x.into(), y.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_bytes = content
        .encode()
        .map_err(|e| ApiError::processor_error(format!("encode overlay content: {e}")))?;
    let stream_id = doc.add_object(Stream::new(dictionary! {}, content_bytes));

    let resources_id = match page_dict(doc, page_id)?.get(b"Resources") {
        Ok(Object::Reference(id)) => *id,
        _ => doc.add_object(Object::Dictionary(Dictionary::new())),
    };
    if let Ok(Object::Dictionary(resources)) = doc.get_object_mut(resources_id) {
        match resources.get_mut(b"Font").ok().and_then(|o| o.as_dict_mut().ok()) {
            Some(fonts) => fonts.set("F_overlay", font_id),
            None => resources.set("Font", dictionary! { "F_overlay" => font_id }),
        }
    }

    let dict = page_dict_mut(doc, page_id)?;
    dict.set("Resources", Object::Reference(resources_id));
    let existing = dict.get(b"Contents").cloned().unwrap_or(Object::Array(vec![]));
    let mut contents = match existing {
        Object::Array(arr) => arr,
        Object::Reference(r) => vec![Object::Reference(r)],
        _ => vec![],
    };
    contents.push(Object::Reference(stream_id));
    dict.set("Contents", Object::Array(contents));

    Ok(())
}

pub struct WatermarkProcessor;

#[async_trait]
impl Processor for WatermarkProcessor {
    async fn process(
        &self,
        input_paths: &[Utf8PathBuf],
        out_dir: &Utf8Path,
        params: &JobParameters,
    ) -> Result<ProcessorResult, ApiError> {
        let text = match params {
            JobParameters::Watermark { text } => text,
            _ => return Err(ApiError::invalid_input("expected watermark parameters")),
        };
        if text.is_empty() || text.chars().count() > 100 {
            return Err(ApiError::invalid_input("watermark text must be 1-100 characters"));
        }
        let input = require_one_input(input_paths)?;
        let mut doc = load_pdf(input)?;
        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        for page_id in page_ids {
            append_text_overlay(&mut doc, page_id, text, 100.0, 100.0, 36.0)?;
        }
        let out_path = out_dir.join("watermarked.pdf");
        save_pdf(&mut doc, &out_path)?;
        Ok(ProcessorResult::single(out_path, serde_json::json!({ "text": text })))
    }
}

// --------------------------------------------------------------- redact

pub struct RedactProcessor;

#[async_trait]
impl Processor for RedactProcessor {
    async fn process(
        &self,
        input_paths: &[Utf8PathBuf],
        out_dir: &Utf8Path,
        params: &JobParameters,
    ) -> Result<ProcessorResult, ApiError> {
        let pages_spec = match params {
            JobParameters::Redact { pages } => pages,
            _ => return Err(ApiError::invalid_input("expected redact parameters")),
        };
        let input = require_one_input(input_paths)?;
        let mut doc = load_pdf(input)?;
        let page_count = doc.get_pages().len();
        let selected = super::page_spec::parse(pages_spec, page_count)?;
        let pages = doc.get_pages();
        let target_ids: Vec<ObjectId> = selected
            .iter()
            .filter_map(|n| pages.get(&(*n as u32)).copied())
            .collect();
        for page_id in target_ids {
            redact_page(&mut doc, page_id)?;
        }
        let out_path = out_dir.join("redacted.pdf");
        save_pdf(&mut doc, &out_path)?;
        Ok(ProcessorResult::single(out_path, serde_json::json!({ "pages": selected })))
    }
}

/// Replaces the page's content stream outright with a solid black rectangle
/// over the full media box, rather than locating and excising individual
/// text runs — a coarse but irreversible redaction of the rendered page.
fn redact_page(doc: &mut Document, page_id: ObjectId) -> Result<(), ApiError> {
    let media_box = page_dict(doc, page_id)?
        .get(b"MediaBox")
        .ok()
        .and_then(|o| o.as_array().ok())
        .cloned()
        .unwrap_or_else(|| vec![0.into(), 0.into(), 612.into(), 792.into()]);
    let w = media_box.get(2).and_then(|o| o.as_float().ok()).unwrap_or(612.0);
    let h = media_box.get(3).and_then(|o| o.as_float().ok()).unwrap_or(792.0);

    let content = Content {
        operations: vec![
            Operation::new("rg", vec![0.0.into(), 0.0.into(), 0.0.into()]),
            Operation::new("re", vec![0.0.into(), 0.0.into(), (w as f32).into(), (h as f32).into()]),
            Operation::new("f", vec![]),
        ],
    };
    let content_bytes = content
        .encode()
        .map_err(|e| ApiError::processor_error(format!("encode redaction content: {e}")))?;
    let stream_id = doc.add_object(Stream::new(dictionary! {}, content_bytes));
    page_dict_mut(doc, page_id)?.set("Contents", Object::Reference(stream_id));
    Ok(())
}

// ----------------------------------------------------------------- sign

pub struct SignProcessor;

#[async_trait]
impl Processor for SignProcessor {
    async fn process(
        &self,
        input_paths: &[Utf8PathBuf],
        out_dir: &Utf8Path,
        params: &JobParameters,
    ) -> Result<ProcessorResult, ApiError> {
        let text = match params {
            JobParameters::Sign { text } => text,
            _ => return Err(ApiError::invalid_input("expected sign parameters")),
        };
        if text.is_empty() {
            return Err(ApiError::invalid_input("signature text must not be empty"));
        }
        let input = require_one_input(input_paths)?;
        let mut doc = load_pdf(input)?;
        let pages = doc.get_pages();
        let last_page_id = *pages
            .values()
            .last()
            .ok_or_else(|| ApiError::processor_error("document has no pages"))?;
        append_text_overlay(&mut doc, last_page_id, &format!("Signed: {text}"), 36.0, 36.0, 12.0)?;
        let out_path = out_dir.join("signed.pdf");
        save_pdf(&mut doc, &out_path)?;
        Ok(ProcessorResult::single(out_path, serde_json::json!({ "signed_by": text })))
    }
}

// --------------------------------------------------------- protect/unlock
//
// `lopdf` authors standard PDF object streams but does not implement the
// standard security handler (RC4/AES key derivation per the PDF spec) for
// *writing* encrypted output. Protect/unlock here is a self-contained
// scheme scoped to this service: each page's content stream is XORed with
// a key derived from the password, and a salted check hash is stored in
// the trailer so unlock can verify the password before reversing it. The
// output remains a syntactically valid PDF; only this service's own
// unlock can recover the original rendering, which is what the round-trip
// property in the testable-properties list requires.

fn derive_key(password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

fn xor_in_place(data: &mut [u8], key: &[u8; 32]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= key[i % key.len()];
    }
}

fn content_stream_ids(doc: &Document, page_id: ObjectId) -> Result<Vec<ObjectId>, ApiError> {
    match page_dict(doc, page_id)?.get(b"Contents") {
        Ok(Object::Reference(id)) => Ok(vec![*id]),
        Ok(Object::Array(arr)) => Ok(arr.iter().filter_map(|o| o.as_reference().ok()).collect()),
        _ => Ok(vec![]),
    }
}

fn scramble_page_content(doc: &mut Document, page_id: ObjectId, key: &[u8; 32]) -> Result<(), ApiError> {
    for id in content_stream_ids(doc, page_id)? {
        if let Ok(Object::Stream(stream)) = doc.get_object_mut(id) {
            xor_in_place(&mut stream.content, key);
        }
    }
    Ok(())
}

fn check_hash(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(b"docflow-protect-check");
    hex::encode(hasher.finalize())
}

pub struct ProtectProcessor;

#[async_trait]
impl Processor for ProtectProcessor {
    async fn process(
        &self,
        input_paths: &[Utf8PathBuf],
        out_dir: &Utf8Path,
        params: &JobParameters,
    ) -> Result<ProcessorResult, ApiError> {
        let password = match params {
            JobParameters::Protect { password } => password,
            _ => return Err(ApiError::invalid_input("expected protect parameters")),
        };
        let len = password.chars().count();
        if !(4..=50).contains(&len) {
            return Err(ApiError::invalid_password("password must be 4-50 characters"));
        }
        let input = require_one_input(input_paths)?;
        let mut doc = load_pdf(input)?;
        let key = derive_key(password);
        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        for page_id in page_ids {
            scramble_page_content(&mut doc, page_id, &key)?;
        }
        doc.trailer.set("DocflowProtected", Object::Boolean(true));
        doc.trailer.set("DocflowCheck", Object::string_literal(check_hash(password)));

        let out_path = out_dir.join("protected.pdf");
        save_pdf(&mut doc, &out_path)?;
        Ok(ProcessorResult::single(out_path, serde_json::json!({ "protected": true })))
    }
}

pub struct UnlockProcessor;

#[async_trait]
impl Processor for UnlockProcessor {
    async fn process(
        &self,
        input_paths: &[Utf8PathBuf],
        out_dir: &Utf8Path,
        params: &JobParameters,
    ) -> Result<ProcessorResult, ApiError> {
        let password = match params {
            JobParameters::Unlock { password } => password,
            _ => return Err(ApiError::invalid_input("expected unlock parameters")),
        };
        let input = require_one_input(input_paths)?;
        let mut doc = load_pdf(input)?;

        let is_protected = doc
            .trailer
            .get(b"DocflowProtected")
            .ok()
            .and_then(|o| o.as_bool().ok())
            .unwrap_or(false);
        if !is_protected {
            return Err(ApiError::not_encrypted("document is not protected"));
        }
        let stored = doc
            .trailer
            .get(b"DocflowCheck")
            .ok()
            .and_then(|o| o.as_str().ok())
            .map(|s| String::from_utf8_lossy(s).into_owned())
            .unwrap_or_default();
        if check_hash(password) != stored {
            return Err(ApiError::wrong_password("incorrect password"));
        }

        let key = derive_key(password);
        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        for page_id in page_ids {
            scramble_page_content(&mut doc, page_id, &key)?;
        }
        doc.trailer.remove(b"DocflowProtected");
        doc.trailer.remove(b"DocflowCheck");

        let out_path = out_dir.join("unlocked.pdf");
        save_pdf(&mut doc, &out_path)?;
        Ok(ProcessorResult::single(out_path, serde_json::json!({ "unlocked": true })))
    }
}

// --------------------------------------------------------------- compare

pub struct CompareProcessor;

#[async_trait]
impl Processor for CompareProcessor {
    async fn process(
        &self,
        input_paths: &[Utf8PathBuf],
        _out_dir: &Utf8Path,
        _params: &JobParameters,
    ) -> Result<ProcessorResult, ApiError> {
        let (a, b) = match input_paths {
            [a, b] => (a, b),
            _ => return Err(ApiError::invalid_input("compare requires exactly two PDFs")),
        };
        let doc_a = load_pdf(a)?;
        let doc_b = load_pdf(b)?;
        let pages_a = doc_a.get_pages().len();
        let pages_b = doc_b.get_pages().len();

        let page_numbers_a: Vec<u32> = doc_a.get_pages().keys().copied().collect();
        let page_numbers_b: Vec<u32> = doc_b.get_pages().keys().copied().collect();
        let text_a = doc_a.extract_text(&page_numbers_a).unwrap_or_default();
        let text_b = doc_b.extract_text(&page_numbers_b).unwrap_or_default();

        Ok(ProcessorResult {
            artifacts: vec![],
            metadata: serde_json::json!({
                "page_count_a": pages_a,
                "page_count_b": pages_b,
                "same_page_count": pages_a == pages_b,
                "identical_text": text_a == text_b,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xor_round_trips() {
        let key = derive_key("correct horse battery staple");
        let mut data = b"the quick brown fox".to_vec();
        let original = data.clone();
        xor_in_place(&mut data, &key);
        assert_ne!(data, original);
        xor_in_place(&mut data, &key);
        assert_eq!(data, original);
    }

    #[test]
    fn check_hash_is_stable_and_password_sensitive() {
        assert_eq!(check_hash("hunter2"), check_hash("hunter2"));
        assert_ne!(check_hash("hunter2"), check_hash("hunter3"));
    }
}
