//! Tenant-isolated storage tree: `uploads/`, `downloads/`, `temp/` under a
//! single configured root. Every operation resolves its path argument
//! against the root and refuses anything that would canonicalize outside
//! it, following the grounding repo's upload idiom in
//! `pageserver/src/tenant/remote_timeline_client/upload.rs` (write, fsync,
//! atomic rename), adapted here to a local filesystem instead of S3.

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use sha2::{Digest, Sha256};

use utils::id::{JobId, TenantId};
use utils::mime_sniff;

use crate::error::ApiError;

const FORBIDDEN_FILENAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

#[derive(Debug, Clone)]
pub struct SavedUpload {
    pub path: Utf8PathBuf,
    pub size: u64,
    pub mime: &'static str,
    pub sha256: String,
}

#[derive(Debug, Clone)]
pub struct StorageService {
    root: Utf8PathBuf,
}

impl StorageService {
    /// Creates `uploads/`, `downloads/`, `temp/` under `root` if absent.
    pub fn new(root: Utf8PathBuf) -> anyhow::Result<Self> {
        std::fs::create_dir_all(root.join("uploads"))?;
        std::fs::create_dir_all(root.join("downloads"))?;
        std::fs::create_dir_all(root.join("temp"))?;
        Ok(StorageService { root })
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Rejects a caller-supplied filename containing any traversal or
    /// reserved separator character, after stripping to its basename. The
    /// extension (the suffix from the last `.`) is preserved by callers.
    pub fn validate_filename(name: &str) -> Result<(), ApiError> {
        let base = Utf8Path::new(name)
            .file_name()
            .ok_or_else(|| ApiError::invalid_input("missing filename"))?;
        if base == ".." || base == "." {
            return Err(ApiError::invalid_input("invalid filename"));
        }
        if base.contains(FORBIDDEN_FILENAME_CHARS) {
            return Err(ApiError::invalid_input("filename contains illegal characters"));
        }
        Ok(())
    }

    fn extension_of(name: &str) -> String {
        Utf8Path::new(name)
            .extension()
            .map(|e| format!(".{e}"))
            .unwrap_or_default()
    }

    /// Resolves `relative` against the storage root and asserts the result
    /// canonicalizes to a descendant of it. Rejects any literal `..`
    /// component outright so the check also covers paths that do not exist
    /// on disk yet (new write targets), where a round-trip `canonicalize`
    /// can't run end to end.
    fn resolve(&self, relative: &Utf8Path) -> Result<Utf8PathBuf, ApiError> {
        for component in relative.components() {
            match component {
                Utf8Component::ParentDir | Utf8Component::RootDir | Utf8Component::Prefix(_) => {
                    return Err(ApiError::path_escape("path escapes storage root"));
                }
                _ => {}
            }
        }

        let candidate = self.root.join(relative);
        if let Ok(canonical_candidate) = candidate.canonicalize_utf8() {
            let canonical_root = self
                .root
                .canonicalize_utf8()
                .map_err(|e| ApiError::internal(format!("canonicalize storage root: {e}")))?;
            if !canonical_candidate.starts_with(&canonical_root) {
                return Err(ApiError::path_escape("path escapes storage root"));
            }
        }
        Ok(candidate)
    }

    /// Validates `path` (an absolute path previously returned by this
    /// service) as still resolving under the root. Used by callers holding
    /// a stored `Job.input_path`/`output_path` before reading or deleting it.
    pub fn check_within_root(&self, path: &Utf8Path) -> Result<(), ApiError> {
        let canonical_root = self
            .root
            .canonicalize_utf8()
            .map_err(|e| ApiError::internal(format!("canonicalize storage root: {e}")))?;
        let canonical = path
            .canonicalize_utf8()
            .map_err(|_| ApiError::path_escape("path escapes storage root"))?;
        if !canonical.starts_with(&canonical_root) {
            return Err(ApiError::path_escape("path escapes storage root"));
        }
        Ok(())
    }

    pub fn upload_dir(&self, tenant_id: TenantId, job_id: Option<JobId>) -> Utf8PathBuf {
        let mut dir = Utf8PathBuf::from("uploads").join(tenant_id.to_string());
        if let Some(job_id) = job_id {
            dir = dir.join(job_id.to_string());
        }
        dir
    }

    pub fn download_dir(&self, tenant_id: TenantId, job_id: JobId) -> Utf8PathBuf {
        Utf8PathBuf::from("downloads")
            .join(tenant_id.to_string())
            .join(job_id.to_string())
    }

    /// Writes `data` into a newly created file under
    /// `uploads/<tenant_id>/[<job_id>/]<uuid><ext>` and returns its
    /// recorded size, sniffed MIME type, and SHA-256 digest.
    pub async fn save_upload(
        &self,
        data: &[u8],
        tenant_id: TenantId,
        job_id: Option<JobId>,
        original_name: &str,
    ) -> Result<SavedUpload, ApiError> {
        Self::validate_filename(original_name)?;
        let ext = Self::extension_of(original_name);
        let filename = format!("{}{ext}", uuid::Uuid::new_v4());

        let relative_dir = self.upload_dir(tenant_id, job_id);
        let relative_path = relative_dir.join(&filename);
        let abs_path = self.resolve(&relative_path)?;

        tokio::fs::create_dir_all(abs_path.parent().expect("joined path has a parent")).await?;
        write_atomically(&abs_path, data).await?;

        let mut hasher = Sha256::new();
        hasher.update(data);
        let sha256 = hex::encode(hasher.finalize());

        Ok(SavedUpload {
            path: abs_path,
            size: data.len() as u64,
            mime: mime_sniff::sniff(data),
            sha256,
        })
    }

    /// Moves `temp_path` into `downloads/<tenant_id>/<job_id>/<display_name>`,
    /// falling back to copy-then-unlink when `rename` crosses a filesystem
    /// boundary. Returns the final absolute path.
    pub async fn finalize_output(
        &self,
        temp_path: &Utf8Path,
        tenant_id: TenantId,
        job_id: JobId,
        display_name: &str,
    ) -> Result<Utf8PathBuf, ApiError> {
        self.check_within_root(temp_path)?;
        Self::validate_filename(display_name)?;

        let relative = self.download_dir(tenant_id, job_id).join(display_name);
        let dest = self.resolve(&relative)?;
        tokio::fs::create_dir_all(dest.parent().expect("joined path has a parent")).await?;

        if let Err(e) = tokio::fs::rename(temp_path, &dest).await {
            // `rename` only fails on a same-filesystem move for reasons a
            // fallback copy wouldn't fix either (permissions, missing
            // source); a cross-device move is the one case copy+unlink
            // recovers from, and it is cheap to just always try it here.
            tokio::fs::copy(temp_path, &dest).await.map_err(|_| e)?;
            tokio::fs::remove_file(temp_path).await?;
        }
        Ok(dest)
    }

    /// Moves every path in `temp_paths` into the job's download directory,
    /// naming each with `naming_fn`, preserving input order in the returned
    /// vector (significant for split output enumeration).
    pub async fn finalize_many(
        &self,
        temp_paths: &[Utf8PathBuf],
        tenant_id: TenantId,
        job_id: JobId,
        naming_fn: impl Fn(usize) -> String,
    ) -> Result<Vec<Utf8PathBuf>, ApiError> {
        let mut out = Vec::with_capacity(temp_paths.len());
        for (i, temp_path) in temp_paths.iter().enumerate() {
            let name = naming_fn(i);
            out.push(self.finalize_output(temp_path, tenant_id, job_id, &name).await?);
        }
        Ok(out)
    }

    /// Deletes a single path, idempotently: a missing file is not an error,
    /// since cleanup and the scheduler may race to remove the same path.
    pub async fn delete(&self, path: &Utf8Path) -> Result<(), ApiError> {
        self.check_within_root_or_missing(path)?;
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn check_within_root_or_missing(&self, path: &Utf8Path) -> Result<(), ApiError> {
        if !path.exists() {
            return Ok(());
        }
        self.check_within_root(path)
    }

    /// Removes the tenant's entire uploads and downloads subtree. Used by
    /// `DELETE /user/history/clear-history` and tenant offboarding.
    pub async fn delete_tenant(&self, tenant_id: TenantId) -> Result<(), ApiError> {
        for root in ["uploads", "downloads"] {
            let relative = Utf8PathBuf::from(root).join(tenant_id.to_string());
            let abs = self.resolve(&relative)?;
            match tokio::fs::remove_dir_all(&abs).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Allocates a fresh path under `temp/` for a processor to write into.
    pub fn new_temp_path(&self, ext: &str) -> Utf8PathBuf {
        self.root.join("temp").join(format!("{}{ext}", uuid::Uuid::new_v4()))
    }

    /// Creates and returns a fresh, empty directory under `temp/` for a
    /// single job's processor to use as its output working directory.
    pub async fn new_temp_dir(&self) -> Result<Utf8PathBuf, ApiError> {
        let dir = self.root.join("temp").join(uuid::Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }
}

async fn write_atomically(dest: &Utf8Path, data: &[u8]) -> std::io::Result<()> {
    let tmp = dest.with_extension("part");
    tokio::fs::write(&tmp, data).await?;
    tokio::fs::rename(&tmp, dest).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_traversal_filenames() {
        assert!(StorageService::validate_filename("../etc/passwd").is_err());
        assert!(StorageService::validate_filename("a/b.pdf").is_err());
        assert!(StorageService::validate_filename("report?.pdf").is_err());
    }

    #[test]
    fn accepts_plain_filenames() {
        assert!(StorageService::validate_filename("report.pdf").is_ok());
        assert!(StorageService::validate_filename("compressed_report.pdf").is_ok());
    }

    #[tokio::test]
    async fn resolve_rejects_parent_dir_components() {
        let tmp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();
        let storage = StorageService::new(root).unwrap();
        let err = storage
            .resolve(Utf8Path::new("uploads/1/../../etc/passwd"))
            .unwrap_err();
        assert_eq!(err.kind(), docflow_api::ErrorKind::PathEscape);
    }
}
