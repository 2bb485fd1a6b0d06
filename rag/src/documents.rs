use std::fs;
use std::path::Path;

use tracing::warn;
use walkdir::WalkDir;

use crate::error::{RagError, Result};

/// A file picked for upload. Only lives until it has been forwarded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Reads the selected paths. Directories are walked and filtered by `accepted_exts`;
/// files named directly are taken as-is and left for the service to validate.
pub fn collect_documents<P: AsRef<Path>>(paths: &[P], accepted_exts: &[String]) -> Result<Vec<Document>> {
    let mut docs = Vec::new();

    for path in paths {
        let path = path.as_ref();
        if path.is_dir() {
            for entry in WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
                if entry.file_type().is_file() && has_accepted_ext(entry.path(), accepted_exts) {
                    docs.push(read_document(entry.path())?);
                }
            }
        } else {
            if !has_accepted_ext(path, accepted_exts) {
                warn!(path = %path.display(), "file type not in accepted list, uploading anyway");
            }
            docs.push(read_document(path)?);
        }
    }

    if docs.is_empty() {
        return Err(RagError::NoDocuments);
    }
    Ok(docs)
}

pub fn has_accepted_ext(path: &Path, exts: &[String]) -> bool {
    let lower = path.to_string_lossy().to_lowercase();
    exts.iter().any(|ext| lower.ends_with(ext.as_str()))
}

fn read_document(path: &Path) -> Result<Document> {
    let bytes = fs::read(path).map_err(|source| RagError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    Ok(Document { name, bytes })
}
