//! Catalogue persistence.
//!
//! [`write_catalogue`] serializes a whole [`CatalogueDocument`] in memory and
//! then replaces the target file atomically (temp file in the same directory,
//! then rename), so readers never observe a truncated catalogue.
//! [`read_catalogue`] is the entry point for the export stage and rejects
//! anything that is not a valid catalogue as `CatalogueUnreadable`.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

use crate::error::{CatalogueError, Result};
use crate::graph::CatalogueDocument;

/// Serialize a document the way every output file is serialized.
pub fn to_json_bytes<T: serde::Serialize>(value: &T) -> std::io::Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Replace `path` with `bytes`. Parent directories are created as needed.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(|e| CatalogueError::write_failure(parent, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| CatalogueError::write_failure(path, e))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.flush())
        .map_err(|e| CatalogueError::write_failure(path, e))?;
    tmp.persist(path)
        .map_err(|e| CatalogueError::write_failure(path, e.error))?;
    Ok(())
}

/// Write the catalogue to `path`, overwriting any previous version.
pub fn write_catalogue(doc: &CatalogueDocument, path: &Path) -> Result<()> {
    let bytes = to_json_bytes(doc).map_err(|e| CatalogueError::write_failure(path, e))?;
    write_atomic(path, &bytes)
}

/// Read and validate a catalogue file.
///
/// Fails when the file is missing or not JSON, lacks `@context`/`@graph`,
/// has a node without a non-empty `@id`, `@type`, `name`, `identifier` or
/// `url`, or repeats an `@id`.
pub fn read_catalogue(path: &Path) -> Result<CatalogueDocument> {
    let content =
        std::fs::read_to_string(path).map_err(|e| CatalogueError::unreadable(path, e))?;
    parse_catalogue(&content).map_err(|reason| CatalogueError::unreadable(path, reason))
}

/// Calendar date (UTC) of the catalogue file's last modification.
pub fn catalogue_date(path: &Path) -> Result<String> {
    let modified = std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map_err(|e| CatalogueError::unreadable(path, e))?;
    Ok(DateTime::<Utc>::from(modified).format("%Y-%m-%d").to_string())
}

fn parse_catalogue(content: &str) -> std::result::Result<CatalogueDocument, String> {
    let doc: CatalogueDocument = serde_json::from_str(content).map_err(|e| e.to_string())?;

    let mut seen = HashSet::new();
    for (index, node) in doc.graph.iter().enumerate() {
        if let Some(field) = node.missing_mandatory() {
            return Err(format!("node {} has an empty {}", index, field));
        }
        if !seen.insert(node.id.as_str()) {
            return Err(format!("node {} repeats @id {}", index, node.id));
        }
    }
    Ok(doc)
}
