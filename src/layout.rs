//! Node → export file → public URL.
//!
//! The exporter and both sitemap builders take their paths and URLs from
//! [`ExportLayout::target`] and nothing else, so a sitemap entry always
//! names a file the exporter wrote.
//!
//! ```text
//! @id           https://doi.org/10.5281/zenodo.1234
//! partition     zenodo                       (includedInDataCatalog.name)
//! file          doi-org-10-5281-zenodo-1234-3f0c5e1a9b.json
//! relative      zenodo/doi-org-10-5281-zenodo-1234-3f0c5e1a9b.json
//! url           {base_url}/zenodo/doi-org-10-5281-zenodo-1234-3f0c5e1a9b.json
//! ```

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::error::{CatalogueError, Result};
use crate::graph::{CatalogueDocument, GraphNode};

/// Partition for nodes that carry no source catalogue name.
pub const FALLBACK_PARTITION: &str = "records";

const SLUG_MAX: usize = 60;
const HASH_CHARS: usize = 10;

/// Where one node is exported and under which URL it is published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTarget {
    /// Catalogue-internal `@id`.
    pub node_id: String,
    /// `<partition>/<file>`, always `/`-separated.
    pub relative_path: String,
    pub file_path: PathBuf,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct ExportLayout {
    out_dir: PathBuf,
    base_url: String,
}

impl ExportLayout {
    /// `base_url` must be an absolute http(s) URL; a trailing `/` is ignored.
    pub fn new(out_dir: impl Into<PathBuf>, base_url: &str) -> Result<Self> {
        let parsed = url::Url::parse(base_url).map_err(|e| {
            CatalogueError::InvalidConfig(format!("base URL '{}' is not absolute: {}", base_url, e))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(CatalogueError::InvalidConfig(format!(
                "base URL '{}' must use http or https",
                base_url
            )));
        }
        Ok(Self {
            out_dir: out_dir.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn target(&self, node: &GraphNode) -> ExportTarget {
        let partition = partition(node);
        let file = file_name(&node.id);
        ExportTarget {
            node_id: node.id.clone(),
            relative_path: format!("{}/{}", partition, file),
            file_path: self.out_dir.join(&partition).join(&file),
            url: format!("{}/{}/{}", self.base_url, partition, file),
        }
    }

    /// Targets for every node, in graph order.
    pub fn plan(&self, doc: &CatalogueDocument) -> Vec<ExportTarget> {
        doc.graph.iter().map(|node| self.target(node)).collect()
    }
}

/// Directory a node is exported into.
pub fn partition(node: &GraphNode) -> String {
    let slug = node.catalog_name().map(|name| slug(name, SLUG_MAX)).unwrap_or_default();
    if slug.is_empty() {
        FALLBACK_PARTITION.to_string()
    } else {
        slug
    }
}

/// `<slug>-<hash>.json` for a node id.
///
/// The slug keeps the name readable and the hash keeps it unique when two
/// ids slug to the same text.
pub fn file_name(node_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(node_id.as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    let hash = &hash[..HASH_CHARS];

    let without_scheme = node_id
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(node_id);
    let slug = slug(without_scheme, SLUG_MAX);
    if slug.is_empty() {
        format!("{}.json", hash)
    } else {
        format!("{}-{}.json", slug, hash)
    }
}

/// Lowercase ASCII alphanumerics, every other run collapsed to one `-`.
fn slug(text: &str, max: usize) -> String {
    let mut out = String::with_capacity(text.len().min(max));
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
        if out.len() >= max {
            break;
        }
    }
    out.truncate(max);
    out.trim_end_matches('-').to_string()
}
