//! Per-record export and the export stage.
//!
//! Every catalogue node is written to its own one-node catalogue file at the
//! path chosen by [`ExportLayout`]. The node's `@id`, and every nested
//! `{"@id": ...}` that points at another catalogue node, is rewritten to the
//! exported file's public URL. References to anything outside the catalogue
//! are left untouched.
//!
//! Files that already exist under the output directory but are not part of
//! the current export are never deleted.

use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::catalogue::{catalogue_date, read_catalogue, to_json_bytes, write_atomic};
use crate::config::ExportConfig;
use crate::error::CatalogueError;
use crate::graph::{CatalogueDocument, GraphNode};
use crate::layout::{ExportLayout, ExportTarget};
use crate::sitemap::{build_sitemap, write_sitemap, write_sitemap_xml, LastModified};

/// Outcome of [`export_records`].
#[derive(Debug, Clone, Default)]
pub struct ExportReport {
    /// Targets written, in graph order.
    pub targets: Vec<ExportTarget>,
}

impl ExportReport {
    pub fn files_written(&self) -> usize {
        self.targets.len()
    }
}

/// Write one file per node. Fails on the first filesystem error.
pub fn export_records(
    doc: &CatalogueDocument,
    layout: &ExportLayout,
) -> crate::error::Result<ExportReport> {
    let targets = layout.plan(doc);
    let urls: HashMap<&str, &str> = targets
        .iter()
        .map(|t| (t.node_id.as_str(), t.url.as_str()))
        .collect();

    for (node, target) in doc.graph.iter().zip(&targets) {
        let file = CatalogueDocument {
            context: doc.context.clone(),
            graph: vec![exported_node(node, &urls)],
        };
        let bytes = to_json_bytes(&file)
            .map_err(|e| CatalogueError::write_failure(&target.file_path, e))?;
        write_atomic(&target.file_path, &bytes)?;
        debug!(id = %node.id, path = %target.relative_path, "exported node");
    }

    Ok(ExportReport { targets })
}

/// Copy of `node` with catalogue-internal references resolved to export URLs.
pub fn exported_node(node: &GraphNode, urls: &HashMap<&str, &str>) -> GraphNode {
    let mut exported = node.clone();
    if let Some(url) = urls.get(node.id.as_str()) {
        exported.id = (*url).to_string();
    }
    for value in exported.properties.values_mut() {
        rewrite_refs(value, urls);
    }
    exported
}

fn rewrite_refs(value: &mut Value, urls: &HashMap<&str, &str>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(id)) = map.get_mut("@id") {
                if let Some(url) = urls.get(id.as_str()) {
                    *id = (*url).to_string();
                }
            }
            for (key, child) in map.iter_mut() {
                if key != "@id" {
                    rewrite_refs(child, urls);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                rewrite_refs(item, urls);
            }
        }
        _ => {}
    }
}

/// Run the export stage: per-record files, then the sitemaps that list them.
pub fn run_export(config: &ExportConfig) -> Result<()> {
    let base_url = config
        .base_url
        .as_deref()
        .context("export needs a base URL (--base-url or export.base_url)")?;
    let layout = ExportLayout::new(&config.out_dir, base_url)?;
    let fixed = config.last_modified.as_deref().map(LastModified::fixed).transpose()?;

    let doc = read_catalogue(&config.input)?;
    let last_modified = match fixed {
        Some(policy) => policy,
        None => LastModified::FromNode {
            fallback: catalogue_date(&config.input)?,
        },
    };
    info!(
        input = %config.input.display(),
        nodes = doc.graph.len(),
        "exporting catalogue"
    );

    let report = export_records(&doc, &layout)
        .with_context(|| format!("export into {} failed", config.out_dir.display()))?;

    let mut sitemap_entries = 0;
    if config.sitemap.is_some() || config.sitemap_xml.is_some() {
        let sitemap = build_sitemap(&doc, &layout, &last_modified);
        sitemap_entries = sitemap.graph.len();
        if let Some(ref path) = config.sitemap {
            write_sitemap(&sitemap, path)?;
        }
        if let Some(ref path) = config.sitemap_xml {
            write_sitemap_xml(&sitemap, path)?;
        }
    }

    println!("export {}", config.input.display());
    println!("  files written: {}", report.files_written());
    println!("  sitemap entries: {}", sitemap_entries);
    println!("ok");

    Ok(())
}
