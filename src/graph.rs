//! Graph assembler and the JSON-LD catalogue document.
//!
//! The assembler accumulates [`NormalizedRecord`]s in arrival order and owns
//! the `id` → `@id` mapping. Node ids are a pure function of the record id
//! ([`node_id`]) so links stay stable across regenerations.
//!
//! ```text
//! doi:10.5281/zenodo.1   ──▶ https://doi.org/10.5281/zenodo.1
//! zenodo:42              ──▶ https://zenodo.org/records/42
//! https://ipt.obis.org/… ──▶ (unchanged)
//! anything else          ──▶ urn:record:<id>
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use tracing::warn;

use crate::error::{CatalogueError, Result};
use crate::mapper::{DOI_RESOLVER, ZENODO_RECORD_BASE};
use crate::models::NormalizedRecord;

pub const SCHEMA_ORG: &str = "https://schema.org/";

/// Shared `@context`: the default vocabulary is schema.org.
pub fn default_context() -> Value {
    json!({ "@vocab": SCHEMA_ORG })
}

/// Deterministic graph node identifier for a record id.
pub fn node_id(record_id: &str) -> String {
    if let Some(doi) = record_id.strip_prefix("doi:") {
        format!("{}{}", DOI_RESOLVER, doi)
    } else if let Some(recid) = record_id.strip_prefix("zenodo:") {
        format!("{}{}", ZENODO_RECORD_BASE, recid)
    } else if record_id.starts_with("https://") || record_id.starts_with("http://") {
        record_id.to_string()
    } else {
        format!("urn:record:{}", record_id)
    }
}

/// One entry of `@graph`.
///
/// The five mandatory properties are typed fields; everything else lives in
/// `properties` and serializes in key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@type")]
    pub node_type: String,
    pub name: String,
    pub identifier: String,
    pub url: String,
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl GraphNode {
    /// Build the node for a record. `name` falls back to `Record <identifier>`.
    pub fn from_record(record: &NormalizedRecord) -> Self {
        let mut properties = Map::new();

        if !record.description.is_empty() {
            properties.insert("description".into(), Value::from(record.description.clone()));
        }
        if let Some(date) = &record.date_published {
            properties.insert("datePublished".into(), Value::from(date.clone()));
        }
        if let Some(date) = &record.date_modified {
            properties.insert("dateModified".into(), Value::from(date.clone()));
        }
        if !record.creator.is_empty() {
            let creators = record.creator.iter().map(|c| c.to_json()).collect();
            properties.insert("creator".into(), Value::Array(creators));
        }
        if !record.keywords.is_empty() {
            properties.insert("keywords".into(), json!(record.keywords));
        }
        if let Some(license) = &record.license {
            properties.insert("license".into(), Value::from(license.clone()));
        }
        if !record.source.is_empty() {
            properties.insert(
                "includedInDataCatalog".into(),
                json!({ "@type": "DataCatalog", "name": record.source }),
            );
        }
        for relation in &record.relations {
            let target = json!({ "@id": node_id(&relation.target) });
            match properties
                .entry(relation.property.to_string())
                .or_insert_with(|| Value::Array(Vec::new()))
            {
                Value::Array(items) => items.push(target),
                other => *other = Value::Array(vec![other.take(), target]),
            }
        }
        for (key, value) in &record.extra {
            properties.entry(key.clone()).or_insert_with(|| value.clone());
        }

        let name = if record.name.trim().is_empty() {
            format!("Record {}", record.identifier)
        } else {
            record.name.clone()
        };

        Self {
            id: node_id(&record.id),
            node_type: record.record_type.to_string(),
            name,
            identifier: record.identifier.clone(),
            url: record.url.clone(),
            properties,
        }
    }

    /// Name of the mandatory property that is empty, if any.
    pub fn missing_mandatory(&self) -> Option<&'static str> {
        [
            ("@id", &self.id),
            ("@type", &self.node_type),
            ("name", &self.name),
            ("identifier", &self.identifier),
            ("url", &self.url),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(key, _)| key)
    }

    /// Source partition from `includedInDataCatalog.name`.
    pub fn catalog_name(&self) -> Option<&str> {
        self.properties
            .get("includedInDataCatalog")
            .and_then(|c| c.get("name"))
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    pub fn str_property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }
}

/// The full JSON-LD graph: shared `@context` plus ordered nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogueDocument {
    #[serde(rename = "@context")]
    pub context: Value,
    #[serde(rename = "@graph")]
    pub graph: Vec<GraphNode>,
}

impl Default for CatalogueDocument {
    fn default() -> Self {
        Self {
            context: default_context(),
            graph: Vec::new(),
        }
    }
}

/// Counters for one assembly pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblyStats {
    pub accepted: usize,
    pub duplicates: usize,
    pub rejected: usize,
}

/// Accumulates records into a [`CatalogueDocument`]. First occurrence wins.
#[derive(Debug, Default)]
pub struct GraphAssembler {
    record_ids: HashSet<String>,
    node_ids: HashSet<String>,
    nodes: Vec<GraphNode>,
    stats: AssemblyStats,
}

impl GraphAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record.
    ///
    /// Records without an `id` are rejected as `MalformedRecord`; an `id` (or
    /// derived `@id`) seen before is rejected as `DuplicateIdentifier`. Both
    /// are logged and counted, and the graph is left unchanged.
    pub fn push(&mut self, record: &NormalizedRecord) -> Result<()> {
        if record.id.trim().is_empty() {
            self.stats.rejected += 1;
            let err = CatalogueError::malformed("record has an empty id");
            warn!(error = %err, "record rejected");
            return Err(err);
        }

        let node = GraphNode::from_record(record);
        if self.record_ids.contains(&record.id) || self.node_ids.contains(&node.id) {
            self.stats.duplicates += 1;
            warn!(id = %record.id, node = %node.id, "duplicate identifier, keeping first occurrence");
            return Err(CatalogueError::DuplicateIdentifier {
                id: record.id.clone(),
            });
        }

        if let Some(field) = node.missing_mandatory() {
            self.stats.rejected += 1;
            let err = CatalogueError::malformed(format!("record {} has no {}", record.id, field));
            warn!(error = %err, "record rejected");
            return Err(err);
        }

        self.record_ids.insert(record.id.clone());
        self.node_ids.insert(node.id.clone());
        self.nodes.push(node);
        self.stats.accepted += 1;
        Ok(())
    }

    /// Finish assembly. Only the assembler builds catalogue documents.
    pub fn finish(self) -> (CatalogueDocument, AssemblyStats) {
        (
            CatalogueDocument {
                context: default_context(),
                graph: self.nodes,
            },
            self.stats,
        )
    }
}
