//! Sitemaps for the exported record files.
//!
//! Both the JSON-LD sitemap and the XML (sitemaps.org) variant list exactly
//! the URLs [`ExportLayout::target`] assigns, one entry per catalogue node,
//! in graph order.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io;
use std::path::Path;

use crate::catalogue::{to_json_bytes, write_atomic};
use crate::dates::normalize_date;
use crate::error::{CatalogueError, Result};
use crate::graph::{default_context, CatalogueDocument, GraphNode};
use crate::layout::ExportLayout;

pub const SITEMAP_XMLNS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// How each entry's `dateModified` is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LastModified {
    /// Same date on every entry.
    Fixed(String),
    /// The node's `dateModified`, else its `datePublished`, else `fallback`
    /// (one date for the whole catalogue snapshot).
    FromNode { fallback: String },
}

impl LastModified {
    pub fn fixed(date: &str) -> Result<Self> {
        normalize_date(date).map(Self::Fixed).ok_or_else(|| {
            CatalogueError::InvalidConfig(format!("last-modified is not a calendar date: '{}'", date))
        })
    }

    fn for_node(&self, node: &GraphNode) -> String {
        match self {
            Self::Fixed(date) => date.clone(),
            Self::FromNode { fallback } => node
                .str_property("dateModified")
                .or_else(|| node.str_property("datePublished"))
                .unwrap_or(fallback.as_str())
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SitemapEntry {
    #[serde(rename = "@id")]
    pub url: String,
    pub name: String,
    #[serde(rename = "dateModified")]
    pub date_modified: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SitemapDocument {
    #[serde(rename = "@context")]
    pub context: Value,
    #[serde(rename = "@graph")]
    pub graph: Vec<SitemapEntry>,
}

pub fn build_sitemap(
    doc: &CatalogueDocument,
    layout: &ExportLayout,
    last_modified: &LastModified,
) -> SitemapDocument {
    let graph = doc
        .graph
        .iter()
        .map(|node| SitemapEntry {
            url: layout.target(node).url,
            name: node.name.clone(),
            date_modified: last_modified.for_node(node),
        })
        .collect();
    SitemapDocument {
        context: default_context(),
        graph,
    }
}

pub fn write_sitemap(sitemap: &SitemapDocument, path: &Path) -> Result<()> {
    let bytes = to_json_bytes(sitemap).map_err(|e| CatalogueError::write_failure(path, e))?;
    write_atomic(path, &bytes)
}

pub fn write_sitemap_xml(sitemap: &SitemapDocument, path: &Path) -> Result<()> {
    let bytes = build_sitemap_xml(sitemap).map_err(|e| CatalogueError::write_failure(path, e))?;
    write_atomic(path, &bytes)
}

/// Render `<urlset>` with one `<url>` per entry.
pub fn build_sitemap_xml(sitemap: &SitemapDocument) -> io::Result<Vec<u8>> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    emit(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    let mut urlset = BytesStart::new("urlset");
    urlset.push_attribute(("xmlns", SITEMAP_XMLNS));
    emit(&mut writer, Event::Start(urlset))?;

    for entry in &sitemap.graph {
        emit(&mut writer, Event::Start(BytesStart::new("url")))?;
        text_element(&mut writer, "loc", &entry.url)?;
        text_element(&mut writer, "lastmod", &entry.date_modified)?;
        emit(&mut writer, Event::End(BytesEnd::new("url")))?;
    }

    emit(&mut writer, Event::End(BytesEnd::new("urlset")))?;
    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    Ok(bytes)
}

fn text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> io::Result<()> {
    emit(writer, Event::Start(BytesStart::new(name)))?;
    emit(writer, Event::Text(BytesText::new(text)))?;
    emit(writer, Event::End(BytesEnd::new(name)))
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> io::Result<()> {
    writer
        .write_event(event)
        .map_err(|e| io::Error::other(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn node(id: &str, name: &str, dates: Value) -> GraphNode {
        let properties: Map<String, Value> = match dates {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        GraphNode {
            id: id.into(),
            node_type: "Dataset".into(),
            name: name.into(),
            identifier: id.into(),
            url: id.into(),
            properties,
        }
    }

    fn doc() -> CatalogueDocument {
        CatalogueDocument {
            context: default_context(),
            graph: vec![
                node(
                    "https://doi.org/10.1/a",
                    "Alpha",
                    json!({ "datePublished": "2023-01-01", "dateModified": "2024-02-02" }),
                ),
                node("https://doi.org/10.1/b", "Beta & co", json!({ "datePublished": "2022-05-05" })),
                node("https://doi.org/10.1/c", "Gamma", json!({})),
            ],
        }
    }

    fn from_node() -> LastModified {
        LastModified::FromNode {
            fallback: "2025-03-03".into(),
        }
    }

    fn layout() -> ExportLayout {
        ExportLayout::new("out", "https://cat.example.org/").unwrap()
    }

    #[test]
    fn test_entries_follow_layout() {
        let doc = doc();
        let layout = layout();
        let sitemap = build_sitemap(&doc, &layout, &from_node());
        let urls: Vec<_> = sitemap.graph.iter().map(|e| e.url.clone()).collect();
        let planned: Vec<_> = layout.plan(&doc).into_iter().map(|t| t.url).collect();
        assert_eq!(urls, planned);
        assert_eq!(sitemap.graph[1].name, "Beta & co");
    }

    #[test]
    fn test_last_modified_from_node() {
        let sitemap = build_sitemap(&doc(), &layout(), &from_node());
        let dates: Vec<_> = sitemap.graph.iter().map(|e| e.date_modified.as_str()).collect();
        assert_eq!(dates, ["2024-02-02", "2022-05-05", "2025-03-03"]);

        let value = serde_json::to_value(&sitemap).unwrap();
        for entry in value["@graph"].as_array().unwrap() {
            assert!(entry["dateModified"].is_string());
        }
    }

    #[test]
    fn test_fixed_last_modified() {
        let fixed = LastModified::fixed("2024-06-01T10:00:00Z").unwrap();
        let sitemap = build_sitemap(&doc(), &layout(), &fixed);
        assert!(sitemap
            .graph
            .iter()
            .all(|e| e.date_modified == "2024-06-01"));
        assert!(LastModified::fixed("soon").is_err());
    }

    #[test]
    fn test_xml_sitemap() {
        let mut sitemap = build_sitemap(&doc(), &layout(), &from_node());
        sitemap.graph[0].url.push_str("?a=1&b=2");
        let xml = String::from_utf8(build_sitemap_xml(&sitemap).unwrap()).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains(r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">"#));
        assert_eq!(xml.matches("<url>").count(), 3);
        assert_eq!(xml.matches("<lastmod>").count(), 3);
        assert!(xml.contains("<lastmod>2025-03-03</lastmod>"));
        assert!(xml.contains("?a=1&amp;b=2</loc>"));
    }

    #[test]
    fn test_empty_catalogue_gives_empty_sitemap() {
        let sitemap = build_sitemap(&CatalogueDocument::default(), &layout(), &from_node());
        assert!(sitemap.graph.is_empty());
        let xml = String::from_utf8(build_sitemap_xml(&sitemap).unwrap()).unwrap();
        assert_eq!(xml.matches("<url>").count(), 0);
    }
}
