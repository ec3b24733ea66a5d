//! End-to-end properties of the harvest → export pipeline, driven by an
//! in-memory page source.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use tempfile::TempDir;

use metadata_catalogue::catalogue::{read_catalogue, write_catalogue};
use metadata_catalogue::error::Result;
use metadata_catalogue::export::{export_records, exported_node};
use metadata_catalogue::graph::CatalogueDocument;
use metadata_catalogue::harvest::{harvest, HarvestStats};
use metadata_catalogue::layout::ExportLayout;
use metadata_catalogue::models::{RawRecord, SOURCE_ZENODO};
use metadata_catalogue::sitemap::{build_sitemap, LastModified};
use metadata_catalogue::source::{PageSource, SourcePage, PAGE_SIZE};

const BASE_URL: &str = "https://catalogue.example.org/records";

struct FixedPages {
    pages: Vec<Vec<Value>>,
    calls: AtomicU32,
}

impl FixedPages {
    fn new(pages: Vec<Vec<Value>>) -> Self {
        Self {
            pages,
            calls: AtomicU32::new(0),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageSource for FixedPages {
    fn endpoint(&self) -> &str {
        "fixed"
    }

    async fn fetch_page(&self, _collection: &str, page: u32, _size: usize) -> Result<SourcePage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let hits = self.pages.get(page as usize - 1).cloned().unwrap_or_default();
        Ok(SourcePage {
            records: hits
                .into_iter()
                .map(|hit| RawRecord::new(SOURCE_ZENODO, hit))
                .collect(),
            has_more: (page as usize) < self.pages.len(),
        })
    }
}

fn hit(recid: u32) -> Value {
    let kind = if recid % 3 == 0 { "software" } else { "dataset" };
    let mut metadata = json!({
        "title": format!("Survey {}", recid),
        "description": format!("<p>Station <b>{}</b></p>", recid),
        "publication_date": "2024-01-15",
        "resource_type": { "type": kind },
        "creators": [{ "name": "Doe, Jane" }, { "name": format!("Author {}", recid) }],
        "keywords": ["ocean", "ocean", format!("k{}", recid % 4)],
        "license": { "id": "cc-by-4.0" },
    });
    // every record after the first is part of record 1
    if recid > 1 {
        metadata["related_identifiers"] = json!([
            { "identifier": "10.5281/zenodo.1", "relation": "isPartOf", "scheme": "doi" },
            { "identifier": "10.1000/outside", "relation": "cites", "scheme": "doi" }
        ]);
    }
    json!({
        "id": recid,
        "doi": format!("10.5281/zenodo.{}", recid),
        "updated": "2024-02-01T08:00:00+00:00",
        "links": { "self_html": format!("https://zenodo.org/records/{}", recid) },
        "metadata": metadata,
    })
}

fn pages_of(total: u32) -> Vec<Vec<Value>> {
    let ids: Vec<u32> = (1..=total).collect();
    ids.chunks(PAGE_SIZE).map(|c| c.iter().copied().map(hit).collect()).collect()
}

async fn harvest_all(source: &FixedPages, max_pages: Option<u32>) -> (CatalogueDocument, HarvestStats) {
    harvest(source, "bioecoocean", max_pages, None).await.unwrap()
}

#[tokio::test]
async fn test_idempotent_harvest_is_byte_identical() {
    let tmp = TempDir::new().unwrap();
    let source = FixedPages::new(pages_of(40));

    let (first, _) = harvest_all(&source, None).await;
    write_catalogue(&first, &tmp.path().join("a.jsonld")).unwrap();
    let (second, _) = harvest_all(&source, None).await;
    write_catalogue(&second, &tmp.path().join("b.jsonld")).unwrap();

    let a = std::fs::read(tmp.path().join("a.jsonld")).unwrap();
    let b = std::fs::read(tmp.path().join("b.jsonld")).unwrap();
    assert_eq!(a, b);
}

#[tokio::test]
async fn test_sitemap_entries_match_exported_files() {
    let tmp = TempDir::new().unwrap();
    let (doc, _) = harvest_all(&FixedPages::new(pages_of(30)), None).await;
    let layout = ExportLayout::new(tmp.path().join("out"), BASE_URL).unwrap();

    let report = export_records(&doc, &layout).unwrap();
    let sitemap = build_sitemap(&doc, &layout, &LastModified::FromNode {
        fallback: "2024-12-31".into(),
    });
    assert_eq!(sitemap.graph.len(), report.files_written());

    let written: HashMap<&str, &std::path::Path> = report
        .targets
        .iter()
        .map(|t| (t.url.as_str(), t.file_path.as_path()))
        .collect();
    for entry in &sitemap.graph {
        let path = written
            .get(entry.url.as_str())
            .unwrap_or_else(|| panic!("no exported file for {}", entry.url));
        assert!(path.is_file());

        let relative = entry.url.strip_prefix(&format!("{}/", BASE_URL)).unwrap();
        assert_eq!(*path, layout.out_dir().join(relative));

        let exported = read_catalogue(path).unwrap();
        assert_eq!(exported.graph[0].id, entry.url);
        assert_eq!(exported.graph[0].name, entry.name);
    }
}

#[tokio::test]
async fn test_export_round_trip_reproduces_graph() {
    let tmp = TempDir::new().unwrap();
    let (doc, _) = harvest_all(&FixedPages::new(pages_of(12)), None).await;
    let layout = ExportLayout::new(tmp.path(), BASE_URL).unwrap();
    let report = export_records(&doc, &layout).unwrap();

    // undo the @id rewriting with the inverse mapping
    let back: HashMap<&str, &str> = report
        .targets
        .iter()
        .map(|t| (t.url.as_str(), t.node_id.as_str()))
        .collect();

    let mut reassembled = Vec::new();
    for target in &report.targets {
        let file = read_catalogue(&target.file_path).unwrap();
        assert_eq!(file.context, doc.context);
        reassembled.extend(file.graph.iter().map(|node| exported_node(node, &back)));
    }

    let mut original = doc.graph.clone();
    original.sort_by(|a, b| a.id.cmp(&b.id));
    reassembled.sort_by(|a, b| a.id.cmp(&b.id));
    assert_eq!(reassembled, original);

    // the exported form really was rewritten
    let child = read_catalogue(&report.targets[1].file_path).unwrap();
    assert_eq!(
        child.graph[0].properties["isPartOf"][0]["@id"],
        json!(report.targets[0].url)
    );
    assert_eq!(
        child.graph[0].properties["citation"][0]["@id"],
        json!("https://doi.org/10.1000/outside")
    );
}

#[tokio::test]
async fn test_node_ids_are_unique() {
    let mut pages = pages_of(25);
    // same record again under the same DOI, and once with the DOI as a URL
    pages[0][24] = hit(3);
    let mut variant = hit(4);
    variant["doi"] = json!("https://doi.org/10.5281/ZENODO.4");
    pages.push(vec![variant]);

    let (doc, stats) = harvest_all(&FixedPages::new(pages), None).await;
    let ids: HashSet<&str> = doc.graph.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids.len(), doc.graph.len());
    assert_eq!(stats.duplicates_dropped, 2);
    assert_eq!(doc.graph.len(), 24);
}

#[tokio::test]
async fn test_mandatory_fields_present() {
    let mut pages = pages_of(5);
    pages[0][2]["metadata"] = json!({});
    pages[0][3] = json!({ "id": 990 });

    let (doc, _) = harvest_all(&FixedPages::new(pages), None).await;
    assert_eq!(doc.graph.len(), 5);
    for node in &doc.graph {
        assert_eq!(node.missing_mandatory(), None, "{:?}", node);
    }
    let bare = doc.graph.iter().find(|n| n.id.ends_with("/990")).unwrap();
    assert_eq!(bare.name, "Record https://zenodo.org/records/990");
    assert_eq!(bare.node_type, "CreativeWork");
}

#[tokio::test]
async fn test_full_page_then_empty_page_stops_after_two_fetches() {
    let mut pages = pages_of(25);
    pages.push(Vec::new());
    pages.push(pages_of(1).remove(0));
    let source = FixedPages::new(pages);

    let (doc, stats) = harvest_all(&source, None).await;
    assert_eq!(source.calls(), 2);
    assert_eq!(stats.pages_fetched, 2);
    assert_eq!(doc.graph.len(), 25);
}

#[tokio::test]
async fn test_record_without_identifier_is_skipped() {
    let mut pages = pages_of(10);
    pages[0][5] = json!({ "metadata": { "title": "Orphan" } });

    let (doc, stats) = harvest_all(&FixedPages::new(pages), None).await;
    assert_eq!(stats.records_received, 10);
    assert_eq!(stats.records_skipped, 1);
    assert_eq!(doc.graph.len(), 9);
    assert!(doc.graph.iter().all(|n| n.name != "Orphan"));
}

#[tokio::test]
async fn test_max_pages_ceiling() {
    let source = FixedPages::new(pages_of(75));
    let (doc, stats) = harvest_all(&source, Some(1)).await;
    assert_eq!(source.calls(), 1);
    assert_eq!(stats.pages_fetched, 1);
    assert_eq!(doc.graph.len(), 25);

    let short = FixedPages::new(vec![(1..=7).map(hit).collect(), pages_of(25).remove(0)]);
    let (doc, _) = harvest_all(&short, Some(1)).await;
    assert_eq!(doc.graph.len(), 7);
}

#[tokio::test]
async fn test_empty_collection_is_a_valid_catalogue() {
    let tmp = TempDir::new().unwrap();
    let (doc, stats) = harvest_all(&FixedPages::new(Vec::new()), None).await;
    assert!(doc.graph.is_empty());
    assert_eq!(stats.pages_fetched, 1);

    let path = tmp.path().join("empty.jsonld");
    write_catalogue(&doc, &path).unwrap();
    assert!(read_catalogue(&path).unwrap().graph.is_empty());
}
