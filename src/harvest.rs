//! Harvest stage: source → mapper → assembler → catalogue file.
//!
//! The catalogue is written only after every page (and the optional IPT
//! feed) has been read. A source failure at any point leaves the previous
//! catalogue file untouched.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::catalogue::write_catalogue;
use crate::config::HarvestConfig;
use crate::connector_obis::ObisFeed;
use crate::connector_zenodo::ZenodoClient;
use crate::graph::{CatalogueDocument, GraphAssembler};
use crate::mapper::map_record;
use crate::models::RawRecord;
use crate::source::{collect_records, PageSource};

/// Counters printed after a harvest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestStats {
    pub pages_fetched: u32,
    pub records_received: usize,
    pub records_skipped: usize,
    pub duplicates_dropped: usize,
    pub nodes_written: usize,
}

/// Map and assemble raw records in arrival order.
///
/// Records the mapper or the assembler rejects are skipped; duplicates are
/// dropped. Neither aborts. Any other error is returned as is.
pub fn assemble(raws: &[RawRecord]) -> crate::error::Result<(CatalogueDocument, HarvestStats)> {
    let mut assembler = GraphAssembler::new();
    let mut unmapped = 0;

    for raw in raws {
        let record = match map_record(raw) {
            Ok(record) => record,
            Err(e) if e.is_recoverable() => {
                warn!(source = %raw.source, error = %e, "skipping record");
                unmapped += 1;
                continue;
            }
            Err(e) => return Err(e),
        };
        // rejections are logged and counted by the assembler
        if let Err(e) = assembler.push(&record) {
            if !e.is_recoverable() {
                return Err(e);
            }
        }
    }

    let (doc, assembly) = assembler.finish();
    let stats = HarvestStats {
        pages_fetched: 0,
        records_received: raws.len(),
        records_skipped: unmapped + assembly.rejected,
        duplicates_dropped: assembly.duplicates,
        nodes_written: doc.graph.len(),
    };
    Ok((doc, stats))
}

/// Fetch a collection, then the IPT feed if given, and build the catalogue
/// without writing it. Any source failure fails the whole harvest.
pub async fn harvest(
    source: &dyn PageSource,
    collection: &str,
    max_pages: Option<u32>,
    feed: Option<&ObisFeed>,
) -> crate::error::Result<(CatalogueDocument, HarvestStats)> {
    let mut collected = collect_records(source, collection, max_pages).await?;
    info!(
        endpoint = source.endpoint(),
        collection,
        pages = collected.pages_fetched,
        records = collected.records.len(),
        "collection harvested"
    );

    // appended last, so primary-source records win identifier collisions
    if let Some(feed) = feed {
        let items = feed.fetch().await?;
        info!(url = feed.url(), items = items.len(), "IPT feed harvested");
        collected.records.extend(items);
    }

    let (doc, mut stats) = assemble(&collected.records)?;
    stats.pages_fetched = collected.pages_fetched;
    Ok((doc, stats))
}

/// Run the harvest stage and write the catalogue.
///
/// `include_obis` gates the IPT feed selected by [`HarvestConfig::obis_feed`].
pub async fn run_harvest(
    config: &HarvestConfig,
    max_pages: Option<u32>,
    include_obis: bool,
) -> Result<HarvestStats> {
    let client = ZenodoClient::from_config(config)?;
    let feed = match config.obis_feed() {
        Some(url) if include_obis => Some(ObisFeed::from_config(config, url)?),
        _ => None,
    };

    let (doc, stats) = harvest(&client, &config.community, max_pages, feed.as_ref())
        .await
        .with_context(|| format!("harvest of community '{}' failed", config.community))?;

    write_catalogue(&doc, &config.output)
        .with_context(|| format!("could not write {}", config.output.display()))?;
    info!(
        output = %config.output.display(),
        nodes = stats.nodes_written,
        "catalogue written"
    );

    println!("harvest {}", config.community);
    println!("  pages fetched: {}", stats.pages_fetched);
    println!("  records received: {}", stats.records_received);
    println!("  records skipped: {}", stats.records_skipped);
    println!("  duplicates dropped: {}", stats.duplicates_dropped);
    println!("  nodes written: {}", stats.nodes_written);
    println!("ok");

    Ok(stats)
}
