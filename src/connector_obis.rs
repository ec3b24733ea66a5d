//! OBIS IPT RSS connector.
//!
//! An IPT installation publishes its resources as an RSS 2.0 feed with an
//! `ipt:` namespace for the EML and Darwin Core Archive links. The whole
//! feed is one request; every `<item>` becomes a [`RawRecord`] tagged
//! [`SOURCE_OBIS`] with the keys `title`, `link`, `description`, `pubDate`,
//! `eml`, `dwca` and `guid` (only those present).

use quick_xml::events::Event;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::HarvestConfig;
use crate::error::{CatalogueError, Result};
use crate::http::{build_client, send_with_retry, RetryPolicy};
use crate::models::{RawRecord, SOURCE_OBIS};

/// Item children copied into the raw record, by local name.
const ITEM_FIELDS: &[&str] = &["title", "link", "description", "pubDate", "eml", "dwca", "guid"];

pub struct ObisFeed {
    client: reqwest::Client,
    url: String,
    retry: RetryPolicy,
}

impl ObisFeed {
    pub fn from_config(config: &HarvestConfig, url: &str) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            url: url.to_string(),
            retry: RetryPolicy::from_config(config),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch and parse the feed. Any failure is `SourceUnavailable`.
    pub async fn fetch(&self) -> Result<Vec<RawRecord>> {
        let response = send_with_retry(&self.url, &self.retry, || {
            self.client
                .get(&self.url)
                .header("Accept", "application/rss+xml, application/xml, text/xml")
        })
        .await?;

        let body = response
            .bytes()
            .await
            .map_err(|e| CatalogueError::source_unavailable(&self.url, e))?;

        let records = parse_rss(&body)
            .map_err(|reason| CatalogueError::source_unavailable(&self.url, reason))?;
        debug!(url = %self.url, items = records.len(), "parsed IPT feed");
        Ok(records)
    }
}

/// Extract the `<item>` entries of an RSS document.
pub fn parse_rss(xml: &[u8]) -> std::result::Result<Vec<RawRecord>, String> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut records = Vec::new();
    let mut item: Option<Map<String, Value>> = None;
    let mut field: Option<&'static str> = None;
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = e.local_name();
                if name.as_ref() == b"item" {
                    item = Some(Map::new());
                } else if item.is_some() && field.is_none() {
                    field = ITEM_FIELDS
                        .iter()
                        .copied()
                        .find(|f| f.as_bytes() == name.as_ref());
                    text.clear();
                }
            }
            Ok(Event::Text(t)) => {
                if field.is_some() {
                    let unescaped = t.unescape().map_err(|e| e.to_string())?;
                    text.push_str(&unescaped);
                }
            }
            Ok(Event::CData(c)) => {
                if field.is_some() {
                    text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Ok(Event::End(e)) => {
                let name = e.local_name();
                if name.as_ref() == b"item" {
                    if let Some(fields) = item.take() {
                        records.push(RawRecord::new(SOURCE_OBIS, Value::Object(fields)));
                    }
                    field = None;
                } else if let Some(current) = field {
                    if current.as_bytes() == name.as_ref() {
                        let value = text.trim();
                        if let (Some(fields), false) = (item.as_mut(), value.is_empty()) {
                            fields.insert(current.to_string(), Value::String(value.to_string()));
                        }
                        field = None;
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "invalid RSS at byte {}: {}",
                    reader.buffer_position(),
                    e
                ))
            }
            _ => {}
        }
        buf.clear();
    }

    if item.is_some() {
        return Err("feed ended inside an <item>".to_string());
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:ipt="http://ipt.gbif.org/" xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <title>OBIS IPT</title>
    <link>https://ipt.obis.org/bioecoocean</link>
    <atom:link href="https://ipt.obis.org/bioecoocean/rss.do" rel="self"/>
    <item>
      <title>Benthic survey &amp; grab samples</title>
      <link>https://ipt.obis.org/bioecoocean/resource?r=benthic</link>
      <description><![CDATA[<p>Macrobenthos from <b>grab</b> samples.</p>]]></description>
      <pubDate>Tue, 14 May 2024 09:12:00 +0000</pubDate>
      <ipt:eml>https://ipt.obis.org/bioecoocean/eml.do?r=benthic</ipt:eml>
      <ipt:dwca>https://ipt.obis.org/bioecoocean/archive.do?r=benthic</ipt:dwca>
      <guid isPermaLink="false">benthic/v1.2</guid>
    </item>
    <item>
      <title>Plankton counts</title>
      <link>https://ipt.obis.org/bioecoocean/resource?r=plankton</link>
      <description></description>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parses_items_only() {
        let records = parse_rss(FEED.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.source == SOURCE_OBIS));

        let first = &records[0];
        assert_eq!(first.str_at(&["title"]), Some("Benthic survey & grab samples"));
        assert_eq!(
            first.str_at(&["eml"]),
            Some("https://ipt.obis.org/bioecoocean/eml.do?r=benthic")
        );
        assert_eq!(
            first.str_at(&["dwca"]),
            Some("https://ipt.obis.org/bioecoocean/archive.do?r=benthic")
        );
        assert_eq!(first.str_at(&["guid"]), Some("benthic/v1.2"));
        assert_eq!(
            first.str_at(&["description"]),
            Some("<p>Macrobenthos from <b>grab</b> samples.</p>")
        );
        assert_eq!(first.str_at(&["pubDate"]), Some("Tue, 14 May 2024 09:12:00 +0000"));
    }

    #[test]
    fn test_empty_children_are_omitted() {
        let records = parse_rss(FEED.as_bytes()).unwrap();
        assert!(records[1].get(&["description"]).is_none());
        assert!(records[1].get(&["eml"]).is_none());
    }

    #[test]
    fn test_channel_without_items() {
        let xml = r#"<rss><channel><title>empty</title><link>https://x</link></channel></rss>"#;
        assert!(parse_rss(xml.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_broken_feed_is_an_error() {
        assert!(parse_rss(b"<rss><channel><item><title>x</title>").is_err());
        assert!(parse_rss(b"<rss><channel></item></channel></rss>").is_err());
    }
}
