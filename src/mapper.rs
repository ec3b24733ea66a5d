//! Field mapper: [`RawRecord`] → [`NormalizedRecord`].
//!
//! Pure functions only. No I/O, no shared mutable state, so records can be
//! mapped in any order. Dispatch is on [`RawRecord::source`]:
//!
//! | Source | Shape |
//! |--------|-------|
//! | `zenodo` | one `hits.hits[]` element of the Zenodo records API (legacy and InvenioRDM layouts) |
//! | `obis` | one RSS `<item>` flattened by [`crate::connector_obis`] |
//!
//! # Failure policy
//!
//! Only a missing identifier is an error ([`CatalogueError::MalformedRecord`]).
//! Unknown types fall back to `CreativeWork`, unparseable dates are dropped,
//! absent creators yield an empty list.

use quick_xml::escape::resolve_html5_entity;
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::sync::OnceLock;

use crate::dates::normalize_date;
use crate::error::{CatalogueError, Result};
use crate::models::{
    lookup, non_empty_str, Creator, CreatorKind, NormalizedRecord, RawRecord, RecordType,
    Relation, SOURCE_OBIS, SOURCE_ZENODO,
};

/// Landing page base for Zenodo records without a `links` block.
pub const ZENODO_RECORD_BASE: &str = "https://zenodo.org/records/";
pub const DOI_RESOLVER: &str = "https://doi.org/";

/// Zenodo metadata key → schema.org property, copied into `extra` as-is.
const PASS_THROUGH: &[(&str, &str)] = &[
    ("version", "version"),
    ("language", "inLanguage"),
    ("access_right", "conditionsOfAccess"),
    ("publisher", "publisher"),
    ("method", "measurementTechnique"),
];

/// Lowercased license id → canonical URL.
const LICENSE_URLS: &[(&str, &str)] = &[
    ("cc-by-4.0", "https://creativecommons.org/licenses/by/4.0/"),
    ("cc-by-sa-4.0", "https://creativecommons.org/licenses/by-sa/4.0/"),
    ("cc-by-nc-4.0", "https://creativecommons.org/licenses/by-nc/4.0/"),
    ("cc-by-nc-sa-4.0", "https://creativecommons.org/licenses/by-nc-sa/4.0/"),
    ("cc-by-nd-4.0", "https://creativecommons.org/licenses/by-nd/4.0/"),
    ("cc-by-3.0", "https://creativecommons.org/licenses/by/3.0/"),
    ("cc0-1.0", "https://creativecommons.org/publicdomain/zero/1.0/"),
    ("mit", "https://opensource.org/licenses/MIT"),
    ("apache-2.0", "https://www.apache.org/licenses/LICENSE-2.0"),
    ("bsd-3-clause", "https://opensource.org/licenses/BSD-3-Clause"),
    ("gpl-3.0", "https://www.gnu.org/licenses/gpl-3.0.html"),
    ("gpl-3.0-only", "https://www.gnu.org/licenses/gpl-3.0.html"),
];

/// DataCite relation (lowercased) → schema.org property.
const RELATIONS: &[(&str, &str)] = &[
    ("ispartof", "isPartOf"),
    ("haspart", "hasPart"),
    ("isderivedfrom", "isBasedOn"),
    ("isversionof", "isBasedOn"),
    ("cites", "citation"),
    ("references", "citation"),
];

/// Map one raw record. Returns `MalformedRecord` when no identifier is usable.
pub fn map_record(raw: &RawRecord) -> Result<NormalizedRecord> {
    match raw.source.as_str() {
        SOURCE_ZENODO => map_zenodo(raw),
        SOURCE_OBIS => map_obis(raw),
        other => Err(CatalogueError::malformed(format!(
            "no field mapping for source '{}'",
            other
        ))),
    }
}

// ============ Zenodo ============

fn map_zenodo(raw: &RawRecord) -> Result<NormalizedRecord> {
    let doi = zenodo_doi(raw);
    let recid = raw
        .scalar_at(&["id"])
        .or_else(|| raw.scalar_at(&["recid"]))
        .or_else(|| raw.scalar_at(&["metadata", "recid"]));

    let id = match (&doi, &recid) {
        (Some(doi), _) => format!("doi:{}", doi),
        (None, Some(recid)) => format!("zenodo:{}", recid),
        (None, None) => {
            return Err(CatalogueError::malformed(
                "zenodo record has neither a DOI nor a record number",
            ))
        }
    };

    let doi_url = doi.as_ref().map(|d| format!("{}{}", DOI_RESOLVER, d));
    let url = raw
        .str_at(&["links", "self_html"])
        .or_else(|| raw.str_at(&["links", "html"]))
        .map(str::to_string)
        .or_else(|| recid.as_ref().map(|r| format!("{}{}", ZENODO_RECORD_BASE, r)))
        .or_else(|| doi_url.clone())
        .unwrap_or_default();

    let mut record = NormalizedRecord {
        identifier: doi_url.unwrap_or_else(|| url.clone()),
        url,
        record_type: zenodo_type(raw),
        name: raw
            .str_at(&["metadata", "title"])
            .map(str::to_string)
            .unwrap_or_default(),
        description: raw
            .str_at(&["metadata", "description"])
            .map(strip_html)
            .unwrap_or_default(),
        date_published: raw
            .str_at(&["metadata", "publication_date"])
            .and_then(normalize_date),
        date_modified: raw
            .str_at(&["updated"])
            .or_else(|| raw.str_at(&["modified"]))
            .and_then(normalize_date),
        creator: creators(raw.get(&["metadata", "creators"])),
        license: zenodo_license(raw),
        source: SOURCE_ZENODO.to_string(),
        extra: pass_through(raw),
        id,
        ..Default::default()
    };

    for field in ["keywords", "subjects"] {
        for keyword in keyword_values(raw.get(&["metadata", field])) {
            record.add_keyword(keyword);
        }
    }

    record.relations = relations(raw.array_at(&["metadata", "related_identifiers"]), &record.id);

    Ok(record)
}

fn zenodo_doi(raw: &RawRecord) -> Option<String> {
    [
        &["doi"][..],
        &["metadata", "doi"][..],
        &["pids", "doi", "identifier"][..],
    ]
    .iter()
    .filter_map(|path| raw.str_at(path))
    .find_map(normalize_doi)
}

/// Normalize a DOI: drop resolver/`doi:` prefixes and lowercase.
///
/// Returns `None` unless the remainder starts with the `10.` directory prefix.
pub fn normalize_doi(input: &str) -> Option<String> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();
    let stripped = [
        "https://doi.org/",
        "http://doi.org/",
        "https://dx.doi.org/",
        "http://dx.doi.org/",
        "doi:",
    ]
    .iter()
    .find_map(|prefix| lower.strip_prefix(prefix))
    .unwrap_or(lower.as_str())
    .trim();

    if stripped.starts_with("10.") && stripped.contains('/') {
        Some(stripped.to_string())
    } else {
        None
    }
}

fn zenodo_type(raw: &RawRecord) -> RecordType {
    if let Some(kind) = raw.str_at(&["metadata", "resource_type", "type"]) {
        return resource_type(kind, raw.str_at(&["metadata", "resource_type", "subtype"]));
    }
    if let Some(id) = raw.str_at(&["metadata", "resource_type", "id"]) {
        let (kind, sub) = match id.split_once('-') {
            Some((k, s)) => (k, Some(s)),
            None => (id, None),
        };
        return resource_type(kind, sub);
    }
    if let Some(kind) = raw.str_at(&["metadata", "upload_type"]) {
        return resource_type(kind, raw.str_at(&["metadata", "publication_type"]));
    }
    RecordType::default()
}

/// Map a Zenodo resource type/subtype pair onto the closed type set.
pub fn resource_type(kind: &str, subtype: Option<&str>) -> RecordType {
    let kind = kind.to_lowercase();
    let subtype = subtype.map(str::to_lowercase);
    match kind.as_str() {
        "dataset" => RecordType::Dataset,
        "software" => RecordType::SoftwareSourceCode,
        "publication" => match subtype.as_deref() {
            Some(
                "report" | "deliverable" | "technicalnote" | "workingpaper"
                | "datamanagementplan" | "proposal",
            ) => RecordType::Report,
            Some("book" | "section") => RecordType::Book,
            _ => RecordType::ScholarlyArticle,
        },
        "presentation" => RecordType::PresentationDigitalDocument,
        "poster" => RecordType::Poster,
        "image" => RecordType::ImageObject,
        "video" | "audiovisual" => RecordType::VideoObject,
        "lesson" => RecordType::LearningResource,
        "event" => RecordType::Event,
        "organization" => RecordType::Organization,
        _ => RecordType::CreativeWork,
    }
}

/// Flatten any creator representation into citation-ordered entries.
pub fn creators(value: Option<&Value>) -> Vec<Creator> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(creator_entry).collect(),
        Some(single) => creator_entry(single).into_iter().collect(),
        None => Vec::new(),
    }
}

fn creator_entry(value: &Value) -> Option<Creator> {
    match value {
        Value::String(_) => non_empty_str(value).map(|name| Creator {
            name: name.to_string(),
            ..Default::default()
        }),
        Value::Object(_) => {
            // InvenioRDM nests the person under `person_or_org`.
            let person = value.get("person_or_org").unwrap_or(value);
            let text = |v: &Value, key: &str| v.get(key).and_then(non_empty_str).map(str::to_string);

            let given_name = text(person, "given_name");
            let family_name = text(person, "family_name");
            let name = text(person, "name").or_else(|| match (&family_name, &given_name) {
                (Some(f), Some(g)) => Some(format!("{}, {}", f, g)),
                (Some(f), None) => Some(f.clone()),
                (None, Some(g)) => Some(g.clone()),
                (None, None) => None,
            })?;

            let kind = match person.get("type").and_then(Value::as_str) {
                Some("organizational") | Some("organization") => CreatorKind::Organization,
                _ => CreatorKind::Person,
            };

            let orcid = text(person, "orcid").or_else(|| {
                person
                    .get("identifiers")
                    .and_then(Value::as_array)?
                    .iter()
                    .find(|i| i.get("scheme").and_then(Value::as_str) == Some("orcid"))
                    .and_then(|i| text(i, "identifier"))
            });

            let affiliation = value
                .get("affiliation")
                .and_then(non_empty_str)
                .map(str::to_string)
                .or_else(|| {
                    value
                        .get("affiliations")
                        .and_then(Value::as_array)?
                        .iter()
                        .find_map(|a| text(a, "name"))
                });

            Some(Creator {
                kind,
                name,
                given_name,
                family_name,
                orcid: orcid.map(|o| orcid_url(&o)),
                affiliation,
            })
        }
        _ => None,
    }
}

fn orcid_url(orcid: &str) -> String {
    if orcid.starts_with("http://") || orcid.starts_with("https://") {
        orcid.to_string()
    } else {
        format!("https://orcid.org/{}", orcid)
    }
}

/// Keyword-like strings from a list of strings or subject objects.
fn keyword_values(value: Option<&Value>) -> Vec<&str> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(keyword_of).collect(),
        Some(v) => keyword_of(v).into_iter().collect(),
        None => Vec::new(),
    }
}

fn keyword_of(value: &Value) -> Option<&str> {
    match value {
        Value::String(_) => non_empty_str(value),
        Value::Object(_) => ["subject", "term"]
            .iter()
            .find_map(|k| value.get(*k).and_then(non_empty_str)),
        _ => None,
    }
}

fn zenodo_license(raw: &RawRecord) -> Option<String> {
    let from_value = |v: &Value| -> Option<String> {
        match v {
            Value::String(_) => non_empty_str(v).map(license_url),
            Value::Object(_) => v
                .get("id")
                .and_then(non_empty_str)
                .map(license_url)
                .or_else(|| {
                    ["link", "url"]
                        .iter()
                        .find_map(|k| v.get(*k).and_then(non_empty_str))
                        .or_else(|| lookup(v, &["props", "url"]).and_then(non_empty_str))
                        .map(str::to_string)
                }),
            _ => None,
        }
    };

    raw.get(&["metadata", "license"])
        .and_then(from_value)
        .or_else(|| raw.array_at(&["metadata", "rights"])?.iter().find_map(from_value))
}

/// Canonical URL for a known license id; anything else is returned unchanged.
pub fn license_url(id: &str) -> String {
    let key = id.trim().to_lowercase();
    LICENSE_URLS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, url)| url.to_string())
        .unwrap_or_else(|| id.trim().to_string())
}

fn relations(items: Option<&Vec<Value>>, self_id: &str) -> Vec<Relation> {
    let Some(items) = items else {
        return Vec::new();
    };

    let mut out: Vec<Relation> = Vec::new();
    for item in items {
        let relation = item
            .get("relation")
            .and_then(Value::as_str)
            .or_else(|| lookup(item, &["relation_type", "id"]).and_then(Value::as_str))
            .map(str::to_lowercase);
        let Some(property) = relation.and_then(|r| {
            RELATIONS
                .iter()
                .find(|(k, _)| *k == r)
                .map(|(_, p)| *p)
        }) else {
            continue;
        };

        let scheme = item.get("scheme").and_then(Value::as_str).unwrap_or("doi");
        if !scheme.eq_ignore_ascii_case("doi") {
            continue;
        }
        let Some(doi) = item
            .get("identifier")
            .and_then(Value::as_str)
            .and_then(normalize_doi)
        else {
            continue;
        };

        let target = format!("doi:{}", doi);
        let relation = Relation { property, target };
        if relation.target != self_id && !out.contains(&relation) {
            out.push(relation);
        }
    }
    out
}

fn pass_through(raw: &RawRecord) -> Map<String, Value> {
    let mut extra = Map::new();
    for (field, property) in PASS_THROUGH {
        if let Some(value) = raw.get(&["metadata", *field]).filter(|v| is_plain(v)) {
            extra.insert(property.to_string(), value.clone());
        }
    }
    extra
}

fn is_plain(value: &Value) -> bool {
    match value {
        Value::String(s) => !s.trim().is_empty(),
        Value::Number(_) | Value::Bool(_) => true,
        Value::Array(items) => {
            !items.is_empty()
                && items
                    .iter()
                    .all(|v| matches!(v, Value::String(_) | Value::Number(_) | Value::Bool(_)))
        }
        _ => false,
    }
}

// ============ OBIS IPT ============

fn map_obis(raw: &RawRecord) -> Result<NormalizedRecord> {
    let eml = raw.str_at(&["eml"]);
    let link = raw.str_at(&["link"]);
    let id = eml
        .or(link)
        .ok_or_else(|| CatalogueError::malformed("OBIS IPT item has neither an EML URL nor a link"))?
        .to_string();

    let mut distribution = Vec::new();
    if let Some(eml) = eml {
        distribution.push(serde_json::json!({
            "@type": "DataDownload",
            "name": "EML metadata",
            "encodingFormat": "application/xml",
            "contentUrl": eml,
        }));
    }
    if let Some(dwca) = raw.str_at(&["dwca"]) {
        distribution.push(serde_json::json!({
            "@type": "DataDownload",
            "name": "Darwin Core Archive",
            "encodingFormat": "application/zip",
            "contentUrl": dwca,
        }));
    }

    let mut extra = Map::new();
    if !distribution.is_empty() {
        extra.insert("distribution".into(), Value::Array(distribution));
    }
    if let Some(version) = raw.str_at(&["guid"]).and_then(ipt_version) {
        extra.insert("version".into(), Value::from(version));
    }

    Ok(NormalizedRecord {
        record_type: RecordType::Dataset,
        name: raw
            .str_at(&["title"])
            .unwrap_or("OBIS IPT resource")
            .to_string(),
        description: raw.str_at(&["description"]).map(strip_html).unwrap_or_default(),
        identifier: id.clone(),
        url: link.unwrap_or(&id).to_string(),
        date_published: raw.str_at(&["pubDate"]).and_then(normalize_date),
        source: SOURCE_OBIS.to_string(),
        extra,
        id,
        ..Default::default()
    })
}

/// IPT item guids end in the published version: `<uuid>/v1.3`.
fn ipt_version(guid: &str) -> Option<&str> {
    let (_, version) = guid.rsplit_once("/v")?;
    let numeric = version
        .split('.')
        .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()));
    numeric.then_some(version)
}

// ============ Text helpers ============

fn tag_pattern() -> &'static Regex {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    TAGS.get_or_init(|| Regex::new(r"<[^>]+>").expect("static pattern"))
}

fn whitespace_pattern() -> &'static Regex {
    static WS: OnceLock<Regex> = OnceLock::new();
    WS.get_or_init(|| Regex::new(r"\s+").expect("static pattern"))
}

fn entity_pattern() -> &'static Regex {
    static ENTITIES: OnceLock<Regex> = OnceLock::new();
    ENTITIES.get_or_init(|| {
        Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[A-Za-z][A-Za-z0-9]{1,31});")
            .expect("static pattern")
    })
}

/// Resolve one entity body (`amp`, `#233`, `#xE9`) to its text.
fn decode_entity(entity: &str) -> Option<String> {
    let code = if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
        u32::from_str_radix(hex, 16).ok()?
    } else if let Some(dec) = entity.strip_prefix('#') {
        dec.parse().ok()?
    } else {
        return resolve_html5_entity(entity).map(str::to_string);
    };
    char::from_u32(code)
        .filter(|c| *c != '\0')
        .map(String::from)
}

/// Remove HTML tags, decode entities, and collapse whitespace.
///
/// Entities are decoded one at a time; unknown ones and bare `&` stay as
/// written.
pub fn strip_html(text: &str) -> String {
    let no_tags = tag_pattern().replace_all(text, " ");
    let decoded = entity_pattern().replace_all(&no_tags, |caps: &Captures<'_>| {
        decode_entity(&caps[1]).unwrap_or_else(|| caps[0].to_string())
    });
    whitespace_pattern()
        .replace_all(&decoded, " ")
        .trim()
        .to_string()
}
