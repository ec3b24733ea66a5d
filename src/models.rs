//! Core data models used throughout the pipeline.
//!
//! A [`RawRecord`] is one page element exactly as a source returned it. The
//! field mapper turns it into a [`NormalizedRecord`], which is what the graph
//! assembler consumes.

use serde_json::{Map, Value};
use std::fmt;

/// Source label for records harvested from the Zenodo records API.
pub const SOURCE_ZENODO: &str = "zenodo";
/// Source label for records harvested from an OBIS IPT RSS feed.
pub const SOURCE_OBIS: &str = "obis";

/// Raw item produced by a source before normalization.
///
/// Field access never panics: every accessor returns `None` when the path is
/// absent, has the wrong JSON type, or holds only whitespace.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub source: String,
    pub fields: Value,
}

impl RawRecord {
    pub fn new(source: impl Into<String>, fields: Value) -> Self {
        Self {
            source: source.into(),
            fields,
        }
    }

    /// Value at a nested object path, e.g. `&["metadata", "title"]`.
    pub fn get(&self, path: &[&str]) -> Option<&Value> {
        lookup(&self.fields, path)
    }

    /// Trimmed, non-empty string at `path`.
    pub fn str_at(&self, path: &[&str]) -> Option<&str> {
        self.get(path).and_then(non_empty_str)
    }

    /// Array at `path`.
    pub fn array_at(&self, path: &[&str]) -> Option<&Vec<Value>> {
        self.get(path).and_then(Value::as_array)
    }

    /// String or number at `path`, rendered as a string.
    pub fn scalar_at(&self, path: &[&str]) -> Option<String> {
        self.get(path).and_then(scalar_string)
    }
}

/// Walk an object path. Non-object intermediate values yield `None`.
pub fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(key))
}

pub fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().map(str::trim).filter(|s| !s.is_empty())
}

pub fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(_) => non_empty_str(value).map(str::to_string),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Closed set of schema.org types a record can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RecordType {
    Dataset,
    SoftwareSourceCode,
    ScholarlyArticle,
    Report,
    Book,
    PresentationDigitalDocument,
    Poster,
    ImageObject,
    VideoObject,
    LearningResource,
    Event,
    Organization,
    #[default]
    CreativeWork,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dataset => "Dataset",
            Self::SoftwareSourceCode => "SoftwareSourceCode",
            Self::ScholarlyArticle => "ScholarlyArticle",
            Self::Report => "Report",
            Self::Book => "Book",
            Self::PresentationDigitalDocument => "PresentationDigitalDocument",
            Self::Poster => "Poster",
            Self::ImageObject => "ImageObject",
            Self::VideoObject => "VideoObject",
            Self::LearningResource => "LearningResource",
            Self::Event => "Event",
            Self::Organization => "Organization",
            Self::CreativeWork => "CreativeWork",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CreatorKind {
    #[default]
    Person,
    Organization,
}

/// One creator entry. Order within [`NormalizedRecord::creator`] is citation order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Creator {
    pub kind: CreatorKind,
    pub name: String,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    /// ORCID as a resolvable URL.
    pub orcid: Option<String>,
    pub affiliation: Option<String>,
}

impl Creator {
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        let kind = match self.kind {
            CreatorKind::Person => "Person",
            CreatorKind::Organization => "Organization",
        };
        obj.insert("@type".into(), Value::from(kind));
        obj.insert("name".into(), Value::from(self.name.clone()));
        if let Some(given) = &self.given_name {
            obj.insert("givenName".into(), Value::from(given.clone()));
        }
        if let Some(family) = &self.family_name {
            obj.insert("familyName".into(), Value::from(family.clone()));
        }
        if let Some(orcid) = &self.orcid {
            obj.insert("identifier".into(), Value::from(orcid.clone()));
        }
        if let Some(affiliation) = &self.affiliation {
            obj.insert(
                "affiliation".into(),
                serde_json::json!({ "@type": "Organization", "name": affiliation }),
            );
        }
        Value::Object(obj)
    }
}

/// A typed link from one record to another record's `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    /// schema.org property, e.g. `isPartOf`.
    pub property: &'static str,
    /// Target record `id` (same form as [`NormalizedRecord::id`]).
    pub target: String,
}

/// Canonical record representation handed to the graph assembler.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NormalizedRecord {
    /// `doi:<doi>`, `zenodo:<recid>`, or an absolute URL.
    pub id: String,
    pub record_type: RecordType,
    /// Empty when the source gave no title.
    pub name: String,
    /// Empty when the source gave no description.
    pub description: String,
    /// Display identifier: the DOI URL when one exists, else the record URL.
    pub identifier: String,
    pub url: String,
    pub date_published: Option<String>,
    pub date_modified: Option<String>,
    pub creator: Vec<Creator>,
    /// Exact-match deduplicated, first-seen order.
    pub keywords: Vec<String>,
    pub license: Option<String>,
    pub relations: Vec<Relation>,
    /// Origin label (`zenodo`, `obis`) used to partition exports.
    pub source: String,
    /// Pass-through properties keyed by schema.org property name.
    pub extra: Map<String, Value>,
}

impl NormalizedRecord {
    /// Insert a keyword unless an identical string is already present.
    pub fn add_keyword(&mut self, keyword: &str) {
        let keyword = keyword.trim();
        if keyword.is_empty() || self.keywords.iter().any(|k| k == keyword) {
            return;
        }
        self.keywords.push(keyword.to_string());
    }
}
