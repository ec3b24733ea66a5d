//! # Metadata Catalogue
//!
//! Harvests a Zenodo community (plus, optionally, an OBIS IPT feed),
//! normalizes every record into schema.org terms and writes one JSON-LD
//! catalogue. A second, independent stage reads that catalogue back and
//! publishes one file per record plus a sitemap.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────┐   ┌───────────┐   ┌──────────────┐
//! │ Zenodo / IPT │──▶│ mapper │──▶│ assembler │──▶│ catalogue    │
//! │ (paginated)  │   │        │   │ (dedup)   │   │ .jsonld      │
//! └──────────────┘   └────────┘   └───────────┘   └──────┬───────┘
//!                                                        │
//!                              ┌─────────────────────────┤
//!                              ▼                         ▼
//!                      ┌──────────────┐          ┌──────────────┐
//!                      │ per-record   │◀─layout─▶│ sitemap      │
//!                      │ files        │          │ (JSON/XML)   │
//!                      └──────────────┘          └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! mcat harvest --community bioecoocean -o bioecoocean-catalogue.jsonld
//! mcat export --input bioecoocean-catalogue.jsonld --out-dir jsonFiles \
//!     --base-url https://example.org/catalogue --sitemap sitemap.jsonld
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Pipeline error taxonomy |
//! | [`models`] | Raw and normalized record types |
//! | [`source`] | Paginated source contract and pager |
//! | [`http`] | Retrying HTTP requests |
//! | [`connector_zenodo`] | Zenodo records API |
//! | [`connector_obis`] | OBIS IPT RSS feed |
//! | [`dates`] | Date normalization |
//! | [`mapper`] | Raw record → normalized record |
//! | [`graph`] | Graph assembly and the catalogue document |
//! | [`catalogue`] | Catalogue file reading and atomic writing |
//! | [`layout`] | Node → export path → URL |
//! | [`export`] | Per-record files and the export stage |
//! | [`sitemap`] | JSON-LD and XML sitemaps |
//! | [`harvest`] | The harvest stage |

pub mod catalogue;
pub mod config;
pub mod connector_obis;
pub mod connector_zenodo;
pub mod dates;
pub mod error;
pub mod export;
pub mod graph;
pub mod harvest;
pub mod http;
pub mod layout;
pub mod mapper;
pub mod models;
pub mod sitemap;
pub mod source;
