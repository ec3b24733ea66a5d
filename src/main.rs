//! # Metadata Catalogue CLI (`mcat`)
//!
//! ## Usage
//!
//! ```bash
//! mcat [--config mcat.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `mcat harvest` | Harvest a community and write the catalogue |
//! | `mcat export` | Write per-record files and sitemaps from a catalogue |
//!
//! ## Examples
//!
//! ```bash
//! # Harvest the first page only
//! mcat harvest --community bioecoocean --max-pages 1
//!
//! # Zenodo only, no IPT feed
//! mcat harvest --no-obis -o catalogue.jsonld
//!
//! # Publish under a base URL with both sitemaps
//! mcat export --input catalogue.jsonld --base-url https://example.org/records \
//!     --sitemap sitemap.jsonld --sitemap-xml sitemap.xml
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use metadata_catalogue::{config, export, harvest};

/// Harvest repository metadata into a schema.org JSON-LD catalogue.
#[derive(Parser)]
#[command(
    name = "mcat",
    about = "Harvest repository metadata into a schema.org JSON-LD catalogue",
    version
)]
struct Cli {
    /// Path to a configuration file (TOML). Built-in defaults apply without it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest a community and write the catalogue.
    ///
    /// The catalogue is replaced only after every page has been read; a
    /// failed harvest leaves any previous catalogue untouched.
    Harvest {
        /// Community identifier.
        #[arg(long)]
        community: Option<String>,

        /// Catalogue file to write.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Stop after this many pages.
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        max_pages: Option<u32>,

        /// OBIS IPT RSS feed to merge into the catalogue.
        #[arg(long)]
        obis_rss: Option<String>,

        /// Skip the OBIS IPT feed.
        #[arg(long, conflicts_with = "obis_rss")]
        no_obis: bool,
    },

    /// Write one JSON-LD file per catalogue node, plus sitemaps.
    ///
    /// Files already in the output directory that are not part of this
    /// export are left in place; removing stale files is up to the caller.
    Export {
        /// Catalogue file to read.
        #[arg(long)]
        input: Option<PathBuf>,

        /// Directory the per-record files are written under.
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Absolute URL the output directory is published at.
        #[arg(long)]
        base_url: Option<String>,

        /// JSON-LD sitemap file to write.
        #[arg(long)]
        sitemap: Option<PathBuf>,

        /// XML sitemap file to write.
        #[arg(long)]
        sitemap_xml: Option<PathBuf>,

        /// Date (YYYY-MM-DD) stamped on every sitemap entry.
        #[arg(long)]
        last_modified: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut cfg = match cli.config {
        Some(ref path) => config::load_config(path)?,
        None => config::Config::default(),
    };

    init_tracing(&cfg.logging.filter)?;

    match cli.command {
        Commands::Harvest {
            community,
            output,
            max_pages,
            obis_rss,
            no_obis,
        } => {
            if let Some(community) = community {
                cfg.harvest.community = community;
            }
            if let Some(output) = output {
                cfg.harvest.output = output;
            }
            if obis_rss.is_some() {
                cfg.harvest.obis_rss_url = obis_rss;
            }
            config::validate(&cfg)?;
            harvest::run_harvest(&cfg.harvest, max_pages, !no_obis).await?;
        }
        Commands::Export {
            input,
            out_dir,
            base_url,
            sitemap,
            sitemap_xml,
            last_modified,
        } => {
            let export_cfg = &mut cfg.export;
            if let Some(input) = input {
                export_cfg.input = input;
            }
            if let Some(out_dir) = out_dir {
                export_cfg.out_dir = out_dir;
            }
            if base_url.is_some() {
                export_cfg.base_url = base_url;
            }
            if sitemap.is_some() {
                export_cfg.sitemap = sitemap;
            }
            if sitemap_xml.is_some() {
                export_cfg.sitemap_xml = sitemap_xml;
            }
            if last_modified.is_some() {
                export_cfg.last_modified = last_modified;
            }
            config::validate(&cfg)?;
            export::run_export(&cfg.export)?;
        }
    }

    Ok(())
}

/// Log to stderr; `RUST_LOG` overrides the configured filter.
fn init_tracing(filter: &str) -> anyhow::Result<()> {
    let filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(env) => env,
        Err(_) => tracing_subscriber::EnvFilter::try_new(filter)
            .with_context(|| format!("invalid logging.filter '{}'", filter))?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}
