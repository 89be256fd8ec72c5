//! Command-line surface of `dim`.
//!
//! Argument parsing and printing only; every operation is delegated to
//! [`dim_core::Engine`].

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use clap::{Parser, Subcommand};
use dim_core::{
    parse_header, BatchOptions, BatchReport, Content, Engine, LockRecord, ManifestSource,
    ProjectPaths, Settings, VerifyMode, VerifyStatus,
};
use std::collections::BTreeMap;

#[derive(Parser)]
#[clap(
    name = "dim",
    version,
    about = "Manage local copies of open data declared in dim.json"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create dim.json, dim-lock.json and data_files/
    Init,

    /// Install a URL, or every content of a manifest not yet in the lock
    Install {
        /// URL of the data file to install
        url: Option<String>,
        /// Name the content is stored under (required with a URL)
        #[clap(short, long)]
        name: Option<String>,
        /// Post-process step, e.g. "unzip" or "encode utf-8"; repeatable
        #[clap(short = 'p', long = "post-process")]
        post_processes: Vec<String>,
        /// Request header as "Key: Value"; repeatable
        #[clap(short = 'H', long = "header")]
        headers: Vec<String>,
        /// Manifest to install from: a local path or an http(s) URL
        #[clap(short = 'f', long)]
        file: Option<String>,
        /// Overwrite existing contents
        #[clap(short = 'F', long)]
        force: bool,
        /// Download and post-process contents concurrently
        #[clap(short = 'a', long = "async")]
        parallel: bool,
        /// Catalog page the data was found on
        #[clap(long)]
        catalog_url: Option<String>,
        /// Resource id within the catalog
        #[clap(long)]
        catalog_resource_id: Option<String>,
    },

    /// Remove a content, its lock record and its files
    Uninstall { name: String },

    /// List installed contents
    List {
        /// One line per content
        #[clap(short, long)]
        simple: bool,
    },

    /// Download one content again, or all of them
    Update {
        name: Option<String>,
        /// Replace the recorded post-process steps
        #[clap(short = 'p', long = "post-process")]
        post_processes: Option<Vec<String>>,
        /// Update contents concurrently
        #[clap(short = 'a', long = "async")]
        parallel: bool,
    },

    /// Check installed files against the recorded integrity
    Verify {
        /// Download again and compare with upstream instead of the local files
        #[clap(long)]
        remote: bool,
        /// Exit with an error when anything is outdated
        #[clap(long)]
        strict: bool,
    },

    /// Empty dim.json, dim-lock.json and data_files/
    Clean,
}

pub async fn run(cli: Cli) -> Result<()> {
    let paths = ProjectPaths::current_dir()?;
    let settings = Settings::from_env();

    match cli.command {
        Commands::Init => {
            Engine::init(&paths)?;
            println!("Initialized dim project in {}", paths.root().display());
        }

        Commands::Install {
            url,
            name,
            post_processes,
            headers,
            file,
            force,
            parallel,
            catalog_url,
            catalog_resource_id,
        } => match (url, file) {
            (Some(_), Some(_)) => bail!("Specify either a URL or --file, not both"),
            (Some(url), None) => {
                let name = name.ok_or_else(|| anyhow!("--name is required when installing a URL"))?;
                let content = Content {
                    name,
                    url,
                    catalog_url,
                    catalog_resource_id,
                    post_processes,
                    headers: parse_headers(&headers)?,
                };
                let mut engine = Engine::open_default(paths, settings)?;
                let record = engine.install(content, force).await?;
                println!("Installed {} to {}", record.name, record.path.display());
            }
            (None, file) => {
                let source = match file {
                    Some(file) => ManifestSource::parse(&file)?,
                    None => ManifestSource::Project,
                };
                let mut engine = Engine::open_default(paths, settings)?;
                let report = engine
                    .install_from_manifest(source, BatchOptions { force, parallel })
                    .await?;
                print_batch(&report);
            }
        },

        Commands::Uninstall { name } => {
            let mut engine = Engine::open_default(paths, settings)?;
            engine.uninstall(&name)?;
            println!("Uninstalled {}", name);
        }

        Commands::List { simple } => {
            let engine = Engine::open_default(paths, settings)?;
            for record in engine.list() {
                if simple {
                    print_simple(record);
                } else {
                    print_detailed(record);
                }
            }
        }

        Commands::Update {
            name,
            post_processes,
            parallel,
        } => {
            let mut engine = Engine::open_default(paths, settings)?;
            match name {
                Some(name) => {
                    let record = engine.update(&name, post_processes).await?;
                    println!("Updated {} at {}", record.name, record.path.display());
                }
                None => {
                    let report = engine.update_all(parallel).await?;
                    print_batch(&report);
                }
            }
        }

        Commands::Verify { remote, strict } => {
            let engine = Engine::open_default(paths, settings)?;
            let mode = if remote {
                VerifyMode::Remote
            } else {
                VerifyMode::Local
            };
            let report = engine.verify(mode).await?;
            for entry in &report.entries {
                println!("{}: {}", entry.name, entry.status);
                if entry.status == VerifyStatus::Outdated {
                    println!("  expected {}", entry.expected);
                    match (&entry.actual, &entry.error) {
                        (Some(actual), _) => println!("  actual   {}", actual),
                        (None, Some(error)) => println!("  error    {}", error),
                        (None, None) => println!("  actual   (missing)"),
                    }
                }
            }
            if report.is_latest() {
                println!("verification success");
            } else if strict {
                report.ensure_latest()?;
            }
        }

        Commands::Clean => {
            let mut engine = Engine::open_default(paths, settings)?;
            engine.clean()?;
            println!("Cleaned dim.json, dim-lock.json and data_files/");
        }
    }

    Ok(())
}

fn parse_headers(raw: &[String]) -> Result<BTreeMap<String, String>> {
    raw.iter()
        .map(|h| {
            parse_header(h).ok_or_else(|| anyhow!("Invalid header '{}', expected 'Key: Value'", h))
        })
        .collect()
}

fn print_batch(report: &BatchReport) {
    if report.is_noop() {
        println!("All contents already installed.");
        return;
    }
    for record in &report.installed {
        println!("Installed {} to {}", record.name, record.path.display());
    }
    println!("Installed {} of {} contents.", report.installed.len(), report.total);
}

fn or_null(value: Option<&str>) -> &str {
    value.unwrap_or("null")
}

fn timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn print_simple(record: &LockRecord) {
    println!(
        "{} {} {} {} {}",
        record.name,
        record.url,
        record.path.display(),
        timestamp(&record.last_downloaded),
        record.integrity
    );
}

fn print_detailed(record: &LockRecord) {
    let last_modified = record.last_modified.as_ref().map(timestamp);
    println!("{}", record.name);
    println!("  - URL               : {}", record.url);
    println!("  - File path         : {}", record.path.display());
    println!("  - Catalog URL       : {}", or_null(record.catalog_url.as_deref()));
    println!(
        "  - Catalog resourceid: {}",
        or_null(record.catalog_resource_id.as_deref())
    );
    println!("  - Last modified     : {}", or_null(last_modified.as_deref()));
    println!("  - ETag              : {}", or_null(record.etag.as_deref()));
    println!("  - Last downloaded   : {}", timestamp(&record.last_downloaded));
    println!("  - Integrity         : {}", record.integrity);
    println!("  - Post processes    : {}", record.post_processes.join(", "));
    let headers: Vec<String> = record
        .headers
        .iter()
        .map(|(k, v)| format!("{}: {}", k, v))
        .collect();
    println!("  - Headers           : {}", headers.join("; "));
    println!();
}
