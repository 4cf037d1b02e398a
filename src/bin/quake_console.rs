use anyhow::{bail, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use prettytable::{Cell, Row, Table};
use std::path::{Path, PathBuf};

use quakewatch::clustering::flatten;
use quakewatch::console::{show, ShowConstraints};
use quakewatch::environment::Settings;
use quakewatch::feed::UsgsClient;
use quakewatch::logging;
use quakewatch::orchestrator::{CycleOutcome, Orchestrator};
use quakewatch::region::{Region, RegionFile, RegionProvider, RegionSet};

#[derive(Parser)]
#[clap(name = "quake-console", about = "Query the earthquake feed from the command line")]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch once and print events passing the constraints (m4..m9, a0..a20)
    Show {
        /// Constraint tokens
        tokens: Vec<String>,

        /// List every cluster member instead of representatives only
        #[clap(short, long)]
        flat: bool,

        /// Feed URL (defaults to QUAKE_FEED_URL or the USGS monthly feed)
        #[clap(short, long)]
        url: Option<String>,
    },

    /// Validate a region file and print its regions
    Regions {
        /// Region file, one tab-separated region per line
        #[clap(required = true)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::configure_logging();

    let args = Cli::parse();
    match args.command {
        Commands::Show { tokens, flat, url } => show_events(&tokens, flat, url).await?,
        Commands::Regions { file } => list_regions(&file)?,
    }
    Ok(())
}

async fn show_events(tokens: &[String], flat: bool, url: Option<String>) -> Result<()> {
    let settings = Settings::from_env();
    let feed_url = url.unwrap_or(settings.feed_url);
    let client = UsgsClient::new(&feed_url, settings.request_timeout)?;
    let regions: Box<dyn RegionProvider> = match settings.regions_path {
        Some(path) => Box::new(RegionFile::new(path)),
        None => Box::new(Vec::<Region>::new()),
    };

    let orchestrator = Orchestrator::new(client, regions, settings.pipeline);
    for spec in &settings.inject {
        orchestrator.inject_quake(spec.location.latitude, spec.location.longitude, spec.magnitude);
    }

    match orchestrator.force_fetch().await? {
        CycleOutcome::FetchFailed { error, .. } => bail!("Fetch from {} failed: {}", feed_url, error),
        outcome => tracing::debug!("Cycle finished: {:?}", outcome),
    }

    let constraints = ShowConstraints::parse(tokens);
    let now = Utc::now();
    let current = orchestrator.current();
    let lines = if flat {
        show(&flatten(current.to_vec()), &constraints, now)
    } else {
        show(current.iter().map(|node| node.representative()), &constraints, now)
    };

    for line in &lines {
        println!("{}", line);
    }
    println!("{} of {} events shown", lines.len(), current.len());
    Ok(())
}

fn list_regions(file: &Path) -> Result<()> {
    let regions = RegionFile::new(file).load()?;
    let set = RegionSet::new(regions);

    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new("#"),
        Cell::new("Name"),
        Cell::new("Enabled"),
        Cell::new("Role"),
        Cell::new("Upper left"),
        Cell::new("Lower right"),
        Cell::new("Crosses 180"),
        Cell::new("Magnitude"),
        Cell::new("Max age (days)"),
    ]));

    for (index, region) in set.regions().iter().enumerate() {
        let role = if set.fallback_index() == Some(index) {
            "fallback"
        } else if region.is_fallback {
            "region (extra fallback)"
        } else {
            "region"
        };
        table.add_row(Row::new(vec![
            Cell::new(&index.to_string()),
            Cell::new(&region.name),
            Cell::new(if region.is_enabled { "yes" } else { "no" }),
            Cell::new(role),
            Cell::new(&region.bounds.upper_left.to_string()),
            Cell::new(&region.bounds.lower_right.to_string()),
            Cell::new(if region.bounds.crosses_antimeridian() { "yes" } else { "no" }),
            Cell::new(&format!("{} - {}", region.min_magnitude, region.max_magnitude)),
            Cell::new(&region.max_age_days.to_string()),
        ]));
    }
    table.printstd();

    if set.fallback_index().is_none() {
        let fallback = set.fallback();
        println!(
            "No fallback configured; using {:?} (magnitude {} - {}, {} days)",
            fallback.name, fallback.min_magnitude, fallback.max_magnitude, fallback.max_age_days
        );
    }
    Ok(())
}
