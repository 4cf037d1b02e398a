use anyhow::Result;
use tokio::signal;
use tracing::{error, info};

use quakewatch::dedupe::same_set;
use quakewatch::environment::Settings;
use quakewatch::feed::UsgsClient;
use quakewatch::logging;
use quakewatch::orchestrator::Orchestrator;
use quakewatch::region::{Region, RegionFile, RegionProvider};

#[tokio::main]
async fn main() -> Result<()> {
    logging::configure_logging();

    let settings = Settings::from_env();
    info!(
        "Starting quakewatch: feed {}, every {:?}, minimum magnitude {}, closeness {} km, representative by {}",
        settings.feed_url,
        settings.fetch_interval,
        settings.pipeline.min_magnitude,
        settings.pipeline.closeness_km,
        settings.pipeline.order
    );

    let client = UsgsClient::new(&settings.feed_url, settings.request_timeout)?;
    let regions: Box<dyn RegionProvider> = match &settings.regions_path {
        Some(path) => {
            info!("Reading regions from {}", path.display());
            Box::new(RegionFile::new(path))
        }
        None => {
            info!("No region file configured, using the default fallback region");
            Box::new(Vec::<Region>::new())
        }
    };

    let orchestrator = Orchestrator::new(client, regions, settings.pipeline);
    for spec in &settings.inject {
        let event = orchestrator.inject_quake(
            spec.location.latitude,
            spec.location.longitude,
            spec.magnitude,
        );
        info!("Injected debug quake {} at {}", event.code, spec.location);
    }

    let mut updates = orchestrator.subscribe();
    orchestrator.start(settings.fetch_interval);

    let mut previous = orchestrator.current();
    loop {
        tokio::select! {
            result = signal::ctrl_c() => {
                if let Err(err) = result {
                    error!("Failed to listen for ctrl-c: {}", err);
                }
                info!("Ctrl-C received, stopping.");
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = updates.borrow_and_update().clone();
                if same_set(previous.as_slice(), current.as_slice()) {
                    info!("Published list unchanged ({} events)", current.len());
                } else {
                    let clusters = current.iter().filter(|node| node.is_cluster()).count();
                    info!("Published {} events ({} clusters)", current.len(), clusters);
                }
                previous = current;
            }
        }
    }

    orchestrator.stop();
    let stats = orchestrator.stats();
    info!(
        "Fetched {} times ({} errors), {} events retrieved, average fetch {:?}",
        stats.calls,
        stats.errors(),
        stats.retrieved,
        stats.average_duration()
    );
    Ok(())
}
