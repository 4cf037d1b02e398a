//! Cycle scheduling, debug injection and publishing.
//!
//! A ticker task posts cycle signals to a single worker, which runs cycles one
//! at a time. Forced fetches run on their own task and may overlap a scheduled
//! cycle, so every cycle carries an id taken when it starts and only a result
//! newer than the last published one is published. Stopping bumps a lifecycle
//! counter and disarms the schedule under the same lock that scheduled cycles
//! reserve their id in, so no scheduled cycle starts after `stop` returns and a
//! cycle that started under an older lifecycle is discarded.

mod cycle;
mod injection;

pub use self::cycle::{run_pipeline, PipelineOptions};
pub use self::injection::{debug_quake, random_cluster, random_location, random_location_near};

use chrono::Utc;
use rand::{rngs::StdRng, SeedableRng};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::event::{Event, EventNode};
use crate::feed::{to_events, FeedSource, FeedStats, FetchError};
use crate::region::{Region, RegionProvider};
use crate::TARGET_PIPELINE;

/// What happened to one cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Published { cycle: u64, nodes: usize },
    /// A newer cycle had already published.
    Stale { cycle: u64 },
    /// The orchestrator was stopped while the cycle ran.
    Discarded { cycle: u64 },
    /// Nothing published; the previous list stays current.
    FetchFailed { cycle: u64, error: FetchError },
}

pub type Snapshot = Arc<Vec<EventNode>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct PublishState {
    last_published: u64,
    lifecycle: u64,
    running: bool,
}

struct Shared<S> {
    source: S,
    regions: Arc<dyn RegionProvider>,
    options: PipelineOptions,
    injected: Mutex<Vec<Event>>,
    next_cycle: AtomicU64,
    state: Mutex<PublishState>,
    published: watch::Sender<Snapshot>,
    stats: Mutex<FeedStats>,
}

impl<S: FeedSource> Shared<S> {
    /// Reserves a cycle id and captures the current lifecycle.
    fn begin_cycle(&self) -> (u64, u64) {
        let state = lock(&self.state);
        let cycle = self.next_cycle.fetch_add(1, Ordering::SeqCst) + 1;
        (cycle, state.lifecycle)
    }

    /// Marks the schedule as running and returns the lifecycle it runs under.
    fn arm_schedule(&self) -> u64 {
        let mut state = lock(&self.state);
        state.running = true;
        state.lifecycle
    }

    /// Like [`Self::begin_cycle`], but refuses once the schedule armed under
    /// `schedule` has been stopped.
    fn begin_scheduled_cycle(&self, schedule: u64) -> Option<(u64, u64)> {
        let state = lock(&self.state);
        if !state.running || state.lifecycle != schedule {
            return None;
        }
        let cycle = self.next_cycle.fetch_add(1, Ordering::SeqCst) + 1;
        Some((cycle, state.lifecycle))
    }

    fn disarm(&self) {
        let mut state = lock(&self.state);
        state.lifecycle += 1;
        state.running = false;
    }

    /// Reads the region configuration off the runtime threads.
    async fn load_regions(&self) -> Vec<Region> {
        let provider = Arc::clone(&self.regions);
        match tokio::task::spawn_blocking(move || provider.regions()).await {
            Ok(regions) => regions,
            Err(err) => {
                warn!(target: TARGET_PIPELINE, "Region lookup failed, using default fallback: {}", err);
                Vec::new()
            }
        }
    }

    async fn run_cycle(&self, cycle: u64, lifecycle: u64) -> CycleOutcome {
        debug!(target: TARGET_PIPELINE, "Starting cycle {}", cycle);
        let started = Instant::now();
        let fetched = self.source.fetch().await;
        lock(&self.stats).record_call(started.elapsed());

        let raw = match fetched {
            Ok(raw) => raw,
            Err(error) => {
                lock(&self.stats).record_error(&error);
                warn!(target: TARGET_PIPELINE, "Cycle {} fetch failed, keeping previous list: {}", cycle, error);
                return CycleOutcome::FetchFailed { cycle, error };
            }
        };

        let parsed = to_events(&raw, self.options.min_magnitude);
        lock(&self.stats).record_parsed(&parsed);

        let mut events = parsed.events;
        events.extend(lock(&self.injected).iter().cloned());

        let regions = self.load_regions().await;
        let nodes = run_pipeline(events, &regions, &self.options, Utc::now());
        self.publish(cycle, lifecycle, nodes)
    }

    fn publish(&self, cycle: u64, lifecycle: u64, nodes: Vec<EventNode>) -> CycleOutcome {
        let mut state = lock(&self.state);
        if state.lifecycle != lifecycle {
            debug!(target: TARGET_PIPELINE, "Discarding cycle {}: stopped while running", cycle);
            return CycleOutcome::Discarded { cycle };
        }
        if cycle <= state.last_published {
            debug!(target: TARGET_PIPELINE, "Discarding stale cycle {} (cycle {} already published)", cycle, state.last_published);
            return CycleOutcome::Stale { cycle };
        }
        state.last_published = cycle;
        let count = nodes.len();
        self.published.send_replace(Arc::new(nodes));
        info!(target: TARGET_PIPELINE, "Cycle {} published {} events", cycle, count);
        CycleOutcome::Published {
            cycle,
            nodes: count,
        }
    }
}

struct Schedule {
    cancel_tx: watch::Sender<bool>,
    ticker: JoinHandle<()>,
    worker: JoinHandle<()>,
}

/// Owns the fetch schedule, the injected events and the published list.
pub struct Orchestrator<S: FeedSource> {
    shared: Arc<Shared<S>>,
    schedule: Mutex<Option<Schedule>>,
}

impl<S: FeedSource> Orchestrator<S> {
    pub fn new(source: S, regions: impl RegionProvider + 'static, options: PipelineOptions) -> Self {
        let (published, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            shared: Arc::new(Shared {
                source,
                regions: Arc::new(regions),
                options,
                injected: Mutex::new(Vec::new()),
                next_cycle: AtomicU64::new(0),
                state: Mutex::new(PublishState::default()),
                published,
                stats: Mutex::new(FeedStats::default()),
            }),
            schedule: Mutex::new(None),
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.shared.options
    }

    /// Runs a cycle every `every`, the first one immediately. Calling
    /// `start` while running does nothing. Must be called within a Tokio
    /// runtime.
    pub fn start(&self, every: Duration) {
        let mut schedule = lock(&self.schedule);
        if schedule.is_some() {
            debug!(target: TARGET_PIPELINE, "Schedule already running");
            return;
        }

        let armed = self.shared.arm_schedule();
        let (cancel_tx, mut ticker_cancel) = watch::channel(false);
        let (tick_tx, mut tick_rx) = mpsc::channel::<()>(1);

        let ticker = tokio::spawn(async move {
            let mut ticks = interval(every);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker_cancel.changed() => break,
                    _ = ticks.tick() => {
                        match tick_tx.try_send(()) {
                            Ok(()) => {}
                            Err(mpsc::error::TrySendError::Full(())) => {
                                debug!(target: TARGET_PIPELINE, "Previous cycle still pending, skipping tick");
                            }
                            Err(mpsc::error::TrySendError::Closed(())) => break,
                        }
                    }
                }
            }
        });

        let shared = Arc::clone(&self.shared);
        let worker = tokio::spawn(async move {
            while tick_rx.recv().await.is_some() {
                let Some((cycle, lifecycle)) = shared.begin_scheduled_cycle(armed) else {
                    break;
                };
                shared.run_cycle(cycle, lifecycle).await;
            }
        });

        info!(target: TARGET_PIPELINE, "Fetching every {:?}", every);
        *schedule = Some(Schedule {
            cancel_tx,
            ticker,
            worker,
        });
    }

    /// Stops scheduling. A cycle already in flight finishes, but its result
    /// is discarded.
    pub fn stop(&self) {
        self.shared.disarm();
        if let Some(schedule) = lock(&self.schedule).take() {
            let _ = schedule.cancel_tx.send(true);
            // The worker exits once the ticker drops its sender.
            drop(schedule.ticker);
            drop(schedule.worker);
            info!(target: TARGET_PIPELINE, "Schedule stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.schedule).is_some()
    }

    /// Runs a cycle now, outside the schedule.
    pub fn force_fetch(&self) -> JoinHandle<CycleOutcome> {
        let shared = Arc::clone(&self.shared);
        let (cycle, lifecycle) = shared.begin_cycle();
        tokio::spawn(async move { shared.run_cycle(cycle, lifecycle).await })
    }

    /// Adds an event to every following cycle until cleared.
    pub fn inject_event(&self, event: Event) {
        debug!(target: TARGET_PIPELINE, "Injecting event {}", event.code);
        lock(&self.shared.injected).push(event);
    }

    /// Injects a debug quake at the given place, timed now.
    pub fn inject_quake(&self, latitude: f64, longitude: f64, magnitude: f64) -> Event {
        let event = debug_quake(latitude, longitude, magnitude, Utc::now());
        self.inject_event(event.clone());
        event
    }

    /// Injects a random cluster; see [`random_cluster`].
    pub fn inject_cluster(&self, count: usize, far_count: usize, range_km: f64) -> Vec<Event> {
        let mut rng = StdRng::seed_from_u64(rand::random());
        let events = random_cluster(&mut rng, count, far_count, range_km, Utc::now());
        lock(&self.shared.injected).extend(events.iter().cloned());
        debug!(target: TARGET_PIPELINE, "Injected cluster of {} events", events.len());
        events
    }

    pub fn clear_injected(&self) {
        let mut injected = lock(&self.shared.injected);
        debug!(target: TARGET_PIPELINE, "Clearing {} injected events", injected.len());
        injected.clear();
    }

    pub fn injected(&self) -> Vec<Event> {
        lock(&self.shared.injected).clone()
    }

    /// Receiver notified whenever a new list is published.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.shared.published.subscribe()
    }

    /// The most recently published list.
    pub fn current(&self) -> Snapshot {
        self.shared.published.borrow().clone()
    }

    pub fn stats(&self) -> FeedStats {
        lock(&self.shared.stats).clone()
    }
}

impl<S: FeedSource> Drop for Orchestrator<S> {
    fn drop(&mut self) {
        self.shared.disarm();
        if let Some(schedule) = lock(&self.schedule).take() {
            let _ = schedule.cancel_tx.send(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::samples::{collection, feature};
    use crate::feed::{parse_document, RawFeature};
    use crate::geo::{GeoPoint, GeoRect};
    use crate::region::{encode_regions, RegionFile};
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    enum Step {
        Ready(Result<Vec<RawFeature>, FetchError>),
        Gated(Arc<Notify>, Result<Vec<RawFeature>, FetchError>),
    }

    /// Replays scripted responses, then returns empty batches.
    #[derive(Default)]
    struct ScriptedSource {
        steps: Mutex<VecDeque<Step>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: Mutex::new(steps.into()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl FeedSource for Arc<ScriptedSource> {
        async fn fetch(&self) -> Result<Vec<RawFeature>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let step = self.steps.lock().unwrap().pop_front();
            match step {
                Some(Step::Ready(result)) => result,
                Some(Step::Gated(gate, result)) => {
                    gate.notified().await;
                    result
                }
                None => Ok(Vec::new()),
            }
        }
    }

    struct FixedSource(Vec<RawFeature>);

    impl FeedSource for FixedSource {
        async fn fetch(&self) -> Result<Vec<RawFeature>, FetchError> {
            Ok(self.0.clone())
        }
    }

    fn now_ms() -> i64 {
        (Utc::now() - chrono::Duration::hours(1)).timestamp_millis()
    }

    fn features(list: &[(&str, f64, f64, f64)]) -> Vec<RawFeature> {
        let values = list
            .iter()
            .map(|(code, lat, lon, mag)| feature(code, *lat, *lon, *mag, now_ms()))
            .collect();
        parse_document(&collection(values)).unwrap()
    }

    fn codes(snapshot: &Snapshot) -> Vec<String> {
        snapshot.iter().map(|n| n.representative().code.clone()).collect()
    }

    fn no_regions() -> Vec<Region> {
        Vec::new()
    }

    async fn wait_for_calls(source: &ScriptedSource, calls: usize) {
        while source.calls.load(Ordering::SeqCst) < calls {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_end_to_end_scenario() {
        let source = FixedSource(features(&[
            ("a", 10.0, 10.0, 3.0),
            ("Q1", 35.00, 139.00, 6.2),
            ("Q2", 35.05, 139.02, 5.8),
        ]));
        let orchestrator = Orchestrator::new(source, no_regions(), PipelineOptions::default());

        let outcome = orchestrator.force_fetch().await.unwrap();
        assert_eq!(outcome, CycleOutcome::Published { cycle: 1, nodes: 1 });

        let current = orchestrator.current();
        assert_eq!(current.len(), 1);
        let node = &current[0];
        assert_eq!(node.representative().code, "Q1");
        assert_eq!(node.representative().magnitude, 6.2);
        let children: Vec<&str> = node.children().iter().map(|e| e.code.as_str()).collect();
        assert_eq!(children, vec!["Q2"]);
        assert!(!node.contains("a"));
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_previous_list() {
        let source = Arc::new(ScriptedSource::new(vec![
            Step::Ready(Ok(features(&[("Q1", 35.0, 139.0, 6.2)]))),
            Step::Ready(Err(FetchError::Status(503))),
            Step::Ready(Err(FetchError::Malformed("eof".into()))),
        ]));
        let orchestrator = Orchestrator::new(Arc::clone(&source), no_regions(), PipelineOptions::default());

        orchestrator.force_fetch().await.unwrap();
        let outcome = orchestrator.force_fetch().await.unwrap();
        assert_eq!(
            outcome,
            CycleOutcome::FetchFailed {
                cycle: 2,
                error: FetchError::Status(503)
            }
        );
        orchestrator.force_fetch().await.unwrap();

        assert_eq!(codes(&orchestrator.current()), vec!["Q1"]);
        let stats = orchestrator.stats();
        assert_eq!(stats.calls, 3);
        assert_eq!(stats.response_errors, 1);
        assert_eq!(stats.malformed_documents, 1);
        assert_eq!(stats.retrieved, 1);
    }

    #[tokio::test]
    async fn test_stale_cycle_not_published() {
        let gate = Arc::new(Notify::new());
        let source = Arc::new(ScriptedSource::new(vec![
            Step::Gated(Arc::clone(&gate), Ok(features(&[("old", 0.0, 0.0, 6.0)]))),
            Step::Ready(Ok(features(&[("new", 0.0, 0.0, 6.0)]))),
        ]));
        let orchestrator = Orchestrator::new(Arc::clone(&source), no_regions(), PipelineOptions::default());

        let first = orchestrator.force_fetch();
        wait_for_calls(&source, 1).await;
        let second = orchestrator.force_fetch();
        assert_eq!(second.await.unwrap(), CycleOutcome::Published { cycle: 2, nodes: 1 });

        gate.notify_one();
        assert_eq!(first.await.unwrap(), CycleOutcome::Stale { cycle: 1 });
        assert_eq!(codes(&orchestrator.current()), vec!["new"]);
    }

    #[tokio::test]
    async fn test_stop_discards_in_flight_cycle() {
        let gate = Arc::new(Notify::new());
        let source = Arc::new(ScriptedSource::new(vec![Step::Gated(
            Arc::clone(&gate),
            Ok(features(&[("late", 0.0, 0.0, 6.0)])),
        )]));
        let orchestrator = Orchestrator::new(Arc::clone(&source), no_regions(), PipelineOptions::default());

        let in_flight = orchestrator.force_fetch();
        wait_for_calls(&source, 1).await;
        orchestrator.stop();
        gate.notify_one();

        assert_eq!(in_flight.await.unwrap(), CycleOutcome::Discarded { cycle: 1 });
        assert!(orchestrator.current().is_empty());
    }

    #[tokio::test]
    async fn test_inject_and_clear() {
        let source = Arc::new(ScriptedSource::default());
        let orchestrator = Orchestrator::new(Arc::clone(&source), no_regions(), PipelineOptions::default());

        let injected = orchestrator.inject_quake(35.0, 139.0, 6.5);
        orchestrator.force_fetch().await.unwrap();
        let current = orchestrator.current();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].representative().code, injected.code);
        assert!(current[0].representative().debug);

        // survives further cycles
        orchestrator.force_fetch().await.unwrap();
        assert_eq!(orchestrator.current().len(), 1);

        orchestrator.clear_injected();
        assert!(orchestrator.injected().is_empty());
        orchestrator.force_fetch().await.unwrap();
        assert!(orchestrator.current().is_empty());
    }

    #[tokio::test]
    async fn test_injected_events_pass_through_filter() {
        let source = Arc::new(ScriptedSource::default());
        let orchestrator = Orchestrator::new(Arc::clone(&source), no_regions(), PipelineOptions::default());

        // below the default fallback range
        orchestrator.inject_quake(0.0, 0.0, 4.5);
        orchestrator.inject_event(debug_quake(0.0, 0.2, 7.0, Utc::now()));
        orchestrator.force_fetch().await.unwrap();

        let current = orchestrator.current();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].representative().magnitude, 7.0);
        assert!(!current[0].is_cluster());
    }

    #[tokio::test]
    async fn test_inject_cluster() {
        let orchestrator = Orchestrator::new(FixedSource(Vec::new()), no_regions(), PipelineOptions::default());
        let events = orchestrator.inject_cluster(5, 1, 50.0);
        assert_eq!(events.len(), 6);
        assert_eq!(orchestrator.injected().len(), 6);
    }

    #[tokio::test]
    async fn test_scheduled_cycles_publish_until_stopped() {
        let source = Arc::new(ScriptedSource::new(vec![Step::Ready(Ok(features(&[(
            "Q1", 35.0, 139.0, 6.2,
        )])))]));
        let orchestrator = Orchestrator::new(Arc::clone(&source), no_regions(), PipelineOptions::default());
        let mut updates = orchestrator.subscribe();

        orchestrator.start(Duration::from_millis(50));
        assert!(orchestrator.is_running());
        tokio::time::timeout(Duration::from_secs(5), updates.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(codes(&orchestrator.current()), vec!["Q1"]);

        // later cycles return empty batches
        wait_for_calls(&source, 2).await;
        orchestrator.stop();
        assert!(!orchestrator.is_running());

        let calls = source.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test]
    async fn test_no_scheduled_cycle_after_stop() {
        let source = FixedSource(features(&[("Q1", 35.0, 139.0, 6.2)]));
        let orchestrator = Orchestrator::new(source, no_regions(), PipelineOptions::default());
        let shared = &orchestrator.shared;

        // the worker has reserved a cycle when stop lands
        let armed = shared.arm_schedule();
        let (cycle, lifecycle) = shared.begin_scheduled_cycle(armed).unwrap();
        orchestrator.stop();
        assert_eq!(shared.begin_scheduled_cycle(armed), None);
        assert_eq!(shared.run_cycle(cycle, lifecycle).await, CycleOutcome::Discarded { cycle });
        assert!(orchestrator.current().is_empty());

        // a restarted schedule does not revive the old worker
        let rearmed = shared.arm_schedule();
        assert_eq!(shared.begin_scheduled_cycle(armed), None);
        assert!(shared.begin_scheduled_cycle(rearmed).is_some());
    }

    #[tokio::test]
    async fn test_region_file_read_each_cycle() {
        let path = std::env::temp_dir().join(format!("quakewatch-cycle-{}.tsv", std::process::id()));
        let japan = GeoRect::new(GeoPoint::new(46.0, 128.0), GeoPoint::new(30.0, 146.0));
        std::fs::write(
            &path,
            encode_regions(&[Region::new("Japan", japan).with_magnitudes(7.0, 10.0)]),
        )
        .unwrap();

        let source = FixedSource(features(&[("Q1", 35.0, 139.0, 6.2)]));
        let orchestrator = Orchestrator::new(source, RegionFile::new(&path), PipelineOptions::default());
        orchestrator.force_fetch().await.unwrap();
        assert!(orchestrator.current().is_empty());

        std::fs::write(&path, "").unwrap();
        orchestrator.force_fetch().await.unwrap();
        assert_eq!(codes(&orchestrator.current()), vec!["Q1"]);

        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_stop_without_start() {
        let orchestrator = Orchestrator::new(FixedSource(Vec::new()), no_regions(), PipelineOptions::default());
        orchestrator.stop();
        assert!(!orchestrator.is_running());
        let outcome = orchestrator.force_fetch().await.unwrap();
        assert_eq!(outcome, CycleOutcome::Published { cycle: 1, nodes: 0 });
    }
}
