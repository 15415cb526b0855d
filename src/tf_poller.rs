// Periodic fetching of the live train set and the one-shot station directory
use crate::tf_models::{Result, Station, TrainSnapshot, TrainSource};
use log::{debug, info, warn};
use poll_promise::Promise;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Something the consumer thread has to apply.
#[derive(Debug)]
pub enum PollEvent {
    StationsLoaded(Vec<Station>),
    Snapshot {
        cycle: u64,
        trains: Vec<TrainSnapshot>,
    },
}

struct PendingTrains {
    cycle: u64,
    promise: Promise<Result<Vec<TrainSnapshot>>>,
}

/// Drives the fetch cycle. Requests run on background threads, but results
/// only come out of [`LivePoller::poll`], so everything they touch stays on
/// the thread that polls.
///
/// At most one trains request is in flight: a tick that finds the previous
/// request unfinished is dropped, so snapshots are applied in issue order.
pub struct LivePoller<S: TrainSource> {
    source: Arc<S>,
    interval: Duration,
    next_tick: Option<Instant>,
    next_cycle: u64,
    trains: Option<PendingTrains>,
    stations: Option<Promise<Result<Vec<Station>>>>,
    stations_loaded: bool,
}

impl<S: TrainSource> LivePoller<S> {
    pub fn new(source: S) -> Self {
        Self::with_interval(source, POLL_INTERVAL)
    }

    pub fn with_interval(source: S, interval: Duration) -> Self {
        LivePoller {
            source: Arc::new(source),
            interval,
            next_tick: None,
            next_cycle: 1,
            trains: None,
            stations: None,
            stations_loaded: false,
        }
    }

    /// True once the station directory has been fetched successfully.
    pub fn stations_loaded(&self) -> bool {
        self.stations_loaded
    }

    pub fn is_fetching(&self) -> bool {
        self.trains.is_some()
    }

    /// Time left until the next tick, zero when one is due.
    pub fn time_until_tick(&self, now: Instant) -> Duration {
        self.next_tick
            .map(|tick| tick.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }

    /// Collects finished requests and issues new ones when a tick is due.
    pub fn poll(&mut self, now: Instant) -> Vec<PollEvent> {
        let mut events = Vec::new();

        if let Some(stations) = self.collect_stations() {
            events.push(PollEvent::StationsLoaded(stations));
        }
        if let Some((cycle, trains)) = self.collect_trains() {
            events.push(PollEvent::Snapshot { cycle, trains });
        }

        if self.tick_due(now) {
            self.on_tick();
        }

        events
    }

    fn tick_due(&mut self, now: Instant) -> bool {
        match self.next_tick {
            None => {
                self.next_tick = Some(now + self.interval);
                true
            }
            Some(tick) if tick <= now => {
                let mut next = tick + self.interval;
                if next <= now {
                    // Fell behind (suspended, slow consumer): restart the schedule.
                    next = now + self.interval;
                }
                self.next_tick = Some(next);
                true
            }
            Some(_) => false,
        }
    }

    fn on_tick(&mut self) {
        if !self.stations_loaded && self.stations.is_none() {
            let source = Arc::clone(&self.source);
            self.stations = Some(Promise::spawn_thread("fetch_stations", move || {
                source.fetch_stations()
            }));
        }

        if let Some(pending) = &self.trains {
            debug!(
                "Cycle {} still in flight, skipping this tick",
                pending.cycle
            );
            return;
        }

        let cycle = self.next_cycle;
        self.next_cycle += 1;
        let source = Arc::clone(&self.source);
        let promise = Promise::spawn_thread(format!("fetch_trains_{}", cycle), move || {
            source.fetch_trains()
        });
        self.trains = Some(PendingTrains { cycle, promise });
    }

    fn collect_stations(&mut self) -> Option<Vec<Station>> {
        let promise = self.stations.take()?;
        match promise.try_take() {
            Ok(Ok(stations)) => {
                info!("Station directory loaded: {} stations", stations.len());
                self.stations_loaded = true;
                Some(stations)
            }
            Ok(Err(e)) => {
                warn!("Station directory unavailable, will retry: {}", e);
                None
            }
            Err(promise) => {
                self.stations = Some(promise);
                None
            }
        }
    }

    fn collect_trains(&mut self) -> Option<(u64, Vec<TrainSnapshot>)> {
        let PendingTrains { cycle, promise } = self.trains.take()?;
        match promise.try_take() {
            Ok(Ok(trains)) => {
                debug!("Cycle {}: {} trains received", cycle, trains.len());
                Some((cycle, trains))
            }
            Ok(Err(e)) => {
                warn!("Cycle {} skipped: {}", cycle, e);
                None
            }
            Err(promise) => {
                self.trains = Some(PendingTrains { cycle, promise });
                None
            }
        }
    }
}
