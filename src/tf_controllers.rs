// Controllers for the TrainFinder live client (headless mode)
use crate::tf_cache::StationCache;
use crate::tf_config::Config;
use crate::tf_models::{TFClient, TrainSource};
use crate::tf_poller::{LivePoller, PollEvent};
use crate::tf_reconciler::{CycleSummary, MarkerAdapter, MarkerReconciler};
use crate::tf_views::{ConsoleMap, TFViews};
use anyhow::Context;
use log::debug;
use std::thread;
use std::time::{Duration, Instant};

/// Everything one live session owns: the fetch schedule, the station
/// directory, the tracked markers and the map they are drawn on.
pub struct LiveSession<S: TrainSource, M: MarkerAdapter> {
    pub poller: LivePoller<S>,
    pub stations: StationCache,
    pub reconciler: MarkerReconciler<M::Handle>,
    pub map: M,
    pub last_cycle: Option<(u64, CycleSummary)>,
}

impl<S: TrainSource, M: MarkerAdapter> LiveSession<S, M> {
    pub fn new(poller: LivePoller<S>, map: M) -> Self {
        LiveSession {
            poller,
            stations: StationCache::new(),
            reconciler: MarkerReconciler::new(),
            map,
            last_cycle: None,
        }
    }

    /// Polls once and applies whatever arrived. Returns the cycles applied.
    pub fn step(&mut self, now: Instant) -> Vec<(u64, CycleSummary)> {
        let mut applied = Vec::new();

        for event in self.poller.poll(now) {
            match event {
                PollEvent::StationsLoaded(stations) => self.stations.load(stations),
                PollEvent::Snapshot { cycle, trains } => {
                    let summary = self.reconciler.apply(&trains, &self.stations, &mut self.map);
                    debug!(
                        "Cycle {}: {} created, {} updated, {} removed, {} skipped",
                        cycle, summary.created, summary.updated, summary.removed, summary.skipped
                    );
                    self.last_cycle = Some((cycle, summary));
                    applied.push((cycle, summary));
                }
            }
        }

        applied
    }
}

pub struct TFControllers;

impl TFControllers {
    const IDLE_SLEEP: Duration = Duration::from_millis(100);

    /// Console loop: poll, apply, print. Runs until `--cycles` is reached.
    pub fn run_headless(config: &Config) -> anyhow::Result<()> {
        let client = TFClient::new(&config.base_url, &config.stations_path, &config.trains_path)
            .context("Could not set up the HTTP client")?;
        TFViews::show_welcome_screen(client.trains_url(), client.stations_url());

        let mut session = LiveSession::new(LivePoller::new(client), ConsoleMap::new());
        let mut applied_cycles = 0;
        let mut stations_announced = false;

        loop {
            for (cycle, summary) in session.step(Instant::now()) {
                applied_cycles += 1;
                TFViews::show_cycle(cycle, &summary, &session.map);
            }

            if !stations_announced && session.poller.stations_loaded() {
                TFViews::show_stations_loaded(session.stations.len());
                stations_announced = true;
            }

            if config.cycles.is_some_and(|limit| applied_cycles >= limit) {
                TFViews::goodbye_message(applied_cycles);
                return Ok(());
            }

            thread::sleep(Self::IDLE_SLEEP);
        }
    }
}
