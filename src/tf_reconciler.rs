// Keeps the map's train markers in sync with the latest live snapshot
use crate::tf_cache::StationCache;
use crate::tf_models::{Position, TrainSnapshot};
use crate::tf_popup::{build_popup, Popup};
use log::{debug, warn};
use std::collections::{HashMap, HashSet};

/// What the reconciler needs from a map: create, move and delete markers.
pub trait MarkerAdapter {
    type Handle: Clone + PartialEq;

    fn create(&mut self, position: Position, popup: &Popup) -> Self::Handle;
    fn update(&mut self, handle: &Self::Handle, position: Position, popup: &Popup);
    fn remove(&mut self, handle: &Self::Handle);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
    pub skipped: usize,
}

#[derive(Debug)]
pub struct MarkerReconciler<H> {
    /// Marker handle per ride code
    tracked: HashMap<String, H>,
}

impl<H> Default for MarkerReconciler<H> {
    fn default() -> Self {
        MarkerReconciler {
            tracked: HashMap::new(),
        }
    }
}

impl<H: Clone + PartialEq> MarkerReconciler<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one snapshot: new ride codes get a marker, known ones are moved
    /// and refreshed in place, and ride codes missing from the snapshot lose
    /// their marker.
    pub fn apply<A>(
        &mut self,
        snapshot: &[TrainSnapshot],
        stations: &StationCache,
        map: &mut A,
    ) -> CycleSummary
    where
        A: MarkerAdapter<Handle = H>,
    {
        let mut summary = CycleSummary::default();
        let mut present: HashSet<&str> = HashSet::with_capacity(snapshot.len());

        for train in snapshot {
            if let Err(e) = train.validate() {
                warn!("Skipping train record: {}", e);
                summary.skipped += 1;
                continue;
            }

            present.insert(train.ride_code.as_str());
            let popup = build_popup(train, stations);

            match self.tracked.get(&train.ride_code) {
                Some(handle) => {
                    map.update(handle, train.position, &popup);
                    summary.updated += 1;
                }
                None => {
                    let handle = map.create(train.position, &popup);
                    self.tracked.insert(train.ride_code.clone(), handle);
                    summary.created += 1;
                }
            }
        }

        let stale: Vec<String> = self
            .tracked
            .keys()
            .filter(|ride_code| !present.contains(ride_code.as_str()))
            .cloned()
            .collect();

        for ride_code in stale {
            if let Some(handle) = self.tracked.remove(&ride_code) {
                debug!("Train {} left the live set", ride_code);
                map.remove(&handle);
                summary.removed += 1;
            }
        }

        summary
    }

    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }

    #[cfg(test)]
    pub fn contains(&self, ride_code: &str) -> bool {
        self.tracked.contains_key(ride_code)
    }

    pub fn handle(&self, ride_code: &str) -> Option<&H> {
        self.tracked.get(ride_code)
    }

    pub fn ride_code_for(&self, handle: &H) -> Option<&str> {
        self.tracked
            .iter()
            .find(|(_, tracked)| *tracked == handle)
            .map(|(ride_code, _)| ride_code.as_str())
    }

    /// Tracked ride codes, sorted for stable display.
    pub fn ride_codes(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = self.tracked.keys().map(String::as_str).collect();
        codes.sort_unstable();
        codes
    }
}
