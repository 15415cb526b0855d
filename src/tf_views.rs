// Console views for the headless live map
use crate::tf_models::{Position, TFModels};
use crate::tf_popup::Popup;
use crate::tf_reconciler::{CycleSummary, MarkerAdapter};
use log::{debug, info, trace};
use std::collections::BTreeMap;

/// Marker table printed to the console instead of drawn on a map.
#[derive(Debug, Default)]
pub struct ConsoleMap {
    next_id: u64,
    markers: BTreeMap<u64, (Position, Popup)>,
}

impl ConsoleMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    #[cfg(test)]
    pub fn marker(&self, id: u64) -> Option<&(Position, Popup)> {
        self.markers.get(&id)
    }

    /// One line per marker: position and popup header.
    pub fn render_table(&self) -> String {
        let mut out = String::new();
        for (id, (position, popup)) in &self.markers {
            let next = popup
                .emphasized_row()
                .map(|row| format!("  next: {} {}", row.station, row.time_text()))
                .unwrap_or_default();
            out.push_str(&format!(
                "  #{:<4} ({:>9.5}, {:>9.5})  {}{}\n",
                id, position.latitude, position.longitude, popup.header, next
            ));
        }
        out
    }
}

impl MarkerAdapter for ConsoleMap {
    type Handle = u64;

    fn create(&mut self, position: Position, popup: &Popup) -> u64 {
        self.next_id += 1;
        info!(
            "➕ marker #{} at ({:.5}, {:.5}): {}",
            self.next_id, position.latitude, position.longitude, popup.header
        );
        self.markers.insert(self.next_id, (position, popup.clone()));
        self.next_id
    }

    fn update(&mut self, handle: &u64, position: Position, popup: &Popup) {
        trace!("marker #{} popup: {}", handle, popup.to_markup());
        if let Some(marker) = self.markers.get_mut(handle) {
            if marker.0 != position {
                debug!(
                    "marker #{} moved to ({:.5}, {:.5})",
                    handle, position.latitude, position.longitude
                );
            }
            *marker = (position, popup.clone());
        }
    }

    fn remove(&mut self, handle: &u64) {
        if let Some((_, popup)) = self.markers.remove(handle) {
            info!("➖ marker #{} removed: {}", handle, popup.header);
        }
    }
}

pub struct TFViews;

impl TFViews {
    pub fn show_welcome_screen(trains_url: &str, stations_url: &str) {
        println!("\n{}", "═".repeat(70));
        println!("  ╔═══════════════════════════════════════════════════════════╗");
        println!("  ║              🚆 TRAINFINDER LIVE - NEDERLAND              ║");
        println!("  ║                   Live Train Positions                    ║");
        println!("  ╚═══════════════════════════════════════════════════════════╝");
        println!("{}", "═".repeat(70));
        println!("\n  🌐 Trains:   {}", trains_url);
        println!("  🌐 Stations: {}", stations_url);
        println!("  🔄 Refresh every 5 seconds, press Ctrl+C to stop");
        println!("\n{}", "═".repeat(70));
    }

    pub fn show_cycle(cycle: u64, summary: &CycleSummary, map: &ConsoleMap) {
        println!("\n{}", "─".repeat(70));
        println!(
            "🔄 Cycle #{} at {} | 🚆 {} trains | +{} ~{} -{}{}",
            cycle,
            TFModels::format_timestamp_full(TFModels::get_current_timestamp()),
            map.len(),
            summary.created,
            summary.updated,
            summary.removed,
            if summary.skipped > 0 {
                format!(" | ⚠️  {} skipped", summary.skipped)
            } else {
                String::new()
            }
        );
        println!("{}", "─".repeat(70));
        if map.is_empty() {
            println!("  No trains running right now.");
        } else {
            print!("{}", map.render_table());
        }
    }

    pub fn show_stations_loaded(count: usize) {
        println!("✓ Station directory loaded ({} stations)", count);
    }

    pub fn goodbye_message(cycles: u64) {
        println!("\n{}", "═".repeat(70));
        println!("👋 Stopped after {} cycles. Goodbye!", cycles);
        println!("{}", "═".repeat(70));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tf_cache::StationCache;
    use crate::tf_reconciler::MarkerReconciler;
    use crate::tf_reconciler::tests::train;

    #[test]
    fn console_map_follows_reconciler() {
        let mut reconciler = MarkerReconciler::new();
        let mut map = ConsoleMap::new();
        let stations = StationCache::new();

        reconciler.apply(&[train("A", 52.0, 5.0), train("B", 52.1, 5.1)], &stations, &mut map);
        reconciler.apply(&[train("B", 52.2, 5.2)], &stations, &mut map);

        assert_eq!(map.len(), 1);
        let handle = *reconciler.handle("B").unwrap();
        assert_eq!(map.marker(handle).unwrap().0, Position::new(52.2, 5.2));
    }

    #[test]
    fn table_shows_next_stop() {
        let mut reconciler = MarkerReconciler::new();
        let mut map = ConsoleMap::new();
        reconciler.apply(&[train("A", 52.0, 5.0)], &StationCache::new(), &mut map);

        let table = map.render_table();
        assert!(table.contains("NS Sprinter to GD"));
        assert!(table.contains("next: UT 23:13"));
    }

    #[test]
    fn removing_unknown_handle_is_harmless() {
        let mut map = ConsoleMap::new();
        map.remove(&42);
        assert!(map.is_empty());
    }
}
