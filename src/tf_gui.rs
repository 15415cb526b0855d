// GUI implementation for the TrainFinder live map using egui/eframe
use crate::tf_config::Config;
use crate::tf_controllers::LiveSession;
use crate::tf_models::{Position, TFClient};
use crate::tf_poller::LivePoller;
use crate::tf_popup::Popup;
use crate::tf_reconciler::MarkerAdapter;
use anyhow::Context;
use chrono::Local;
use eframe::egui;
use egui::{Align2, Color32, FontId, Pos2, RichText, Sense, Stroke, Ui, Vec2};
use egui_extras::{Column, TableBuilder};
use std::collections::HashMap;
use std::f64::consts::PI;
use std::time::{Duration, Instant};

// ============================================================================
// Marker Layer
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerId(u64);

#[derive(Debug, Clone)]
pub struct MapMarker {
    pub position: Position,
    pub popup: Popup,
}

/// The markers currently on the map, keyed by the handle handed out on create.
#[derive(Debug, Default)]
pub struct MapLayer {
    next_id: u64,
    markers: HashMap<MarkerId, MapMarker>,
}

impl MapLayer {
    pub fn get(&self, id: MarkerId) -> Option<&MapMarker> {
        self.markers.get(&id)
    }

    pub fn contains(&self, id: MarkerId) -> bool {
        self.markers.contains_key(&id)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MarkerId, &MapMarker)> {
        self.markers.iter().map(|(id, marker)| (*id, marker))
    }
}

impl MarkerAdapter for MapLayer {
    type Handle = MarkerId;

    fn create(&mut self, position: Position, popup: &Popup) -> MarkerId {
        self.next_id += 1;
        let id = MarkerId(self.next_id);
        self.markers.insert(
            id,
            MapMarker {
                position,
                popup: popup.clone(),
            },
        );
        id
    }

    fn update(&mut self, handle: &MarkerId, position: Position, popup: &Popup) {
        if let Some(marker) = self.markers.get_mut(handle) {
            marker.position = position;
            marker.popup = popup.clone();
        }
    }

    fn remove(&mut self, handle: &MarkerId) {
        self.markers.remove(handle);
    }
}

// ============================================================================
// Map View (Web Mercator, 256 px tiles)
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct MapView {
    pub center: Position,
    pub zoom: f64,
}

impl Default for MapView {
    fn default() -> Self {
        MapView {
            center: Position::new(51.32889547080779, 5.034484863281251),
            zoom: 9.0,
        }
    }
}

impl MapView {
    const MIN_ZOOM: f64 = 3.0;
    const MAX_ZOOM: f64 = 18.0;
    const MAX_LATITUDE: f64 = 85.05112878;

    fn world_size(&self) -> f64 {
        256.0 * 2f64.powf(self.zoom)
    }

    fn to_world(&self, position: Position) -> (f64, f64) {
        let size = self.world_size();
        let lat = position
            .latitude
            .clamp(-Self::MAX_LATITUDE, Self::MAX_LATITUDE)
            .to_radians();
        let x = (position.longitude + 180.0) / 360.0 * size;
        let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * size;
        (x, y)
    }

    fn from_world(&self, x: f64, y: f64) -> Position {
        let size = self.world_size();
        let longitude = x / size * 360.0 - 180.0;
        let latitude = (PI * (1.0 - 2.0 * y / size)).sinh().atan().to_degrees();
        Position::new(latitude, longitude)
    }

    /// Screen position of a coordinate, with the view centre at `origin`.
    pub fn project(&self, position: Position, origin: Pos2) -> Pos2 {
        let (cx, cy) = self.to_world(self.center);
        let (x, y) = self.to_world(position);
        origin + Vec2::new((x - cx) as f32, (y - cy) as f32)
    }

    pub fn unproject(&self, point: Pos2, origin: Pos2) -> Position {
        let (cx, cy) = self.to_world(self.center);
        let offset = point - origin;
        self.from_world(cx + offset.x as f64, cy + offset.y as f64)
    }

    /// Moves the map along with a drag of `delta` screen points.
    pub fn pan(&mut self, delta: Vec2) {
        let (cx, cy) = self.to_world(self.center);
        self.center = self.from_world(cx - delta.x as f64, cy - delta.y as f64);
    }

    pub fn zoom_by(&mut self, steps: f64) {
        self.zoom = (self.zoom + steps).clamp(Self::MIN_ZOOM, Self::MAX_ZOOM);
    }
}

// ============================================================================
// Application State
// ============================================================================

pub struct TrainMapApp {
    session: LiveSession<TFClient, MapLayer>,
    view: MapView,
    selected: Option<MarkerId>,
    started: Instant,
}

impl TrainMapApp {
    const MARKER_RADIUS: f32 = 7.0;
    const HIT_RADIUS: f32 = 11.0;
    const REPAINT_EVERY: Duration = Duration::from_millis(200);

    pub fn new(session: LiveSession<TFClient, MapLayer>) -> Self {
        TrainMapApp {
            session,
            view: MapView::default(),
            selected: None,
            started: Instant::now(),
        }
    }

    fn marker_at(&self, pointer: Pos2, origin: Pos2) -> Option<MarkerId> {
        self.session
            .map
            .iter()
            .map(|(id, marker)| {
                let distance = self.view.project(marker.position, origin).distance(pointer);
                (id, distance)
            })
            .filter(|(_, distance)| *distance <= Self::HIT_RADIUS)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }
}

impl eframe::App for TrainMapApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.session.step(Instant::now());

        if let Some(id) = self.selected {
            if !self.session.map.contains(id) {
                self.selected = None;
            }
        }

        ctx.request_repaint_after(Self::REPAINT_EVERY);

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("🚆 TrainFinder Live");
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(Local::now().format("%H:%M:%S").to_string());
                });
            });
        });

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            self.show_status(ui);
        });

        egui::SidePanel::right("train_panel")
            .min_width(260.0)
            .show(ctx, |ui| {
                self.show_selected(ui);
                ui.separator();
                self.show_train_list(ui);
            });

        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(Color32::from_rgb(226, 232, 222)))
            .show(ctx, |ui| {
                self.show_map(ui);
            });
    }
}

// ============================================================================
// View Implementations
// ============================================================================

impl TrainMapApp {
    fn show_status(&self, ui: &mut Ui) {
        ui.horizontal(|ui| {
            ui.label(format!("🚆 {} trains", self.session.reconciler.len()));
            ui.separator();
            if self.session.stations.is_loaded() {
                ui.label(format!("📍 {} stations", self.session.stations.len()));
            } else {
                ui.colored_label(Color32::from_rgb(255, 165, 0), "📍 Stations loading...");
            }
            ui.separator();
            match self.session.last_cycle {
                Some((cycle, summary)) => {
                    ui.label(format!(
                        "🔄 Cycle #{}: +{} ~{} -{}",
                        cycle, summary.created, summary.updated, summary.removed
                    ));
                    if summary.skipped > 0 {
                        ui.colored_label(
                            Color32::from_rgb(255, 165, 0),
                            format!("⚠️ {} skipped", summary.skipped),
                        );
                    }
                }
                None => {
                    ui.label(format!(
                        "🔄 Waiting for first update ({}s)",
                        self.started.elapsed().as_secs()
                    ));
                }
            }
            ui.separator();
            if self.session.poller.is_fetching() {
                ui.spinner();
            } else {
                let wait = self.session.poller.time_until_tick(Instant::now());
                ui.label(format!("Next update in {}s", wait.as_secs()));
            }
        });
    }

    fn show_selected(&self, ui: &mut Ui) {
        ui.heading("Selected train");
        let marker = self.selected.and_then(|id| self.session.map.get(id));
        match marker {
            Some(marker) => {
                if let Some(ride_code) = self
                    .selected
                    .and_then(|id| self.session.reconciler.ride_code_for(&id))
                {
                    ui.label(format!("Ride {}", ride_code));
                }
                show_popup(ui, &marker.popup, "selected_popup");
                if ui.button("📋 Copy as HTML").clicked() {
                    let markup = marker.popup.to_markup();
                    ui.output_mut(|o| o.copied_text = markup);
                }
            }
            None => {
                ui.label("Click a train on the map to see its schedule.");
            }
        }
    }

    fn show_train_list(&mut self, ui: &mut Ui) {
        ui.heading("Trains");
        let rows: Vec<(MarkerId, String, String)> = self
            .session
            .reconciler
            .ride_codes()
            .into_iter()
            .filter_map(|ride_code| {
                let id = *self.session.reconciler.handle(ride_code)?;
                let marker = self.session.map.get(id)?;
                Some((id, ride_code.to_string(), marker.popup.header.clone()))
            })
            .collect();

        let mut clicked = None;
        TableBuilder::new(ui)
            .striped(true)
            .column(Column::auto().at_least(60.0))
            .column(Column::remainder())
            .header(20.0, |mut header| {
                header.col(|ui| {
                    ui.strong("Ride");
                });
                header.col(|ui| {
                    ui.strong("Train");
                });
            })
            .body(|mut body| {
                for (id, ride_code, header) in &rows {
                    body.row(18.0, |mut row| {
                        row.col(|ui| {
                            if ui
                                .selectable_label(self.selected == Some(*id), ride_code.as_str())
                                .clicked()
                            {
                                clicked = Some(*id);
                            }
                        });
                        row.col(|ui| {
                            ui.label(header.as_str());
                        });
                    });
                }
            });

        if let Some(id) = clicked {
            if let Some(marker) = self.session.map.get(id) {
                self.view.center = marker.position;
            }
            self.selected = Some(id);
        }
    }

    fn show_map(&mut self, ui: &mut Ui) {
        let (response, painter) = ui.allocate_painter(ui.available_size(), Sense::click_and_drag());
        let rect = response.rect;
        let origin = rect.center();

        if response.dragged() {
            self.view.pan(response.drag_delta());
        }
        if response.hovered() {
            let scroll = ui.input(|i| i.smooth_scroll_delta.y);
            if scroll != 0.0 {
                self.view.zoom_by(scroll as f64 * 0.005);
            }
        }

        self.draw_graticule(&painter, rect, origin);

        let mut markers: Vec<(MarkerId, &MapMarker)> = self.session.map.iter().collect();
        markers.sort_by_key(|(id, _)| *id);
        for (id, marker) in markers {
            let center = self.view.project(marker.position, origin);
            if !rect.expand(Self::MARKER_RADIUS).contains(center) {
                continue;
            }
            let selected = self.selected == Some(id);
            let fill = if selected {
                Color32::from_rgb(0, 48, 130)
            } else {
                Color32::from_rgb(255, 199, 23)
            };
            painter.circle_filled(center, Self::MARKER_RADIUS, fill);
            painter.circle_stroke(center, Self::MARKER_RADIUS, Stroke::new(1.5, Color32::from_rgb(0, 48, 130)));
        }

        let hovered = response
            .hover_pos()
            .and_then(|pointer| self.marker_at(pointer, origin));

        if response.clicked() {
            self.selected = response
                .interact_pointer_pos()
                .and_then(|pointer| self.marker_at(pointer, origin));
        }

        if let Some(marker) = hovered.and_then(|id| self.session.map.get(id)) {
            let popup = marker.popup.clone();
            response.on_hover_ui_at_pointer(|ui| {
                show_popup(ui, &popup, "hover_popup");
            });
        }
    }

    fn draw_graticule(&self, painter: &egui::Painter, rect: egui::Rect, origin: Pos2) {
        let stroke = Stroke::new(0.5, Color32::from_gray(170));
        let top_left = self.view.unproject(rect.left_top(), origin);
        let bottom_right = self.view.unproject(rect.right_bottom(), origin);

        let mut lon = top_left.longitude.floor();
        while lon <= bottom_right.longitude {
            let x = self.view.project(Position::new(self.view.center.latitude, lon), origin).x;
            painter.line_segment([Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())], stroke);
            painter.text(
                Pos2::new(x + 2.0, rect.bottom() - 2.0),
                Align2::LEFT_BOTTOM,
                format!("{:.0}°E", lon),
                FontId::proportional(10.0),
                Color32::from_gray(120),
            );
            lon += 1.0;
        }

        let mut lat = bottom_right.latitude.floor();
        while lat <= top_left.latitude {
            let y = self.view.project(Position::new(lat, self.view.center.longitude), origin).y;
            painter.line_segment([Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)], stroke);
            painter.text(
                Pos2::new(rect.left() + 2.0, y - 2.0),
                Align2::LEFT_BOTTOM,
                format!("{:.0}°N", lat),
                FontId::proportional(10.0),
                Color32::from_gray(120),
            );
            lat += 1.0;
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn show_popup(ui: &mut Ui, popup: &Popup, id: &str) {
    ui.label(RichText::new(&popup.header).strong());
    if popup.rows.is_empty() {
        return;
    }
    egui::Grid::new(id).striped(true).show(ui, |ui| {
        for row in &popup.rows {
            let mut station = RichText::new(&row.station);
            let mut time = RichText::new(row.time_text());
            if row.delay.is_some() {
                time = time.color(Color32::from_rgb(200, 40, 40));
            }
            if row.emphasized {
                station = station.strong();
                time = time.strong();
            }
            ui.label(station);
            ui.label(time);
            ui.label(row.track.as_deref().unwrap_or(""));
            ui.end_row();
        }
    });
}

// ============================================================================
// Public entry point
// ============================================================================

pub fn run_gui(config: &Config) -> anyhow::Result<()> {
    let client = TFClient::new(&config.base_url, &config.stations_path, &config.trains_path)
        .context("Could not set up the HTTP client")?;
    let session = LiveSession::new(LivePoller::new(client), MapLayer::default());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([800.0, 600.0]),
        ..Default::default()
    };

    eframe::run_native(
        "TrainFinder Live",
        options,
        Box::new(move |_cc| Ok(Box::new(TrainMapApp::new(session)))),
    )
    .map_err(|e| anyhow::anyhow!("Map window failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tf_cache::StationCache;
    use crate::tf_reconciler::MarkerReconciler;
    use crate::tf_reconciler::tests::train;
    use approx::assert_relative_eq;

    #[test]
    fn layer_tracks_reconciler_effects() {
        let mut reconciler = MarkerReconciler::new();
        let mut layer = MapLayer::default();
        let stations = StationCache::new();

        reconciler.apply(&[train("A", 52.0, 5.0), train("B", 52.1, 5.1)], &stations, &mut layer);
        let id_a = *reconciler.handle("A").unwrap();
        let id_b = *reconciler.handle("B").unwrap();
        assert_ne!(id_a, id_b);

        reconciler.apply(&[train("B", 52.3, 5.3)], &stations, &mut layer);
        assert!(!layer.contains(id_a));
        assert_eq!(layer.len(), 1);
        assert_eq!(layer.get(id_b).unwrap().position, Position::new(52.3, 5.3));
    }

    #[test]
    fn centre_projects_to_origin() {
        let view = MapView::default();
        let origin = Pos2::new(400.0, 300.0);
        let p = view.project(view.center, origin);
        assert_relative_eq!(p.x, origin.x, epsilon = 1e-3);
        assert_relative_eq!(p.y, origin.y, epsilon = 1e-3);
    }

    #[test]
    fn north_is_up_and_east_is_right() {
        let view = MapView::default();
        let origin = Pos2::new(0.0, 0.0);
        let north_east = Position::new(view.center.latitude + 0.5, view.center.longitude + 0.5);
        let p = view.project(north_east, origin);
        assert!(p.x > 0.0);
        assert!(p.y < 0.0);
    }

    #[test]
    fn unproject_inverts_project() {
        let view = MapView::default();
        let origin = Pos2::new(640.0, 400.0);
        let utrecht = Position::new(52.0894, 5.1101);
        let back = view.unproject(view.project(utrecht, origin), origin);
        assert_relative_eq!(back.latitude, utrecht.latitude, epsilon = 1e-3);
        assert_relative_eq!(back.longitude, utrecht.longitude, epsilon = 1e-3);
    }

    #[test]
    fn latitude_degrees_stretch_towards_the_pole() {
        let view = MapView::default();
        let origin = Pos2::new(0.0, 0.0);
        let band = |lat: f64| {
            let south = view.project(Position::new(lat, 5.0), origin).y;
            let north = view.project(Position::new(lat + 1.0, 5.0), origin).y;
            (south - north) as f64
        };
        let scale = 256.0 * 2f64.powf(view.zoom) / 360.0;

        // One degree of longitude keeps its width, one degree of latitude
        // grows by 1/cos(lat).
        let east = view.project(Position::new(52.0, 6.0), origin).x
            - view.project(Position::new(52.0, 5.0), origin).x;
        assert_relative_eq!(east as f64, scale, max_relative = 1e-4);
        assert_relative_eq!(band(0.0), scale, max_relative = 1e-3);
        assert_relative_eq!(band(52.0), scale / 52.5f64.to_radians().cos(), max_relative = 1e-2);
        assert!(band(60.0) > band(52.0));
    }

    #[test]
    fn panning_moves_the_centre_against_the_drag() {
        let mut view = MapView::default();
        let before = view.center;
        view.pan(Vec2::new(100.0, 0.0));
        assert!(view.center.longitude < before.longitude);
        assert_relative_eq!(view.center.latitude, before.latitude, epsilon = 1e-9);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut view = MapView::default();
        view.zoom_by(100.0);
        assert_relative_eq!(view.zoom, MapView::MAX_ZOOM);
        view.zoom_by(-100.0);
        assert_relative_eq!(view.zoom, MapView::MIN_ZOOM);
    }
}
