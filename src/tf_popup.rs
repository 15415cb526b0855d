// Popup content for a train marker: destination header plus the stop schedule
use crate::tf_cache::StationCache;
use crate::tf_models::{TFModels, TrainSnapshot};

#[derive(Debug, Clone, PartialEq)]
pub struct PopupRow {
    pub station: String,
    pub departure: String,
    pub delay: Option<String>,
    pub track: Option<String>,
    pub emphasized: bool,
}

impl PopupRow {
    /// Departure time with the delay annotation directly after it.
    pub fn time_text(&self) -> String {
        match &self.delay {
            Some(delay) => format!("{} {}", self.departure, delay),
            None => self.departure.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Popup {
    pub header: String,
    pub rows: Vec<PopupRow>,
}

impl Popup {
    pub fn emphasized_row(&self) -> Option<&PopupRow> {
        self.rows.iter().find(|row| row.emphasized)
    }

    /// HTML rendering, as a web map popup would show it.
    pub fn to_markup(&self) -> String {
        let mut html = format!("<p>{}</p><table>", escape_html(&self.header));
        for row in &self.rows {
            let station = escape_html(&row.station);
            let time = escape_html(&row.time_text());
            html.push_str("<tr>");
            if row.emphasized {
                html.push_str(&format!("<td><b>{}</b></td><td><b>{}</b></td>", station, time));
            } else {
                html.push_str(&format!("<td>{}</td><td>{}</td>", station, time));
            }
            if let Some(track) = &row.track {
                html.push_str(&format!("<td>{}</td>", escape_html(track)));
            }
            html.push_str("</tr>");
        }
        html.push_str("</table>");
        html
    }
}

/// Builds the popup for one train. Pure: the only inputs are the train record
/// and the station directory.
pub fn build_popup(train: &TrainSnapshot, stations: &StationCache) -> Popup {
    let header = match train.destination() {
        Some(last) => format!(
            "{} {} to {}",
            train.carrier,
            train.train_type,
            stations.resolve(&last.station)
        ),
        None => format!("{} {}", train.carrier, train.train_type),
    };

    // Only the first stop matching the next stop code is highlighted.
    let emphasized_idx = train
        .next_stop
        .as_deref()
        .and_then(|next| train.stops.iter().position(|stop| stop.station == next));

    let rows = train
        .stops
        .iter()
        .enumerate()
        .map(|(idx, stop)| PopupRow {
            station: stations.resolve(&stop.station).to_string(),
            departure: TFModels::format_departure(stop.departure_time),
            delay: TFModels::format_delay(stop.delay),
            track: stop.track.clone(),
            emphasized: Some(idx) == emphasized_idx,
        })
        .collect();

    Popup {
        header: header.trim().to_string(),
        rows,
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tf_models::{Position, Station, TrainStop};

    fn stop(station: &str, departure_time: i64, delay: Option<i64>) -> TrainStop {
        TrainStop {
            station: station.to_string(),
            departure_time,
            delay,
            track: None,
        }
    }

    fn train(next_stop: Option<&str>, stops: Vec<TrainStop>) -> TrainSnapshot {
        TrainSnapshot {
            ride_code: "3530".to_string(),
            carrier: "NS".to_string(),
            train_type: "Intercity".to_string(),
            position: Position::new(52.15, 5.25),
            next_stop: next_stop.map(String::from),
            stops,
        }
    }

    fn stations() -> StationCache {
        StationCache::from_stations(vec![
            Station { code: "AMF".into(), full_name: "Amersfoort Centraal".into() },
            Station { code: "UT".into(), full_name: "Utrecht Centraal".into() },
            Station { code: "RTD".into(), full_name: "Rotterdam Centraal".into() },
        ])
    }

    #[test]
    fn header_names_the_final_stop() {
        let popup = build_popup(
            &train(None, vec![stop("AMF", 1_700_000_000, None), stop("RTD", 1_700_003_000, None)]),
            &stations(),
        );
        assert_eq!(popup.header, "NS Intercity to Rotterdam Centraal");
    }

    #[test]
    fn only_next_stop_row_is_emphasized() {
        let popup = build_popup(
            &train(
                Some("UT"),
                vec![
                    stop("AMF", 1_700_000_000, None),
                    stop("UT", 1_700_000_900, None),
                    stop("RTD", 1_700_003_000, None),
                ],
            ),
            &stations(),
        );

        let emphasized: Vec<bool> = popup.rows.iter().map(|r| r.emphasized).collect();
        assert_eq!(emphasized, vec![false, true, false]);
        assert_eq!(popup.emphasized_row().map(|r| r.station.as_str()), Some("Utrecht Centraal"));
    }

    #[test]
    fn unmatched_next_stop_emphasizes_nothing() {
        let popup = build_popup(
            &train(Some("ASD"), vec![stop("AMF", 1_700_000_000, None), stop("UT", 1_700_000_900, None)]),
            &stations(),
        );
        assert!(popup.emphasized_row().is_none());
    }

    #[test]
    fn repeated_station_emphasizes_a_single_row() {
        let popup = build_popup(
            &train(
                Some("UT"),
                vec![stop("UT", 1_700_000_000, None), stop("AMF", 1_700_000_900, None), stop("UT", 1_700_002_000, None)],
            ),
            &stations(),
        );
        assert_eq!(popup.rows.iter().filter(|r| r.emphasized).count(), 1);
    }

    #[test]
    fn delay_suffix_follows_departure_time() {
        let popup = build_popup(
            &train(
                None,
                vec![
                    stop("AMF", 1_700_000_000, Some(185)),
                    stop("UT", 1_700_000_900, Some(0)),
                    stop("RTD", 1_700_003_000, None),
                ],
            ),
            &stations(),
        );

        assert_eq!(popup.rows[0].time_text(), "23:13 +3min");
        assert_eq!(popup.rows[1].time_text(), "23:28");
        assert_eq!(popup.rows[2].delay, None);
    }

    #[test]
    fn unknown_stations_show_their_code() {
        let popup = build_popup(
            &train(None, vec![stop("ZZ99", 1_700_000_000, None)]),
            &StationCache::new(),
        );
        assert_eq!(popup.header, "NS Intercity to ZZ99");
        assert_eq!(popup.rows[0].station, "ZZ99");
    }

    #[test]
    fn train_without_stops_has_plain_header() {
        let popup = build_popup(&train(Some("UT"), Vec::new()), &stations());
        assert_eq!(popup.header, "NS Intercity");
        assert!(popup.rows.is_empty());
    }

    #[test]
    fn markup_wraps_emphasized_cells_including_delay() {
        let mut stops = vec![stop("AMF", 1_700_000_000, None), stop("UT", 1_700_000_900, Some(185))];
        stops[1].track = Some("5b".to_string());
        let popup = build_popup(&train(Some("UT"), stops), &stations());

        let html = popup.to_markup();
        assert!(html.starts_with("<p>NS Intercity to Utrecht Centraal</p><table>"));
        assert!(html.contains("<tr><td>Amersfoort Centraal</td><td>23:13</td></tr>"));
        assert!(html.contains(
            "<tr><td><b>Utrecht Centraal</b></td><td><b>23:28 +3min</b></td><td>5b</td></tr>"
        ));
        assert!(html.ends_with("</table>"));
    }

    #[test]
    fn markup_escapes_station_names() {
        let cache = StationCache::from_stations(vec![Station {
            code: "X".into(),
            full_name: "Halte <A&B>".into(),
        }]);
        let html = build_popup(&train(None, vec![stop("X", 1_700_000_000, None)]), &cache).to_markup();
        assert!(html.contains("Halte &lt;A&amp;B&gt;"));
        assert!(!html.contains("<A&B>"));
    }

    #[test]
    fn building_twice_gives_the_same_popup() {
        let t = train(Some("UT"), vec![stop("UT", 1_700_000_000, Some(61))]);
        let cache = stations();
        assert_eq!(build_popup(&t, &cache), build_popup(&t, &cache));
    }
}
