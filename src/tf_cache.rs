// Station directory cache: station code -> display name
use crate::tf_models::Station;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct StationCache {
    names: HashMap<String, String>,
    loaded: bool,
}

impl StationCache {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn from_stations(stations: Vec<Station>) -> Self {
        let mut cache = Self::new();
        cache.load(stations);
        cache
    }

    /// Replaces the whole directory with a freshly fetched one.
    pub fn load(&mut self, stations: Vec<Station>) {
        self.names = stations
            .into_iter()
            .map(|station| (station.code, station.full_name))
            .collect();
        self.loaded = true;
    }

    /// Display name for a station code, or the code itself when unknown.
    pub fn resolve<'a>(&'a self, code: &'a str) -> &'a str {
        self.names.get(code).map(String::as_str).unwrap_or(code)
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn station(code: &str, name: &str) -> Station {
        Station {
            code: code.to_string(),
            full_name: name.to_string(),
        }
    }

    #[test]
    fn unknown_codes_fall_back_to_the_code() {
        let cache = StationCache::from_stations(vec![station("UT", "Utrecht Centraal")]);
        assert_eq!(cache.resolve("UT"), "Utrecht Centraal");
        assert_eq!(cache.resolve("ZZ99"), "ZZ99");
    }

    #[test]
    fn resolve_works_before_load() {
        let cache = StationCache::new();
        assert!(!cache.is_loaded());
        assert_eq!(cache.resolve("AMF"), "AMF");
    }

    #[test]
    fn load_replaces_previous_directory() {
        let mut cache = StationCache::from_stations(vec![
            station("UT", "Utrecht Centraal"),
            station("AMF", "Amersfoort"),
        ]);
        assert_eq!(cache.len(), 2);

        cache.load(vec![station("RTD", "Rotterdam Centraal")]);
        assert!(cache.is_loaded());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.resolve("RTD"), "Rotterdam Centraal");
        assert_eq!(cache.resolve("UT"), "UT");
    }

    #[test]
    fn empty_directory_still_counts_as_loaded() {
        let cache = StationCache::from_stations(Vec::new());
        assert!(cache.is_loaded());
        assert!(cache.is_empty());
    }
}
