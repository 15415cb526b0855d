// Command line and environment configuration
use clap::Parser;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/trainfinder/rest";

#[derive(Parser, Debug, Clone)]
#[command(
    name = "trainfinder-live",
    version,
    about = "Live map of the trains currently running on the Dutch rail network"
)]
pub struct Config {
    /// Base URL of the TrainFinder REST service
    #[arg(long, env = "TRAINFINDER_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Path of the station directory resource
    #[arg(long, env = "TRAINFINDER_STATIONS_PATH", default_value = "/train/getStations")]
    pub stations_path: String,

    /// Path of the live trains resource
    #[arg(long, env = "TRAINFINDER_TRAINS_PATH", default_value = "/train/trains")]
    pub trains_path: String,

    /// Run without a window, logging marker changes to the console
    #[arg(long)]
    pub headless: bool,

    /// Stop after this many applied cycles (headless only)
    #[arg(long, requires = "headless")]
    pub cycles: Option<u64>,
}

impl Config {
    /// Loads `.env` (if any) and parses the command line.
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Config::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_the_local_service() {
        let config = Config::try_parse_from(["trainfinder-live"]).unwrap();
        assert!(!config.headless);
        assert_eq!(config.cycles, None);
        assert_eq!(config.trains_path, "/train/trains");
        assert_eq!(config.stations_path, "/train/getStations");
    }

    #[test]
    fn headless_with_cycle_limit() {
        let config = Config::try_parse_from([
            "trainfinder-live",
            "--headless",
            "--cycles",
            "3",
            "--base-url",
            "http://trains.example/rest",
        ])
        .unwrap();
        assert!(config.headless);
        assert_eq!(config.cycles, Some(3));
        assert_eq!(config.base_url, "http://trains.example/rest");
    }

    #[test]
    fn cycle_limit_requires_headless() {
        assert!(Config::try_parse_from(["trainfinder-live", "--cycles", "3"]).is_err());
    }
}
