mod tf_cache;
mod tf_config;
mod tf_controllers;
mod tf_gui;
mod tf_models;
mod tf_poller;
mod tf_popup;
mod tf_reconciler;
mod tf_views;

use log::error;
use tf_config::Config;
use tf_controllers::TFControllers;

fn main() {
    // Set up panic hook for better error messages
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("\n{}", "═".repeat(70));
        eprintln!("❌ APPLICATION PANIC");
        eprintln!("{}", "═".repeat(70));
        eprintln!("\nThe application encountered an unexpected error:");
        eprintln!("{}", panic_info);
        eprintln!("\n💡 Troubleshooting:");
        eprintln!("  • Please restart the application");
        eprintln!("  • Check that the TrainFinder service is reachable");
        eprintln!("  • Report this issue if it persists");
        eprintln!("\n{}", "═".repeat(70));
    }));

    let config = Config::load();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let result = if config.headless {
        TFControllers::run_headless(&config)
    } else {
        tf_gui::run_gui(&config)
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
