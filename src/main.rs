//! HL VOX TimeLEFT - Main Entry Point
//!
//! Usage: `timeleft [HH:MM:SS]`

use std::io::Write;

use timeleft::constants;
use timeleft::logic::telemetry::{Identity, Metadata, Pipeline, TrackerConfig};
use timeleft::logic::timer::{self, Countdown};

fn main() {
    dotenvy::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting {} v{}", constants::APP_NAME, constants::APP_VERSION);

    let time_str = std::env::args()
        .nth(1)
        .unwrap_or_else(|| constants::DEFAULT_POMODORO_TIME.to_string());

    let Some(total_seconds) = timer::parse_time_string(&time_str) else {
        eprintln!("Invalid time '{}', expected HH:MM:SS", time_str);
        std::process::exit(2);
    };

    let config = TrackerConfig::default();
    let pipeline = Pipeline::connect(&config, Identity::current());

    pipeline.track("app_launch", "app", None);

    let mut meta = Metadata::new();
    meta.insert("time".to_string(), time_str.clone());
    pipeline.track("button_click", "start_button", Some(&meta));

    Countdown::new(&pipeline, constants::COUNTDOWN_THRESHOLD).run(total_seconds, |remaining| {
        print!("\r{}", remaining);
        let _ = std::io::stdout().flush();
    });
    println!();

    match serde_json::to_string(&pipeline.stats()) {
        Ok(stats) => log::debug!("Clickstream stats: {}", stats),
        Err(e) => log::warn!("Failed to serialize stats: {}", e),
    }

    pipeline.shutdown();
    log::info!("Session {} finished", pipeline.session_id());
}
