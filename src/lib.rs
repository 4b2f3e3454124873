mod config;
mod discord;
mod logging;
pub mod player;
pub mod presence;
pub mod reporting;
pub mod settings;

pub use config::Args;
pub use discord::DiscordPresence;
pub use logging::init_logging;

use player::MprisPlayerSource;
use presence::PresenceBridge;
use reporting::{ErrorReporter, HttpReporter, TracingReporter};
use settings::{load_settings, save_settings, AppSettings};

/// Resolves on Ctrl-C. If the signal handler cannot be installed it never resolves.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown requested"),
        Err(e) => {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

pub async fn run(args: Args) -> Result<(), String> {
    let settings_path = args.settings_path();

    if args.write_default_settings {
        save_settings(&settings_path, &AppSettings::default())?;
        tracing::info!("Wrote default settings to {}", settings_path.display());
        return Ok(());
    }

    let mut settings = load_settings(&settings_path)?;
    if let Some(app_id) = args.app_id {
        settings.application_id = app_id;
    }
    if let Some(player) = args.player {
        settings.player = Some(player);
    }

    let reporter: Box<dyn ErrorReporter> = match settings.error_report_url()? {
        Some(endpoint) => {
            tracing::info!("Reporting presence errors to {}", endpoint);
            Box::new(HttpReporter::new(endpoint))
        }
        None => Box::new(TracingReporter),
    };

    let player = MprisPlayerSource::connect(settings.player.clone())
        .await
        .map_err(|e| format!("Failed to connect to media players: {}", e))?;

    let sink = DiscordPresence::init(settings.application_id);

    PresenceBridge::new(Box::new(player), Box::new(sink), Box::new(settings), reporter)
        .run(shutdown_signal())
        .await;

    Ok(())
}
