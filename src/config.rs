use clap::Parser;
use std::path::PathBuf;

/// Mirror the current media player track to Discord Rich Presence
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// settings file (defaults to the user config directory)
    #[arg(short, long)]
    pub settings: Option<PathBuf>,

    /// Discord application ID, overrides the settings file
    #[arg(long)]
    pub app_id: Option<i64>,

    /// MPRIS player to follow, e.g. "spotify"
    #[arg(short, long)]
    pub player: Option<String>,

    /// write the default settings file and exit
    #[arg(long)]
    pub write_default_settings: bool,
}

impl Args {
    pub fn settings_path(&self) -> PathBuf {
        self.settings
            .clone()
            .unwrap_or_else(crate::settings::default_settings_path)
    }
}
