use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

const SETTINGS_FILE: &str = "settings.json";

/// Discord Application ID used when none is configured
pub const DEFAULT_APPLICATION_ID: i64 = 383816327850360843;

/// Top and bottom line templates for one player state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplatePair {
    pub top: String,
    pub bottom: String,
}

/// Read-only view of the user's presence settings
pub trait SettingsSource: Send + Sync {
    /// Templates used for every state other than playing
    fn paused_templates(&self) -> TemplatePair;

    fn playing_templates(&self) -> TemplatePair;

    /// Whether to show elapsed/remaining time while playing
    fn display_playback_duration(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub application_id: i64,
    pub paused_top_line: String,
    pub paused_bottom_line: String,
    pub playing_top_line: String,
    pub playing_bottom_line: String,
    pub display_playback_duration: bool,
    /// Endpoint that receives JSON error reports
    pub error_report_url: Option<String>,
    /// Short MPRIS name of the player to follow, e.g. "spotify"
    pub player: Option<String>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            application_id: DEFAULT_APPLICATION_ID,
            paused_top_line: "Paused: %track".to_string(),
            paused_bottom_line: "%artist".to_string(),
            playing_top_line: "%track".to_string(),
            playing_bottom_line: "%artist".to_string(),
            display_playback_duration: true,
            error_report_url: None,
            player: None,
        }
    }
}

impl AppSettings {
    pub fn error_report_url(&self) -> Result<Option<Url>, String> {
        self.error_report_url
            .as_deref()
            .map(|url| Url::parse(url).map_err(|e| format!("Invalid error report URL: {}", e)))
            .transpose()
    }
}

impl SettingsSource for AppSettings {
    fn paused_templates(&self) -> TemplatePair {
        TemplatePair {
            top: self.paused_top_line.clone(),
            bottom: self.paused_bottom_line.clone(),
        }
    }

    fn playing_templates(&self) -> TemplatePair {
        TemplatePair {
            top: self.playing_top_line.clone(),
            bottom: self.playing_bottom_line.clone(),
        }
    }

    fn display_playback_duration(&self) -> bool {
        self.display_playback_duration
    }
}

pub fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tunes-presence")
        .join(SETTINGS_FILE)
}

pub fn load_settings(path: &Path) -> Result<AppSettings, String> {
    tracing::debug!("Loading settings from {}", path.display());

    if !path.exists() {
        tracing::info!("No settings file at {}, using defaults", path.display());
        return Ok(AppSettings::default());
    }

    let contents =
        fs::read_to_string(path).map_err(|e| format!("Failed to read settings file: {}", e))?;

    let settings: AppSettings =
        serde_json::from_str(&contents).map_err(|e| format!("Failed to parse settings: {}", e))?;

    settings.error_report_url()?;

    Ok(settings)
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> Result<(), String> {
    tracing::debug!("Saving settings to {}", path.display());

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create settings directory: {}", e))?;
    }

    let contents = serde_json::to_string_pretty(settings)
        .map_err(|e| format!("Failed to serialize settings: {}", e))?;

    fs::write(path, contents).map_err(|e| format!("Failed to write settings file: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings(&dir.path().join("missing.json")).unwrap();
        assert_eq!(settings, AppSettings::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILE);

        let settings = AppSettings {
            playing_top_line: "%track (%playlist_type)".to_string(),
            display_playback_duration: false,
            player: Some("spotify".to_string()),
            ..Default::default()
        };

        save_settings(&path, &settings).unwrap();
        assert_eq!(load_settings(&path).unwrap(), settings);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, r#"{ "paused_top_line": "Taking a break" }"#).unwrap();

        let settings = load_settings(&path).unwrap();
        assert_eq!(settings.paused_top_line, "Taking a break");
        assert_eq!(settings.playing_top_line, "%track");
        assert!(settings.display_playback_duration);
    }

    #[test]
    fn test_invalid_files_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);

        fs::write(&path, "not json").unwrap();
        assert!(load_settings(&path)
            .unwrap_err()
            .starts_with("Failed to parse settings"));

        fs::write(&path, r#"{ "error_report_url": "not a url" }"#).unwrap();
        assert!(load_settings(&path)
            .unwrap_err()
            .starts_with("Invalid error report URL"));
    }

    #[test]
    fn test_settings_source_pairs() {
        let settings = AppSettings::default();
        assert_eq!(
            settings.playing_templates(),
            TemplatePair {
                top: "%track".to_string(),
                bottom: "%artist".to_string()
            }
        );
        assert_eq!(settings.paused_templates().top, "Paused: %track");
        assert!(settings.display_playback_duration());
    }
}
