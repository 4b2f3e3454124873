//! Error reporting for failed presence pushes

use serde::Serialize;
use url::Url;

use crate::player::PlaybackSnapshot;
use crate::presence::{PresenceError, RichPresence};

/// What the bridge was showing when a push failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DiagnosticContext {
    pub current_artist: String,
    pub current_title: String,
    pub current_state: String,
    pub current_playlist: String,
    pub current_playlist_type: String,
    pub current_position: i64,
    pub details: String,
    pub state: String,
}

impl DiagnosticContext {
    pub fn new(snapshot: &PlaybackSnapshot, presence: &RichPresence) -> Self {
        Self {
            current_artist: snapshot.artist.clone(),
            current_title: snapshot.title.clone(),
            current_state: snapshot.player_state.to_string(),
            current_playlist: snapshot.playlist_name.clone(),
            current_playlist_type: snapshot.playlist_kind.to_string(),
            current_position: snapshot.position_seconds,
            details: presence.top_line.clone(),
            state: presence.bottom_line.clone(),
        }
    }
}

/// Receives push failures. Implementations must not block the caller.
pub trait ErrorReporter: Send + Sync {
    fn capture(&self, error: &PresenceError, context: DiagnosticContext);
}

/// Writes failures to the log
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn capture(&self, error: &PresenceError, context: DiagnosticContext) {
        tracing::error!(?context, "Failed to update presence: {}", error);
    }
}

#[derive(Debug, Serialize)]
struct ErrorEvent {
    message: String,
    level: &'static str,
    release: &'static str,
    timestamp: i64,
    extra: DiagnosticContext,
}

impl ErrorEvent {
    fn new(error: &PresenceError, context: DiagnosticContext) -> Self {
        Self {
            message: error.to_string(),
            level: "error",
            release: concat!(env!("CARGO_PKG_NAME"), "@", env!("CARGO_PKG_VERSION")),
            timestamp: chrono::Utc::now().timestamp(),
            extra: context,
        }
    }
}

/// Logs failures and posts them as JSON to a collection endpoint
pub struct HttpReporter {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpReporter {
    pub fn new(endpoint: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

impl ErrorReporter for HttpReporter {
    fn capture(&self, error: &PresenceError, context: DiagnosticContext) {
        TracingReporter.capture(error, context.clone());

        let event = ErrorEvent::new(error, context);
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();

        tokio::spawn(async move {
            let result = client
                .post(endpoint)
                .json(&event)
                .send()
                .await
                .and_then(|response| response.error_for_status());

            match result {
                Ok(_) => tracing::debug!("Error report delivered"),
                Err(e) => tracing::warn!("Failed to deliver error report: {}", e),
            }
        });
    }
}
