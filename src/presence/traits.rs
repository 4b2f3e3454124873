use async_trait::async_trait;

/// Start and end of the displayed playback range, in Unix seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceTimestamps {
    pub start: i64,
    pub end: i64,
}

/// The presence payload pushed to a sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RichPresence {
    /// First line ("details" on Discord)
    pub top_line: String,
    /// Second line ("state" on Discord)
    pub bottom_line: String,
    /// Only set while playing with duration display enabled
    pub timestamps: Option<PresenceTimestamps>,
}

impl RichPresence {
    pub fn start_timestamp(&self) -> Option<i64> {
        self.timestamps.map(|t| t.start)
    }

    pub fn end_timestamp(&self) -> Option<i64> {
        self.timestamps.map(|t| t.end)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    #[error("Discord error: {0}")]
    Discord(#[from] discord_sdk::Error),

    #[error("Presence connection is closed")]
    Disconnected,

    #[error("Presence update rejected: {0}")]
    Rejected(String),
}

/// Trait for presence sinks (Discord, test doubles)
#[async_trait]
pub trait PresenceSink: Send + Sync {
    /// Returns the name of this presence sink (for logging)
    fn name(&self) -> &'static str;

    /// Replace the displayed presence
    async fn update_presence(&self, presence: &RichPresence) -> Result<(), PresenceError>;

    /// Remove any displayed presence. Safe to call when nothing is shown.
    async fn clear_presence(&self) -> Result<(), PresenceError>;

    /// Close the connection. No updates may follow.
    async fn shutdown(&self);
}
