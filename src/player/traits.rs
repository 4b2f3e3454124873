use async_trait::async_trait;

/// Playback state reported by the player
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlayerState {
    #[default]
    Stopped,
    Paused,
    Playing,
    FastForward,
    Rewind,
}

impl PlayerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "Stopped",
            Self::Paused => "Paused",
            Self::Playing => "Playing",
            Self::FastForward => "FastForward",
            Self::Rewind => "Rewind",
        }
    }
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reserved purpose of a user-created playlist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SpecialKind {
    #[default]
    None,
    /// The library/music playlist
    Music,
    Movies,
    TvShows,
    Podcasts,
    Audiobooks,
    Purchased,
    Other,
}

/// What kind of container the current track is playing from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlaylistKind {
    /// No container could be resolved
    #[default]
    None,
    /// The player's library or the track's album
    Library,
    /// A user-created playlist
    User { special_kind: SpecialKind },
    Other,
}

impl std::fmt::Display for PlaylistKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Library => write!(f, "Library"),
            Self::User { special_kind } => write!(f, "User({:?})", special_kind),
            Self::Other => write!(f, "Other"),
        }
    }
}

/// The track the player currently has loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub artist: String,
    pub title: String,
    pub duration_seconds: i64,
}

/// The playlist the current track is playing from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentPlaylist {
    pub name: String,
    pub kind: PlaylistKind,
}

#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error("D-Bus error: {0}")]
    DBus(#[from] zbus::Error),

    #[error("D-Bus fdo error: {0}")]
    Fdo(#[from] zbus::fdo::Error),

    #[error("No media player found")]
    NoPlayer,
}

/// Read-only view of a media player, polled once per tick
#[async_trait]
pub trait PlayerSource: Send + Sync {
    /// Returns the name of this source (for logging)
    fn name(&self) -> &'static str;

    /// The loaded track, or `None` when the player has nothing loaded
    async fn current_track(&self) -> Result<Option<Track>, PlayerError>;

    async fn player_state(&self) -> Result<PlayerState, PlayerError>;

    /// Playback position in whole seconds
    async fn player_position(&self) -> Result<i64, PlayerError>;

    async fn current_playlist(&self) -> Result<Option<CurrentPlaylist>, PlayerError>;
}
