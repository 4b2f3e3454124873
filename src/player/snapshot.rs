//! Point-in-time view of the player used for change detection

use super::traits::{PlayerError, PlayerSource, PlayerState, PlaylistKind};

/// Observable player state at one poll
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackSnapshot {
    pub artist: String,
    pub title: String,
    pub playlist_name: String,
    pub playlist_kind: PlaylistKind,
    pub player_state: PlayerState,
    pub position_seconds: i64,
}

impl PlaybackSnapshot {
    /// Any field difference counts, including position drift while playing
    pub fn has_changed(&self, current: &PlaybackSnapshot) -> bool {
        self != current
    }
}

/// Result of reading the player once
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
    /// The player has no current track; presence should be cleared
    NoTrack,
    Track {
        snapshot: PlaybackSnapshot,
        duration_seconds: i64,
    },
}

/// Read the player's current state.
///
/// The track is queried first so an empty player short-circuits without touching
/// the other properties. The remaining reads are not atomic; a player that changes
/// track between calls yields a mixed snapshot, which the next poll corrects.
pub async fn capture<P>(source: &P) -> Result<Capture, PlayerError>
where
    P: PlayerSource + ?Sized,
{
    let Some(track) = source.current_track().await? else {
        return Ok(Capture::NoTrack);
    };

    let player_state = source.player_state().await?;
    let position_seconds = source.player_position().await?;
    let (playlist_name, playlist_kind) = match source.current_playlist().await? {
        Some(playlist) => (playlist.name, playlist.kind),
        None => (String::new(), PlaylistKind::None),
    };

    Ok(Capture::Track {
        snapshot: PlaybackSnapshot {
            artist: track.artist,
            title: track.title,
            playlist_name,
            playlist_kind,
            player_state,
            position_seconds,
        },
        duration_seconds: track.duration_seconds,
    })
}
