mod bridge;
mod template;
mod traits;
mod truncate;

pub use bridge::{build_presence, BridgeState, PresenceBridge, TickOutcome, POLL_INTERVAL};
pub use template::{
    playlist_type_label, render, ARTIST_TOKEN, PLAYLIST_NAME_TOKEN, PLAYLIST_TYPE_TOKEN,
    TRACK_TOKEN,
};
pub use traits::{PresenceError, PresenceSink, PresenceTimestamps, RichPresence};
pub use truncate::{byte_count, truncate, MAX_PRESENCE_BYTES};
