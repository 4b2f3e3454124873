mod mpris;
mod snapshot;
mod traits;

pub use mpris::MprisPlayerSource;
pub use snapshot::{capture, Capture, PlaybackSnapshot};
pub use traits::{
    CurrentPlaylist, PlayerError, PlayerSource, PlayerState, PlaylistKind, SpecialKind, Track,
};
