//! Status line templates

use crate::player::{PlaybackSnapshot, PlaylistKind, SpecialKind};

pub const ARTIST_TOKEN: &str = "%artist";
pub const TRACK_TOKEN: &str = "%track";
pub const PLAYLIST_NAME_TOKEN: &str = "%playlist_name";
pub const PLAYLIST_TYPE_TOKEN: &str = "%playlist_type";

/// Label substituted for `%playlist_type`.
///
/// Only user playlists without the music special kind are called "Playlist";
/// anything that is not a user playlist falls back to "Album".
pub fn playlist_type_label(kind: PlaylistKind) -> &'static str {
    match kind {
        PlaylistKind::User {
            special_kind: SpecialKind::Music,
        } => "Album",
        PlaylistKind::User { .. } => "Playlist",
        _ => "Album",
    }
}

/// Substitute the known tokens in a single pass.
///
/// Replacement text is never scanned again, so a track called "%artist" renders
/// literally. Unknown `%` sequences pass through unchanged.
pub fn render(template: &str, snapshot: &PlaybackSnapshot, playlist_type: &str) -> String {
    let substitutions: [(&str, &str); 4] = [
        (PLAYLIST_NAME_TOKEN, snapshot.playlist_name.as_str()),
        (PLAYLIST_TYPE_TOKEN, playlist_type),
        (ARTIST_TOKEN, snapshot.artist.as_str()),
        (TRACK_TOKEN, snapshot.title.as_str()),
    ];

    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(index) = rest.find('%') {
        rendered.push_str(&rest[..index]);
        rest = &rest[index..];

        match substitutions
            .iter()
            .find(|(token, _)| rest.starts_with(token))
        {
            Some((token, value)) => {
                rendered.push_str(value);
                rest = &rest[token.len()..];
            }
            None => {
                rendered.push('%');
                rest = &rest[1..];
            }
        }
    }

    rendered.push_str(rest);
    rendered
}
