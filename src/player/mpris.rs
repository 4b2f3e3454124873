//! MPRIS player source over the D-Bus session bus

use std::collections::HashMap;
use std::ops::Deref;

use async_trait::async_trait;
use tokio::sync::Mutex;
use zbus::names::InterfaceName;
use zbus::zvariant::{OwnedValue, Value};
use zbus::Connection;

use super::traits::{
    CurrentPlaylist, PlayerError, PlayerSource, PlayerState, PlaylistKind, SpecialKind, Track,
};

const MPRIS_PREFIX: &str = "org.mpris.MediaPlayer2.";
const MPRIS_PATH: &str = "/org/mpris/MediaPlayer2";
const PLAYLISTS_INTERFACE: &str = "org.mpris.MediaPlayer2.Playlists";

/// D-Bus proxy for the MPRIS player interface
#[zbus::proxy(
    interface = "org.mpris.MediaPlayer2.Player",
    default_path = "/org/mpris/MediaPlayer2"
)]
trait MprisPlayer {
    #[zbus(property)]
    fn metadata(&self) -> zbus::Result<HashMap<String, OwnedValue>>;

    #[zbus(property)]
    fn playback_status(&self) -> zbus::Result<String>;

    #[zbus(property)]
    fn rate(&self) -> zbus::Result<f64>;

    #[zbus(property(emits_changed_signal = "false"))]
    fn position(&self) -> zbus::Result<i64>;
}

/// Reads playback state from whichever MPRIS player is active
pub struct MprisPlayerSource {
    connection: Connection,
    preferred: Option<String>,
    /// Bus name resolved by the last `current_track` call
    active_bus: Mutex<Option<String>>,
}

impl MprisPlayerSource {
    /// Connect to the session bus. `preferred` is a short player name such as "spotify".
    pub async fn connect(preferred: Option<String>) -> Result<Self, PlayerError> {
        let connection = Connection::session().await?;
        tracing::debug!("Connected to session bus for MPRIS");

        Ok(Self {
            connection,
            preferred,
            active_bus: Mutex::new(None),
        })
    }

    async fn proxy(&self, bus_name: String) -> Result<MprisPlayerProxy<'static>, PlayerError> {
        Ok(MprisPlayerProxy::builder(&self.connection)
            .destination(bus_name)?
            .build()
            .await?)
    }

    async fn discover_players(&self) -> Result<Vec<String>, PlayerError> {
        let dbus_proxy = zbus::fdo::DBusProxy::new(&self.connection).await?;
        let mut names: Vec<String> = dbus_proxy
            .list_names()
            .await?
            .iter()
            .filter(|n| n.starts_with(MPRIS_PREFIX))
            .map(|n| n.to_string())
            .collect();
        names.sort();
        Ok(names)
    }

    /// Pick the configured player, else one that is playing, else the first one found
    async fn resolve_player(&self) -> Result<Option<String>, PlayerError> {
        let names = self.discover_players().await?;

        if let Some(preferred) = &self.preferred {
            if let Some(name) = names.iter().find(|n| short_name(n) == preferred.as_str()) {
                return Ok(Some(name.clone()));
            }
        }

        for name in &names {
            let proxy = self.proxy(name.clone()).await?;
            if proxy.playback_status().await.ok().as_deref() == Some("Playing") {
                return Ok(Some(name.clone()));
            }
        }

        Ok(names.into_iter().next())
    }

    async fn active_proxy(&self) -> Result<MprisPlayerProxy<'static>, PlayerError> {
        let bus_name = self.active_bus.lock().await.clone().ok_or(PlayerError::NoPlayer)?;
        self.proxy(bus_name).await
    }

    async fn active_playlist_name(&self, bus_name: String) -> Option<String> {
        let properties = zbus::fdo::PropertiesProxy::builder(&self.connection)
            .destination(bus_name)
            .ok()?
            .path(MPRIS_PATH)
            .ok()?
            .build()
            .await
            .ok()?;

        // Players without the Playlists interface answer with an error
        let value = properties
            .get(
                InterfaceName::from_static_str_unchecked(PLAYLISTS_INTERFACE),
                "ActivePlaylist",
            )
            .await
            .ok()?;

        parse_active_playlist(&value)
    }
}

#[async_trait]
impl PlayerSource for MprisPlayerSource {
    fn name(&self) -> &'static str {
        "MPRIS"
    }

    async fn current_track(&self) -> Result<Option<Track>, PlayerError> {
        let resolved = self.resolve_player().await?;
        *self.active_bus.lock().await = resolved.clone();

        let Some(bus_name) = resolved else {
            return Ok(None);
        };

        let proxy = self.proxy(bus_name).await?;
        let metadata = proxy.metadata().await.unwrap_or_default();
        Ok(track_from_metadata(&metadata))
    }

    async fn player_state(&self) -> Result<PlayerState, PlayerError> {
        let proxy = self.active_proxy().await?;
        let status = proxy.playback_status().await?;
        let rate = proxy.rate().await.unwrap_or(1.0);
        Ok(map_player_state(&status, rate))
    }

    async fn player_position(&self) -> Result<i64, PlayerError> {
        let proxy = self.active_proxy().await?;
        let position_us = proxy.position().await.unwrap_or(0);
        Ok(position_us / 1_000_000)
    }

    async fn current_playlist(&self) -> Result<Option<CurrentPlaylist>, PlayerError> {
        let bus_name = self.active_bus.lock().await.clone().ok_or(PlayerError::NoPlayer)?;

        if let Some(name) = self.active_playlist_name(bus_name.clone()).await {
            return Ok(Some(CurrentPlaylist {
                name,
                kind: PlaylistKind::User {
                    special_kind: SpecialKind::None,
                },
            }));
        }

        let metadata = self.proxy(bus_name).await?.metadata().await.unwrap_or_default();
        Ok(extract_string(&metadata, "xesam:album")
            .filter(|album| !album.is_empty())
            .map(|album| CurrentPlaylist {
                name: album,
                kind: PlaylistKind::Library,
            }))
    }
}

/// "org.mpris.MediaPlayer2.spotify.instance123" -> "spotify"
fn short_name(bus_name: &str) -> &str {
    let rest = bus_name.strip_prefix(MPRIS_PREFIX).unwrap_or(bus_name);
    rest.split('.').next().unwrap_or(rest)
}

fn map_player_state(status: &str, rate: f64) -> PlayerState {
    match status {
        "Playing" if rate < 0.0 => PlayerState::Rewind,
        "Playing" if rate > 1.0 => PlayerState::FastForward,
        "Playing" => PlayerState::Playing,
        "Paused" => PlayerState::Paused,
        _ => PlayerState::Stopped,
    }
}

fn track_from_metadata(metadata: &HashMap<String, OwnedValue>) -> Option<Track> {
    let title = extract_string(metadata, "xesam:title").unwrap_or_default();
    let has_track_id = metadata.contains_key("mpris:trackid");

    if title.is_empty() && !has_track_id {
        return None;
    }

    Some(Track {
        artist: extract_str_array(metadata, "xesam:artist").unwrap_or_default(),
        title,
        duration_seconds: extract_i64(metadata, "mpris:length").unwrap_or(0) / 1_000_000,
    })
}

/// `ActivePlaylist` is `(b(oss))`: a validity flag and the (id, name, icon) triple
fn parse_active_playlist(value: &Value<'_>) -> Option<String> {
    match value {
        Value::Value(inner) => parse_active_playlist(inner),
        Value::Structure(outer) => match outer.fields() {
            [Value::Bool(true), Value::Structure(playlist)] => match playlist.fields() {
                [_, Value::Str(name), ..] => Some(name.to_string()),
                _ => None,
            },
            _ => None,
        },
        _ => None,
    }
}

fn extract_string(map: &HashMap<String, OwnedValue>, key: &str) -> Option<String> {
    map.get(key).and_then(|v| match v.deref() {
        Value::Str(s) => Some(s.to_string()),
        _ => None,
    })
}

fn extract_i64(map: &HashMap<String, OwnedValue>, key: &str) -> Option<i64> {
    map.get(key).and_then(|v| match v.deref() {
        Value::I64(i) => Some(*i),
        Value::U64(u) => Some(*u as i64),
        Value::I32(i) => Some(*i as i64),
        Value::U32(u) => Some(*u as i64),
        _ => None,
    })
}

fn extract_str_array(map: &HashMap<String, OwnedValue>, key: &str) -> Option<String> {
    map.get(key).and_then(|v| match v.deref() {
        Value::Array(arr) => {
            let artists: Vec<String> = arr
                .iter()
                .filter_map(|item| match item {
                    Value::Str(s) => Some(s.to_string()),
                    _ => None,
                })
                .collect();
            if artists.is_empty() {
                None
            } else {
                Some(artists.join(", "))
            }
        }
        Value::Str(s) => Some(s.to_string()),
        _ => None,
    })
}
