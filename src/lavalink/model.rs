//! Tipos del protocolo Lavalink v4 (REST y websocket)

use serde::{Deserialize, Serialize};
use serenity::model::id::GuildId;

use crate::audio::events::{NodeEvent, Severity, TrackEndReason, TrackException};
use crate::audio::filters::Filters;
use crate::audio::track::{LoadedTrack, SearchResult};
use crate::error::BackendError;

/// Respuesta de `GET /v4/loadtracks`
#[derive(Debug, Deserialize)]
#[serde(tag = "loadType", content = "data", rename_all = "camelCase")]
pub enum LoadResult {
    Track(LoadedTrack),
    Playlist(PlaylistData),
    Search(Vec<LoadedTrack>),
    Empty {},
    Error(LoadException),
}

#[derive(Debug, Deserialize)]
pub struct PlaylistData {
    pub info: PlaylistInfo,
    pub tracks: Vec<LoadedTrack>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistInfo {
    pub name: String,
    #[serde(default)]
    pub selected_track: i32,
}

#[derive(Debug, Deserialize)]
pub struct LoadException {
    pub message: Option<String>,
    pub severity: Severity,
    pub cause: String,
}

impl LoadResult {
    /// Una búsqueda se queda con el primer resultado
    pub fn into_search_result(self) -> Result<SearchResult, BackendError> {
        match self {
            LoadResult::Track(track) => Ok(SearchResult::Track(track)),
            LoadResult::Playlist(playlist) => Ok(SearchResult::Playlist {
                name: playlist.info.name,
                tracks: playlist.tracks,
            }),
            LoadResult::Search(tracks) => Ok(tracks
                .into_iter()
                .next()
                .map_or(SearchResult::Empty, SearchResult::Track)),
            LoadResult::Empty {} => Ok(SearchResult::Empty),
            LoadResult::Error(exception) => Err(BackendError::LoadFailed {
                message: exception.message.unwrap_or(exception.cause),
                severity: exception.severity,
            }),
        }
    }
}

/// Cuerpo de `PATCH /v4/sessions/{session}/players/{guild}`.
/// Los campos en `None` no se envían y el nodo los deja como están.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerPatch<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track: Option<TrackPatch<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<&'a Filters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<VoiceState>,
}

/// `encoded: null` detiene la pista actual
#[derive(Debug, Serialize)]
pub struct TrackPatch<'a> {
    pub encoded: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceState {
    pub token: String,
    pub endpoint: String,
    pub session_id: String,
}

/// Cuerpo de error de la API REST
#[derive(Debug, Deserialize)]
pub struct RestError {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Mensajes del websocket `/v4/websocket`
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum IncomingMessage {
    Ready {
        resumed: bool,
        session_id: String,
    },
    PlayerUpdate {
        guild_id: String,
        state: PlayerState,
    },
    Stats {
        players: u32,
        playing_players: u32,
    },
    Event(WireEvent),
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
pub struct PlayerState {
    #[serde(default)]
    pub position: u64,
    #[serde(default)]
    pub connected: bool,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum WireEvent {
    TrackStartEvent {
        guild_id: String,
        track: LoadedTrack,
    },
    TrackEndEvent {
        guild_id: String,
        track: LoadedTrack,
        reason: TrackEndReason,
    },
    TrackExceptionEvent {
        guild_id: String,
        track: LoadedTrack,
        exception: TrackException,
    },
    TrackStuckEvent {
        guild_id: String,
        track: LoadedTrack,
        threshold_ms: u64,
    },
    WebSocketClosedEvent {
        guild_id: String,
        code: u16,
        reason: String,
        by_remote: bool,
    },
    #[serde(other)]
    Unknown,
}

fn parse_guild(raw: &str) -> Option<GuildId> {
    raw.parse::<u64>().ok().filter(|id| *id != 0).map(GuildId::new)
}

impl IncomingMessage {
    /// Convierte el mensaje en un evento tipado; `None` para estadísticas,
    /// tipos desconocidos o ids de guild inválidos
    pub fn into_event(self) -> Option<NodeEvent> {
        match self {
            IncomingMessage::Ready {
                resumed,
                session_id,
            } => Some(NodeEvent::Ready {
                session_id,
                resumed,
            }),
            IncomingMessage::PlayerUpdate { guild_id, state } => Some(NodeEvent::PlayerUpdate {
                guild: parse_guild(&guild_id)?,
                position_ms: state.position,
                connected: state.connected,
            }),
            IncomingMessage::Event(event) => event.into_event(),
            IncomingMessage::Stats { .. } | IncomingMessage::Unknown => None,
        }
    }
}

impl WireEvent {
    fn into_event(self) -> Option<NodeEvent> {
        let event = match self {
            WireEvent::TrackStartEvent { guild_id, track } => NodeEvent::TrackStart {
                guild: parse_guild(&guild_id)?,
                track,
            },
            WireEvent::TrackEndEvent {
                guild_id,
                track,
                reason,
            } => NodeEvent::TrackEnd {
                guild: parse_guild(&guild_id)?,
                track,
                reason,
            },
            WireEvent::TrackExceptionEvent {
                guild_id,
                track,
                exception,
            } => NodeEvent::TrackException {
                guild: parse_guild(&guild_id)?,
                track,
                exception,
            },
            WireEvent::TrackStuckEvent {
                guild_id,
                track,
                threshold_ms,
            } => NodeEvent::TrackStuck {
                guild: parse_guild(&guild_id)?,
                track,
                threshold_ms,
            },
            WireEvent::WebSocketClosedEvent {
                guild_id,
                code,
                reason,
                by_remote,
            } => NodeEvent::VoiceClosed {
                guild: parse_guild(&guild_id)?,
                code,
                reason,
                by_remote,
            },
            WireEvent::Unknown => return None,
        };
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn track_json(title: &str) -> serde_json::Value {
        json!({
            "encoded": format!("enc-{title}"),
            "info": {
                "identifier": title,
                "isSeekable": true,
                "author": "Autor",
                "length": 180000,
                "isStream": false,
                "position": 0,
                "title": title,
                "uri": null,
                "artworkUrl": null,
                "isrc": null,
                "sourceName": "youtube"
            },
            "pluginInfo": {},
            "userData": {}
        })
    }

    #[test]
    fn search_keeps_first_result() {
        let body = json!({
            "loadType": "search",
            "data": [track_json("uno"), track_json("dos")]
        });

        let result: LoadResult = serde_json::from_value(body).unwrap();
        match result.into_search_result().unwrap() {
            SearchResult::Track(track) => assert_eq!(track.info.title, "uno"),
            other => panic!("resultado inesperado: {other:?}"),
        }
    }

    #[test]
    fn playlist_and_empty_results() {
        let body = json!({
            "loadType": "playlist",
            "data": {
                "info": { "name": "Mix", "selectedTrack": -1 },
                "pluginInfo": {},
                "tracks": [track_json("a"), track_json("b")]
            }
        });
        let result: LoadResult = serde_json::from_value(body).unwrap();
        match result.into_search_result().unwrap() {
            SearchResult::Playlist { name, tracks } => {
                assert_eq!(name, "Mix");
                assert_eq!(tracks.len(), 2);
            }
            other => panic!("resultado inesperado: {other:?}"),
        }

        let empty: LoadResult =
            serde_json::from_value(json!({ "loadType": "empty", "data": {} })).unwrap();
        assert_eq!(empty.into_search_result().unwrap(), SearchResult::Empty);
    }

    #[test]
    fn load_error_becomes_backend_error() {
        let body = json!({
            "loadType": "error",
            "data": { "message": "Video privado", "severity": "common", "cause": "FriendlyException" }
        });
        let result: LoadResult = serde_json::from_value(body).unwrap();

        let err = result.into_search_result().unwrap_err();
        assert!(matches!(
            err,
            BackendError::LoadFailed { ref message, severity: Severity::Common } if message == "Video privado"
        ));
    }

    #[test]
    fn stop_patch_sends_null_track_only() {
        let patch = PlayerPatch {
            track: Some(TrackPatch { encoded: None }),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({ "track": { "encoded": null } }));
    }

    #[test]
    fn voice_patch_uses_camel_case() {
        let patch = PlayerPatch {
            voice: Some(VoiceState {
                token: "t".to_string(),
                endpoint: "e".to_string(),
                session_id: "s".to_string(),
            }),
            volume: Some(100),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({ "volume": 100, "voice": { "token": "t", "endpoint": "e", "sessionId": "s" } })
        );
    }

    #[test]
    fn decodes_ready_and_player_update() {
        let ready: IncomingMessage = serde_json::from_value(json!({
            "op": "ready", "resumed": false, "sessionId": "abc"
        }))
        .unwrap();
        assert_eq!(
            ready.into_event(),
            Some(NodeEvent::Ready {
                session_id: "abc".to_string(),
                resumed: false
            })
        );

        let update: IncomingMessage = serde_json::from_value(json!({
            "op": "playerUpdate",
            "guildId": "42",
            "state": { "time": 1, "position": 5000, "connected": true, "ping": 20 }
        }))
        .unwrap();
        assert_eq!(
            update.into_event(),
            Some(NodeEvent::PlayerUpdate {
                guild: GuildId::new(42),
                position_ms: 5000,
                connected: true
            })
        );
    }

    #[test]
    fn decodes_track_end_and_exception() {
        let end: IncomingMessage = serde_json::from_value(json!({
            "op": "event",
            "type": "TrackEndEvent",
            "guildId": "42",
            "track": track_json("a"),
            "reason": "finished"
        }))
        .unwrap();
        assert!(matches!(
            end.into_event(),
            Some(NodeEvent::TrackEnd { reason: TrackEndReason::Finished, .. })
        ));

        let exception: IncomingMessage = serde_json::from_value(json!({
            "op": "event",
            "type": "TrackExceptionEvent",
            "guildId": "42",
            "track": track_json("a"),
            "exception": { "message": "boom", "severity": "fault", "cause": "IOException" }
        }))
        .unwrap();
        match exception.into_event() {
            Some(NodeEvent::TrackException { exception, .. }) => {
                assert_eq!(exception.severity, Severity::Fault);
                assert_eq!(exception.cause, "IOException");
            }
            other => panic!("evento inesperado: {other:?}"),
        }
    }

    #[test]
    fn stats_and_unknown_events_are_dropped() {
        let stats: IncomingMessage = serde_json::from_value(json!({
            "op": "stats", "players": 1, "playingPlayers": 1, "uptime": 10
        }))
        .unwrap();
        assert_eq!(stats.into_event(), None);

        let unknown: IncomingMessage = serde_json::from_value(json!({
            "op": "event", "type": "SegmentsLoaded", "guildId": "42"
        }))
        .unwrap();
        assert_eq!(unknown.into_event(), None);

        let bad_guild: IncomingMessage = serde_json::from_value(json!({
            "op": "playerUpdate", "guildId": "nope", "state": { "position": 0 }
        }))
        .unwrap();
        assert_eq!(bad_guild.into_event(), None);
    }
}
