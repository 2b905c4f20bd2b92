use serde::{Deserialize, Serialize};
use serenity::model::id::UserId;
use std::time::Duration;

/// Metadatos de una pista tal como los describe Lavalink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    pub identifier: String,
    pub is_seekable: bool,
    pub author: String,
    /// Duración en milisegundos. 0 para streams.
    pub length: u64,
    pub is_stream: bool,
    #[serde(default)]
    pub position: u64,
    pub title: String,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub artwork_url: Option<String>,
    #[serde(default)]
    pub isrc: Option<String>,
    pub source_name: String,
}

/// Pista devuelta por el nodo, todavía sin solicitante
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadedTrack {
    /// Referencia opaca que el nodo usa para reproducir
    pub encoded: String,
    pub info: TrackInfo,
}

impl LoadedTrack {
    /// Asocia la pista al usuario que la pidió
    pub fn requested_by(self, requester: UserId) -> Track {
        Track {
            encoded: self.encoded,
            info: self.info,
            requester,
        }
    }
}

/// Pista encolada en una sesión.
///
/// El solicitante viaja con la pista a través de cualquier reinserción
/// (loop de canción, loop de cola, pista atascada).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub encoded: String,
    pub info: TrackInfo,
    pub requester: UserId,
}

impl Track {
    pub fn title(&self) -> &str {
        &self.info.title
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.info.length)
    }

    /// Indica si un evento del nodo se refiere a esta pista
    pub fn is_same(&self, other: &LoadedTrack) -> bool {
        self.encoded == other.encoded
    }
}

/// Resultado de una búsqueda en el nodo
#[derive(Debug, Clone, PartialEq)]
pub enum SearchResult {
    Track(LoadedTrack),
    Playlist { name: String, tracks: Vec<LoadedTrack> },
    Empty,
}

impl SearchResult {
    /// Convierte el resultado en pistas listas para encolar
    pub fn into_tracks(self, requester: UserId) -> Vec<Track> {
        match self {
            SearchResult::Track(track) => vec![track.requested_by(requester)],
            SearchResult::Playlist { tracks, .. } => tracks
                .into_iter()
                .map(|track| track.requested_by(requester))
                .collect(),
            SearchResult::Empty => Vec::new(),
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_track(name: &str, length: u64, requester: u64) -> Track {
    LoadedTrack {
        encoded: format!("enc-{name}"),
        info: TrackInfo {
            identifier: name.to_string(),
            is_seekable: true,
            author: "Autor".to_string(),
            length,
            is_stream: false,
            position: 0,
            title: name.to_string(),
            uri: Some(format!("https://example.com/{name}")),
            artwork_url: None,
            isrc: None,
            source_name: "youtube".to_string(),
        },
    }
    .requested_by(UserId::new(requester))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn playlist_keeps_order_and_requester() {
        let a = sample_track("a", 1000, 1);
        let b = sample_track("b", 2000, 1);
        let result = SearchResult::Playlist {
            name: "mix".to_string(),
            tracks: vec![
                LoadedTrack { encoded: a.encoded.clone(), info: a.info.clone() },
                LoadedTrack { encoded: b.encoded.clone(), info: b.info.clone() },
            ],
        };

        let tracks = result.into_tracks(UserId::new(42));
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].title(), "a");
        assert_eq!(tracks[1].title(), "b");
        assert!(tracks.iter().all(|t| t.requester == UserId::new(42)));
    }

    #[test]
    fn deserializes_node_track() {
        let json = r#"{
            "encoded": "QAAAjQIAJFJpY2sgQXN0bGV5",
            "info": {
                "identifier": "dQw4w9WgXcQ",
                "isSeekable": true,
                "author": "RickAstleyVEVO",
                "length": 212000,
                "isStream": false,
                "position": 0,
                "title": "Never Gonna Give You Up",
                "uri": "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
                "artworkUrl": null,
                "isrc": null,
                "sourceName": "youtube"
            }
        }"#;

        let track: LoadedTrack = serde_json::from_str(json).unwrap();
        assert_eq!(track.info.length, 212000);
        assert_eq!(track.info.source_name, "youtube");

        let track = track.requested_by(UserId::new(7));
        assert_eq!(track.duration(), Duration::from_secs(212));
    }
}
