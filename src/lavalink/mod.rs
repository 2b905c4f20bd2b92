//! Cliente del nodo Lavalink v4.
//!
//! La voz de Discord la negocia songbird solo a nivel de gateway; los datos
//! de conexión se reenvían al nodo, que es quien transmite el audio.

pub mod model;
pub mod socket;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, Method, RequestBuilder, Response};
use serenity::model::id::{ChannelId, GuildId};
use songbird::Songbird;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::audio::backend::{AudioBackend, VoiceHandle};
use crate::audio::filters::Filters;
use crate::audio::track::{SearchResult, Track};
use crate::config::Config;
use crate::error::BackendError;
use model::{LoadResult, PlayerPatch, RestError, TrackPatch, VoiceState};

/// Prefijos de búsqueda que el nodo entiende sin modificar
const SEARCH_PREFIXES: &[&str] = &["ytsearch:", "ytmsearch:", "scsearch:", "spsearch:"];

pub struct LavalinkNode {
    http: Client,
    base_url: String,
    password: String,
    search_prefix: String,
    session_id: RwLock<Option<String>>,
    songbird: Arc<Songbird>,
}

impl LavalinkNode {
    pub fn new(config: &Config, songbird: Arc<Songbird>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("djbooth/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.lavalink_http_url(),
            password: config.lavalink_password.clone(),
            search_prefix: config.search_prefix.clone(),
            session_id: RwLock::new(None),
            songbird,
        })
    }

    /// Sesión anunciada por el websocket en el `ready`
    pub fn set_session_id(&self, session_id: String) {
        info!("🎼 Sesión de Lavalink: {}", session_id);
        *self.session_id.write() = Some(session_id);
    }

    fn session_id(&self) -> Result<String, BackendError> {
        self.session_id.read().clone().ok_or(BackendError::NotReady)
    }

    /// URLs y búsquedas con prefijo pasan tal cual; el resto se busca
    fn identifier(&self, query: &str) -> String {
        let query = query.trim();
        let is_url = Url::parse(query)
            .map(|url| matches!(url.scheme(), "http" | "https"))
            .unwrap_or(false);

        if is_url || SEARCH_PREFIXES.iter().any(|prefix| query.starts_with(prefix)) {
            query.to_string()
        } else {
            format!("{}:{}", self.search_prefix, query)
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header("Authorization", &self.password)
    }

    fn player_path(&self, guild: GuildId) -> Result<String, BackendError> {
        Ok(format!("/v4/sessions/{}/players/{}", self.session_id()?, guild))
    }

    async fn update_player(&self, guild: GuildId, patch: &PlayerPatch<'_>) -> Result<(), BackendError> {
        let path = self.player_path(guild)?;
        let response = self.request(Method::PATCH, &path).json(patch).send().await?;
        check(response).await?;
        Ok(())
    }
}

async fn check(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<RestError>(&body)
        .map(|e| e.message.unwrap_or(e.error))
        .unwrap_or(body);
    Err(BackendError::Rest {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl AudioBackend for LavalinkNode {
    async fn search(&self, query: &str) -> Result<SearchResult, BackendError> {
        let identifier = self.identifier(query);
        debug!("🔍 Cargando '{}'", identifier);

        let response = self
            .request(Method::GET, "/v4/loadtracks")
            .query(&[("identifier", identifier.as_str())])
            .send()
            .await?;
        let body = check(response).await?.text().await?;
        serde_json::from_str::<LoadResult>(&body)?.into_search_result()
    }

    async fn connect(&self, guild: GuildId, channel: ChannelId) -> Result<VoiceHandle, BackendError> {
        let (info, _call) = self
            .songbird
            .join_gateway(guild, channel)
            .await
            .map_err(|e| BackendError::Voice(e.to_string()))?;

        let patch = PlayerPatch {
            voice: Some(VoiceState {
                token: info.token,
                endpoint: info.endpoint,
                session_id: info.session_id,
            }),
            ..Default::default()
        };

        if let Err(e) = self.update_player(guild, &patch).await {
            if let Err(leave) = self.songbird.remove(guild).await {
                debug!("No se pudo salir de la voz en guild {}: {}", guild, leave);
            }
            return Err(e);
        }

        Ok(VoiceHandle::new(guild, channel))
    }

    async fn restore_voice(&self, handle: &VoiceHandle) -> Result<(), BackendError> {
        let guild = handle.guild();
        let call = self
            .songbird
            .get(guild)
            .ok_or_else(|| BackendError::Voice(format!("sin llamada en guild {}", guild)))?;
        let info = call
            .lock()
            .await
            .current_connection()
            .cloned()
            .ok_or_else(|| BackendError::Voice(format!("sin conexión de voz en guild {}", guild)))?;

        let patch = PlayerPatch {
            voice: Some(VoiceState {
                token: info.token,
                endpoint: info.endpoint,
                session_id: info.session_id,
            }),
            ..Default::default()
        };
        self.update_player(guild, &patch).await
    }

    async fn play(&self, handle: &VoiceHandle, track: &Track, volume: u16) -> Result<(), BackendError> {
        let patch = PlayerPatch {
            track: Some(TrackPatch {
                encoded: Some(&track.encoded),
            }),
            volume: Some(volume),
            paused: Some(false),
            ..Default::default()
        };
        self.update_player(handle.guild(), &patch).await
    }

    async fn pause(&self, handle: &VoiceHandle, paused: bool) -> Result<(), BackendError> {
        let patch = PlayerPatch {
            paused: Some(paused),
            ..Default::default()
        };
        self.update_player(handle.guild(), &patch).await
    }

    async fn seek(&self, handle: &VoiceHandle, position_ms: u64) -> Result<(), BackendError> {
        let patch = PlayerPatch {
            position: Some(position_ms),
            ..Default::default()
        };
        self.update_player(handle.guild(), &patch).await
    }

    async fn set_volume(&self, handle: &VoiceHandle, volume: u16) -> Result<(), BackendError> {
        let patch = PlayerPatch {
            volume: Some(volume),
            ..Default::default()
        };
        self.update_player(handle.guild(), &patch).await
    }

    async fn set_filters(
        &self,
        handle: &VoiceHandle,
        filters: &Filters,
        position_ms: Option<u64>,
    ) -> Result<(), BackendError> {
        let patch = PlayerPatch {
            filters: Some(filters),
            position: position_ms,
            ..Default::default()
        };
        self.update_player(handle.guild(), &patch).await
    }

    async fn stop(&self, handle: &VoiceHandle) -> Result<(), BackendError> {
        let patch = PlayerPatch {
            track: Some(TrackPatch { encoded: None }),
            ..Default::default()
        };
        self.update_player(handle.guild(), &patch).await
    }

    async fn disconnect(&self, handle: VoiceHandle) -> Result<(), BackendError> {
        let guild = handle.guild();

        if let Err(e) = self.songbird.remove(guild).await {
            warn!("⚠️ No se pudo salir de la voz en guild {}: {}", guild, e);
        }

        let path = self.player_path(guild)?;
        let response = self.request(Method::DELETE, &path).send().await?;
        check(response).await?;
        info!("👋 Reproductor eliminado en guild {}", guild);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn node() -> LavalinkNode {
        LavalinkNode::new(&Config::default(), Songbird::serenity()).unwrap()
    }

    #[tokio::test]
    async fn plain_queries_get_the_search_prefix() {
        let node = node();
        assert_eq!(node.identifier("  never gonna give you up "), "ytsearch:never gonna give you up");
        assert_eq!(node.identifier("artista: canción"), "ytsearch:artista: canción");
    }

    #[tokio::test]
    async fn urls_and_prefixed_queries_pass_through() {
        let node = node();
        let url = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";
        assert_eq!(node.identifier(url), url);
        assert_eq!(node.identifier("scsearch:lofi"), "scsearch:lofi");
    }

    #[tokio::test]
    async fn player_calls_need_a_ready_node() {
        let node = node();
        assert!(matches!(node.player_path(GuildId::new(1)), Err(BackendError::NotReady)));

        node.set_session_id("abc".to_string());
        assert_eq!(node.player_path(GuildId::new(1)).unwrap(), "/v4/sessions/abc/players/1");
    }
}
