use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::time::Duration;

use crate::audio::events::Severity;
use crate::audio::filters::Filters;
use crate::audio::track::{SearchResult, Track};
use crate::error::BackendError;

/// Conexión de voz de una sesión.
///
/// No es `Clone`: cada sesión es dueña exclusiva de su handle y lo entrega
/// al desconectarse.
#[derive(Debug)]
pub struct VoiceHandle {
    guild: GuildId,
    channel: ChannelId,
}

impl VoiceHandle {
    pub fn new(guild: GuildId, channel: ChannelId) -> Self {
        Self { guild, channel }
    }

    pub fn guild(&self) -> GuildId {
        self.guild
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// El bot fue movido a otro canal
    pub fn moved_to(&mut self, channel: ChannelId) {
        self.channel = channel;
    }
}

/// Nodo de audio remoto que decodifica y reproduce
#[async_trait]
pub trait AudioBackend: Send + Sync {
    async fn search(&self, query: &str) -> Result<SearchResult, BackendError>;
    async fn connect(&self, guild: GuildId, channel: ChannelId) -> Result<VoiceHandle, BackendError>;
    /// Reenvía al nodo el estado de voz de una conexión existente
    async fn restore_voice(&self, handle: &VoiceHandle) -> Result<(), BackendError>;
    async fn play(&self, handle: &VoiceHandle, track: &Track, volume: u16) -> Result<(), BackendError>;
    async fn pause(&self, handle: &VoiceHandle, paused: bool) -> Result<(), BackendError>;
    async fn seek(&self, handle: &VoiceHandle, position_ms: u64) -> Result<(), BackendError>;
    async fn set_volume(&self, handle: &VoiceHandle, volume: u16) -> Result<(), BackendError>;
    /// Con `position_ms` el nodo reposiciona la pista para aplicar los filtros al instante
    async fn set_filters(
        &self,
        handle: &VoiceHandle,
        filters: &Filters,
        position_ms: Option<u64>,
    ) -> Result<(), BackendError>;
    async fn stop(&self, handle: &VoiceHandle) -> Result<(), BackendError>;
    async fn disconnect(&self, handle: VoiceHandle) -> Result<(), BackendError>;
}

/// Avisos que la sesión publica en su canal de texto
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    NowPlaying { track: Track, dj: UserId },
    QueueEnded { disconnect_after: Duration },
    TrackStuck { track: Track },
    TrackFailed { track: Track },
}

/// Publica avisos. Los fallos se ignoran.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, channel: ChannelId, notice: Notice);
}

/// Registro de una excepción de pista
#[derive(Debug, Clone, PartialEq)]
pub struct TrackFailure {
    pub guild: GuildId,
    pub track: Track,
    pub severity: Severity,
    pub cause: String,
    pub message: Option<String>,
}

/// Guarda los fallos de pista fuera de banda
#[async_trait]
pub trait FailureReporter: Send + Sync {
    async fn report(&self, failure: TrackFailure);
}
