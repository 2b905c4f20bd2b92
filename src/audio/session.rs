//! Per-guild playback session.
//!
//! Each session runs as one tokio task that owns every piece of mutable
//! state for its guild: the voice handle, the queue, the vote ledger, the DJ
//! and the loop flags. Commands, node events and voice updates arrive as
//! [`SessionMessage`]s on a single mailbox and are applied one at a time, so
//! no two transitions ever interleave.
//!
//! ## Lifecycle
//!
//! `Disconnected → Connecting → Connected (playing / paused / waiting) → Disconnected`
//!
//! The session ends (teardown) when:
//! - a stop/disconnect command executes,
//! - nobody but bots remains in the voice channel,
//! - the queue stays empty for the configured wait,
//! - the bot is removed from voice,
//! - the audio node restarts and the player cannot be restored,
//! - every handle to the session is dropped.

use serenity::model::id::{ChannelId, GuildId, UserId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use crate::audio::backend::{
    AudioBackend, FailureReporter, Notice, Notifier, TrackFailure, VoiceHandle,
};
use crate::audio::events::NodeEvent;
use crate::audio::filters::{FilterChange, Filters};
use crate::audio::policy::{self, MembershipSource, PrivilegeSource, VoiceMove};
use crate::audio::queue::TrackQueue;
use crate::audio::track::{LoadedTrack, Track};
use crate::audio::votes::{required_votes, VoteAction, VoteLedger};
use crate::config::Config;
use crate::error::{SessionError, SessionResult};

/// Colaboradores externos compartidos por todas las sesiones
#[derive(Clone)]
pub struct SessionDeps {
    pub backend: Arc<dyn AudioBackend>,
    pub notifier: Arc<dyn Notifier>,
    pub reporter: Arc<dyn FailureReporter>,
    pub privileges: Arc<dyn PrivilegeSource>,
    pub members: Arc<dyn MembershipSource>,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub default_volume: u16,
    pub queue_wait: Duration,
    pub connect_timeout: Duration,
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        Self {
            default_volume: config.default_volume,
            queue_wait: config.queue_wait_timeout,
            connect_timeout: config.connect_timeout,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Por qué terminó una sesión
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownReason {
    Stopped,
    ChannelEmpty,
    IdleTimeout,
    Kicked,
    Shutdown,
    ConnectFailed,
    /// El nodo perdió el reproductor y no se pudo restaurar
    NodeLost,
}

/// Operaciones que un usuario puede pedir a la sesión
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Enqueue(Vec<Track>),
    Pause,
    Resume,
    Skip,
    Shuffle,
    Stop,
    Disconnect,
    Seek { position_ms: i64 },
    SetVolume(i64),
    Remove { position: usize },
    ClearQueue,
    ToggleLoop,
    ToggleLoopQueue,
    Replay,
    ApplyFilter(FilterChange),
    /// Lleva la sesión a otro canal de voz de la guild
    Move(ChannelId),
}

/// Cómo se autorizó una acción votable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    Privileged,
    Requester,
    Quorum,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Enqueued {
        count: usize,
        /// Posición (base 1) de la primera pista agregada
        position: usize,
        started: bool,
    },
    Executed {
        action: VoteAction,
        via: Execution,
    },
    VoteRecorded {
        action: VoteAction,
        votes: usize,
        required: usize,
    },
    Seeked {
        position_ms: u64,
    },
    VolumeSet(u16),
    Removed(Track),
    Cleared(usize),
    LoopTrack(bool),
    LoopQueue(bool),
    Replayed,
    FiltersApplied(Filters),
    Moved(ChannelId),
}

/// Vista de solo lectura del estado de la sesión
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub guild: GuildId,
    pub state: ConnectionState,
    pub voice_channel: Option<ChannelId>,
    pub text_channel: ChannelId,
    pub dj: UserId,
    pub current: Option<Track>,
    pub position_ms: u64,
    pub paused: bool,
    pub volume: u16,
    pub loop_track: bool,
    pub loop_queue: bool,
    pub waiting: bool,
    pub queue: Vec<Track>,
    pub filters: Filters,
}

pub(crate) enum SessionMessage {
    Command {
        actor: UserId,
        command: SessionCommand,
        reply: oneshot::Sender<SessionResult<CommandOutcome>>,
    },
    Node(NodeEvent),
    Voice(VoiceMove),
    Snapshot(oneshot::Sender<SessionSnapshot>),
    Shutdown,
}

/// Referencia clonable al buzón de una sesión
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: u64,
    guild: GuildId,
    tx: mpsc::UnboundedSender<SessionMessage>,
}

impl SessionHandle {
    pub(crate) fn new(id: u64, guild: GuildId, tx: mpsc::UnboundedSender<SessionMessage>) -> Self {
        Self { id, guild, tx }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn guild(&self) -> GuildId {
        self.guild
    }

    /// Ejecuta un comando en nombre de `actor` y espera el resultado
    pub async fn command(
        &self,
        actor: UserId,
        command: SessionCommand,
    ) -> SessionResult<CommandOutcome> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(SessionMessage::Command {
                actor,
                command,
                reply,
            })
            .map_err(|_| SessionError::Closed)?;
        response.await.map_err(|_| SessionError::Closed)?
    }

    pub async fn snapshot(&self) -> SessionResult<SessionSnapshot> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(SessionMessage::Snapshot(reply))
            .map_err(|_| SessionError::Closed)?;
        response.await.map_err(|_| SessionError::Closed)
    }

    /// Entrega un mensaje sin esperar respuesta. `false` si la sesión terminó.
    pub(crate) fn deliver(&self, message: SessionMessage) -> bool {
        self.tx.send(message).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Se completa cuando la tarea de la sesión terminó
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

enum Gate {
    Execute(Execution),
    Pending { votes: usize, required: usize },
}

pub(crate) struct Session {
    guild: GuildId,
    self_id: UserId,
    text_channel: ChannelId,
    state: ConnectionState,
    voice: Option<VoiceHandle>,
    dj: UserId,
    queue: TrackQueue,
    current: Option<Track>,
    loop_track: bool,
    loop_queue: bool,
    volume: u16,
    paused: bool,
    position_ms: u64,
    filters: Filters,
    votes: VoteLedger,
    waiting_until: Option<Instant>,
    closed: Option<TeardownReason>,
    deps: SessionDeps,
    settings: SessionSettings,
}

impl Session {
    pub(crate) fn new(
        guild: GuildId,
        self_id: UserId,
        text_channel: ChannelId,
        dj: UserId,
        deps: SessionDeps,
        settings: SessionSettings,
    ) -> Self {
        Self {
            guild,
            self_id,
            text_channel,
            state: ConnectionState::Disconnected,
            voice: None,
            dj,
            queue: TrackQueue::new(),
            current: None,
            loop_track: false,
            loop_queue: false,
            volume: settings.default_volume,
            paused: false,
            position_ms: 0,
            filters: Filters::default(),
            votes: VoteLedger::new(),
            waiting_until: None,
            closed: None,
            deps,
            settings,
        }
    }

    /// Conecta al canal y procesa el buzón hasta el teardown
    pub(crate) async fn run(
        mut self,
        channel: ChannelId,
        mut mailbox: mpsc::UnboundedReceiver<SessionMessage>,
        ready: oneshot::Sender<SessionResult<()>>,
    ) -> TeardownReason {
        if let Err(e) = self.connect(channel).await {
            warn!("⚠️ No se pudo conectar en guild {}: {}", self.guild, e);
            self.state = ConnectionState::Disconnected;
            let _ = ready.send(Err(e));
            return TeardownReason::ConnectFailed;
        }
        let _ = ready.send(Ok(()));

        loop {
            let deadline = self.waiting_until;
            tokio::select! {
                message = mailbox.recv() => match message {
                    Some(message) => self.handle(message).await,
                    None => self.teardown(TeardownReason::Shutdown).await,
                },
                () = wait_for(deadline) => {
                    info!("⌛ Cola vacía demasiado tiempo en guild {}", self.guild);
                    self.teardown(TeardownReason::IdleTimeout).await;
                }
            }

            if let Some(reason) = self.closed {
                return reason;
            }
        }
    }

    async fn connect(&mut self, channel: ChannelId) -> SessionResult<()> {
        self.state = ConnectionState::Connecting;
        let handle = self.join(channel).await?;

        self.voice = Some(handle);
        self.state = ConnectionState::Connected;
        info!("🔊 Conectado al canal {} en guild {}", channel, self.guild);
        Ok(())
    }

    /// Verifica permisos y capacidad del canal y entra por el backend
    async fn join(&self, channel: ChannelId) -> SessionResult<VoiceHandle> {
        let access = self
            .deps
            .members
            .channel_access(self.guild, channel)
            .ok_or(SessionError::PermissionDenied)?;
        if !access.can_connect || !access.can_speak {
            return Err(SessionError::PermissionDenied);
        }
        if access.is_full() {
            return Err(SessionError::ChannelFull);
        }

        let handle = tokio::time::timeout(
            self.settings.connect_timeout,
            self.deps.backend.connect(self.guild, channel),
        )
        .await
        .map_err(|_| SessionError::ConnectTimeout)??;
        Ok(handle)
    }

    async fn move_to(&mut self, actor: UserId, channel: ChannelId) -> SessionResult<CommandOutcome> {
        self.require_privilege(actor)?;
        if self.voice()?.channel() == channel {
            return Err(SessionError::AlreadyInChannel);
        }

        let handle = self.join(channel).await?;
        self.voice = Some(handle);
        // Los votos se contaron con los ocupantes del canal anterior
        self.votes.clear_all();
        info!("🚚 Sesión movida al canal {} en guild {}", channel, self.guild);
        Ok(CommandOutcome::Moved(channel))
    }

    async fn handle(&mut self, message: SessionMessage) {
        match message {
            SessionMessage::Command {
                actor,
                command,
                reply,
            } => {
                let result = self.execute(actor, command).await;
                if let Err(e) = &result {
                    debug!("Comando rechazado en guild {}: {}", self.guild, e);
                }
                let _ = reply.send(result);
            }
            SessionMessage::Node(event) => self.on_node_event(event).await,
            SessionMessage::Voice(change) => self.on_voice_move(change).await,
            SessionMessage::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            SessionMessage::Shutdown => self.teardown(TeardownReason::Shutdown).await,
        }
    }

    async fn execute(
        &mut self,
        actor: UserId,
        command: SessionCommand,
    ) -> SessionResult<CommandOutcome> {
        match command {
            SessionCommand::Enqueue(tracks) => Ok(self.enqueue(tracks).await),
            SessionCommand::Pause => self.set_paused(actor, true).await,
            SessionCommand::Resume => self.set_paused(actor, false).await,
            SessionCommand::Skip => self.skip(actor).await,
            SessionCommand::Shuffle => self.shuffle(actor),
            SessionCommand::Stop | SessionCommand::Disconnect => self.stop(actor).await,
            SessionCommand::Seek { position_ms } => self.seek(actor, position_ms).await,
            SessionCommand::SetVolume(volume) => self.set_volume(actor, volume).await,
            SessionCommand::Remove { position } => {
                self.require_privilege(actor)?;
                Ok(CommandOutcome::Removed(self.queue.remove_at(position)?))
            }
            SessionCommand::ClearQueue => {
                self.require_privilege(actor)?;
                if self.queue.is_empty() {
                    return Err(SessionError::EmptyQueue);
                }
                Ok(CommandOutcome::Cleared(self.queue.clear()))
            }
            SessionCommand::ToggleLoop => {
                self.require_privilege(actor)?;
                self.loop_track = !self.loop_track;
                Ok(CommandOutcome::LoopTrack(self.loop_track))
            }
            SessionCommand::ToggleLoopQueue => {
                self.require_privilege(actor)?;
                if !self.loop_queue && self.queue.is_empty() {
                    return Err(SessionError::EmptyQueue);
                }
                self.loop_queue = !self.loop_queue;
                Ok(CommandOutcome::LoopQueue(self.loop_queue))
            }
            SessionCommand::Replay => {
                self.require_privilege(actor)?;
                if self.current.is_none() {
                    return Err(SessionError::NothingPlaying);
                }
                self.deps.backend.seek(self.voice()?, 0).await?;
                self.position_ms = 0;
                Ok(CommandOutcome::Replayed)
            }
            SessionCommand::ApplyFilter(change) => self.apply_filter(actor, change).await,
            SessionCommand::Move(channel) => self.move_to(actor, channel).await,
        }
    }

    async fn enqueue(&mut self, tracks: Vec<Track>) -> CommandOutcome {
        let count = tracks.len();
        let position = self.queue.len() + 1;
        let was_idle = self.current.is_none();
        for track in tracks {
            self.queue.enqueue(track);
        }

        if self.waiting_until.take().is_some() {
            self.votes.clear_all();
            self.start_next().await;
        } else {
            self.advance().await;
        }

        CommandOutcome::Enqueued {
            count,
            position,
            started: was_idle && self.current.is_some(),
        }
    }

    async fn set_paused(&mut self, actor: UserId, paused: bool) -> SessionResult<CommandOutcome> {
        if self.current.is_none() {
            return Err(SessionError::NothingPlaying);
        }
        match (self.paused, paused) {
            (true, true) => return Err(SessionError::AlreadyPaused),
            (false, false) => return Err(SessionError::NotPaused),
            _ => {}
        }

        let action = if paused { VoteAction::Pause } else { VoteAction::Resume };
        match self.gate(actor, action) {
            Gate::Execute(via) => {
                self.deps.backend.pause(self.voice()?, paused).await?;
                self.paused = paused;
                info!("{} Guild {}", if paused { "⏸️ Pausado" } else { "▶️ Reanudado" }, self.guild);
                Ok(CommandOutcome::Executed { action, via })
            }
            Gate::Pending { votes, required } => Ok(CommandOutcome::VoteRecorded {
                action,
                votes,
                required,
            }),
        }
    }

    async fn skip(&mut self, actor: UserId) -> SessionResult<CommandOutcome> {
        if self.current.is_none() {
            return Err(SessionError::NothingPlaying);
        }

        match self.gate(actor, VoteAction::Skip) {
            Gate::Execute(via) => {
                info!("⏭️ Saltando pista en guild {}", self.guild);
                self.finish_current().await;
                if self.current.is_none() {
                    if let Some(voice) = &self.voice {
                        if let Err(e) = self.deps.backend.stop(voice).await {
                            warn!("⚠️ No se pudo detener el reproductor en guild {}: {}", self.guild, e);
                        }
                    }
                }
                Ok(CommandOutcome::Executed {
                    action: VoteAction::Skip,
                    via,
                })
            }
            Gate::Pending { votes, required } => Ok(CommandOutcome::VoteRecorded {
                action: VoteAction::Skip,
                votes,
                required,
            }),
        }
    }

    fn shuffle(&mut self, actor: UserId) -> SessionResult<CommandOutcome> {
        if self.queue.len() < 3 {
            return Err(SessionError::QueueTooShort {
                len: self.queue.len(),
                min: 3,
            });
        }

        match self.gate(actor, VoteAction::Shuffle) {
            Gate::Execute(via) => {
                self.queue.shuffle();
                info!("🔀 Cola mezclada en guild {}", self.guild);
                Ok(CommandOutcome::Executed {
                    action: VoteAction::Shuffle,
                    via,
                })
            }
            Gate::Pending { votes, required } => Ok(CommandOutcome::VoteRecorded {
                action: VoteAction::Shuffle,
                votes,
                required,
            }),
        }
    }

    async fn stop(&mut self, actor: UserId) -> SessionResult<CommandOutcome> {
        match self.gate(actor, VoteAction::Stop) {
            Gate::Execute(via) => {
                self.teardown(TeardownReason::Stopped).await;
                Ok(CommandOutcome::Executed {
                    action: VoteAction::Stop,
                    via,
                })
            }
            Gate::Pending { votes, required } => Ok(CommandOutcome::VoteRecorded {
                action: VoteAction::Stop,
                votes,
                required,
            }),
        }
    }

    async fn seek(&mut self, actor: UserId, position_ms: i64) -> SessionResult<CommandOutcome> {
        self.require_privilege(actor)?;
        let current = self.current.as_ref().ok_or(SessionError::NothingPlaying)?;

        let duration_ms = current.info.length;
        let valid = current.info.is_seekable && position_ms >= 0 && (position_ms as u64) < duration_ms;
        if !valid {
            return Err(SessionError::InvalidPosition {
                position_ms,
                duration_ms,
            });
        }

        let position_ms = position_ms as u64;
        self.deps.backend.seek(self.voice()?, position_ms).await?;
        self.position_ms = position_ms;
        Ok(CommandOutcome::Seeked { position_ms })
    }

    async fn set_volume(&mut self, actor: UserId, volume: i64) -> SessionResult<CommandOutcome> {
        self.require_privilege(actor)?;
        if !(0..=1000).contains(&volume) {
            return Err(SessionError::OutOfRange {
                value: volume,
                min: 0,
                max: 1000,
            });
        }

        let volume = volume as u16;
        self.deps.backend.set_volume(self.voice()?, volume).await?;
        self.volume = volume;
        info!("🔊 Volumen {} en guild {}", volume, self.guild);
        Ok(CommandOutcome::VolumeSet(volume))
    }

    async fn apply_filter(
        &mut self,
        actor: UserId,
        change: FilterChange,
    ) -> SessionResult<CommandOutcome> {
        self.require_privilege(actor)?;

        let next = self.filters.with(&change);
        let resume_at = self.current.as_ref().map(|_| self.position_ms);
        self.deps
            .backend
            .set_filters(self.voice()?, &next, resume_at)
            .await?;
        self.filters = next.clone();
        info!("🎛️ Filtros {:?} en guild {}", next.active_names(), self.guild);
        Ok(CommandOutcome::FiltersApplied(next))
    }

    /// Decide si una acción votable se ejecuta ya o queda pendiente
    fn gate(&mut self, actor: UserId, action: VoteAction) -> Gate {
        let bypass = if self.is_privileged(actor) {
            Some(Execution::Privileged)
        } else if action == VoteAction::Skip
            && self.current.as_ref().is_some_and(|t| t.requester == actor)
        {
            Some(Execution::Requester)
        } else {
            None
        };

        if let Some(via) = bypass {
            self.votes.clear(action);
            return Gate::Execute(via);
        }

        let required = required_votes(action, self.occupants());
        let votes = self.votes.record(action, actor);
        debug!(
            "🗳️ Voto para {} en guild {}: {}/{}",
            action.label(),
            self.guild,
            votes,
            required
        );

        if votes >= required {
            self.votes.clear(action);
            Gate::Execute(Execution::Quorum)
        } else {
            Gate::Pending { votes, required }
        }
    }

    fn is_privileged(&self, actor: UserId) -> bool {
        policy::is_privileged(self.deps.privileges.as_ref(), self.guild, self.dj, actor)
    }

    fn require_privilege(&self, actor: UserId) -> SessionResult<()> {
        if self.is_privileged(actor) {
            Ok(())
        } else {
            Err(SessionError::NotPrivileged)
        }
    }

    fn voice(&self) -> SessionResult<&VoiceHandle> {
        self.voice.as_ref().ok_or(SessionError::Closed)
    }

    /// Ocupantes del canal sin contar al propio bot
    fn occupants(&self) -> usize {
        let Some(voice) = &self.voice else {
            return 0;
        };
        self.deps
            .members
            .members_of(self.guild, voice.channel())
            .iter()
            .filter(|member| member.id != self.self_id)
            .count()
    }

    fn is_current(&self, track: &LoadedTrack) -> bool {
        self.current.as_ref().is_some_and(|current| current.is_same(track))
    }

    /// Arranca la siguiente pista si no hay nada sonando ni esperando
    async fn advance(&mut self) {
        if self.current.is_some() || self.waiting_until.is_some() {
            return;
        }

        self.votes.clear_all();
        self.start_next().await;
    }

    async fn start_next(&mut self) {
        while let Some(track) = self.queue.pop_front() {
            if self.play(track).await {
                return;
            }
        }

        self.waiting_until = Some(Instant::now() + self.settings.queue_wait);
        debug!("⏳ Esperando pistas en guild {}", self.guild);
    }

    async fn play(&mut self, track: Track) -> bool {
        let Some(voice) = &self.voice else {
            return false;
        };

        let volume = self.settings.default_volume;
        if let Err(e) = self.deps.backend.play(voice, &track, volume).await {
            error!(
                "❌ No se pudo reproducir '{}' en guild {}: {}",
                track.title(),
                self.guild,
                e
            );
            return false;
        }

        info!("🎵 Reproduciendo en guild {}: {}", self.guild, track.title());
        self.volume = volume;
        self.paused = false;
        self.position_ms = 0;
        self.current = Some(track.clone());
        self.notify(Notice::NowPlaying { track, dj: self.dj }).await;
        true
    }

    /// Camino común de fin de pista: aplica los loops y avanza
    async fn finish_current(&mut self) {
        let Some(ended) = self.current.take() else {
            return;
        };

        if self.loop_track {
            self.queue.enqueue_front(ended);
        } else if self.loop_queue {
            self.queue.enqueue(ended);
        }

        if self.queue.is_empty() {
            self.notify(Notice::QueueEnded {
                disconnect_after: self.settings.queue_wait,
            })
            .await;
        }

        self.advance().await;
    }

    async fn on_node_event(&mut self, event: NodeEvent) {
        match event {
            NodeEvent::PlayerUpdate { position_ms, .. } => {
                self.position_ms = position_ms;
            }
            NodeEvent::TrackStart { track, .. } => {
                debug!("▶️ El nodo inició '{}' en guild {}", track.info.title, self.guild);
            }
            NodeEvent::TrackEnd { track, reason, .. } => {
                if !reason.may_start_next() || !self.is_current(&track) {
                    debug!("Fin de pista ignorado en guild {} ({:?})", self.guild, reason);
                    return;
                }
                debug!("⏹️ Fin de '{}' en guild {} ({:?})", track.info.title, self.guild, reason);
                self.finish_current().await;
            }
            NodeEvent::TrackStuck {
                track,
                threshold_ms,
                ..
            } => {
                if !self.is_current(&track) {
                    return;
                }
                warn!(
                    "⚠️ Pista atascada en guild {} ({}ms): {}",
                    self.guild, threshold_ms, track.info.title
                );
                if let Some(stuck) = self.current.take() {
                    self.queue.enqueue_front(stuck.clone());
                    self.advance().await;
                    self.notify(Notice::TrackStuck { track: stuck }).await;
                }
            }
            NodeEvent::TrackException {
                track, exception, ..
            } => {
                if !self.is_current(&track) {
                    return;
                }
                warn!(
                    "⚠️ Excepción en '{}' (guild {}): {}",
                    track.info.title, self.guild, exception.cause
                );
                self.loop_track = false;
                self.loop_queue = false;
                if let Some(failed) = self.current.take() {
                    self.advance().await;
                    self.notify(Notice::TrackFailed {
                        track: failed.clone(),
                    })
                    .await;
                    self.deps
                        .reporter
                        .report(TrackFailure {
                            guild: self.guild,
                            track: failed,
                            severity: exception.severity,
                            cause: exception.cause,
                            message: exception.message,
                        })
                        .await;
                }
            }
            NodeEvent::VoiceClosed {
                code,
                reason,
                by_remote,
                ..
            } => {
                warn!(
                    "🔌 Voz cerrada en guild {} (código {}, remoto: {}): {}",
                    self.guild, code, by_remote, reason
                );
            }
            NodeEvent::Ready { resumed: true, .. } => {}
            NodeEvent::Ready { resumed: false, .. } => {
                if let Err(e) = self.restore_player().await {
                    error!(
                        "❌ No se pudo restaurar el reproductor en guild {}: {}",
                        self.guild, e
                    );
                    self.teardown(TeardownReason::NodeLost).await;
                }
            }
        }
    }

    /// Tras un reinicio del nodo: reenvía la voz y retoma la pista donde iba
    async fn restore_player(&self) -> SessionResult<()> {
        let Some(voice) = &self.voice else {
            return Ok(());
        };
        let backend = &self.deps.backend;

        backend.restore_voice(voice).await?;
        if !self.filters.active_names().is_empty() {
            backend.set_filters(voice, &self.filters, None).await?;
        }

        let Some(track) = &self.current else {
            return Ok(());
        };
        backend.play(voice, track, self.volume).await?;
        if self.position_ms > 0 && track.info.is_seekable {
            backend.seek(voice, self.position_ms).await?;
        }
        if self.paused {
            backend.pause(voice, true).await?;
        }

        info!(
            "🔄 Reproductor restaurado en guild {}: {} desde {}ms",
            self.guild,
            track.title(),
            self.position_ms
        );
        Ok(())
    }

    async fn on_voice_move(&mut self, change: VoiceMove) {
        let Some(channel) = self.voice.as_ref().map(VoiceHandle::channel) else {
            return;
        };

        if change.user == self.self_id {
            match change.to {
                None => {
                    info!("🔌 Bot desconectado de la voz en guild {}", self.guild);
                    self.teardown(TeardownReason::Kicked).await;
                }
                Some(to) if to != channel => {
                    info!("🚚 Bot movido al canal {} en guild {}", to, self.guild);
                    if let Some(voice) = self.voice.as_mut() {
                        voice.moved_to(to);
                    }
                }
                Some(_) => {}
            }
            return;
        }

        if change.bot || (change.from != Some(channel) && change.to != Some(channel)) {
            return;
        }

        let members = self.deps.members.members_of(self.guild, channel);
        if !members.iter().any(|member| !member.bot) {
            info!("🚪 Canal vacío en guild {}", self.guild);
            self.teardown(TeardownReason::ChannelEmpty).await;
            return;
        }

        if let Some(dj) = policy::next_dj(self.dj, &change, channel, &members) {
            info!("🎧 Nuevo DJ en guild {}: {}", self.guild, dj);
            self.dj = dj;
            self.votes.retract(dj);
        }
    }

    async fn notify(&self, notice: Notice) {
        self.deps.notifier.notify(self.text_channel, notice).await;
    }

    /// Reinicio completo; solo tiene efecto la primera vez
    async fn teardown(&mut self, reason: TeardownReason) {
        if self.closed.is_some() {
            return;
        }
        self.closed = Some(reason);

        self.queue.clear();
        self.loop_track = false;
        self.loop_queue = false;
        self.votes.clear_all();
        self.waiting_until = None;
        self.current = None;

        if let Some(voice) = self.voice.take() {
            if let Err(e) = self.deps.backend.stop(&voice).await {
                warn!("⚠️ Error deteniendo el reproductor en guild {}: {}", self.guild, e);
            }
            if let Err(e) = self.deps.backend.disconnect(voice).await {
                warn!("⚠️ Error desconectando en guild {}: {}", self.guild, e);
            }
        }

        self.state = ConnectionState::Disconnected;
        info!("👋 Sesión cerrada en guild {} ({:?})", self.guild, reason);
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            guild: self.guild,
            state: self.state,
            voice_channel: self.voice.as_ref().map(VoiceHandle::channel),
            text_channel: self.text_channel,
            dj: self.dj,
            current: self.current.clone(),
            position_ms: self.position_ms,
            paused: self.paused,
            volume: self.volume,
            loop_track: self.loop_track,
            loop_queue: self.loop_queue,
            waiting: self.waiting_until.is_some(),
            queue: self.queue.to_vec(),
            filters: self.filters.clone(),
        }
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
