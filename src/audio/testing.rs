//! Dobles de prueba compartidos por los tests de sesión y del gestor

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::audio::backend::{
    AudioBackend, FailureReporter, Notice, Notifier, TrackFailure, VoiceHandle,
};
use crate::audio::events::{NodeEvent, TrackEndReason};
use crate::audio::filters::Filters;
use crate::audio::policy::{
    ChannelAccess, ChannelMember, MembershipSource, PrivilegeSource, VoiceMove,
};
use crate::audio::session::{SessionDeps, SessionSettings};
use crate::audio::track::{LoadedTrack, SearchResult, Track};
use crate::error::BackendError;

pub const GUILD: GuildId = GuildId::new(1);
pub const VOICE: ChannelId = ChannelId::new(2);
pub const TEXT: ChannelId = ChannelId::new(3);
pub const LOUNGE: ChannelId = ChannelId::new(4);
pub const BOT: UserId = UserId::new(999);

pub fn user(id: u64) -> UserId {
    UserId::new(id)
}

pub fn settings() -> SessionSettings {
    SessionSettings {
        default_volume: 100,
        queue_wait: Duration::from_secs(300),
        connect_timeout: Duration::from_secs(10),
    }
}

pub fn loaded(track: &Track) -> LoadedTrack {
    LoadedTrack {
        encoded: track.encoded.clone(),
        info: track.info.clone(),
    }
}

pub fn ended(track: &Track, reason: TrackEndReason) -> NodeEvent {
    NodeEvent::TrackEnd {
        guild: GUILD,
        track: loaded(track),
        reason,
    }
}

/// El nodo arrancó una sesión nueva sin reanudar la anterior
pub fn node_restarted() -> NodeEvent {
    NodeEvent::Ready {
        session_id: "nueva".to_string(),
        resumed: false,
    }
}

pub fn left(id: u64) -> VoiceMove {
    VoiceMove {
        user: user(id),
        bot: false,
        from: Some(VOICE),
        to: None,
    }
}

pub fn titles(tracks: &[Track]) -> Vec<&str> {
    tracks.iter().map(Track::title).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Connect(ChannelId),
    RestoreVoice,
    Play { title: String, volume: u16 },
    Pause(bool),
    Seek(u64),
    Volume(u16),
    Filters { resume_at: Option<u64> },
    Stop,
    Disconnect,
}

/// Backend que registra cada llamada
#[derive(Default)]
pub struct FakeBackend {
    calls: Mutex<Vec<BackendCall>>,
    connect_delay: Mutex<Option<Duration>>,
    failing: Mutex<HashSet<String>>,
    restore_fails: Mutex<bool>,
}

impl FakeBackend {
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().clone()
    }

    /// Títulos reproducidos, en orden
    pub fn plays(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                BackendCall::Play { title, .. } => Some(title.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn set_connect_delay(&self, delay: Duration) {
        *self.connect_delay.lock() = Some(delay);
    }

    pub fn fail_play(&self, title: &str) {
        self.failing.lock().insert(title.to_string());
    }

    pub fn fail_restore(&self) {
        *self.restore_fails.lock() = true;
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl AudioBackend for FakeBackend {
    async fn search(&self, _query: &str) -> Result<SearchResult, BackendError> {
        Ok(SearchResult::Empty)
    }

    async fn connect(&self, guild: GuildId, channel: ChannelId) -> Result<VoiceHandle, BackendError> {
        let delay = *self.connect_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.record(BackendCall::Connect(channel));
        Ok(VoiceHandle::new(guild, channel))
    }

    async fn restore_voice(&self, _handle: &VoiceHandle) -> Result<(), BackendError> {
        if *self.restore_fails.lock() {
            return Err(BackendError::Voice("sin llamada activa".to_string()));
        }
        self.record(BackendCall::RestoreVoice);
        Ok(())
    }

    async fn play(&self, _handle: &VoiceHandle, track: &Track, volume: u16) -> Result<(), BackendError> {
        if self.failing.lock().contains(track.title()) {
            return Err(BackendError::NotReady);
        }
        self.record(BackendCall::Play {
            title: track.title().to_string(),
            volume,
        });
        Ok(())
    }

    async fn pause(&self, _handle: &VoiceHandle, paused: bool) -> Result<(), BackendError> {
        self.record(BackendCall::Pause(paused));
        Ok(())
    }

    async fn seek(&self, _handle: &VoiceHandle, position_ms: u64) -> Result<(), BackendError> {
        self.record(BackendCall::Seek(position_ms));
        Ok(())
    }

    async fn set_volume(&self, _handle: &VoiceHandle, volume: u16) -> Result<(), BackendError> {
        self.record(BackendCall::Volume(volume));
        Ok(())
    }

    async fn set_filters(
        &self,
        _handle: &VoiceHandle,
        _filters: &Filters,
        position_ms: Option<u64>,
    ) -> Result<(), BackendError> {
        self.record(BackendCall::Filters {
            resume_at: position_ms,
        });
        Ok(())
    }

    async fn stop(&self, _handle: &VoiceHandle) -> Result<(), BackendError> {
        self.record(BackendCall::Stop);
        Ok(())
    }

    async fn disconnect(&self, _handle: VoiceHandle) -> Result<(), BackendError> {
        self.record(BackendCall::Disconnect);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, _channel: ChannelId, notice: Notice) {
        self.notices.lock().push(notice);
    }
}

#[derive(Default)]
pub struct RecordingReporter {
    failures: Mutex<Vec<TrackFailure>>,
}

impl RecordingReporter {
    pub fn failures(&self) -> Vec<TrackFailure> {
        self.failures.lock().clone()
    }
}

#[async_trait]
impl FailureReporter for RecordingReporter {
    async fn report(&self, failure: TrackFailure) {
        self.failures.lock().push(failure);
    }
}

/// Guild en memoria con un único canal de voz donde ya está el bot
pub struct FakeGuild {
    humans: Mutex<Vec<UserId>>,
    admins: Mutex<HashSet<UserId>>,
    access: Mutex<Option<ChannelAccess>>,
}

impl FakeGuild {
    pub fn with_humans(ids: &[u64]) -> Self {
        Self {
            humans: Mutex::new(ids.iter().copied().map(UserId::new).collect()),
            admins: Mutex::new(HashSet::new()),
            access: Mutex::new(Some(ChannelAccess {
                can_connect: true,
                can_speak: true,
                can_move_members: false,
                user_limit: None,
                occupants: 0,
            })),
        }
    }

    pub fn set_humans(&self, ids: &[u64]) {
        *self.humans.lock() = ids.iter().copied().map(UserId::new).collect();
    }

    pub fn grant_admin(&self, id: u64) {
        self.admins.lock().insert(UserId::new(id));
    }

    pub fn set_access(&self, access: Option<ChannelAccess>) {
        *self.access.lock() = access;
    }
}

impl PrivilegeSource for FakeGuild {
    fn has_manage_guild(&self, _guild: GuildId, user: UserId) -> bool {
        self.admins.lock().contains(&user)
    }

    fn role_names(&self, _guild: GuildId, _user: UserId) -> Vec<String> {
        Vec::new()
    }
}

impl MembershipSource for FakeGuild {
    fn members_of(&self, _guild: GuildId, _channel: ChannelId) -> Vec<ChannelMember> {
        let mut members = vec![ChannelMember { id: BOT, bot: true }];
        members.extend(
            self.humans
                .lock()
                .iter()
                .map(|&id| ChannelMember { id, bot: false }),
        );
        members
    }

    fn channel_access(&self, _guild: GuildId, _channel: ChannelId) -> Option<ChannelAccess> {
        let occupants = self.humans.lock().len();
        self.access.lock().map(|access| ChannelAccess {
            occupants,
            ..access
        })
    }

    fn voice_channel_of(&self, _guild: GuildId, user: UserId) -> Option<ChannelId> {
        self.humans.lock().contains(&user).then_some(VOICE)
    }
}

/// Conjunto de dobles listo para construir sesiones
pub struct Harness {
    pub backend: Arc<FakeBackend>,
    pub notifier: Arc<RecordingNotifier>,
    pub reporter: Arc<RecordingReporter>,
    pub guild: Arc<FakeGuild>,
}

impl Harness {
    pub fn new(humans: &[u64]) -> Self {
        Self {
            backend: Arc::new(FakeBackend::default()),
            notifier: Arc::new(RecordingNotifier::default()),
            reporter: Arc::new(RecordingReporter::default()),
            guild: Arc::new(FakeGuild::with_humans(humans)),
        }
    }

    pub fn deps(&self) -> SessionDeps {
        SessionDeps {
            backend: self.backend.clone(),
            notifier: self.notifier.clone(),
            reporter: self.reporter.clone(),
            privileges: self.guild.clone(),
            members: self.guild.clone(),
        }
    }
}
