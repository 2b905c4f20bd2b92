use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId, UserId};
use serenity::prelude::TypeMapKey;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::audio::events::NodeEvent;
use crate::audio::policy::{self, VoiceMove};
use crate::audio::session::{
    Session, SessionDeps, SessionHandle, SessionMessage, SessionSettings,
};
use crate::audio::track::SearchResult;
use crate::error::{BackendError, SessionError, SessionResult};

/// Registro de sesiones activas, una por guild.
///
/// Solo guarda handles; el estado vive dentro de cada tarea de sesión. Una
/// sesión que termina se quita a sí misma del registro, y solo su propia
/// entrada: si ya la reemplazó una sesión nueva, no la toca.
pub struct SessionManager {
    sessions: Arc<DashMap<GuildId, SessionHandle>>,
    deps: SessionDeps,
    settings: SessionSettings,
    bot_id: UserId,
    next_id: AtomicU64,
}

impl TypeMapKey for SessionManager {
    type Value = Arc<SessionManager>;
}

impl SessionManager {
    pub fn new(deps: SessionDeps, settings: SessionSettings, bot_id: UserId) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            deps,
            settings,
            bot_id,
            next_id: AtomicU64::new(1),
        }
    }

    /// Sesión viva de la guild, si existe
    pub fn get(&self, guild: GuildId) -> Option<SessionHandle> {
        self.sessions
            .get(&guild)
            .map(|entry| entry.value().clone())
            .filter(|handle| !handle.is_closed())
    }

    /// Devuelve la sesión de la guild o crea una nueva conectada a `channel`.
    ///
    /// Quien crea la sesión queda como DJ. Si la conexión falla la sesión no
    /// queda registrada y se devuelve el error de conexión.
    pub async fn connect(
        &self,
        guild: GuildId,
        channel: ChannelId,
        text_channel: ChannelId,
        requester: UserId,
    ) -> SessionResult<SessionHandle> {
        let (handle, ready) = match self.sessions.entry(guild) {
            Entry::Occupied(entry) if !entry.get().is_closed() => (entry.get().clone(), None),
            Entry::Occupied(mut entry) => {
                let (handle, ready) = self.spawn(guild, channel, text_channel, requester);
                entry.insert(handle.clone());
                (handle, Some(ready))
            }
            Entry::Vacant(entry) => {
                let (handle, ready) = self.spawn(guild, channel, text_channel, requester);
                entry.insert(handle.clone());
                (handle, Some(ready))
            }
        };

        let Some(ready) = ready else {
            return Ok(handle);
        };

        let result = ready.await.unwrap_or(Err(SessionError::Closed));
        if result.is_err() {
            self.unregister(guild, handle.id());
        }
        result.map(|()| handle)
    }

    fn spawn(
        &self,
        guild: GuildId,
        channel: ChannelId,
        text_channel: ChannelId,
        dj: UserId,
    ) -> (SessionHandle, oneshot::Receiver<SessionResult<()>>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        let session = Session::new(
            guild,
            self.bot_id,
            text_channel,
            dj,
            self.deps.clone(),
            self.settings,
        );
        let sessions = Arc::clone(&self.sessions);
        tokio::spawn(async move {
            let reason = session.run(channel, rx, ready_tx).await;
            sessions.remove_if(&guild, |_, handle| handle.id() == id);
            debug!("Sesión {} de guild {} terminó: {:?}", id, guild, reason);
        });

        info!("🎶 Nueva sesión {} en guild {} (DJ {})", id, guild, dj);
        (SessionHandle::new(id, guild, tx), ready_rx)
    }

    fn unregister(&self, guild: GuildId, id: u64) {
        self.sessions.remove_if(&guild, |_, handle| handle.id() == id);
    }

    /// Entrega un evento del nodo a la sesión de su guild.
    /// `false` si no hay sesión que lo reciba.
    pub fn route_node_event(&self, event: NodeEvent) -> bool {
        let Some(guild) = event.guild() else {
            return false;
        };
        self.get(guild)
            .is_some_and(|handle| handle.deliver(SessionMessage::Node(event)))
    }

    /// Entrega un evento del nodo a todas las sesiones vivas.
    /// Devuelve cuántas lo recibieron.
    pub fn broadcast_node_event(&self, event: &NodeEvent) -> usize {
        let handles: Vec<SessionHandle> = self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        handles
            .iter()
            .filter(|handle| handle.deliver(SessionMessage::Node(event.clone())))
            .count()
    }

    /// Entrega un cambio de voz a la sesión de la guild
    pub fn voice_update(&self, guild: GuildId, change: VoiceMove) -> bool {
        self.get(guild)
            .is_some_and(|handle| handle.deliver(SessionMessage::Voice(change)))
    }

    pub async fn search(&self, query: &str) -> Result<SearchResult, BackendError> {
        self.deps.backend.search(query).await
    }

    pub fn is_privileged(&self, guild: GuildId, dj: UserId, actor: UserId) -> bool {
        policy::is_privileged(self.deps.privileges.as_ref(), guild, dj, actor)
    }

    pub fn has_manage_guild(&self, guild: GuildId, user: UserId) -> bool {
        self.deps.privileges.has_manage_guild(guild, user)
    }

    pub fn voice_channel_of(&self, guild: GuildId, user: UserId) -> Option<ChannelId> {
        self.deps.members.voice_channel_of(guild, user)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Cierra todas las sesiones y espera a que terminen
    pub async fn shutdown(&self) {
        let handles: Vec<SessionHandle> = self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        info!("🛑 Cerrando {} sesiones", handles.len());

        for handle in &handles {
            handle.deliver(SessionMessage::Shutdown);
        }
        for handle in handles {
            handle.closed().await;
        }
        self.sessions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::session::{CommandOutcome, SessionCommand};
    use crate::audio::testing::*;
    use crate::audio::events::TrackEndReason;
    use crate::audio::track::sample_track;
    use crate::audio::policy::ChannelAccess;
    use pretty_assertions::assert_eq;

    fn manager(harness: &Harness) -> SessionManager {
        SessionManager::new(harness.deps(), settings(), BOT)
    }

    #[tokio::test]
    async fn connect_reuses_the_live_session() {
        let harness = Harness::new(&[1, 2]);
        let manager = manager(&harness);

        let first = manager.connect(GUILD, VOICE, TEXT, user(1)).await.unwrap();
        let second = manager.connect(GUILD, VOICE, TEXT, user(2)).await.unwrap();

        assert_eq!(first.id(), second.id());
        assert_eq!(manager.len(), 1);
        assert_eq!(second.snapshot().await.unwrap().dj, user(1));
    }

    #[tokio::test]
    async fn failed_connect_leaves_no_session() {
        let harness = Harness::new(&[1]);
        harness.guild.set_access(Some(ChannelAccess {
            can_connect: false,
            can_speak: true,
            can_move_members: false,
            user_limit: None,
            occupants: 0,
        }));
        let manager = manager(&harness);

        let result = manager.connect(GUILD, VOICE, TEXT, user(1)).await;
        assert!(matches!(result, Err(SessionError::PermissionDenied)));
        assert!(manager.get(GUILD).is_none());
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn node_events_reach_the_guild_session() {
        let harness = Harness::new(&[1]);
        let manager = manager(&harness);
        let session = manager.connect(GUILD, VOICE, TEXT, user(1)).await.unwrap();
        let a = sample_track("a", 1000, 1);
        let outcome = session
            .command(
                user(1),
                SessionCommand::Enqueue(vec![a.clone(), sample_track("b", 1000, 1)]),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, CommandOutcome::Enqueued { started: true, .. }));

        assert!(manager.route_node_event(ended(&a, TrackEndReason::Finished)));
        assert_eq!(
            session.snapshot().await.unwrap().current.map(|t| t.info.title),
            Some("b".to_string())
        );

        let elsewhere = NodeEvent::PlayerUpdate {
            guild: GuildId::new(77),
            position_ms: 0,
            connected: true,
        };
        assert!(!manager.route_node_event(elsewhere));
    }

    #[tokio::test]
    async fn stopped_session_is_replaced_by_a_new_one() {
        let harness = Harness::new(&[1]);
        let manager = manager(&harness);
        let first = manager.connect(GUILD, VOICE, TEXT, user(1)).await.unwrap();

        first.command(user(1), SessionCommand::Stop).await.unwrap();
        first.closed().await;

        let second = manager.connect(GUILD, VOICE, TEXT, user(1)).await.unwrap();
        assert_ne!(first.id(), second.id());
        assert_eq!(manager.get(GUILD).map(|h| h.id()), Some(second.id()));
    }

    #[tokio::test]
    async fn shutdown_closes_every_session() {
        let harness = Harness::new(&[1]);
        let manager = manager(&harness);
        let session = manager.connect(GUILD, VOICE, TEXT, user(1)).await.unwrap();

        manager.shutdown().await;

        assert!(session.is_closed());
        assert!(manager.is_empty());
        assert_eq!(harness.backend.calls().last(), Some(&BackendCall::Disconnect));
    }
}
