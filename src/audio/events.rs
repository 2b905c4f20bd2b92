use serde::{Deserialize, Serialize};
use serenity::model::id::GuildId;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::audio::manager::SessionManager;
use crate::audio::track::LoadedTrack;

/// Gravedad de una excepción de pista según el nodo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Common,
    Suspicious,
    Fault,
}

/// Motivo por el que el nodo terminó una pista
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackEndReason {
    Finished,
    LoadFailed,
    Stopped,
    Replaced,
    Cleanup,
}

impl TrackEndReason {
    /// `replaced` lo provoca la propia sesión al cambiar de pista y
    /// `loadFailed` siempre llega acompañado de una excepción.
    pub fn may_start_next(&self) -> bool {
        !matches!(self, TrackEndReason::Replaced | TrackEndReason::LoadFailed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackException {
    pub message: Option<String>,
    pub severity: Severity,
    pub cause: String,
}

/// Eventos asíncronos del nodo de audio, ya tipados
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    Ready {
        session_id: String,
        resumed: bool,
    },
    PlayerUpdate {
        guild: GuildId,
        position_ms: u64,
        connected: bool,
    },
    TrackStart {
        guild: GuildId,
        track: LoadedTrack,
    },
    TrackEnd {
        guild: GuildId,
        track: LoadedTrack,
        reason: TrackEndReason,
    },
    TrackStuck {
        guild: GuildId,
        track: LoadedTrack,
        threshold_ms: u64,
    },
    TrackException {
        guild: GuildId,
        track: LoadedTrack,
        exception: TrackException,
    },
    VoiceClosed {
        guild: GuildId,
        code: u16,
        reason: String,
        by_remote: bool,
    },
}

impl NodeEvent {
    /// Guild a la que va dirigido el evento, si aplica
    pub fn guild(&self) -> Option<GuildId> {
        match self {
            NodeEvent::Ready { .. } => None,
            NodeEvent::PlayerUpdate { guild, .. }
            | NodeEvent::TrackStart { guild, .. }
            | NodeEvent::TrackEnd { guild, .. }
            | NodeEvent::TrackStuck { guild, .. }
            | NodeEvent::TrackException { guild, .. }
            | NodeEvent::VoiceClosed { guild, .. } => Some(*guild),
        }
    }
}

/// Reenvía los eventos del nodo al buzón de la sesión de cada guild.
///
/// Un `ready` sin reanudar después de una sesión anterior significa que el
/// nodo perdió todos los reproductores: se avisa a todas las sesiones.
/// Termina cuando se cierra el canal de eventos.
pub async fn pump(mut events: mpsc::UnboundedReceiver<NodeEvent>, manager: Arc<SessionManager>) {
    let mut previous_session: Option<String> = None;

    while let Some(event) = events.recv().await {
        if let NodeEvent::Ready { session_id, resumed } = &event {
            info!("🎼 Nodo listo (sesión {}, resumida: {})", session_id, resumed);
            let restarted = !*resumed && previous_session.is_some();
            previous_session = Some(session_id.clone());
            if restarted {
                let count = manager.broadcast_node_event(&event);
                warn!("🔄 Nodo reiniciado sin reanudar, restaurando {} sesiones", count);
            }
            continue;
        }

        if !manager.route_node_event(event) {
            debug!("📭 Evento del nodo sin sesión activa");
        }
    }

    info!("🔌 Canal de eventos del nodo cerrado");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::session::SessionCommand;
    use crate::audio::testing::*;
    use crate::audio::track::sample_track;
    use pretty_assertions::assert_eq;

    fn ready(session_id: &str, resumed: bool) -> NodeEvent {
        NodeEvent::Ready {
            session_id: session_id.to_string(),
            resumed,
        }
    }

    fn restores(harness: &Harness) -> usize {
        harness
            .backend
            .calls()
            .iter()
            .filter(|call| **call == BackendCall::RestoreVoice)
            .count()
    }

    #[tokio::test]
    async fn only_a_fresh_session_after_another_reaches_the_sessions() {
        let harness = Harness::new(&[1]);
        let manager = Arc::new(SessionManager::new(harness.deps(), settings(), BOT));
        let session = manager.connect(GUILD, VOICE, TEXT, user(1)).await.unwrap();
        session
            .command(user(1), SessionCommand::Enqueue(vec![sample_track("a", 60_000, 1)]))
            .await
            .unwrap();

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(ready("primera", false)).unwrap();
        tx.send(ready("primera", true)).unwrap();
        drop(tx);
        pump(rx, Arc::clone(&manager)).await;
        session.snapshot().await.unwrap();
        assert_eq!(restores(&harness), 0);

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(ready("primera", false)).unwrap();
        tx.send(ready("segunda", false)).unwrap();
        drop(tx);
        pump(rx, Arc::clone(&manager)).await;
        session.snapshot().await.unwrap();
        assert_eq!(restores(&harness), 1);
    }

    #[test]
    fn replaced_and_load_failed_do_not_advance() {
        assert!(TrackEndReason::Finished.may_start_next());
        assert!(TrackEndReason::Stopped.may_start_next());
        assert!(TrackEndReason::Cleanup.may_start_next());
        assert!(!TrackEndReason::Replaced.may_start_next());
        assert!(!TrackEndReason::LoadFailed.may_start_next());
    }

    #[test]
    fn ready_has_no_guild() {
        let event = NodeEvent::Ready {
            session_id: "abc".to_string(),
            resumed: false,
        };
        assert_eq!(event.guild(), None);
    }
}
