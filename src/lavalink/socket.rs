use anyhow::Result;
use futures::StreamExt;
use serenity::model::id::UserId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::model::IncomingMessage;
use super::LavalinkNode;
use crate::audio::events::NodeEvent;
use crate::config::Config;

const BACKOFF_BASE_MS: u64 = 1000;

/// Espera exponencial entre reconexiones: 1s, 2s, 4s y luego 8s fijos
struct Backoff {
    attempt: u32,
    max_attempts: u32,
}

impl Backoff {
    fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            max_attempts,
        }
    }

    fn next(&mut self) -> Duration {
        self.attempt += 1;
        let delay = BACKOFF_BASE_MS * 2u64.pow((self.attempt - 1).min(3));
        Duration::from_millis(delay)
    }

    fn is_exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }

    fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// Datos para abrir el websocket de eventos
#[derive(Debug, Clone)]
pub struct SocketSettings {
    pub url: String,
    pub password: String,
    pub user_id: UserId,
    pub max_reconnects: u32,
}

impl SocketSettings {
    pub fn new(config: &Config, user_id: UserId) -> Self {
        Self {
            url: config.lavalink_ws_url(),
            password: config.lavalink_password.clone(),
            user_id,
            max_reconnects: config.lavalink_max_reconnects,
        }
    }
}

/// Mantiene abierto el websocket del nodo y publica sus eventos.
///
/// Reconecta con espera exponencial hasta agotar los intentos o hasta que
/// se cancele `cancel`. Al terminar se cierra el canal de eventos.
pub async fn listen(
    node: Arc<LavalinkNode>,
    settings: SocketSettings,
    events: mpsc::UnboundedSender<NodeEvent>,
    cancel: CancellationToken,
) {
    let mut backoff = Backoff::new(settings.max_reconnects);

    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = run_once(&node, &settings, &events, &mut backoff) => result,
        };

        match result {
            Ok(()) if events.is_closed() => break,
            Ok(()) => warn!("🔌 El nodo cerró el websocket"),
            Err(e) => warn!("⚠️ Error en el websocket del nodo: {}", e),
        }

        if backoff.is_exhausted() {
            error!("❌ Sin conexión con Lavalink tras {} intentos", settings.max_reconnects);
            break;
        }

        let delay = backoff.next();
        info!("🔄 Reconectando con Lavalink en {:?}", delay);
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    info!("🛑 Listener de Lavalink detenido");
}

async fn run_once(
    node: &LavalinkNode,
    settings: &SocketSettings,
    events: &mpsc::UnboundedSender<NodeEvent>,
    backoff: &mut Backoff,
) -> Result<()> {
    let mut request = settings.url.as_str().into_client_request()?;
    let headers = request.headers_mut();
    headers.insert("Authorization", HeaderValue::from_str(&settings.password)?);
    headers.insert("User-Id", HeaderValue::from_str(&settings.user_id.to_string())?);
    headers.insert("Client-Name", HeaderValue::from_static(concat!("djbooth/", env!("CARGO_PKG_VERSION"))));

    let (stream, _) = connect_async(request).await?;
    info!("✅ Conectado al websocket de Lavalink");
    backoff.reset();

    let (_write, mut read) = stream.split();
    while let Some(message) = read.next().await {
        match message? {
            Message::Text(text) => {
                let Some(event) = decode(&text) else {
                    continue;
                };
                if let NodeEvent::Ready { session_id, .. } = &event {
                    node.set_session_id(session_id.clone());
                }
                if events.send(event).is_err() {
                    return Ok(());
                }
            }
            Message::Close(frame) => {
                debug!("Cierre del websocket: {:?}", frame);
                break;
            }
            _ => {}
        }
    }

    Ok(())
}

fn decode(text: &str) -> Option<NodeEvent> {
    match serde_json::from_str::<IncomingMessage>(text) {
        Ok(message) => message.into_event(),
        Err(e) => {
            warn!("⚠️ Mensaje del nodo no reconocido: {} - {}", e, text);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn backoff_doubles_up_to_eight_seconds() {
        let mut backoff = Backoff::new(10);
        let delays: Vec<u64> = (0..5).map(|_| backoff.next().as_millis() as u64).collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 8000]);
    }

    #[test]
    fn backoff_exhausts_and_resets() {
        let mut backoff = Backoff::new(2);
        backoff.next();
        assert!(!backoff.is_exhausted());
        backoff.next();
        assert!(backoff.is_exhausted());

        backoff.reset();
        assert!(!backoff.is_exhausted());
        assert_eq!(backoff.next(), Duration::from_secs(1));
    }

    #[test]
    fn decode_skips_garbage_and_stats() {
        assert_eq!(decode("not json"), None);
        assert_eq!(decode(r#"{"op":"stats","players":0,"playingPlayers":0}"#), None);
        assert_eq!(
            decode(r#"{"op":"ready","resumed":true,"sessionId":"xyz"}"#),
            Some(NodeEvent::Ready {
                session_id: "xyz".to_string(),
                resumed: true
            })
        );
    }
}
