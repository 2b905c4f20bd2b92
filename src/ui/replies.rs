//! Textos de respuesta para los resultados de los comandos

use crate::audio::session::{CommandOutcome, Execution};
use crate::audio::votes::VoteAction;
use crate::error::{BackendError, SessionError};

fn executed_text(action: VoteAction) -> &'static str {
    match action {
        VoteAction::Pause => "⏸️ Reproducción pausada",
        VoteAction::Resume => "▶️ Reproducción reanudada",
        VoteAction::Skip => "⏭️ Canción saltada",
        VoteAction::Shuffle => "🔀 Cola mezclada",
        VoteAction::Stop => "⏹️ Reproducción detenida y desconectado",
    }
}

/// Texto para un comando que no devuelve embed
pub fn outcome_text(outcome: &CommandOutcome) -> String {
    match outcome {
        CommandOutcome::Enqueued { count, position, started } => match (count, started) {
            (1, true) => "🎵 Reproduciendo ahora".to_string(),
            (1, false) => format!("➕ Agregada a la cola en la posición {}", position),
            (n, _) => format!("➕ {} canciones agregadas a la cola", n),
        },
        CommandOutcome::Executed { action, via } => match via {
            Execution::Quorum => format!("{} (votación aprobada)", executed_text(*action)),
            Execution::Privileged | Execution::Requester => executed_text(*action).to_string(),
        },
        CommandOutcome::VoteRecorded { action, votes, required } => format!(
            "🗳️ Voto para {} registrado: **{}/{}**",
            action.label(),
            votes,
            required
        ),
        CommandOutcome::Seeked { position_ms } => format!(
            "⏩ Posición movida a {}",
            super::embeds::format_duration(std::time::Duration::from_millis(*position_ms))
        ),
        CommandOutcome::VolumeSet(volume) => format!("🔊 Volumen ajustado a {}%", volume),
        CommandOutcome::Removed(track) => format!("❌ Eliminada de la cola: **{}**", track.title()),
        CommandOutcome::Cleared(count) => format!("🗑️ Cola limpiada ({} canciones)", count),
        CommandOutcome::LoopTrack(true) => "🔂 Repetición de canción activada".to_string(),
        CommandOutcome::LoopTrack(false) => "➡️ Repetición de canción desactivada".to_string(),
        CommandOutcome::LoopQueue(true) => "🔁 Repetición de cola activada".to_string(),
        CommandOutcome::LoopQueue(false) => "➡️ Repetición de cola desactivada".to_string(),
        CommandOutcome::Replayed => "⏮️ Canción reiniciada".to_string(),
        CommandOutcome::Moved(channel) => format!("🚚 Movido a <#{}>", channel),
        CommandOutcome::FiltersApplied(filters) => {
            let active = filters.active_names();
            if active.is_empty() {
                "🎛️ Filtros reiniciados".to_string()
            } else {
                format!("🎛️ Filtros activos: {}", active.join(", "))
            }
        }
    }
}

/// Mensaje para el usuario; los errores del nodo no exponen detalles internos
pub fn error_text(error: &SessionError) -> String {
    match error {
        SessionError::Backend(BackendError::LoadFailed { message, .. }) => {
            format!("❌ No se pudo cargar la pista: {}", message)
        }
        SessionError::Backend(BackendError::NotReady) => {
            "❌ El servidor de audio aún no está listo, intenta en unos segundos".to_string()
        }
        SessionError::Backend(_) => "❌ Error comunicando con el servidor de audio".to_string(),
        other => format!("❌ {}", capitalize(&other.to_string())),
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
