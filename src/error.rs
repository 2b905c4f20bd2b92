use thiserror::Error;

use crate::audio::events::Severity;

/// Errores que una sesión devuelve a quien invocó el comando.
///
/// Los fallos de pista en tiempo de ejecución (excepciones, pistas atascadas)
/// nunca llegan aquí: la sesión los recupera y los reporta aparte.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Valor numérico fuera del rango permitido
    #[error("el valor {value} está fuera de rango ({min}-{max})")]
    OutOfRange { value: i64, min: i64, max: i64 },

    /// Posición de seek fuera de `[0, duración)`
    #[error("la posición {position_ms}ms no es válida para una pista de {duration_ms}ms")]
    InvalidPosition { position_ms: i64, duration_ms: u64 },

    /// La cola no tiene suficientes canciones para la operación
    #[error("se necesitan al menos {min} canciones en la cola (hay {len})")]
    QueueTooShort { len: usize, min: usize },

    #[error("la cola está vacía")]
    EmptyQueue,

    #[error("no hay nada reproduciéndose")]
    NothingPlaying,

    #[error("la reproducción ya está pausada")]
    AlreadyPaused,

    #[error("la reproducción no está pausada")]
    NotPaused,

    /// Operación reservada al DJ o a moderadores
    #[error("solo el DJ o un administrador puede hacer esto")]
    NotPrivileged,

    /// Faltan permisos de conectar o hablar en el canal de voz
    #[error("no tengo permisos para conectar o hablar en ese canal")]
    PermissionDenied,

    #[error("el canal de voz está lleno")]
    ChannelFull,

    #[error("ya estoy en ese canal de voz")]
    AlreadyInChannel,

    #[error("se agotó el tiempo de conexión al canal de voz")]
    ConnectTimeout,

    #[error(transparent)]
    Backend(#[from] BackendError),

    /// La sesión terminó antes de responder
    #[error("la sesión ya no está activa")]
    Closed,
}

/// Errores del nodo de audio remoto
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("error HTTP: {0}")]
    Http(#[from] reqwest::Error),

    #[error("el nodo respondió {status}: {message}")]
    Rest { status: u16, message: String },

    /// Aún no se recibió el `ready` del websocket
    #[error("el nodo de audio no está listo")]
    NotReady,

    #[error("error de voz: {0}")]
    Voice(String),

    #[error("no se pudo cargar la pista: {message}")]
    LoadFailed { message: String, severity: Severity },

    #[error("respuesta inválida del nodo: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type SessionResult<T> = Result<T, SessionError>;
