use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info};

use crate::audio::backend::{FailureReporter, TrackFailure};
use crate::audio::events::Severity;

/// Registro en disco de una excepción de pista
#[derive(Debug, Serialize)]
struct FailureRecord<'a> {
    guild: u64,
    title: &'a str,
    author: &'a str,
    source: &'a str,
    identifier: &'a str,
    uri: Option<&'a str>,
    requester: u64,
    severity: Severity,
    cause: &'a str,
    message: Option<&'a str>,
    timestamp: DateTime<Utc>,
}

/// Escribe un archivo JSON por cada pista que falla, para revisarlo después
pub struct TrackFailureLog {
    dir: PathBuf,
}

impl TrackFailureLog {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("📝 Fallos de pista en: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn write(&self, failure: &TrackFailure) -> Result<PathBuf> {
        let info = &failure.track.info;
        let record = FailureRecord {
            guild: failure.guild.get(),
            title: &info.title,
            author: &info.author,
            source: &info.source_name,
            identifier: &info.identifier,
            uri: info.uri.as_deref(),
            requester: failure.track.requester.get(),
            severity: failure.severity,
            cause: &failure.cause,
            message: failure.message.as_deref(),
            timestamp: Utc::now(),
        };

        let path = self.dir.join(file_name(&info.identifier));
        fs::write(&path, serde_json::to_vec_pretty(&record)?).await?;
        Ok(path)
    }
}

/// `{identificador}-{sufijo aleatorio}.log`, sin caracteres de ruta
fn file_name(identifier: &str) -> String {
    let safe: String = identifier
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect();
    format!("{safe}-{suffix}.log")
}

#[async_trait]
impl FailureReporter for TrackFailureLog {
    async fn report(&self, failure: TrackFailure) {
        match self.write(&failure).await {
            Ok(path) => info!("📝 Fallo de pista guardado en {}", path.display()),
            Err(e) => error!("❌ No se pudo guardar el fallo de '{}': {}", failure.track.title(), e),
        }
    }
}
