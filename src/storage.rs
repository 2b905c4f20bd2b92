use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serenity::model::id::{GuildId, UserId};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{info, warn};

const REGISTRY_FILE: &str = "registry.json";

/// Registro persistente del bot: guilds conocidas, usuarios premium y listas negras
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub guilds: BTreeSet<u64>,
    #[serde(default)]
    pub premium_users: BTreeSet<u64>,
    #[serde(default)]
    pub blacklisted_users: BTreeSet<u64>,
    #[serde(default)]
    pub blacklisted_guilds: BTreeSet<u64>,
}

/// Consultas de persistencia que usan los comandos y el handler de eventos
#[async_trait]
pub trait Persistence: Send + Sync {
    async fn guild_exists(&self, guild: GuildId) -> bool;
    async fn add_guild(&self, guild: GuildId) -> Result<()>;
    async fn is_premium_user(&self, user: UserId) -> bool;
    async fn is_blacklisted_user(&self, user: UserId) -> bool;
    async fn is_blacklisted_guild(&self, guild: GuildId) -> bool;
}

/// Manager de almacenamiento basado en un archivo JSON
pub struct JsonStorage {
    path: PathBuf,
    registry: RwLock<Registry>,
}

impl JsonStorage {
    pub async fn new(data_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&data_dir).await?;
        let path = data_dir.join(REGISTRY_FILE);

        let registry = match fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(registry) => registry,
                Err(e) => {
                    warn!("⚠️ Registro corrupto en {}, se empieza vacío: {}", path.display(), e);
                    Registry::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Registry::default(),
            Err(e) => return Err(e.into()),
        };

        info!(
            "📁 Storage inicializado en: {} ({} guilds)",
            data_dir.display(),
            registry.guilds.len()
        );

        Ok(Self {
            path,
            registry: RwLock::new(registry),
        })
    }

    /// Copia del registro actual
    pub async fn snapshot(&self) -> Registry {
        self.registry.read().await.clone()
    }

    async fn save(&self, registry: &Registry) -> Result<()> {
        let content = serde_json::to_string_pretty(registry)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl Persistence for JsonStorage {
    async fn guild_exists(&self, guild: GuildId) -> bool {
        self.registry.read().await.guilds.contains(&guild.get())
    }

    async fn add_guild(&self, guild: GuildId) -> Result<()> {
        let mut registry = self.registry.write().await;
        if registry.guilds.contains(&guild.get()) {
            return Ok(());
        }

        // Solo se confirma en memoria lo que llegó a disco
        let mut updated = registry.clone();
        updated.guilds.insert(guild.get());
        self.save(&updated).await?;
        *registry = updated;
        info!("📝 Guild {} registrada", guild);
        Ok(())
    }

    async fn is_premium_user(&self, user: UserId) -> bool {
        self.registry.read().await.premium_users.contains(&user.get())
    }

    async fn is_blacklisted_user(&self, user: UserId) -> bool {
        self.registry.read().await.blacklisted_users.contains(&user.get())
    }

    async fn is_blacklisted_guild(&self, guild: GuildId) -> bool {
        self.registry.read().await.blacklisted_guilds.contains(&guild.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[tokio::test]
    async fn added_guilds_survive_a_reload() {
        let dir = tempdir().unwrap();
        let storage = JsonStorage::new(dir.path().to_path_buf()).await.unwrap();

        assert!(!storage.guild_exists(GuildId::new(5)).await);
        storage.add_guild(GuildId::new(5)).await.unwrap();
        storage.add_guild(GuildId::new(5)).await.unwrap();

        let reloaded = JsonStorage::new(dir.path().to_path_buf()).await.unwrap();
        assert!(reloaded.guild_exists(GuildId::new(5)).await);
        assert_eq!(reloaded.snapshot().await.guilds.len(), 1);
    }

    #[tokio::test]
    async fn reads_lists_from_existing_file() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(REGISTRY_FILE),
            r#"{ "premium_users": [1], "blacklisted_users": [2], "blacklisted_guilds": [3] }"#,
        )
        .unwrap();

        let storage = JsonStorage::new(dir.path().to_path_buf()).await.unwrap();
        assert!(storage.is_premium_user(UserId::new(1)).await);
        assert!(storage.is_blacklisted_user(UserId::new(2)).await);
        assert!(storage.is_blacklisted_guild(GuildId::new(3)).await);
        assert!(!storage.is_blacklisted_user(UserId::new(1)).await);
    }

    #[tokio::test]
    async fn failed_save_leaves_guild_unregistered() {
        let dir = tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let storage = JsonStorage::new(data_dir.clone()).await.unwrap();

        std::fs::remove_dir_all(&data_dir).unwrap();
        assert!(storage.add_guild(GuildId::new(7)).await.is_err());
        assert!(!storage.guild_exists(GuildId::new(7)).await);

        // Con el directorio de vuelta se reintenta y se guarda
        std::fs::create_dir_all(&data_dir).unwrap();
        storage.add_guild(GuildId::new(7)).await.unwrap();
        assert!(storage.guild_exists(GuildId::new(7)).await);

        let reloaded = JsonStorage::new(data_dir).await.unwrap();
        assert!(reloaded.guild_exists(GuildId::new(7)).await);
    }

    #[tokio::test]
    async fn corrupt_file_starts_empty() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(REGISTRY_FILE), "{ no es json").unwrap();

        let storage = JsonStorage::new(dir.path().to_path_buf()).await.unwrap();
        assert_eq!(storage.snapshot().await, Registry::default());
    }
}
