//! # Bot Module
//!
//! Discord glue for DJ Booth.
//!
//! This module contains:
//! - Slash command registration and dispatch
//! - Forwarding of voice state updates to the guild's session
//! - Guild bookkeeping (registration, blacklists)
//! - Adapters from the serenity cache and HTTP client to the session traits
//!
//! ## Architecture
//!
//! [`DjBot`] implements Serenity's [`EventHandler`]. It holds no playback
//! state: every guild's queue, DJ and votes live inside its session task,
//! reached through the [`SessionManager`] stored in the client's `TypeMap`.

use serenity::{
    all::{Context, EventHandler, Guild, GuildId, Interaction, Ready, VoiceState},
    async_trait,
    gateway::ActivityData,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub mod args;
pub mod commands;
pub mod cooldown;
pub mod discord;
pub mod handlers;

use crate::audio::policy::VoiceMove;
use crate::audio::SessionManager;
use crate::config::Config;
use crate::storage::Persistence;
use cooldown::CooldownTracker;

const COOLDOWN_PRUNE_INTERVAL: Duration = Duration::from_secs(600);

/// Main Discord event handler.
///
/// ## Fields
///
/// - `config`: Bot configuration (tokens, cooldowns, limits)
/// - `storage`: Guild registry, premium users and blacklists
/// - `cooldowns`: Last command time per user
pub struct DjBot {
    config: Arc<Config>,
    storage: Arc<dyn Persistence>,
    cooldowns: Arc<CooldownTracker>,
    maintenance_started: AtomicBool,
}

impl DjBot {
    pub fn new(config: Arc<Config>, storage: Arc<dyn Persistence>) -> Self {
        Self {
            config,
            storage,
            cooldowns: Arc::new(CooldownTracker::new()),
            maintenance_started: AtomicBool::new(false),
        }
    }

    /// Registers slash commands with Discord.
    ///
    /// Commands go to the development guild when `guild_id` is configured
    /// (instant propagation), otherwise they are registered globally.
    async fn register_commands(&self, ctx: &Context) -> anyhow::Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                info!("🏠 Registrando comandos para guild específica: {}", guild_id);
                commands::register_guild_commands(ctx, guild_id).await?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                info!("🌐 Registrando comandos globalmente");
                commands::register_global_commands(ctx).await?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for DjBot {
    /// Called when the bot is connected and authenticated.
    ///
    /// Registers the slash commands, sets the presence and, on the first
    /// ready only, starts the cooldown cleanup task.
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("❌ Error al registrar comandos: {:?}", e);
        }

        ctx.set_activity(Some(ActivityData::listening("/play")));

        if !self.maintenance_started.swap(true, Ordering::SeqCst) {
            let cooldowns = Arc::clone(&self.cooldowns);
            let max_age = self.config.cooldown.max(self.config.premium_cooldown);
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(COOLDOWN_PRUNE_INTERVAL);
                loop {
                    interval.tick().await;
                    cooldowns.prune(max_age);
                    debug!("🧹 Cooldowns activos: {}", cooldowns.len());
                }
            });
        }
    }

    /// Registers every guild the bot sees and leaves blacklisted ones.
    async fn guild_create(&self, ctx: Context, guild: Guild, _is_new: Option<bool>) {
        if self.storage.is_blacklisted_guild(guild.id).await {
            warn!("🚫 Guild {} en lista negra, saliendo", guild.id);
            if let Err(e) = guild.id.leave(&ctx.http).await {
                error!("❌ No se pudo salir de la guild {}: {}", guild.id, e);
            }
            return;
        }

        if let Err(e) = self.storage.add_guild(guild.id).await {
            error!("❌ No se pudo registrar la guild {}: {:?}", guild.id, e);
        }
    }

    /// Handles slash commands. Errors are logged; the user may see
    /// "This interaction failed".
    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            let name = command.data.name.clone();
            if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                error!("❌ Error manejando /{}: {:?}", name, e);
            }
        }
    }

    /// Forwards voice channel changes to the guild's session, which decides
    /// on DJ handover, teardown when the channel empties and bot moves.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let Some(guild_id) = new.guild_id else {
            return;
        };

        let bot = new
            .member
            .as_ref()
            .map(|member| member.user.bot)
            .unwrap_or_else(|| new.user_id == ctx.cache.current_user().id);
        let change = VoiceMove {
            user: new.user_id,
            bot,
            from: old.and_then(|state| state.channel_id),
            to: new.channel_id,
        };

        let manager = {
            let data = ctx.data.read().await;
            data.get::<SessionManager>().cloned()
        };
        let Some(manager) = manager else {
            warn!("⚠️ SessionManager no inicializado");
            return;
        };

        if change.from != change.to && manager.voice_update(guild_id, change) {
            debug!("🔊 Cambio de voz de {} enviado a la sesión de {}", change.user, guild_id);
        }
    }
}
