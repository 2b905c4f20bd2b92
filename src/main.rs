use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod audio;
mod bot;
mod config;
mod diagnostics;
mod error;
mod lavalink;
mod storage;
mod ui;

use crate::audio::session::{SessionDeps, SessionSettings};
use crate::audio::SessionManager;
use crate::bot::discord::{CacheDirectory, ChannelNotifier};
use crate::bot::DjBot;
use crate::config::Config;
use crate::diagnostics::TrackFailureLog;
use crate::lavalink::socket::{self, SocketSettings};
use crate::lavalink::LavalinkNode;
use crate::storage::JsonStorage;

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("djbooth=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando DJ Booth v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Arc::new(Config::load()?);
    info!("⚙️ {}", config.summary());

    let storage = Arc::new(JsonStorage::new(config.data_dir.clone()).await?);
    let failures = Arc::new(TrackFailureLog::new(config.track_log_dir.clone()).await?);

    // Intents: voz para el gateway y miembros para roles y permisos
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MEMBERS;

    let handler = DjBot::new(Arc::clone(&config), storage);

    let songbird = Songbird::serenity();
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(Arc::clone(&songbird))
        .await?;

    let bot_id = client.http.get_current_user().await?.id;

    // Inicializar Lavalink
    info!("🎼 Conectando con Lavalink en {}", config.lavalink_http_url());
    let node = Arc::new(LavalinkNode::new(&config, songbird)?);

    let directory = Arc::new(CacheDirectory::new(client.cache.clone(), bot_id));
    let deps = SessionDeps {
        backend: node.clone(),
        notifier: Arc::new(ChannelNotifier::new(client.http.clone())),
        reporter: failures,
        privileges: directory.clone(),
        members: directory,
    };
    let manager = Arc::new(SessionManager::new(
        deps,
        SessionSettings::from(&*config),
        bot_id,
    ));

    {
        let mut data = client.data.write().await;
        data.insert::<SessionManager>(Arc::clone(&manager));
    }

    let cancel = CancellationToken::new();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    tokio::spawn(socket::listen(
        node,
        SocketSettings::new(&config, bot_id),
        events_tx,
        cancel.clone(),
    ));
    tokio::spawn(audio::events::pump(events_rx, Arc::clone(&manager)));

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("❌ Error al registrar Ctrl+C: {}", e);
            return;
        }
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        cancel.cancel();
        manager.shutdown().await;
        shard_manager.shutdown_all().await;
    });

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}
