use anyhow::Result;
use serenity::{
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage,
        EditInteractionResponse,
    },
    model::{
        application::{CommandDataOptionValue, CommandInteraction},
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::{args, DjBot};
use crate::audio::session::{CommandOutcome, SessionCommand, SessionHandle, SessionSnapshot};
use crate::audio::track::{SearchResult, Track};
use crate::audio::SessionManager;
use crate::ui::{embeds, replies};

/// Comandos que despacha `handle_command`
pub const COMMANDS: &[&str] = &[
    "play",
    "join",
    "pause",
    "resume",
    "skip",
    "seek",
    "replay",
    "volume",
    "nowplaying",
    "queue",
    "remove",
    "clear",
    "shuffle",
    "loop",
    "loop_queue",
    "stop",
    "disconnect",
    "filter",
];

/// Motivos para rechazar un comando antes de llegar a la sesión
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Rejection {
    NotInVoice,
    WrongTextChannel(ChannelId),
    NotInSessionChannel,
    NoSession,
    MissingManageGuild,
}

impl Rejection {
    fn text(&self) -> String {
        match self {
            Rejection::NotInVoice => "❌ Debes estar en un canal de voz".to_string(),
            Rejection::WrongTextChannel(channel) => {
                format!("❌ Usa los comandos de música en <#{}>", channel)
            }
            Rejection::NotInSessionChannel => {
                "❌ Debes estar en mi canal de voz para usar este comando".to_string()
            }
            Rejection::NoSession => "❌ No estoy conectado a un canal de voz".to_string(),
            Rejection::MissingManageGuild => {
                "❌ Necesitas el permiso **Gestionar servidor** para usar este comando".to_string()
            }
        }
    }
}

/// Verifica el canal de voz del usuario y, si hay sesión, el canal de texto
/// y de voz de la sesión. Devuelve el canal de voz del usuario.
pub(crate) fn check_access(
    user_voice: Option<ChannelId>,
    session: Option<&SessionSnapshot>,
    invoked_in: ChannelId,
    privileged: bool,
) -> Result<ChannelId, Rejection> {
    let user_voice = user_voice.ok_or(Rejection::NotInVoice)?;

    if let Some(session) = session {
        if invoked_in != session.text_channel {
            return Err(Rejection::WrongTextChannel(session.text_channel));
        }
        if !privileged && session.voice_channel != Some(user_voice) {
            return Err(Rejection::NotInSessionChannel);
        }
    }

    Ok(user_voice)
}

/// Canal de destino de /join: el indicado en el comando o el del usuario
pub(crate) fn join_target(
    can_manage_guild: bool,
    requested: Option<ChannelId>,
    user_voice: Option<ChannelId>,
) -> Result<ChannelId, Rejection> {
    if !can_manage_guild {
        return Err(Rejection::MissingManageGuild);
    }
    requested.or(user_voice).ok_or(Rejection::NotInVoice)
}

/// Separa las pistas que superan la duración máxima. Los streams no tienen límite.
pub(crate) fn within_length(tracks: Vec<Track>, max: Duration) -> (Vec<Track>, usize) {
    let total = tracks.len();
    let kept: Vec<Track> = tracks
        .into_iter()
        .filter(|track| track.info.is_stream || track.duration() <= max)
        .collect();
    let rejected = total - kept.len();
    (kept, rejected)
}

/// Aviso de las pistas de una playlist que no se agregaron por su duración
pub(crate) fn omitted_text(omitted: usize, max: Duration) -> String {
    let limit = humantime::format_duration(max);
    match omitted {
        1 => format!(
            "1 canción dura más de {} y no se agregó; el resto de la playlist sí",
            limit
        ),
        n => format!(
            "{} canciones duran más de {} y no se agregaron; el resto de la playlist sí",
            n, limit
        ),
    }
}

async fn session_manager(ctx: &Context) -> Result<Arc<SessionManager>> {
    let data = ctx.data.read().await;
    data.get::<SessionManager>()
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("SessionManager no inicializado"))
}

/// Maneja comandos slash
pub async fn handle_command(ctx: &Context, command: CommandInteraction, bot: &DjBot) -> Result<()> {
    let Some(guild_id) = command.guild_id else {
        return reply_ephemeral(ctx, &command, "❌ Este comando solo funciona en servidores").await;
    };
    let user_id = command.user.id;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    if bot.storage.is_blacklisted_guild(guild_id).await
        || bot.storage.is_blacklisted_user(user_id).await
    {
        return reply_ephemeral(ctx, &command, "🚫 No tienes permitido usar este bot").await;
    }

    if let Err(remaining) = check_cooldown(bot, user_id).await {
        let text = format!(
            "⏳ Espera {} antes de usar otro comando",
            humantime::format_duration(Duration::from_secs(remaining.as_secs().max(1)))
        );
        return reply_ephemeral(ctx, &command, &text).await;
    }

    let manager = session_manager(ctx).await?;
    let session = manager.get(guild_id);
    if command.data.name == "join" {
        return handle_join(ctx, &command, &manager, guild_id, session).await;
    }

    let snapshot = match &session {
        Some(handle) => handle.snapshot().await.ok(),
        None => None,
    };
    let privileged = snapshot
        .as_ref()
        .is_some_and(|snapshot| manager.is_privileged(guild_id, snapshot.dj, user_id));

    let user_voice = match check_access(
        manager.voice_channel_of(guild_id, user_id),
        snapshot.as_ref(),
        command.channel_id,
        privileged,
    ) {
        Ok(channel) => channel,
        Err(rejection) => return reply_ephemeral(ctx, &command, &rejection.text()).await,
    };

    match command.data.name.as_str() {
        "play" => handle_play(ctx, &command, bot, &manager, guild_id, user_voice).await,
        name => {
            let (Some(session), Some(snapshot)) = (session, snapshot) else {
                return reply_ephemeral(ctx, &command, &Rejection::NoSession.text()).await;
            };
            match name {
                "nowplaying" => {
                    reply_embed(ctx, &command, embeds::create_status_embed(&snapshot)).await
                }
                "queue" => {
                    let page = option_i64(&command, "page").unwrap_or(1).max(1) as usize;
                    reply_embed(ctx, &command, embeds::create_queue_embed(&snapshot, page)).await
                }
                _ => handle_session_command(ctx, &command, &session).await,
            }
        }
    }
}

async fn check_cooldown(bot: &DjBot, user: UserId) -> Result<(), Duration> {
    if bot.config.owner_id == Some(user.get()) {
        return Ok(());
    }

    let cooldown = if bot.storage.is_premium_user(user).await {
        bot.config.premium_cooldown
    } else {
        bot.config.cooldown
    };
    bot.cooldowns.check(user, cooldown)
}

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &DjBot,
    manager: &SessionManager,
    guild_id: GuildId,
    voice_channel: ChannelId,
) -> Result<()> {
    let query = option_str(command, "query")
        .ok_or_else(|| anyhow::anyhow!("Query no proporcionada"))?
        .to_string();

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let session = match manager
        .connect(guild_id, voice_channel, command.channel_id, command.user.id)
        .await
    {
        Ok(session) => session,
        Err(e) => return edit_error(ctx, command, &replies::error_text(&e)).await,
    };

    let result = match manager.search(&query).await {
        Ok(result) => result,
        Err(e) => {
            warn!("⚠️ Búsqueda fallida para '{}': {}", query, e);
            return edit_error(ctx, command, &replies::error_text(&e.into())).await;
        }
    };

    let playlist = match &result {
        SearchResult::Playlist { name, .. } => Some(name.clone()),
        _ => None,
    };
    let (tracks, too_long) = within_length(
        result.into_tracks(command.user.id),
        bot.config.max_track_length,
    );

    if tracks.is_empty() {
        let text = if too_long > 0 {
            format!(
                "❌ Las canciones no pueden durar más de {}",
                humantime::format_duration(bot.config.max_track_length)
            )
        } else {
            format!("❌ No se encontraron resultados para: **{}**", query)
        };
        return edit_error(ctx, command, &text).await;
    }

    let first = tracks[0].clone();
    let added = tracks.clone();
    let outcome = match session
        .command(command.user.id, SessionCommand::Enqueue(tracks))
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => return edit_error(ctx, command, &replies::error_text(&e)).await,
    };

    let embed = match (playlist, outcome) {
        (Some(name), _) => embeds::create_playlist_added_embed(&name, &added),
        (None, CommandOutcome::Enqueued { started: true, .. }) => {
            embeds::create_now_playing_embed(&first, first.requester)
        }
        (None, CommandOutcome::Enqueued { position, .. }) => {
            embeds::create_track_added_embed(&first, position)
        }
        (None, other) => embeds::create_info_embed("Cola", &replies::outcome_text(&other)),
    };
    let embed = if too_long > 0 {
        embed.field(
            "⚠️ Omitidas",
            omitted_text(too_long, bot.config.max_track_length),
            false,
        )
    } else {
        embed
    };

    command
        .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
        .await?;

    Ok(())
}

/// Conecta la sesión al canal pedido o, si ya existe, la mueve allí
async fn handle_join(
    ctx: &Context,
    command: &CommandInteraction,
    manager: &SessionManager,
    guild_id: GuildId,
    session: Option<SessionHandle>,
) -> Result<()> {
    let user_id = command.user.id;
    let target = match join_target(
        manager.has_manage_guild(guild_id, user_id),
        option_channel(command, "channel"),
        manager.voice_channel_of(guild_id, user_id),
    ) {
        Ok(channel) => channel,
        Err(rejection) => return reply_ephemeral(ctx, command, &rejection.text()).await,
    };

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let result = match session {
        Some(session) => session
            .command(user_id, SessionCommand::Move(target))
            .await
            .map(|_| "Movido"),
        None => manager
            .connect(guild_id, target, command.channel_id, user_id)
            .await
            .map(|_| "Conectado"),
    };

    match result {
        Ok(title) => {
            let embed =
                embeds::create_success_embed(title, &format!("{} a <#{}>", title, target));
            command
                .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
                .await?;
            Ok(())
        }
        Err(e) => edit_error(ctx, command, &replies::error_text(&e)).await,
    }
}

async fn handle_session_command(
    ctx: &Context,
    command: &CommandInteraction,
    session: &SessionHandle,
) -> Result<()> {
    let request = match session_command(command) {
        Ok(request) => request,
        Err(text) => return reply_ephemeral(ctx, command, &text).await,
    };

    match session.command(command.user.id, request).await {
        Ok(CommandOutcome::FiltersApplied(filters)) => {
            reply_embed(ctx, command, embeds::create_filters_embed(&filters)).await
        }
        Ok(outcome) => reply(ctx, command, &replies::outcome_text(&outcome)).await,
        Err(e) => reply_ephemeral(ctx, command, &replies::error_text(&e)).await,
    }
}

/// Traduce el comando y sus opciones a una operación de sesión
fn session_command(command: &CommandInteraction) -> Result<SessionCommand, String> {
    let request = match command.data.name.as_str() {
        "pause" => SessionCommand::Pause,
        "resume" => SessionCommand::Resume,
        "skip" => SessionCommand::Skip,
        "shuffle" => SessionCommand::Shuffle,
        "stop" => SessionCommand::Stop,
        "disconnect" => SessionCommand::Disconnect,
        "replay" => SessionCommand::Replay,
        "clear" => SessionCommand::ClearQueue,
        "loop" => SessionCommand::ToggleLoop,
        "loop_queue" => SessionCommand::ToggleLoopQueue,
        "seek" => {
            let position_ms = option_str(command, "position")
                .and_then(args::parse_position)
                .ok_or("❌ Posición inválida. Usa segundos o `m:ss`")?;
            SessionCommand::Seek { position_ms }
        }
        "volume" => SessionCommand::SetVolume(
            option_i64(command, "level").ok_or("❌ Indica un nivel de volumen")?,
        ),
        "remove" => {
            let position = option_i64(command, "position").ok_or("❌ Indica una posición")?;
            SessionCommand::Remove {
                position: usize::try_from(position).unwrap_or(0),
            }
        }
        "filter" => {
            let option = command
                .data
                .options
                .first()
                .ok_or("❌ Indica un filtro")?;
            let kind = match &option.value {
                CommandDataOptionValue::SubCommand(options) => options
                    .iter()
                    .find(|o| o.name == "type")
                    .and_then(|o| o.value.as_str()),
                _ => None,
            };
            let change = args::filter_change(&option.name, kind).ok_or("❌ Filtro desconocido")?;
            SessionCommand::ApplyFilter(change)
        }
        other => return Err(format!("❌ Comando no reconocido: {}", other)),
    };

    Ok(request)
}

fn option_str<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|o| o.name == name)
        .and_then(|o| o.value.as_str())
}

fn option_channel(command: &CommandInteraction, name: &str) -> Option<ChannelId> {
    command
        .data
        .options
        .iter()
        .find(|o| o.name == name)
        .and_then(|o| o.value.as_channel_id())
}

fn option_i64(command: &CommandInteraction, name: &str) -> Option<i64> {
    command
        .data
        .options
        .iter()
        .find(|o| o.name == name)
        .and_then(|o| o.value.as_i64())
}

async fn reply(ctx: &Context, command: &CommandInteraction, content: &str) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().content(content),
            ),
        )
        .await?;
    Ok(())
}

async fn reply_ephemeral(ctx: &Context, command: &CommandInteraction, content: &str) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

async fn reply_embed(ctx: &Context, command: &CommandInteraction, embed: CreateEmbed) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(CreateInteractionResponseMessage::new().embed(embed)),
        )
        .await?;
    Ok(())
}

async fn edit_error(ctx: &Context, command: &CommandInteraction, text: &str) -> Result<()> {
    command
        .edit_response(
            &ctx.http,
            EditInteractionResponse::new().embed(embeds::create_error_embed("Error", text)),
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::filters::Filters;
    use crate::audio::session::ConnectionState;
    use crate::audio::track::sample_track;
    use pretty_assertions::assert_eq;

    const TEXT: ChannelId = ChannelId::new(3);
    const VOICE: ChannelId = ChannelId::new(2);
    const OTHER_VOICE: ChannelId = ChannelId::new(7);

    fn snapshot() -> SessionSnapshot {
        SessionSnapshot {
            guild: GuildId::new(1),
            state: ConnectionState::Connected,
            voice_channel: Some(VOICE),
            text_channel: TEXT,
            dj: UserId::new(10),
            current: None,
            position_ms: 0,
            paused: false,
            volume: 100,
            loop_track: false,
            loop_queue: false,
            waiting: false,
            queue: Vec::new(),
            filters: Filters::default(),
        }
    }

    #[test]
    fn caller_must_be_in_voice() {
        assert_eq!(
            check_access(None, None, TEXT, false),
            Err(Rejection::NotInVoice)
        );
        assert_eq!(check_access(Some(OTHER_VOICE), None, TEXT, false), Ok(OTHER_VOICE));
    }

    #[test]
    fn session_commands_come_from_its_text_channel() {
        let snapshot = snapshot();
        assert_eq!(
            check_access(Some(VOICE), Some(&snapshot), ChannelId::new(99), true),
            Err(Rejection::WrongTextChannel(TEXT))
        );
    }

    #[test]
    fn only_privileged_callers_may_be_elsewhere() {
        let snapshot = snapshot();
        assert_eq!(
            check_access(Some(OTHER_VOICE), Some(&snapshot), TEXT, false),
            Err(Rejection::NotInSessionChannel)
        );
        assert_eq!(
            check_access(Some(OTHER_VOICE), Some(&snapshot), TEXT, true),
            Ok(OTHER_VOICE)
        );
        assert_eq!(check_access(Some(VOICE), Some(&snapshot), TEXT, false), Ok(VOICE));
    }

    #[test]
    fn overlong_tracks_are_dropped() {
        let day = Duration::from_secs(24 * 60 * 60);
        let mut stream = sample_track("radio", 0, 1);
        stream.info.is_stream = true;
        let tracks = vec![
            sample_track("short", 1_000, 1),
            sample_track("long", day.as_millis() as u64 + 1, 1),
            sample_track("exact", day.as_millis() as u64, 1),
            stream,
        ];

        let (kept, rejected) = within_length(tracks, day);
        let titles: Vec<&str> = kept.iter().map(Track::title).collect();
        assert_eq!(titles, vec!["short", "exact", "radio"]);
        assert_eq!(rejected, 1);
    }

    #[test]
    fn playlist_omissions_are_spelled_out() {
        let day = Duration::from_secs(24 * 60 * 60);
        assert_eq!(
            omitted_text(2, day),
            "2 canciones duran más de 1day y no se agregaron; el resto de la playlist sí"
        );
        assert_eq!(
            omitted_text(1, day),
            "1 canción dura más de 1day y no se agregó; el resto de la playlist sí"
        );
    }

    #[test]
    fn join_needs_manage_guild() {
        assert_eq!(
            join_target(false, Some(OTHER_VOICE), Some(VOICE)),
            Err(Rejection::MissingManageGuild)
        );
    }

    #[test]
    fn join_prefers_the_requested_channel() {
        assert_eq!(join_target(true, Some(OTHER_VOICE), Some(VOICE)), Ok(OTHER_VOICE));
        assert_eq!(join_target(true, None, Some(VOICE)), Ok(VOICE));
        assert_eq!(join_target(true, None, None), Err(Rejection::NotInVoice));
    }
}
