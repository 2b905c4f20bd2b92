use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, channel::ChannelType, id::GuildId},
    prelude::Context,
};

/// Registra comandos globales
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registra comandos para una guild específica (desarrollo)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;

    Ok(())
}

fn all_commands() -> Vec<CreateCommand> {
    vec![
        play_command(),
        join_command(),
        pause_command(),
        resume_command(),
        skip_command(),
        seek_command(),
        replay_command(),
        volume_command(),
        nowplaying_command(),
        queue_command(),
        remove_command(),
        clear_command(),
        shuffle_command(),
        loop_command(),
        loop_queue_command(),
        stop_command(),
        disconnect_command(),
        filter_command(),
    ]
}

// Comandos de reproducción

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Reproduce una canción o playlist")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "query",
                "URL o término de búsqueda",
            )
            .required(true),
        )
}

fn join_command() -> CreateCommand {
    CreateCommand::new("join")
        .description("Conecta o mueve el bot a un canal de voz (requiere Gestionar servidor)")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Channel,
                "channel",
                "Canal de voz (por defecto, el tuyo)",
            )
            .channel_types(vec![ChannelType::Voice]),
        )
}

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause").description("Pausa la reproducción (o vota para pausar)")
}

fn resume_command() -> CreateCommand {
    CreateCommand::new("resume").description("Reanuda la reproducción (o vota para reanudar)")
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Salta la canción actual (o vota para saltar)")
}

fn seek_command() -> CreateCommand {
    CreateCommand::new("seek")
        .description("Mueve la canción actual a una posición")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "position",
                "Segundos o marca de tiempo (ej: 90, 1:30)",
            )
            .required(true),
        )
}

fn replay_command() -> CreateCommand {
    CreateCommand::new("replay").description("Reinicia la canción actual")
}

fn volume_command() -> CreateCommand {
    CreateCommand::new("volume")
        .description("Ajusta el volumen de reproducción")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "level",
                "Nivel de volumen (0-1000)",
            )
            .required(true),
        )
}

fn nowplaying_command() -> CreateCommand {
    CreateCommand::new("nowplaying").description("Muestra información de la canción actual")
}

// Comandos de cola

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue")
        .description("Muestra la cola de reproducción")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "page", "Número de página")
                .min_int_value(1),
        )
}

fn remove_command() -> CreateCommand {
    CreateCommand::new("remove")
        .description("Elimina una canción de la cola")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "position", "Posición en la cola")
                .min_int_value(1)
                .required(true),
        )
}

fn clear_command() -> CreateCommand {
    CreateCommand::new("clear").description("Limpia la cola de reproducción")
}

fn shuffle_command() -> CreateCommand {
    CreateCommand::new("shuffle").description("Mezcla la cola (o vota para mezclar)")
}

fn loop_command() -> CreateCommand {
    CreateCommand::new("loop").description("Activa/desactiva la repetición de la canción")
}

fn loop_queue_command() -> CreateCommand {
    CreateCommand::new("loop_queue").description("Activa/desactiva la repetición de la cola")
}

// Comandos de conexión

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Detiene la reproducción y desconecta el bot")
}

fn disconnect_command() -> CreateCommand {
    CreateCommand::new("disconnect").description("Desconecta el bot del canal de voz")
}

// Filtros

fn filter_command() -> CreateCommand {
    CreateCommand::new("filter")
        .description("Configura los filtros de audio")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::SubCommand,
                "equalizer",
                "Aplica un preset de ecualizador",
            )
            .add_sub_option(
                CreateCommandOption::new(CommandOptionType::String, "type", "Preset")
                    .add_string_choice("Boost", "boost")
                    .add_string_choice("Flat", "flat")
                    .add_string_choice("Metal", "metal")
                    .add_string_choice("Piano", "piano")
                    .add_string_choice("Reiniciar", "reset")
                    .required(true),
            ),
        )
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::SubCommand,
                "channel_mix",
                "Mezcla los canales izquierdo y derecho",
            )
            .add_sub_option(
                CreateCommandOption::new(CommandOptionType::String, "type", "Mezcla")
                    .add_string_choice("Full Left", "full_left")
                    .add_string_choice("Full Right", "full_right")
                    .add_string_choice("Mono", "mono")
                    .add_string_choice("Only Left", "only_left")
                    .add_string_choice("Only Right", "only_right")
                    .add_string_choice("Switch", "switch")
                    .add_string_choice("Reiniciar", "reset")
                    .required(true),
            ),
        )
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::SubCommand,
                "effect",
                "Activa un efecto con sus valores por defecto",
            )
            .add_sub_option(
                CreateCommandOption::new(CommandOptionType::String, "type", "Efecto")
                    .add_string_choice("Karaoke", "karaoke")
                    .add_string_choice("Timescale", "timescale")
                    .add_string_choice("Tremolo", "tremolo")
                    .add_string_choice("Vibrato", "vibrato")
                    .add_string_choice("Rotation", "rotation")
                    .add_string_choice("Distortion", "distortion")
                    .add_string_choice("Low Pass", "low_pass")
                    .add_string_choice("Reiniciar todo", "reset_all")
                    .required(true),
            ),
        )
        .add_option(CreateCommandOption::new(
            CommandOptionType::SubCommand,
            "reset",
            "Quita todos los filtros",
        ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names() -> Vec<String> {
        all_commands()
            .iter()
            .map(|command| {
                serde_json::to_value(command).unwrap()["name"]
                    .as_str()
                    .unwrap()
                    .to_string()
            })
            .collect()
    }

    #[test]
    fn every_registered_command_is_handled() {
        let mut registered = names();
        registered.sort();

        let mut handled: Vec<String> = crate::bot::handlers::COMMANDS
            .iter()
            .map(|name| name.to_string())
            .collect();
        handled.sort();

        assert_eq!(registered, handled);
    }

    #[test]
    fn join_takes_an_optional_voice_channel() {
        let join = serde_json::to_value(join_command()).unwrap();
        let option = &join["options"][0];
        assert_eq!(option["name"], "channel");
        assert_eq!(option["type"], 7);
        assert_eq!(option["channel_types"], serde_json::json!([2]));
        assert!(option.get("required").map_or(true, |required| required == false));
    }

    #[test]
    fn filter_has_four_subcommands() {
        let filter = serde_json::to_value(filter_command()).unwrap();
        let subcommands: Vec<&str> = filter["options"]
            .as_array()
            .unwrap()
            .iter()
            .map(|option| option["name"].as_str().unwrap())
            .collect();
        assert_eq!(subcommands, vec!["equalizer", "channel_mix", "effect", "reset"]);
    }
}
