use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
    model::id::UserId,
};
use std::time::Duration;

use crate::audio::backend::Notice;
use crate::audio::filters::Filters;
use crate::audio::queue::QueuePage;
use crate::audio::session::SessionSnapshot;
use crate::audio::track::Track;

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 DJ Booth";

const ITEMS_PER_PAGE: usize = 10;

fn base(title: impl Into<String>) -> CreateEmbed {
    CreateEmbed::default()
        .title(title)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

fn track_link(track: &Track) -> String {
    match &track.info.uri {
        Some(uri) => format!("[{}]({})", track.title(), uri),
        None => track.title().to_string(),
    }
}

fn length_text(track: &Track) -> String {
    if track.info.is_stream {
        "🔴 En vivo".to_string()
    } else {
        format_duration(track.duration())
    }
}

/// Aviso de nueva canción en el canal de la sesión
pub fn create_now_playing_embed(track: &Track, dj: UserId) -> CreateEmbed {
    let mut embed = base("🎵 Reproduciendo Ahora")
        .description(format!("**{}**", track_link(track)))
        .color(colors::SUCCESS_GREEN)
        .field("🎤 Artista", &track.info.author, true)
        .field("⏱️ Duración", length_text(track), true)
        .field("👤 Solicitado por", format!("<@{}>", track.requester), true)
        .field("🎧 DJ", format!("<@{}>", dj), true);

    if let Some(artwork) = &track.info.artwork_url {
        embed = embed.thumbnail(artwork);
    }

    embed
}

/// Estado detallado para `/nowplaying`
pub fn create_status_embed(snapshot: &SessionSnapshot) -> CreateEmbed {
    let Some(track) = &snapshot.current else {
        return create_info_embed("Nada sonando", "No hay nada reproduciéndose actualmente");
    };

    let progress = if track.info.is_stream {
        "🔴 En vivo".to_string()
    } else {
        format!(
            "{} {} / {}",
            progress_bar(snapshot.position_ms, track.info.length, 15),
            format_duration(Duration::from_millis(snapshot.position_ms)),
            format_duration(track.duration())
        )
    };

    let mut modes = Vec::new();
    if snapshot.paused {
        modes.push("⏸️ Pausado");
    }
    if snapshot.loop_track {
        modes.push("🔂 Canción");
    }
    if snapshot.loop_queue {
        modes.push("🔁 Cola");
    }

    let mut embed = create_now_playing_embed(track, snapshot.dj)
        .field("📊 Progreso", progress, false)
        .field("🔊 Volumen", format!("{}%", snapshot.volume), true)
        .field("📋 En cola", snapshot.queue.len().to_string(), true);

    if !modes.is_empty() {
        embed = embed.field("Modo", modes.join(" • "), true);
    }

    embed
}

pub fn create_track_added_embed(track: &Track, position: usize) -> CreateEmbed {
    base("➕ Agregado a la cola")
        .description(format!("**{}**", track_link(track)))
        .color(colors::INFO_BLUE)
        .field("⏱️ Duración", length_text(track), true)
        .field("📍 Posición", position.to_string(), true)
}

pub fn create_playlist_added_embed(name: &str, tracks: &[Track]) -> CreateEmbed {
    let total: Duration = tracks.iter().map(Track::duration).sum();
    base("📃 Playlist agregada")
        .description(format!("**{}**", name))
        .color(colors::INFO_BLUE)
        .field("🎵 Canciones", tracks.len().to_string(), true)
        .field("⏱️ Duración total", format_duration(total), true)
}

/// Crea un embed para mostrar la cola de reproducción
pub fn create_queue_embed(snapshot: &SessionSnapshot, page: usize) -> CreateEmbed {
    let mut embed = base("📋 Cola de Reproducción").color(colors::INFO_BLUE);

    if snapshot.current.is_none() && snapshot.queue.is_empty() {
        return embed
            .description("😴 **La cola está vacía**\n\n💡 Usa `/play <canción>` para agregar música")
            .color(colors::NEUTRAL_GRAY);
    }

    if let Some(current) = &snapshot.current {
        let status = if snapshot.loop_track {
            "🔂"
        } else if snapshot.loop_queue {
            "🔁"
        } else {
            "▶️"
        };
        embed = embed.field(
            format!("{} Reproduciendo", status),
            format!("**{}** - {}", current.title(), current.info.author),
            false,
        );
    }

    let queue_page = QueuePage::of(&snapshot.queue, page, ITEMS_PER_PAGE);
    if !queue_page.items.is_empty() {
        let description: String = queue_page
            .items
            .iter()
            .map(|(position, track)| {
                format!(
                    "**{}**. {} `[{}]` • <@{}>\n",
                    position,
                    track.title(),
                    length_text(track),
                    track.requester
                )
            })
            .collect();
        embed = embed.field("Próximas canciones", description, false);
    }

    let total: Duration = snapshot.queue.iter().map(Track::duration).sum();
    embed = embed.field(
        "Información",
        format!(
            "**Total:** {} canciones • **Duración:** {}",
            queue_page.total_items,
            format_duration(total)
        ),
        false,
    );

    if queue_page.total_pages > 1 {
        embed = embed.footer(CreateEmbedFooter::new(format!(
            "Página {} de {} • DJ Booth",
            queue_page.current_page, queue_page.total_pages
        )));
    }

    embed
}

pub fn create_filters_embed(filters: &Filters) -> CreateEmbed {
    let active = filters.active_names();
    let description = if active.is_empty() {
        "Sin filtros activos".to_string()
    } else {
        active
            .iter()
            .map(|name| format!("• {}", name))
            .collect::<Vec<_>>()
            .join("\n")
    };

    base("🎛️ Filtros actualizados")
        .description(description)
        .color(colors::MUSIC_PURPLE)
}

/// Embed para cada aviso que publica una sesión
pub fn create_notice_embed(notice: &Notice) -> CreateEmbed {
    match notice {
        Notice::NowPlaying { track, dj } => create_now_playing_embed(track, *dj),
        Notice::QueueEnded { disconnect_after } => base("📭 Cola terminada")
            .description(format!(
                "No quedan canciones. Me desconecto en {} si nadie agrega más.",
                humantime::format_duration(*disconnect_after)
            ))
            .color(colors::NEUTRAL_GRAY),
        Notice::TrackStuck { track } => base("⚠️ Pista atascada")
            .description(format!("**{}** se atascó; reintentando.", track.title()))
            .color(colors::WARNING_ORANGE),
        Notice::TrackFailed { track } => base("❌ Error de reproducción")
            .description(format!(
                "No se pudo reproducir **{}**. El problema quedó registrado.",
                track.title()
            ))
            .color(colors::ERROR_RED),
    }
}

/// Crea un embed de error
pub fn create_error_embed(title: &str, description: &str) -> CreateEmbed {
    base(format!("❌ {}", title))
        .description(description)
        .color(colors::ERROR_RED)
}

/// Crea un embed de éxito
pub fn create_success_embed(title: &str, description: &str) -> CreateEmbed {
    base(format!("✅ {}", title))
        .description(description)
        .color(colors::SUCCESS_GREEN)
}

/// Crea un embed de información
pub fn create_info_embed(title: &str, description: &str) -> CreateEmbed {
    base(format!("ℹ️ {}", title))
        .description(description)
        .color(colors::INFO_BLUE)
}

fn progress_bar(position_ms: u64, length_ms: u64, width: usize) -> String {
    if length_ms == 0 {
        return "▬".repeat(width);
    }
    let filled = ((position_ms.min(length_ms) as u128 * width as u128) / length_ms as u128) as usize;
    let filled = filled.min(width.saturating_sub(1));
    format!(
        "{}🔘{}",
        "▬".repeat(filled),
        "▬".repeat(width.saturating_sub(filled + 1))
    )
}

pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
