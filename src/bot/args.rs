//! Conversión de argumentos de comandos a operaciones de sesión

use regex::Regex;

use crate::audio::filters::{
    ChannelMixPreset, DistortionFilter, EqualizerPreset, FilterChange, KaraokeFilter,
    LowPassFilter, OscillatorFilter, RotationFilter, TimescaleFilter,
};

/// Convierte la posición de `/seek` a milisegundos.
///
/// Acepta segundos (`90`, `-5`) o marcas `m:ss` / `h:mm:ss`. Los valores
/// negativos pasan tal cual; la sesión los rechaza.
pub fn parse_position(text: &str) -> Option<i64> {
    let text = text.trim();

    if let Ok(seconds) = text.parse::<i64>() {
        return seconds.checked_mul(1000);
    }

    let timestamp = Regex::new(r"^(?:(\d+):)?(\d+):([0-5]\d)$").ok()?;
    let captures = timestamp.captures(text)?;
    let hours: i64 = match captures.get(1) {
        Some(hours) => hours.as_str().parse().ok()?,
        None => 0,
    };
    let minutes: i64 = captures[2].parse().ok()?;
    let seconds: i64 = captures[3].parse().ok()?;

    if hours > 0 && minutes > 59 {
        return None;
    }

    hours
        .checked_mul(3600)?
        .checked_add(minutes.checked_mul(60)?)?
        .checked_add(seconds)?
        .checked_mul(1000)
}

/// Cambio de filtro para un subcomando de `/filter` y su opción `type`
pub fn filter_change(subcommand: &str, kind: Option<&str>) -> Option<FilterChange> {
    match subcommand {
        "equalizer" => match kind? {
            "reset" => Some(FilterChange::Equalizer(None)),
            name => EqualizerPreset::get(name).map(|preset| FilterChange::Equalizer(Some(preset))),
        },
        "channel_mix" => match kind? {
            "reset" => Some(FilterChange::ChannelMix(None)),
            name => ChannelMixPreset::get(name).map(|preset| FilterChange::ChannelMix(Some(preset))),
        },
        "effect" => effect_change(kind?),
        "reset" => Some(FilterChange::ResetAll),
        _ => None,
    }
}

fn effect_change(name: &str) -> Option<FilterChange> {
    let change = match name {
        "karaoke" => FilterChange::Karaoke(KaraokeFilter::default()),
        "timescale" => FilterChange::Timescale(TimescaleFilter::default()),
        "tremolo" => FilterChange::Tremolo(OscillatorFilter::default()),
        "vibrato" => FilterChange::Vibrato(OscillatorFilter::default()),
        "rotation" => FilterChange::Rotation(RotationFilter::default()),
        "distortion" => FilterChange::Distortion(DistortionFilter::default()),
        "low_pass" => FilterChange::LowPass(LowPassFilter::default()),
        "reset_all" => FilterChange::ResetAll,
        _ => return None,
    };
    Some(change)
}
