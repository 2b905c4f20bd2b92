use serde::{Deserialize, Serialize};

/// Número de bandas del ecualizador de Lavalink
pub const EQ_BANDS: usize = 15;

/// Banda del ecualizador (`gain` entre -0.25 y 1.0)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EqBand {
    pub band: u8,
    pub gain: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KaraokeFilter {
    pub level: f32,
    pub mono_level: f32,
    pub filter_band: f32,
    pub filter_width: f32,
}

impl Default for KaraokeFilter {
    fn default() -> Self {
        Self {
            level: 1.0,
            mono_level: 1.0,
            filter_band: 220.0,
            filter_width: 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimescaleFilter {
    pub speed: f64,
    pub pitch: f64,
    pub rate: f64,
}

impl Default for TimescaleFilter {
    fn default() -> Self {
        Self {
            speed: 1.0,
            pitch: 1.0,
            rate: 1.0,
        }
    }
}

/// Parámetros compartidos por tremolo y vibrato
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OscillatorFilter {
    pub frequency: f32,
    pub depth: f32,
}

impl Default for OscillatorFilter {
    fn default() -> Self {
        Self {
            frequency: 2.0,
            depth: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationFilter {
    pub rotation_hz: f64,
}

impl Default for RotationFilter {
    fn default() -> Self {
        Self { rotation_hz: 0.2 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistortionFilter {
    pub sin_offset: f32,
    pub sin_scale: f32,
    pub cos_offset: f32,
    pub cos_scale: f32,
    pub tan_offset: f32,
    pub tan_scale: f32,
    pub offset: f32,
    pub scale: f32,
}

impl Default for DistortionFilter {
    fn default() -> Self {
        Self {
            sin_offset: 0.0,
            sin_scale: 1.0,
            cos_offset: 0.0,
            cos_scale: 1.0,
            tan_offset: 0.0,
            tan_scale: 1.0,
            offset: 0.0,
            scale: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelMixFilter {
    pub left_to_left: f32,
    pub left_to_right: f32,
    pub right_to_left: f32,
    pub right_to_right: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LowPassFilter {
    pub smoothing: f32,
}

impl Default for LowPassFilter {
    fn default() -> Self {
        Self { smoothing: 20.0 }
    }
}

/// Conjunto de filtros de un reproductor.
///
/// Se envía completo en cada actualización; un campo ausente desactiva ese
/// filtro en el nodo.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equalizer: Option<Vec<EqBand>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub karaoke: Option<KaraokeFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timescale: Option<TimescaleFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tremolo: Option<OscillatorFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vibrato: Option<OscillatorFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<RotationFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distortion: Option<DistortionFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_mix: Option<ChannelMixFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low_pass: Option<LowPassFilter>,
}

impl Filters {
    /// Aplica un cambio sobre una copia del conjunto actual
    pub fn with(&self, change: &FilterChange) -> Filters {
        let mut next = self.clone();
        match change {
            FilterChange::Equalizer(Some(preset)) => next.equalizer = Some(preset.bands()),
            FilterChange::Equalizer(None) => next.equalizer = None,
            FilterChange::ChannelMix(Some(preset)) => next.channel_mix = Some(preset.mix()),
            FilterChange::ChannelMix(None) => next.channel_mix = None,
            FilterChange::Karaoke(karaoke) => next.karaoke = Some(*karaoke),
            FilterChange::Timescale(timescale) => next.timescale = Some(*timescale),
            FilterChange::Tremolo(tremolo) => next.tremolo = Some(*tremolo),
            FilterChange::Vibrato(vibrato) => next.vibrato = Some(*vibrato),
            FilterChange::Rotation(rotation) => next.rotation = Some(*rotation),
            FilterChange::Distortion(distortion) => next.distortion = Some(*distortion),
            FilterChange::LowPass(low_pass) => next.low_pass = Some(*low_pass),
            FilterChange::ResetAll => next = Filters::default(),
        }
        next
    }

    /// Nombres de los filtros activos, para mostrar
    pub fn active_names(&self) -> Vec<&'static str> {
        [
            ("equalizer", self.equalizer.is_some()),
            ("karaoke", self.karaoke.is_some()),
            ("timescale", self.timescale.is_some()),
            ("tremolo", self.tremolo.is_some()),
            ("vibrato", self.vibrato.is_some()),
            ("rotation", self.rotation.is_some()),
            ("distortion", self.distortion.is_some()),
            ("channel mix", self.channel_mix.is_some()),
            ("low pass", self.low_pass.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, active)| active.then_some(name))
        .collect()
    }
}

/// Un cambio de filtro pedido por el DJ. `None` reinicia ese filtro.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterChange {
    Equalizer(Option<EqualizerPreset>),
    ChannelMix(Option<ChannelMixPreset>),
    Karaoke(KaraokeFilter),
    Timescale(TimescaleFilter),
    Tremolo(OscillatorFilter),
    Vibrato(OscillatorFilter),
    Rotation(RotationFilter),
    Distortion(DistortionFilter),
    LowPass(LowPassFilter),
    ResetAll,
}

/// Presets del ecualizador de 15 bandas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EqualizerPreset {
    Boost,
    Flat,
    Metal,
    Piano,
}

impl EqualizerPreset {
    /// Obtiene un preset por nombre
    pub fn get(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "boost" => Some(Self::Boost),
            "flat" => Some(Self::Flat),
            "metal" => Some(Self::Metal),
            "piano" => Some(Self::Piano),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Boost => "Boost",
            Self::Flat => "Flat",
            Self::Metal => "Metal",
            Self::Piano => "Piano",
        }
    }

    fn gains(&self) -> [f32; EQ_BANDS] {
        match self {
            Self::Boost => [
                -0.075, 0.125, 0.125, 0.1, 0.1, 0.05, 0.075, 0.0, 0.0, 0.0, 0.0, 0.0, 0.125, 0.15,
                0.05,
            ],
            Self::Flat => [0.0; EQ_BANDS],
            Self::Metal => [
                0.0, 0.1, 0.1, 0.15, 0.13, 0.1, 0.0, 0.125, 0.175, 0.175, 0.125, 0.125, 0.1, 0.075,
                0.0,
            ],
            // La banda 14 queda en 0
            Self::Piano => [
                -0.25, -0.25, -0.125, 0.0, 0.25, 0.25, 0.0, -0.25, -0.25, 0.0, 0.0, 0.5, 0.25,
                -0.025, 0.0,
            ],
        }
    }

    pub fn bands(&self) -> Vec<EqBand> {
        self.gains()
            .into_iter()
            .enumerate()
            .map(|(band, gain)| EqBand {
                band: band as u8,
                gain,
            })
            .collect()
    }
}

/// Presets de mezcla de canales
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMixPreset {
    FullLeft,
    FullRight,
    Mono,
    OnlyLeft,
    OnlyRight,
    Switch,
}

impl ChannelMixPreset {
    pub fn get(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "full_left" => Some(Self::FullLeft),
            "full_right" => Some(Self::FullRight),
            "mono" => Some(Self::Mono),
            "only_left" => Some(Self::OnlyLeft),
            "only_right" => Some(Self::OnlyRight),
            "switch" => Some(Self::Switch),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::FullLeft => "Full Left",
            Self::FullRight => "Full Right",
            Self::Mono => "Mono",
            Self::OnlyLeft => "Only Left",
            Self::OnlyRight => "Only Right",
            Self::Switch => "Switch",
        }
    }

    pub fn mix(&self) -> ChannelMixFilter {
        let (left_to_left, left_to_right, right_to_left, right_to_right) = match self {
            Self::FullLeft => (1.0, 0.0, 1.0, 0.0),
            Self::FullRight => (0.0, 1.0, 0.0, 1.0),
            Self::Mono => (0.5, 0.5, 0.5, 0.5),
            Self::OnlyLeft => (1.0, 0.0, 0.0, 0.0),
            Self::OnlyRight => (0.0, 0.0, 0.0, 1.0),
            Self::Switch => (0.0, 1.0, 1.0, 0.0),
        };
        ChannelMixFilter {
            left_to_left,
            left_to_right,
            right_to_left,
            right_to_right,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn presets_cover_all_bands() {
        for preset in [
            EqualizerPreset::Boost,
            EqualizerPreset::Flat,
            EqualizerPreset::Metal,
            EqualizerPreset::Piano,
        ] {
            let bands = preset.bands();
            assert_eq!(bands.len(), EQ_BANDS);
            assert_eq!(bands[14].band, 14);
        }
        assert_eq!(EqualizerPreset::Piano.bands()[11].gain, 0.5);
        assert_eq!(EqualizerPreset::Piano.bands()[14].gain, 0.0);
    }

    #[test]
    fn preset_lookup_is_case_insensitive() {
        assert_eq!(EqualizerPreset::get("METAL"), Some(EqualizerPreset::Metal));
        assert_eq!(EqualizerPreset::get("jazz"), None);
        assert_eq!(ChannelMixPreset::get("switch"), Some(ChannelMixPreset::Switch));
    }

    #[test]
    fn changes_keep_other_filters() {
        let filters = Filters::default()
            .with(&FilterChange::Equalizer(Some(EqualizerPreset::Boost)))
            .with(&FilterChange::Tremolo(OscillatorFilter::default()));

        assert_eq!(filters.active_names(), vec!["equalizer", "tremolo"]);

        let filters = filters.with(&FilterChange::Equalizer(None));
        assert_eq!(filters.active_names(), vec!["tremolo"]);

        let filters = filters.with(&FilterChange::ResetAll);
        assert_eq!(filters, Filters::default());
    }

    #[test]
    fn serializes_only_active_filters() {
        let filters = Filters::default()
            .with(&FilterChange::ChannelMix(Some(ChannelMixPreset::Mono)))
            .with(&FilterChange::Rotation(RotationFilter::default()));

        let json = serde_json::to_value(&filters).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "rotation": { "rotationHz": 0.2 },
                "channelMix": {
                    "leftToLeft": 0.5,
                    "leftToRight": 0.5,
                    "rightToLeft": 0.5,
                    "rightToRight": 0.5
                }
            })
        );
    }
}
