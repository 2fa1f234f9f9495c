use std::fmt;
use std::str::FromStr;

use lavalink_rs::model::player::Filters;
use serde_json::{Value, json};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterPreset {
    #[default]
    Off,
    BassBoost,
    Nightcore,
    Vaporwave,
    EightD,
}

impl FilterPreset {
    pub const ALL: [FilterPreset; 5] = [
        FilterPreset::Off,
        FilterPreset::BassBoost,
        FilterPreset::Nightcore,
        FilterPreset::Vaporwave,
        FilterPreset::EightD,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FilterPreset::Off => "off",
            FilterPreset::BassBoost => "bassboost",
            FilterPreset::Nightcore => "nightcore",
            FilterPreset::Vaporwave => "vaporwave",
            FilterPreset::EightD => "8d",
        }
    }

    /// The filter object in Lavalink's wire format.
    pub fn payload(self) -> Value {
        match self {
            FilterPreset::Off => json!({}),
            FilterPreset::BassBoost => json!({
                "equalizer": [
                    { "band": 0, "gain": 0.25 },
                    { "band": 1, "gain": 0.2 },
                    { "band": 2, "gain": 0.15 },
                    { "band": 3, "gain": 0.1 },
                ]
            }),
            FilterPreset::Nightcore => json!({
                "timescale": { "speed": 1.2, "pitch": 1.2, "rate": 1.0 }
            }),
            FilterPreset::Vaporwave => json!({
                "timescale": { "speed": 0.85, "pitch": 0.8, "rate": 1.0 }
            }),
            FilterPreset::EightD => json!({
                "rotation": { "rotationHz": 0.2 }
            }),
        }
    }

    pub fn filters(self) -> anyhow::Result<Filters> {
        Ok(serde_json::from_value(self.payload())?)
    }
}

impl fmt::Display for FilterPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FilterPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace([' ', '-', '_'], "");
        FilterPreset::ALL
            .into_iter()
            .find(|preset| preset.name() == wanted)
            .ok_or_else(|| {
                let names: Vec<&str> = FilterPreset::ALL.iter().map(|p| p.name()).collect();
                format!("unknown filter `{s}`, try one of: {}", names.join(", "))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_presets() {
        assert_eq!("Bass-Boost".parse::<FilterPreset>(), Ok(FilterPreset::BassBoost));
        assert_eq!("8D".parse::<FilterPreset>(), Ok(FilterPreset::EightD));
        assert!("chipmunk".parse::<FilterPreset>().is_err());
    }

    #[test]
    fn test_every_preset_builds() {
        for preset in FilterPreset::ALL {
            assert!(preset.filters().is_ok(), "{preset} failed to build");
        }
        assert_eq!(FilterPreset::Nightcore.payload()["timescale"]["pitch"], json!(1.2));
    }
}
