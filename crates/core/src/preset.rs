//! Model presets (the "model selector" of a submission).
//!
//! Each preset maps to one set of quantized weights plus sampler settings.
//! Switching presets means reloading the model, which takes minutes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Closed set of supported presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Preset {
    #[default]
    #[serde(rename = "4-step")]
    FourStep,
    #[serde(rename = "8-step")]
    EightStep,
    #[serde(rename = "40-step")]
    FortyStep,
}

/// Static description of a preset.
#[derive(Debug, Clone, Serialize)]
pub struct PresetInfo {
    pub name: &'static str,
    /// Weights file suffix; empty for the base model.
    pub suffix: &'static str,
    pub steps: u32,
    pub cfg_scale: f32,
    pub estimated_time: &'static str,
    pub description: &'static str,
}

pub const ALL_PRESETS: [Preset; 3] = [Preset::FourStep, Preset::EightStep, Preset::FortyStep];

impl Preset {
    /// Wire name, e.g. `"4-step"`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FourStep => "4-step",
            Self::EightStep => "8-step",
            Self::FortyStep => "40-step",
        }
    }

    /// Prefix for generated output filenames.
    pub fn file_prefix(self) -> &'static str {
        match self {
            Self::FourStep => "qwen04",
            Self::EightStep => "qwen08",
            Self::FortyStep => "qwen40",
        }
    }

    pub fn info(self) -> PresetInfo {
        match self {
            Self::FourStep => PresetInfo {
                name: "Lightning 4-step (Ultra Fast)",
                suffix: "lightningv2.0-4steps",
                steps: 4,
                cfg_scale: 1.0,
                estimated_time: "~20 seconds",
                description: "Ultra-fast generation with good quality",
            },
            Self::EightStep => PresetInfo {
                name: "Lightning 8-step (Fast)",
                suffix: "lightningv2.0-8steps",
                steps: 8,
                cfg_scale: 1.0,
                estimated_time: "~40 seconds",
                description: "Fast generation with better quality",
            },
            Self::FortyStep => PresetInfo {
                name: "Standard 40-step (Best Quality)",
                suffix: "",
                steps: 40,
                cfg_scale: 4.0,
                estimated_time: "~3 minutes",
                description: "Best quality, slower generation",
            },
        }
    }

    /// Quantized weights filename for this preset.
    pub fn weights_file(self) -> String {
        let suffix = self.info().suffix;
        if suffix.is_empty() {
            "svdq-int4_r128-qwen-image-edit-2509.safetensors".to_string()
        } else {
            format!("svdq-int4_r128-qwen-image-edit-2509-{suffix}.safetensors")
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Preset {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_PRESETS
            .into_iter()
            .find(|p| p.as_str() == s.trim())
            .ok_or_else(|| {
                let valid: Vec<_> = ALL_PRESETS.iter().map(|p| p.as_str()).collect();
                CoreError::Validation(format!(
                    "Invalid model: {s}. Must be one of: {}",
                    valid.join(", ")
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_names() {
        assert_eq!("4-step".parse::<Preset>().unwrap(), Preset::FourStep);
        assert_eq!("8-step".parse::<Preset>().unwrap(), Preset::EightStep);
        assert_eq!(" 40-step ".parse::<Preset>().unwrap(), Preset::FortyStep);
    }

    #[test]
    fn unknown_name_lists_valid_choices() {
        let err = "12-step".parse::<Preset>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation failed: Invalid model: 12-step. Must be one of: 4-step, 8-step, 40-step"
        );
    }

    #[test]
    fn default_is_four_step() {
        assert_eq!(Preset::default(), Preset::FourStep);
    }

    #[test]
    fn weights_file_for_base_model_has_no_suffix() {
        assert_eq!(
            Preset::FortyStep.weights_file(),
            "svdq-int4_r128-qwen-image-edit-2509.safetensors"
        );
        assert_eq!(
            Preset::EightStep.weights_file(),
            "svdq-int4_r128-qwen-image-edit-2509-lightningv2.0-8steps.safetensors"
        );
    }

    #[test]
    fn serde_uses_wire_names() {
        assert_eq!(serde_json::to_string(&Preset::FortyStep).unwrap(), "\"40-step\"");
    }
}
