use std::fmt;

use serde::{Deserialize, Serialize};

pub const DIMENSION_RANGE: ParameterRange = ParameterRange::new(512.0, 1536.0);
pub const CFG_SCALE_RANGE: ParameterRange = ParameterRange::new(1.0, 20.0);
pub const STEPS_RANGE: ParameterRange = ParameterRange::new(10.0, 150.0);

/// Inclusive numeric bounds for one generation parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterRange {
    pub min: f64,
    pub max: f64,
}

impl ParameterRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }
}

impl fmt::Display for ParameterRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterField {
    Width,
    Height,
    CfgScale,
    Steps,
}

impl ParameterField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Width => "width",
            Self::Height => "height",
            Self::CfgScale => "cfg_scale",
            Self::Steps => "steps",
        }
    }

    pub fn range(&self) -> ParameterRange {
        match self {
            Self::Width | Self::Height => DIMENSION_RANGE,
            Self::CfgScale => CFG_SCALE_RANGE,
            Self::Steps => STEPS_RANGE,
        }
    }
}

impl fmt::Display for ParameterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Explicit numeric values that take precedence over whatever a preset produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterOverrides {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub cfg_scale: Option<f64>,
    pub steps: Option<u32>,
}

impl ParameterOverrides {
    pub fn is_empty(&self) -> bool {
        self.width.is_none()
            && self.height.is_none()
            && self.cfg_scale.is_none()
            && self.steps.is_none()
    }
}

/// A generation request as delivered by the command collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub aspect_ratio: Option<String>,
    pub quality: Option<String>,
    pub style: Option<String>,
    #[serde(default)]
    pub overrides: ParameterOverrides,
    pub requester_id: String,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, requester_id: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            aspect_ratio: None,
            quality: None,
            style: None,
            overrides: ParameterOverrides::default(),
            requester_id: requester_id.into(),
        }
    }

    pub fn with_aspect_ratio(mut self, name: impl Into<String>) -> Self {
        self.aspect_ratio = Some(name.into());
        self
    }

    pub fn with_quality(mut self, name: impl Into<String>) -> Self {
        self.quality = Some(name.into());
        self
    }

    pub fn with_style(mut self, name: impl Into<String>) -> Self {
        self.style = Some(name.into());
        self
    }

    pub fn with_overrides(mut self, overrides: ParameterOverrides) -> Self {
        self.overrides = overrides;
        self
    }
}

/// Names of the presets that contributed to a resolution, kept for display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedPresets {
    pub aspect_ratio: Option<String>,
    pub quality: Option<String>,
    pub style: Option<String>,
}

/// The fully bounded parameter set sent upstream.
///
/// Only the resolver constructs this, so every value is within range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedParameters {
    pub prompt: String,
    pub width: u32,
    pub height: u32,
    pub cfg_scale: f64,
    pub steps: u32,
    pub style_token: Option<String>,
    pub requester_id: String,
    #[serde(default)]
    pub presets: AppliedPresets,
}

impl ResolvedParameters {
    pub fn dimensions(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}
