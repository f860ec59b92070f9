use crate::presets::PresetFamily;
use crate::request::{ParameterField, ParameterRange};

/// Caller-input problems found while resolving a request.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please provide a prompt for image generation.")]
    EmptyPrompt,

    #[error("Invalid {family} '{name}'. Choose from: {}", .allowed.join(", "))]
    UnknownPreset {
        family: PresetFamily,
        name: String,
        allowed: Vec<&'static str>,
    },

    #[error("{field} must be between {} and {} (got {value})", .range.min, .range.max)]
    OutOfRange {
        field: ParameterField,
        value: f64,
        range: ParameterRange,
    },
}

impl ValidationError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyPrompt => "empty_prompt",
            Self::UnknownPreset { .. } => "unknown_preset",
            Self::OutOfRange { .. } => "out_of_range",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::DIMENSION_RANGE;

    #[test]
    fn out_of_range_message_names_field_and_bounds() {
        let err = ValidationError::OutOfRange {
            field: ParameterField::Width,
            value: 2000.0,
            range: DIMENSION_RANGE,
        };
        assert_eq!(
            err.to_string(),
            "width must be between 512 and 1536 (got 2000)"
        );
        assert_eq!(err.kind(), "out_of_range");
    }

    #[test]
    fn unknown_preset_lists_choices() {
        let err = ValidationError::UnknownPreset {
            family: PresetFamily::Quality,
            name: "max".to_string(),
            allowed: vec!["fast", "standard"],
        };
        assert_eq!(
            err.to_string(),
            "Invalid quality 'max'. Choose from: fast, standard"
        );
    }
}
