use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::presets::{lookup, normalize_preset_name, preset_names, PresetDefinition, PresetFamily};
use crate::request::{AppliedPresets, GenerationRequest, ParameterField, ResolvedParameters};

/// Starting values applied before any preset or override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationDefaults {
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub cfg_scale: f64,
    pub style_token: Option<String>,
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 1024,
            steps: 30,
            cfg_scale: 7.0,
            style_token: None,
        }
    }
}

/// Maps a raw request onto bounded generation parameters.
///
/// Precedence, lowest to highest: defaults, aspect/quality/style presets,
/// explicit overrides. Each override only replaces its own field.
#[derive(Debug, Clone, Default)]
pub struct ParameterResolver {
    defaults: GenerationDefaults,
}

impl ParameterResolver {
    pub fn new(defaults: GenerationDefaults) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &GenerationDefaults {
        &self.defaults
    }

    pub fn resolve(&self, request: &GenerationRequest) -> Result<ResolvedParameters, ValidationError> {
        if request.prompt.trim().is_empty() {
            return Err(ValidationError::EmptyPrompt);
        }

        let mut width = self.defaults.width;
        let mut height = self.defaults.height;
        let mut steps = self.defaults.steps;
        let mut cfg_scale = self.defaults.cfg_scale;
        let mut style_token = self.defaults.style_token.clone();
        let mut presets = AppliedPresets::default();

        if let Some(name) = request.aspect_ratio.as_deref() {
            if let PresetDefinition::Aspect {
                width: preset_width,
                height: preset_height,
            } = require_preset(PresetFamily::Aspect, name)?
            {
                width = preset_width;
                height = preset_height;
            }
            presets.aspect_ratio = Some(normalize_preset_name(name));
        }

        if let Some(name) = request.quality.as_deref() {
            if let PresetDefinition::Quality {
                steps: preset_steps,
                cfg_scale: preset_cfg,
            } = require_preset(PresetFamily::Quality, name)?
            {
                steps = preset_steps;
                cfg_scale = preset_cfg;
            }
            presets.quality = Some(normalize_preset_name(name));
        }

        if let Some(name) = request.style.as_deref() {
            if let PresetDefinition::Style { token } = require_preset(PresetFamily::Style, name)? {
                style_token = token.map(str::to_string);
            }
            presets.style = Some(normalize_preset_name(name));
        }

        // All overrides are checked before any is applied.
        let overrides = request.overrides;
        if let Some(value) = overrides.width {
            check_bounds(ParameterField::Width, value as f64)?;
        }
        if let Some(value) = overrides.height {
            check_bounds(ParameterField::Height, value as f64)?;
        }
        if let Some(value) = overrides.cfg_scale {
            check_bounds(ParameterField::CfgScale, value)?;
        }
        if let Some(value) = overrides.steps {
            check_bounds(ParameterField::Steps, value as f64)?;
        }
        width = overrides.width.unwrap_or(width);
        height = overrides.height.unwrap_or(height);
        cfg_scale = overrides.cfg_scale.unwrap_or(cfg_scale);
        steps = overrides.steps.unwrap_or(steps);

        check_bounds(ParameterField::Width, width as f64)?;
        check_bounds(ParameterField::Height, height as f64)?;
        check_bounds(ParameterField::Steps, steps as f64)?;
        check_bounds(ParameterField::CfgScale, cfg_scale)?;

        Ok(ResolvedParameters {
            prompt: request.prompt.clone(),
            width,
            height,
            cfg_scale,
            steps,
            style_token,
            requester_id: request.requester_id.clone(),
            presets,
        })
    }
}

fn require_preset(family: PresetFamily, name: &str) -> Result<PresetDefinition, ValidationError> {
    lookup(family, name).ok_or_else(|| ValidationError::UnknownPreset {
        family,
        name: name.trim().to_string(),
        allowed: preset_names(family),
    })
}

fn check_bounds(field: ParameterField, value: f64) -> Result<(), ValidationError> {
    let range = field.range();
    if range.contains(value) {
        return Ok(());
    }
    Err(ValidationError::OutOfRange {
        field,
        value,
        range,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets::preset_names;
    use crate::request::{ParameterOverrides, DIMENSION_RANGE};

    fn request(prompt: &str) -> GenerationRequest {
        GenerationRequest::new(prompt, "42")
    }

    #[test]
    fn bare_request_resolves_to_defaults() {
        let resolved = ParameterResolver::default()
            .resolve(&request("a cute cat"))
            .expect("resolves");
        assert_eq!(
            (resolved.width, resolved.height, resolved.steps),
            (1024, 1024, 30)
        );
        assert_eq!(resolved.cfg_scale, 7.0);
        assert_eq!(resolved.style_token, None);
        assert_eq!(resolved.presets, AppliedPresets::default());
    }

    #[test]
    fn every_preset_combination_stays_in_bounds() {
        let resolver = ParameterResolver::default();
        for aspect in preset_names(PresetFamily::Aspect) {
            for quality in preset_names(PresetFamily::Quality) {
                for style in preset_names(PresetFamily::Style) {
                    let resolved = resolver
                        .resolve(
                            &request("lighthouse")
                                .with_aspect_ratio(aspect)
                                .with_quality(quality)
                                .with_style(style),
                        )
                        .expect("presets resolve");
                    assert!((512..=1536).contains(&resolved.width));
                    assert!((512..=1536).contains(&resolved.height));
                    assert!((10..=150).contains(&resolved.steps));
                    assert!((1.0..=20.0).contains(&resolved.cfg_scale));
                }
            }
        }
    }

    #[test]
    fn landscape_preset_sets_dimensions_only() {
        let resolved = ParameterResolver::default()
            .resolve(&request("a cute cat").with_aspect_ratio("landscape"))
            .expect("resolves");
        assert_eq!((resolved.width, resolved.height), (1216, 832));
        assert_eq!(resolved.steps, 30);
        assert_eq!(resolved.cfg_scale, 7.0);
        assert_eq!(resolved.presets.aspect_ratio.as_deref(), Some("landscape"));
    }

    #[test]
    fn explicit_override_beats_preset_for_its_field_only() {
        let resolved = ParameterResolver::default()
            .resolve(
                &request("fox")
                    .with_quality("high")
                    .with_overrides(ParameterOverrides {
                        steps: Some(12),
                        ..Default::default()
                    }),
            )
            .expect("resolves");
        assert_eq!(resolved.steps, 12);
        assert_eq!(resolved.cfg_scale, 8.0);
    }

    #[test]
    fn single_dimension_override_keeps_preset_counterpart() {
        let resolved = ParameterResolver::default()
            .resolve(
                &request("fox")
                    .with_aspect_ratio("wide")
                    .with_overrides(ParameterOverrides {
                        height: Some(900),
                        ..Default::default()
                    }),
            )
            .expect("resolves");
        assert_eq!((resolved.width, resolved.height), (1344, 900));
    }

    #[test]
    fn out_of_range_override_reports_field_and_range() {
        let err = ParameterResolver::default()
            .resolve(&request("fox").with_overrides(ParameterOverrides {
                width: Some(2000),
                steps: Some(40),
                ..Default::default()
            }))
            .expect_err("width is out of range");
        assert_eq!(
            err,
            ValidationError::OutOfRange {
                field: ParameterField::Width,
                value: 2000.0,
                range: DIMENSION_RANGE,
            }
        );
    }

    #[test]
    fn cfg_scale_override_rejects_non_finite_values() {
        let err = ParameterResolver::default()
            .resolve(&request("fox").with_overrides(ParameterOverrides {
                cfg_scale: Some(f64::INFINITY),
                ..Default::default()
            }))
            .expect_err("infinite cfg");
        assert_eq!(err.kind(), "out_of_range");
    }

    #[test]
    fn blank_prompt_fails_before_presets_are_checked() {
        for prompt in ["", "   \t\n"] {
            let err = ParameterResolver::default()
                .resolve(&request(prompt).with_aspect_ratio("diagonal"))
                .expect_err("empty prompt");
            assert_eq!(err, ValidationError::EmptyPrompt);
        }
    }

    #[test]
    fn unknown_preset_is_rejected() {
        let err = ParameterResolver::default()
            .resolve(&request("fox").with_aspect_ratio("diagonal"))
            .expect_err("unknown preset");
        match err {
            ValidationError::UnknownPreset {
                family,
                name,
                allowed,
            } => {
                assert_eq!(family, PresetFamily::Aspect);
                assert_eq!(name, "diagonal");
                assert!(allowed.contains(&"landscape"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn blank_preset_name_is_unknown_not_absent() {
        let resolver = ParameterResolver::default();
        let cases = [
            (request("fox").with_aspect_ratio(""), PresetFamily::Aspect),
            (request("fox").with_quality("   "), PresetFamily::Quality),
            (request("fox").with_style("\t"), PresetFamily::Style),
        ];
        for (req, expected) in cases {
            match resolver.resolve(&req) {
                Err(ValidationError::UnknownPreset { family, name, .. }) => {
                    assert_eq!(family, expected);
                    assert_eq!(name, "");
                }
                other => panic!("blank {expected} must fail: {other:?}"),
            }
        }
    }

    #[test]
    fn style_none_clears_token_and_named_style_sets_it() {
        let resolver = ParameterResolver::default();
        let plain = resolver
            .resolve(&request("fox").with_style("none"))
            .expect("resolves");
        assert_eq!(plain.style_token, None);
        let anime = resolver
            .resolve(&request("fox").with_style("Anime"))
            .expect("resolves");
        assert_eq!(
            anime.style_token.as_deref(),
            Some("anime style, manga, cel shaded, colorful")
        );
        assert_eq!(anime.presets.style.as_deref(), Some("anime"));
    }

    #[test]
    fn custom_defaults_are_honored_and_still_bounded() {
        let resolver = ParameterResolver::new(GenerationDefaults {
            width: 768,
            height: 768,
            steps: 25,
            cfg_scale: 6.5,
            style_token: Some("flat colors".to_string()),
        });
        let resolved = resolver.resolve(&request("fox")).expect("resolves");
        assert_eq!((resolved.width, resolved.steps), (768, 25));
        assert_eq!(resolved.style_token.as_deref(), Some("flat colors"));

        let broken = ParameterResolver::new(GenerationDefaults {
            steps: 5,
            ..GenerationDefaults::default()
        });
        let err = broken.resolve(&request("fox")).expect_err("bad default");
        assert_eq!(err.kind(), "out_of_range");
    }

    #[test]
    fn prompt_is_preserved_verbatim() {
        let resolved = ParameterResolver::default()
            .resolve(&request("  猫 / ねこ  "))
            .expect("resolves");
        assert_eq!(resolved.prompt, "  猫 / ねこ  ");
    }
}
