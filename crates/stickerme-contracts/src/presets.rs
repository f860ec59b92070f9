use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresetFamily {
    Aspect,
    Quality,
    Style,
}

impl PresetFamily {
    pub const ALL: [PresetFamily; 3] = [Self::Aspect, Self::Quality, Self::Style];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aspect => "aspect_ratio",
            Self::Quality => "quality",
            Self::Style => "style",
        }
    }
}

impl fmt::Display for PresetFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PresetDefinition {
    Aspect { width: u32, height: u32 },
    Quality { steps: u32, cfg_scale: f64 },
    Style { token: Option<&'static str> },
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct AspectSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct QualitySpec {
    pub name: &'static str,
    pub label: &'static str,
    pub steps: u32,
    pub cfg_scale: f64,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct StyleSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub token: Option<&'static str>,
}

pub(crate) const ASPECT_PRESETS: &[AspectSpec] = &[
    AspectSpec {
        name: "square",
        label: "Square (1024x1024)",
        width: 1024,
        height: 1024,
    },
    AspectSpec {
        name: "portrait",
        label: "Portrait (832x1216)",
        width: 832,
        height: 1216,
    },
    AspectSpec {
        name: "landscape",
        label: "Landscape (1216x832)",
        width: 1216,
        height: 832,
    },
    AspectSpec {
        name: "wide",
        label: "Wide (1344x768)",
        width: 1344,
        height: 768,
    },
    AspectSpec {
        name: "tall",
        label: "Tall (768x1344)",
        width: 768,
        height: 1344,
    },
    AspectSpec {
        name: "ultrawide",
        label: "Ultra Wide (1536x640)",
        width: 1536,
        height: 640,
    },
    AspectSpec {
        name: "ultratall",
        label: "Ultra Tall (640x1536)",
        width: 640,
        height: 1536,
    },
];

pub(crate) const QUALITY_PRESETS: &[QualitySpec] = &[
    QualitySpec {
        name: "fast",
        label: "Fast (20 steps)",
        steps: 20,
        cfg_scale: 7.0,
    },
    QualitySpec {
        name: "standard",
        label: "Standard (30 steps)",
        steps: 30,
        cfg_scale: 7.0,
    },
    QualitySpec {
        name: "high",
        label: "High (50 steps)",
        steps: 50,
        cfg_scale: 8.0,
    },
    QualitySpec {
        name: "ultra",
        label: "Ultra (75 steps)",
        steps: 75,
        cfg_scale: 8.0,
    },
];

pub(crate) const STYLE_PRESETS: &[StyleSpec] = &[
    StyleSpec {
        name: "none",
        label: "None",
        token: None,
    },
    StyleSpec {
        name: "photographic",
        label: "Photographic",
        token: Some("photographic, realistic, detailed, high quality"),
    },
    StyleSpec {
        name: "artistic",
        label: "Artistic",
        token: Some("artistic, creative, stylized, vibrant"),
    },
    StyleSpec {
        name: "cinematic",
        label: "Cinematic",
        token: Some("cinematic, dramatic lighting, movie still, professional"),
    },
    StyleSpec {
        name: "anime",
        label: "Anime",
        token: Some("anime style, manga, cel shaded, colorful"),
    },
    StyleSpec {
        name: "oil_painting",
        label: "Oil Painting",
        token: Some("oil painting, textured, artistic, traditional"),
    },
    StyleSpec {
        name: "watercolor",
        label: "Watercolor",
        token: Some("watercolor, soft, flowing, artistic"),
    },
    StyleSpec {
        name: "digital_art",
        label: "Digital Art",
        token: Some("digital art, clean, modern, professional"),
    },
    StyleSpec {
        name: "sketch",
        label: "Sketch",
        token: Some("sketch, pencil drawing, monochrome, artistic"),
    },
];

/// One row of a help listing: the preset's canonical name, its display label,
/// and a short rendering of what it sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresetListing {
    pub family: PresetFamily,
    pub name: &'static str,
    pub label: &'static str,
    pub detail: String,
}

/// Normalizes a caller-supplied preset name for table lookup.
pub fn normalize_preset_name(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

/// Looks a preset up in one of the three static tables.
///
/// Returns `None` for unknown names; the resolver decides whether that is an error.
pub fn lookup(family: PresetFamily, name: &str) -> Option<PresetDefinition> {
    let name = normalize_preset_name(name);
    match family {
        PresetFamily::Aspect => ASPECT_PRESETS
            .iter()
            .find(|spec| spec.name == name)
            .map(|spec| PresetDefinition::Aspect {
                width: spec.width,
                height: spec.height,
            }),
        PresetFamily::Quality => QUALITY_PRESETS
            .iter()
            .find(|spec| spec.name == name)
            .map(|spec| PresetDefinition::Quality {
                steps: spec.steps,
                cfg_scale: spec.cfg_scale,
            }),
        PresetFamily::Style => STYLE_PRESETS
            .iter()
            .find(|spec| spec.name == name)
            .map(|spec| PresetDefinition::Style { token: spec.token }),
    }
}

pub fn preset_names(family: PresetFamily) -> Vec<&'static str> {
    match family {
        PresetFamily::Aspect => ASPECT_PRESETS.iter().map(|spec| spec.name).collect(),
        PresetFamily::Quality => QUALITY_PRESETS.iter().map(|spec| spec.name).collect(),
        PresetFamily::Style => STYLE_PRESETS.iter().map(|spec| spec.name).collect(),
    }
}

/// Display label for a known preset, e.g. `"Landscape (1216x832)"`.
pub fn preset_label(family: PresetFamily, name: &str) -> Option<&'static str> {
    let name = normalize_preset_name(name);
    match family {
        PresetFamily::Aspect => ASPECT_PRESETS
            .iter()
            .find(|spec| spec.name == name)
            .map(|spec| spec.label),
        PresetFamily::Quality => QUALITY_PRESETS
            .iter()
            .find(|spec| spec.name == name)
            .map(|spec| spec.label),
        PresetFamily::Style => STYLE_PRESETS
            .iter()
            .find(|spec| spec.name == name)
            .map(|spec| spec.label),
    }
}

/// Name of the quality preset whose steps and CFG scale equal the given values.
pub fn quality_matching(steps: u32, cfg_scale: f64) -> Option<&'static str> {
    QUALITY_PRESETS
        .iter()
        .find(|spec| spec.steps == steps && spec.cfg_scale == cfg_scale)
        .map(|spec| spec.name)
}

pub fn list_presets(family: PresetFamily) -> Vec<PresetListing> {
    match family {
        PresetFamily::Aspect => ASPECT_PRESETS
            .iter()
            .map(|spec| PresetListing {
                family,
                name: spec.name,
                label: spec.label,
                detail: format!("{}x{}", spec.width, spec.height),
            })
            .collect(),
        PresetFamily::Quality => QUALITY_PRESETS
            .iter()
            .map(|spec| PresetListing {
                family,
                name: spec.name,
                label: spec.label,
                detail: format!("Steps: {}, CFG: {}", spec.steps, spec.cfg_scale),
            })
            .collect(),
        PresetFamily::Style => STYLE_PRESETS
            .iter()
            .map(|spec| PresetListing {
                family,
                name: spec.name,
                label: spec.label,
                detail: spec.token.unwrap_or("no style modifier").to_string(),
            })
            .collect(),
    }
}
