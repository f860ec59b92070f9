use std::fmt::Write as _;
use std::path::PathBuf;

use serde::Serialize;
use stickerme_contracts::{quality_matching, ResolvedParameters};

use crate::store::GeneratedArtifact;

pub const RESULT_TITLE: &str = "AI Generated Image";
pub const DOWNLOAD_LABEL: &str = "Download Image";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Points at a stored artifact without owning its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactRef {
    pub filename: String,
    pub path: PathBuf,
    pub byte_len: u64,
    pub sha256: String,
}

/// Lets the recipient re-fetch the same bytes privately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetrievalAction {
    pub label: String,
    pub artifact_filename: String,
    pub private: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresentationPayload {
    pub title: String,
    pub description: String,
    pub fields: Vec<SummaryField>,
    pub footer: String,
    pub attachment: ArtifactRef,
    pub retrieval: RetrievalAction,
}

impl PresentationPayload {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.value.as_str())
    }

    /// Plain-text rendering for terminals and logs.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.title);
        let _ = writeln!(out, "{}", self.description);
        for field in &self.fields {
            let _ = writeln!(out, "  {}: {}", field.name, field.value);
        }
        let _ = writeln!(
            out,
            "  File: {} ({} bytes)",
            self.attachment.path.display(),
            self.attachment.byte_len
        );
        let _ = writeln!(
            out,
            "[{}] {}",
            self.retrieval.label, self.retrieval.artifact_filename
        );
        let _ = write!(out, "{}", self.footer);
        out
    }
}

#[derive(Debug, Clone)]
pub struct ResponseComposer {
    generator_label: String,
}

impl ResponseComposer {
    pub fn new(generator_label: impl Into<String>) -> Self {
        Self {
            generator_label: generator_label.into(),
        }
    }

    /// Summarizes what was actually sent upstream, not what was asked for.
    pub fn compose(
        &self,
        resolved: &ResolvedParameters,
        artifact: &GeneratedArtifact,
    ) -> PresentationPayload {
        let quality = match &resolved.presets.quality {
            Some(name) => title_case(name),
            None => quality_matching(resolved.steps, resolved.cfg_scale)
                .map(title_case)
                .unwrap_or_else(|| "Custom".to_string()),
        };
        let style = match (&resolved.presets.style, &resolved.style_token) {
            (Some(name), _) => title_case(name),
            (None, Some(_)) => "Custom".to_string(),
            (None, None) => "None".to_string(),
        };
        let inline = |name: &str, value: String| SummaryField {
            name: name.to_string(),
            value,
            inline: true,
        };

        PresentationPayload {
            title: RESULT_TITLE.to_string(),
            description: format!("**Prompt:** {}", resolved.prompt),
            fields: vec![
                inline("Dimensions", resolved.dimensions()),
                inline("Quality", quality),
                inline("Style", style),
                inline("CFG Scale", resolved.cfg_scale.to_string()),
                inline("Steps", resolved.steps.to_string()),
            ],
            footer: format!(
                "Generated for {} | Powered by {}",
                resolved.requester_id, self.generator_label
            ),
            attachment: ArtifactRef {
                filename: artifact.filename.clone(),
                path: artifact.path.clone(),
                byte_len: artifact.byte_len,
                sha256: artifact.sha256.clone(),
            },
            retrieval: RetrievalAction {
                label: DOWNLOAD_LABEL.to_string(),
                artifact_filename: artifact.filename.clone(),
                private: true,
            },
        }
    }
}

/// `oil_painting` -> `Oil Painting`.
fn title_case(name: &str) -> String {
    name.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
