use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use sha2::{Digest, Sha256};
use stickerme_contracts::ResolvedParameters;

use crate::error::GenerationError;

/// Raw bytes returned by a generator, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBytes {
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

impl ImageBytes {
    pub fn png(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime_type: Some("image/png".to_string()),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// One request in, one typed outcome out.
pub trait ImageGenerator: Send + Sync {
    fn name(&self) -> &str;

    /// Human label used in response footers.
    fn display_name(&self) -> &str {
        self.name()
    }

    fn submit(&self, params: &ResolvedParameters) -> Result<ImageBytes, GenerationError>;
}

/// Offline generator: a solid PNG whose colour is derived from prompt and style.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryrunGenerator;

impl ImageGenerator for DryrunGenerator {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn display_name(&self) -> &str {
        "StickerMe dry run"
    }

    fn submit(&self, params: &ResolvedParameters) -> Result<ImageBytes, GenerationError> {
        let (r, g, b) = color_from_prompt(&params.prompt, params.style_token.as_deref());
        let mut canvas = RgbImage::new(params.width, params.height);
        for pixel in canvas.pixels_mut() {
            *pixel = Rgb([r, g, b]);
        }
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(canvas)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|err| GenerationError::UpstreamProtocol {
                status: None,
                message: format!("dry-run PNG encoding failed: {err}"),
            })?;
        Ok(ImageBytes::png(bytes))
    }
}

fn color_from_prompt(prompt: &str, style: Option<&str>) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    if let Some(style) = style {
        hasher.update(style.as_bytes());
    }
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}
