use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use anyhow::Context;

use crate::{
    decode::{SubtitleDecoder, SubtitleSource},
    foundation::{
        core::{Composition, Frame},
        error::{SublayError, SublayResult},
    },
};

/// Cue list with a presentation size. Cues are sorted by `start_ms` on load.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Manifest {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub cues: Vec<Cue>,
}

/// Everything shown from `start_ms` until the next cue. No compositions clears the screen.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Cue {
    pub start_ms: f64,
    #[serde(default)]
    pub compositions: Vec<CueImage>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct CueImage {
    pub x: u32,
    pub y: u32,
    #[serde(flatten)]
    pub pixels: CuePixels,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum CuePixels {
    /// PNG path, relative to the manifest directory.
    Image { image: PathBuf },
    /// Solid straight-alpha color.
    Fill {
        width: u32,
        height: u32,
        fill: [u8; 4],
    },
}

/// [`SubtitleDecoder`] over a JSON [`Manifest`].
#[derive(Debug, Default)]
pub struct ManifestDecoder {
    manifest: Option<Manifest>,
    base_dir: PathBuf,
    cache: HashMap<usize, Frame>,
}

/// Upper bound for a solid fill, in bytes.
const MAX_FILL_BYTES: usize = 256 << 20;

impl ManifestDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn manifest(&self) -> Option<&Manifest> {
        self.manifest.as_ref()
    }

    fn decode_image(&self, img: &CueImage) -> SublayResult<Composition> {
        match &img.pixels {
            CuePixels::Fill {
                width,
                height,
                fill,
            } => {
                let bytes = (*width as usize)
                    .checked_mul(*height as usize)
                    .and_then(|n| n.checked_mul(4))
                    .filter(|&n| n <= MAX_FILL_BYTES)
                    .ok_or_else(|| {
                        SublayError::decode(format!("fill of {width}x{height} is too large"))
                    })?;
                Ok(Composition::new(
                    img.x,
                    img.y,
                    *width,
                    *height,
                    fill.repeat(bytes / 4),
                ))
            }
            CuePixels::Image { image } => {
                let path = resolve(&self.base_dir, image);
                let bytes =
                    std::fs::read(&path).with_context(|| format!("read {}", path.display()))?;
                let rgba = image::load_from_memory(&bytes)
                    .with_context(|| format!("decode {}", path.display()))?
                    .into_rgba8();
                let (width, height) = rgba.dimensions();
                Ok(Composition::new(img.x, img.y, width, height, rgba.into_raw()))
            }
        }
    }
}

fn resolve(base: &Path, p: &Path) -> PathBuf {
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

impl SubtitleDecoder for ManifestDecoder {
    fn load(&mut self, source: &SubtitleSource) -> SublayResult<usize> {
        self.dispose();
        let SubtitleSource::Manifest { json, base_dir } = source else {
            return Err(SublayError::decode(format!(
                "manifest decoder cannot load {} sources",
                source.format()
            )));
        };
        let mut manifest: Manifest = serde_json::from_str(json)?;
        if let Some(bad) = manifest.cues.iter().find(|c| !c.start_ms.is_finite()) {
            return Err(SublayError::decode(format!(
                "cue start {} is not finite",
                bad.start_ms
            )));
        }
        manifest.cues.sort_by(|a, b| a.start_ms.total_cmp(&b.start_ms));
        let count = manifest.cues.len();
        tracing::debug!(cues = count, width = manifest.width, height = manifest.height, "manifest loaded");
        self.manifest = Some(manifest);
        self.base_dir = base_dir.clone();
        Ok(count)
    }

    fn timestamps(&self) -> Vec<f64> {
        self.manifest
            .as_ref()
            .map(|m| m.cues.iter().map(|c| c.start_ms).collect())
            .unwrap_or_default()
    }

    fn render_at(&mut self, index: usize) -> SublayResult<Option<Frame>> {
        if let Some(frame) = self.cache.get(&index) {
            return Ok(Some(frame.clone()));
        }
        let Some(manifest) = self.manifest.as_ref() else {
            return Ok(None);
        };
        let Some(cue) = manifest.cues.get(index) else {
            return Ok(None);
        };
        let compositions = cue
            .compositions
            .iter()
            .map(|img| self.decode_image(img))
            .collect::<SublayResult<Vec<_>>>()?;
        let frame = Frame::new(manifest.width, manifest.height, compositions);
        self.cache.insert(index, frame.clone());
        Ok(Some(frame))
    }

    fn clear_cache(&mut self) {
        self.cache.clear();
    }

    fn dispose(&mut self) {
        self.manifest = None;
        self.base_dir = PathBuf::new();
        self.cache.clear();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/decode/manifest.rs"]
mod tests;
