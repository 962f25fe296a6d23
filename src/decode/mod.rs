//! Codec engine boundary.
//!
//! Format-specific parsing lives behind [`SubtitleDecoder`]. The engine only needs entry count,
//! timestamps, index lookup and per-index frames.

use std::{path::PathBuf, sync::Arc};

use crate::{
    foundation::{core::Frame, error::SublayResult},
    timing::index::find_index,
};

/// Adapter over JSON cue manifests with PNG fragments.
pub mod manifest;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtitleFormat {
    /// Blu-ray presentation graphics.
    Pgs,
    /// DVD subpictures (`.idx` + `.sub`, or `.sub` alone).
    VobSub,
    /// JSON cue list referencing already-decoded bitmaps.
    Manifest,
}

impl SubtitleFormat {
    pub fn name(self) -> &'static str {
        match self {
            Self::Pgs => "pgs",
            Self::VobSub => "vobsub",
            Self::Manifest => "manifest",
        }
    }

    /// Whether index lookup must go through the decoder rather than the timestamp table.
    ///
    /// VobSub lookups consult parser state, so they are resolved remotely.
    pub fn has_stateful_lookup(self) -> bool {
        matches!(self, Self::VobSub)
    }
}

impl std::fmt::Display for SubtitleFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Raw subtitle payload handed to a decoder.
///
/// Binary payloads are reference-counted so sending a source to the worker moves a pointer, not
/// the bytes.
#[derive(Clone, Debug)]
pub enum SubtitleSource {
    Pgs { data: Arc<[u8]> },
    VobSub { idx: String, sub: Arc<[u8]> },
    VobSubOnly { sub: Arc<[u8]> },
    Manifest { json: String, base_dir: PathBuf },
}

impl SubtitleSource {
    pub fn format(&self) -> SubtitleFormat {
        match self {
            Self::Pgs { .. } => SubtitleFormat::Pgs,
            Self::VobSub { .. } | Self::VobSubOnly { .. } => SubtitleFormat::VobSub,
            Self::Manifest { .. } => SubtitleFormat::Manifest,
        }
    }

    /// Payload size in bytes, for logging.
    pub fn payload_len(&self) -> usize {
        match self {
            Self::Pgs { data } => data.len(),
            Self::VobSub { idx, sub } => idx.len() + sub.len(),
            Self::VobSubOnly { sub } => sub.len(),
            Self::Manifest { json, .. } => json.len(),
        }
    }
}

/// A format-specific subtitle decoder.
///
/// Implementations run either on the background worker or inline on the control thread, so they
/// must be `Send`. `load` replaces any previously loaded content.
pub trait SubtitleDecoder: Send {
    /// Parse `source` and return the number of subtitle entries.
    fn load(&mut self, source: &SubtitleSource) -> SublayResult<usize>;

    /// Presentation times in milliseconds, sorted ascending, one per entry.
    fn timestamps(&self) -> Vec<f64>;

    /// Greatest index whose timestamp is `<= time_ms`.
    fn find_index(&mut self, time_ms: f64) -> Option<usize> {
        find_index(&self.timestamps(), time_ms)
    }

    /// Decode the frame at `index`. `Ok(None)` means there is no such entry.
    fn render_at(&mut self, index: usize) -> SublayResult<Option<Frame>>;

    fn clear_cache(&mut self);

    fn dispose(&mut self);
}

/// Builds a fresh decoder. Used once for the worker and lazily for inline decoding.
pub type DecoderFactory = Arc<dyn Fn() -> SublayResult<Box<dyn SubtitleDecoder>> + Send + Sync>;
