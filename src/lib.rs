//! Sublay keeps decoded bitmap subtitles in sync with a playback clock and composites them onto a
//! render surface.
//!
//! - Plug a format decoder in behind [`SubtitleDecoder`]
//! - Create an [`OverlaySession`] bound to a surface
//! - Call [`OverlaySession::tick`] once per display refresh
//!
//! Rendering picks the best available tier at startup (explicit GPU, immediate GPU, software) and
//! falls back on failure. Decoding runs on a background thread until it fails, then inline.
#![forbid(unsafe_code)]

/// Codec engine boundary and the JSON manifest adapter.
pub mod decode;
pub mod foundation;
/// Background decode worker, request dispatch and frame cache.
pub mod pipeline;
/// Render tiers and the capability cascade.
pub mod render;
/// Clock-driven overlay session.
pub mod session;
/// Timestamp lookup and render statistics.
pub mod timing;

pub use crate::decode::manifest::{Manifest, ManifestDecoder};
pub use crate::decode::{DecoderFactory, SubtitleDecoder, SubtitleFormat, SubtitleSource};
pub use crate::foundation::core::{Composition, Frame, Rect, SurfaceDesc, SurfaceFormat};
pub use crate::foundation::error::{SublayError, SublayResult};
pub use crate::foundation::notice::FallbackNotice;
pub use crate::pipeline::frame_cache::FrameLookup;
pub use crate::render::backend::{BackendKind, DrawParams, FrameRGBA, RenderBackend};
pub use crate::session::clock::{ManualClock, PlaybackClock};
pub use crate::session::overlay_session::{OverlaySession, OverlaySessionBuilder, TickOutcome};
pub use crate::session::settings::{DisplaySettings, SessionOpts};
pub use crate::timing::stats::RenderStatsSnapshot;
