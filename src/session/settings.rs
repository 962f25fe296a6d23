use std::time::Duration;

use crate::{
    foundation::core::SurfaceFormat,
    pipeline::service::PipelineOpts,
    render::backend::BackendKind,
    timing::{
        index::DEFAULT_INDEX_REUSE_WINDOW_MS,
        stats::{DEFAULT_FRAME_BUDGET_MS, DEFAULT_STATS_WINDOW},
    },
};

pub const MIN_SCALE: f64 = 0.1;
pub const MAX_SCALE: f64 = 3.0;
pub const MAX_VERTICAL_OFFSET_PCT: f64 = 50.0;

/// User-adjustable placement of the overlay.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Uniform scale around the bottom-center anchor, clamped to `[0.1, 3.0]`.
    pub scale: f64,
    /// Vertical shift in percent of surface height, clamped to `[-50, 50]`. Positive moves up.
    pub vertical_offset_pct: f64,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            scale: 1.0,
            vertical_offset_pct: 0.0,
        }
    }
}

impl DisplaySettings {
    pub fn new(scale: f64, vertical_offset_pct: f64) -> Self {
        Self {
            scale,
            vertical_offset_pct,
        }
        .clamped()
    }

    /// Clamp both fields into range. Non-finite values fall back to the defaults.
    pub fn clamped(self) -> Self {
        let d = Self::default();
        let scale = if self.scale.is_finite() {
            self.scale.clamp(MIN_SCALE, MAX_SCALE)
        } else {
            d.scale
        };
        let vertical_offset_pct = if self.vertical_offset_pct.is_finite() {
            self.vertical_offset_pct
                .clamp(-MAX_VERTICAL_OFFSET_PCT, MAX_VERTICAL_OFFSET_PCT)
        } else {
            d.vertical_offset_pct
        };
        Self {
            scale,
            vertical_offset_pct,
        }
    }

    /// Vertical offset in surface pixels. Upward shifts are negative in surface space.
    pub fn offset_px(&self, surface_height: u32) -> f64 {
        -(self.vertical_offset_pct / 100.0) * f64::from(surface_height)
    }
}

/// Options controlling an [`OverlaySession`](crate::session::overlay_session::OverlaySession).
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SessionOpts {
    /// Render tiers to try, best first. Software is appended when missing.
    pub backends: Vec<BackendKind>,
    /// Channel order of the host surface.
    pub surface_format: SurfaceFormat,
    /// Decode on a background thread. Disabled sessions decode inline.
    pub use_background: bool,
    /// Deadline for each background request.
    pub dispatch_timeout_ms: u64,
    /// Render time above which a tick counts as dropped.
    pub frame_budget_ms: f64,
    /// Number of render-time samples kept for statistics.
    pub stats_window: usize,
    /// Queries this close to the last resolved time reuse a remote index lookup.
    pub index_reuse_window_ms: f64,
    pub display: DisplaySettings,
}

impl Default for SessionOpts {
    fn default() -> Self {
        Self {
            backends: BackendKind::default_cascade(),
            surface_format: SurfaceFormat::default(),
            use_background: true,
            dispatch_timeout_ms: 30_000,
            frame_budget_ms: DEFAULT_FRAME_BUDGET_MS,
            stats_window: DEFAULT_STATS_WINDOW,
            index_reuse_window_ms: DEFAULT_INDEX_REUSE_WINDOW_MS,
            display: DisplaySettings::default(),
        }
    }
}

impl SessionOpts {
    /// Apply `SUBLAY_DISPATCH_TIMEOUT_MS`, `SUBLAY_BACKEND` and `SUBLAY_NO_WORKER` from the process
    /// environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Like [`SessionOpts::with_env_overrides`] with an arbitrary variable source.
    pub fn with_overrides_from(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(ms) = var("SUBLAY_DISPATCH_TIMEOUT_MS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|&n| n > 0)
        {
            self.dispatch_timeout_ms = ms;
        }
        if let Some(list) = var("SUBLAY_BACKEND") {
            let parsed: Vec<BackendKind> = list
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .filter_map(|s| match s.parse::<BackendKind>() {
                    Ok(kind) => Some(kind),
                    Err(e) => {
                        tracing::warn!(error = %e, "ignoring SUBLAY_BACKEND entry");
                        None
                    }
                })
                .collect();
            if !parsed.is_empty() {
                self.backends = parsed;
            }
        }
        if let Some(v) = var("SUBLAY_NO_WORKER") {
            let v = v.trim().to_ascii_lowercase();
            if !v.is_empty() && v != "0" && v != "false" {
                self.use_background = false;
            }
        }
        self
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms.max(1))
    }

    pub(crate) fn pipeline_opts(&self) -> PipelineOpts {
        PipelineOpts {
            use_background: self.use_background,
            dispatch_timeout: self.dispatch_timeout(),
            index_reuse_window_ms: self.index_reuse_window_ms,
        }
    }
}
