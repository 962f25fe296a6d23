use std::{sync::Arc, time::Instant};

use crate::{
    decode::{DecoderFactory, SubtitleFormat, SubtitleSource},
    foundation::{
        core::{Frame, SurfaceDesc},
        error::{SublayError, SublayResult},
        notice::FallbackNotice,
    },
    pipeline::{
        frame_cache::FrameLookup,
        service::FramePipeline,
    },
    render::{
        backend::{BackendKind, DrawParams, FrameRGBA},
        cascade::{BackendCascade, BackendFactory},
    },
    session::{
        clock::PlaybackClock,
        settings::{DisplaySettings, SessionOpts},
    },
    timing::stats::{RenderStats, RenderStatsSnapshot},
};

/// Host callback for [`FallbackNotice`]s.
pub type FallbackCallback = Box<dyn FnMut(&FallbackNotice)>;

/// Outcome of one [`OverlaySession::tick`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// The entry on screen is still current.
    Skipped,
    /// The surface now shows this entry (`None` clears it).
    Rendered(Option<usize>),
    /// The entry's frame is still decoding; the previous output stays on screen.
    Pending(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Shown {
    /// Forces the next tick to render.
    Stale,
    Index(Option<usize>),
}

#[derive(Default)]
struct NoticeLog {
    history: Vec<FallbackNotice>,
    callback: Option<FallbackCallback>,
}

impl NoticeLog {
    fn emit(&mut self, notice: &FallbackNotice) {
        self.history.push(notice.clone());
        if let Some(cb) = self.callback.as_mut() {
            cb(notice);
        }
    }
}

/// Builder for [`OverlaySession`].
pub struct OverlaySessionBuilder {
    width: u32,
    height: u32,
    decoders: Option<DecoderFactory>,
    opts: SessionOpts,
    on_fallback: Option<FallbackCallback>,
    backend_factory: Option<BackendFactory>,
}

impl OverlaySessionBuilder {
    /// Factory for the format decoder. Required.
    pub fn decoders(mut self, factory: DecoderFactory) -> Self {
        self.decoders = Some(factory);
        self
    }

    pub fn opts(mut self, opts: SessionOpts) -> Self {
        self.opts = opts;
        self
    }

    pub fn on_fallback(mut self, callback: impl FnMut(&FallbackNotice) + 'static) -> Self {
        self.on_fallback = Some(Box::new(callback));
        self
    }

    /// Replace tier construction. Tests use this to script tier failures.
    pub fn backend_factory(mut self, factory: BackendFactory) -> Self {
        self.backend_factory = Some(factory);
        self
    }

    /// Bind the render cascade to the surface and start the decode worker.
    pub fn build(self) -> SublayResult<OverlaySession> {
        let Some(decoders) = self.decoders else {
            return Err(SublayError::validation("a decoder factory is required"));
        };
        let surface = SurfaceDesc::new(self.width, self.height).with_format(self.opts.surface_format);
        surface.validate()?;

        let mut notices = NoticeLog {
            history: Vec::new(),
            callback: self.on_fallback,
        };
        let mut cascade = match self.backend_factory {
            Some(f) => BackendCascade::with_factory(&self.opts.backends, f),
            None => BackendCascade::new(&self.opts.backends),
        };
        cascade.initialize(surface, &mut |n| notices.emit(n))?;

        let mut pipeline = FramePipeline::new(decoders, self.opts.pipeline_opts());
        pipeline.start(&mut |n| notices.emit(n));

        Ok(OverlaySession {
            display: self.opts.display.clamped(),
            stats: RenderStats::new(self.opts.frame_budget_ms, self.opts.stats_window),
            opts: self.opts,
            cascade,
            pipeline,
            shown: Shown::Stale,
            last_render_time_ms: None,
            notices,
            disposed: false,
        })
    }
}

/// Keeps a render surface in sync with a playback clock.
///
/// Driven by the host once per display refresh through [`OverlaySession::tick`]. Each tick looks
/// up the entry for the current time and redraws only when it differs from what is on screen.
/// Decoding happens on a background worker when possible; a frame that is not ready yet leaves the
/// previous output in place.
pub struct OverlaySession {
    opts: SessionOpts,
    cascade: BackendCascade,
    pipeline: FramePipeline,
    display: DisplaySettings,
    shown: Shown,
    last_render_time_ms: Option<f64>,
    stats: RenderStats,
    notices: NoticeLog,
    disposed: bool,
}

impl OverlaySession {
    pub fn builder(width: u32, height: u32) -> OverlaySessionBuilder {
        OverlaySessionBuilder {
            width,
            height,
            decoders: None,
            opts: SessionOpts::default(),
            on_fallback: None,
            backend_factory: None,
        }
    }

    /// Replace the loaded content. Returns the number of entries.
    #[tracing::instrument(skip_all, fields(format = %source.format(), bytes = source.payload_len()))]
    pub fn load(&mut self, source: SubtitleSource) -> SublayResult<usize> {
        self.ensure_live()?;
        let notices = &mut self.notices;
        let count = self.pipeline.load(source, &mut |n| notices.emit(n))?;
        self.shown = Shown::Stale;
        self.last_render_time_ms = None;
        self.cascade.clear()?;
        Ok(count)
    }

    pub fn count(&self) -> usize {
        self.pipeline.count()
    }

    pub fn format(&self) -> Option<SubtitleFormat> {
        self.pipeline.format()
    }

    pub fn timestamps(&self) -> &[f64] {
        self.pipeline.timestamps()
    }

    pub fn tick(&mut self, clock: &impl PlaybackClock) -> SublayResult<TickOutcome> {
        self.tick_at(clock.current_time_secs())
    }

    /// One render-loop step at playback time `secs`.
    pub fn tick_at(&mut self, secs: f64) -> SublayResult<TickOutcome> {
        if self.disposed {
            return Ok(TickOutcome::Skipped);
        }
        let time_ms = secs * 1000.0;
        let notices = &mut self.notices;
        let report = self.pipeline.poll(Instant::now(), &mut |n| notices.emit(n));
        if !report.frames.is_empty() {
            tracing::trace!(frames = ?report.frames, "background frames arrived");
        }
        let index = self.pipeline.current_index(time_ms, &mut |n| notices.emit(n));
        if self.shown == Shown::Index(index) {
            return Ok(TickOutcome::Skipped);
        }

        let frame = match index {
            None => None,
            Some(i) => match self.pipeline.frame(i, &mut |n| notices.emit(n)) {
                FrameLookup::Ready(frame) => frame,
                FrameLookup::Pending => return Ok(TickOutcome::Pending(i)),
            },
        };
        self.draw(frame.as_deref())?;
        self.shown = Shown::Index(index);
        self.last_render_time_ms = Some(time_ms);
        Ok(TickOutcome::Rendered(index))
    }

    /// The host jumped in the timeline. Forces a redraw and drops cached frames.
    pub fn on_seek(&mut self) {
        tracing::debug!("seek");
        self.pipeline.on_seek();
        self.shown = Shown::Stale;
    }

    pub fn display_settings(&self) -> DisplaySettings {
        self.display
    }

    /// Takes effect on the next tick.
    pub fn set_display_settings(&mut self, settings: DisplaySettings) {
        self.display = settings.clamped();
        self.shown = Shown::Stale;
    }

    /// Rebind to a new surface size. A tier that cannot resize is replaced by the next one.
    pub fn resize(&mut self, width: u32, height: u32) -> SublayResult<()> {
        SurfaceDesc::new(width, height).validate()?;
        if let Err(e) = self.cascade.resize(width, height) {
            let notices = &mut self.notices;
            self.cascade.fail_over(&e, &mut |n| notices.emit(n))?;
            self.cascade.resize(width, height)?;
        }
        self.shown = Shown::Stale;
        Ok(())
    }

    /// Drop every decoded frame, including decoder-side caches.
    pub fn clear_cache(&mut self) {
        let notices = &mut self.notices;
        self.pipeline.clear_cache(&mut |n| notices.emit(n));
        self.shown = Shown::Stale;
    }

    /// Decode the frame at `index` without drawing it. Blocks on the worker.
    pub fn frame_at_index(&mut self, index: usize) -> SublayResult<Option<Arc<Frame>>> {
        self.ensure_live()?;
        let notices = &mut self.notices;
        self.pipeline.frame_blocking(index, &mut |n| notices.emit(n))
    }

    /// Decode the frame shown at playback time `secs` without drawing it.
    pub fn frame_at_timestamp(&mut self, secs: f64) -> SublayResult<Option<Arc<Frame>>> {
        self.ensure_live()?;
        let notices = &mut self.notices;
        match self.pipeline.index_at(secs * 1000.0, &mut |n| notices.emit(n))? {
            Some(index) => self.frame_at_index(index),
            None => Ok(None),
        }
    }

    /// Draw the entry at playback time `secs` immediately, waiting for its frame if needed.
    pub fn render_at_timestamp(&mut self, secs: f64) -> SublayResult<Option<usize>> {
        self.ensure_live()?;
        let time_ms = secs * 1000.0;
        let notices = &mut self.notices;
        let index = self.pipeline.index_at(time_ms, &mut |n| notices.emit(n))?;
        let frame = match index {
            Some(i) => self.frame_at_index(i)?,
            None => None,
        };
        self.draw(frame.as_deref())?;
        self.shown = Shown::Index(index);
        self.last_render_time_ms = Some(time_ms);
        Ok(index)
    }

    /// Entry currently on screen, or `None` when nothing has been drawn since the last reset.
    pub fn last_rendered(&self) -> Option<Option<usize>> {
        match self.shown {
            Shown::Stale => None,
            Shown::Index(i) => Some(i),
        }
    }

    pub fn last_render_time_ms(&self) -> Option<f64> {
        self.last_render_time_ms
    }

    pub fn stats(&self) -> RenderStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    pub fn active_backend(&self) -> Option<BackendKind> {
        self.cascade.active_kind()
    }

    pub fn surface(&self) -> Option<SurfaceDesc> {
        self.cascade.surface()
    }

    pub fn background_active(&self) -> bool {
        self.pipeline.background_active()
    }

    /// Every notice raised so far, oldest first.
    pub fn notices(&self) -> &[FallbackNotice] {
        &self.notices.history
    }

    pub fn opts(&self) -> &SessionOpts {
        &self.opts
    }

    pub fn read_pixels(&mut self) -> SublayResult<FrameRGBA> {
        self.cascade.read_pixels()
    }

    /// Stop the worker and release every render resource. Further ticks are no-ops.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.pipeline.dispose();
        self.cascade.destroy();
        tracing::debug!("overlay session disposed");
    }

    fn ensure_live(&self) -> SublayResult<()> {
        if self.disposed {
            return Err(SublayError::validation("overlay session was disposed"));
        }
        Ok(())
    }

    /// Draw `frame` (or clear), failing over to the next tier once if the active one breaks.
    fn draw(&mut self, frame: Option<&Frame>) -> SublayResult<()> {
        let started = Instant::now();
        match self.draw_once(frame) {
            Ok(()) => {}
            Err(e) => {
                let notices = &mut self.notices;
                self.cascade.fail_over(&e, &mut |n| notices.emit(n))?;
                self.draw_once(frame)?;
            }
        }
        self.stats.record(started.elapsed());
        Ok(())
    }

    fn draw_once(&mut self, frame: Option<&Frame>) -> SublayResult<()> {
        let Some(surface) = self.cascade.surface() else {
            return Ok(());
        };
        match frame {
            Some(f) if !f.is_empty() => {
                let params = DrawParams {
                    source_width: f.width,
                    source_height: f.height,
                    scale_x: self.display.scale,
                    scale_y: self.display.scale,
                    offset_y: self.display.offset_px(surface.height),
                };
                self.cascade.render(&f.compositions, &params)
            }
            _ => self.cascade.clear(),
        }
    }
}

impl Drop for OverlaySession {
    fn drop(&mut self) {
        self.dispose();
    }
}
