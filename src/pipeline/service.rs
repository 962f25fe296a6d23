use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use crate::{
    decode::{DecoderFactory, SubtitleDecoder, SubtitleFormat, SubtitleSource},
    foundation::{
        core::Frame,
        error::{SublayError, SublayResult},
        notice::{FallbackNotice, NoticeSink},
    },
    pipeline::{
        dispatcher::{DEFAULT_DISPATCH_TIMEOUT, Dispatcher},
        frame_cache::{FrameCache, FrameLookup},
        protocol::{Request, Response},
    },
    timing::index::{DEFAULT_INDEX_REUSE_WINDOW_MS, IndexCache, TimestampTable},
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PipelineOpts {
    pub use_background: bool,
    pub dispatch_timeout: Duration,
    pub index_reuse_window_ms: f64,
}

impl Default for PipelineOpts {
    fn default() -> Self {
        Self {
            use_background: true,
            dispatch_timeout: DEFAULT_DISPATCH_TIMEOUT,
            index_reuse_window_ms: DEFAULT_INDEX_REUSE_WINDOW_MS,
        }
    }
}

enum Background {
    Unstarted,
    Active(Dispatcher),
    /// Either opted out or failed. Failure is permanent for the pipeline's lifetime.
    Disabled,
}

/// What changed during [`FramePipeline::poll`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Indices whose frames became available.
    pub frames: Vec<usize>,
    /// Whether a background index lookup resolved.
    pub index_resolved: bool,
}

/// Decode service in front of a [`SubtitleDecoder`].
///
/// Work goes to a background worker while it is healthy. The first failure of any kind disables
/// the worker and the same work runs inline on a lazily built local decoder.
pub struct FramePipeline {
    factory: DecoderFactory,
    opts: PipelineOpts,
    background: Background,
    local: Option<Box<dyn SubtitleDecoder>>,
    local_loaded: bool,
    /// Why the inline decoder could not be built or loaded. Cleared by the next load.
    local_failure: Option<String>,
    source: Option<SubtitleSource>,
    count: usize,
    table: TimestampTable,
    frames: FrameCache,
    index: IndexCache,
}

impl FramePipeline {
    pub fn new(factory: DecoderFactory, opts: PipelineOpts) -> Self {
        Self {
            factory,
            background: if opts.use_background {
                Background::Unstarted
            } else {
                Background::Disabled
            },
            local: None,
            local_loaded: false,
            local_failure: None,
            source: None,
            count: 0,
            table: TimestampTable::default(),
            frames: FrameCache::new(),
            index: IndexCache::new(opts.index_reuse_window_ms),
            opts,
        }
    }

    pub fn background_active(&self) -> bool {
        matches!(self.background, Background::Active(_))
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn format(&self) -> Option<SubtitleFormat> {
        self.source.as_ref().map(SubtitleSource::format)
    }

    pub fn timestamps(&self) -> &[f64] {
        self.table.as_slice()
    }

    pub fn frame_cache(&self) -> &FrameCache {
        &self.frames
    }

    /// Start the background worker if it has not been started yet.
    pub fn start(&mut self, notify: NoticeSink<'_>) {
        if !matches!(self.background, Background::Unstarted) {
            return;
        }
        let started = Dispatcher::spawn(self.factory.clone(), self.opts.dispatch_timeout)
            .and_then(|mut d| d.call(Request::Init).map(|_| d));
        match started {
            Ok(d) => {
                tracing::debug!("background decode worker ready");
                self.background = Background::Active(d);
            }
            Err(e) => self.disable(&e, notify),
        }
    }

    /// Replace loaded content and return the entry count.
    pub fn load(&mut self, source: SubtitleSource, notify: NoticeSink<'_>) -> SublayResult<usize> {
        self.unload();
        self.start(notify);
        self.source = Some(source.clone());

        if let Background::Active(d) = &mut self.background {
            match load_remote(d, source) {
                Ok((count, table)) => return Ok(self.set_content(count, table)),
                Err(e) => self.disable(&e, notify),
            }
        }
        let timestamps = self.local_decoder()?.timestamps();
        let table = TimestampTable::new(timestamps)?;
        Ok(self.set_content(self.count, table))
    }

    fn set_content(&mut self, count: usize, table: TimestampTable) -> usize {
        self.count = count;
        self.table = table;
        tracing::info!(entries = count, "subtitle content loaded");
        count
    }

    /// Drain worker replies into the caches. Non-blocking.
    pub fn poll(&mut self, now: Instant, notify: NoticeSink<'_>) -> PollReport {
        let mut report = PollReport::default();
        let Background::Active(d) = &mut self.background else {
            return report;
        };
        let outcome = d.poll(now);
        for (id, resp) in outcome.completed {
            match resp {
                Response::Frame { index, mut frame } => {
                    if let Some(f) = frame.as_mut() {
                        f.retain_well_formed();
                    }
                    self.frames.complete(index, id, frame);
                    report.frames.push(index);
                }
                Response::Index { index, .. } => {
                    report.index_resolved |= self.index.resolve(id, index);
                }
                other => tracing::trace!(%id, response = ?other, "background reply"),
            }
        }
        if let Some(e) = outcome.failure {
            self.disable(&e, notify);
        }
        report
    }

    /// Current entry for `time_ms`. Never blocks on the worker.
    pub fn current_index(&mut self, time_ms: f64, notify: NoticeSink<'_>) -> Option<usize> {
        let stateful = self.format().is_some_and(SubtitleFormat::has_stateful_lookup);
        if !stateful {
            return self.table.find_index(time_ms);
        }
        if let Background::Active(d) = &mut self.background {
            match self
                .index
                .lookup(time_ms, |t| d.dispatch(Request::FindIndex { time_ms: t }))
            {
                Ok(index) => return index,
                Err(e) => self.disable(&e, notify),
            }
        }
        match self.local_decoder() {
            Ok(dec) => dec.find_index(time_ms),
            Err(e) => {
                tracing::debug!(error = %e, "inline index lookup failed; using timestamp table");
                self.table.find_index(time_ms)
            }
        }
    }

    /// Blocking variant of [`FramePipeline::current_index`].
    pub fn index_at(&mut self, time_ms: f64, notify: NoticeSink<'_>) -> SublayResult<Option<usize>> {
        let stateful = self.format().is_some_and(SubtitleFormat::has_stateful_lookup);
        if !stateful {
            return Ok(self.table.find_index(time_ms));
        }
        if let Background::Active(d) = &mut self.background {
            match d.call(Request::FindIndex { time_ms }) {
                Ok(Response::Index { index, .. }) => return Ok(index),
                Ok(other) => {
                    let e = unexpected("find_index", &other);
                    self.disable(&e, notify);
                }
                Err(e) => self.disable(&e, notify),
            }
        }
        Ok(self.local_decoder()?.find_index(time_ms))
    }

    /// Frame for `index`, dispatching to the worker at most once per index.
    pub fn frame(&mut self, index: usize, notify: NoticeSink<'_>) -> FrameLookup {
        if let Background::Active(d) = &mut self.background {
            match self
                .frames
                .get_or_request(index, |i| d.dispatch(Request::RenderAtIndex(i)))
            {
                Ok(lookup) => return lookup,
                Err(e) => self.disable(&e, notify),
            }
        }
        if let Some(frame) = self.frames.get(index) {
            return FrameLookup::Ready(frame);
        }
        FrameLookup::Ready(self.render_inline(index))
    }

    /// Blocking variant of [`FramePipeline::frame`].
    pub fn frame_blocking(
        &mut self,
        index: usize,
        notify: NoticeSink<'_>,
    ) -> SublayResult<Option<Arc<Frame>>> {
        if let Some(frame) = self.frames.get(index) {
            return Ok(frame);
        }
        if let Background::Active(d) = &mut self.background {
            match d.call(Request::RenderAtIndex(index)) {
                Ok(Response::Frame { mut frame, .. }) => {
                    if let Some(f) = frame.as_mut() {
                        f.retain_well_formed();
                    }
                    return Ok(self.frames.insert(index, frame));
                }
                Ok(other) => {
                    let e = unexpected("render_at_index", &other);
                    self.disable(&e, notify);
                }
                Err(e) => self.disable(&e, notify),
            }
        }
        let mut frame = self.local_decoder()?.render_at(index)?;
        if let Some(f) = frame.as_mut() {
            f.retain_well_formed();
        }
        Ok(self.frames.insert(index, frame))
    }

    fn render_inline(&mut self, index: usize) -> Option<Arc<Frame>> {
        let rendered = self.local_decoder().and_then(|dec| dec.render_at(index));
        let frame = match rendered {
            Ok(mut frame) => {
                if let Some(f) = frame.as_mut() {
                    f.retain_well_formed();
                }
                frame
            }
            Err(e) => {
                tracing::warn!(index, error = %e, "inline decode failed; showing nothing");
                None
            }
        };
        self.frames.insert(index, frame)
    }

    /// Drop decoded frames and in-flight bookkeeping. Decoder-side caches are kept.
    pub fn on_seek(&mut self) {
        self.frames.on_seek();
        self.index.invalidate();
        tracing::debug!("seek: frame cache cleared");
    }

    /// Drop every cache, including the decoders' own.
    pub fn clear_cache(&mut self, notify: NoticeSink<'_>) {
        self.on_seek();
        if let Some(dec) = self.local.as_mut() {
            dec.clear_cache();
        }
        if let Background::Active(d) = &mut self.background
            && let Err(e) = d.dispatch(Request::ClearCache)
        {
            self.disable(&e, notify);
        }
    }

    pub fn dispose(&mut self) {
        self.unload();
        if let Background::Active(mut d) =
            std::mem::replace(&mut self.background, Background::Unstarted)
            && let Err(e) = d.dispatch(Request::Dispose)
        {
            tracing::debug!(error = %e, "worker already gone at dispose");
        }
        self.local = None;
    }

    fn unload(&mut self) {
        if let Background::Active(d) = &mut self.background {
            d.forget_pending();
        }
        if let Some(dec) = self.local.as_mut() {
            dec.dispose();
        }
        self.local_loaded = false;
        self.local_failure = None;
        self.source = None;
        self.count = 0;
        self.table = TimestampTable::default();
        self.frames.on_seek();
        self.index = IndexCache::new(self.opts.index_reuse_window_ms);
    }

    fn disable(&mut self, reason: &SublayError, notify: NoticeSink<'_>) {
        if matches!(self.background, Background::Disabled) {
            return;
        }
        self.background = Background::Disabled;
        let dropped = self.frames.drop_pending();
        self.index.abandon_in_flight();
        let notice = FallbackNotice::BackgroundDisabled {
            reason: reason.to_string(),
        };
        tracing::warn!(%notice, abandoned = dropped.len(), "background decoding disabled");
        notify(&notice);
    }

    /// The inline decoder, built and loaded with the current source on first use.
    fn local_decoder(&mut self) -> SublayResult<&mut Box<dyn SubtitleDecoder>> {
        if let Some(reason) = &self.local_failure {
            return Err(SublayError::initialization(format!(
                "inline decoder unavailable: {reason}"
            )));
        }
        if let Err(e) = self.prepare_local() {
            tracing::warn!(error = %e, "inline decoder failed; not retrying until the next load");
            self.local_failure = Some(e.to_string());
            return Err(e);
        }
        self.local
            .as_mut()
            .ok_or_else(|| SublayError::initialization("inline decoder unavailable"))
    }

    fn prepare_local(&mut self) -> SublayResult<()> {
        if self.local.is_none() {
            self.local = Some((self.factory)()?);
        }
        if !self.local_loaded
            && let (Some(dec), Some(source)) = (self.local.as_mut(), self.source.as_ref())
        {
            self.count = dec.load(source)?;
            self.local_loaded = true;
        }
        Ok(())
    }
}

fn load_remote(d: &mut Dispatcher, source: SubtitleSource) -> SublayResult<(usize, TimestampTable)> {
    let count = match d.call(Request::Load(source))? {
        Response::Loaded { count } => count,
        other => return Err(unexpected("load", &other)),
    };
    let table = match d.call(Request::GetTimestamps)? {
        Response::Timestamps(ts) => TimestampTable::new(ts)?,
        other => return Err(unexpected("get_timestamps", &other)),
    };
    Ok((count, table))
}

fn unexpected(request: &str, resp: &Response) -> SublayError {
    SublayError::decode(format!("unexpected reply to {request}: {resp:?}"))
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/service.rs"]
mod tests;
